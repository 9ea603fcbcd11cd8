//! Downstream surfaces fed by the update coalescer.
//!
//! A sink returning `Err` is treated as unavailable: the pending flag stays
//! raised and the next `update()` retries.

use crate::session::action_set::NotificationAction;
use crate::session::state_store::{ArtworkRef, MediaMetadata, PlaybackState};

/// Playback snapshot pushed to the system media session.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PlaybackStateUpdate {
    pub state: PlaybackState,
    pub position_ms: u64,
    pub rate: f32,
    pub permitted_actions: u64,
}

/// Content of the persistent now-playing notification.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NotificationSummary {
    pub title: String,
    pub subtitle: String,
    pub artwork: Option<ArtworkRef>,
    pub actions: Vec<NotificationAction>,
    pub compact_indices: Vec<usize>,
}

/// Joins the non-empty artist and album with a separator.
pub fn notification_subtitle(artist: &str, album: &str) -> String {
    match (artist.is_empty(), album.is_empty()) {
        (false, false) => format!("{artist} - {album}"),
        (false, true) => artist.to_string(),
        (true, false) => album.to_string(),
        (true, true) => String::new(),
    }
}

/// System-level media session.
pub trait SessionSink {
    fn push_playback_state(&mut self, update: &PlaybackStateUpdate) -> Result<(), String>;
    fn push_metadata(&mut self, metadata: &MediaMetadata) -> Result<(), String>;
}

/// Persistent status notification.
pub trait NotificationSink {
    fn render_summary(&mut self, summary: &NotificationSummary) -> Result<(), String>;
}

#[cfg(test)]
pub(crate) mod recording {
    //! Recording fakes shared by session tests.

    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum SinkCall {
        Playback(PlaybackStateUpdate),
        Metadata(MediaMetadata),
        Render(NotificationSummary),
    }

    pub type CallLog = Arc<Mutex<Vec<SinkCall>>>;

    pub struct RecordingSessionSink {
        pub calls: CallLog,
        pub available: Arc<Mutex<bool>>,
    }

    impl SessionSink for RecordingSessionSink {
        fn push_playback_state(&mut self, update: &PlaybackStateUpdate) -> Result<(), String> {
            if !*self.available.lock().unwrap() {
                return Err("session unavailable".to_string());
            }
            self.calls
                .lock()
                .unwrap()
                .push(SinkCall::Playback(update.clone()));
            Ok(())
        }

        fn push_metadata(&mut self, metadata: &MediaMetadata) -> Result<(), String> {
            if !*self.available.lock().unwrap() {
                return Err("session unavailable".to_string());
            }
            self.calls
                .lock()
                .unwrap()
                .push(SinkCall::Metadata(metadata.clone()));
            Ok(())
        }
    }

    pub struct RecordingNotificationSink {
        pub calls: CallLog,
    }

    impl NotificationSink for RecordingNotificationSink {
        fn render_summary(&mut self, summary: &NotificationSummary) -> Result<(), String> {
            self.calls
                .lock()
                .unwrap()
                .push(SinkCall::Render(summary.clone()));
            Ok(())
        }
    }

    /// Returns both sinks writing into one shared log.
    pub fn recording_sinks() -> (
        RecordingSessionSink,
        RecordingNotificationSink,
        CallLog,
        Arc<Mutex<bool>>,
    ) {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let available = Arc::new(Mutex::new(true));
        (
            RecordingSessionSink {
                calls: Arc::clone(&calls),
                available: Arc::clone(&available),
            },
            RecordingNotificationSink {
                calls: Arc::clone(&calls),
            },
            calls,
            available,
        )
    }

    pub fn take_calls(calls: &CallLog) -> Vec<SinkCall> {
        std::mem::take(&mut *calls.lock().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::notification_subtitle;

    #[test]
    fn test_subtitle_skips_empty_parts() {
        assert_eq!(notification_subtitle("Artist", "Album"), "Artist - Album");
        assert_eq!(notification_subtitle("Artist", ""), "Artist");
        assert_eq!(notification_subtitle("", "Album"), "Album");
        assert_eq!(notification_subtitle("", ""), "");
    }
}
