//! OS media controls bridge (MPRIS/SMTC/Now Playing).
//!
//! Publishes session snapshots through `souvlaki` and forwards button presses
//! into the session manager queue.

use std::time::Duration;

use log::warn;
use souvlaki::{
    MediaControlEvent, MediaControls, MediaMetadata as OsMediaMetadata, MediaPlayback,
    MediaPosition, PlatformConfig, SeekDirection,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::config::SessionConfig;
use crate::protocol::{Message, RemoteControlEvent};
use crate::session::actions::ActionName;
use crate::session::sinks::{PlaybackStateUpdate, SessionSink};
use crate::session::state_store::{MediaMetadata, PlaybackState};

/// Session sink backed by the platform media controls.
pub struct MediaControlsSink {
    controls: MediaControls,
}

impl MediaControlsSink {
    /// Creates platform controls and routes their events into `inbox`.
    /// Returns `None` when the platform backend is unavailable.
    pub fn new(config: &SessionConfig, inbox: UnboundedSender<Message>) -> Option<Self> {
        Self::create_controls(config, inbox).map(|controls| Self { controls })
    }

    #[cfg(not(target_os = "windows"))]
    fn create_controls(
        config: &SessionConfig,
        inbox: UnboundedSender<Message>,
    ) -> Option<MediaControls> {
        let mut controls = match MediaControls::new(PlatformConfig {
            display_name: &config.display_name,
            dbus_name: &config.dbus_name,
            hwnd: None,
        }) {
            Ok(controls) => controls,
            Err(err) => {
                warn!(
                    "MediaControlsSink: failed to create media controls backend: {:?}",
                    err
                );
                return None;
            }
        };

        if let Err(err) = controls.attach(move |event| {
            if let Some(remote_event) = map_control_event(event) {
                let _ = inbox.send(Message::Remote(remote_event));
            }
        }) {
            warn!(
                "MediaControlsSink: failed to attach media controls handler: {:?}",
                err
            );
            return None;
        }

        Some(controls)
    }

    #[cfg(target_os = "windows")]
    fn create_controls(
        _config: &SessionConfig,
        _inbox: UnboundedSender<Message>,
    ) -> Option<MediaControls> {
        // Souvlaki requires an HWND on Windows, and this process owns no window.
        warn!("MediaControlsSink: Windows media controls are disabled because no HWND is available");
        None
    }
}

impl SessionSink for MediaControlsSink {
    fn push_playback_state(&mut self, update: &PlaybackStateUpdate) -> Result<(), String> {
        self.controls
            .set_playback(playback_for_update(update))
            .map_err(|err| format!("failed to publish playback state: {:?}", err))
    }

    fn push_metadata(&mut self, metadata: &MediaMetadata) -> Result<(), String> {
        let duration =
            (metadata.duration_ms > 0).then(|| Duration::from_millis(metadata.duration_ms));
        self.controls
            .set_metadata(OsMediaMetadata {
                title: non_empty(&metadata.title),
                artist: non_empty(&metadata.artist),
                album: non_empty(&metadata.album),
                cover_url: metadata.artwork.as_ref().map(|artwork| artwork.as_str()),
                duration,
            })
            .map_err(|err| format!("failed to publish metadata: {:?}", err))
    }
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

fn playback_for_update(update: &PlaybackStateUpdate) -> MediaPlayback {
    let progress = Some(MediaPosition(Duration::from_millis(update.position_ms)));
    match update.state {
        PlaybackState::None => MediaPlayback::Stopped,
        PlaybackState::Paused => MediaPlayback::Paused { progress },
        PlaybackState::Playing => MediaPlayback::Playing { progress },
    }
}

/// Translates an OS media-control event. State-dependent events (toggle,
/// relative seeks) are resolved later by the session owner.
pub fn map_control_event(event: MediaControlEvent) -> Option<RemoteControlEvent> {
    match event {
        MediaControlEvent::Play => Some(RemoteControlEvent::Action(ActionName::Play)),
        MediaControlEvent::Pause => Some(RemoteControlEvent::Action(ActionName::Pause)),
        MediaControlEvent::Toggle => Some(RemoteControlEvent::Toggle),
        MediaControlEvent::Next => Some(RemoteControlEvent::Action(ActionName::NextTrack)),
        MediaControlEvent::Previous => {
            Some(RemoteControlEvent::Action(ActionName::PreviousTrack))
        }
        MediaControlEvent::Stop => Some(RemoteControlEvent::Action(ActionName::Stop)),
        MediaControlEvent::SetPosition(position) => Some(RemoteControlEvent::SetPosition {
            position_ms: position.0.as_millis() as u64,
        }),
        MediaControlEvent::SeekBy(direction, delta) => Some(RemoteControlEvent::SeekBy {
            forward: matches!(direction, SeekDirection::Forward),
            delta_ms: delta.as_millis() as u64,
        }),
        MediaControlEvent::Seek(direction) => Some(RemoteControlEvent::SeekStep {
            forward: matches!(direction, SeekDirection::Forward),
        }),
        MediaControlEvent::SetVolume(_)
        | MediaControlEvent::OpenUri(_)
        | MediaControlEvent::Raise
        | MediaControlEvent::Quit => None,
    }
}
