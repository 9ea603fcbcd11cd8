//! Decoding and validation of controller command payloads.
//!
//! Payloads are JSON objects tagged by a `command` field. Times arrive in
//! seconds and are converted to milliseconds here; a payload is either fully
//! valid or rejected before it touches session state.

use crate::error::SessionError;
use crate::playlist::Track;
use crate::protocol::{BoundaryReason, PlayRequest};
use crate::session::state_store::{ArtworkRef, PlaybackState};

/// Validated controller command.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    SetMetadata {
        title: String,
        artist: String,
        album: String,
        artwork: Option<ArtworkRef>,
        /// Kept unchanged when absent.
        duration_ms: Option<u64>,
    },
    SetPlaybackState(PlaybackState),
    SetPositionState {
        duration_ms: u64,
        position_ms: u64,
        rate: f32,
    },
    SetActionHandler(String),
    ClearActionHandler(String),
    SetPlaylist(Vec<Track>),
    AddTrack(Track),
    RemoveTrack(String),
    PlayById(String),
    PlayNext,
    PlayPrevious,
    Play,
    /// Load one URI outside the queue and start it at an offset.
    PlayUri(PlayRequest),
    Pause,
    Stop,
    SetVolume(f32),
    SeekTo(u64),
    TrackBoundaryReached(BoundaryReason),
    EnginePlaybackState(PlaybackState),
    Release,
}

#[derive(Debug, serde::Deserialize)]
struct ArtworkImage {
    src: String,
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
enum RawCommand {
    SetMetadata {
        #[serde(default)]
        title: String,
        #[serde(default)]
        artist: String,
        #[serde(default)]
        album: String,
        #[serde(default)]
        artwork: Vec<ArtworkImage>,
        #[serde(default)]
        duration: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    SetPlaybackState {
        #[serde(alias = "state")]
        playback_state: String,
    },
    #[serde(rename_all = "camelCase")]
    SetPositionState {
        #[serde(default)]
        duration: f64,
        #[serde(default)]
        position: f64,
        #[serde(default = "default_rate")]
        playback_rate: f64,
    },
    SetActionHandler {
        action: String,
    },
    ClearActionHandler {
        action: String,
    },
    SetPlaylist {
        tracks: Vec<Track>,
    },
    AddToPlaylist {
        track: Track,
    },
    RemoveFromPlaylist {
        id: String,
    },
    PlayById {
        id: String,
    },
    PlayNext,
    PlayPrevious,
    /// Bare `play` resumes; with a `url` it loads and starts that media.
    #[serde(rename_all = "camelCase")]
    Play {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        title: String,
        #[serde(default)]
        artist: String,
        #[serde(default)]
        artwork: Option<String>,
        #[serde(default)]
        is_video: bool,
        /// Offset in milliseconds.
        #[serde(default)]
        start_time: u64,
    },
    Pause,
    Stop,
    SetVolume {
        volume: f64,
    },
    /// Absolute position in milliseconds.
    SetPlaybackTime {
        time: u64,
    },
    TrackBoundaryReached {
        reason: BoundaryReason,
    },
    EnginePlaybackState {
        state: String,
    },
    Release,
    Destroy,
}

fn default_rate() -> f64 {
    1.0
}

/// Decodes one JSON command payload.
pub fn decode_command(payload: &str) -> Result<SessionCommand, SessionError> {
    let raw: RawCommand = serde_json::from_str(payload)?;
    validate(raw)
}

fn validate(raw: RawCommand) -> Result<SessionCommand, SessionError> {
    let command = match raw {
        RawCommand::SetMetadata {
            title,
            artist,
            album,
            artwork,
            duration,
        } => SessionCommand::SetMetadata {
            title,
            artist,
            album,
            artwork: artwork
                .into_iter()
                .map(|image| image.src)
                .find(|src| !src.trim().is_empty())
                .map(ArtworkRef::new),
            duration_ms: duration.map(|secs| seconds_to_ms("duration", secs)).transpose()?,
        },
        RawCommand::SetPlaybackState { playback_state } => {
            SessionCommand::SetPlaybackState(PlaybackState::from_name(&playback_state))
        }
        RawCommand::SetPositionState {
            duration,
            position,
            playback_rate,
        } => {
            let duration_ms = seconds_to_ms("duration", duration)?;
            let position_ms = seconds_to_ms("position", position)?;
            if duration_ms > 0 && position_ms > duration_ms {
                return Err(SessionError::invalid(format!(
                    "position {position}s exceeds duration {duration}s"
                )));
            }
            if !playback_rate.is_finite() {
                return Err(SessionError::invalid("playbackRate must be finite"));
            }
            SessionCommand::SetPositionState {
                duration_ms,
                position_ms,
                rate: playback_rate as f32,
            }
        }
        RawCommand::SetActionHandler { action } => {
            SessionCommand::SetActionHandler(non_empty("action", action)?)
        }
        RawCommand::ClearActionHandler { action } => {
            SessionCommand::ClearActionHandler(non_empty("action", action)?)
        }
        RawCommand::SetPlaylist { tracks } => {
            for track in &tracks {
                validate_track(track)?;
            }
            SessionCommand::SetPlaylist(tracks)
        }
        RawCommand::AddToPlaylist { track } => {
            validate_track(&track)?;
            SessionCommand::AddTrack(track)
        }
        RawCommand::RemoveFromPlaylist { id } => SessionCommand::RemoveTrack(id),
        RawCommand::PlayById { id } => SessionCommand::PlayById(id),
        RawCommand::PlayNext => SessionCommand::PlayNext,
        RawCommand::PlayPrevious => SessionCommand::PlayPrevious,
        RawCommand::Play {
            url: None, ..
        } => SessionCommand::Play,
        RawCommand::Play {
            url: Some(url),
            title,
            artist,
            artwork,
            is_video,
            start_time,
        } => SessionCommand::PlayUri(PlayRequest {
            uri: non_empty("url", url)?,
            title,
            artist,
            artwork: artwork
                .filter(|src| !src.trim().is_empty())
                .map(ArtworkRef::new),
            is_video,
            start_position_ms: start_time,
        }),
        RawCommand::Pause => SessionCommand::Pause,
        RawCommand::Stop => SessionCommand::Stop,
        RawCommand::SetVolume { volume } => {
            if !(0.0..=1.0).contains(&volume) {
                return Err(SessionError::invalid(format!(
                    "volume {volume} outside [0, 1]"
                )));
            }
            SessionCommand::SetVolume(volume as f32)
        }
        RawCommand::SetPlaybackTime { time } => SessionCommand::SeekTo(time),
        RawCommand::TrackBoundaryReached { reason } => {
            SessionCommand::TrackBoundaryReached(reason)
        }
        RawCommand::EnginePlaybackState { state } => {
            SessionCommand::EnginePlaybackState(PlaybackState::from_name(&state))
        }
        RawCommand::Release | RawCommand::Destroy => SessionCommand::Release,
    };
    Ok(command)
}

fn seconds_to_ms(field: &str, seconds: f64) -> Result<u64, SessionError> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(SessionError::invalid(format!(
            "{field} must be a non-negative number of seconds"
        )));
    }
    Ok((seconds * 1000.0).round() as u64)
}

fn non_empty(field: &str, value: String) -> Result<String, SessionError> {
    if value.trim().is_empty() {
        return Err(SessionError::invalid(format!("{field} must not be empty")));
    }
    Ok(value)
}

pub(crate) fn validate_track(track: &Track) -> Result<(), SessionError> {
    if track.id.trim().is_empty() {
        return Err(SessionError::invalid("track id must not be empty"));
    }
    if track.uri.trim().is_empty() {
        return Err(SessionError::invalid(format!(
            "track '{}' has an empty uri",
            track.id
        )));
    }
    Ok(())
}
