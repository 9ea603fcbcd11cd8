//! Message types exchanged between the session owner and its collaborators.
//!
//! Everything that mutates a session travels as a [`Message`] into the
//! session manager's queue so mutation stays on one thread. Outcomes leave as
//! [`SessionEvent`]s on a broadcast bus.

use crate::command::SessionCommand;
use crate::playlist::Track;
use crate::session::actions::{ActionDetails, ActionName};
use crate::session::state_store::{ArtworkRef, PlaybackState};

/// Top-level envelope for the session manager queue.
#[derive(Debug, Clone)]
pub enum Message {
    /// Controller command.
    Command(SessionCommand),
    /// OS media-control button press.
    Remote(RemoteControlEvent),
    /// Playback engine callback.
    Engine(EngineEvent),
    /// Ends the session and stops the manager loop.
    Release,
}

/// Remote-control input before it is resolved against session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteControlEvent {
    Action(ActionName),
    /// Play/pause toggle; resolved from the current playback state.
    Toggle,
    /// Relative seek by the configured step.
    SeekStep { forward: bool },
    /// Relative seek by an explicit offset.
    SeekBy { forward: bool, delta_ms: u64 },
    /// Absolute seek.
    SetPosition { position_ms: u64 },
}

/// Why the engine left the current track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BoundaryReason {
    /// The track played to its end.
    Auto,
    Seek,
    PlaylistChanged,
    Repeat,
}

/// Callbacks from the playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    TrackBoundaryReached(BoundaryReason),
    PlaybackStateChanged(PlaybackState),
}

/// Load a single media URI and start playing it from an offset.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayRequest {
    pub uri: String,
    pub title: String,
    pub artist: String,
    pub artwork: Option<ArtworkRef>,
    pub is_video: bool,
    pub start_position_ms: u64,
}

/// Commands the session issues to the playback engine.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum EngineCommand {
    #[serde(rename_all = "camelCase")]
    LoadQueue {
        tracks: Vec<Track>,
        current_index: Option<usize>,
    },
    PlayIndex {
        index: usize,
    },
    /// Rewind the track at the index to zero and pause.
    SeekToStartAndPause {
        index: usize,
    },
    PlayUri(PlayRequest),
    Play,
    Pause,
    Stop,
    #[serde(rename_all = "camelCase")]
    SeekTo {
        position_ms: u64,
    },
    SetVolume {
        volume: f32,
    },
}

impl EngineCommand {
    pub fn name(&self) -> &'static str {
        match self {
            EngineCommand::LoadQueue { .. } => "loadQueue",
            EngineCommand::PlayIndex { .. } => "playIndex",
            EngineCommand::SeekToStartAndPause { .. } => "seekToStartAndPause",
            EngineCommand::PlayUri(_) => "playUri",
            EngineCommand::Play => "play",
            EngineCommand::Pause => "pause",
            EngineCommand::Stop => "stop",
            EngineCommand::SeekTo { .. } => "seekTo",
            EngineCommand::SetVolume { .. } => "setVolume",
        }
    }

    /// Commands that move the engine to another queue position.
    pub fn changes_position(&self) -> bool {
        matches!(
            self,
            EngineCommand::PlayIndex { .. } | EngineCommand::SeekToStartAndPause { .. }
        )
    }
}

/// Notifications published to the controller.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SessionEvent {
    /// A controller-registered action handler fired.
    ActionInvoked(ActionDetails),
    TrackChanged { id: String },
    PlaybackStarted,
    PlaybackEnded,
    /// The engine rejected a command; local state is unchanged.
    EngineFailure { command: String, reason: String },
    /// Engine command as printed for an engine living outside the process.
    EngineRequest { request: EngineCommand },
    /// A controller payload was rejected.
    InvalidInput { reason: String },
    Released,
}
