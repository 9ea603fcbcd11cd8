//! Change-detected storage for the now-playing fields.
//!
//! Every setter compares against the stored value and only raises dirty flags
//! on an actual change. Propagation is left to the update coalescer.

use log::debug;

/// Transport state published to the session sink.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    None,
    Playing,
    Paused,
}

impl PlaybackState {
    /// Maps a controller state name; anything other than `playing`/`paused` is `None`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "playing" => Self::Playing,
            "paused" => Self::Paused,
            _ => Self::None,
        }
    }

    pub fn is_playing(self) -> bool {
        self == Self::Playing
    }
}

/// Opaque artwork handle. Resolution (fetch/decode) happens outside the core.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct ArtworkRef(String);

impl ArtworkRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Metadata snapshot as pushed to the session sink.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct MediaMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork: Option<ArtworkRef>,
    pub duration_ms: u64,
}

/// Playback position and rate. A rate of zero is never stored.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PositionInfo {
    pub position_ms: u64,
    pub rate: f32,
}

impl Default for PositionInfo {
    fn default() -> Self {
        Self {
            position_ms: 0,
            rate: 1.0,
        }
    }
}

/// Coerces a zero playback rate to normal speed.
pub fn normalize_rate(rate: f32) -> f32 {
    if rate == 0.0 {
        1.0
    } else {
        rate
    }
}

/// Categories of state changed since the last propagation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyFlags {
    pub actions: bool,
    pub playback: bool,
    pub metadata: bool,
    /// Notification pass; raised by the coalescer when actions or metadata change.
    pub render: bool,
}

impl DirtyFlags {
    pub fn any(&self) -> bool {
        self.actions || self.playback || self.metadata || self.render
    }
}

/// Current now-playing fields plus their dirty flags.
#[derive(Debug, Default)]
pub struct StateStore {
    playback_state: PlaybackState,
    metadata: MediaMetadata,
    position: PositionInfo,
    dirty: DirtyFlags,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback_state
    }

    pub fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }

    pub fn position(&self) -> PositionInfo {
        self.position
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    pub(crate) fn dirty_mut(&mut self) -> &mut DirtyFlags {
        &mut self.dirty
    }

    /// Playback state drives the valid action set, so both flags are raised.
    pub fn set_playback_state(&mut self, state: PlaybackState) -> bool {
        if self.playback_state == state {
            return false;
        }
        debug!(
            "StateStore: playback state {:?} -> {:?}",
            self.playback_state, state
        );
        self.playback_state = state;
        self.dirty.playback = true;
        self.dirty.actions = true;
        true
    }

    pub fn set_title(&mut self, title: &str) -> bool {
        Self::replace_text(&mut self.metadata.title, title, &mut self.dirty)
    }

    pub fn set_artist(&mut self, artist: &str) -> bool {
        Self::replace_text(&mut self.metadata.artist, artist, &mut self.dirty)
    }

    pub fn set_album(&mut self, album: &str) -> bool {
        Self::replace_text(&mut self.metadata.album, album, &mut self.dirty)
    }

    pub fn set_duration(&mut self, duration_ms: u64) -> bool {
        if self.metadata.duration_ms == duration_ms {
            return false;
        }
        self.metadata.duration_ms = duration_ms;
        self.dirty.metadata = true;
        true
    }

    /// Always raises the metadata flag; artwork handles are not compared.
    pub fn set_artwork(&mut self, artwork: Option<ArtworkRef>) {
        self.metadata.artwork = artwork;
        self.dirty.metadata = true;
    }

    pub fn set_position(&mut self, position_ms: u64) -> bool {
        if self.position.position_ms == position_ms {
            return false;
        }
        self.position.position_ms = position_ms;
        self.dirty.playback = true;
        true
    }

    pub fn set_playback_speed(&mut self, rate: f32) -> bool {
        let rate = normalize_rate(rate);
        if self.position.rate == rate {
            return false;
        }
        self.position.rate = rate;
        self.dirty.playback = true;
        true
    }

    /// Handler registration changed; the action set must be recomputed.
    pub fn mark_actions_dirty(&mut self) {
        self.dirty.actions = true;
    }

    fn replace_text(slot: &mut String, next: &str, dirty: &mut DirtyFlags) -> bool {
        if slot == next {
            return false;
        }
        slot.clear();
        slot.push_str(next);
        dirty.metadata = true;
        true
    }
}
