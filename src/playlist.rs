//! Ordered playback queue with id lookup and edge-clamped navigation.
//!
//! The navigator owns no engine. Every operation returns the engine commands
//! needed to bring the downstream queue in line with the new state.

use std::collections::HashMap;

use log::debug;

use crate::protocol::{BoundaryReason, EngineCommand};

/// One entry of the playback queue.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Track {
    pub id: String,
    #[serde(alias = "url")]
    pub uri: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
}

#[derive(Debug, Default)]
pub struct PlaylistNavigator {
    tracks: HashMap<String, Track>,
    order: Vec<String>,
    current_index: Option<usize>,
}

impl PlaylistNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_index
            .and_then(|index| self.order.get(index))
            .and_then(|id| self.tracks.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&Track> {
        self.tracks.get(id)
    }

    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn tracks_in_order(&self) -> Vec<Track> {
        self.order
            .iter()
            .filter_map(|id| self.tracks.get(id).cloned())
            .collect()
    }

    /// Replaces the queue. A repeated id keeps its first position and the
    /// last provided track data.
    pub fn set_playlist(&mut self, tracks: Vec<Track>) -> Vec<EngineCommand> {
        self.tracks.clear();
        self.order.clear();
        for track in tracks {
            if !self.tracks.contains_key(&track.id) {
                self.order.push(track.id.clone());
            }
            self.tracks.insert(track.id.clone(), track);
        }
        self.current_index = if self.order.is_empty() { None } else { Some(0) };
        debug!("PlaylistNavigator: playlist replaced, {} tracks", self.order.len());
        vec![self.reload_command()]
    }

    /// Appends a track. Adding a known id only refreshes its data.
    pub fn add(&mut self, track: Track) -> Vec<EngineCommand> {
        if !self.tracks.contains_key(&track.id) {
            self.order.push(track.id.clone());
        }
        self.tracks.insert(track.id.clone(), track);
        if self.current_index.is_none() {
            self.current_index = Some(0);
        }
        vec![self.reload_command()]
    }

    pub fn remove(&mut self, id: &str) -> Vec<EngineCommand> {
        if self.tracks.remove(id).is_none() {
            debug!("PlaylistNavigator: remove of unknown id '{id}' ignored");
            return Vec::new();
        }
        self.order.retain(|entry| entry != id);

        if self.order.is_empty() {
            self.current_index = None;
            return vec![self.reload_command(), EngineCommand::Stop];
        }
        let last = self.order.len() - 1;
        self.current_index = Some(self.current_index.map_or(0, |index| index.min(last)));
        vec![self.reload_command()]
    }

    pub fn play_by_id(&mut self, id: &str) -> Vec<EngineCommand> {
        let Some(index) = self.order.iter().position(|entry| entry == id) else {
            debug!("PlaylistNavigator: play of unknown id '{id}' ignored");
            return Vec::new();
        };
        self.current_index = Some(index);
        vec![EngineCommand::PlayIndex { index }]
    }

    /// Advances unless already on the last track; never wraps.
    pub fn play_next(&mut self) -> Vec<EngineCommand> {
        match self.current_index {
            Some(index) if index + 1 < self.order.len() => {
                self.current_index = Some(index + 1);
                vec![EngineCommand::PlayIndex { index: index + 1 }]
            }
            _ => Vec::new(),
        }
    }

    pub fn play_previous(&mut self) -> Vec<EngineCommand> {
        match self.current_index {
            Some(index) if index > 0 => {
                self.current_index = Some(index - 1);
                vec![EngineCommand::PlayIndex { index: index - 1 }]
            }
            _ => Vec::new(),
        }
    }

    /// Natural end of a track advances; at the end of the queue the last
    /// track is rewound and paused.
    pub fn on_track_boundary_reached(&mut self, reason: BoundaryReason) -> Vec<EngineCommand> {
        if reason != BoundaryReason::Auto {
            return Vec::new();
        }
        let Some(index) = self.current_index else {
            return Vec::new();
        };
        if index + 1 < self.order.len() {
            self.current_index = Some(index + 1);
            vec![EngineCommand::PlayIndex { index: index + 1 }]
        } else {
            vec![EngineCommand::SeekToStartAndPause { index }]
        }
    }

    /// Puts the cursor back after the engine refused to move.
    pub(crate) fn restore_current_index(&mut self, index: Option<usize>) {
        self.current_index = index.filter(|index| *index < self.order.len());
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.order.clear();
        self.current_index = None;
    }

    fn reload_command(&self) -> EngineCommand {
        EngineCommand::LoadQueue {
            tracks: self.tracks_in_order(),
            current_index: self.current_index,
        }
    }
}
