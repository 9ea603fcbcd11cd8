//! Transport action names, handler registry and dispatch.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;

/// The closed set of transport actions, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionName {
    PreviousTrack,
    SeekBackward,
    Play,
    Pause,
    SeekForward,
    NextTrack,
    SeekTo,
    Stop,
}

pub const ACTION_COUNT: usize = 8;

impl ActionName {
    pub const ALL: [ActionName; ACTION_COUNT] = [
        ActionName::PreviousTrack,
        ActionName::SeekBackward,
        ActionName::Play,
        ActionName::Pause,
        ActionName::SeekForward,
        ActionName::NextTrack,
        ActionName::SeekTo,
        ActionName::Stop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionName::PreviousTrack => "previoustrack",
            ActionName::SeekBackward => "seekbackward",
            ActionName::Play => "play",
            ActionName::Pause => "pause",
            ActionName::SeekForward => "seekforward",
            ActionName::NextTrack => "nexttrack",
            ActionName::SeekTo => "seekto",
            ActionName::Stop => "stop",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == name)
    }

    /// Slot in the handler table.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Bit used in the permitted-action mask. Values follow the platform
    /// media-session action flags so sinks can pass the mask through.
    pub fn permitted_bit(self) -> u64 {
        match self {
            ActionName::Stop => 1 << 0,
            ActionName::Pause => 1 << 1,
            ActionName::Play => 1 << 2,
            ActionName::SeekBackward => 1 << 3,
            ActionName::PreviousTrack => 1 << 4,
            ActionName::NextTrack => 1 << 5,
            ActionName::SeekForward => 1 << 6,
            ActionName::SeekTo => 1 << 8,
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine-side payload accompanying a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionPayload {
    #[default]
    None,
    /// Absolute seek target in engine milliseconds.
    SeekToMs(u64),
}

/// Payload handed to a registered handler.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ActionDetails {
    pub action: ActionName,
    /// Seek target in seconds, only set for `seekto`.
    #[serde(rename = "seekTime", skip_serializing_if = "Option::is_none")]
    pub seek_time: Option<f64>,
}

impl ActionDetails {
    pub fn new(action: ActionName, payload: ActionPayload) -> Self {
        let seek_time = match payload {
            ActionPayload::SeekToMs(ms) => Some(ms as f64 / 1000.0),
            ActionPayload::None => None,
        };
        Self { action, seek_time }
    }
}

pub type ActionHandler = Arc<dyn Fn(&ActionDetails) + Send + Sync>;

/// At most one handler per action name.
///
/// Known names live in a fixed table indexed by [`ActionName`]. Any other name
/// is kept in a side map and never takes part in action computation or dispatch.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: [Option<ActionHandler>; ACTION_COUNT],
    inert: HashMap<String, ActionHandler>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`, replacing any previous one.
    /// Returns the parsed action when the name belongs to the fixed set.
    pub fn register(&mut self, name: &str, handler: ActionHandler) -> Option<ActionName> {
        match ActionName::parse(name) {
            Some(action) => {
                self.register_action(action, handler);
                Some(action)
            }
            None => {
                debug!("ActionRegistry: storing inert handler for unknown action '{name}'");
                self.inert.insert(name.to_string(), handler);
                None
            }
        }
    }

    pub fn register_action(&mut self, action: ActionName, handler: ActionHandler) {
        self.handlers[action.index()] = Some(handler);
    }

    /// Removes the handler under `name`. Returns `true` if one was present.
    pub fn clear(&mut self, name: &str) -> bool {
        match ActionName::parse(name) {
            Some(action) => self.handlers[action.index()].take().is_some(),
            None => self.inert.remove(name).is_some(),
        }
    }

    pub fn has_handler(&self, action: ActionName) -> bool {
        self.handlers[action.index()].is_some()
    }

    pub fn inert_count(&self) -> usize {
        self.inert.len()
    }

    /// Invokes the handler for `action`. Missing handlers are not an error.
    pub fn dispatch(&self, action: ActionName, payload: ActionPayload) -> bool {
        let Some(handler) = self.handlers[action.index()].as_ref() else {
            debug!("ActionRegistry: no handler for '{action}', dispatch ignored");
            return false;
        };
        handler(&ActionDetails::new(action, payload));
        true
    }

    pub fn clear_all(&mut self) {
        self.handlers = Default::default();
        self.inert.clear();
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<&str> = ActionName::ALL
            .into_iter()
            .filter(|action| self.has_handler(*action))
            .map(ActionName::as_str)
            .collect();
        f.debug_struct("ActionRegistry")
            .field("registered", &registered)
            .field("inert", &self.inert.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording_handler(log: &Arc<Mutex<Vec<ActionDetails>>>) -> ActionHandler {
        let log = Arc::clone(log);
        Arc::new(move |details| log.lock().unwrap().push(*details))
    }

    #[test]
    fn test_dispatch_without_handler_returns_false() {
        let registry = ActionRegistry::new();
        for action in ActionName::ALL {
            assert!(!registry.dispatch(action, ActionPayload::None));
        }
    }

    #[test]
    fn test_seekto_payload_is_converted_to_seconds() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ActionRegistry::new();
        registry.register("seekto", recording_handler(&log));

        assert!(registry.dispatch(ActionName::SeekTo, ActionPayload::SeekToMs(1_500)));
        let calls = log.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].seek_time, Some(1.5));
    }

    #[test]
    fn test_reregistering_overwrites_previous_handler() {
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ActionRegistry::new();
        registry.register("play", recording_handler(&first));
        registry.register("play", recording_handler(&second));

        registry.dispatch(ActionName::Play, ActionPayload::None);
        assert!(first.lock().unwrap().is_empty());
        assert_eq!(second.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_name_is_stored_but_inert() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ActionRegistry::new();
        assert_eq!(registry.register("skipad", recording_handler(&log)), None);
        assert_eq!(registry.inert_count(), 1);
        assert!(ActionName::ALL
            .into_iter()
            .all(|action| !registry.has_handler(action)));
        assert!(registry.clear("skipad"));
        assert_eq!(registry.inert_count(), 0);
    }

    #[test]
    fn test_names_round_trip_through_parse() {
        for action in ActionName::ALL {
            assert_eq!(ActionName::parse(action.as_str()), Some(action));
        }
        assert_eq!(ActionName::parse("Play"), None);
    }

    #[test]
    fn test_permitted_bits_are_distinct() {
        let mask = ActionName::ALL
            .into_iter()
            .fold(0u64, |mask, action| {
                assert_eq!(mask & action.permitted_bit(), 0);
                mask | action.permitted_bit()
            });
        assert_eq!(mask.count_ones(), 8);
    }
}
