//! Dirty-flag driven propagation to the connected sinks.
//!
//! Each pass builds the complete desired state for every surface and compares
//! it with what was last delivered, so repeated passes never resend unchanged
//! snapshots.

use log::{debug, warn};

use crate::session::action_set::{
    compute_action_set, select_compact_view, ActionSet, NotificationDescriptors,
};
use crate::session::actions::ActionRegistry;
use crate::session::sinks::{
    notification_subtitle, NotificationSink, NotificationSummary, PlaybackStateUpdate,
    SessionSink,
};
use crate::session::state_store::{PlaybackState, StateStore};

/// What one `update()` pass delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub playback_pushed: bool,
    pub metadata_pushed: bool,
    pub rendered: bool,
}

impl UpdateSummary {
    pub fn sink_calls(&self) -> usize {
        usize::from(self.playback_pushed)
            + usize::from(self.metadata_pushed)
            + usize::from(self.rendered)
    }
}

pub struct UpdateCoalescer {
    session_sink: Option<Box<dyn SessionSink>>,
    notification_sink: Option<Box<dyn NotificationSink>>,
    descriptors: NotificationDescriptors,
    show_only_while_active: bool,
    action_set: ActionSet,
    compact_view: Vec<usize>,
    last_playback: Option<PlaybackStateUpdate>,
    last_summary: Option<NotificationSummary>,
}

impl UpdateCoalescer {
    pub fn new(descriptors: NotificationDescriptors, show_only_while_active: bool) -> Self {
        Self {
            session_sink: None,
            notification_sink: None,
            descriptors,
            show_only_while_active,
            action_set: ActionSet::default(),
            compact_view: Vec::new(),
            last_playback: None,
            last_summary: None,
        }
    }

    pub fn action_set(&self) -> &ActionSet {
        &self.action_set
    }

    pub fn compact_view(&self) -> &[usize] {
        &self.compact_view
    }

    pub fn set_session_sink(&mut self, sink: Option<Box<dyn SessionSink>>) {
        self.session_sink = sink;
        self.last_playback = None;
    }

    pub fn set_notification_sink(&mut self, sink: Option<Box<dyn NotificationSink>>) {
        self.notification_sink = sink;
        self.last_summary = None;
    }

    pub fn has_session_sink(&self) -> bool {
        self.session_sink.is_some()
    }

    pub fn has_notification_sink(&self) -> bool {
        self.notification_sink.is_some()
    }

    /// Runs the actions, playback, metadata and render passes in that order.
    pub fn update(&mut self, store: &mut StateStore, registry: &ActionRegistry) -> UpdateSummary {
        let mut summary = UpdateSummary::default();
        if !store.dirty().any() {
            return summary;
        }

        if store.dirty().actions {
            self.action_set =
                compute_action_set(store.playback_state(), registry, &self.descriptors);
            self.compact_view = select_compact_view(&self.action_set.notification_actions);
            let dirty = store.dirty_mut();
            dirty.actions = false;
            dirty.playback = true;
            dirty.render = true;
        }
        if store.dirty().metadata {
            store.dirty_mut().render = true;
        }

        if store.dirty().playback {
            summary.playback_pushed = self.push_playback(store);
        }
        if store.dirty().metadata {
            summary.metadata_pushed = self.push_metadata(store);
        }
        if store.dirty().render {
            summary.rendered = self.render(store);
        }

        debug!(
            "UpdateCoalescer: pass complete {:?}, pending {:?}",
            summary,
            store.dirty()
        );
        summary
    }

    fn push_playback(&mut self, store: &mut StateStore) -> bool {
        let Some(sink) = self.session_sink.as_mut() else {
            return false;
        };
        let position = store.position();
        let update = PlaybackStateUpdate {
            state: store.playback_state(),
            position_ms: position.position_ms,
            rate: position.rate,
            permitted_actions: self.action_set.permitted_mask,
        };
        if self.last_playback.as_ref() == Some(&update) {
            store.dirty_mut().playback = false;
            return false;
        }
        match sink.push_playback_state(&update) {
            Ok(()) => {
                self.last_playback = Some(update);
                store.dirty_mut().playback = false;
                true
            }
            Err(err) => {
                warn!("UpdateCoalescer: playback push deferred: {}", err);
                false
            }
        }
    }

    fn push_metadata(&mut self, store: &mut StateStore) -> bool {
        let Some(sink) = self.session_sink.as_mut() else {
            return false;
        };
        match sink.push_metadata(store.metadata()) {
            Ok(()) => {
                store.dirty_mut().metadata = false;
                true
            }
            Err(err) => {
                warn!("UpdateCoalescer: metadata push deferred: {}", err);
                false
            }
        }
    }

    fn render(&mut self, store: &mut StateStore) -> bool {
        if self.show_only_while_active && store.playback_state() == PlaybackState::None {
            return false;
        }
        let Some(sink) = self.notification_sink.as_mut() else {
            return false;
        };
        let metadata = store.metadata();
        let next = NotificationSummary {
            title: metadata.title.clone(),
            subtitle: notification_subtitle(&metadata.artist, &metadata.album),
            artwork: metadata.artwork.clone(),
            actions: self.action_set.notification_actions.clone(),
            compact_indices: self.compact_view.clone(),
        };
        if self.last_summary.as_ref() == Some(&next) {
            store.dirty_mut().render = false;
            return false;
        }
        match sink.render_summary(&next) {
            Ok(()) => {
                self.last_summary = Some(next);
                store.dirty_mut().render = false;
                true
            }
            Err(err) => {
                warn!("UpdateCoalescer: notification render deferred: {}", err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::actions::{ActionHandler, ActionName};
    use crate::session::sinks::recording::{recording_sinks, take_calls, SinkCall};
    use std::sync::Arc;

    fn coalescer() -> UpdateCoalescer {
        UpdateCoalescer::new(NotificationDescriptors::default(), false)
    }

    fn noop() -> ActionHandler {
        Arc::new(|_| {})
    }

    #[test]
    fn test_update_without_flags_makes_no_calls() {
        let (session, notification, calls, _) = recording_sinks();
        let mut coalescer = coalescer();
        coalescer.set_session_sink(Some(Box::new(session)));
        coalescer.set_notification_sink(Some(Box::new(notification)));
        let mut store = StateStore::new();
        let registry = ActionRegistry::new();

        let summary = coalescer.update(&mut store, &registry);
        assert_eq!(summary.sink_calls(), 0);
        assert!(take_calls(&calls).is_empty());
    }

    #[test]
    fn test_multiple_mutations_coalesce_into_one_pass() {
        let (session, notification, calls, _) = recording_sinks();
        let mut coalescer = coalescer();
        coalescer.set_session_sink(Some(Box::new(session)));
        coalescer.set_notification_sink(Some(Box::new(notification)));
        let mut store = StateStore::new();
        let registry = ActionRegistry::new();

        store.set_title("Song");
        store.set_artist("Artist");
        store.set_position(1_000);
        store.set_position(2_000);
        coalescer.update(&mut store, &registry);

        let calls = take_calls(&calls);
        assert_eq!(calls.len(), 3);
        assert!(matches!(&calls[0], SinkCall::Playback(update) if update.position_ms == 2_000));
        assert!(matches!(&calls[1], SinkCall::Metadata(metadata) if metadata.title == "Song"));
        assert!(matches!(&calls[2], SinkCall::Render(summary) if summary.subtitle == "Artist"));
        assert!(!store.dirty().any());
    }

    #[test]
    fn test_actions_flag_forces_playback_and_render() {
        let (session, notification, calls, _) = recording_sinks();
        let mut coalescer = coalescer();
        coalescer.set_session_sink(Some(Box::new(session)));
        coalescer.set_notification_sink(Some(Box::new(notification)));
        let mut store = StateStore::new();
        let mut registry = ActionRegistry::new();

        registry.register_action(ActionName::Play, noop());
        store.mark_actions_dirty();
        coalescer.update(&mut store, &registry);

        let calls = take_calls(&calls);
        assert_eq!(calls.len(), 2);
        assert!(matches!(
            &calls[0],
            SinkCall::Playback(update) if update.permitted_actions == ActionName::Play.permitted_bit()
        ));
        assert!(matches!(&calls[1], SinkCall::Render(summary) if summary.actions.len() == 1));
    }

    #[test]
    fn test_unchanged_action_set_is_not_resent() {
        let (session, notification, calls, _) = recording_sinks();
        let mut coalescer = coalescer();
        coalescer.set_session_sink(Some(Box::new(session)));
        coalescer.set_notification_sink(Some(Box::new(notification)));
        let mut store = StateStore::new();
        let mut registry = ActionRegistry::new();
        registry.register_action(ActionName::Play, noop());
        store.mark_actions_dirty();
        coalescer.update(&mut store, &registry);
        take_calls(&calls);

        registry.register("skipad", noop());
        store.mark_actions_dirty();
        let summary = coalescer.update(&mut store, &registry);
        assert_eq!(summary.sink_calls(), 0);
        assert!(!store.dirty().any());
    }

    #[test]
    fn test_missing_sinks_defer_propagation() {
        let mut coalescer = coalescer();
        let mut store = StateStore::new();
        let registry = ActionRegistry::new();
        store.set_title("Queued");
        store.set_position(500);

        coalescer.update(&mut store, &registry);
        let pending = store.dirty();
        assert!(pending.playback && pending.metadata && pending.render);

        assert!(!coalescer.has_session_sink() && !coalescer.has_notification_sink());
        let (session, notification, calls, _) = recording_sinks();
        coalescer.set_session_sink(Some(Box::new(session)));
        coalescer.set_notification_sink(Some(Box::new(notification)));
        assert!(coalescer.has_session_sink() && coalescer.has_notification_sink());
        coalescer.update(&mut store, &registry);
        assert_eq!(take_calls(&calls).len(), 3);
        assert!(!store.dirty().any());
    }

    #[test]
    fn test_failed_push_is_retried_on_next_update() {
        let (session, _, calls, available) = recording_sinks();
        let mut coalescer = coalescer();
        coalescer.set_session_sink(Some(Box::new(session)));
        let mut store = StateStore::new();
        let registry = ActionRegistry::new();

        *available.lock().unwrap() = false;
        store.set_position(750);
        coalescer.update(&mut store, &registry);
        assert!(store.dirty().playback);

        *available.lock().unwrap() = true;
        coalescer.update(&mut store, &registry);
        assert!(!store.dirty().playback);
        assert_eq!(take_calls(&calls).len(), 1);
    }

    #[test]
    fn test_render_waits_for_active_state_when_configured() {
        let (_, notification, calls, _) = recording_sinks();
        let mut coalescer = UpdateCoalescer::new(NotificationDescriptors::default(), true);
        coalescer.set_notification_sink(Some(Box::new(notification)));
        let mut store = StateStore::new();
        let registry = ActionRegistry::new();

        store.set_title("Idle");
        coalescer.update(&mut store, &registry);
        assert!(take_calls(&calls).is_empty());
        assert!(store.dirty().render);

        store.set_playback_state(PlaybackState::Playing);
        coalescer.update(&mut store, &registry);
        let calls = take_calls(&calls);
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0], SinkCall::Render(summary) if summary.title == "Idle"));
    }
}
