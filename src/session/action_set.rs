//! Valid-action computation and compact-view selection.

use std::collections::BTreeMap;

use crate::config::ActionDescriptorOverride;
use crate::session::actions::{ActionName, ActionRegistry, ACTION_COUNT};
use crate::session::state_store::PlaybackState;

/// Actions eligible for the collapsed notification view.
pub const COMPACT_VIEW_ALLOWLIST: [ActionName; 5] = [
    ActionName::PreviousTrack,
    ActionName::Play,
    ActionName::Pause,
    ActionName::NextTrack,
    ActionName::Stop,
];

pub const COMPACT_VIEW_CAP: usize = 3;

/// How a notification button for an action is drawn and what it triggers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NotificationActionDescriptor {
    pub icon: String,
    pub label: String,
    pub trigger: String,
}

impl NotificationActionDescriptor {
    fn builtin(action: ActionName, icon: &str, label: &str) -> Self {
        Self {
            icon: icon.to_string(),
            label: label.to_string(),
            trigger: action.as_str().to_string(),
        }
    }
}

/// Descriptor table indexed by action. `seekto` has no button by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDescriptors {
    table: [Option<NotificationActionDescriptor>; ACTION_COUNT],
}

impl Default for NotificationDescriptors {
    fn default() -> Self {
        let table = ActionName::ALL.map(|action| {
            let (icon, label) = match action {
                ActionName::PreviousTrack => ("ic_media_previous", "Previous"),
                ActionName::SeekBackward => ("ic_media_rew", "Rewind"),
                ActionName::Play => ("ic_media_play", "Play"),
                ActionName::Pause => ("ic_media_pause", "Pause"),
                ActionName::SeekForward => ("ic_media_ff", "Fast forward"),
                ActionName::NextTrack => ("ic_media_next", "Next"),
                ActionName::Stop => ("ic_menu_close_clear_cancel", "Stop"),
                ActionName::SeekTo => return None,
            };
            Some(NotificationActionDescriptor::builtin(action, icon, label))
        });
        Self { table }
    }
}

impl NotificationDescriptors {
    /// Builds the default table and applies per-action icon/label overrides.
    /// Overrides for names outside the fixed set are ignored.
    pub fn with_overrides(overrides: &BTreeMap<String, ActionDescriptorOverride>) -> Self {
        let mut descriptors = Self::default();
        for (name, entry) in overrides {
            let Some(action) = ActionName::parse(name) else {
                log::warn!("NotificationDescriptors: ignoring override for unknown action '{name}'");
                continue;
            };
            let slot = &mut descriptors.table[action.index()];
            let descriptor = slot.get_or_insert_with(|| {
                NotificationActionDescriptor::builtin(action, "", action.as_str())
            });
            if let Some(icon) = &entry.icon {
                descriptor.icon = icon.clone();
            }
            if let Some(label) = &entry.label {
                descriptor.label = label.clone();
            }
        }
        descriptors
    }

    pub fn get(&self, action: ActionName) -> Option<&NotificationActionDescriptor> {
        self.table[action.index()].as_ref()
    }
}

/// One button in the full notification action list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NotificationAction {
    pub action: ActionName,
    pub descriptor: NotificationActionDescriptor,
}

/// Result of one action-set computation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSet {
    pub valid: Vec<ActionName>,
    pub permitted_mask: u64,
    pub notification_actions: Vec<NotificationAction>,
}

impl ActionSet {
    pub fn contains(&self, action: ActionName) -> bool {
        self.valid.contains(&action)
    }
}

/// State filter: `play` only when not playing, `pause` only when playing.
pub fn passes_state_filter(action: ActionName, state: PlaybackState) -> bool {
    match action {
        ActionName::Play => !state.is_playing(),
        ActionName::Pause => state.is_playing(),
        _ => true,
    }
}

pub fn compute_action_set(
    state: PlaybackState,
    registry: &ActionRegistry,
    descriptors: &NotificationDescriptors,
) -> ActionSet {
    let mut set = ActionSet::default();
    for action in ActionName::ALL {
        if !registry.has_handler(action) || !passes_state_filter(action, state) {
            continue;
        }
        set.valid.push(action);
        set.permitted_mask |= action.permitted_bit();
        if let Some(descriptor) = descriptors.get(action) {
            set.notification_actions.push(NotificationAction {
                action,
                descriptor: descriptor.clone(),
            });
        }
    }
    set
}

/// Positions within `actions` that the collapsed view shows.
pub fn select_compact_view(actions: &[NotificationAction]) -> Vec<usize> {
    actions
        .iter()
        .enumerate()
        .filter(|(_, entry)| COMPACT_VIEW_ALLOWLIST.contains(&entry.action))
        .map(|(position, _)| position)
        .take(COMPACT_VIEW_CAP)
        .collect()
}
