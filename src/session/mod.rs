//! Now-playing session core: state, actions and propagation.

pub mod action_set;
pub mod actions;
pub mod coalescer;
pub mod media_session;
pub mod sinks;
pub mod state_store;

pub use action_set::{ActionSet, NotificationAction, NotificationActionDescriptor};
pub use actions::{ActionDetails, ActionHandler, ActionName, ActionPayload, ActionRegistry};
pub use coalescer::UpdateSummary;
pub use media_session::{MediaSession, PlaybackEngine};
pub use sinks::{NotificationSink, NotificationSummary, PlaybackStateUpdate, SessionSink};
pub use state_store::{ArtworkRef, MediaMetadata, PlaybackState, StateStore};
