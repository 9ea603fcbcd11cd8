//! The session facade: the inbound command surface for one now-playing context.
//!
//! `MediaSession` owns the state store, handler registry, update coalescer and
//! playlist navigator. It is single-owner; callers on other threads go through
//! the session manager queue instead of touching it directly.

use log::{debug, info, warn};
use tokio::sync::broadcast;

use crate::command::validate_track;
use crate::config::Config;
use crate::error::SessionError;
use crate::playlist::{PlaylistNavigator, Track};
use crate::protocol::{
    BoundaryReason, EngineCommand, PlayRequest, RemoteControlEvent, SessionEvent,
};
use crate::session::action_set::{ActionSet, NotificationDescriptors};
use crate::session::actions::{ActionHandler, ActionName, ActionPayload, ActionRegistry};
use crate::session::coalescer::{UpdateCoalescer, UpdateSummary};
use crate::session::sinks::{NotificationSink, SessionSink};
use crate::session::state_store::{ArtworkRef, PlaybackState, StateStore};

/// The audio/video engine the queue is mirrored into.
pub trait PlaybackEngine {
    fn execute(&mut self, command: &EngineCommand) -> Result<(), String>;
}

pub struct MediaSession {
    store: StateStore,
    registry: ActionRegistry,
    coalescer: UpdateCoalescer,
    playlist: PlaylistNavigator,
    engine: Option<Box<dyn PlaybackEngine>>,
    events: broadcast::Sender<SessionEvent>,
    seek_step_ms: u64,
    released: bool,
}

impl MediaSession {
    pub fn new(config: &Config, events: broadcast::Sender<SessionEvent>) -> Self {
        let descriptors = NotificationDescriptors::with_overrides(&config.notification.actions);
        Self {
            store: StateStore::new(),
            registry: ActionRegistry::new(),
            coalescer: UpdateCoalescer::new(
                descriptors,
                config.notification.show_only_while_active,
            ),
            playlist: PlaylistNavigator::new(),
            engine: None,
            events,
            seek_step_ms: config.session.seek_step_ms,
            released: false,
        }
    }

    pub fn state(&self) -> &StateStore {
        &self.store
    }

    pub fn action_set(&self) -> &ActionSet {
        self.coalescer.action_set()
    }

    pub fn compact_view(&self) -> &[usize] {
        self.coalescer.compact_view()
    }

    pub fn playlist(&self) -> &PlaylistNavigator {
        &self.playlist
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn connect_session_sink(&mut self, sink: Box<dyn SessionSink>) {
        if self.released {
            return;
        }
        self.coalescer.set_session_sink(Some(sink));
        let dirty = self.store.dirty_mut();
        dirty.playback = true;
        dirty.metadata = true;
    }

    pub fn disconnect_session_sink(&mut self) {
        self.coalescer.set_session_sink(None);
    }

    pub fn connect_notification_sink(&mut self, sink: Box<dyn NotificationSink>) {
        if self.released {
            return;
        }
        self.coalescer.set_notification_sink(Some(sink));
        self.store.dirty_mut().render = true;
    }

    pub fn disconnect_notification_sink(&mut self) {
        self.coalescer.set_notification_sink(None);
    }

    pub fn attach_engine(&mut self, engine: Box<dyn PlaybackEngine>) {
        if self.released {
            return;
        }
        self.engine = Some(engine);
        if !self.playlist.is_empty() {
            let reload = EngineCommand::LoadQueue {
                tracks: self.playlist.tracks_in_order(),
                current_index: self.playlist.current_index(),
            };
            self.run_engine(vec![reload]);
        }
    }

    /// Artwork is compared by handle identity here; `set_artwork` always
    /// counts as a change.
    pub fn set_metadata(
        &mut self,
        title: &str,
        artist: &str,
        album: &str,
        artwork: Option<ArtworkRef>,
        duration_ms: u64,
    ) {
        if self.released {
            return;
        }
        self.store.set_title(title);
        self.store.set_artist(artist);
        self.store.set_album(album);
        self.store.set_duration(duration_ms);
        if self.store.metadata().artwork != artwork {
            self.store.set_artwork(artwork);
        }
    }

    pub fn set_artwork(&mut self, artwork: Option<ArtworkRef>) {
        if self.released {
            return;
        }
        self.store.set_artwork(artwork);
    }

    pub fn set_playback_state(&mut self, state: PlaybackState) {
        if self.released {
            return;
        }
        self.store.set_playback_state(state);
    }

    pub fn set_position_state(
        &mut self,
        duration_ms: u64,
        position_ms: u64,
        rate: f32,
    ) -> Result<(), SessionError> {
        if self.released {
            return Ok(());
        }
        if !rate.is_finite() {
            return Err(SessionError::invalid("playback rate must be finite"));
        }
        if duration_ms > 0 && position_ms > duration_ms {
            return Err(SessionError::invalid(format!(
                "position {position_ms}ms exceeds duration {duration_ms}ms"
            )));
        }
        self.store.set_duration(duration_ms);
        self.store.set_position(position_ms);
        self.store.set_playback_speed(rate);
        Ok(())
    }

    pub fn register_action_handler(&mut self, name: &str, handler: ActionHandler) {
        if self.released {
            return;
        }
        self.registry.register(name, handler);
        self.store.mark_actions_dirty();
    }

    pub fn clear_action_handler(&mut self, name: &str) {
        if self.released {
            return;
        }
        if self.registry.clear(name) {
            self.store.mark_actions_dirty();
        }
    }

    pub fn has_handler(&self, action: ActionName) -> bool {
        self.registry.has_handler(action)
    }

    pub fn dispatch(&self, action: ActionName, payload: ActionPayload) -> bool {
        if self.released {
            return false;
        }
        self.registry.dispatch(action, payload)
    }

    /// Resolves a remote-control press against current state and dispatches it.
    pub fn handle_remote(&self, event: RemoteControlEvent) -> bool {
        match event {
            RemoteControlEvent::Action(action) => self.dispatch(action, ActionPayload::None),
            RemoteControlEvent::Toggle => {
                let action = if self.store.playback_state().is_playing() {
                    ActionName::Pause
                } else {
                    ActionName::Play
                };
                self.dispatch(action, ActionPayload::None)
            }
            RemoteControlEvent::SeekStep { forward } => {
                let action = if forward {
                    ActionName::SeekForward
                } else {
                    ActionName::SeekBackward
                };
                if self.registry.has_handler(action) {
                    return self.dispatch(action, ActionPayload::None);
                }
                self.dispatch_seek_relative(forward, self.seek_step_ms)
            }
            RemoteControlEvent::SeekBy { forward, delta_ms } => {
                self.dispatch_seek_relative(forward, delta_ms)
            }
            RemoteControlEvent::SetPosition { position_ms } => self.dispatch(
                ActionName::SeekTo,
                ActionPayload::SeekToMs(self.clamp_to_duration(position_ms)),
            ),
        }
    }

    pub fn set_playlist(&mut self, tracks: Vec<Track>) -> Result<(), SessionError> {
        if self.released {
            return Ok(());
        }
        for track in &tracks {
            validate_track(track)?;
        }
        self.navigate(|playlist| playlist.set_playlist(tracks));
        Ok(())
    }

    pub fn add_track(&mut self, track: Track) -> Result<(), SessionError> {
        if self.released {
            return Ok(());
        }
        validate_track(&track)?;
        self.navigate(|playlist| playlist.add(track));
        Ok(())
    }

    pub fn remove_track(&mut self, id: &str) {
        self.navigate(|playlist| playlist.remove(id));
    }

    pub fn play_by_id(&mut self, id: &str) {
        self.navigate(|playlist| playlist.play_by_id(id));
    }

    pub fn play_next(&mut self) {
        self.navigate(PlaylistNavigator::play_next);
    }

    pub fn play_previous(&mut self) {
        self.navigate(PlaylistNavigator::play_previous);
    }

    pub fn on_track_boundary_reached(&mut self, reason: BoundaryReason) {
        self.navigate(|playlist| playlist.on_track_boundary_reached(reason));
    }

    pub fn on_engine_playback_state(&mut self, state: PlaybackState) {
        if self.released {
            return;
        }
        let event = match state {
            PlaybackState::Playing => SessionEvent::PlaybackStarted,
            PlaybackState::Paused | PlaybackState::None => SessionEvent::PlaybackEnded,
        };
        self.emit(event);
    }

    pub fn play(&mut self) {
        self.transport(EngineCommand::Play);
    }

    /// Loads and plays a single URI outside the queue. Once the engine accepts
    /// it, title, artist and artwork of the request become the published metadata.
    pub fn play_uri(&mut self, request: PlayRequest) -> Result<(), SessionError> {
        if self.released {
            return Ok(());
        }
        if request.uri.trim().is_empty() {
            return Err(SessionError::invalid("play uri must not be empty"));
        }
        let rejected = self.run_engine(vec![EngineCommand::PlayUri(request.clone())]);
        if !rejected.is_empty() {
            return Ok(());
        }
        self.store.set_title(&request.title);
        self.store.set_artist(&request.artist);
        if self.store.metadata().artwork != request.artwork {
            self.store.set_artwork(request.artwork);
        }
        Ok(())
    }

    pub fn pause(&mut self) {
        self.transport(EngineCommand::Pause);
    }

    pub fn stop(&mut self) {
        self.transport(EngineCommand::Stop);
    }

    pub fn seek_to(&mut self, position_ms: u64) {
        self.transport(EngineCommand::SeekTo { position_ms });
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<(), SessionError> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(SessionError::invalid(format!(
                "volume {volume} outside [0, 1]"
            )));
        }
        self.transport(EngineCommand::SetVolume { volume });
        Ok(())
    }

    /// Propagates everything raised since the previous pass.
    pub fn update(&mut self) -> UpdateSummary {
        if self.released {
            return UpdateSummary::default();
        }
        self.coalescer.update(&mut self.store, &self.registry)
    }

    /// Ends the session. Later calls are no-ops and nothing propagates.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        info!("MediaSession: released");
        self.released = true;
        self.coalescer.set_session_sink(None);
        self.coalescer.set_notification_sink(None);
        self.engine = None;
        self.registry.clear_all();
        self.playlist.clear();
        self.emit(SessionEvent::Released);
    }

    fn transport(&mut self, command: EngineCommand) {
        if self.released {
            return;
        }
        self.run_engine(vec![command]);
    }

    fn navigate<F>(&mut self, operation: F)
    where
        F: FnOnce(&mut PlaylistNavigator) -> Vec<EngineCommand>,
    {
        if self.released {
            return;
        }
        let previous_index = self.playlist.current_index();
        let previous_id = self.playlist.current_track().map(|track| track.id.clone());
        let commands = operation(&mut self.playlist);
        let rejected = self.run_engine(commands);
        if rejected.iter().any(EngineCommand::changes_position) {
            debug!("MediaSession: engine stayed put, restoring queue position");
            self.playlist.restore_current_index(previous_index);
            return;
        }

        let Some(track) = self.playlist.current_track() else {
            return;
        };
        if previous_id.as_deref() == Some(track.id.as_str()) {
            return;
        }
        let (id, title, artist) = (track.id.clone(), track.title.clone(), track.artist.clone());
        self.store.set_title(&title);
        self.store.set_artist(&artist);
        self.emit(SessionEvent::TrackChanged { id });
    }

    /// Runs `commands` in order and returns the ones the engine refused.
    fn run_engine(&mut self, commands: Vec<EngineCommand>) -> Vec<EngineCommand> {
        if commands.is_empty() {
            return Vec::new();
        }
        let Some(engine) = self.engine.as_mut() else {
            debug!(
                "MediaSession: no engine attached, dropping {} command(s)",
                commands.len()
            );
            return Vec::new();
        };
        let mut rejected = Vec::new();
        let mut failures = Vec::new();
        for command in commands {
            if let Err(reason) = engine.execute(&command) {
                warn!(
                    "MediaSession: engine rejected {}: {}",
                    command.name(),
                    reason
                );
                failures.push(SessionEvent::EngineFailure {
                    command: command.name().to_string(),
                    reason,
                });
                rejected.push(command);
            }
        }
        for failure in failures {
            self.emit(failure);
        }
        rejected
    }

    fn dispatch_seek_relative(&self, forward: bool, delta_ms: u64) -> bool {
        let position_ms = self.store.position().position_ms;
        let target_ms = if forward {
            position_ms.saturating_add(delta_ms)
        } else {
            position_ms.saturating_sub(delta_ms)
        };
        self.dispatch(
            ActionName::SeekTo,
            ActionPayload::SeekToMs(self.clamp_to_duration(target_ms)),
        )
    }

    fn clamp_to_duration(&self, position_ms: u64) -> u64 {
        match self.store.metadata().duration_ms {
            0 => position_ms,
            duration_ms => position_ms.min(duration_ms),
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
