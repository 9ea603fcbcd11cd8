//! Session owner loop.
//!
//! All mutation of a [`MediaSession`] happens on the thread running
//! [`SessionManager::run`]. Controller commands, remote-control presses and
//! engine callbacks arrive as [`Message`]s; each drained batch ends with a
//! single propagation pass.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{broadcast, mpsc};

use crate::command::SessionCommand;
use crate::error::SessionError;
use crate::protocol::{EngineCommand, EngineEvent, Message, SessionEvent};
use crate::session::actions::ActionHandler;
use crate::session::media_session::{MediaSession, PlaybackEngine};
use crate::session::sinks::{NotificationSink, NotificationSummary};

pub struct SessionManager {
    session: MediaSession,
    inbox: mpsc::UnboundedReceiver<Message>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(
        session: MediaSession,
        inbox: mpsc::UnboundedReceiver<Message>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            session,
            inbox,
            events,
        }
    }

    pub fn session(&self) -> &MediaSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut MediaSession {
        &mut self.session
    }

    /// Blocks on the inbox until the session is released or every sender is
    /// dropped.
    pub fn run(&mut self) {
        info!("SessionManager: started");
        while let Some(message) = self.inbox.blocking_recv() {
            if !self.handle_batch(message) {
                break;
            }
        }
        self.session.release();
        info!("SessionManager: stopped");
    }

    /// Handles whatever is queued without blocking. Returns `false` once the
    /// session has been released.
    pub fn process_pending(&mut self) -> bool {
        match self.inbox.try_recv() {
            Ok(message) => self.handle_batch(message),
            Err(_) => {
                self.session.update();
                !self.session.is_released()
            }
        }
    }

    fn handle_batch(&mut self, first: Message) -> bool {
        let mut running = self.handle_message(first);
        while running {
            match self.inbox.try_recv() {
                Ok(message) => running = self.handle_message(message),
                Err(_) => break,
            }
        }
        let summary = self.session.update();
        if summary.sink_calls() > 0 {
            debug!(
                "SessionManager: propagated playback={} metadata={} rendered={}",
                summary.playback_pushed, summary.metadata_pushed, summary.rendered
            );
        }
        running
    }

    fn handle_message(&mut self, message: Message) -> bool {
        match message {
            Message::Command(command) => {
                if let Err(err) = self.apply_command(command) {
                    warn!("SessionManager: command rejected: {}", err);
                    let _ = self.events.send(SessionEvent::InvalidInput {
                        reason: err.to_string(),
                    });
                }
            }
            Message::Remote(event) => {
                if !self.session.handle_remote(event) {
                    debug!("SessionManager: no handler for remote event {:?}", event);
                }
            }
            Message::Engine(EngineEvent::TrackBoundaryReached(reason)) => {
                self.session.on_track_boundary_reached(reason);
            }
            Message::Engine(EngineEvent::PlaybackStateChanged(state)) => {
                self.session.on_engine_playback_state(state);
            }
            Message::Release => self.session.release(),
        }
        !self.session.is_released()
    }

    fn apply_command(&mut self, command: SessionCommand) -> Result<(), SessionError> {
        match command {
            SessionCommand::SetMetadata {
                title,
                artist,
                album,
                artwork,
                duration_ms,
            } => {
                let duration_ms =
                    duration_ms.unwrap_or(self.session.state().metadata().duration_ms);
                self.session
                    .set_metadata(&title, &artist, &album, artwork, duration_ms);
            }
            SessionCommand::SetPlaybackState(state) => self.session.set_playback_state(state),
            SessionCommand::SetPositionState {
                duration_ms,
                position_ms,
                rate,
            } => self
                .session
                .set_position_state(duration_ms, position_ms, rate)?,
            SessionCommand::SetActionHandler(name) => {
                let handler = forwarding_handler(self.events.clone());
                self.session.register_action_handler(&name, handler);
            }
            SessionCommand::ClearActionHandler(name) => self.session.clear_action_handler(&name),
            SessionCommand::SetPlaylist(tracks) => self.session.set_playlist(tracks)?,
            SessionCommand::AddTrack(track) => self.session.add_track(track)?,
            SessionCommand::RemoveTrack(id) => self.session.remove_track(&id),
            SessionCommand::PlayById(id) => self.session.play_by_id(&id),
            SessionCommand::PlayNext => self.session.play_next(),
            SessionCommand::PlayPrevious => self.session.play_previous(),
            SessionCommand::Play => self.session.play(),
            SessionCommand::PlayUri(request) => self.session.play_uri(request)?,
            SessionCommand::Pause => self.session.pause(),
            SessionCommand::Stop => self.session.stop(),
            SessionCommand::SetVolume(volume) => self.session.set_volume(volume)?,
            SessionCommand::SeekTo(position_ms) => self.session.seek_to(position_ms),
            SessionCommand::TrackBoundaryReached(reason) => {
                self.session.on_track_boundary_reached(reason)
            }
            SessionCommand::EnginePlaybackState(state) => {
                self.session.on_engine_playback_state(state)
            }
            SessionCommand::Release => self.session.release(),
        }
        Ok(())
    }
}

/// Handler that reports every invocation back to the controller.
fn forwarding_handler(events: broadcast::Sender<SessionEvent>) -> ActionHandler {
    Arc::new(move |details| {
        let _ = events.send(SessionEvent::ActionInvoked(*details));
    })
}

/// Engine living outside the process. Commands go out on a dedicated
/// unbounded channel, so a slow event consumer never drops a queue reload.
pub struct ChannelEngine {
    requests: mpsc::UnboundedSender<EngineCommand>,
}

impl ChannelEngine {
    pub fn new(requests: mpsc::UnboundedSender<EngineCommand>) -> Self {
        Self { requests }
    }
}

impl PlaybackEngine for ChannelEngine {
    fn execute(&mut self, command: &EngineCommand) -> Result<(), String> {
        self.requests
            .send(command.clone())
            .map_err(|_| "engine channel closed".to_string())
    }
}

/// Notification surface for headless hosts: renders into the log.
#[derive(Debug, Default)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn render_summary(&mut self, summary: &NotificationSummary) -> Result<(), String> {
        let actions: Vec<&str> = summary
            .actions
            .iter()
            .map(|entry| entry.action.as_str())
            .collect();
        info!(
            "Notification: '{}' / '{}' actions=[{}] compact={:?}",
            summary.title,
            summary.subtitle,
            actions.join(", "),
            summary.compact_indices
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::decode_command;
    use crate::config::Config;
    use crate::playlist::Track;
    use crate::protocol::{BoundaryReason, RemoteControlEvent};
    use crate::session::actions::ActionName;
    use crate::session::sinks::recording::{recording_sinks, take_calls, CallLog, SinkCall};
    use crate::session::state_store::PlaybackState;
    use tokio::sync::broadcast::error::TryRecvError;

    struct Harness {
        manager: SessionManager,
        inbox: mpsc::UnboundedSender<Message>,
        events: broadcast::Receiver<SessionEvent>,
        engine: mpsc::UnboundedReceiver<EngineCommand>,
        calls: CallLog,
    }

    fn harness() -> Harness {
        let mut config = Config::default();
        config.notification.show_only_while_active = false;
        let (events_tx, events) = broadcast::channel(64);
        let (inbox, inbox_rx) = mpsc::unbounded_channel();
        let mut session = MediaSession::new(&config, events_tx.clone());
        let (session_sink, notification_sink, calls, _) = recording_sinks();
        session.connect_session_sink(Box::new(session_sink));
        session.connect_notification_sink(Box::new(notification_sink));
        let (engine_tx, engine) = mpsc::unbounded_channel();
        session.attach_engine(Box::new(ChannelEngine::new(engine_tx)));
        Harness {
            manager: SessionManager::new(session, inbox_rx, events_tx),
            inbox,
            events,
            engine,
            calls,
        }
    }

    fn send_json(h: &Harness, payload: &str) {
        let command = decode_command(payload).unwrap();
        h.inbox.send(Message::Command(command)).unwrap();
    }

    fn drain_events(receiver: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        loop {
            match receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
        events
    }

    #[test]
    fn test_batch_of_commands_coalesces_into_one_metadata_push() {
        let mut h = harness();
        h.manager.process_pending();
        take_calls(&h.calls);

        send_json(&h, r#"{"command":"setMetadata","title":"A"}"#);
        send_json(&h, r#"{"command":"setMetadata","title":"B"}"#);
        send_json(&h, r#"{"command":"setMetadata","title":"C","duration":120}"#);
        assert!(h.manager.process_pending());

        let metadata: Vec<String> = take_calls(&h.calls)
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::Metadata(metadata) => Some(metadata.title),
                _ => None,
            })
            .collect();
        assert_eq!(metadata, vec!["C"]);
        assert_eq!(h.manager.session().state().metadata().duration_ms, 120_000);
    }

    #[test]
    fn test_metadata_without_duration_keeps_previous_duration() {
        let mut h = harness();
        send_json(&h, r#"{"command":"setMetadata","title":"A","duration":90}"#);
        send_json(&h, r#"{"command":"setMetadata","title":"B"}"#);
        h.manager.process_pending();
        assert_eq!(h.manager.session().state().metadata().duration_ms, 90_000);
    }

    #[test]
    fn test_remote_press_reaches_controller_handler() {
        let mut h = harness();
        send_json(&h, r#"{"command":"setActionHandler","action":"nexttrack"}"#);
        h.inbox
            .send(Message::Remote(RemoteControlEvent::Action(ActionName::NextTrack)))
            .unwrap();
        h.manager.process_pending();

        let events = drain_events(&mut h.events);
        assert!(events.iter().any(|event| matches!(
            event,
            SessionEvent::ActionInvoked(details) if details.action == ActionName::NextTrack
        )));
    }

    #[test]
    fn test_invalid_command_is_reported_and_state_kept() {
        let mut h = harness();
        send_json(&h, r#"{"command":"setPositionState","duration":10,"position":2}"#);
        h.manager.process_pending();
        drain_events(&mut h.events);

        h.inbox
            .send(Message::Command(SessionCommand::SetVolume(4.0)))
            .unwrap();
        h.manager.process_pending();
        let events = drain_events(&mut h.events);
        assert!(events
            .iter()
            .any(|event| matches!(event, SessionEvent::InvalidInput { .. })));
        assert_eq!(h.manager.session().state().position().position_ms, 2_000);
    }

    #[test]
    fn test_engine_requests_use_their_own_channel() {
        let mut h = harness();
        h.inbox
            .send(Message::Command(SessionCommand::SetPlaylist(vec![
                Track {
                    id: "a".to_string(),
                    uri: "file:///a.ogg".to_string(),
                    title: String::new(),
                    artist: String::new(),
                },
                Track {
                    id: "b".to_string(),
                    uri: "file:///b.ogg".to_string(),
                    title: String::new(),
                    artist: String::new(),
                },
            ])))
            .unwrap();
        h.inbox
            .send(Message::Engine(EngineEvent::TrackBoundaryReached(
                BoundaryReason::Auto,
            )))
            .unwrap();
        h.manager.process_pending();

        let mut requests = Vec::new();
        while let Ok(request) = h.engine.try_recv() {
            requests.push(request);
        }
        assert!(matches!(requests[0], EngineCommand::LoadQueue { .. }));
        assert_eq!(requests[1], EngineCommand::PlayIndex { index: 1 });

        let events = drain_events(&mut h.events);
        assert!(!events
            .iter()
            .any(|event| matches!(event, SessionEvent::EngineRequest { .. })));
        assert!(events.contains(&SessionEvent::TrackChanged {
            id: "b".to_string()
        }));
    }

    #[test]
    fn test_closed_engine_channel_reports_failure() {
        let mut h = harness();
        h.engine.close();
        send_json(&h, r#"{"command":"play","url":"https://a/b.mp3","title":"B","startTime":1000}"#);
        h.manager.process_pending();
        let events = drain_events(&mut h.events);
        assert!(events.iter().any(|event| matches!(
            event,
            SessionEvent::EngineFailure { command, .. } if command == "playUri"
        )));
        assert_eq!(h.manager.session().state().metadata().title, "");
    }

    #[test]
    fn test_handlers_registered_directly_receive_remote_presses() {
        let mut h = harness();
        let pressed = Arc::new(std::sync::Mutex::new(0));
        let counter = Arc::clone(&pressed);
        h.manager.session_mut().register_action_handler(
            "stop",
            Arc::new(move |_| *counter.lock().unwrap() += 1),
        );
        h.inbox
            .send(Message::Remote(RemoteControlEvent::Action(ActionName::Stop)))
            .unwrap();
        h.manager.process_pending();
        assert_eq!(*pressed.lock().unwrap(), 1);
        assert!(h.manager.session().action_set().contains(ActionName::Stop));
    }

    #[test]
    fn test_release_stops_processing() {
        let mut h = harness();
        h.inbox.send(Message::Release).unwrap();
        h.inbox
            .send(Message::Command(SessionCommand::SetPlaybackState(
                PlaybackState::Playing,
            )))
            .unwrap();
        assert!(!h.manager.process_pending());
        assert!(h.manager.session().is_released());
        assert_eq!(
            h.manager.session().state().playback_state(),
            PlaybackState::None
        );
    }

    #[test]
    fn test_run_exits_when_senders_are_dropped() {
        let h = harness();
        let Harness {
            mut manager, inbox, ..
        } = h;
        inbox
            .send(Message::Command(SessionCommand::SetPlaybackState(
                PlaybackState::Paused,
            )))
            .unwrap();
        drop(inbox);
        manager.run();
        assert!(manager.session().is_released());
    }
}
