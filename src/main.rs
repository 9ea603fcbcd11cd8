use std::io::{self, BufRead, Write};
use std::thread;

use log::{debug, info, warn};
use tokio::sync::{broadcast, mpsc};

use nowplaying_sync::config::{default_config_path, load_or_create, Config};
use nowplaying_sync::media_controls_manager::MediaControlsSink;
use nowplaying_sync::session_manager::{ChannelEngine, LogNotificationSink};
use nowplaying_sync::{
    decode_command, EngineCommand, MediaSession, Message, SessionEvent, SessionManager,
};

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "non-string panic payload".to_string()
}

fn load_config() -> Config {
    let Some(path) = default_config_path() else {
        return Config::default();
    };
    match load_or_create(&path) {
        Ok(config) => config,
        Err(err) => {
            warn!(
                "Failed to load config, using defaults. path={} error={}",
                path.display(),
                err
            );
            Config::default()
        }
    }
}

fn print_event(event: &SessionEvent) {
    match serde_json::to_string(event) {
        Ok(line) => {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{}", line);
            let _ = out.flush();
        }
        Err(err) => warn!("Failed to encode event: {}", err),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Trace);
    clog.init();

    let config = load_config();
    log::set_max_level(config.logging.level.level_filter());

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let (events_sender, _) = broadcast::channel::<SessionEvent>(256);
    let (inbox_sender, inbox_receiver) = mpsc::unbounded_channel::<Message>();

    // Controller-facing event stream, one JSON object per line
    let mut event_receiver = events_sender.subscribe();
    let printer = thread::spawn(move || loop {
        match event_receiver.blocking_recv() {
            Ok(event) => {
                print_event(&event);
                if event == SessionEvent::Released {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Event printer lagged by {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    });

    // Engine requests, printed in order and never dropped
    let (engine_sender, mut engine_receiver) = mpsc::unbounded_channel::<EngineCommand>();
    let engine_relay = thread::spawn(move || {
        while let Some(request) = engine_receiver.blocking_recv() {
            print_event(&SessionEvent::EngineRequest { request });
        }
    });

    // Session owner thread
    let manager_events = events_sender.clone();
    let manager_inbox = inbox_sender.clone();
    let manager_config = config.clone();
    let manager = thread::spawn(move || {
        let run_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut session = MediaSession::new(&manager_config, manager_events.clone());
            match MediaControlsSink::new(&manager_config.session, manager_inbox) {
                Some(sink) => session.connect_session_sink(Box::new(sink)),
                None => info!("Media controls unavailable; session sink left disconnected"),
            }
            session.connect_notification_sink(Box::new(LogNotificationSink));
            session.attach_engine(Box::new(ChannelEngine::new(engine_sender)));

            let mut session_manager = SessionManager::new(session, inbox_receiver, manager_events);
            session_manager.run();
        }));
        if let Err(payload) = run_result {
            log::error!(
                "SessionManager thread terminated due to panic: {}",
                panic_payload_to_string(payload.as_ref())
            );
        }
    });

    info!("Reading commands from stdin");
    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match decode_command(&line) {
            Ok(command) => {
                debug!("Command received: {:?}", command);
                if inbox_sender.send(Message::Command(command)).is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!("Rejected command: {}", err);
                let _ = events_sender.send(SessionEvent::InvalidInput {
                    reason: err.to_string(),
                });
            }
        }
    }

    let _ = inbox_sender.send(Message::Release);
    drop(inbox_sender);
    let _ = manager.join();
    let _ = engine_relay.join();
    drop(events_sender);
    let _ = printer.join();

    info!("Application exiting");
    Ok(())
}
