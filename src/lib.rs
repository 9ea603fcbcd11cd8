//! Now-playing session sync: keeps system media controls and a persistent
//! notification consistent with a controller's playback state.

pub mod command;
pub mod config;
pub mod error;
pub mod media_controls_manager;
pub mod playlist;
pub mod protocol;
pub mod session;
pub mod session_manager;

pub use command::{decode_command, SessionCommand};
pub use config::Config;
pub use error::SessionError;
pub use playlist::{PlaylistNavigator, Track};
pub use protocol::{EngineCommand, Message, SessionEvent};
pub use session::MediaSession;
pub use session_manager::SessionManager;
