//! Persistent configuration model, defaults and loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::SessionError;

pub const CONFIG_FILE_NAME: &str = "nowplaying-sync.toml";

/// Root configuration persisted to `nowplaying-sync.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Media session identity and remote-control behavior.
    pub session: SessionConfig,
    #[serde(default)]
    /// Notification surface preferences.
    pub notification: NotificationConfig,
    #[serde(default)]
    /// Log output preferences.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_display_name")]
    pub display_name: String,
    #[serde(default = "default_dbus_name")]
    pub dbus_name: String,
    /// Step applied to remote seek-forward/backward presses that have no
    /// dedicated handler, in milliseconds.
    #[serde(default = "default_seek_step_ms")]
    pub seek_step_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display_name: default_display_name(),
            dbus_name: default_dbus_name(),
            seek_step_ms: default_seek_step_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NotificationConfig {
    /// Hold back the notification while nothing has been played.
    #[serde(default = "default_true")]
    pub show_only_while_active: bool,
    /// Icon/label overrides keyed by action name.
    #[serde(default)]
    pub actions: BTreeMap<String, ActionDescriptorOverride>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            show_only_while_active: true,
            actions: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct ActionDescriptorOverride {
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_display_name() -> String {
    "Now Playing".to_string()
}

fn default_dbus_name() -> String {
    "nowplaying_sync".to_string()
}

fn default_seek_step_ms() -> u64 {
    10_000
}

/// Replaces blank identity fields and clamps the seek step.
pub fn sanitize_config(config: Config) -> Config {
    let display_name = match config.session.display_name.trim() {
        "" => default_display_name(),
        name => name.to_string(),
    };
    let dbus_name = match config.session.dbus_name.trim() {
        "" => default_dbus_name(),
        name => name.to_string(),
    };

    Config {
        session: SessionConfig {
            display_name,
            dbus_name,
            seek_step_ms: config.session.seek_step_ms.clamp(1_000, 120_000),
        },
        ..config
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Parses a config document; unknown or malformed sections fall back to defaults.
pub fn parse_config(content: &str) -> Config {
    match toml::from_str::<Config>(content) {
        Ok(config) => sanitize_config(config),
        Err(err) => {
            warn!("Config: failed to parse config, using defaults: {}", err);
            Config::default()
        }
    }
}

/// Loads the config at `path`, writing the defaults first when it is missing.
pub fn load_or_create(path: &Path) -> Result<Config, SessionError> {
    if !path.exists() {
        info!(
            "Config file not found. Creating default config. path={}",
            path.display()
        );
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string(&Config::default())
            .map_err(|err| SessionError::Config(err.to_string()))?;
        std::fs::write(path, content)?;
    }

    let content = std::fs::read_to_string(path)?;
    Ok(parse_config(&content))
}
