use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub realtime: RealtimeSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String { "http://localhost:8080/api".to_string() }
fn default_timeout_secs() -> u64 { 10 }

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeSettings {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_game_ws_url")]
    pub game_ws_url: String,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_incoming_ms: u64,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_outgoing_ms: u64,
    #[serde(default = "default_game_reconnect_delay_ms")]
    pub game_reconnect_delay_ms: u64,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            game_ws_url: default_game_ws_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            heartbeat_incoming_ms: default_heartbeat_ms(),
            heartbeat_outgoing_ms: default_heartbeat_ms(),
            game_reconnect_delay_ms: default_game_reconnect_delay_ms(),
        }
    }
}

impl RealtimeSettings {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn game_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.game_reconnect_delay_ms)
    }
}

fn default_ws_url() -> String { "ws://localhost:8080/ws".to_string() }
fn default_game_ws_url() -> String { "ws://localhost:8080/ws/game".to_string() }
fn default_reconnect_delay_ms() -> u64 { 1000 }
fn default_max_reconnect_attempts() -> u32 { 5 }
fn default_heartbeat_ms() -> u64 { 4000 }
fn default_game_reconnect_delay_ms() -> u64 { 3000 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSettings {
    /// JSON file backing the token store. In-memory when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_visibility_refresh_secs")]
    pub visibility_refresh_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            visibility_refresh_secs: default_visibility_refresh_secs(),
        }
    }
}

// Tokens live 24h; refresh an hour early.
fn default_refresh_interval_secs() -> u64 { 23 * 60 * 60 }
fn default_visibility_refresh_secs() -> u64 { 60 * 60 }

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            max_entries: default_cache_max_entries(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 { 300 }
fn default_cache_max_entries() -> u64 { 64 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            realtime: RealtimeSettings::default(),
            storage: StorageSettings::default(),
            session: SessionSettings::default(),
            cache: CacheSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with GAMEVERSE__)
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., GAMEVERSE__API__BASE_URL -> api.base_url
            .add_source(
                Environment::with_prefix("GAMEVERSE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("GAMEVERSE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
