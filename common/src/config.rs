// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use config::{Config as ConfigFile, File, Environment};
use thiserror::Error;
use url::Url;

/// Central configuration for the chat client
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Production builds only log warnings and errors
    pub production: bool,
    pub api: ApiConfig,
    pub websocket: WebSocketConfig,
    pub inactivity: InactivityConfig,
    pub chat: ChatConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketConfig {
    pub url: String,
    pub keep_alive_interval_ms: u64,
    /// Tear the connection down when nothing arrives for this long.
    /// `None` keeps the keep-alive fire-and-forget.
    pub pong_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct InactivityConfig {
    pub timeout_minutes: u64,
    pub warning_seconds: u32,
    pub check_activity_interval_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatTransportKind {
    Websocket,
    Http,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub lang: String,
    pub transport: ChatTransportKind,
    pub greeting: Option<String>,
}

/// A configuration that loaded but cannot be used
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigInvalid {
    #[error("keep-alive interval must be greater than zero")]
    ZeroKeepAlive,
    #[error("warning window must be at least one second")]
    ZeroWarning,
    #[error("{field} is not a valid URL: {value}")]
    BadUrl { field: &'static str, value: String },
    #[error("{field} must use one of {expected:?}, got {scheme}")]
    BadScheme {
        field: &'static str,
        expected: &'static [&'static str],
        scheme: String,
    },
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000/dev".to_string(),
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3001".to_string(),
            keep_alive_interval_ms: 300_000,
            pong_timeout_ms: None,
        }
    }
}

impl Default for InactivityConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: 15,
            warning_seconds: 60,
            check_activity_interval_ms: 1_000,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            lang: "es".to_string(),
            transport: ChatTransportKind::Websocket,
            greeting: Some("Hola, ¿en qué puedo ayudarte hoy?".to_string()),
        }
    }
}

impl InactivityConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_minutes * 60 * 1000)
    }

    pub fn warning_duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.warning_seconds) * 1000)
    }

    pub fn check_activity_interval(&self) -> Duration {
        Duration::from_millis(self.check_activity_interval_ms)
    }
}

impl WebSocketConfig {
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_millis(self.keep_alive_interval_ms)
    }

    pub fn pong_timeout(&self) -> Option<Duration> {
        self.pong_timeout_ms.map(Duration::from_millis)
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Works from the workspace root and from a member crate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        Self::load_from(&config_dir, &run_mode)
    }

    /// Layer `default.toml`, `{run_mode}.toml` and `local.toml` from
    /// `config_dir`, then `APP__*` variables
    pub fn load_from(config_dir: &Path, run_mode: &str) -> Result<Self, config::ConfigError> {
        let config = ConfigFile::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // APP__WEBSOCKET__URL, APP__INACTIVITY__TIMEOUT_MINUTES, ...
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Like `from_env`, but hands the load error back instead of logging
    /// it, for callers that install tracing from the loaded settings
    pub fn resolve() -> (Self, Option<config::ConfigError>) {
        match Self::load() {
            Ok(config) => (config, None),
            Err(e) => {
                let mut config = Self::default();
                if let Ok(url) = env::var("CHAT_WS_URL") {
                    config.websocket.url = url;
                }
                if let Ok(base_url) = env::var("CHAT_API_BASE_URL") {
                    config.api.base_url = base_url;
                }
                (config, Some(e))
            }
        }
    }

    /// Load from files, falling back to defaults plus a few direct variables
    pub fn from_env() -> Self {
        let (config, error) = Self::resolve();
        match error {
            Some(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to defaults and environment variables");
            },
            None => tracing::info!("Configuration loaded from files and environment"),
        }
        config
    }

    /// Reject settings that would make the session unusable
    pub fn validate(&self) -> Result<(), ConfigInvalid> {
        if self.websocket.keep_alive_interval_ms == 0 {
            return Err(ConfigInvalid::ZeroKeepAlive);
        }
        if self.inactivity.warning_seconds == 0 {
            return Err(ConfigInvalid::ZeroWarning);
        }
        check_url("websocket.url", &self.websocket.url, &["ws", "wss"])?;
        check_url("api.base_url", &self.api.base_url, &["http", "https"])?;
        Ok(())
    }
}

fn check_url(
    field: &'static str,
    value: &str,
    expected: &'static [&'static str],
) -> Result<(), ConfigInvalid> {
    let url = Url::parse(value).map_err(|_| ConfigInvalid::BadUrl {
        field,
        value: value.to_string(),
    })?;
    if !expected.contains(&url.scheme()) {
        return Err(ConfigInvalid::BadScheme {
            field,
            expected,
            scheme: url.scheme().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn test_inactivity_units_convert_to_milliseconds() {
        let inactivity = InactivityConfig {
            timeout_minutes: 2,
            warning_seconds: 30,
            check_activity_interval_ms: 500,
        };
        assert_eq!(inactivity.idle_timeout(), Duration::from_millis(120_000));
        assert_eq!(inactivity.warning_duration(), Duration::from_millis(30_000));
        assert_eq!(inactivity.check_activity_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_validate_rejects_wrong_socket_scheme() {
        let mut config = Config::default();
        config.websocket.url = "http://example.com/socket".to_string();
        match config.validate() {
            Err(ConfigInvalid::BadScheme { field, scheme, .. }) => {
                assert_eq!(field, "websocket.url");
                assert_eq!(scheme, "http");
            },
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_zero_keep_alive() {
        let mut config = Config::default();
        config.websocket.keep_alive_interval_ms = 0;
        assert_eq!(config.validate(), Err(ConfigInvalid::ZeroKeepAlive));
    }

    fn config_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../config")
    }

    #[test]
    fn test_production_file_turns_on_production() {
        let config = Config::load_from(&config_dir(), "production").unwrap();
        assert!(config.production);
        assert_eq!(config.inactivity.timeout_minutes, 10);
        assert_eq!(config.inactivity.warning_seconds, 30);
        // Untouched keys still come from default.toml
        assert_eq!(config.chat.lang, "es");
    }

    #[test]
    fn test_development_mode_is_not_production() {
        let config = Config::load_from(&config_dir(), "development").unwrap();
        assert!(!config.production);
        assert_eq!(config.inactivity.timeout_minutes, 15);
    }

    #[test]
    fn test_transport_kind_is_lowercase_on_disk() {
        let chat: ChatConfig = serde_json::from_str(
            r#"{"lang":"en","transport":"http"}"#,
        ).unwrap();
        assert_eq!(chat.transport, ChatTransportKind::Http);
        assert_eq!(chat.lang, "en");
        // Missing keys fall back to the section defaults
        assert!(chat.greeting.is_some());
    }
}
