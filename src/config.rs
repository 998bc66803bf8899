//! Top-level application configuration.
//!
//! Configuration is stored in `config.yaml` under the user's config
//! directory (override with `LINKCODE_CONFIG_DIR`) and includes:
//! - Auth API base URL, endpoint paths, and bearer token
//! - The platform user ID whose links are checked
//! - The default target platform
//! - Session timings (code expiry, countdown tick, poll interval)

use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::api::http::{DEFAULT_CODE_PATH, DEFAULT_STATUS_PATH};
use crate::error::{LinkError, Result};
use crate::platform::Platform;
use crate::session::{
    DEFAULT_DISMISS_DELAY, DEFAULT_EXPIRES_IN, DEFAULT_POLL_INTERVAL, DEFAULT_TICK_INTERVAL,
    SessionTimings,
};

pub const CONFIG_DIR_ENV: &str = "LINKCODE_CONFIG_DIR";
pub const API_URL_ENV: &str = "LINKCODE_API_URL";
pub const TOKEN_ENV: &str = "LINKCODE_TOKEN";
pub const USER_ID_ENV: &str = "LINKCODE_USER_ID";

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Auth API connection settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Platform user ID used for link-status checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Platform targeted when none is given on the command line
    #[serde(default)]
    pub platform: Platform,

    /// Session timer overrides
    #[serde(default, skip_serializing_if = "SessionConfig::is_default")]
    pub session: SessionConfig,
}

/// Auth API settings
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default = "default_code_path")]
    pub code_path: String,

    #[serde(default = "default_status_path")]
    pub status_path: String,

    /// Per-request timeout in seconds (default: 10)
    #[serde(default = "default_request_timeout")]
    pub timeout: u64,

    /// Connect timeout in seconds (default: 5)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("code_path", &self.code_path)
            .field("status_path", &self.status_path)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_code_path() -> String {
    DEFAULT_CODE_PATH.to_string()
}

fn default_status_path() -> String {
    DEFAULT_STATUS_PATH.to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            token: None,
            code_path: default_code_path(),
            status_path: default_status_path(),
            timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// Session timer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Link code lifetime in seconds (default: 300)
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,

    /// Countdown tick in milliseconds (default: 1000)
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Link-status poll interval in milliseconds (default: 4000)
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,

    /// Delay before a linked session is dismissed, in milliseconds (default: 2500)
    #[serde(default = "default_dismiss_ms")]
    pub dismiss_ms: u64,
}

fn default_expires_in() -> u64 {
    DEFAULT_EXPIRES_IN.as_secs()
}

fn default_tick_ms() -> u64 {
    DEFAULT_TICK_INTERVAL.as_millis() as u64
}

fn default_poll_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_dismiss_ms() -> u64 {
    DEFAULT_DISMISS_DELAY.as_millis() as u64
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expires_in: default_expires_in(),
            tick_ms: default_tick_ms(),
            poll_ms: default_poll_ms(),
            dismiss_ms: default_dismiss_ms(),
        }
    }
}

impl SessionConfig {
    /// Check if this config has default values
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn timings(&self) -> SessionTimings {
        SessionTimings {
            expires_in: Duration::from_secs(self.expires_in),
            tick_interval: Duration::from_millis(self.tick_ms),
            poll_interval: Duration::from_millis(self.poll_ms),
            dismiss_delay: Duration::from_millis(self.dismiss_ms),
        }
    }
}

/// Read a non-empty environment variable.
fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

impl Config {
    /// Directory holding `config.yaml`.
    pub fn config_dir() -> Result<PathBuf> {
        if let Some(dir) = env_value(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        directories::ProjectDirs::from("com", "linkcode", "linkcode")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| {
                LinkError::Config(format!(
                    "cannot determine a config directory; set {CONFIG_DIR_ENV}"
                ))
            })
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.yaml"))
    }

    /// Load configuration from file, or return default if not found
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            LinkError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config at {}: {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_yaml_ng::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                LinkError::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create directory for config at {}: {}",
                        parent.display(),
                        e
                    ),
                ))
            })?;
        }

        let content = serde_yaml_ng::to_string(self)?;
        fs::write(&path, content).map_err(|e| {
            LinkError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write config at {}: {}", path.display(), e),
            ))
        })?;

        // Owner read/write only; the file may hold an API token
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&path, permissions)?;
        }

        Ok(())
    }

    /// API base URL from environment or config file
    pub fn api_url(&self) -> String {
        env_value(API_URL_ENV).unwrap_or_else(|| self.api.base_url.clone())
    }

    /// Bearer token from environment or config file
    pub fn api_token(&self) -> Option<SecretString> {
        env_value(TOKEN_ENV)
            .or_else(|| self.api.token.clone())
            .map(SecretString::from)
    }

    /// Whether a token is available from any source
    pub fn has_api_token(&self) -> bool {
        env_value(TOKEN_ENV).is_some() || self.api.token.is_some()
    }

    /// User ID from environment or config file
    pub fn user_id(&self) -> Option<String> {
        env_value(USER_ID_ENV).or_else(|| self.user_id.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.api.connect_timeout)
    }

    pub fn timings(&self) -> SessionTimings {
        self.session.timings()
    }

    pub fn set_api_url(&mut self, url: String) {
        self.api.base_url = url;
    }

    pub fn set_api_token(&mut self, token: String) {
        self.api.token = Some(token);
    }

    pub fn set_user_id(&mut self, user_id: String) {
        self.user_id = Some(user_id);
    }

    pub fn set_platform(&mut self, platform: Platform) {
        self.platform = platform;
    }
}
