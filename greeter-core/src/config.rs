// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates URLs and timeouts and provides sensible defaults for everything

use crate::controller::ControllerOptions;
use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub twitch: TwitchConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TwitchConfig {
    /// Channel to join; falls back to the stored username when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Token that takes precedence over the stored one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default = "default_validate_url")]
    pub validate_url: String,
    /// Seconds to wait for the server to acknowledge a join
    #[serde(default = "default_join_timeout_secs")]
    pub join_timeout_secs: u64,
    /// Seconds to wait for the server to accept the login
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,
}

// Custom Debug impl to redact the access token
impl std::fmt::Debug for TwitchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitchConfig")
            .field("channel", &self.channel)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("validate_url", &self.validate_url)
            .field("join_timeout_secs", &self.join_timeout_secs)
            .field("login_timeout_secs", &self.login_timeout_secs)
            .finish()
    }
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            channel: None,
            access_token: None,
            validate_url: default_validate_url(),
            join_timeout_secs: default_join_timeout_secs(),
            login_timeout_secs: default_login_timeout_secs(),
        }
    }
}

impl TwitchConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Quiet period before join-state notifications are delivered
    #[serde(default = "default_join_debounce_ms")]
    pub join_debounce_ms: u64,
    /// Seconds to wait for a part request when disconnecting
    #[serde(default = "default_part_timeout_secs")]
    pub part_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            join_debounce_ms: default_join_debounce_ms(),
            part_timeout_secs: default_part_timeout_secs(),
        }
    }
}

impl From<&SessionConfig> for ControllerOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            join_debounce: Duration::from_millis(config.join_debounce_ms),
            part_timeout: Duration::from_secs(config.part_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_validate_url() -> String {
    "https://id.twitch.tv/oauth2/validate".to_string()
}

fn default_join_timeout_secs() -> u64 {
    10
}

fn default_login_timeout_secs() -> u64 {
    10
}

fn default_join_debounce_ms() -> u64 {
    15
}

fn default_part_timeout_secs() -> u64 {
    5
}

fn default_store_path() -> String {
    paths::store_file().to_string_lossy().to_string()
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. GREETER_CONFIG_PATH env var (if set)
    /// 2. ./config.toml (current directory - for development)
    /// 3. ~/.config/twitch-greeter/config.toml (XDG config dir)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("GREETER_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration from config.toml with environment variable overrides
    pub fn load() -> Result<Self> {
        let mut config = if let Some(config_path) = Self::find_config_file() {
            tracing::info!(
                path = %config_path.display(),
                "Loading configuration from file"
            );
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::info!("No config file found, using environment variables and defaults");
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("TWITCH_CHANNEL") {
            self.twitch.channel = Some(val);
        }
        if let Ok(val) = std::env::var("TWITCH_TOKEN") {
            self.twitch.access_token = Some(val);
            // Clear from environment to prevent exposure via /proc or ps
            std::env::remove_var("TWITCH_TOKEN");
        }
        if let Ok(val) = std::env::var("TWITCH_VALIDATE_URL") {
            self.twitch.validate_url = val;
        }
        if let Ok(val) = std::env::var("GREETER_STORE_PATH") {
            self.storage.path = val;
        }
        if let Ok(val) = std::env::var("GREETER_JOIN_DEBOUNCE_MS") {
            self.session.join_debounce_ms = val.parse().with_context(|| {
                format!("GREETER_JOIN_DEBOUNCE_MS must be a number, got: {}", val)
            })?;
        }

        self.storage.path = paths::expand_tilde(&self.storage.path);
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.twitch.channel = self
            .twitch
            .channel
            .take()
            .map(|c| c.trim().trim_start_matches('#').to_string())
            .filter(|c| !c.is_empty());
        self.twitch.access_token = self
            .twitch
            .access_token
            .take()
            .filter(|t| !t.trim().is_empty());

        url::Url::parse(&self.twitch.validate_url).with_context(|| {
            format!("Invalid twitch.validate_url: {}", self.twitch.validate_url)
        })?;
        if self.twitch.join_timeout_secs == 0 {
            anyhow::bail!("twitch.join_timeout_secs must be greater than zero");
        }
        if self.twitch.login_timeout_secs == 0 {
            anyhow::bail!("twitch.login_timeout_secs must be greater than zero");
        }
        if self.storage.path.trim().is_empty() {
            anyhow::bail!("storage.path must not be empty");
        }
        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.path)
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions::from(&self.session)
    }
}
