//! Configuration loading.
//!
//! Loads settings from `./directline.toml` (or `$DIRECTLINE_CONFIG_PATH`).
//! Environment variables override file values; file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::directline::{DEFAULT_BASE_URL, DIRECTLINE_CHANNEL_ID};

/// Env var naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "DIRECTLINE_CONFIG_PATH";

/// Config file looked up in the working directory by default.
pub const DEFAULT_CONFIG_FILE: &str = "directline.toml";

// ── Top-level config ────────────────────────────────────────────

/// Top-level configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Direct Line service settings.
    pub service: ServiceConfig,
    /// Identity used for outgoing activities.
    pub user: UserConfig,
    /// Console chat behaviour.
    pub chat: ChatConfig,
}

impl Config {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// `path` wins over `$DIRECTLINE_CONFIG_PATH`, which wins over
    /// `./directline.toml`. A missing default file yields defaults; a missing
    /// explicit file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok();
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_default(&env)?,
        };
        config.apply_overrides(env);
        Ok(config)
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }

    /// Load an explicit config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        tracing::info!(path = %path.display(), "loading config from file");
        Self::from_toml(&contents)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    fn load_default(env: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = config_path_with(env);
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config file {}: {e}",
                path.display()
            )),
        }
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function so tests never touch the process environment.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("DIRECTLINE_BASE_URL") {
            self.service.base_url = v;
        }
        if let Some(v) = env("DIRECTLINE_TIMEOUT_SECS") {
            match v.parse() {
                Ok(n) => self.service.request_timeout_secs = Some(n),
                Err(_) => tracing::warn!(
                    var = "DIRECTLINE_TIMEOUT_SECS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("DIRECTLINE_USER_ID") {
            self.user.id = v;
        }
        if let Some(v) = env("DIRECTLINE_USER_NAME") {
            self.user.name = Some(v);
        }
    }
}

/// Resolve the config path using a custom env resolver.
pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    env(CONFIG_PATH_ENV).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
}

// ── Service config ──────────────────────────────────────────────

/// Direct Line service settings (`[service]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Endpoint prefix, e.g. `https://directline.botframework.com/v3/directline/`.
    pub base_url: String,
    /// Channel id stamped on outgoing activities.
    pub channel_id: String,
    /// Name of the environment variable holding the bot secret.
    pub secret_env: String,
    /// Per-request deadline in seconds. Unset keeps the HTTP client default.
    pub request_timeout_secs: Option<u64>,
}

impl ServiceConfig {
    /// Request deadline as a [`Duration`].
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            channel_id: DIRECTLINE_CHANNEL_ID.to_owned(),
            secret_env: "DIRECTLINE_SECRET".to_owned(),
            request_timeout_secs: None,
        }
    }
}

// ── User config ─────────────────────────────────────────────────

/// Sender identity (`[user]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// `from.id` of outgoing activities.
    pub id: String,
    /// Optional `from.name`.
    pub name: Option<String>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: "directline-user".to_owned(),
            name: None,
        }
    }
}

// ── Chat config ─────────────────────────────────────────────────

/// Console chat behaviour (`[chat]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Pause between an accepted send and the follow-up fetch, in milliseconds.
    pub fetch_delay_ms: u64,
}

impl ChatConfig {
    /// Fetch delay as a [`Duration`].
    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            fetch_delay_ms: 500,
        }
    }
}
