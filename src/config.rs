//! Client configuration from `~/.config/mindee/config.toml` and the environment.
//!
//! Precedence, lowest first: built-in defaults, config file, environment
//! (`MINDEE_API_KEY`, `MINDEE_API_URL`, `MINDEE_REQUEST_TIMEOUT`), then
//! whatever the caller sets with the `with_*` builders.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{MindeeError, Result};
use crate::polling::{PollingOptions, DEFAULT_DELAY, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_RETRIES};

pub const DEFAULT_BASE_URL: &str = "https://api.mindee.net/v1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub const API_KEY_ENV: &str = "MINDEE_API_KEY";
pub const API_URL_ENV: &str = "MINDEE_API_URL";
pub const REQUEST_TIMEOUT_ENV: &str = "MINDEE_REQUEST_TIMEOUT";

/// Everything a client needs; passed explicitly, never read from globals.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub request_timeout: Duration,
    pub polling: PollingOptions,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("polling", &self.polling)
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            polling: PollingOptions::default(),
        }
    }
}

/// `[polling]` table, in seconds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PollingFile {
    initial_delay: Option<f64>,
    delay: Option<f64>,
    max_retries: Option<u32>,
}

/// On-disk layout of `config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_key: Option<String>,
    base_url: Option<String>,
    /// Seconds.
    request_timeout: Option<u64>,
    #[serde(default)]
    polling: PollingFile,
}

fn seconds(field: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|e| MindeeError::Config(format!("invalid {field} {value}: {e}")))
}

impl ConfigFile {
    fn apply(self, mut config: ClientConfig) -> Result<ClientConfig> {
        if let Some(key) = self.api_key {
            config.api_key = Some(key);
        }
        if let Some(url) = self.base_url {
            config.base_url = url;
        }
        if let Some(secs) = self.request_timeout {
            config.request_timeout = Duration::from_secs(secs);
        }
        let p = self.polling;
        if p.initial_delay.is_some() || p.delay.is_some() || p.max_retries.is_some() {
            config.polling = PollingOptions::new(
                p.initial_delay
                    .map_or(Ok(DEFAULT_INITIAL_DELAY), |s| seconds("initial_delay", s))?,
                p.delay.map_or(Ok(DEFAULT_DELAY), |s| seconds("delay", s))?,
                p.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            )?;
        }
        Ok(config)
    }
}

impl ClientConfig {
    /// Defaults overridden by the environment.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env(|name| std::env::var(name).ok())
    }

    /// Defaults, then the config file if it exists, then the environment.
    ///
    /// A missing file is fine; an unreadable or malformed one is an error.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())?.with_env(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by the file at `path`, if it exists.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)
            .map_err(|e| MindeeError::Config(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    fn from_toml(content: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| MindeeError::Config(format!("invalid TOML: {e}")))?;
        file.apply(Self::default())
    }

    /// Apply environment overrides read through `lookup`.
    fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.is_empty()) {
            self.base_url = url;
        }
        if let Some(raw) = lookup(REQUEST_TIMEOUT_ENV).filter(|t| !t.is_empty()) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| MindeeError::Config(format!("{REQUEST_TIMEOUT_ENV} must be whole seconds, got {raw:?}")))?;
            self.request_timeout = Duration::from_secs(secs);
        }
        Ok(self)
    }

    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_polling(mut self, polling: PollingOptions) -> Self {
        self.polling = polling;
        self
    }

    /// Check the config is usable for API calls.
    pub fn validate(&self) -> Result<()> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => {
                return Err(MindeeError::Config(format!(
                    "missing API key, set {API_KEY_ENV} or api_key in {}",
                    config_path().display()
                )))
            }
        }
        let url = Url::parse(&self.base_url)
            .map_err(|e| MindeeError::Config(format!("invalid base URL {:?}: {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(MindeeError::Config(format!(
                "base URL must be http(s), got {}",
                url.scheme()
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(MindeeError::Config("request timeout must be positive".into()));
        }
        Ok(())
    }
}

/// Return the path to the config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mindee")
        .join("config.toml")
}
