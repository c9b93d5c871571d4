//! Server configuration loading from file and environment variables.

use std::fmt::{self, Debug};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Vendor credentials and limits.
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "tonelink_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Vendor credentials. A missing key disables the matching route.
#[derive(Clone, Deserialize)]
pub struct ProvidersConfig {
    /// Key for the primary provider behind `/chat`.
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Key for the secondary provider behind `/groq`.
    #[serde(default)]
    pub groq_api_key: Option<String>,

    /// Key for the voice vendor behind `/signed-url`.
    #[serde(default)]
    pub elevenlabs_api_key: Option<String>,

    /// Upper bound for a single vendor call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProvidersConfig {
    /// Returns the vendor call timeout.
    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Debug for ProvidersConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("ProvidersConfig")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("groq_api_key", &redact(&self.groq_api_key))
            .field("elevenlabs_api_key", &redact(&self.elevenlabs_api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            groq_api_key: None,
            elevenlabs_api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies overrides from the process environment.
///
/// Environment variable overrides:
/// - `TONELINK_HOST` overrides `server.host`
/// - `TONELINK_PORT` overrides `server.port`
/// - `TONELINK_LOG_LEVEL` overrides `logging.level`
/// - `TONELINK_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `OPENAI_API_KEY`, `GROQ_API_KEY` and `ELEVENLABS_API_KEY` override the
///   keys in `providers`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`], reading overrides through `lookup`.
pub fn load_config_with(
    path: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };
    apply_overrides(&mut config, lookup);
    Ok(config)
}

fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(parsed) = lookup("TONELINK_HOST").and_then(|v| v.parse().ok()) {
        config.server.host = parsed;
    }
    if let Some(parsed) = lookup("TONELINK_PORT").and_then(|v| v.parse().ok()) {
        config.server.port = parsed;
    }
    if let Some(level) = lookup("TONELINK_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("TONELINK_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    let providers = &mut config.providers;
    for (var, slot) in [
        ("OPENAI_API_KEY", &mut providers.openai_api_key),
        ("GROQ_API_KEY", &mut providers.groq_api_key),
        ("ELEVENLABS_API_KEY", &mut providers.elevenlabs_api_key),
    ] {
        if let Some(key) = lookup(var) {
            *slot = Some(key);
        }
        // Blank keys count as missing.
        if slot.as_deref().is_some_and(|key| key.trim().is_empty()) {
            *slot = None;
        }
    }
}
