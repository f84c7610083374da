use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Runtime configuration, layered from defaults, an optional TOML file and
/// `RESEARCH_SCOUT_*` environment variables.
///
/// The Gemini API key is deliberately not part of this struct so it never
/// ends up in a rendered config file; see [`Credentials`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the generative language API endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Model identifier appended to the base URL
    pub model: String,
    /// Base URL of the generative language API
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live for cached search results, in seconds
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of papers requested per search
    pub result_count: usize,
    /// Queries shorter than this never trigger a suggestion request
    pub min_suggestion_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when RUST_LOG is not set
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            cache: CacheConfig::default(),
            search: SearchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            result_count: 5,
            min_suggestion_len: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration with the usual precedence: defaults, then the
    /// config file (explicit path or the platform default location), then
    /// environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        match file {
            Some(path) => {
                builder = builder.add_source(config::File::from(path));
            }
            None => {
                if let Some(path) = Self::default_file() {
                    if path.exists() {
                        builder = builder.add_source(config::File::from(path));
                    }
                }
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix("RESEARCH_SCOUT").separator("__"),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Platform config file location, e.g. `~/.config/research-scout/config.toml`
    #[must_use]
    pub fn default_file() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("research-scout").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.gateway.model.trim().is_empty() {
            return Err(Error::InvalidInput {
                field: "gateway.model".to_string(),
                reason: "model name cannot be empty".to_string(),
            });
        }

        if !self.gateway.base_url.starts_with("http://")
            && !self.gateway.base_url.starts_with("https://")
        {
            return Err(Error::InvalidInput {
                field: "gateway.base_url".to_string(),
                reason: "must be an http(s) URL".to_string(),
            });
        }

        if self.gateway.timeout_secs == 0 || self.gateway.timeout_secs > 600 {
            return Err(Error::InvalidInput {
                field: "gateway.timeout_secs".to_string(),
                reason: "must be between 1 and 600".to_string(),
            });
        }

        if self.cache.ttl_secs == 0 {
            return Err(Error::InvalidInput {
                field: "cache.ttl_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.search.result_count == 0 || self.search.result_count > 10 {
            return Err(Error::InvalidInput {
                field: "search.result_count".to_string(),
                reason: "must be between 1 and 10".to_string(),
            });
        }

        if self.search.min_suggestion_len == 0 {
            return Err(Error::InvalidInput {
                field: "search.min_suggestion_len".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(Error::InvalidInput {
                    field: "logging.level".to_string(),
                    reason: format!("unknown log level '{other}'"),
                });
            }
        }

        Ok(())
    }

    /// Render the configuration as TOML, used by `config init`
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway.timeout_secs)
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

/// API key for the generative language service, read from the environment.
///
/// Loaded separately from [`Config`] so startup can fail fast with a clear
/// message when the key is missing.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub gemini_api_key: String,
}

impl Credentials {
    /// Read `GEMINI_API_KEY` from the environment. Missing or blank keys are
    /// a fatal startup error.
    pub fn from_env() -> Result<Self> {
        let credentials: Credentials = envy::from_env().map_err(|_| Error::InvalidInput {
            field: "GEMINI_API_KEY".to_string(),
            reason: "environment variable is not set".to_string(),
        })?;

        if credentials.gemini_api_key.trim().is_empty() {
            return Err(Error::InvalidInput {
                field: "GEMINI_API_KEY".to_string(),
                reason: "environment variable is empty".to_string(),
            });
        }

        Ok(credentials)
    }
}
