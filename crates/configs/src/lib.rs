//! # configs
//!
//! Layered settings for peerforum hosts.
//!
//! Sources, later ones overriding earlier ones:
//! 1. `.env` in the working directory (optional)
//! 2. `config/default.toml` (optional)
//! 3. `config/{PEERFORUM_ENV}.toml` (optional, `PEERFORUM_ENV` defaults to `development`)
//! 4. `PEERFORUM__SECTION__KEY` environment variables

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting {0}: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, e.g. `info,services=debug`
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubscriptionSettings {
    /// Keep per-forum subscriber and per-user override caches
    pub cache_enabled: bool,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self { cache_enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeedSettings {
    /// Number of discussions the seed binary creates
    pub discussions: u32,
}

impl Default for SeedSettings {
    fn default() -> Self {
        Self { discussions: 5 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub subscriptions: SubscriptionSettings,
    pub seed: SeedSettings,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                tracing::warn!(error = %err, "ignoring unreadable .env file");
            }
        }
        let env = std::env::var("PEERFORUM_ENV").unwrap_or_else(|_| "development".to_string());

        let settings: Settings = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(config::Environment::with_prefix("PEERFORUM").prefix_separator("__").separator("__"))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.filter", "must not be empty".into()));
        }
        if self.seed.discussions == 0 {
            return Err(ConfigError::Invalid("seed.discussions", "must be at least 1".into()));
        }
        Ok(())
    }
}
