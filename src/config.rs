use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub fetcher: FetcherConfig,
    pub scheduler: SchedulerConfig,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    pub request_timeout: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Six-field cron expression for the full sweep (sec min hour dom mon dow).
    pub sweep_interval: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub api_base: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "DROPWATCH_"
            .add_source(Environment::with_prefix("DROPWATCH").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Message("Database url must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        if self.fetcher.request_timeout == 0 {
            return Err(ConfigError::Message(
                "Fetcher request_timeout must be greater than 0".into(),
            ));
        }

        if !is_valid_cron(&self.scheduler.sweep_interval) {
            return Err(ConfigError::Message(
                "Invalid cron expression in scheduler.sweep_interval".into(),
            ));
        }

        if Url::parse(&self.telegram.api_base).is_err() {
            return Err(ConfigError::Message(
                "Invalid telegram.api_base URL format".into(),
            ));
        }

        Ok(())
    }
}

/// Basic cron validation - 6 parts (second minute hour day month weekday),
/// optional 7th year field.
pub fn is_valid_cron(expression: &str) -> bool {
    let parts: Vec<&str> = expression.split_whitespace().collect();
    if parts.len() != 6 && parts.len() != 7 {
        return false;
    }

    for part in parts {
        if part.is_empty() {
            return false;
        }
        // Allow numbers, ranges, lists, wildcards, and steps
        if !part
            .chars()
            .all(|c| c.is_ascii_digit() || c == '*' || c == '-' || c == ',' || c == '/')
        {
            return false;
        }
    }

    true
}
