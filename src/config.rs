use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub model: ModelConfig,
    pub replay: ReplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Path to the serialized win-probability model (JSON)
    pub path: String,
    /// Number of feature attributions broadcast per prediction
    #[serde(default = "default_top_attributions")]
    pub top_attributions: usize,
}

fn default_top_attributions() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
    /// Directory holding play-by-play source files (.jsonl)
    pub data_dir: String,
    /// Default replay pace when the start request omits one
    #[serde(default = "default_plays_per_second")]
    pub plays_per_second: f64,
    /// Pending-event capacity per subscriber queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// How long the latest-event snapshot stays valid
    #[serde(default = "default_latest_ttl_secs")]
    pub latest_event_ttl_secs: u64,
}

fn default_plays_per_second() -> f64 {
    1.0
}

fn default_queue_capacity() -> usize {
    200
}

fn default_latest_ttl_secs() -> u64 {
    3600
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            plays_per_second: default_plays_per_second(),
            queue_capacity: default_queue_capacity(),
            latest_event_ttl_secs: default_latest_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            .set_default("model.top_attributions", 5)?
            .set_default("replay.data_dir", "data")?
            .set_default("replay.plays_per_second", 1.0)?
            .set_default("replay.queue_capacity", 200)?
            .set_default("replay.latest_event_ttl_secs", 3600)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("LIVELINE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (LIVELINE_DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("LIVELINE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.replay.plays_per_second < 0.1 || self.replay.plays_per_second > 100.0 {
            errors.push("replay.plays_per_second must be between 0.1 and 100".to_string());
        }

        if self.replay.queue_capacity == 0 {
            errors.push("replay.queue_capacity must be positive".to_string());
        }

        if self.model.top_attributions == 0 {
            errors.push("model.top_attributions must be positive".to_string());
        }

        if self.database.url.is_empty() {
            errors.push("database.url must be set".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> AppConfig {
        AppConfig {
            server: ServerConfig { port: 8080 },
            database: DatabaseConfig {
                url: "postgres://localhost/liveline".to_string(),
                max_connections: 5,
            },
            model: ModelConfig {
                path: "model/wp_model.json".to_string(),
                top_attributions: 5,
            },
            replay: ReplayConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_pace_out_of_range_rejected() {
        let mut config = sample_config();
        config.replay.plays_per_second = 500.0;
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("plays_per_second")));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = sample_config();
        config.replay.queue_capacity = 0;
        assert!(config.validate().is_err());
    }
}
