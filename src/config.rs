use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub signal_pool: SignalPoolConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub distributor: DistributorConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL for the bot's own tables
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalPoolConfig {
    /// PostgreSQL connection URL of the upstream signal pool (read-only)
    pub url: String,
    #[serde(default = "default_pool_connections")]
    pub max_connections: u32,
}

fn default_pool_connections() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// Wallex REST base URL
    #[serde(default = "default_exchange_base_url")]
    pub base_url: String,
    /// Per-request timeout; the only bound on call duration
    #[serde(default = "default_exchange_timeout")]
    pub timeout_secs: u64,
}

fn default_exchange_base_url() -> String {
    "https://api.wallex.ir/v1".to_string()
}

fn default_exchange_timeout() -> u64 {
    10
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: default_exchange_base_url(),
            timeout_secs: default_exchange_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TelegramConfig {
    /// Bot token; notifications are disabled when unset
    #[serde(default)]
    pub bot_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistributorConfig {
    /// How far back to scan the signal pool each cycle (minutes)
    #[serde(default = "default_lookback_minutes")]
    pub lookback_minutes: u64,
    /// Sleep between distribution cycles (seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_lookback_minutes() -> u64 {
    10
}

fn default_poll_interval() -> u64 {
    10
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            lookback_minutes: default_lookback_minutes(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    /// Sleep between lifecycle cycles (seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Resting buys older than this are cancelled (minutes)
    #[serde(default = "default_stale_order_minutes")]
    pub stale_order_minutes: u64,
}

fn default_stale_order_minutes() -> u64 {
    15
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            stale_order_minutes: default_stale_order_minutes(),
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
    /// Directory for daily-rotated file logs; stdout-only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
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
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            .set_default("signal_pool.max_connections", 2)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g. config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("MULTITRADE_ENV")
                        .unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (MULTITRADE_DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("MULTITRADE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.distributor.lookback_minutes == 0 {
            errors.push("distributor.lookback_minutes must be positive".to_string());
        }
        if self.distributor.poll_interval_secs == 0 {
            errors.push("distributor.poll_interval_secs must be positive".to_string());
        }
        if self.executor.poll_interval_secs == 0 {
            errors.push("executor.poll_interval_secs must be positive".to_string());
        }
        if self.executor.stale_order_minutes == 0 {
            errors.push("executor.stale_order_minutes must be positive".to_string());
        }
        if self.exchange.timeout_secs == 0 {
            errors.push("exchange.timeout_secs must be positive".to_string());
        }
        if self.database.url.trim().is_empty() {
            errors.push("database.url must be set".to_string());
        }
        if self.signal_pool.url.trim().is_empty() {
            errors.push("signal_pool.url must be set".to_string());
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
            database: DatabaseConfig {
                url: "postgres://localhost/multitrade".to_string(),
                max_connections: 5,
            },
            signal_pool: SignalPoolConfig {
                url: "postgres://localhost/signal_pool".to_string(),
                max_connections: 2,
            },
            exchange: ExchangeConfig::default(),
            telegram: TelegramConfig::default(),
            distributor: DistributorConfig::default(),
            executor: ExecutorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_defaults_validate() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let mut config = sample_config();
        config.executor.poll_interval_secs = 0;
        config.distributor.lookback_minutes = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_empty_database_url_rejected() {
        let mut config = sample_config();
        config.database.url = String::new();
        assert!(config.validate().is_err());
    }
}
