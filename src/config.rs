use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::messaging::ORDER_CREATED_TOPIC;
use crate::utils::{CircuitBreakerConfig, RetryConfig};

// ============================================================================
// Application Configuration
// ============================================================================
//
// Loaded from the TOML file named by `ORDERS_CONFIG` (default `orders.toml`).
// A missing file means built-in defaults; every section and key is optional.
//
// ============================================================================

pub const CONFIG_ENV_VAR: &str = "ORDERS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "orders.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub users_service: UsersServiceConfig,
    pub circuit_breaker: BreakerSettings,
    pub retry: RetrySettings,
    pub database: DatabaseConfig,
    pub messaging: MessagingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub trusted_header: String,
    pub trusted_value: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8082,
            trusted_header: "X-From-Gateway".to_string(),
            trusted_value: "true".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsersServiceConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for UsersServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8081".to_string(),
            timeout_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub sliding_window_size: usize,
    pub minimum_calls: usize,
    pub failure_rate_threshold: f64,
    pub open_cooldown_ms: u64,
    pub half_open_success_threshold: u32,
    pub half_open_max_concurrent: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        let defaults = CircuitBreakerConfig::default();
        Self {
            sliding_window_size: defaults.sliding_window_size,
            minimum_calls: defaults.minimum_calls,
            failure_rate_threshold: defaults.failure_rate_threshold,
            open_cooldown_ms: defaults.open_cooldown.as_millis() as u64,
            half_open_success_threshold: defaults.half_open_success_threshold,
            half_open_max_concurrent: defaults.half_open_max_concurrent,
        }
    }
}

impl From<&BreakerSettings> for CircuitBreakerConfig {
    fn from(s: &BreakerSettings) -> Self {
        Self {
            sliding_window_size: s.sliding_window_size,
            minimum_calls: s.minimum_calls,
            failure_rate_threshold: s.failure_rate_threshold,
            open_cooldown: Duration::from_millis(s.open_cooldown_ms),
            half_open_success_threshold: s.half_open_success_threshold,
            half_open_max_concurrent: s.half_open_max_concurrent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            initial_delay_ms: defaults.initial_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
            multiplier: defaults.multiplier,
            jitter: defaults.jitter,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(s: &RetrySettings) -> Self {
        Self {
            max_attempts: s.max_attempts,
            initial_delay: Duration::from_millis(s.initial_delay_ms),
            max_delay: Duration::from_millis(s.max_delay_ms),
            multiplier: s.multiplier,
            jitter: s.jitter,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL URL; the in-memory store is used when absent
    pub url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Kafka-compatible brokers; the in-process channel is used when absent
    pub brokers: Option<String>,
    pub topic: String,
    pub send_timeout_ms: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            brokers: None,
            topic: ORDER_CREATED_TOPIC.to_string(),
            send_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { port: 9090 }
    }
}

impl AppConfig {
    /// Load from `ORDERS_CONFIG`, falling back to `orders.toml`, then defaults
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let path = Path::new(&path);

        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file found, using defaults");
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        Self::from_file(path)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };

        let cb = &self.circuit_breaker;
        if cb.minimum_calls == 0 || cb.sliding_window_size < cb.minimum_calls {
            return invalid("circuit_breaker: require sliding_window_size >= minimum_calls >= 1");
        }
        if !(cb.failure_rate_threshold > 0.0 && cb.failure_rate_threshold <= 100.0) {
            return invalid("circuit_breaker: failure_rate_threshold must be in (0, 100]");
        }
        if cb.half_open_success_threshold == 0 || cb.half_open_max_concurrent == 0 {
            return invalid("circuit_breaker: half-open thresholds must be at least 1");
        }

        let retry = &self.retry;
        if retry.max_attempts == 0 {
            return invalid("retry: max_attempts must be at least 1");
        }
        if retry.multiplier < 1.0 {
            return invalid("retry: multiplier must be at least 1.0");
        }
        if !(0.0..1.0).contains(&retry.jitter) {
            return invalid("retry: jitter must be in [0, 1)");
        }

        if self.users_service.base_url.is_empty() {
            return invalid("users_service: base_url is required");
        }

        Ok(())
    }

    pub fn users_timeout(&self) -> Duration {
        Duration::from_millis(self.users_service.timeout_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.database.timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.messaging.send_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.messaging.topic, "orderCreatedQueue");
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [users_service]
            base_url = "http://users:8081"

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.users_service.base_url, "http://users:8081");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.multiplier, 2.0);
        assert_eq!(config.server.port, 8082);
    }

    #[test]
    fn test_settings_convert_to_runtime_configs() {
        let config = AppConfig::from_toml(
            r#"
            [circuit_breaker]
            open_cooldown_ms = 2500
            "#,
        )
        .unwrap();

        let breaker = CircuitBreakerConfig::from(&config.circuit_breaker);
        assert_eq!(breaker.open_cooldown, Duration::from_millis(2500));

        let retry = RetryConfig::from(&config.retry);
        assert_eq!(retry.max_attempts, 3);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let zero_attempts = AppConfig::from_toml("[retry]\nmax_attempts = 0\n");
        assert!(matches!(zero_attempts, Err(ConfigError::Invalid { .. })));

        let bad_threshold = AppConfig::from_toml("[circuit_breaker]\nfailure_rate_threshold = 150.0\n");
        assert!(matches!(bad_threshold, Err(ConfigError::Invalid { .. })));

        let bad_window = AppConfig::from_toml("[circuit_breaker]\nsliding_window_size = 2\nminimum_calls = 5\n");
        assert!(matches!(bad_window, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[database]\nurl = \"postgres://localhost/orders\"").unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();

        assert_eq!(config.database.url.as_deref(), Some("postgres://localhost/orders"));
    }
}
