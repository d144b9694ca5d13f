//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `areaflow.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use areaflow_adapter_builtin::BuiltinOptions;
use areaflow_app::trigger::TriggerTiming;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Trigger scheduling and webhook settings.
    pub triggers: TriggersConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Trigger worker and webhook tuning.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TriggersConfig {
    /// Directory holding one `<applet id>.log` file per applet.
    pub log_dir: String,
    /// Bounded wait of one webhook read by a webhook-driven action.
    pub webhook_read_timeout_ms: u64,
    /// How long an inbound delivery waits for a reader.
    pub webhook_delivery_timeout_ms: u64,
    /// Timeout of outbound webhook requests.
    pub http_timeout_ms: u64,
    /// Minimum pause after a failed action call.
    pub error_backoff_ms: u64,
    /// Window over which an action's rate limit is spread.
    pub poll_window_secs: u64,
}

impl TriggersConfig {
    #[must_use]
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.webhook_delivery_timeout_ms)
    }

    #[must_use]
    pub fn builtin_options(&self) -> BuiltinOptions {
        BuiltinOptions {
            webhook_read_timeout: Duration::from_millis(self.webhook_read_timeout_ms),
            http_timeout: Duration::from_millis(self.http_timeout_ms),
        }
    }

    #[must_use]
    pub fn timing(&self) -> TriggerTiming {
        TriggerTiming {
            poll_window: Duration::from_secs(self.poll_window_secs),
            error_backoff: Duration::from_millis(self.error_backoff_ms),
        }
    }
}

impl Config {
    /// Load configuration from `areaflow.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if a
    /// value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("areaflow.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AREAFLOW_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("AREAFLOW_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("AREAFLOW_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Ok(val) = std::env::var("AREAFLOW_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("AREAFLOW_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("AREAFLOW_LOG_DIR") {
            self.triggers.log_dir = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        let triggers = &self.triggers;
        for (name, value) in [
            ("webhook_read_timeout_ms", triggers.webhook_read_timeout_ms),
            (
                "webhook_delivery_timeout_ms",
                triggers.webhook_delivery_timeout_ms,
            ),
            ("http_timeout_ms", triggers.http_timeout_ms),
            ("poll_window_secs", triggers.poll_window_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{name} must be non-zero")));
            }
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:areaflow.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "areaflowd=info,areaflow=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for TriggersConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            webhook_read_timeout_ms: 2_000,
            webhook_delivery_timeout_ms: 10_000,
            http_timeout_ms: 10_000,
            error_backoff_ms: 1_000,
            poll_window_secs: 30,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.url, "sqlite:areaflow.db?mode=rwc");
        assert_eq!(config.triggers.log_dir, "logs");
        assert_eq!(config.triggers.webhook_read_timeout_ms, 2_000);
    }

    #[test]
    fn should_parse_minimal_toml() {
        let toml = "";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [server]
            host = '127.0.0.1'
            port = 9090

            [database]
            url = 'sqlite:test.db'

            [logging]
            filter = 'debug'

            [triggers]
            log_dir = '/var/log/areaflow'
            webhook_read_timeout_ms = 500
            webhook_delivery_timeout_ms = 3000
            http_timeout_ms = 4000
            error_backoff_ms = 250
            poll_window_secs = 60
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.url, "sqlite:test.db");
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.triggers.log_dir, "/var/log/areaflow");
        assert_eq!(config.triggers.delivery_timeout(), Duration::from_secs(3));
        assert_eq!(
            config.triggers.builtin_options().webhook_read_timeout,
            Duration::from_millis(500)
        );
        assert_eq!(
            config.triggers.timing(),
            TriggerTiming {
                poll_window: Duration::from_secs(60),
                error_backoff: Duration::from_millis(250),
            }
        );
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_reject_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_timeout() {
        let mut config = Config::default();
        config.triggers.webhook_read_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(msg)) if msg.contains("webhook_read_timeout_ms")
        ));
    }

    #[test]
    fn should_accept_zero_error_backoff() {
        let mut config = Config::default();
        config.triggers.error_backoff_ms = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_format_custom_bind_addr() {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 9090;
        assert_eq!(config.bind_addr(), "127.0.0.1:9090");
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [triggers]
            poll_window_secs = 5
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.triggers.poll_window_secs, 5);
        assert_eq!(config.triggers.error_backoff_ms, 1_000);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
