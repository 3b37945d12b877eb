//! Relay configuration module.
//!
//! Parses configuration from environment variables for Garden Relay.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `GARDEN_RELAY_DELIVERY_URL` | Yes | - | Base URL of the message-delivery webhook |
//! | `GARDEN_RELAY_API_TOKEN` | Yes* | - | Bearer token for the command API |
//! | `GARDEN_RELAY_USERS_FILE` | No | `registeredUsers.json` | Persisted registered users |
//! | `GARDEN_RELAY_STOCK_API_URL` | No | `https://growagardenstock.com` | Stock, egg, weather and cosmetics feeds |
//! | `GARDEN_RELAY_AUX_API_URL` | No | `http://65.108.103.151:22377` | Honey and seed-emoji feeds |
//! | `GARDEN_RELAY_INTERVAL_SECS` | No | 10 | Tracking period in seconds, at most one day |
//! | `GARDEN_RELAY_FETCH_TIMEOUT_SECS` | No | - | Upstream request timeout (none when unset) |
//! | `PORT` | No | 8080 | HTTP server port |
//! | `GARDEN_RELAY_UNSAFE_NO_AUTH` | No | false | Disable the bearer token check (dev only) |
//!
//! *Not required if `GARDEN_RELAY_UNSAFE_NO_AUTH=true`

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::feeds::FeedEndpoints;

/// Default HTTP server port.
const DEFAULT_PORT: u16 = 8080;

/// Default location of the persisted registered-user list.
const DEFAULT_USERS_FILE: &str = "registeredUsers.json";

/// Default tracking period in seconds.
const DEFAULT_INTERVAL_SECS: u64 = 10;

/// Longest accepted tracking period in seconds (one day).
const MAX_INTERVAL_SECS: u64 = 86_400;

/// Errors that can occur when parsing configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has invalid format.
    #[error("invalid format for {var}: {message}")]
    InvalidFormat { var: String, message: String },
}

/// Relay configuration parsed from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,

    /// Path of the JSON file holding registered user IDs.
    pub users_file: PathBuf,

    /// Base URLs of the upstream stock feeds.
    pub endpoints: FeedEndpoints,

    /// Base URL of the message-delivery webhook.
    pub delivery_url: String,

    /// Period between two reports for a tracked user.
    pub interval: Duration,

    /// Optional timeout applied to every upstream feed request.
    pub fetch_timeout: Option<Duration>,

    /// Bearer token the command front-end must present.
    pub api_token: Option<String>,

    /// When true, disables the bearer token check (development only).
    pub unsafe_no_auth: bool,
}

impl Config {
    /// Parse configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `GARDEN_RELAY_DELIVERY_URL` is missing
    /// - `GARDEN_RELAY_API_TOKEN` is missing and unsafe mode is off
    /// - A numeric variable does not parse or is zero where zero is meaningless
    ///
    /// # Example
    ///
    /// ```no_run
    /// use garden_relay::config::Config;
    ///
    /// let config = Config::from_env().expect("Failed to load config");
    /// println!("Command API will listen on port {}", config.port);
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        let unsafe_no_auth = parse_bool_env("GARDEN_RELAY_UNSAFE_NO_AUTH");
        let port = parse_port()?;
        let interval_secs =
            parse_u64_env("GARDEN_RELAY_INTERVAL_SECS")?.unwrap_or(DEFAULT_INTERVAL_SECS);
        let fetch_timeout =
            parse_u64_env("GARDEN_RELAY_FETCH_TIMEOUT_SECS")?.map(Duration::from_secs);

        let users_file = non_empty_env("GARDEN_RELAY_USERS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_USERS_FILE));

        let defaults = FeedEndpoints::default();
        let endpoints = FeedEndpoints::new(
            non_empty_env("GARDEN_RELAY_STOCK_API_URL").unwrap_or(defaults.stock_base_url),
            non_empty_env("GARDEN_RELAY_AUX_API_URL").unwrap_or(defaults.aux_base_url),
        );

        let delivery_url = non_empty_env("GARDEN_RELAY_DELIVERY_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("GARDEN_RELAY_DELIVERY_URL".to_string()))?;

        let config = Self {
            port,
            users_file,
            endpoints,
            delivery_url,
            interval: Duration::from_secs(interval_secs),
            fetch_timeout,
            api_token: non_empty_env("GARDEN_RELAY_API_TOKEN"),
            unsafe_no_auth,
        };

        config.validate()?;

        if config.unsafe_no_auth {
            warn!(
                "GARDEN_RELAY_UNSAFE_NO_AUTH is enabled - the command API accepts \
                 unauthenticated requests. Do not use in production!"
            );
        }

        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidFormat {
                var: "GARDEN_RELAY_INTERVAL_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if self.interval > Duration::from_secs(MAX_INTERVAL_SECS) {
            return Err(ConfigError::InvalidFormat {
                var: "GARDEN_RELAY_INTERVAL_SECS".to_string(),
                message: format!("must be at most {MAX_INTERVAL_SECS}"),
            });
        }

        if matches!(self.fetch_timeout, Some(timeout) if timeout.is_zero()) {
            return Err(ConfigError::InvalidFormat {
                var: "GARDEN_RELAY_FETCH_TIMEOUT_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if !self.unsafe_no_auth && self.api_token.is_none() {
            return Err(ConfigError::MissingEnvVar(
                "GARDEN_RELAY_API_TOKEN".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse a boolean environment variable.
///
/// Returns `true` if the variable is set to "true" (case-insensitive),
/// `false` otherwise.
fn parse_bool_env(name: &str) -> bool {
    env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Returns the trimmed value of a variable, treating empty as unset.
fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an optional unsigned integer environment variable.
fn parse_u64_env(name: &str) -> Result<Option<u64>, ConfigError> {
    match non_empty_env(name) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::InvalidFormat {
                var: name.to_string(),
                message: format!("'{value}' is not a whole number of seconds: {e}"),
            }),
        None => Ok(None),
    }
}

/// Parse the PORT environment variable.
///
/// Returns the default port if not set.
fn parse_port() -> Result<u16, ConfigError> {
    match env::var("PORT") {
        Ok(port_str) => port_str
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidFormat {
                var: "PORT".to_string(),
                message: format!("invalid port number: {e}"),
            }),
        Err(env::VarError::NotPresent) => Ok(DEFAULT_PORT),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidFormat {
            var: "PORT".to_string(),
            message: "contains invalid unicode".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ALL_VARS: &[&str] = &[
        "PORT",
        "GARDEN_RELAY_USERS_FILE",
        "GARDEN_RELAY_STOCK_API_URL",
        "GARDEN_RELAY_AUX_API_URL",
        "GARDEN_RELAY_DELIVERY_URL",
        "GARDEN_RELAY_INTERVAL_SECS",
        "GARDEN_RELAY_FETCH_TIMEOUT_SECS",
        "GARDEN_RELAY_API_TOKEN",
        "GARDEN_RELAY_UNSAFE_NO_AUTH",
    ];

    /// Helper to temporarily set environment variables for testing.
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        /// Starts from a clean slate with every relay variable removed.
        fn clean() -> Self {
            let mut guard = Self { vars: Vec::new() };
            for var in ALL_VARS {
                guard.remove(var);
            }
            guard
        }

        fn set(&mut self, key: &str, value: &str) {
            let old_value = env::var(key).ok();
            self.vars.push((key.to_string(), old_value));
            env::set_var(key, value);
        }

        fn remove(&mut self, key: &str) {
            let old_value = env::var(key).ok();
            self.vars.push((key.to_string(), old_value));
            env::remove_var(key);
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.iter().rev() {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    #[serial]
    fn test_minimal_config_uses_defaults() {
        let mut guard = EnvGuard::clean();
        guard.set("GARDEN_RELAY_DELIVERY_URL", "http://localhost:9000");
        guard.set("GARDEN_RELAY_API_TOKEN", "secret");

        let config = Config::from_env().expect("should parse config");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.users_file, PathBuf::from(DEFAULT_USERS_FILE));
        assert_eq!(config.endpoints, FeedEndpoints::default());
        assert_eq!(config.delivery_url, "http://localhost:9000");
        assert_eq!(config.interval, Duration::from_secs(10));
        assert!(config.fetch_timeout.is_none());
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert!(!config.unsafe_no_auth);
    }

    #[test]
    #[serial]
    fn test_full_config() {
        let mut guard = EnvGuard::clean();
        guard.set("PORT", "9090");
        guard.set("GARDEN_RELAY_USERS_FILE", "/var/lib/relay/users.json");
        guard.set("GARDEN_RELAY_STOCK_API_URL", "http://stock.local/");
        guard.set("GARDEN_RELAY_AUX_API_URL", "http://aux.local");
        guard.set("GARDEN_RELAY_DELIVERY_URL", "http://bot.local");
        guard.set("GARDEN_RELAY_INTERVAL_SECS", "30");
        guard.set("GARDEN_RELAY_FETCH_TIMEOUT_SECS", "5");
        guard.set("GARDEN_RELAY_API_TOKEN", "token");

        let config = Config::from_env().expect("should parse config");
        assert_eq!(config.port, 9090);
        assert_eq!(config.users_file, PathBuf::from("/var/lib/relay/users.json"));
        assert_eq!(config.endpoints.stock_base_url, "http://stock.local");
        assert_eq!(config.endpoints.aux_base_url, "http://aux.local");
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.fetch_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    #[serial]
    fn test_missing_delivery_url() {
        let mut guard = EnvGuard::clean();
        guard.set("GARDEN_RELAY_API_TOKEN", "secret");

        let result = Config::from_env();
        assert_eq!(
            result.unwrap_err(),
            ConfigError::MissingEnvVar("GARDEN_RELAY_DELIVERY_URL".to_string())
        );
    }

    #[test]
    #[serial]
    fn test_missing_token_without_unsafe_mode() {
        let mut guard = EnvGuard::clean();
        guard.set("GARDEN_RELAY_DELIVERY_URL", "http://bot.local");

        let result = Config::from_env();
        assert_eq!(
            result.unwrap_err(),
            ConfigError::MissingEnvVar("GARDEN_RELAY_API_TOKEN".to_string())
        );
    }

    #[test]
    #[serial]
    fn test_unsafe_mode_allows_missing_token() {
        let mut guard = EnvGuard::clean();
        guard.set("GARDEN_RELAY_DELIVERY_URL", "http://bot.local");
        guard.set("GARDEN_RELAY_UNSAFE_NO_AUTH", "TRUE");

        let config = Config::from_env().expect("should parse config");
        assert!(config.unsafe_no_auth);
        assert!(config.api_token.is_none());
    }

    #[test]
    #[serial]
    fn test_zero_interval_rejected() {
        let mut guard = EnvGuard::clean();
        guard.set("GARDEN_RELAY_DELIVERY_URL", "http://bot.local");
        guard.set("GARDEN_RELAY_API_TOKEN", "secret");
        guard.set("GARDEN_RELAY_INTERVAL_SECS", "0");

        let result = Config::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidFormat { ref var, .. }) if var == "GARDEN_RELAY_INTERVAL_SECS"
        ));
    }

    #[test]
    #[serial]
    fn test_oversized_interval_rejected() {
        let mut guard = EnvGuard::clean();
        guard.set("GARDEN_RELAY_DELIVERY_URL", "http://bot.local");
        guard.set("GARDEN_RELAY_API_TOKEN", "secret");
        guard.set("GARDEN_RELAY_INTERVAL_SECS", &u64::MAX.to_string());

        let result = Config::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidFormat { ref var, ref message })
                if var == "GARDEN_RELAY_INTERVAL_SECS" && message == "must be at most 86400"
        ));
    }

    #[test]
    #[serial]
    fn test_one_day_interval_accepted() {
        let mut guard = EnvGuard::clean();
        guard.set("GARDEN_RELAY_DELIVERY_URL", "http://bot.local");
        guard.set("GARDEN_RELAY_API_TOKEN", "secret");
        guard.set("GARDEN_RELAY_INTERVAL_SECS", "86400");

        let config = Config::from_env().expect("one day should be accepted");
        assert_eq!(config.interval, Duration::from_secs(MAX_INTERVAL_SECS));
    }

    #[test]
    #[serial]
    fn test_non_numeric_interval_rejected() {
        let mut guard = EnvGuard::clean();
        guard.set("GARDEN_RELAY_DELIVERY_URL", "http://bot.local");
        guard.set("GARDEN_RELAY_API_TOKEN", "secret");
        guard.set("GARDEN_RELAY_INTERVAL_SECS", "ten");

        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidFormat { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_zero_fetch_timeout_rejected() {
        let mut guard = EnvGuard::clean();
        guard.set("GARDEN_RELAY_DELIVERY_URL", "http://bot.local");
        guard.set("GARDEN_RELAY_API_TOKEN", "secret");
        guard.set("GARDEN_RELAY_FETCH_TIMEOUT_SECS", "0");

        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidFormat { ref var, .. }) if var == "GARDEN_RELAY_FETCH_TIMEOUT_SECS"
        ));
    }

    #[test]
    #[serial]
    fn test_invalid_port() {
        let mut guard = EnvGuard::clean();
        guard.set("GARDEN_RELAY_DELIVERY_URL", "http://bot.local");
        guard.set("GARDEN_RELAY_API_TOKEN", "secret");
        guard.set("PORT", "not-a-port");

        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidFormat { ref var, .. }) if var == "PORT"
        ));
    }

    #[test]
    #[serial]
    fn test_empty_values_treated_as_unset() {
        let mut guard = EnvGuard::clean();
        guard.set("GARDEN_RELAY_DELIVERY_URL", "http://bot.local");
        guard.set("GARDEN_RELAY_API_TOKEN", "secret");
        guard.set("GARDEN_RELAY_USERS_FILE", "   ");
        guard.set("GARDEN_RELAY_INTERVAL_SECS", "");

        let config = Config::from_env().expect("should parse config");
        assert_eq!(config.users_file, PathBuf::from(DEFAULT_USERS_FILE));
        assert_eq!(config.interval, Duration::from_secs(DEFAULT_INTERVAL_SECS));
    }
}
