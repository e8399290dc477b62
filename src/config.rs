//! Configuration management for expirywatch.
//!
//! Everything is read from environment variables once at startup. Values that
//! fail to parse are reported with `tracing::warn!` and replaced by their
//! defaults; a run never aborts on a bad setting. CLI flags are merged on top.

use std::time::Duration;

use crate::certs::DEFAULT_HANDSHAKE_TIMEOUT;
use crate::evaluation::{DEFAULT_MAX_CONCURRENCY, ExpiryWindow};
use crate::notifier::DEFAULT_TELEGRAM_API;
use crate::reachability::DEFAULT_PROBE_TIMEOUT;
use crate::registration::DEFAULT_WHOIS_CONCURRENCY;
use crate::retry::RetryConfig;
use crate::whois::DEFAULT_WHOIS_TIMEOUT;

pub const ENV_UPPER_BOUND: &str = "DAY_TO_CHECK_EXPIRY";
pub const ENV_LOWER_BOUND: &str = "LIMIT_DAY_TO_CHECK";
pub const ENV_MAX_RETRY: &str = "MAX_RETRY";
pub const ENV_MAX_CONCURRENT_CHECKS: &str = "MAX_CONCURRENT_CHECKS";
pub const ENV_MAX_CONCURRENT_WHOIS: &str = "MAX_CONCURRENT_WHOIS";
pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";

/// Main configuration structure for expirywatch.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Day-count window worth reporting
    pub window: ExpiryWindow,

    /// Concurrency, timeouts and retries
    pub network: NetworkConfig,

    /// Notification sink; `None` when credentials are incomplete
    pub telegram: Option<TelegramConfig>,
}

/// Network-related configuration options
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Evaluation tasks running at once
    pub max_concurrent_checks: usize,

    /// WHOIS lookups in flight at once
    pub max_concurrent_whois: usize,

    /// Total WHOIS attempts per lookup
    pub retry_attempts: u32,

    /// Sleep after the first failed WHOIS attempt, doubled each time
    pub retry_initial_delay: Duration,

    /// Budget for TCP connect plus TLS handshake
    pub tls_timeout: Duration,

    /// Timeout for the HTTPS reachability probe
    pub probe_timeout: Duration,

    /// Per socket operation WHOIS timeout
    pub whois_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_concurrent_checks: DEFAULT_MAX_CONCURRENCY,
            max_concurrent_whois: DEFAULT_WHOIS_CONCURRENCY,
            retry_attempts: 3,
            retry_initial_delay: Duration::from_secs(1),
            tls_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            whois_timeout: DEFAULT_WHOIS_TIMEOUT,
        }
    }
}

/// Telegram Bot API credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    /// Base URL of the Bot API, overridable for tests
    pub api_base: String,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: DEFAULT_TELEGRAM_API.to_string(),
        }
    }

    /// Token safe for logs: bot id kept, secret part hidden.
    pub fn masked_token(&self) -> String {
        mask_token(&self.bot_token)
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &self.masked_token())
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// `123456:ABCdef` becomes `123456:***`; tokens without an id are fully hidden.
pub fn mask_token(token: &str) -> String {
    match token.split_once(':') {
        Some((id, _)) if !id.is_empty() => format!("{id}:***"),
        _ => "***".to_string(),
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let upper = parse_or_default(&lookup, ENV_UPPER_BOUND, config.window.upper, |_| true);
        let lower = parse_or_default(&lookup, ENV_LOWER_BOUND, config.window.lower, |_| true);
        let window = ExpiryWindow::new(upper, lower);
        if window.is_valid() {
            config.window = window;
        } else {
            tracing::warn!(
                upper,
                lower,
                "expiry window must satisfy lower < 0 < upper, using defaults"
            );
        }

        config.network.retry_attempts = parse_or_default(
            &lookup,
            ENV_MAX_RETRY,
            config.network.retry_attempts,
            |v| *v >= 1,
        );
        config.network.max_concurrent_checks = parse_or_default(
            &lookup,
            ENV_MAX_CONCURRENT_CHECKS,
            config.network.max_concurrent_checks,
            |v| *v >= 1,
        );
        config.network.max_concurrent_whois = parse_or_default(
            &lookup,
            ENV_MAX_CONCURRENT_WHOIS,
            config.network.max_concurrent_whois,
            |v| *v >= 1,
        );

        let token = lookup(ENV_TELEGRAM_BOT_TOKEN).filter(|v| !v.trim().is_empty());
        let chat_id = lookup(ENV_TELEGRAM_CHAT_ID).filter(|v| !v.trim().is_empty());
        config.telegram = match (token, chat_id) {
            (Some(token), Some(chat_id)) => Some(TelegramConfig::new(token.trim(), chat_id.trim())),
            (None, None) => None,
            _ => {
                tracing::warn!("only one of the Telegram credentials is set, notifications disabled");
                None
            }
        };

        config
    }

    /// Merge with CLI arguments, giving CLI precedence
    pub fn merge_with_cli(&mut self, cli: &crate::cli::Cli) {
        if let Some(n) = cli.max_concurrency {
            self.network.max_concurrent_checks = n;
        }
        if let Some(n) = cli.whois_concurrency {
            self.network.max_concurrent_whois = n;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.window.is_valid() {
            return Err(ConfigError::InvalidValue {
                field: "window".to_string(),
                value: format!("({}, {})", self.window.lower, self.window.upper),
                reason: "Window must satisfy lower < 0 < upper".to_string(),
            });
        }

        if self.network.retry_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "network.retry_attempts".to_string(),
                value: "0".to_string(),
                reason: "At least one attempt is required".to_string(),
            });
        }

        if self.network.max_concurrent_checks == 0 || self.network.max_concurrent_whois == 0 {
            return Err(ConfigError::InvalidValue {
                field: "network.max_concurrent_*".to_string(),
                value: "0".to_string(),
                reason: "Concurrency limits must be at least 1".to_string(),
            });
        }

        if self.network.tls_timeout.is_zero() || self.network.whois_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "network.*_timeout".to_string(),
                value: "0".to_string(),
                reason: "Timeout must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Retry settings for WHOIS lookups
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.network.retry_attempts,
            initial_delay: self.network.retry_initial_delay,
            ..RetryConfig::default()
        }
    }
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T, accept: impl Fn(&T) -> bool) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if accept(&value) => value,
        _ => {
            tracing::warn!(key, value = %raw, %default, "invalid value, using default");
            default
        }
    }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
    /// Invalid configuration value
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue {
                field,
                value,
                reason,
            } => {
                write!(f, "Invalid value '{}' for '{}': {}", value, field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
