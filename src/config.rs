//! Config module contains the top-level config for the app.
use std::env;

use config_crate::{Config as RawConfig, ConfigError, Environment, File};

use sentry_integration::SentryConfig;

/// Basic settings - database and thread pool size
#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    pub database: String,
    pub thread_count: usize,
}

/// Redemption tuning
#[derive(Debug, Deserialize, Clone)]
pub struct Promo {
    /// Clamp fixed discounts to the order total
    #[serde(default)]
    pub clamp_fixed_discount: bool,
    /// How many times a redemption is attempted before a conflict is reported, 1 or 2
    #[serde(default = "default_redeem_attempts")]
    pub redeem_attempts: usize,
}

impl Default for Promo {
    fn default() -> Self {
        Self {
            clamp_fixed_discount: false,
            redeem_attempts: default_redeem_attempts(),
        }
    }
}

impl Promo {
    /// Attempts per redemption: the first try and at most one retry on conflict
    pub fn attempts(&self) -> usize {
        self.redeem_attempts.max(1).min(MAX_REDEEM_ATTEMPTS)
    }
}

const MAX_REDEEM_ATTEMPTS: usize = 2;

fn default_redeem_attempts() -> usize {
    MAX_REDEEM_ATTEMPTS
}

#[derive(Debug, Deserialize, Clone)]
pub struct Logging {
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Global app config
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: Server,
    #[serde(default)]
    pub promo: Promo,
    #[serde(default)]
    pub logging: Logging,
    pub sentry: Option<SentryConfig>,
}

impl Config {
    /// Creates config from base.toml, which are overwritten by <env>.toml, where env is one of
    /// development, test, production. After that it could be overwritten by env variables like
    /// PROMOS_SERVER__DATABASE (this will override `server.database` field in config).
    pub fn new() -> Result<Self, ConfigError> {
        let env = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        Config::with_env(env)
    }

    pub fn with_env(env: impl Into<String>) -> Result<Self, ConfigError> {
        let mut s = RawConfig::new();

        s.merge(File::with_name("config/base"))?;
        s.merge(File::with_name(&format!("config/{}", env.into())).required(false))?;
        s.merge(Environment::with_prefix("PROMOS").separator("__"))?;
        s.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeem_attempts_retry_conflicts_once_at_most() {
        let attempts = |redeem_attempts| {
            Promo {
                redeem_attempts,
                ..Default::default()
            }.attempts()
        };
        assert_eq!(attempts(0), 1);
        assert_eq!(attempts(1), 1);
        assert_eq!(attempts(2), 2);
        assert_eq!(attempts(10), 2);
    }
}
