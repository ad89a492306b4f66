//! Rate service configuration.

use std::time::Duration;

use snapworth_common::{constants, DurationExt};
use snapworth_fx::provider::{cfets, frankfurter, open_er};
use snapworth_fx::{FallbackPolicy, MockRateTable};

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Upstream provider endpoints.
#[derive(Debug, Clone)]
pub struct ProviderUrls {
    pub frankfurter: String,
    pub open_er_api: String,
    pub cfets: String,
}

impl Default for ProviderUrls {
    fn default() -> Self {
        Self {
            frankfurter: frankfurter::DEFAULT_URL.to_string(),
            open_er_api: open_er::DEFAULT_URL.to_string(),
            cfets: cfets::DEFAULT_URL.to_string(),
        }
    }
}

/// Main service configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// PostgreSQL URL. Without one, rates are cached in memory.
    pub database_url: Option<String>,
    pub environment: Environment,
    /// Shared secret for the refresh trigger.
    pub cron_secret: Option<String>,
    /// In-process refresh period; zero disables the scheduler.
    pub refresh_interval: Duration,
    pub providers: ProviderUrls,
    /// Log level.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8080,
            database_url: None,
            environment: Environment::Development,
            cron_secret: None,
            refresh_interval: constants::refresh_interval().as_std(),
            providers: ProviderUrls::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, ignoring unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("RATES_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Some(port) = lookup("RATES_LISTEN_PORT") {
            if let Ok(port) = port.parse() {
                config.listen_port = port;
            }
        }

        config.database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        config.cron_secret = lookup("CRON_SECRET").filter(|secret| !secret.is_empty());

        if let Some(env) = lookup("APP_ENV") {
            config.environment = Environment::parse(&env);
        }

        if let Some(secs) = lookup("REFRESH_INTERVAL_SECS") {
            if let Ok(secs) = secs.parse() {
                config.refresh_interval = Duration::from_secs(secs);
            }
        }

        if let Some(url) = lookup("FRANKFURTER_URL") {
            config.providers.frankfurter = url;
        }
        if let Some(url) = lookup("OPEN_ER_API_URL") {
            config.providers.open_er_api = url;
        }
        if let Some(url) = lookup("CFETS_URL") {
            config.providers.cfets = url;
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        if self.environment.is_production() && self.database_url.is_none() {
            return Err("DATABASE_URL is required in production".to_string());
        }

        if self.environment.is_production() && self.cron_secret.is_none() {
            return Err("CRON_SECRET is required in production".to_string());
        }

        Ok(())
    }

    /// Strict in production, the mock table anywhere else.
    pub fn fallback_policy(&self) -> FallbackPolicy {
        if self.environment.is_production() {
            FallbackPolicy::Strict
        } else {
            FallbackPolicy::MockTable(MockRateTable::default())
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }
}
