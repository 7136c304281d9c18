use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Only production is special; any other name runs as development.
    fn from_name(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    /// `None` selects the in-memory user store.
    pub database_url: Option<String>,
    pub log_level: String,
    pub json_logs: bool,
    pub request_timeout: Duration,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("APP_PORT").or_else(|| get("PORT")) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("invalid port value {raw:?}"))?,
            None => 8080,
        };
        let environment = get("APP_ENV")
            .or_else(|| get("ENV"))
            .map(|raw| Environment::from_name(&raw))
            .unwrap_or(Environment::Development);
        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| format!("invalid REQUEST_TIMEOUT_SECS value {raw:?}"))?,
            ),
            None => Duration::from_secs(15),
        };

        let config = Self {
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            environment,
            database_url: get("DATABASE_URL"),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            json_logs: get("LOG_FORMAT").map(|v| v == "json").unwrap_or(false),
            request_timeout,
            jwt: JwtConfig {
                secret: get("JWT_SECRET").unwrap_or_default(),
                issuer: get("JWT_ISSUER").unwrap_or_else(|| "plantpal-backend".into()),
            },
        };
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.environment == Environment::Production {
            if self.jwt.secret.is_empty() {
                bail!("JWT_SECRET is required in production");
            }
            if self.database_url.is_none() {
                bail!("DATABASE_URL is required in production");
            }
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}
