//! Runtime configuration, read from the environment (and `.env`) at startup.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `SERVICE_NAME` | `lms` |
//! | `HOST` | `0.0.0.0` |
//! | `PORT` | `8080` |
//! | `DATABASE_URL` | unset, in-memory storage |
//! | `DATABASE_MAX_CONNECTIONS` | `10` |
//! | `REQUEST_TIMEOUT_MS` | `2000` |
//! | `JWT_SECRET` | required |
//! | `ACCESS_TOKEN_TTL_MINUTES` | `60` |
//! | `REFRESH_TOKEN_TTL_HOURS` | `24` |
//! | `PASSWORD_HASH_ROUNDS` | `600000` |

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context};

#[derive(Debug, Clone)]
pub struct Config {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub request_timeout: Duration,
    pub jwt_secret: String,
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_ttl: chrono::Duration,
    pub password_rounds: u32,
}

impl Config {
    /// Defaults for everything except the signing secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            service_name: "lms".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: None,
            max_connections: 10,
            request_timeout: Duration::from_millis(2000),
            jwt_secret: jwt_secret.into(),
            access_token_ttl: chrono::Duration::minutes(60),
            refresh_token_ttl: chrono::Duration::hours(24),
            password_rounds: 600_000,
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let secret = env::var("JWT_SECRET")
            .ok()
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| anyhow!("JWT_SECRET must be set"))?;
        let defaults = Self::new(secret);

        Ok(Self {
            service_name: env::var("SERVICE_NAME").unwrap_or(defaults.service_name),
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parsed("PORT", defaults.port)?,
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            max_connections: parsed("DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            request_timeout: Duration::from_millis(parsed("REQUEST_TIMEOUT_MS", 2000)?),
            jwt_secret: defaults.jwt_secret,
            access_token_ttl: chrono::Duration::minutes(parsed("ACCESS_TOKEN_TTL_MINUTES", 60)?),
            refresh_token_ttl: chrono::Duration::hours(parsed("REFRESH_TOKEN_TTL_HOURS", 24)?),
            password_rounds: parsed("PASSWORD_HASH_ROUNDS", defaults.password_rounds)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|err| anyhow!("{err}"))
            .with_context(|| format!("invalid value for {name}: `{raw}`")),
        Err(_) => Ok(default),
    }
}
