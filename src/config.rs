//! Process configuration, read once at startup.
//!
//! | Variable                 | Required | Default   |
//! |--------------------------|----------|-----------|
//! | `ACCESS_TOKEN_SECRET`    | yes      |           |
//! | `ACCESS_TOKEN_EXPIRY`    | yes      |           |
//! | `REFRESH_TOKEN_SECRET`   | yes      |           |
//! | `REFRESH_TOKEN_EXPIRY`   | yes      |           |
//! | `TOKEN_CLOCK_SKEW_SECS`  | no       | `0`       |
//! | `PORT`                   | no       | `8000`    |
//! | `CORS_ORIGIN`            | no       | disabled  |
//! | `DATABASE_URL`           | no       | in-memory |
//!
//! Expiry values accept humantime strings (`15m`, `1d`, `10d`) or plain seconds.

use std::fmt;
use std::time::Duration;

use axum::http::HeaderValue;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Signing secrets and lifetimes for access and refresh tokens.
#[derive(Clone)]
pub struct AuthConfig {
    access_token_secret: String,
    access_token_expiry: Duration,
    refresh_token_secret: String,
    refresh_token_expiry: Duration,
    clock_skew_secs: u64,
}

impl AuthConfig {
    pub fn new(
        access_token_secret: impl Into<String>,
        access_token_expiry: Duration,
        refresh_token_secret: impl Into<String>,
        refresh_token_expiry: Duration,
    ) -> Result<Self, ConfigError> {
        let access_token_secret = access_token_secret.into();
        let refresh_token_secret = refresh_token_secret.into();

        if access_token_secret.is_empty() {
            return Err(ConfigError::Missing("ACCESS_TOKEN_SECRET"));
        }
        if refresh_token_secret.is_empty() {
            return Err(ConfigError::Missing("REFRESH_TOKEN_SECRET"));
        }
        if access_token_secret == refresh_token_secret {
            return Err(ConfigError::Invalid {
                name: "REFRESH_TOKEN_SECRET",
                reason: "must differ from ACCESS_TOKEN_SECRET".to_string(),
            });
        }
        check_expiry("ACCESS_TOKEN_EXPIRY", access_token_expiry)?;
        check_expiry("REFRESH_TOKEN_EXPIRY", refresh_token_expiry)?;

        Ok(Self {
            access_token_secret,
            access_token_expiry,
            refresh_token_secret,
            refresh_token_expiry,
            clock_skew_secs: 0,
        })
    }

    /// Tolerate this many seconds of clock drift when checking `exp`.
    pub fn with_clock_skew(mut self, secs: u64) -> Self {
        self.clock_skew_secs = secs;
        self
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let access_token_secret = required("ACCESS_TOKEN_SECRET")?;
        let access_token_expiry =
            parse_expiry("ACCESS_TOKEN_EXPIRY", &required("ACCESS_TOKEN_EXPIRY")?)?;
        let refresh_token_secret = required("REFRESH_TOKEN_SECRET")?;
        let refresh_token_expiry =
            parse_expiry("REFRESH_TOKEN_EXPIRY", &required("REFRESH_TOKEN_EXPIRY")?)?;

        let clock_skew_secs = match lookup("TOKEN_CLOCK_SKEW_SECS") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "TOKEN_CLOCK_SKEW_SECS",
                reason: format!("expected a whole number of seconds, got {raw:?}"),
            })?,
            None => 0,
        };

        Ok(Self::new(
            access_token_secret,
            access_token_expiry,
            refresh_token_secret,
            refresh_token_expiry,
        )?
        .with_clock_skew(clock_skew_secs))
    }

    pub fn access_token_secret(&self) -> &[u8] {
        self.access_token_secret.as_bytes()
    }

    pub fn refresh_token_secret(&self) -> &[u8] {
        self.refresh_token_secret.as_bytes()
    }

    pub fn access_token_expiry(&self) -> Duration {
        self.access_token_expiry
    }

    pub fn refresh_token_expiry(&self) -> Duration {
        self.refresh_token_expiry
    }

    pub fn clock_skew_secs(&self) -> u64 {
        self.clock_skew_secs
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token_secret", &"<redacted>")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token_secret", &"<redacted>")
            .field("refresh_token_expiry", &self.refresh_token_expiry)
            .field("clock_skew_secs", &self.clock_skew_secs)
            .finish()
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub cors_origin: Option<HeaderValue>,
    pub database_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            cors_origin: None,
            database_url: None,
        }
    }
}

impl ServerConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                reason: format!("expected a port number, got {raw:?}"),
            })?,
            None => 8000,
        };

        let cors_origin = match lookup("CORS_ORIGIN").filter(|o| !o.trim().is_empty()) {
            Some(origin) => Some(HeaderValue::from_str(origin.trim()).map_err(|e| {
                ConfigError::Invalid {
                    name: "CORS_ORIGIN",
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };

        Ok(Self {
            bind_addr: format!("0.0.0.0:{port}"),
            cors_origin,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup = |name: &str| std::env::var(name).ok();
        Ok(Self {
            server: ServerConfig::from_lookup(lookup)?,
            auth: AuthConfig::from_lookup(lookup)?,
        })
    }
}

/// Upper bound on token lifetimes, roughly a century.
const MAX_TOKEN_EXPIRY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

fn check_expiry(name: &'static str, expiry: Duration) -> Result<(), ConfigError> {
    if expiry.as_secs() == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be at least one second".to_string(),
        });
    }
    if expiry > MAX_TOKEN_EXPIRY {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("must not exceed {}", humantime::format_duration(MAX_TOKEN_EXPIRY)),
        });
    }
    Ok(())
}

fn parse_expiry(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let raw = raw.trim();
    if raw.chars().all(|c| c.is_ascii_digit()) {
        return raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            });
    }

    humantime::parse_duration(raw).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}
