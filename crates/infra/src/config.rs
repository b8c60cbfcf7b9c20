//! Runtime configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `SEASONS_DATABASE_URL` (fallback `DATABASE_URL`) - Postgres URL; absent
//!   means the in-memory store
//! - `SEASONS_DB_MAX_CONNECTIONS` - pool size (default: 10)
//! - `SEASONS_BIND_ADDR` - listen address (default: 0.0.0.0:8080)
//! - `JWT_SECRET` - HS256 signing secret (default: a dev secret, with a warning)
//! - `SEASONS_ALLOCATION_POLICY` - `accept_partial` (default) or `require_complete`
//! - `SEASONS_BOX_SIZE` (5), `SEASONS_CYCLE_MONTHS` (3),
//!   `SEASONS_RETURN_GRACE_DAYS` (7), `SEASONS_SWAP_WINDOW_DAYS` (10)

use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

use seasons_subscriptions::CyclePolicy;

use crate::allocation::AllocationPolicy;

const DEV_JWT_SECRET: &str = "dev-secret-change-me";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid environment variable {name}: {reason}")]
    Invalid { name: String, reason: String },
}

impl ConfigError {
    fn invalid(name: &str, reason: impl core::fmt::Display) -> Self {
        Self::Invalid {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Implements `Debug` manually to redact secrets.
#[derive(Clone)]
pub struct RentalConfig {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub allocation_policy: AllocationPolicy,
    pub cycle: CyclePolicy,
}

impl core::fmt::Debug for RentalConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RentalConfig")
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"[REDACTED]")
            .field("allocation_policy", &self.allocation_policy)
            .field("cycle", &self.cycle)
            .finish()
    }
}

impl RentalConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if any variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = var("SEASONS_DATABASE_URL").or_else(|| var("DATABASE_URL"));

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set; using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let defaults = CyclePolicy::default();
        let cycle = CyclePolicy {
            box_size: parse_or(&var, "SEASONS_BOX_SIZE", defaults.box_size)?,
            cycle_months: parse_or(&var, "SEASONS_CYCLE_MONTHS", defaults.cycle_months)?,
            return_grace_days: parse_or(
                &var,
                "SEASONS_RETURN_GRACE_DAYS",
                defaults.return_grace_days,
            )?,
            swap_window_days: parse_or(&var, "SEASONS_SWAP_WINDOW_DAYS", defaults.swap_window_days)?,
        };
        if cycle.box_size == 0 {
            return Err(ConfigError::invalid("SEASONS_BOX_SIZE", "must be positive"));
        }
        if cycle.cycle_months == 0 {
            return Err(ConfigError::invalid("SEASONS_CYCLE_MONTHS", "must be positive"));
        }
        if cycle.return_grace_days < 0 {
            return Err(ConfigError::invalid(
                "SEASONS_RETURN_GRACE_DAYS",
                "must not be negative",
            ));
        }
        if cycle.swap_window_days < 0 {
            return Err(ConfigError::invalid(
                "SEASONS_SWAP_WINDOW_DAYS",
                "must not be negative",
            ));
        }

        let db_max_connections =
            parse_or(&var, "SEASONS_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        if db_max_connections == 0 {
            return Err(ConfigError::invalid(
                "SEASONS_DB_MAX_CONNECTIONS",
                "must be positive",
            ));
        }

        let bind_addr = match var("SEASONS_BIND_ADDR") {
            Some(raw) => raw
                .parse()
                .map_err(|e| ConfigError::invalid("SEASONS_BIND_ADDR", e))?,
            None => DEFAULT_BIND_ADDR
                .parse()
                .map_err(|e| ConfigError::invalid("SEASONS_BIND_ADDR", e))?,
        };

        Ok(Self {
            database_url,
            db_max_connections,
            bind_addr,
            jwt_secret,
            allocation_policy: parse_or(
                &var,
                "SEASONS_ALLOCATION_POLICY",
                AllocationPolicy::default(),
            )?,
            cycle,
        })
    }

    /// In-memory configuration for tests and local runs.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: None,
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: jwt_secret.into(),
            allocation_policy: AllocationPolicy::default(),
            cycle: CyclePolicy::default(),
        }
    }
}

fn parse_or<T, F>(var: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::invalid(name, e)),
        None => Ok(default),
    }
}
