//! Store configuration - environment loading and validation
//!
//! Configuration is read once, at process start. The four connection
//! settings are required and their absence is fatal; pool sizing knobs fall
//! back to defaults. Credentials arrive as a single pre-parsed secret blob
//! (JSON `{"username": ..., "password": ...}`) so that secret retrieval
//! stays outside this crate.

use std::env;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

pub const ENV_HOST: &str = "SCRIBE_DB_HOST";
pub const ENV_PORT: &str = "SCRIBE_DB_PORT";
pub const ENV_DATABASE: &str = "SCRIBE_DB_NAME";
pub const ENV_CREDS: &str = "SCRIBE_DB_CREDS";
pub const ENV_TLS_REQUIRED: &str = "SCRIBE_DB_TLS_REQUIRED";
pub const ENV_MAX_CONNECTIONS: &str = "SCRIBE_DB_MAX_CONNECTIONS";
pub const ENV_IDLE_TIMEOUT_MS: &str = "SCRIBE_DB_IDLE_TIMEOUT_MS";
pub const ENV_ACQUIRE_TIMEOUT_MS: &str = "SCRIBE_DB_ACQUIRE_TIMEOUT_MS";
pub const ENV_MAX_LIFETIME_MS: &str = "SCRIBE_DB_MAX_LIFETIME_MS";

const DEFAULT_MAX_CONNECTIONS: u32 = 100;
const DEFAULT_IDLE_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_MAX_LIFETIME_MS: u64 = 1_800_000;

/// Database credential pair, parsed from the secret blob.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// Keep the password out of logs and error chains.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Parse the secret blob as supplied by the deployment environment.
    pub fn from_blob(blob: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(blob)?)
    }
}

/// Validated settings for the telemetry store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub credentials: Credentials,

    /// When true (the default), server certificates are verified. Only a
    /// designated non-production environment may turn this off.
    pub tls_required: bool,

    /// Upper bound on live connections; a process-wide resource budget.
    pub max_connections: u32,

    /// Idle connections past this age are retired by the pool's reaper.
    pub idle_timeout: Duration,

    /// How long an `acquire` may block before failing.
    pub acquire_timeout: Duration,

    /// Connections are retired after this age regardless of use, bounding
    /// long-lived-connection drift such as stale server-side state.
    pub max_lifetime: Duration,
}

impl StoreConfig {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file is honored in development if present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is absent or any
    /// present variable does not parse. Callers are expected to treat this
    /// as fatal and abort startup.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// `from_env` is this with `std::env::var`; tests supply a map.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = required(&get, ENV_HOST)?;
        let port = parsed(&get, ENV_PORT, None::<u16>)?;
        let database = required(&get, ENV_DATABASE)?;
        let credentials = Credentials::from_blob(&required(&get, ENV_CREDS)?)?;

        let tls_required = parsed(&get, ENV_TLS_REQUIRED, Some(true))?;
        let max_connections = parsed(&get, ENV_MAX_CONNECTIONS, Some(DEFAULT_MAX_CONNECTIONS))?;
        let idle_timeout = parsed(&get, ENV_IDLE_TIMEOUT_MS, Some(DEFAULT_IDLE_TIMEOUT_MS))?;
        let acquire_timeout = parsed(&get, ENV_ACQUIRE_TIMEOUT_MS, Some(DEFAULT_ACQUIRE_TIMEOUT_MS))?;
        let max_lifetime = parsed(&get, ENV_MAX_LIFETIME_MS, Some(DEFAULT_MAX_LIFETIME_MS))?;

        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_MAX_CONNECTIONS,
                reason: "pool must allow at least one connection".into(),
            });
        }

        Ok(Self {
            host,
            port,
            database,
            credentials,
            tls_required,
            max_connections,
            idle_timeout: Duration::from_millis(idle_timeout),
            acquire_timeout: Duration::from_millis(acquire_timeout),
            max_lifetime: Duration::from_millis(max_lifetime),
        })
    }
}

fn required<F>(get: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing { name }),
    }
}

/// Parse a variable, falling back to `default`; `None` default means the
/// variable is required.
fn parsed<F, T>(get: &F, name: &'static str, default: Option<T>) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match get(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => default.ok_or(ConfigError::Missing { name }),
    }
}
