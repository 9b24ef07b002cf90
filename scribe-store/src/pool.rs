//! Connection pool construction
//!
//! Builds the sqlx `PgPool` from validated [`StoreConfig`]. The pool is
//! lazy: no network I/O happens at construction, so an unreachable store
//! first surfaces as an acquisition error on use, not at startup. The
//! pool's reaper retires connections idle past `idle_timeout` and any
//! connection older than `max_lifetime`.

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{Connection, PgPool};

use crate::config::StoreConfig;

/// Connections idle at least this long are pinged before being handed out;
/// a failed ping evicts the connection instead of recycling it.
const IDLE_PING_AFTER: Duration = Duration::from_secs(1);

fn ssl_mode(tls_required: bool) -> PgSslMode {
    if tls_required {
        PgSslMode::VerifyFull
    } else {
        // Designated non-production mode only.
        PgSslMode::Prefer
    }
}

fn connect_options(config: &StoreConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.credentials.username)
        .password(&config.credentials.password)
        .ssl_mode(ssl_mode(config.tls_required))
        .application_name("scribe-store")
}

/// Build the bounded connection pool for the telemetry store.
pub(crate) fn build_pool(config: &StoreConfig) -> PgPool {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .before_acquire(|conn, meta| {
            Box::pin(async move {
                // A socket dropped while the connection sat idle must not
                // reach a caller; log the eviction and let the pool dial a
                // replacement. Never fatal.
                if meta.idle_for >= IDLE_PING_AFTER {
                    if let Err(error) = conn.ping().await {
                        tracing::warn!(
                            error = %error,
                            idle_ms = meta.idle_for.as_millis() as u64,
                            "evicting broken idle connection"
                        );
                        return Ok(false);
                    }
                }
                Ok(true)
            })
        })
        .connect_lazy_with(connect_options(config))
}
