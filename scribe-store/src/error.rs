//! Error types for the telemetry write path
//!
//! Two families: `ConfigError` is raised once, at startup, and is fatal;
//! `QueryError` is returned per call and is always recoverable by the caller
//! (retry, drop, or alert). Nothing in this crate unwinds across the store
//! boundary.

use thiserror::Error;

/// Configuration error raised while building [`crate::StoreConfig`].
///
/// Startup-only. A process that sees one of these cannot proceed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is absent
    #[error("missing required environment variable {name}")]
    Missing { name: &'static str },

    /// A variable is present but unusable
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    /// The credential secret blob did not parse
    #[error("credential blob is not valid JSON: {source}")]
    Credentials {
        #[from]
        source: serde_json::Error,
    },
}

/// Per-statement error returned by every store operation.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No connection could be acquired within the configured timeout:
    /// pool exhausted, pool closed, or the store is unreachable.
    ///
    /// No statement was attempted. Safe to retry.
    #[error("failed to acquire a connection from the pool")]
    Acquisition {
        #[source]
        source: sqlx::Error,
    },

    /// The statement itself was rejected: constraint violation, malformed
    /// SQL, or a store-side failure mid-statement.
    ///
    /// Retrying without changing the input will fail the same way.
    #[error("statement '{statement}' failed")]
    Execution {
        /// Name of the failing statement. Never carries bound values.
        statement: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl QueryError {
    pub(crate) fn acquisition(source: sqlx::Error) -> Self {
        Self::Acquisition { source }
    }

    pub(crate) fn execution(statement: &'static str, source: sqlx::Error) -> Self {
        Self::Execution { statement, source }
    }

    /// True for errors worth retrying without changing the input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Acquisition { .. })
    }

    /// Name of the statement that failed, if one was attempted.
    pub fn statement(&self) -> Option<&'static str> {
        match self {
            Self::Acquisition { .. } => None,
            Self::Execution { statement, .. } => Some(statement),
        }
    }
}
