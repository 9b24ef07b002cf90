//! scribe-store: telemetry write path for the scribe request-logging
//! platform
//!
//! A connection-pooled client that ingests telemetry records - inbound API
//! requests, their responses, and user feedback - into Postgres. Exactly
//! one [`TelemetryStore`] should exist per process; the handle is cheap to
//! clone and is threaded through callers explicitly.
//!
//! ```ignore
//! let store = TelemetryStore::from_env()?;
//! schema::ensure(&store).await?;
//! store.insert_request(&request).await?;
//! store.close().await;
//! ```

pub mod config;
pub mod error;
pub mod records;
pub mod schema;
pub mod store;

mod pool;

pub use config::{Credentials, StoreConfig};
pub use error::{ConfigError, QueryError};
pub use records::{FeedbackRecord, RequestRecord, ResponseRecord};
pub use store::TelemetryStore;
