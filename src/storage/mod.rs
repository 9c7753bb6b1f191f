//! Storage backends for executing analytical queries.
//!
//! The gateway core treats query execution as an opaque capability: hand a
//! compiled [`QueryPlan`](crate::query::QueryPlan) to a backend, get JSON
//! rows back or fail. Failures propagate unchanged to the HTTP layer; there
//! is no retry, backoff, or cancellation.

pub mod duckdb;

use crate::query::QueryPlan;
use async_trait::async_trait;
use serde_json::Value;

#[cfg(test)]
use mockall::automock;

/// Errors surfaced by a storage backend.
///
/// The raw message travels verbatim to the caller; nothing is recovered
/// locally.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Database(#[from] ::duckdb::Error),
    #[error("{0}")]
    Internal(String),
}

/// Query execution interface consumed by the gateway core.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Prepares the backend for use (schema creation, pragmas).
    async fn init(&self) -> Result<(), StoreError>;

    /// Executes a compiled plan and returns one JSON object per row, keyed
    /// by column name.
    async fn fetch_rows(&self, plan: QueryPlan) -> Result<Vec<Value>, StoreError>;
}
