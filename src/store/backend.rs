//! Primitive key-value interface the gateway is written against.
//!
//! Every mutating primitive is a single conditional request evaluated
//! atomically by the backend. The gateway never reads before it writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Event, EventPatch};

#[derive(Debug, Error)]
pub enum BackendError {
    /// The write precondition (exists / does not exist) did not hold.
    #[error("conditional check failed")]
    ConditionFailed,

    #[error("store call timed out after {0} ms")]
    Timeout(u64),

    #[error("store transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// One batch of a table scan.
#[derive(Debug, Default)]
pub struct ScanPage {
    pub items: Vec<Event>,
    /// Key to resume after; `None` once the table is exhausted.
    pub last_key: Option<String>,
}

#[async_trait]
pub trait EventBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Inserts `event` unless an item with the same id exists.
    async fn put_if_absent(&self, event: &Event) -> Result<(), BackendError>;

    /// Strongly consistent read by id.
    async fn get(&self, event_id: &str) -> Result<Option<Event>, BackendError>;

    /// Returns up to `limit` items (capped by the backend's own page size)
    /// following `start_after` in scan order.
    async fn scan(&self, start_after: Option<&str>, limit: usize)
        -> Result<ScanPage, BackendError>;

    /// Applies `patch` only if the item exists and returns the new state.
    async fn update_if_exists(
        &self,
        event_id: &str,
        patch: &EventPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Event, BackendError>;

    /// Removes the item only if it exists.
    async fn delete_if_exists(&self, event_id: &str) -> Result<(), BackendError>;

    /// Releases connections. Default is a no-op.
    async fn close(&self) {}
}
