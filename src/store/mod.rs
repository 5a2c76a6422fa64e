//! Event store gateway.
//!
//! Translates domain operations into conditional backend primitives and maps
//! backend failures onto the domain error kinds the HTTP layer understands.

pub mod backend;
pub mod memory;
pub mod postgres;

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use thiserror::Error;
use tracing::{error, info};

use crate::models::{Event, EventPatch, NewEvent};

pub use backend::{BackendError, EventBackend, ScanPage};
pub use memory::MemoryBackend;
pub use postgres::PostgresBackend;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Event with ID '{0}' not found")]
    NotFound(String),

    #[error("Event with ID '{0}' already exists")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),

    #[error("event store `{operation}` failed{}", describe_key(.key))]
    Connection {
        operation: &'static str,
        key: Option<String>,
        #[source]
        source: BackendError,
    },
}

fn describe_key(key: &Option<String>) -> String {
    key.as_ref()
        .map(|k| format!(" for event '{}'", k))
        .unwrap_or_default()
}

/// Shared handle to the event table. Cheap to clone; safe to use from
/// concurrent requests.
#[derive(Clone)]
pub struct EventGateway {
    backend: Arc<dyn EventBackend>,
}

impl EventGateway {
    pub fn new(backend: Arc<dyn EventBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Inserts `event`, stamping both timestamps. Fails with `Conflict` when the id is taken.
    pub async fn create(&self, event: NewEvent) -> Result<Event, StoreError> {
        ensure_event_id(&event.event_id)?;
        let event = event.into_event(now());

        match self.backend.put_if_absent(&event).await {
            Ok(()) => {
                info!(event_id = %event.event_id, "Created event");
                Ok(event)
            }
            Err(BackendError::ConditionFailed) => Err(StoreError::Conflict(event.event_id)),
            Err(e) => Err(connection_error("create", Some(&event.event_id), e)),
        }
    }

    pub async fn get(&self, event_id: &str) -> Result<Option<Event>, StoreError> {
        ensure_event_id(event_id)?;
        self.backend
            .get(event_id)
            .await
            .map_err(|e| connection_error("get", Some(event_id), e))
    }

    /// Scans the table, following continuation keys until the store runs out
    /// or `limit` items have been collected. Order carries no meaning.
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<Event>, StoreError> {
        let mut items: Vec<Event> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let wanted = match limit {
                Some(limit) if items.len() >= limit => break,
                Some(limit) => limit - items.len(),
                None => usize::MAX,
            };

            let page = self
                .backend
                .scan(cursor.as_deref(), wanted)
                .await
                .map_err(|e| connection_error("list", None, e))?;
            items.extend(page.items);

            match page.last_key {
                Some(key) if cursor.as_deref() != Some(key.as_str()) => cursor = Some(key),
                _ => break,
            }
        }

        if let Some(limit) = limit {
            items.truncate(limit);
        }
        info!(count = items.len(), "Listed events");
        Ok(items)
    }

    /// Applies `patch` atomically if the event exists. An empty patch reads
    /// the current state back without touching `updated_at`.
    pub async fn update(&self, event_id: &str, patch: &EventPatch) -> Result<Event, StoreError> {
        ensure_event_id(event_id)?;

        if patch.is_empty() {
            return self
                .get(event_id)
                .await?
                .ok_or_else(|| StoreError::NotFound(event_id.to_string()));
        }

        match self.backend.update_if_exists(event_id, patch, now()).await {
            Ok(event) => {
                info!(event_id = %event_id, "Updated event");
                Ok(event)
            }
            Err(BackendError::ConditionFailed) => Err(StoreError::NotFound(event_id.to_string())),
            Err(e) => Err(connection_error("update", Some(event_id), e)),
        }
    }

    pub async fn delete(&self, event_id: &str) -> Result<(), StoreError> {
        ensure_event_id(event_id)?;

        match self.backend.delete_if_exists(event_id).await {
            Ok(()) => {
                info!(event_id = %event_id, "Deleted event");
                Ok(())
            }
            Err(BackendError::ConditionFailed) => Err(StoreError::NotFound(event_id.to_string())),
            Err(e) => Err(connection_error("delete", Some(event_id), e)),
        }
    }

    pub async fn close(&self) {
        self.backend.close().await;
    }
}

/// Store timestamps keep microsecond precision so a read-back compares equal.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn ensure_event_id(event_id: &str) -> Result<(), StoreError> {
    if event_id.trim().is_empty() {
        return Err(StoreError::Invalid("Event ID cannot be empty".to_string()));
    }
    Ok(())
}

fn connection_error(operation: &'static str, key: Option<&str>, source: BackendError) -> StoreError {
    error!(operation, key = key.unwrap_or("-"), error = %source, "Event store call failed");
    StoreError::Connection {
        operation,
        key: key.map(str::to_string),
        source,
    }
}
