use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::{merge_update, Event, EventPatch};
use crate::store::backend::{BackendError, EventBackend, ScanPage};

/// In-process backend. Each primitive runs under one lock acquisition, which
/// gives it the same atomic conditional semantics as the external store.
pub struct MemoryBackend {
    items: RwLock<BTreeMap<String, Event>>,
    page_size: usize,
}

impl MemoryBackend {
    pub fn new(page_size: usize) -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.items.read().await.len()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl EventBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put_if_absent(&self, event: &Event) -> Result<(), BackendError> {
        let mut items = self.items.write().await;
        if items.contains_key(&event.event_id) {
            return Err(BackendError::ConditionFailed);
        }
        items.insert(event.event_id.clone(), event.clone());
        Ok(())
    }

    async fn get(&self, event_id: &str) -> Result<Option<Event>, BackendError> {
        Ok(self.items.read().await.get(event_id).cloned())
    }

    async fn scan(
        &self,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<ScanPage, BackendError> {
        let take = limit.min(self.page_size);
        let items = self.items.read().await;
        let lower = match start_after {
            Some(key) => Bound::Excluded(key.to_string()),
            None => Bound::Unbounded,
        };

        let mut range = items.range((lower, Bound::Unbounded));
        let page: Vec<Event> = range.by_ref().take(take).map(|(_, e)| e.clone()).collect();
        let last_key = match (range.next(), page.last()) {
            (Some(_), Some(last)) => Some(last.event_id.clone()),
            _ => None,
        };

        Ok(ScanPage {
            items: page,
            last_key,
        })
    }

    async fn update_if_exists(
        &self,
        event_id: &str,
        patch: &EventPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Event, BackendError> {
        let mut items = self.items.write().await;
        let existing = items
            .remove(event_id)
            .ok_or(BackendError::ConditionFailed)?;
        let merged = merge_update(existing, patch, updated_at);
        items.insert(event_id.to_string(), merged.clone());
        Ok(merged)
    }

    async fn delete_if_exists(&self, event_id: &str) -> Result<(), BackendError> {
        match self.items.write().await.remove(event_id) {
            Some(_) => Ok(()),
            None => Err(BackendError::ConditionFailed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventStatus;

    fn event(id: &str) -> Event {
        let now = Utc::now();
        Event {
            event_id: id.to_string(),
            title: "Title".to_string(),
            description: "Description".to_string(),
            date: "2024-06-15".to_string(),
            location: "Somewhere".to_string(),
            capacity: 10,
            organizer: "Org".to_string(),
            status: EventStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_put_if_absent_rejects_duplicate() {
        let backend = MemoryBackend::default();
        backend.put_if_absent(&event("a")).await.unwrap();
        let err = backend.put_if_absent(&event("a")).await.unwrap_err();
        assert!(matches!(err, BackendError::ConditionFailed));
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_scan_pages_by_page_size() {
        let backend = MemoryBackend::new(2);
        for id in ["a", "b", "c", "d", "e"] {
            backend.put_if_absent(&event(id)).await.unwrap();
        }

        let first = backend.scan(None, 10).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.last_key.as_deref(), Some("b"));

        let second = backend.scan(Some("b"), 10).await.unwrap();
        assert_eq!(second.items[0].event_id, "c");

        let last = backend.scan(Some("d"), 10).await.unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(last.last_key.is_none());
    }

    #[tokio::test]
    async fn test_scan_exact_page_has_no_continuation() {
        let backend = MemoryBackend::new(2);
        for id in ["a", "b"] {
            backend.put_if_absent(&event(id)).await.unwrap();
        }
        let page = backend.scan(None, 2).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.last_key.is_none());
    }

    #[tokio::test]
    async fn test_conditional_update_and_delete_require_existing_item() {
        let backend = MemoryBackend::default();
        let patch = EventPatch {
            capacity: Some(5),
            ..EventPatch::default()
        };
        assert!(matches!(
            backend.update_if_exists("missing", &patch, Utc::now()).await,
            Err(BackendError::ConditionFailed)
        ));
        assert!(matches!(
            backend.delete_if_exists("missing").await,
            Err(BackendError::ConditionFailed)
        ));
        assert_eq!(backend.len().await, 0);
    }
}
