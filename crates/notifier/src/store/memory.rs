//! In-memory notification store.
//!
//! Records live in a map keyed by id; a separate vector keeps insertion order
//! so equal `created_at` values still list in the order they were created.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use herald_common::error::StoreError;
use herald_common::types::{ChannelType, Notification, NotificationStatus};

use super::{NotificationStore, check_transition};
use crate::clock::{Clock, SystemClock};

#[derive(Default)]
struct MemoryState {
    records: HashMap<Uuid, Notification>,
    order: Vec<Uuid>,
}

impl MemoryState {
    fn record_mut(&mut self, id: Uuid) -> Result<&mut Notification, StoreError> {
        self.records.get_mut(&id).ok_or(StoreError::NotFound(id))
    }
}

pub struct MemoryStore {
    state: Mutex<MemoryState>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Stamp `created_at` from `clock` instead of the system time.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            clock,
        }
    }

    /// Insert a fully-formed record as is (seeding, imports).
    pub async fn insert(&self, notification: Notification) {
        let mut state = self.state.lock().await;
        if state
            .records
            .insert(notification.id, notification.clone())
            .is_none()
        {
            state.order.push(notification.id);
        }
    }

    /// Every record in insertion order.
    pub async fn snapshot(&self) -> Vec<Notification> {
        let state = self.state.lock().await;
        state
            .order
            .iter()
            .filter_map(|id| state.records.get(id).cloned())
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn create(
        &self,
        message: &str,
        recipient: &str,
        channel_type: ChannelType,
    ) -> Result<Notification, StoreError> {
        let notification = Notification::new(message, recipient, channel_type, self.clock.now());
        self.insert(notification.clone()).await;
        Ok(notification)
    }

    async fn get(&self, id: Uuid) -> Result<Notification, StoreError> {
        let state = self.state.lock().await;
        state.records.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn list_pending(&self) -> Result<Vec<Notification>, StoreError> {
        let state = self.state.lock().await;
        let mut pending: Vec<Notification> = state
            .order
            .iter()
            .filter_map(|id| state.records.get(id))
            .filter(|n| n.status == NotificationStatus::Pending)
            .cloned()
            .collect();
        // stable: ties keep insertion order
        pending.sort_by_key(|n| n.created_at);
        Ok(pending)
    }

    async fn update_status(&self, id: Uuid, status: NotificationStatus) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let record = state.record_mut(id)?;
        if check_transition(id, record.status, status)? {
            record.status = status;
        }
        Ok(())
    }

    async fn increment_retry_count(&self, id: Uuid) -> Result<u32, StoreError> {
        let mut state = self.state.lock().await;
        let record = state.record_mut(id)?;
        record.retry_count = record.retry_count.saturating_add(1);
        Ok(record.retry_count)
    }

    async fn set_processed_at(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.record_mut(id)?.processed_at = Some(at);
        Ok(())
    }

    async fn mark_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let record = state.record_mut(id)?;
        if check_transition(id, record.status, NotificationStatus::Sent)? {
            record.status = NotificationStatus::Sent;
            record.processed_at.get_or_insert(at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn fixed_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_create_starts_pending_with_zero_retries() {
        let store = MemoryStore::new();
        let n = store
            .create("Your order shipped", "ana@example.com", ChannelType::Email)
            .await
            .unwrap();

        assert_eq!(n.status, NotificationStatus::Pending);
        assert_eq!(n.retry_count, 0);
        assert!(n.processed_at.is_none());
        assert_eq!(store.get(n.id).await.unwrap(), n);
    }

    #[tokio::test]
    async fn test_list_pending_orders_oldest_first() {
        let clock = fixed_clock();
        let store = MemoryStore::with_clock(clock.clone());

        let mut late = Notification::new("late", "b", ChannelType::Sms, clock.now());
        late.created_at += chrono::Duration::minutes(5);
        store.insert(late.clone()).await;
        let early = store.create("early", "a", ChannelType::Sms).await.unwrap();
        let tie = store.create("tie", "c", ChannelType::Push).await.unwrap();

        let ids: Vec<Uuid> = store
            .list_pending()
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![early.id, tie.id, late.id]);
    }

    #[tokio::test]
    async fn test_list_pending_skips_other_statuses() {
        let store = MemoryStore::new();
        let a = store.create("a", "a", ChannelType::Email).await.unwrap();
        let b = store.create("b", "b", ChannelType::Email).await.unwrap();
        store
            .update_status(a.id, NotificationStatus::Processing)
            .await
            .unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);
    }

    #[tokio::test]
    async fn test_update_status_is_idempotent() {
        let store = MemoryStore::new();
        let n = store.create("m", "r", ChannelType::Push).await.unwrap();
        store
            .update_status(n.id, NotificationStatus::Processing)
            .await
            .unwrap();
        store
            .update_status(n.id, NotificationStatus::Processing)
            .await
            .unwrap();
        assert_eq!(
            store.get(n.id).await.unwrap().status,
            NotificationStatus::Processing
        );
    }

    #[tokio::test]
    async fn test_update_status_rejects_skipped_states() {
        let store = MemoryStore::new();
        let n = store.create("m", "r", ChannelType::Push).await.unwrap();
        let err = store
            .update_status(n.id, NotificationStatus::Sent)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        assert_eq!(
            store.get(n.id).await.unwrap().status,
            NotificationStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.update_status(id, NotificationStatus::Processing).await,
            Err(StoreError::NotFound(got)) if got == id
        ));
        assert!(matches!(
            store.increment_retry_count(id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.set_processed_at(id, Utc::now()).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.get(id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_increment_returns_new_count() {
        let store = MemoryStore::new();
        let n = store.create("m", "r", ChannelType::Email).await.unwrap();
        assert_eq!(store.increment_retry_count(n.id).await.unwrap(), 1);
        assert_eq!(store.increment_retry_count(n.id).await.unwrap(), 2);
        assert_eq!(store.get(n.id).await.unwrap().retry_count, 2);
    }

    #[tokio::test]
    async fn test_mark_sent_sets_status_and_timestamp_together() {
        let clock = fixed_clock();
        let store = MemoryStore::new();
        let n = store.create("m", "r", ChannelType::Sms).await.unwrap();

        // Not claimed yet: nothing changes.
        let err = store.mark_sent(n.id, clock.now()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        assert_eq!(store.get(n.id).await.unwrap(), n);

        store
            .update_status(n.id, NotificationStatus::Processing)
            .await
            .unwrap();
        store.mark_sent(n.id, clock.now()).await.unwrap();
        let sent = store.get(n.id).await.unwrap();
        assert_eq!(sent.status, NotificationStatus::Sent);
        assert_eq!(sent.processed_at, Some(clock.now()));

        // Repeating keeps the first stamp.
        let later = clock.now() + chrono::Duration::minutes(1);
        store.mark_sent(n.id, later).await.unwrap();
        assert_eq!(store.get(n.id).await.unwrap().processed_at, Some(clock.now()));
    }

    #[tokio::test]
    async fn test_set_processed_at_overwrites() {
        let clock = fixed_clock();
        let store = MemoryStore::new();
        let n = store.create("m", "r", ChannelType::Email).await.unwrap();

        let first = clock.now();
        store.set_processed_at(n.id, first).await.unwrap();
        let second = first + chrono::Duration::seconds(10);
        store.set_processed_at(n.id, second).await.unwrap();

        assert_eq!(store.get(n.id).await.unwrap().processed_at, Some(second));
    }
}
