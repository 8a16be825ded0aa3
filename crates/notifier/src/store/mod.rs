//! Notification store port.
//!
//! The worker only sees these operations. Each call is atomic from the
//! caller's point of view; how connections are acquired is the store's business.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgNotificationStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use herald_common::error::StoreError;
use herald_common::types::{ChannelType, Notification, NotificationStatus};

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert a new `Pending` notification with no attempts.
    async fn create(
        &self,
        message: &str,
        recipient: &str,
        channel_type: ChannelType,
    ) -> Result<Notification, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Notification, StoreError>;

    /// All `Pending` notifications, oldest `created_at` first.
    async fn list_pending(&self) -> Result<Vec<Notification>, StoreError>;

    /// Move a notification to `status`.
    ///
    /// Repeating the current status is a no-op. Any other move must be an
    /// edge of the delivery state machine.
    async fn update_status(&self, id: Uuid, status: NotificationStatus) -> Result<(), StoreError>;

    /// Atomically add one failed attempt and return the new count.
    async fn increment_retry_count(&self, id: Uuid) -> Result<u32, StoreError>;

    async fn set_processed_at(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Move a notification to `Sent` and stamp `processed_at` in one write.
    ///
    /// An earlier `processed_at` is kept. Repeating on a `Sent` record is a no-op.
    async fn mark_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Check a status change against the state machine.
///
/// Returns `Ok(false)` when `from == to` (nothing to write).
pub(crate) fn check_transition(
    id: Uuid,
    from: NotificationStatus,
    to: NotificationStatus,
) -> Result<bool, StoreError> {
    if from == to {
        return Ok(false);
    }
    if from.is_terminal() || !from.can_transition_to(to) {
        return Err(StoreError::InvalidTransition { id, from, to });
    }
    Ok(true)
}
