//! Producer-facing entry point for creating notifications.

use std::sync::Arc;

use herald_common::error::{AppError, MAX_RECIPIENT_LEN, ValidationError};
use herald_common::types::{ChannelType, Notification};

use crate::store::NotificationStore;

/// Validates input and hands new notifications to the store.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// Create a `Pending` notification with no attempts.
    ///
    /// Input is stored as given; validation only rejects it.
    pub async fn create_notification(
        &self,
        message: &str,
        recipient: &str,
        channel_type: ChannelType,
    ) -> Result<Notification, AppError> {
        validate(message, recipient)?;

        let notification = self.store.create(message, recipient, channel_type).await?;
        tracing::info!(
            notification_id = %notification.id,
            channel = %channel_type,
            "Notification created"
        );
        Ok(notification)
    }
}

pub fn validate(message: &str, recipient: &str) -> Result<(), ValidationError> {
    if message.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    if recipient.trim().is_empty() {
        return Err(ValidationError::EmptyRecipient);
    }
    let len = recipient.chars().count();
    if len > MAX_RECIPIENT_LEN {
        return Err(ValidationError::RecipientTooLong {
            len,
            max: MAX_RECIPIENT_LEN,
        });
    }
    Ok(())
}
