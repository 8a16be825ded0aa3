use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::types::{ChannelType, NotificationStatus};

/// Maximum recipient length accepted at creation (matches the column width).
pub const MAX_RECIPIENT_LEN: usize = 255;

/// Malformed input to `CreateNotification`. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message must not be empty")]
    EmptyMessage,

    #[error("recipient must not be empty")]
    EmptyRecipient,

    #[error("recipient is {len} characters, maximum is {max}")]
    RecipientTooLong { len: usize, max: usize },
}

/// Persistence failure raised by a notification store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("notification {0} not found")]
    NotFound(Uuid),

    #[error("notification {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: NotificationStatus,
        to: NotificationStatus,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failure reported by a delivery gateway. Drives the retry state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("relay rejected delivery with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("no gateway registered for channel {0}")]
    UnsupportedChannel(ChannelType),
}

/// The pending list could not be fetched; the whole cycle is abandoned.
#[derive(Debug, Error)]
#[error("cycle aborted, pending notifications could not be listed: {0}")]
pub struct CycleAbortError(#[source] pub StoreError);

/// Errors surfaced to producers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_abort_keeps_store_error_as_source() {
        let err = CycleAbortError(StoreError::Unavailable("connection refused".into()));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("store unavailable: connection refused"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_app_error_wraps_validation() {
        let err: AppError = ValidationError::EmptyRecipient.into();
        assert!(matches!(err, AppError::Validation(ValidationError::EmptyRecipient)));
        assert_eq!(err.to_string(), "Validation error: recipient must not be empty");
    }

    #[test]
    fn test_invalid_transition_message() {
        let id = Uuid::nil();
        let err = StoreError::InvalidTransition {
            id,
            from: NotificationStatus::Failed,
            to: NotificationStatus::Pending,
        };
        assert_eq!(
            err.to_string(),
            format!("notification {id} cannot move from failed to pending")
        );
    }
}
