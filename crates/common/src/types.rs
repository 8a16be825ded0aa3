use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery channel a notification is sent through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Email,
    Sms,
    Push,
}

impl ChannelType {
    pub const ALL: [ChannelType; 3] = [ChannelType::Email, ChannelType::Sms, ChannelType::Push];
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::Email => write!(f, "email"),
            ChannelType::Sms => write!(f, "sms"),
            ChannelType::Push => write!(f, "push"),
        }
    }
}

impl std::str::FromStr for ChannelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "email" => Ok(ChannelType::Email),
            "sms" => Ok(ChannelType::Sms),
            "push" => Ok(ChannelType::Push),
            other => Err(format!(
                "unknown channel type '{other}' (expected email, sms or push)"
            )),
        }
    }
}

/// Notification delivery status.
///
/// Allowed edges:
/// - `Pending -> Processing`
/// - `Processing -> Sent | Pending | Failed`
///
/// `Sent` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Processing,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, NotificationStatus::Sent | NotificationStatus::Failed)
    }

    /// Whether `self -> next` is an edge of the delivery state machine.
    ///
    /// Staying in the same status is not an edge; stores treat it as a no-op.
    pub fn can_transition_to(self, next: NotificationStatus) -> bool {
        use NotificationStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Processing, Sent) | (Processing, Pending) | (Processing, Failed)
        )
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationStatus::Pending => write!(f, "pending"),
            NotificationStatus::Processing => write!(f, "processing"),
            NotificationStatus::Sent => write!(f, "sent"),
            NotificationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A notification queued for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub message: String,
    pub recipient: String,
    pub channel_type: ChannelType,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    /// Set when the notification first reaches `Sent`.
    pub processed_at: Option<DateTime<Utc>>,
    /// Failed delivery attempts so far.
    pub retry_count: u32,
}

impl Notification {
    /// Build a fresh `Pending` record with no attempts.
    pub fn new(
        message: impl Into<String>,
        recipient: impl Into<String>,
        channel_type: ChannelType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: message.into(),
            recipient: recipient.into(),
            channel_type,
            status: NotificationStatus::Pending,
            created_at,
            processed_at: None,
            retry_count: 0,
        }
    }
}
