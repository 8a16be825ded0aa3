//! PostgreSQL notification store.
//!
//! Every operation is a single statement, except `update_status` and
//! `mark_sent`, which read the current status under `FOR UPDATE` and write in
//! one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use herald_common::error::StoreError;
use herald_common::types::{ChannelType, Notification, NotificationStatus};

use super::{NotificationStore, check_transition};

const COLUMNS: &str =
    "id, message, recipient, channel_type, status, created_at, processed_at, retry_count";

/// Row shape as stored; `retry_count` is a signed `INTEGER` column.
#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    message: String,
    recipient: String,
    channel_type: ChannelType,
    status: NotificationStatus,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    retry_count: i32,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let retry_count = count_from_db(row.id, row.retry_count)?;

        Ok(Notification {
            id: row.id,
            message: row.message,
            recipient: row.recipient,
            channel_type: row.channel_type,
            status: row.status,
            created_at: row.created_at,
            processed_at: row.processed_at,
            retry_count,
        })
    }
}

fn count_from_db(id: Uuid, value: i32) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| {
        StoreError::Database(sqlx::Error::Decode(
            format!("negative retry_count {value} for {id}").into(),
        ))
    })
}

/// Store backed by the `notifications` table.
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(
        &self,
        message: &str,
        recipient: &str,
        channel_type: ChannelType,
    ) -> Result<Notification, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO notifications (id, message, recipient, channel_type, status, created_at, retry_count)
            VALUES ($1, $2, $3, $4, $5, $6, 0)
            RETURNING {COLUMNS}
            "#
        );

        let row: NotificationRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(message)
            .bind(recipient)
            .bind(channel_type)
            .bind(NotificationStatus::Pending)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn get(&self, id: Uuid) -> Result<Notification, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM notifications WHERE id = $1");
        let row: NotificationRow = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        row.try_into()
    }

    async fn list_pending(&self) -> Result<Vec<Notification>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM notifications WHERE status = $1 ORDER BY created_at ASC, seq ASC"
        );
        let rows: Vec<NotificationRow> = sqlx::query_as(&sql)
            .bind(NotificationStatus::Pending)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn update_status(&self, id: Uuid, status: NotificationStatus) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let current: NotificationStatus =
            sqlx::query_scalar("SELECT status FROM notifications WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::NotFound(id))?;

        if !check_transition(id, current, status)? {
            return Ok(());
        }

        sqlx::query("UPDATE notifications SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn increment_retry_count(&self, id: Uuid) -> Result<u32, StoreError> {
        let count: i32 = sqlx::query_scalar(
            "UPDATE notifications SET retry_count = retry_count + 1 WHERE id = $1 RETURNING retry_count",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        count_from_db(id, count)
    }

    async fn set_processed_at(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE notifications SET processed_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn mark_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let current: NotificationStatus =
            sqlx::query_scalar("SELECT status FROM notifications WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::NotFound(id))?;

        if !check_transition(id, current, NotificationStatus::Sent)? {
            return Ok(());
        }

        sqlx::query(
            "UPDATE notifications SET status = $2, processed_at = COALESCE(processed_at, $3) WHERE id = $1",
        )
        .bind(id)
        .bind(NotificationStatus::Sent)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
