use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Per-statement limit set on every pooled connection.
const STATEMENT_TIMEOUT_MS: u64 = 15_000;

/// Pool backing `PgNotificationStore`.
///
/// Store calls borrow one connection each and return it before the next
/// suspension point, so the worker needs a single connection; the rest serve
/// producers such as `enqueue`. An exhausted pool surfaces as a store error
/// after 5s rather than blocking the cycle.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query(&format!("SET statement_timeout = {STATEMENT_TIMEOUT_MS}"))
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await?;

    tracing::info!(
        max_connections,
        statement_timeout_ms = STATEMENT_TIMEOUT_MS,
        "Connected to PostgreSQL"
    );
    Ok(pool)
}

/// Apply the workspace migrations (creates the `notifications` table).
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
