//! Dispatch worker: polls pending notifications and drives each one through
//! `Pending -> Processing -> {Sent | Pending | Failed}`.
//!
//! Items are handled one at a time, oldest first. Every suspension point
//! before and during delivery races the cancellation token; once a delivery
//! outcome is known it is always written back.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use herald_common::config::AppConfig;
use herald_common::error::{CycleAbortError, StoreError};
use herald_common::types::{Notification, NotificationStatus};

use crate::clock::{Clock, Sleeper, SystemClock, TokioSleeper};
use crate::gateway::DeliveryGateway;
use crate::retry::{DEFAULT_MAX_RETRIES, RetryDecision, RetryPolicy};
use crate::store::NotificationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Sleep between cycles.
    pub poll_interval: Duration,
    /// Sleep after a cycle that could not list pending notifications.
    pub error_backoff: Duration,
    pub max_retries: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            error_backoff: Duration::from_secs(60),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl From<&AppConfig> for WorkerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            error_backoff: Duration::from_secs(config.error_backoff_secs),
            max_retries: config.max_retries,
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub sent: usize,
    pub requeued: usize,
    pub failed: usize,
    /// Items abandoned for this cycle after a store error.
    pub skipped: usize,
    /// The cycle stopped early on cancellation.
    pub cancelled: bool,
}

/// Totals over the worker's lifetime, returned when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub cycles: usize,
    pub aborted_cycles: usize,
    pub sent: usize,
    pub requeued: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl WorkerSummary {
    fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.sent += report.sent;
        self.requeued += report.requeued;
        self.failed += report.failed;
        self.skipped += report.skipped;
    }

    fn record_abort(&mut self) {
        self.cycles += 1;
        self.aborted_cycles += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Sent,
    Requeued,
    Failed,
}

#[derive(Debug)]
enum ItemError {
    Store(StoreError),
    Cancelled,
}

impl From<StoreError> for ItemError {
    fn from(err: StoreError) -> Self {
        ItemError::Store(err)
    }
}

pub struct DispatchWorker {
    store: Arc<dyn NotificationStore>,
    gateway: Arc<dyn DeliveryGateway>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    config: WorkerConfig,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl DispatchWorker {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        gateway: Arc<dyn DeliveryGateway>,
        config: WorkerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            gateway,
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper),
            policy: RetryPolicy::new(config.max_retries),
            config,
            cancel,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Run cycles until the cancellation token fires.
    ///
    /// Never fails: a cycle that cannot list pending work is logged and
    /// followed by the longer error backoff.
    pub async fn run(&self) -> WorkerSummary {
        tracing::info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            error_backoff_secs = self.config.error_backoff.as_secs(),
            max_retries = self.config.max_retries,
            gateway = self.gateway.name(),
            "Dispatch worker started"
        );

        let mut summary = WorkerSummary::default();

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let pause = match self.run_cycle().await {
                Ok(report) => {
                    summary.record(&report);
                    if report.fetched > 0 {
                        tracing::info!(
                            fetched = report.fetched,
                            sent = report.sent,
                            requeued = report.requeued,
                            failed = report.failed,
                            skipped = report.skipped,
                            "Dispatch cycle complete"
                        );
                    } else {
                        tracing::debug!("No pending notifications");
                    }
                    if report.cancelled {
                        break;
                    }
                    self.config.poll_interval
                }
                Err(e) => {
                    summary.record_abort();
                    tracing::error!(
                        error = %e,
                        backoff_secs = self.config.error_backoff.as_secs(),
                        "Dispatch cycle aborted"
                    );
                    self.config.error_backoff
                }
            };

            if self.guarded(self.sleeper.sleep(pause)).await.is_none() {
                break;
            }
        }

        tracing::info!(
            cycles = summary.cycles,
            aborted_cycles = summary.aborted_cycles,
            sent = summary.sent,
            failed = summary.failed,
            "Dispatch worker stopped"
        );
        summary
    }

    /// Run a single cycle over the current pending list.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleAbortError> {
        let mut report = CycleReport::default();

        let pending = match self.guarded(self.store.list_pending()).await {
            Some(listed) => listed.map_err(CycleAbortError)?,
            None => {
                report.cancelled = true;
                return Ok(report);
            }
        };
        report.fetched = pending.len();

        for notification in &pending {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            match self.dispatch(notification).await {
                Ok(ItemOutcome::Sent) => report.sent += 1,
                Ok(ItemOutcome::Requeued) => report.requeued += 1,
                Ok(ItemOutcome::Failed) => report.failed += 1,
                Err(ItemError::Store(e)) => {
                    tracing::warn!(
                        notification_id = %notification.id,
                        error = %e,
                        "Store error, skipping notification this cycle"
                    );
                    report.skipped += 1;
                }
                Err(ItemError::Cancelled) => {
                    tracing::info!(
                        notification_id = %notification.id,
                        "Cancelled while dispatching notification"
                    );
                    report.cancelled = true;
                    break;
                }
            }
        }

        Ok(report)
    }

    async fn dispatch(&self, notification: &Notification) -> Result<ItemOutcome, ItemError> {
        let id = notification.id;

        self.store_call(self.store.update_status(id, NotificationStatus::Processing))
            .await?;

        let delivery = self
            .guarded(self.gateway.send(
                &notification.recipient,
                &notification.message,
                notification.channel_type,
            ))
            .await
            .ok_or(ItemError::Cancelled)?;

        // The outcome is known from here on; persist it even if cancelled.
        match delivery {
            Ok(()) => {
                self.store.mark_sent(id, self.clock.now()).await?;

                tracing::info!(
                    notification_id = %id,
                    channel = %notification.channel_type,
                    "Notification sent"
                );
                Ok(ItemOutcome::Sent)
            }
            Err(delivery_error) => {
                let retry_count = self.store.increment_retry_count(id).await?;
                let decision = self.policy.decide(retry_count);
                self.store.update_status(id, decision.next_status()).await?;

                match decision {
                    RetryDecision::Retry => {
                        tracing::warn!(
                            notification_id = %id,
                            channel = %notification.channel_type,
                            retry_count,
                            max_retries = self.policy.max_retries,
                            error = %delivery_error,
                            "Delivery failed, will retry"
                        );
                        Ok(ItemOutcome::Requeued)
                    }
                    RetryDecision::GiveUp => {
                        tracing::error!(
                            notification_id = %id,
                            channel = %notification.channel_type,
                            retry_count,
                            error = %delivery_error,
                            "Delivery failed, giving up"
                        );
                        Ok(ItemOutcome::Failed)
                    }
                }
            }
        }
    }

    /// Await `fut` unless the token fires first. Cancellation wins ties.
    async fn guarded<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            output = fut => Some(output),
        }
    }

    async fn store_call<T, F>(&self, fut: F) -> Result<T, ItemError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match self.guarded(fut).await {
            Some(result) => result.map_err(ItemError::Store),
            None => Err(ItemError::Cancelled),
        }
    }
}
