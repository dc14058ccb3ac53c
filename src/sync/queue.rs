//! Durable retry queue for failed syncs
//!
//! Failed resources stay in the database with typed retry bookkeeping; the
//! queue re-attempts them on a fixed backoff schedule up to a bounded number
//! of attempts. Batches run sequentially so concurrent provider calls never
//! race on the same panel organization.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::database::Database;
use crate::error::DbError;
use crate::models::{RetryState, SyncOutcome};

use super::orchestrator::SyncOrchestrator;

/// Stored error for resources whose automatic retries are exhausted
pub const MAX_RETRIES_MESSAGE: &str = "Max retries exceeded";

/// Counts from one queue run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueReport {
    /// Resources examined this run
    pub processed: u64,
    /// Resources that ended up synced
    pub succeeded: u64,
    /// Resources that failed again (or were permanently failed)
    pub failed: u64,
}

/// Queue depth snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// All resources in the failed state
    pub total: u64,
    /// Failed resources due for an attempt right now
    pub due: u64,
    /// Failed resources past the retry limit
    pub exceeded: u64,
}

/// Retry queue over the shared resource store
pub struct RetryQueue {
    database: Arc<dyn Database>,
    orchestrator: Arc<SyncOrchestrator>,
    config: QueueConfig,
}

impl RetryQueue {
    /// Create a new retry queue
    pub fn new(
        database: Arc<dyn Database>,
        orchestrator: Arc<SyncOrchestrator>,
        config: QueueConfig,
    ) -> Self {
        Self {
            database,
            orchestrator,
            config,
        }
    }

    /// Get the queue configuration
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Backoff delay for a given retry count.
    ///
    /// Indexed by `min(retry_count, schedule_len - 1)`, so attempts past the
    /// end of the schedule reuse the longest delay.
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let schedule = &self.config.backoff_minutes;
        let index = (retry_count as usize).min(schedule.len().saturating_sub(1));
        Duration::minutes(schedule.get(index).copied().unwrap_or(0) as i64)
    }

    /// Record a failed attempt and arm the next retry.
    ///
    /// This is also the path used the very first time a sync fails, not only
    /// re-failures.
    pub async fn add_to_queue(
        &self,
        resource_id: i64,
        error: &str,
    ) -> Result<RetryState, DbError> {
        let Some(resource) = self.database.get_hosting(resource_id).await? else {
            return Err(DbError::NotFound);
        };

        let retry_count = resource.retry.retry_count;
        let delay = self.backoff_delay(retry_count);
        let retry = RetryState {
            retry_count: retry_count + 1,
            next_retry_at: Some(Utc::now() + delay),
            last_error: Some(error.to_string()),
        };

        self.database.set_retry_state(resource_id, &retry).await?;

        debug!(
            resource = resource_id,
            retries = retry.retry_count,
            delay_minutes = delay.num_minutes(),
            "Scheduled retry"
        );

        Ok(retry)
    }

    /// Re-attempt due resources, up to `limit`.
    ///
    /// Never returns an error: scan failures yield an empty report, and each
    /// item runs inside its own error boundary so one bad resource cannot
    /// abort the batch.
    pub async fn process_queue(&self, limit: usize) -> QueueReport {
        let now = Utc::now();
        let failed = match self.database.list_failed().await {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "Could not scan failed resources");
                return QueueReport::default();
            }
        };

        let due: Vec<_> = failed
            .into_iter()
            .filter(|r| r.retry.is_due(now))
            .take(limit)
            .collect();

        let mut report = QueueReport::default();

        for resource in due {
            report.processed += 1;

            if resource.retry.exceeded(self.config.max_retries) {
                warn!(
                    resource = resource.id,
                    retries = resource.retry.retry_count,
                    "Max retries exceeded, not contacting provider"
                );
                if let Err(e) = self
                    .database
                    .mark_failed(resource.id, MAX_RETRIES_MESSAGE)
                    .await
                {
                    error!(resource = resource.id, error = %e, "Could not mark permanent failure");
                }
                report.failed += 1;
                continue;
            }

            match self.orchestrator.sync_resource(resource.id, None).await {
                Ok(outcome) if outcome.success => {
                    report.succeeded += 1;
                }
                Ok(outcome) => {
                    let message = outcome
                        .error
                        .unwrap_or_else(|| "unknown sync failure".to_string());
                    if let Err(e) = self.add_to_queue(resource.id, &message).await {
                        error!(resource = resource.id, error = %e, "Could not re-arm retry");
                    }
                    report.failed += 1;
                }
                Err(e) => {
                    error!(
                        resource = resource.id,
                        error = %e,
                        "Sync attempt raised a database error"
                    );
                    if let Err(requeue_err) = self.add_to_queue(resource.id, &e.to_string()).await
                    {
                        error!(resource = resource.id, error = %requeue_err, "Could not re-arm retry");
                    }
                    report.failed += 1;
                }
            }
        }

        if report.processed > 0 {
            info!(
                processed = report.processed,
                succeeded = report.succeeded,
                failed = report.failed,
                "Queue run complete"
            );
        }

        report
    }

    /// Queue depth snapshot, deriving "due" from the same predicate
    /// `process_queue` selects by.
    pub async fn queue_stats(&self) -> Result<QueueStats, DbError> {
        let now = Utc::now();
        let failed = self.database.list_failed().await?;

        Ok(QueueStats {
            total: failed.len() as u64,
            due: failed.iter().filter(|r| r.retry.is_due(now)).count() as u64,
            exceeded: failed
                .iter()
                .filter(|r| r.retry.exceeded(self.config.max_retries))
                .count() as u64,
        })
    }

    /// Operator-triggered immediate retry, bypassing the schedule
    pub async fn retry_now(&self, resource_id: i64) -> SyncOutcome {
        info!(resource = resource_id, "Manual retry triggered");
        match self.orchestrator.sync_resource(resource_id, None).await {
            Ok(outcome) => outcome,
            Err(e) => SyncOutcome::failed(e.to_string()),
        }
    }
}
