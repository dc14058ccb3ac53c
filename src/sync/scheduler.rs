//! Background driver for the retry queue
//!
//! Runs `process_queue` on an interval with jitter, supports manual
//! operator-triggered runs through an explicit channel handoff, and shuts
//! down gracefully on signal.

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info};

use crate::config::SchedulerConfig;

use super::queue::{QueueReport, RetryQueue};

/// Errors from the manual-trigger handle
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TriggerError {
    /// Scheduler task is not running
    #[error("Scheduler not running")]
    NotRunning,

    /// Scheduler dropped the response channel
    #[error("No response from scheduler")]
    NoResponse,
}

/// Anything the scheduler can drive through a batch run
#[async_trait]
pub trait QueueRunner: Send + Sync {
    /// Process up to `limit` due resources
    async fn run_batch(&self, limit: usize) -> QueueReport;
}

#[async_trait]
impl QueueRunner for RetryQueue {
    async fn run_batch(&self, limit: usize) -> QueueReport {
        self.process_queue(limit).await
    }
}

/// Status of the most recent queue run
#[derive(Debug, Clone, Default)]
pub struct QueueRunStatus {
    /// When the last run finished
    pub last_run: Option<std::time::SystemTime>,
    /// Report from the last completed run
    pub last_report: Option<QueueReport>,
    /// Error from the last run, when it did not complete
    pub last_error: Option<String>,
    /// Estimated next scheduled run
    pub next_run: Option<std::time::SystemTime>,
    /// Whether a run is currently in progress
    pub in_progress: bool,
}

/// Manual run request
struct ManualRunRequest {
    response: mpsc::Sender<QueueReport>,
}

/// Queue scheduler
///
/// Owns the periodic loop; batches themselves stay strictly sequential
/// inside the queue.
pub struct QueueScheduler {
    config: SchedulerConfig,
    runner: Arc<dyn QueueRunner>,
    batch_limit: usize,
    status: Arc<RwLock<QueueRunStatus>>,
    shutdown_rx: broadcast::Receiver<()>,
    manual_rx: mpsc::Receiver<ManualRunRequest>,
    manual_tx: mpsc::Sender<ManualRunRequest>,
}

impl QueueScheduler {
    /// Create a new scheduler
    ///
    /// # Arguments
    ///
    /// * `config` - Scheduler configuration
    /// * `runner` - The queue to drive
    /// * `batch_limit` - Resources per run
    /// * `shutdown_rx` - Broadcast receiver for shutdown signal
    pub fn new(
        config: SchedulerConfig,
        runner: Arc<dyn QueueRunner>,
        batch_limit: usize,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        let (manual_tx, manual_rx) = mpsc::channel(32);

        Self {
            config,
            runner,
            batch_limit,
            status: Arc::new(RwLock::new(QueueRunStatus::default())),
            shutdown_rx,
            manual_rx,
            manual_tx,
        }
    }

    /// Get a handle for triggering manual runs
    pub fn handle(&self) -> QueueSchedulerHandle {
        QueueSchedulerHandle {
            tx: self.manual_tx.clone(),
        }
    }

    /// Current run status
    pub async fn status(&self) -> QueueRunStatus {
        self.status.read().await.clone()
    }

    /// Run the scheduler until shutdown is signaled
    pub async fn run(mut self) {
        info!(
            interval_secs = self.config.process_interval_secs,
            batch_limit = self.batch_limit,
            "Starting queue scheduler"
        );

        if self.config.initial_delay_secs > 0 {
            debug!(
                delay_secs = self.config.initial_delay_secs,
                "Waiting for initial delay"
            );
            tokio::time::sleep(Duration::from_secs(self.config.initial_delay_secs)).await;
        }

        // Process any backlog accumulated while the service was down
        Self::perform_run(&self.runner, &self.status, &self.config, self.batch_limit).await;

        let interval = Duration::from_secs(self.config.process_interval_secs);
        let jitter = self.random_jitter();
        let mut timer = interval_at(Instant::now() + interval + jitter, interval);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping queue scheduler");
                    break;
                }
                Some(request) = self.manual_rx.recv() => {
                    info!("Manual queue run triggered");
                    let report = Self::perform_run(
                        &self.runner,
                        &self.status,
                        &self.config,
                        self.batch_limit,
                    )
                    .await;
                    let _ = request.response.send(report).await;
                }
                _ = timer.tick() => {
                    // Jitter keeps several instances from hitting the panel
                    // at the same instant
                    let jitter = self.random_jitter();
                    if !jitter.is_zero() {
                        tokio::time::sleep(jitter).await;
                    }

                    debug!("Performing scheduled queue run");
                    Self::perform_run(
                        &self.runner,
                        &self.status,
                        &self.config,
                        self.batch_limit,
                    )
                    .await;
                }
            }
        }

        info!("Queue scheduler stopped");
    }

    fn random_jitter(&self) -> Duration {
        if self.config.jitter_secs > 0 {
            Duration::from_secs(rand::thread_rng().gen_range(0..self.config.jitter_secs))
        } else {
            Duration::ZERO
        }
    }

    async fn perform_run(
        runner: &Arc<dyn QueueRunner>,
        status: &Arc<RwLock<QueueRunStatus>>,
        config: &SchedulerConfig,
        batch_limit: usize,
    ) -> QueueReport {
        {
            let mut s = status.write().await;
            s.in_progress = true;
        }

        let result = tokio::time::timeout(
            Duration::from_secs(config.run_timeout_secs),
            runner.run_batch(batch_limit),
        )
        .await;

        let mut s = status.write().await;
        s.in_progress = false;
        s.last_run = Some(std::time::SystemTime::now());
        s.next_run = Some(
            std::time::SystemTime::now()
                + Duration::from_secs(config.process_interval_secs),
        );

        match result {
            Ok(report) => {
                s.last_error = None;
                s.last_report = Some(report.clone());
                report
            }
            Err(_) => {
                error!(
                    timeout_secs = config.run_timeout_secs,
                    "Queue run timed out"
                );
                s.last_error = Some("Queue run timed out".to_string());
                QueueReport::default()
            }
        }
    }
}

/// Handle for triggering manual queue runs
#[derive(Clone)]
pub struct QueueSchedulerHandle {
    tx: mpsc::Sender<ManualRunRequest>,
}

impl QueueSchedulerHandle {
    /// Trigger a queue run immediately and wait for its report
    pub async fn trigger(&self) -> Result<QueueReport, TriggerError> {
        let (response_tx, mut response_rx) = mpsc::channel(1);

        self.tx
            .send(ManualRunRequest {
                response: response_tx,
            })
            .await
            .map_err(|_| TriggerError::NotRunning)?;

        response_rx.recv().await.ok_or(TriggerError::NoResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::timeout;

    /// Test runner tracking batch invocations via an atomic counter
    struct TestRunner {
        run_count: Arc<AtomicU32>,
        report: QueueReport,
    }

    impl TestRunner {
        fn new() -> Self {
            Self {
                run_count: Arc::new(AtomicU32::new(0)),
                report: QueueReport::default(),
            }
        }

        fn with_report(mut self, report: QueueReport) -> Self {
            self.report = report;
            self
        }

        fn run_count(&self) -> Arc<AtomicU32> {
            Arc::clone(&self.run_count)
        }
    }

    #[async_trait]
    impl QueueRunner for TestRunner {
        async fn run_batch(&self, _limit: usize) -> QueueReport {
            self.run_count.fetch_add(1, Ordering::SeqCst);
            self.report.clone()
        }
    }

    /// Runner that simulates a hung queue run
    struct SlowRunner {
        delay: Duration,
    }

    #[async_trait]
    impl QueueRunner for SlowRunner {
        async fn run_batch(&self, _limit: usize) -> QueueReport {
            tokio::time::sleep(self.delay).await;
            QueueReport::default()
        }
    }

    fn test_config() -> SchedulerConfig {
        SchedulerConfig {
            enabled: true,
            initial_delay_secs: 0,
            process_interval_secs: 3600,
            jitter_secs: 0,
            run_timeout_secs: 10,
        }
    }

    // Test 1: Scheduler performs an initial run on startup
    #[tokio::test]
    async fn test_initial_run_on_startup() {
        let runner = TestRunner::new();
        let run_count = runner.run_count();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let scheduler = QueueScheduler::new(test_config(), Arc::new(runner), 25, shutdown_rx);

        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_millis(100)).await;

        shutdown_tx.send(()).unwrap();
        let _ = timeout(Duration::from_secs(1), handle).await;

        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    // Test 2: Manual trigger performs an extra run and returns its report
    #[tokio::test]
    async fn test_manual_trigger() {
        let runner = TestRunner::new().with_report(QueueReport {
            processed: 3,
            succeeded: 2,
            failed: 1,
        });
        let run_count = runner.run_count();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let scheduler = QueueScheduler::new(test_config(), Arc::new(runner), 25, shutdown_rx);

        let manual_handle = scheduler.handle();
        let scheduler_handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let initial_count = run_count.load(Ordering::SeqCst);

        let report = manual_handle.trigger().await.unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(run_count.load(Ordering::SeqCst), initial_count + 1);

        shutdown_tx.send(()).unwrap();
        let _ = scheduler_handle.await;
    }

    // Test 3: Graceful shutdown stops the scheduler
    #[tokio::test]
    async fn test_graceful_shutdown() {
        let runner = TestRunner::new();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let scheduler = QueueScheduler::new(test_config(), Arc::new(runner), 25, shutdown_rx);

        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();

        let result = timeout(Duration::from_secs(2), handle).await;
        assert!(result.is_ok());
    }

    // Test 4: Status tracking records the last report
    #[tokio::test]
    async fn test_status_tracking() {
        let runner = TestRunner::new().with_report(QueueReport {
            processed: 5,
            succeeded: 5,
            failed: 0,
        });

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let scheduler = QueueScheduler::new(test_config(), Arc::new(runner), 25, shutdown_rx);

        let status_ref = Arc::clone(&scheduler.status);
        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = status_ref.read().await;
        assert!(status.last_run.is_some());
        assert!(!status.in_progress);
        assert_eq!(
            status.last_report,
            Some(QueueReport {
                processed: 5,
                succeeded: 5,
                failed: 0,
            })
        );
        assert!(status.last_error.is_none());
        drop(status);

        shutdown_tx.send(()).unwrap();
        let _ = handle.await;
    }

    // Test 5: A hung run is cut off by the timeout and recorded
    #[tokio::test]
    async fn test_run_timeout() {
        let runner = SlowRunner {
            delay: Duration::from_secs(10),
        };

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let scheduler = QueueScheduler::new(
            SchedulerConfig {
                run_timeout_secs: 1,
                ..test_config()
            },
            Arc::new(runner),
            25,
            shutdown_rx,
        );

        let status_ref = Arc::clone(&scheduler.status);
        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_millis(1500)).await;

        let status = status_ref.read().await;
        assert_eq!(status.last_error, Some("Queue run timed out".to_string()));
        drop(status);

        shutdown_tx.send(()).unwrap();
        let _ = handle.await;
    }

    // Test 6: Trigger on a stopped scheduler fails cleanly
    #[tokio::test]
    async fn test_trigger_after_shutdown() {
        let runner = TestRunner::new();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let scheduler = QueueScheduler::new(test_config(), Arc::new(runner), 25, shutdown_rx);

        let manual_handle = scheduler.handle();
        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();
        let _ = handle.await;

        let result = manual_handle.trigger().await;
        assert!(result.is_err());
    }

    // Test 7: Scheduled runs honor the interval
    #[tokio::test]
    async fn test_scheduled_interval() {
        tokio::time::pause();

        let runner = TestRunner::new();
        let run_count = runner.run_count();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let scheduler = QueueScheduler::new(
            SchedulerConfig {
                process_interval_secs: 100,
                ..test_config()
            },
            Arc::new(runner),
            25,
            shutdown_rx,
        );

        let handle = tokio::spawn(scheduler.run());

        tokio::time::advance(Duration::from_millis(50)).await;
        tokio::task::yield_now().await;
        assert_eq!(run_count.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(101)).await;
        tokio::task::yield_now().await;
        assert_eq!(run_count.load(Ordering::SeqCst), 2);

        shutdown_tx.send(()).unwrap();
        let _ = handle.await;
    }
}
