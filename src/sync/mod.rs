//! Control-panel synchronization core
//!
//! This module drives the create-or-reconcile flow for local hosting
//! resources and recovers from transient failures without losing work or
//! double-provisioning.
//!
//! # Components
//!
//! - [`orchestrator`]: per-resource state machine over a resolved adapter
//! - [`queue`]: durable retry queue with bounded, backoff-scheduled attempts
//! - [`scheduler`]: background driver invoking the queue on an interval
//!
//! # Example
//!
//! ```ignore
//! use panel_sync::sync::{RetryQueue, SyncOrchestrator};
//!
//! let orchestrator = Arc::new(SyncOrchestrator::new(database.clone(), factory));
//! let queue = RetryQueue::new(database, orchestrator.clone(), config.queue);
//!
//! let outcome = orchestrator.sync_resource(42, None).await?;
//! if !outcome.success {
//!     queue.add_to_queue(42, outcome.error.as_deref().unwrap_or("unknown")).await?;
//! }
//! ```

pub mod orchestrator;
pub mod queue;
pub mod scheduler;

// Re-export main types for convenience
pub use orchestrator::SyncOrchestrator;
pub use queue::{QueueReport, QueueStats, RetryQueue};
pub use scheduler::{QueueRunner, QueueScheduler, QueueSchedulerHandle};
