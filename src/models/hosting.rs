//! Hosted-resource domain models
//!
//! This module defines the local hosting record, its sync state machine,
//! and the retry bookkeeping attached to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sync state of a local hosting resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Resource exists locally but has never been provisioned on a panel
    #[default]
    Unsynced,
    /// An orchestration attempt is in flight
    Syncing,
    /// Resource is reflected on the panel
    Synced,
    /// Last attempt failed; the retry queue owns it now
    Failed,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::Unsynced => write!(f, "unsynced"),
            SyncState::Syncing => write!(f, "syncing"),
            SyncState::Synced => write!(f, "synced"),
            SyncState::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for SyncState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unsynced" => Ok(SyncState::Unsynced),
            "syncing" => Ok(SyncState::Syncing),
            "synced" => Ok(SyncState::Synced),
            "failed" => Ok(SyncState::Failed),
            other => Err(format!("unknown sync state: {}", other)),
        }
    }
}

/// Retry bookkeeping for a failed resource
///
/// Stored as typed columns rather than inside the metadata blob so the
/// queue invariants are enforced by the schema, not by convention.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryState {
    /// Number of failed attempts so far
    pub retry_count: u32,

    /// Earliest time the next automatic attempt may run
    pub next_retry_at: Option<DateTime<Utc>>,

    /// Error message from the last failed attempt
    pub last_error: Option<String>,
}

impl RetryState {
    /// Whether this resource is due for another attempt at `now`.
    ///
    /// A missing `next_retry_at` counts as due. This predicate is the single
    /// source of truth shared by queue processing and queue stats.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.next_retry_at {
            None => true,
            Some(at) => at <= now,
        }
    }

    /// Whether automatic retries are exhausted
    pub fn exceeded(&self, max_retries: u32) -> bool {
        self.retry_count >= max_retries
    }
}

/// A locally-managed hosting resource pending or reflected on a control panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostingResource {
    /// Local id
    pub id: i64,

    /// Owning customer id
    pub customer_id: i64,

    /// Local plan id
    pub plan_id: i64,

    /// Primary domain to provision, if any
    pub domain: Option<String>,

    /// Provider record this resource is (or was last) synced against
    pub provider_id: Option<i64>,

    /// Sync state machine position
    pub state: SyncState,

    /// Panel-side customer (organization) id
    pub external_customer_id: Option<String>,

    /// Panel-side hosting (website) id
    pub external_resource_id: Option<String>,

    /// Opaque payload returned by the panel on the last successful sync.
    /// Not validated by this subsystem; consumed only by UI.
    pub sync_metadata: Option<serde_json::Value>,

    /// Retry bookkeeping
    pub retry: RetryState,

    /// When the last orchestration attempt ran
    pub last_attempt_at: Option<DateTime<Utc>>,

    /// Optimistic-lock counter, bumped on every sync-field write
    pub version: i64,
}

impl HostingResource {
    /// Create a new unsynced resource
    pub fn new(id: i64, customer_id: i64, plan_id: i64) -> Self {
        Self {
            id,
            customer_id,
            plan_id,
            domain: None,
            provider_id: None,
            state: SyncState::Unsynced,
            external_customer_id: None,
            external_resource_id: None,
            sync_metadata: None,
            retry: RetryState::default(),
            last_attempt_at: None,
            version: 0,
        }
    }

    /// Set the domain
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the provider association
    pub fn with_provider(mut self, provider_id: i64) -> Self {
        self.provider_id = Some(provider_id);
        self
    }

    /// Whether a completed sync can be short-circuited
    pub fn is_synced(&self) -> bool {
        self.state == SyncState::Synced
            && self
                .external_resource_id
                .as_deref()
                .is_some_and(|id| !id.is_empty())
    }
}

/// Result of a sync orchestration, returned to callers and the HTTP binding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// Whether the resource ended up synced
    pub success: bool,

    /// Panel-side customer id, on success
    pub external_customer_id: Option<String>,

    /// Panel-side resource id, on success
    pub external_resource_id: Option<String>,

    /// Error message, on failure
    pub error: Option<String>,

    /// HTTP status from the panel, when the failure came from it
    pub status: Option<u16>,
}

impl SyncOutcome {
    /// Successful outcome with external identifiers
    pub fn synced(customer_id: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            success: true,
            external_customer_id: Some(customer_id.into()),
            external_resource_id: Some(resource_id.into()),
            error: None,
            status: None,
        }
    }

    /// Failed outcome with an error message
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            external_customer_id: None,
            external_resource_id: None,
            error: Some(error.into()),
            status: None,
        }
    }

    /// Attach the panel HTTP status
    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.status = status;
        self
    }
}
