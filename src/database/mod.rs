//! Database layer for panel-sync
//!
//! This module defines the database trait and SQLite implementation.

pub mod migrations;
pub mod sqlite;

pub use sqlite::SqliteDatabase;

use async_trait::async_trait;

use crate::error::DbError;
use crate::models::{
    Customer, HostingResource, LocalPlan, PlanMapping, PlanType, ProviderRecord, RetryState,
};

/// Database trait for data persistence
///
/// This trait defines all database operations needed by the sync subsystem.
/// It uses `async_trait` for async methods and `mockall::automock` for testing.
///
/// Customers, plans, plan mappings, and provider records are owned by the
/// back-office; the insert operations exist so fulfillment code and tests can
/// seed rows. The sync core mutates only the sync fields of
/// `hosting_resources`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Database: Send + Sync {
    // =========================================================================
    // Hosting resource operations
    // =========================================================================

    /// Get a hosting resource by id
    async fn get_hosting(&self, id: i64) -> Result<Option<HostingResource>, DbError>;

    /// Insert a hosting resource row (explicit id)
    async fn insert_hosting(&self, resource: &HostingResource) -> Result<(), DbError>;

    /// Claim a resource for one orchestration attempt.
    ///
    /// Compare-and-swap on (id, version): transitions the row to `syncing`,
    /// stamps `last_attempt_at`, bumps `version`, and returns the new version.
    /// Returns `DbError::VersionConflict` when another attempt won the claim,
    /// `DbError::NotFound` when the row is missing.
    async fn begin_sync_attempt(&self, id: i64, expected_version: i64) -> Result<i64, DbError>;

    /// Persist a successful sync: state `synced`, external ids, verbatim
    /// provider metadata, cleared retry bookkeeping.
    async fn mark_synced(
        &self,
        id: i64,
        provider_id: i64,
        external_customer_id: &str,
        external_resource_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), DbError>;

    /// Persist a failed attempt: state `failed`, error message, attempt time.
    async fn mark_failed(&self, id: i64, error: &str) -> Result<(), DbError>;

    /// Persist retry bookkeeping (state stays `failed`)
    async fn set_retry_state(&self, id: i64, retry: &RetryState) -> Result<(), DbError>;

    /// All resources currently in the `failed` state
    async fn list_failed(&self) -> Result<Vec<HostingResource>, DbError>;

    // =========================================================================
    // Customer and plan lookups
    // =========================================================================

    /// Get a customer by id
    async fn get_customer(&self, id: i64) -> Result<Option<Customer>, DbError>;

    /// Insert a customer row
    async fn insert_customer(&self, customer: &Customer) -> Result<(), DbError>;

    /// Get a local plan by id
    async fn get_plan(&self, id: i64) -> Result<Option<LocalPlan>, DbError>;

    /// Insert a local plan row
    async fn insert_plan(&self, plan: &LocalPlan) -> Result<(), DbError>;

    // =========================================================================
    // Plan mapping operations
    // =========================================================================

    /// Find the active mapping for (provider, plan type, local plan)
    async fn find_plan_mapping(
        &self,
        provider_id: i64,
        plan_type: PlanType,
        local_plan_id: i64,
    ) -> Result<Option<PlanMapping>, DbError>;

    /// Insert a plan mapping row
    async fn insert_plan_mapping(&self, mapping: &PlanMapping) -> Result<(), DbError>;

    // =========================================================================
    // Provider record operations
    // =========================================================================

    /// Get a provider record by id
    async fn get_provider(&self, id: i64) -> Result<Option<ProviderRecord>, DbError>;

    /// All enabled provider records, ordered by type priority
    async fn list_enabled_providers(&self) -> Result<Vec<ProviderRecord>, DbError>;

    /// Insert a provider record row
    async fn insert_provider(&self, record: &ProviderRecord) -> Result<(), DbError>;
}
