//! Sync orchestrator
//!
//! Drives the per-resource state machine
//! `unsynced/failed -> syncing -> {synced, failed}` against a resolved
//! control-panel adapter. No step retries internally; retry policy lives in
//! the queue so it stays centralized and testable on its own.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::database::Database;
use crate::error::{DbError, SyncError};
use crate::models::SyncOutcome;
use crate::providers::{NewHosting, ProviderFactory};

/// Orchestrates create-or-reconcile sync for hosting resources
pub struct SyncOrchestrator {
    database: Arc<dyn Database>,
    factory: Arc<ProviderFactory>,
}

impl SyncOrchestrator {
    /// Create a new orchestrator
    pub fn new(database: Arc<dyn Database>, factory: Arc<ProviderFactory>) -> Self {
        Self { database, factory }
    }

    /// Sync a local resource against a control panel.
    ///
    /// Re-invoking a completed sync is always safe and cheap: a resource
    /// already `synced` with an external id short-circuits without any
    /// provider call. All expected failures come back as a `SyncOutcome`;
    /// the `Err` arm carries only database failures, which the queue's
    /// per-item boundary absorbs.
    pub async fn sync_resource(
        &self,
        resource_id: i64,
        provider_id: Option<i64>,
    ) -> Result<SyncOutcome, DbError> {
        let Some(resource) = self.database.get_hosting(resource_id).await? else {
            warn!(resource = resource_id, "Sync requested for unknown resource");
            return Ok(SyncOutcome::failed(format!(
                "Resource {} not found",
                resource_id
            )));
        };

        if resource.is_synced() {
            debug!(resource = resource_id, "Already synced, short-circuiting");
            return Ok(SyncOutcome {
                success: true,
                external_customer_id: resource.external_customer_id,
                external_resource_id: resource.external_resource_id,
                error: None,
                status: None,
            });
        }

        // Claim the resource for this attempt. Losing the version race means
        // another orchestration is in flight; back off without touching the
        // provider or the stored error state.
        match self
            .database
            .begin_sync_attempt(resource_id, resource.version)
            .await
        {
            Ok(_) => {}
            Err(DbError::VersionConflict) => {
                debug!(resource = resource_id, "Lost sync claim to concurrent attempt");
                return Ok(SyncOutcome::failed(SyncError::AttemptInProgress.to_string()));
            }
            Err(e) => return Err(e),
        }

        // Resolve the target provider: explicit parameter, else the
        // resource's previous association, else the configured default. An
        // explicitly-requested provider that cannot be resolved fails the
        // attempt rather than silently falling back to another panel.
        let resolved = if let Some(id) = provider_id {
            self.factory.from_record(id).await?.map(|panel| (id, panel))
        } else if let Some(id) = resource.provider_id {
            self.factory.from_record(id).await?.map(|panel| (id, panel))
        } else {
            self.factory.default_provider().await?
        };
        let Some((chosen_provider, panel)) = resolved else {
            return self
                .fail(
                    resource_id,
                    SyncError::Configuration("no enabled provider available".to_string()),
                )
                .await;
        };

        // Local rows must exist; their absence is a data-integrity problem
        // upstream, not a provider fault.
        let Some(customer) = self.database.get_customer(resource.customer_id).await? else {
            return self
                .fail(
                    resource_id,
                    SyncError::LocalData(format!("customer {} not found", resource.customer_id)),
                )
                .await;
        };
        let Some(plan) = self.database.get_plan(resource.plan_id).await? else {
            return self
                .fail(
                    resource_id,
                    SyncError::LocalData(format!("plan {} not found", resource.plan_id)),
                )
                .await;
        };

        // A missing mapping is not fatal: the adapter decides what an empty
        // panel plan id means.
        let external_plan_id = match self
            .database
            .find_plan_mapping(chosen_provider, plan.plan_type, plan.id)
            .await?
        {
            Some(mapping) => mapping.external_plan_id,
            None => {
                warn!(
                    resource = resource_id,
                    provider = chosen_provider,
                    plan = plan.id,
                    "No active plan mapping, proceeding with empty panel plan id"
                );
                String::new()
            }
        };

        let params = NewHosting {
            customer_id: resource
                .external_customer_id
                .clone()
                .filter(|id| !id.is_empty()),
            email: Some(customer.email.clone()),
            customer_name: Some(customer.name.clone()),
            plan_id: external_plan_id,
            domain: resource.domain.clone(),
        };

        match panel.create_hosting(&params).await {
            Ok(account) => {
                self.database
                    .mark_synced(
                        resource_id,
                        chosen_provider,
                        &account.customer_id,
                        &account.id,
                        Some(account.raw.clone()),
                    )
                    .await?;

                info!(
                    resource = resource_id,
                    provider = chosen_provider,
                    customer = %account.customer_id,
                    website = %account.id,
                    "Resource synced"
                );

                Ok(SyncOutcome::synced(account.customer_id, account.id))
            }
            Err(e) => {
                let status = e.status();
                self.fail(resource_id, SyncError::Provider(e))
                    .await
                    .map(|outcome| outcome.with_status(status))
            }
        }
    }

    /// Persist a failed attempt and build the caller-facing outcome
    async fn fail(
        &self,
        resource_id: i64,
        sync_error: SyncError,
    ) -> Result<SyncOutcome, DbError> {
        match &sync_error {
            SyncError::LocalData(msg) => {
                // Surfaced distinctly from provider errors: this is an
                // upstream data-integrity bug, not panel weather
                error!(resource = resource_id, error = %msg, "Sync failed on local data")
            }
            SyncError::Configuration(msg) => {
                warn!(resource = resource_id, error = %msg, "Sync failed on configuration")
            }
            other => warn!(resource = resource_id, error = %other, "Sync attempt failed"),
        }

        let message = sync_error.to_string();
        self.database.mark_failed(resource_id, &message).await?;
        Ok(SyncOutcome::failed(message))
    }
}
