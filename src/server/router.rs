//! HTTP router for panel-sync
//!
//! This module defines the axum router exposing the sync subsystem to
//! fulfillment code and operators:
//! - trigger a sync for a resource
//! - process the retry queue / read its stats
//! - manually retry a resource
//! - inspect a resource's sync state and provider health

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::database::Database;
use crate::models::{HostingResource, PanelHealth, ProviderType, SyncOutcome};
use crate::providers::ProviderFactory;
use crate::sync::{QueueStats, RetryQueue, SyncOrchestrator};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Database
    pub database: Arc<dyn Database>,

    /// Sync orchestrator
    pub orchestrator: Arc<SyncOrchestrator>,

    /// Retry queue
    pub queue: Arc<RetryQueue>,

    /// Provider factory
    pub factory: Arc<ProviderFactory>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Request body for triggering a sync
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncRequest {
    /// Explicit provider record to sync against
    pub provider_id: Option<i64>,
}

/// Request body for a queue run
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessRequest {
    /// Maximum resources to process this run
    pub limit: Option<u32>,
}

/// Resource detail for operators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDetail {
    pub id: i64,
    pub customer_id: i64,
    pub plan_id: i64,
    pub domain: Option<String>,
    pub provider_id: Option<i64>,
    pub state: String,
    pub external_customer_id: Option<String>,
    pub external_resource_id: Option<String>,
    pub retry_count: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl From<HostingResource> for ResourceDetail {
    fn from(resource: HostingResource) -> Self {
        Self {
            id: resource.id,
            customer_id: resource.customer_id,
            plan_id: resource.plan_id,
            domain: resource.domain,
            provider_id: resource.provider_id,
            state: resource.state.to_string(),
            external_customer_id: resource.external_customer_id,
            external_resource_id: resource.external_resource_id,
            retry_count: resource.retry.retry_count,
            next_retry_at: resource.retry.next_retry_at,
            last_error: resource.retry.last_error,
            last_attempt_at: resource.last_attempt_at,
        }
    }
}

/// Per-provider health entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealthEntry {
    pub provider_id: i64,
    pub provider_type: ProviderType,
    pub health: PanelHealth,
}

/// Build the main application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/resources/:id", get(resource_detail_handler))
        .route("/api/resources/:id/sync", post(sync_resource_handler))
        .route("/api/resources/:id/retry", post(retry_now_handler))
        .route("/api/queue/process", post(process_queue_handler))
        .route("/api/queue/stats", get(queue_stats_handler))
        .route("/api/providers/health", get(providers_health_handler))
        .with_state(state)
}

/// Service liveness endpoint
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Trigger a sync for a resource
async fn sync_resource_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<Json<SyncRequest>>,
) -> impl IntoResponse {
    let provider_id = body.and_then(|Json(request)| request.provider_id);

    match state.orchestrator.sync_resource(id, provider_id).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)),
        Err(e) => {
            tracing::error!(resource = id, error = %e, "Sync endpoint hit a database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SyncOutcome::failed(e.to_string())),
            )
        }
    }
}

/// Manually retry a resource, bypassing the backoff schedule
async fn retry_now_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let outcome = state.queue.retry_now(id).await;
    (StatusCode::OK, Json(outcome))
}

/// Run the retry queue once
async fn process_queue_handler(
    State(state): State<AppState>,
    body: Option<Json<ProcessRequest>>,
) -> impl IntoResponse {
    let limit = body
        .and_then(|Json(request)| request.limit)
        .unwrap_or(state.queue.config().batch_limit) as usize;

    let report = state.queue.process_queue(limit).await;
    Json(report)
}

/// Queue depth snapshot
async fn queue_stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.queue.queue_stats().await {
        Ok(stats) => (StatusCode::OK, Json(stats)),
        Err(e) => {
            tracing::error!(error = %e, "Queue stats failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(QueueStats::default()))
        }
    }
}

/// Resource sync detail
async fn resource_detail_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.database.get_hosting(id).await {
        Ok(Some(resource)) => {
            (StatusCode::OK, Json(ResourceDetail::from(resource))).into_response()
        }
        Ok(None) => (StatusCode::NOT_FOUND, "Resource not found").into_response(),
        Err(e) => {
            tracing::error!(resource = id, error = %e, "Resource detail failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response()
        }
    }
}

/// Health of every enabled provider
async fn providers_health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let records = match state.database.list_enabled_providers().await {
        Ok(records) => records,
        Err(e) => {
            tracing::error!(error = %e, "Provider listing failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Vec::<ProviderHealthEntry>::new()),
            );
        }
    };

    let mut entries = Vec::with_capacity(records.len());
    for record in records {
        let Ok(panel) = state.factory.create(record.provider_type, &record.config) else {
            continue;
        };
        let health = match panel.health_check().await {
            Ok(health) => health,
            Err(e) => PanelHealth::down(e.to_string()),
        };
        entries.push(ProviderHealthEntry {
            provider_id: record.id,
            provider_type: record.provider_type,
            health,
        });
    }

    (StatusCode::OK, Json(entries))
}
