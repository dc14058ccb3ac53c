//! Shared helpers for integration tests

use std::sync::Arc;

use serde_json::json;

use panel_sync::config::{EnhanceDefaults, QueueConfig};
use panel_sync::database::{Database, SqliteDatabase};
use panel_sync::models::{Customer, LocalPlan, PlanMapping, PlanType, ProviderRecord, ProviderType};
use panel_sync::providers::ProviderFactory;
use panel_sync::sync::{RetryQueue, SyncOrchestrator};

/// A fully-wired sync stack over an in-memory database
pub struct TestStack {
    pub database: Arc<SqliteDatabase>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub queue: Arc<RetryQueue>,
}

/// Build a stack with one enabled Enhance provider pointing at `base_url`
pub async fn stack_with_panel(base_url: &str) -> TestStack {
    let database = Arc::new(SqliteDatabase::in_memory().await.unwrap());

    database
        .insert_provider(&ProviderRecord::new(
            1,
            ProviderType::Enhance,
            json!({
                "api_key": "ek_test",
                "base_url": base_url,
                "org_id": "org_reseller",
                "timeout_secs": 2,
            }),
        ))
        .await
        .unwrap();

    let db: Arc<dyn Database> = database.clone();
    let factory = Arc::new(ProviderFactory::new(
        Arc::clone(&db),
        EnhanceDefaults::default(),
    ));
    let orchestrator = Arc::new(SyncOrchestrator::new(Arc::clone(&db), factory));
    let queue = Arc::new(RetryQueue::new(
        db,
        Arc::clone(&orchestrator),
        QueueConfig::default(),
    ));

    TestStack {
        database,
        orchestrator,
        queue,
    }
}

/// Seed customer 10 (`new@client.com`), hosting plan 3, and the active
/// plan mapping (provider 1, hosting, plan 3) -> `plan_99`
pub async fn seed_customer_plan_mapping(database: &SqliteDatabase) {
    database
        .insert_customer(&Customer::new(10, "New Client", "new@client.com"))
        .await
        .unwrap();
    database
        .insert_plan(&LocalPlan::new(3, PlanType::Hosting, "Starter"))
        .await
        .unwrap();
    database
        .insert_plan_mapping(&PlanMapping::new(1, 1, PlanType::Hosting, 3, "plan_99"))
        .await
        .unwrap();
}
