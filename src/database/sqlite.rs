//! SQLite implementation of the Database trait
//!
//! This module provides a SQLite-based implementation of the Database trait
//! using rusqlite and tokio-rusqlite for async operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use super::migrations::CREATE_SCHEMA;
use super::Database;
use crate::error::DbError;
use crate::models::{
    Customer, HostingResource, LocalPlan, PlanMapping, PlanType, ProviderRecord, ProviderType,
    RetryState, SyncState,
};

/// SQLite database implementation
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Create a new SQLite database connection
    ///
    /// Use `:memory:` for in-memory database or a file path for persistent storage.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(path).await?;

        // Run migrations
        conn.call(|conn| {
            conn.execute_batch(CREATE_SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Create a new in-memory database (useful for testing)
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::new(":memory:").await
    }
}

const HOSTING_COLUMNS: &str = "id, customer_id, plan_id, domain, provider_id, state, \
     external_customer_id, external_resource_id, sync_metadata, \
     retry_count, next_retry_at, last_error, last_attempt_at, version";

fn hosting_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HostingResource> {
    Ok(HostingResource {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        plan_id: row.get(2)?,
        domain: row.get(3)?,
        provider_id: row.get(4)?,
        state: parse_sync_state(row.get::<_, String>(5)?),
        external_customer_id: row.get(6)?,
        external_resource_id: row.get(7)?,
        sync_metadata: row
            .get::<_, Option<String>>(8)?
            .and_then(|s| serde_json::from_str(&s).ok()),
        retry: RetryState {
            retry_count: row.get::<_, i64>(9)? as u32,
            next_retry_at: parse_datetime(row.get::<_, Option<String>>(10)?),
            last_error: row.get(11)?,
        },
        last_attempt_at: parse_datetime(row.get::<_, Option<String>>(12)?),
        version: row.get(13)?,
    })
}

#[async_trait]
impl Database for SqliteDatabase {
    // =========================================================================
    // Hosting resource operations
    // =========================================================================

    async fn get_hosting(&self, id: i64) -> Result<Option<HostingResource>, DbError> {
        self.conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {} FROM hosting_resources WHERE id = ?1",
                    HOSTING_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let resource = stmt.query_row([id], hosting_from_row).optional()?;
                Ok(resource)
            })
            .await
            .map_err(Into::into)
    }

    async fn insert_hosting(&self, resource: &HostingResource) -> Result<(), DbError> {
        let id = resource.id;
        let customer_id = resource.customer_id;
        let plan_id = resource.plan_id;
        let domain = resource.domain.clone();
        let provider_id = resource.provider_id;
        let state = resource.state.to_string();
        let external_customer_id = resource.external_customer_id.clone();
        let external_resource_id = resource.external_resource_id.clone();
        let metadata = resource
            .sync_metadata
            .as_ref()
            .map(|m| m.to_string());
        let retry_count = resource.retry.retry_count as i64;
        let next_retry_at = resource.retry.next_retry_at.map(|dt| dt.to_rfc3339());
        let last_error = resource.retry.last_error.clone();
        let last_attempt_at = resource.last_attempt_at.map(|dt| dt.to_rfc3339());
        let version = resource.version;

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO hosting_resources
                    (id, customer_id, plan_id, domain, provider_id, state,
                     external_customer_id, external_resource_id, sync_metadata,
                     retry_count, next_retry_at, last_error, last_attempt_at, version)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                    "#,
                    rusqlite::params![
                        id,
                        customer_id,
                        plan_id,
                        domain,
                        provider_id,
                        state,
                        external_customer_id,
                        external_resource_id,
                        metadata,
                        retry_count,
                        next_retry_at,
                        last_error,
                        last_attempt_at,
                        version
                    ],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    async fn begin_sync_attempt(&self, id: i64, expected_version: i64) -> Result<i64, DbError> {
        let now = Utc::now().to_rfc3339();

        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"
                    UPDATE hosting_resources
                    SET state = 'syncing', last_attempt_at = ?1, version = version + 1
                    WHERE id = ?2 AND version = ?3
                    "#,
                    rusqlite::params![now, id, expected_version],
                )?;
                Ok(changed)
            })
            .await
            .map_err(DbError::from)?;

        if changed == 1 {
            return Ok(expected_version + 1);
        }

        // Distinguish a lost claim from a missing row
        match self.get_hosting(id).await? {
            Some(_) => Err(DbError::VersionConflict),
            None => Err(DbError::NotFound),
        }
    }

    async fn mark_synced(
        &self,
        id: i64,
        provider_id: i64,
        external_customer_id: &str,
        external_resource_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), DbError> {
        let external_customer_id = external_customer_id.to_string();
        let external_resource_id = external_resource_id.to_string();
        let metadata = metadata.map(|m| m.to_string());

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    UPDATE hosting_resources
                    SET state = 'synced', provider_id = ?1,
                        external_customer_id = ?2, external_resource_id = ?3,
                        sync_metadata = ?4,
                        retry_count = 0, next_retry_at = NULL, last_error = NULL,
                        version = version + 1
                    WHERE id = ?5
                    "#,
                    rusqlite::params![
                        provider_id,
                        external_customer_id,
                        external_resource_id,
                        metadata,
                        id
                    ],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    async fn mark_failed(&self, id: i64, error: &str) -> Result<(), DbError> {
        let error = error.to_string();
        let now = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    UPDATE hosting_resources
                    SET state = 'failed', last_error = ?1, last_attempt_at = ?2,
                        version = version + 1
                    WHERE id = ?3
                    "#,
                    rusqlite::params![error, now, id],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    async fn set_retry_state(&self, id: i64, retry: &RetryState) -> Result<(), DbError> {
        let retry_count = retry.retry_count as i64;
        let next_retry_at = retry.next_retry_at.map(|dt| dt.to_rfc3339());
        let last_error = retry.last_error.clone();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    UPDATE hosting_resources
                    SET state = 'failed', retry_count = ?1, next_retry_at = ?2,
                        last_error = ?3, version = version + 1
                    WHERE id = ?4
                    "#,
                    rusqlite::params![retry_count, next_retry_at, last_error, id],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    async fn list_failed(&self) -> Result<Vec<HostingResource>, DbError> {
        self.conn
            .call(|conn| {
                let sql = format!(
                    "SELECT {} FROM hosting_resources WHERE state = 'failed' ORDER BY id",
                    HOSTING_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let resources = stmt
                    .query_map([], hosting_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(resources)
            })
            .await
            .map_err(Into::into)
    }

    // =========================================================================
    // Customer and plan lookups
    // =========================================================================

    async fn get_customer(&self, id: i64) -> Result<Option<Customer>, DbError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, email, phone, company FROM customers WHERE id = ?1",
                )?;
                let customer = stmt
                    .query_row([id], |row| {
                        Ok(Customer {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            email: row.get(2)?,
                            phone: row.get(3)?,
                            company: row.get(4)?,
                        })
                    })
                    .optional()?;
                Ok(customer)
            })
            .await
            .map_err(Into::into)
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<(), DbError> {
        let id = customer.id;
        let name = customer.name.clone();
        let email = customer.email.clone();
        let phone = customer.phone.clone();
        let company = customer.company.clone();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO customers (id, name, email, phone, company) VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![id, name, email, phone, company],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    async fn get_plan(&self, id: i64) -> Result<Option<LocalPlan>, DbError> {
        self.conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT id, plan_type, name FROM local_plans WHERE id = ?1")?;
                let plan = stmt
                    .query_row([id], |row| {
                        Ok(LocalPlan {
                            id: row.get(0)?,
                            plan_type: parse_plan_type(row.get::<_, String>(1)?),
                            name: row.get(2)?,
                        })
                    })
                    .optional()?;
                Ok(plan)
            })
            .await
            .map_err(Into::into)
    }

    async fn insert_plan(&self, plan: &LocalPlan) -> Result<(), DbError> {
        let id = plan.id;
        let plan_type = plan.plan_type.to_string();
        let name = plan.name.clone();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO local_plans (id, plan_type, name) VALUES (?1, ?2, ?3)",
                    rusqlite::params![id, plan_type, name],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    // =========================================================================
    // Plan mapping operations
    // =========================================================================

    async fn find_plan_mapping(
        &self,
        provider_id: i64,
        plan_type: PlanType,
        local_plan_id: i64,
    ) -> Result<Option<PlanMapping>, DbError> {
        let plan_type_str = plan_type.to_string();

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, provider_id, plan_type, local_plan_id,
                           external_plan_id, external_plan_name, active
                    FROM plan_mappings
                    WHERE provider_id = ?1 AND plan_type = ?2 AND local_plan_id = ?3
                      AND active = 1
                    LIMIT 1
                    "#,
                )?;
                let mapping = stmt
                    .query_row(
                        rusqlite::params![provider_id, plan_type_str, local_plan_id],
                        |row| {
                            Ok(PlanMapping {
                                id: row.get(0)?,
                                provider_id: row.get(1)?,
                                plan_type: parse_plan_type(row.get::<_, String>(2)?),
                                local_plan_id: row.get(3)?,
                                external_plan_id: row.get(4)?,
                                external_plan_name: row.get(5)?,
                                active: row.get::<_, i64>(6)? != 0,
                            })
                        },
                    )
                    .optional()?;
                Ok(mapping)
            })
            .await
            .map_err(Into::into)
    }

    async fn insert_plan_mapping(&self, mapping: &PlanMapping) -> Result<(), DbError> {
        let id = mapping.id;
        let provider_id = mapping.provider_id;
        let plan_type = mapping.plan_type.to_string();
        let local_plan_id = mapping.local_plan_id;
        let external_plan_id = mapping.external_plan_id.clone();
        let external_plan_name = mapping.external_plan_name.clone();
        let active = mapping.active as i64;

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO plan_mappings
                    (id, provider_id, plan_type, local_plan_id, external_plan_id,
                     external_plan_name, active)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                    rusqlite::params![
                        id,
                        provider_id,
                        plan_type,
                        local_plan_id,
                        external_plan_id,
                        external_plan_name,
                        active
                    ],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    // =========================================================================
    // Provider record operations
    // =========================================================================

    async fn get_provider(&self, id: i64) -> Result<Option<ProviderRecord>, DbError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, provider_type, enabled, config FROM providers WHERE id = ?1",
                )?;
                let record = stmt.query_row([id], provider_from_row).optional()?;
                Ok(record)
            })
            .await
            .map_err(Into::into)
    }

    async fn list_enabled_providers(&self) -> Result<Vec<ProviderRecord>, DbError> {
        let mut providers: Vec<ProviderRecord> = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, provider_type, enabled, config FROM providers WHERE enabled = 1 ORDER BY id",
                )?;
                let records = stmt
                    .query_map([], provider_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await
            .map_err(DbError::from)?;

        // Type-priority ordering is domain logic, applied after load
        providers.sort_by_key(|p| p.provider_type.priority());
        Ok(providers)
    }

    async fn insert_provider(&self, record: &ProviderRecord) -> Result<(), DbError> {
        let id = record.id;
        let provider_type = record.provider_type.to_string();
        let enabled = record.enabled as i64;
        let config = record.config.to_string();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO providers (id, provider_type, enabled, config) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![id, provider_type, enabled, config],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }
}

fn provider_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProviderRecord> {
    Ok(ProviderRecord {
        id: row.get(0)?,
        provider_type: row
            .get::<_, String>(1)?
            .parse()
            .unwrap_or(ProviderType::Enhance),
        enabled: row.get::<_, i64>(2)? != 0,
        config: row
            .get::<_, Option<String>>(3)?
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_else(|| serde_json::json!({})),
    })
}

/// Parse an RFC 3339 datetime string
fn parse_datetime(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// Parse a sync state string, defaulting to `unsynced`
fn parse_sync_state(value: String) -> SyncState {
    value.parse().unwrap_or(SyncState::Unsynced)
}

/// Parse a plan type string, defaulting to `hosting`
fn parse_plan_type(value: String) -> PlanType {
    value.parse().unwrap_or(PlanType::Hosting)
}
