//! Database migrations for panel-sync
//!
//! This module contains SQL migrations for the SQLite database schema.

/// SQL statement to create the initial database schema
pub const CREATE_SCHEMA: &str = r#"
-- Customers table (owned by the back-office CRUD screens)
CREATE TABLE IF NOT EXISTS customers (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT,
    company TEXT
);

-- Local plans table (owned by the back-office CRUD screens)
CREATE TABLE IF NOT EXISTS local_plans (
    id INTEGER PRIMARY KEY,
    plan_type TEXT NOT NULL,
    name TEXT NOT NULL
);

-- Control-panel provider records
CREATE TABLE IF NOT EXISTS providers (
    id INTEGER PRIMARY KEY,
    provider_type TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    config TEXT
);

-- Plan mappings: local plan -> panel plan id
CREATE TABLE IF NOT EXISTS plan_mappings (
    id INTEGER PRIMARY KEY,
    provider_id INTEGER NOT NULL,
    plan_type TEXT NOT NULL,
    local_plan_id INTEGER NOT NULL,
    external_plan_id TEXT NOT NULL,
    external_plan_name TEXT,
    active INTEGER NOT NULL DEFAULT 1
);

-- At most one active mapping per (provider, plan type, local plan)
CREATE UNIQUE INDEX IF NOT EXISTS idx_mappings_active
    ON plan_mappings(provider_id, plan_type, local_plan_id) WHERE active = 1;

-- Hosting resources with sync state machine and retry bookkeeping
CREATE TABLE IF NOT EXISTS hosting_resources (
    id INTEGER PRIMARY KEY,
    customer_id INTEGER NOT NULL,
    plan_id INTEGER NOT NULL,
    domain TEXT,
    provider_id INTEGER,
    state TEXT NOT NULL DEFAULT 'unsynced',
    external_customer_id TEXT,
    external_resource_id TEXT,
    sync_metadata TEXT,
    retry_count INTEGER NOT NULL DEFAULT 0,
    next_retry_at TEXT,
    last_error TEXT,
    last_attempt_at TEXT,
    version INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_hosting_state ON hosting_resources(state);
CREATE INDEX IF NOT EXISTS idx_hosting_customer ON hosting_resources(customer_id);
"#;

/// Get the migration version
pub fn migration_version() -> i32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_create_schema_valid_sql() {
        // Create an in-memory SQLite database
        let conn = Connection::open_in_memory().unwrap();

        // Execute the schema creation
        conn.execute_batch(CREATE_SCHEMA).unwrap();

        // Verify tables were created
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(Result::ok)
            .collect();

        assert!(tables.contains(&"customers".to_string()));
        assert!(tables.contains(&"local_plans".to_string()));
        assert!(tables.contains(&"providers".to_string()));
        assert!(tables.contains(&"plan_mappings".to_string()));
        assert!(tables.contains(&"hosting_resources".to_string()));
    }

    #[test]
    fn test_single_active_mapping_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO plan_mappings (id, provider_id, plan_type, local_plan_id, external_plan_id, active)
             VALUES (1, 1, 'hosting', 9, 'plan_99', 1)",
            [],
        )
        .unwrap();

        // Second active mapping for the same tuple must fail
        let result = conn.execute(
            "INSERT INTO plan_mappings (id, provider_id, plan_type, local_plan_id, external_plan_id, active)
             VALUES (2, 1, 'hosting', 9, 'plan_100', 1)",
            [],
        );
        assert!(result.is_err());

        // An inactive duplicate is allowed
        conn.execute(
            "INSERT INTO plan_mappings (id, provider_id, plan_type, local_plan_id, external_plan_id, active)
             VALUES (3, 1, 'hosting', 9, 'plan_old', 0)",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_hosting_defaults() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO hosting_resources (id, customer_id, plan_id) VALUES (1, 10, 20)",
            [],
        )
        .unwrap();

        let (state, retry_count, version): (String, i64, i64) = conn
            .query_row(
                "SELECT state, retry_count, version FROM hosting_resources WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();

        assert_eq!(state, "unsynced");
        assert_eq!(retry_count, 0);
        assert_eq!(version, 0);
    }

    #[test]
    fn test_migration_version() {
        assert_eq!(migration_version(), 1);
    }
}
