//! Provider factory
//!
//! Resolves stored provider configuration records into live adapter
//! instances, with instance caching keyed by (type, normalized config).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::config::EnhanceDefaults;
use crate::database::Database;
use crate::error::{DbError, FactoryError};
use crate::models::ProviderType;

use super::enhance::{EnhanceConfig, EnhancePanel};
use super::traits::ControlPanel;

/// Factory for control-panel adapters
///
/// Provider records are re-read from the database on every resolution;
/// only the constructed adapter instances (HTTP clients) are cached.
pub struct ProviderFactory {
    database: Arc<dyn Database>,
    defaults: EnhanceDefaults,
    cache: Mutex<HashMap<String, Arc<dyn ControlPanel>>>,
}

impl ProviderFactory {
    /// Create a new factory
    pub fn new(database: Arc<dyn Database>, defaults: EnhanceDefaults) -> Self {
        Self {
            database,
            defaults,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Build (or fetch from cache) an adapter for a type and config blob
    pub fn create(
        &self,
        provider_type: ProviderType,
        config: &serde_json::Value,
    ) -> Result<Arc<dyn ControlPanel>, FactoryError> {
        // serde_json objects iterate in sorted key order, so the rendered
        // string is a stable cache key for equal configs
        let key = format!("{}:{}", provider_type, config);

        {
            let cache = self.cache.lock().expect("factory cache lock poisoned");
            if let Some(panel) = cache.get(&key) {
                return Ok(Arc::clone(panel));
            }
        }

        let panel: Arc<dyn ControlPanel> = match provider_type {
            ProviderType::Enhance => {
                let enhance_config = self.enhance_config_from(config);
                Arc::new(
                    EnhancePanel::new(enhance_config)
                        .map_err(|e| FactoryError::InvalidConfig(e.to_string()))?,
                )
            }
            other => return Err(FactoryError::Unsupported(other.to_string())),
        };

        self.cache
            .lock()
            .expect("factory cache lock poisoned")
            .insert(key, Arc::clone(&panel));

        Ok(panel)
    }

    /// Resolve a stored provider record into an adapter.
    ///
    /// Returns `None` when the record is missing, disabled, or its type has
    /// no adapter yet; callers treat all three as "no provider available".
    pub async fn from_record(
        &self,
        provider_id: i64,
    ) -> Result<Option<Arc<dyn ControlPanel>>, DbError> {
        let Some(record) = self.database.get_provider(provider_id).await? else {
            debug!(provider = provider_id, "Provider record not found");
            return Ok(None);
        };

        if !record.enabled {
            debug!(provider = provider_id, "Provider record disabled");
            return Ok(None);
        }

        match self.create(record.provider_type, &record.config) {
            Ok(panel) => Ok(Some(panel)),
            Err(e) => {
                warn!(provider = provider_id, error = %e, "Could not build adapter");
                Ok(None)
            }
        }
    }

    /// Pick the highest-priority enabled provider as the default target.
    ///
    /// Returns the backing record id along with the adapter so callers can
    /// attribute sync results to a provider record.
    pub async fn default_provider(
        &self,
    ) -> Result<Option<(i64, Arc<dyn ControlPanel>)>, DbError> {
        let records = self.database.list_enabled_providers().await?;

        for record in records {
            match self.create(record.provider_type, &record.config) {
                Ok(panel) => return Ok(Some((record.id, panel))),
                Err(e) => {
                    warn!(provider = record.id, error = %e, "Skipping provider without adapter");
                }
            }
        }

        Ok(None)
    }

    /// Drop all cached adapter instances (e.g. after credential rotation)
    pub fn clear_cache(&self) {
        self.cache
            .lock()
            .expect("factory cache lock poisoned")
            .clear();
    }

    /// Number of cached adapter instances
    pub fn cached_instances(&self) -> usize {
        self.cache
            .lock()
            .expect("factory cache lock poisoned")
            .len()
    }

    /// Resolve the Enhance adapter config from a record blob, falling back
    /// to process env and then to config-file defaults for missing fields.
    fn enhance_config_from(&self, config: &serde_json::Value) -> EnhanceConfig {
        let field = |key: &str| {
            config
                .get(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let api_key = field("api_key")
            .or_else(|| std::env::var("ENHANCE_API_KEY").ok())
            .or_else(|| self.defaults.api_key.clone())
            .unwrap_or_default();
        let base_url = field("base_url")
            .or_else(|| std::env::var("ENHANCE_BASE_URL").ok())
            .unwrap_or_else(|| self.defaults.base_url.clone());
        let org_id = field("org_id")
            .or_else(|| std::env::var("ENHANCE_ORG_ID").ok())
            .or_else(|| self.defaults.org_id.clone())
            .unwrap_or_default();
        let timeout_secs = config
            .get("timeout_secs")
            .and_then(|v| v.as_u64())
            .unwrap_or(self.defaults.timeout_secs);

        EnhanceConfig {
            api_key,
            base_url,
            org_id,
            timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MockDatabase;
    use crate::models::ProviderRecord;
    use serde_json::json;

    fn factory_with(mock: MockDatabase) -> ProviderFactory {
        ProviderFactory::new(Arc::new(mock), EnhanceDefaults::default())
    }

    // Test 1: Instances are cached per (type, config)
    #[test]
    fn test_instance_caching() {
        let factory = factory_with(MockDatabase::new());
        let config = json!({"api_key": "ek_1", "base_url": "https://p.test", "org_id": "o"});

        let first = factory.create(ProviderType::Enhance, &config).unwrap();
        let second = factory.create(ProviderType::Enhance, &config).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.cached_instances(), 1);
    }

    // Test 2: Different configs produce different instances
    #[test]
    fn test_cache_keyed_by_config() {
        let factory = factory_with(MockDatabase::new());

        let first = factory
            .create(ProviderType::Enhance, &json!({"api_key": "ek_1"}))
            .unwrap();
        let second = factory
            .create(ProviderType::Enhance, &json!({"api_key": "ek_2"}))
            .unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(factory.cached_instances(), 2);
    }

    // Test 3: clear_cache drops held instances
    #[test]
    fn test_clear_cache() {
        let factory = factory_with(MockDatabase::new());
        let config = json!({"api_key": "ek_1"});

        let before = factory.create(ProviderType::Enhance, &config).unwrap();
        factory.clear_cache();
        assert_eq!(factory.cached_instances(), 0);

        let after = factory.create(ProviderType::Enhance, &config).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }

    // Test 4: Reserved provider types are unsupported
    #[test]
    fn test_reserved_types_unsupported() {
        let factory = factory_with(MockDatabase::new());

        for provider_type in [ProviderType::Cpanel, ProviderType::Plesk] {
            let result = factory.create(provider_type, &json!({}));
            assert!(matches!(result, Err(FactoryError::Unsupported(_))));
        }
    }

    // Test 5: from_record returns None for missing records
    #[tokio::test]
    async fn test_from_record_missing() {
        let mut mock = MockDatabase::new();
        mock.expect_get_provider().returning(|_| Ok(None));

        let factory = factory_with(mock);
        let result = factory.from_record(99).await.unwrap();
        assert!(result.is_none());
    }

    // Test 6: from_record returns None for disabled records
    #[tokio::test]
    async fn test_from_record_disabled() {
        let mut mock = MockDatabase::new();
        mock.expect_get_provider().returning(|id| {
            let mut record = ProviderRecord::new(id, ProviderType::Enhance, json!({}));
            record.enabled = false;
            Ok(Some(record))
        });

        let factory = factory_with(mock);
        let result = factory.from_record(1).await.unwrap();
        assert!(result.is_none());
    }

    // Test 7: from_record builds an adapter for enabled records
    #[tokio::test]
    async fn test_from_record_enabled() {
        let mut mock = MockDatabase::new();
        mock.expect_get_provider().returning(|id| {
            Ok(Some(ProviderRecord::new(
                id,
                ProviderType::Enhance,
                json!({"api_key": "ek_1"}),
            )))
        });

        let factory = factory_with(mock);
        let panel = factory.from_record(1).await.unwrap().unwrap();
        assert_eq!(panel.provider_type(), ProviderType::Enhance);
    }

    // Test 8: from_record tolerates reserved-type records
    #[tokio::test]
    async fn test_from_record_reserved_type() {
        let mut mock = MockDatabase::new();
        mock.expect_get_provider().returning(|id| {
            Ok(Some(ProviderRecord::new(id, ProviderType::Plesk, json!({}))))
        });

        let factory = factory_with(mock);
        let result = factory.from_record(2).await.unwrap();
        assert!(result.is_none());
    }

    // Test 9: default_provider picks the first buildable record
    #[tokio::test]
    async fn test_default_provider() {
        let mut mock = MockDatabase::new();
        mock.expect_list_enabled_providers().returning(|| {
            Ok(vec![
                // Priority-ordered by the database layer: a reserved type
                // without an adapter is skipped in favor of the next record
                ProviderRecord::new(4, ProviderType::Cpanel, json!({})),
                ProviderRecord::new(7, ProviderType::Enhance, json!({"api_key": "ek"})),
            ])
        });

        let factory = factory_with(mock);
        let (id, panel) = factory.default_provider().await.unwrap().unwrap();
        assert_eq!(id, 7);
        assert_eq!(panel.provider_type(), ProviderType::Enhance);
    }

    // Test 10: default_provider with no enabled records
    #[tokio::test]
    async fn test_default_provider_none_enabled() {
        let mut mock = MockDatabase::new();
        mock.expect_list_enabled_providers().returning(|| Ok(vec![]));

        let factory = factory_with(mock);
        assert!(factory.default_provider().await.unwrap().is_none());
    }

    // Test 11: Config fields fall back to configured defaults
    #[test]
    fn test_enhance_config_fallbacks() {
        let defaults = EnhanceDefaults {
            api_key: Some("ek_default".to_string()),
            base_url: "https://default.panel/api".to_string(),
            org_id: Some("org_default".to_string()),
            timeout_secs: 12,
        };
        let factory = ProviderFactory::new(Arc::new(MockDatabase::new()), defaults);

        // Partially-configured record: only the api key is stored
        let config = factory.enhance_config_from(&json!({"api_key": "ek_record"}));
        assert_eq!(config.api_key, "ek_record");
        assert_eq!(config.base_url, "https://default.panel/api");
        assert_eq!(config.org_id, "org_default");
        assert_eq!(config.timeout_secs, 12);

        // Empty blob falls back entirely
        let config = factory.enhance_config_from(&json!({}));
        assert_eq!(config.api_key, "ek_default");
    }
}
