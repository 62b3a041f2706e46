//! Service Properties & Account Store (spec.md §4.H).
//!
//! A small per-account document store: CORS rules, default service
//! version, hour/minute metrics, logging, static website, and
//! delete-retention-policy. `get` on an account that never called
//! `upsert` returns the documented defaults rather than a "not found"
//! error; `upsert` merges field-by-field, with CORS singled out
//! ("explicit empty list replaces, absent field preserves") to mirror
//! the real service's semantics.

use std::collections::HashMap;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::Result;

pub const EMULATOR_SERVICE_VERSION: &str = "2021-12-02";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorsRule {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub max_age_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub include_apis: bool,
    pub retention_days: Option<u32>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            include_apis: false,
            retention_days: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
    pub retention_days: Option<u32>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            read: true,
            write: true,
            delete: true,
            retention_days: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StaticWebsiteConfig {
    pub enabled: bool,
    pub index_document: Option<String>,
    pub error_document_404_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeleteRetentionPolicy {
    pub enabled: bool,
    pub retention_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProperties {
    pub cors: Vec<CorsRule>,
    pub default_service_version: String,
    pub hour_metrics: MetricsConfig,
    pub minute_metrics: MetricsConfig,
    pub logging: LoggingConfig,
    pub static_website: StaticWebsiteConfig,
    pub delete_retention_policy: DeleteRetentionPolicy,
}

impl Default for ServiceProperties {
    fn default() -> Self {
        Self {
            cors: Vec::new(),
            default_service_version: EMULATOR_SERVICE_VERSION.to_string(),
            hour_metrics: MetricsConfig::default(),
            minute_metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
            static_website: StaticWebsiteConfig::default(),
            delete_retention_policy: DeleteRetentionPolicy::default(),
        }
    }
}

/// The partial update `upsert` accepts: every field is optional, and an
/// absent field leaves the stored value untouched. `cors` is the one
/// field where `Some(vec![])` and `None` are meaningfully different
/// (spec.md §4.H).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicePropertiesUpdate {
    pub cors: Option<Vec<CorsRule>>,
    pub default_service_version: Option<String>,
    pub hour_metrics: Option<MetricsConfig>,
    pub minute_metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
    pub static_website: Option<StaticWebsiteConfig>,
    pub delete_retention_policy: Option<DeleteRetentionPolicy>,
}

impl ServiceProperties {
    fn apply(&mut self, update: ServicePropertiesUpdate) {
        if let Some(cors) = update.cors {
            self.cors = cors;
        }
        if let Some(v) = update.default_service_version {
            self.default_service_version = v;
        }
        if let Some(v) = update.hour_metrics {
            self.hour_metrics = v;
        }
        if let Some(v) = update.minute_metrics {
            self.minute_metrics = v;
        }
        if let Some(v) = update.logging {
            self.logging = v;
        }
        if let Some(v) = update.static_website {
            self.static_website = v;
        }
        if let Some(v) = update.delete_retention_policy {
            self.delete_retention_policy = v;
        }
    }
}

pub struct ServicePropertiesStore {
    path: Utf8PathBuf,
    inner: RwLock<HashMap<String, ServiceProperties>>,
}

impl ServicePropertiesStore {
    pub async fn open(path: &Utf8Path) -> Result<Arc<Self>> {
        let map = match tokio::fs::read(path.as_std_path()).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| crate::error::Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        let store = Arc::new(Self {
            path: path.to_owned(),
            inner: RwLock::new(map),
        });
        store.save().await?;
        Ok(store)
    }

    pub async fn get(&self, account: &str) -> ServiceProperties {
        self.inner
            .read()
            .await
            .get(account)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn upsert(&self, account: &str, update: ServicePropertiesUpdate) -> Result<ServiceProperties> {
        let mut inner = self.inner.write().await;
        let mut properties = inner.get(account).cloned().unwrap_or_default();
        properties.apply(update);
        inner.insert(account.to_string(), properties.clone());
        drop(inner);
        self.save().await?;
        Ok(properties)
    }

    pub async fn save(&self) -> Result<()> {
        let inner = self.inner.read().await;
        let bytes = serde_json::to_vec(&*inner)
            .map_err(|e| crate::error::Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        drop(inner);
        utils::fs_ext::durable_write(self.path.as_std_path(), &bytes).await?;
        info!(path = %self.path, "persisted service properties store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_on_unknown_account_returns_documented_defaults() {
        let dir = camino_tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        let store = ServicePropertiesStore::open(&path).await.unwrap();

        let props = store.get("neveraccount").await;
        assert!(props.cors.is_empty());
        assert!(!props.hour_metrics.enabled);
        assert!(!props.minute_metrics.enabled);
        assert!(props.logging.read && props.logging.write && props.logging.delete);
        assert!(!props.static_website.enabled);
        assert_eq!(props.default_service_version, EMULATOR_SERVICE_VERSION);
    }

    #[tokio::test]
    async fn upsert_with_absent_fields_preserves_previous_values() {
        let dir = camino_tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        let store = ServicePropertiesStore::open(&path).await.unwrap();

        store
            .upsert(
                "acct",
                ServicePropertiesUpdate {
                    default_service_version: Some("2020-01-01".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let updated = store
            .upsert(
                "acct",
                ServicePropertiesUpdate {
                    hour_metrics: Some(MetricsConfig {
                        enabled: true,
                        include_apis: true,
                        retention_days: Some(7),
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.default_service_version, "2020-01-01");
        assert!(updated.hour_metrics.enabled);
    }

    #[tokio::test]
    async fn cors_absent_preserves_but_explicit_empty_list_replaces() {
        let dir = camino_tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        let store = ServicePropertiesStore::open(&path).await.unwrap();

        let rule = CorsRule {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["GET".to_string()],
            allowed_headers: vec![],
            exposed_headers: vec![],
            max_age_seconds: 60,
        };
        store
            .upsert(
                "acct",
                ServicePropertiesUpdate {
                    cors: Some(vec![rule.clone()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // Absent cors field: preserved.
        let after_unrelated_update = store
            .upsert(
                "acct",
                ServicePropertiesUpdate {
                    default_service_version: Some("v2".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(after_unrelated_update.cors, vec![rule]);

        // Explicit empty list: replaces.
        let after_clear = store
            .upsert(
                "acct",
                ServicePropertiesUpdate {
                    cors: Some(vec![]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(after_clear.cors.is_empty());
    }

    #[tokio::test]
    async fn survives_reload_from_disk() {
        let dir = camino_tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        {
            let store = ServicePropertiesStore::open(&path).await.unwrap();
            store
                .upsert(
                    "acct",
                    ServicePropertiesUpdate {
                        default_service_version: Some("v3".to_string()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        let reopened = ServicePropertiesStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("acct").await.default_service_version, "v3");
    }
}
