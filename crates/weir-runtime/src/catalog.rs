//! Data catalog boundary.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use weir_core::{AssetMetadata, DataStore, Interface, Properties, PropertyValue};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// The catalog does not know the asset.
    #[error("asset '{0}' not found in catalog")]
    NotFound(String),

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn get_asset_info(
        &self,
        asset_id: &str,
        credentials: Option<&str>,
    ) -> Result<AssetMetadata, CatalogError>;

    /// Registers a copy of `source_asset` held in `store` as a new asset of
    /// `catalog_id` and returns its id.
    async fn register_asset(
        &self,
        catalog_id: &str,
        source_asset: &str,
        store: &DataStore,
    ) -> Result<String, CatalogError>;
}

/// In-memory catalog. Asset ids have the form `<catalog>/<asset>`.
///
/// Explicitly inserted assets win; otherwise any asset of a known catalog
/// resolves to that catalog's store template.
#[derive(Default)]
pub struct MemoryCatalog {
    assets: RwLock<BTreeMap<String, AssetMetadata>>,
    catalogs: BTreeMap<String, AssetMetadata>,
    registered: AtomicU64,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every asset of `catalog` resolves to `template`.
    pub fn with_catalog(mut self, catalog: impl Into<String>, template: AssetMetadata) -> Self {
        self.catalogs.insert(catalog.into(), template);
        self
    }

    pub async fn insert(&self, asset_id: impl Into<String>, metadata: AssetMetadata) {
        self.assets.write().await.insert(asset_id.into(), metadata);
    }

    pub async fn contains(&self, asset_id: &str) -> bool {
        self.assets.read().await.contains_key(asset_id)
    }

    /// Catalogs `s3`, `s3-csv`, `s3-external`, `db2` and `kafka`.
    pub fn fixtures() -> Self {
        let template = |name: &str, protocol: &str, format: &str, region: &str| AssetMetadata {
            store: DataStore {
                name: name.to_string(),
                interface: Interface::new(protocol, format),
                connection: Properties::from([(
                    "endpoint".to_string(),
                    PropertyValue::from(format!("https://{name}.{region}.example")),
                )]),
                credential_ref: Some(format!("{name}-credentials")),
            },
            geography: Some(region.to_string()),
            tags: vec!["finance".to_string()],
            column_tags: BTreeMap::from([("SSN".to_string(), vec!["PII".to_string()])]),
        };

        Self::new()
            .with_catalog("s3", template("s3", "s3", "parquet", "theshire"))
            .with_catalog("s3-csv", template("s3-csv", "s3", "csv", "theshire"))
            .with_catalog("s3-external", template("s3-external", "s3", "parquet", "neverland"))
            .with_catalog("db2", template("db2", "jdbc-db2", "table", "theshire"))
            .with_catalog("kafka", template("kafka", "kafka", "json", "theshire"))
    }
}

#[async_trait]
impl CatalogClient for MemoryCatalog {
    async fn get_asset_info(
        &self,
        asset_id: &str,
        _credentials: Option<&str>,
    ) -> Result<AssetMetadata, CatalogError> {
        if let Some(found) = self.assets.read().await.get(asset_id) {
            return Ok(found.clone());
        }
        asset_id
            .split_once('/')
            .and_then(|(catalog, name)| {
                (!name.is_empty()).then(|| self.catalogs.get(catalog)).flatten()
            })
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(asset_id.to_string()))
    }

    async fn register_asset(
        &self,
        catalog_id: &str,
        source_asset: &str,
        store: &DataStore,
    ) -> Result<String, CatalogError> {
        let source = self.get_asset_info(source_asset, None).await?;
        let n = self.registered.fetch_add(1, Ordering::Relaxed) + 1;
        let asset_id = format!("{catalog_id}/{}-copy-{n}", store.name);
        let metadata = AssetMetadata {
            store: store.clone(),
            ..source
        };
        self.insert(asset_id.clone(), metadata).await;
        tracing::debug!(asset = %asset_id, source = %source_asset, "asset registered");
        Ok(asset_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn assets_resolve_by_catalog() {
        let catalog = MemoryCatalog::fixtures();
        let info = catalog
            .get_asset_info("db2/allow-dataset", None)
            .await
            .expect("known catalog");
        assert_eq!(info.store.interface, Interface::new("jdbc-db2", "table"));

        let missing = catalog.get_asset_info("oracle/allow-dataset", None).await;
        assert_eq!(missing, Err(CatalogError::NotFound("oracle/allow-dataset".to_string())));
        assert!(catalog.get_asset_info("db2/", None).await.is_err());
    }

    #[tokio::test]
    async fn registered_copies_become_assets() {
        let catalog = MemoryCatalog::fixtures();
        let store = DataStore {
            name: "weir-notebook-1".to_string(),
            interface: Interface::new("s3", "parquet"),
            connection: Properties::new(),
            credential_ref: None,
        };
        let id = catalog
            .register_asset("demo", "db2/allow-dataset", &store)
            .await
            .expect("registered");
        assert_eq!(id, "demo/weir-notebook-1-copy-1");
        assert!(catalog.contains(&id).await);
        let info = catalog.get_asset_info(&id, None).await.expect("lookup");
        assert_eq!(info.store, store);
        assert_eq!(info.geography.as_deref(), Some("theshire"));
    }
}
