//! Startup / Recovery (spec.md §4.I).
//!
//! `PersistenceStore::init` is the single entry point that ties
//! destinations, the catalog, the writer pool, the reader, and the
//! service properties store together. It performs exactly the four
//! steps spec.md §4.I lists and nothing more: no active reconciliation
//! against the filesystem happens here — mismatches surface lazily as
//! `ExtentNotFound`/`Io` on read and are repaired by the next GC sweep.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::catalog::ExtentMetadataCatalog;
use crate::config::StoreConfig;
use crate::destination::DestinationTable;
use crate::error::Result;
use crate::gc::GarbageCollector;
use crate::properties::ServicePropertiesStore;
use crate::reader::ExtentReader;
use crate::reference_source::ReferencedExtentsSource;
use crate::writer_pool::ExtentWriterPool;

pub struct PersistenceStore {
    config: StoreConfig,
    destinations: DestinationTable,
    catalog: Arc<ExtentMetadataCatalog>,
    writer_pool: Arc<ExtentWriterPool>,
    reader: ExtentReader,
    properties: Arc<ServicePropertiesStore>,
    autosave_cancel: CancellationToken,
    autosave_handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PersistenceStore {
    /// Opens each metadata catalog (creating it if absent), rebuilds
    /// in-memory secondary indexes, persists once, and starts the
    /// catalog autosave loop. Returns a store ready to accept traffic.
    pub async fn init(config: StoreConfig) -> Result<Arc<Self>> {
        let destinations = DestinationTable::new(&config.destinations);

        // `ExtentMetadataCatalog::open` already implements steps 1-3 of
        // spec.md §4.I for the extent catalog: load-or-create, index
        // rebuild (the by_sequence BTreeMap is derived from the loaded
        // rows), and an initial persist.
        let catalog = Arc::new(
            ExtentMetadataCatalog::open(&config.extent_catalog_path, config.default_list_limit)
                .await?,
        );
        let properties = ServicePropertiesStore::open(&config.account_db_path).await?;

        let writer_pool = Arc::new(ExtentWriterPool::new(
            destinations.clone(),
            catalog.clone(),
            config.rotation_threshold_bytes,
            config.idle_timeout,
        )?);
        let reader = ExtentReader::new(destinations.clone(), catalog.clone());

        let autosave_cancel = CancellationToken::new();
        let autosave_handle = catalog.spawn_autosave(config.autosave_interval, autosave_cancel.clone());

        let total_bytes: u64 = {
            let mut batches = catalog.extent_id_batches(usize::MAX).await;
            let mut total = 0u64;
            while let Some(batch) = batches.next_batch() {
                for id in batch {
                    if let Ok(extent) = catalog.get(id).await {
                        total += extent.size;
                    }
                }
            }
            total
        };

        info!(
            extents = catalog.len().await,
            total_bytes,
            destinations = destinations.round_robin_order().len(),
            "persistence store initialized"
        );

        Ok(Arc::new(Self {
            config,
            destinations,
            catalog,
            writer_pool,
            reader,
            properties,
            autosave_cancel,
            autosave_handle: tokio::sync::Mutex::new(Some(autosave_handle)),
        }))
    }

    pub fn writer_pool(&self) -> &Arc<ExtentWriterPool> {
        &self.writer_pool
    }

    pub fn reader(&self) -> &ExtentReader {
        &self.reader
    }

    pub fn catalog(&self) -> &Arc<ExtentMetadataCatalog> {
        &self.catalog
    }

    pub fn properties(&self) -> &Arc<ServicePropertiesStore> {
        &self.properties
    }

    pub fn destinations(&self) -> &DestinationTable {
        &self.destinations
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Builds a garbage collector wired to this store's catalog and
    /// destinations, consuming referenced-id sources from the
    /// higher-level catalogs the caller supplies (spec.md §6.3).
    pub fn garbage_collector(
        &self,
        sources: Vec<Arc<dyn ReferencedExtentsSource>>,
    ) -> GarbageCollector {
        GarbageCollector::new(
            self.destinations.clone(),
            self.catalog.clone(),
            sources,
            self.config.gc_unmodified_window,
        )
    }

    /// Stops the autosave loop, flushes and closes every open extent
    /// file, persists the catalog one last time, and persists the
    /// service properties store.
    pub async fn close(&self) -> Result<()> {
        self.autosave_cancel.cancel();
        if let Some(handle) = self.autosave_handle.lock().await.take() {
            let _ = handle.await;
        }
        self.writer_pool.close().await?;
        self.properties.save().await?;
        info!("persistence store closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_creates_catalog_and_account_files() {
        let dir = camino_tempfile::tempdir().unwrap();
        let cfg = StoreConfig::for_testing(dir.path());
        let store = PersistenceStore::init(cfg.clone()).await.unwrap();

        assert!(tokio::fs::metadata(cfg.extent_catalog_path.as_std_path())
            .await
            .is_ok());
        assert!(tokio::fs::metadata(cfg.account_db_path.as_std_path())
            .await
            .is_ok());

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn append_read_and_close_roundtrip_end_to_end() {
        let dir = camino_tempfile::tempdir().unwrap();
        let cfg = StoreConfig::for_testing(dir.path());
        let store = PersistenceStore::init(cfg).await.unwrap();

        let descriptor = store.writer_pool().append(None, b"Hello World").await.unwrap();
        let bytes = store.reader().read(descriptor).await.unwrap();
        assert_eq!(&bytes[..], b"Hello World");

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopening_after_close_recovers_previously_written_extents() {
        let dir = camino_tempfile::tempdir().unwrap();
        let cfg = StoreConfig::for_testing(dir.path());

        let descriptor = {
            let store = PersistenceStore::init(cfg.clone()).await.unwrap();
            let descriptor = store.writer_pool().append(None, b"durable bytes").await.unwrap();
            store.close().await.unwrap();
            descriptor
        };

        let reopened = PersistenceStore::init(cfg).await.unwrap();
        let bytes = reopened.reader().read(descriptor).await.unwrap();
        assert_eq!(&bytes[..], b"durable bytes");
        reopened.close().await.unwrap();
    }
}
