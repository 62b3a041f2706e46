//! End-to-end coverage of the reference/lifecycle protocol (spec.md
//! §4.G): a higher-level catalog must append, then persist the
//! descriptor, then acknowledge — and on the delete path, remove its
//! reference before GC is ever allowed to reclaim the bytes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use persistence_core::reference_source::ReferencedExtentsSource;
use persistence_core::{DestinationTable, ExtentMetadataCatalog, ExtentWriterPool, GarbageCollector, StoreConfig};
use tokio::sync::Mutex as AsyncMutex;
use utils::id::ExtentId;

/// A higher-level catalog stand-in: holds whatever extent ids it has
/// currently persisted a reference for, and can have that set updated
/// between GC sweeps the way a real blob/queue catalog would as clients
/// write and delete records. Yields its whole current snapshot as one
/// batch per sweep, then empty until the next `reset`.
struct FakeBlobCatalog {
    referenced: AsyncMutex<Vec<ExtentId>>,
    exhausted: AtomicBool,
}

impl FakeBlobCatalog {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            referenced: AsyncMutex::new(Vec::new()),
            exhausted: AtomicBool::new(false),
        })
    }

    async fn persist_reference(&self, id: ExtentId) {
        self.referenced.lock().await.push(id);
    }

    async fn remove_reference(&self, id: ExtentId) {
        self.referenced.lock().await.retain(|&existing| existing != id);
    }
}

impl ReferencedExtentsSource for FakeBlobCatalog {
    async fn next_referenced_batch(&self) -> Vec<ExtentId> {
        if self.exhausted.swap(true, Ordering::AcqRel) {
            return Vec::new();
        }
        self.referenced.lock().await.clone()
    }

    fn reset(&self) {
        self.exhausted.store(false, Ordering::Release);
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

#[tokio::test]
async fn orphan_between_append_and_persist_is_reclaimed_after_the_window_elapses() {
    let dir = camino_tempfile::tempdir().unwrap();
    let cfg = StoreConfig::for_testing(dir.path());
    let destinations = DestinationTable::new(&cfg.destinations);
    let catalog = Arc::new(
        ExtentMetadataCatalog::open(&cfg.extent_catalog_path, cfg.default_list_limit)
            .await
            .unwrap(),
    );
    let pool = ExtentWriterPool::new(
        destinations.clone(),
        catalog.clone(),
        cfg.rotation_threshold_bytes,
        cfg.idle_timeout,
    )
    .unwrap();

    // Step 1 of the writer protocol: append, receive a descriptor. The
    // higher-level catalog crashes before step 2 ever runs, so this
    // extent is never referenced.
    let descriptor = pool.append(None, b"orphaned payload").await.unwrap();
    let last_modify_ms = catalog.get(descriptor.extent_id).await.unwrap().last_modify_ms;

    let empty_catalog = FakeBlobCatalog::new();
    let gc = GarbageCollector::new(
        destinations,
        catalog.clone(),
        vec![empty_catalog],
        Duration::from_secs(3600),
    );

    // Within the window: still protected, even though never referenced.
    let within_window = gc.sweep(last_modify_ms + 1).await.unwrap().unwrap();
    assert_eq!(within_window.deleted, 0);
    assert!(catalog.get(descriptor.extent_id).await.is_ok());

    // Past the window: the orphan is reclaimed, never having been
    // referenced by anything.
    let past_window_ms = last_modify_ms + Duration::from_secs(3601).as_millis() as u64;
    let after_window = gc.sweep(past_window_ms).await.unwrap().unwrap();
    assert_eq!(after_window.deleted, 1);
    assert!(catalog.get(descriptor.extent_id).await.is_err());
}

#[tokio::test]
async fn referenced_extent_survives_until_its_reference_is_removed() {
    let dir = camino_tempfile::tempdir().unwrap();
    let cfg = StoreConfig::for_testing(dir.path());
    let destinations = DestinationTable::new(&cfg.destinations);
    let catalog = Arc::new(
        ExtentMetadataCatalog::open(&cfg.extent_catalog_path, cfg.default_list_limit)
            .await
            .unwrap(),
    );
    let pool = ExtentWriterPool::new(
        destinations.clone(),
        catalog.clone(),
        cfg.rotation_threshold_bytes,
        cfg.idle_timeout,
    )
    .unwrap();

    // The writer protocol, followed correctly: append, then persist the
    // reference in the higher-level catalog, then (implicitly)
    // acknowledge the client.
    let descriptor = pool.append(None, b"referenced payload").await.unwrap();
    let blob_catalog = FakeBlobCatalog::new();
    blob_catalog.persist_reference(descriptor.extent_id).await;

    let gc = GarbageCollector::new(
        destinations,
        catalog.clone(),
        vec![blob_catalog.clone()],
        Duration::from_secs(0),
    );

    let far_future_ms = now_ms() + Duration::from_secs(10_000).as_millis() as u64;

    // Still referenced: GC must never reclaim it, window or no window.
    let while_referenced = gc.sweep(far_future_ms).await.unwrap().unwrap();
    assert_eq!(while_referenced.deleted, 0);
    assert!(catalog.get(descriptor.extent_id).await.is_ok());

    // The deleter protocol: remove the reference first...
    blob_catalog.remove_reference(descriptor.extent_id).await;

    // ...only then does a subsequent sweep reclaim the bytes.
    let after_dereference = gc.sweep(far_future_ms + 1).await.unwrap().unwrap();
    assert_eq!(after_dereference.deleted, 1);
    assert!(catalog.get(descriptor.extent_id).await.is_err());
}
