//! Extent Garbage Collector (spec.md §4.F).
//!
//! A sweep snapshots the union of referenced extent ids from every
//! configured `ReferencedExtentsSource`, then walks the catalog in
//! batches, deleting any extent that is both unreferenced and older
//! than `unmodified_window`. That window is the safety fence described
//! in spec.md §4.G: an extent written a moment ago but not yet
//! referenced by its higher-level record must never be reclaimed out
//! from under the writer that is about to reference it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::catalog::ExtentMetadataCatalog;
use crate::destination::DestinationTable;
use crate::error::Result;
use crate::reference_source::ReferencedExtentsSource;

const GC_BATCH_SIZE: usize = 1000;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GcOutcome {
    pub scanned: u64,
    pub deleted: u64,
    pub bytes_reclaimed: u64,
}

pub struct GarbageCollector {
    destinations: DestinationTable,
    catalog: Arc<ExtentMetadataCatalog>,
    sources: Vec<Arc<dyn ReferencedExtentsSource>>,
    unmodified_window: Duration,
    sweeping: AtomicBool,
}

impl GarbageCollector {
    pub fn new(
        destinations: DestinationTable,
        catalog: Arc<ExtentMetadataCatalog>,
        sources: Vec<Arc<dyn ReferencedExtentsSource>>,
        unmodified_window: Duration,
    ) -> Self {
        Self {
            destinations,
            catalog,
            sources,
            unmodified_window,
            sweeping: AtomicBool::new(false),
        }
    }

    /// Runs one sweep. `now_ms` is threaded through explicitly (rather
    /// than read from the clock inside) so tests can simulate advancing
    /// past the unmodified window without sleeping.
    ///
    /// A sweep already in progress causes a concurrent call to return
    /// `None` immediately (spec.md §4.F: "GC does not run concurrently
    /// with itself; a second fire while a sweep is in progress is
    /// dropped").
    pub async fn sweep(&self, now_ms: u64) -> Result<Option<GcOutcome>> {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("GC sweep already in progress, dropping this trigger");
            return Ok(None);
        }
        let outcome = self.sweep_inner(now_ms).await;
        self.sweeping.store(false, Ordering::Release);
        outcome.map(Some)
    }

    async fn sweep_inner(&self, now_ms: u64) -> Result<GcOutcome> {
        let referenced = self.snapshot_referenced_ids().await;

        let mut outcome = GcOutcome::default();
        let mut batches = self.catalog.extent_id_batches(GC_BATCH_SIZE).await;

        while let Some(batch) = batches.next_batch() {
            for id in batch {
                outcome.scanned += 1;

                let extent = match self.catalog.get(id).await {
                    Ok(extent) => extent,
                    // Raced with a concurrent delete; nothing to do.
                    Err(_) => continue,
                };

                if referenced.contains(&id) {
                    continue;
                }

                let age_ms = now_ms.saturating_sub(extent.last_modify_ms);
                if age_ms < self.unmodified_window.as_millis() as u64 {
                    continue;
                }

                let path = match self.destinations.resolve(&extent) {
                    Ok(path) => path,
                    Err(e) => {
                        warn!(extent = %id, "cannot resolve destination during GC, skipping: {e}");
                        continue;
                    }
                };

                tokio::fs::remove_file(path.as_std_path())
                    .await
                    .or_else(utils::fs_ext::ignore_not_found)?;
                self.catalog.delete(id).await?;

                outcome.deleted += 1;
                outcome.bytes_reclaimed += extent.size;
            }
        }

        metrics::GC_EXTENTS_SCANNED_TOTAL.inc_by(outcome.scanned);
        metrics::GC_EXTENTS_DELETED_TOTAL.inc_by(outcome.deleted);
        metrics::GC_BYTES_RECLAIMED_TOTAL.inc_by(outcome.bytes_reclaimed);

        info!(
            scanned = outcome.scanned,
            deleted = outcome.deleted,
            bytes_reclaimed = outcome.bytes_reclaimed,
            "GC sweep complete"
        );

        Ok(outcome)
    }

    async fn snapshot_referenced_ids(&self) -> HashSet<utils::id::ExtentId> {
        let mut referenced = HashSet::new();
        for source in &self.sources {
            source.reset();
            loop {
                let batch = source.next_referenced_batch().await;
                if batch.is_empty() {
                    break;
                }
                referenced.extend(batch);
            }
        }
        referenced
    }

    /// Spawns the periodic sweep timer (spec.md §4.F: default 10
    /// minutes).
    pub fn spawn_periodic(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        let now_ms = SystemTime::now()
                            .duration_since(UNIX_EPOCH)
                            .unwrap_or_default()
                            .as_millis() as u64;
                        if let Err(e) = self.sweep(now_ms).await {
                            warn!("GC sweep failed: {e}");
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        })
    }
}
