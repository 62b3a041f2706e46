//! Extent Metadata Catalog (spec.md §4.D).
//!
//! A durable mapping `extentId -> Extent`, persisted as a single
//! serde_json document (the teacher's `IndexPart`/`index_part.json`
//! pattern: a whole-document manifest rewritten atomically, rather than
//! an embedded database engine). A primary `HashMap` index gives O(1)
//! point lookups; a secondary `BTreeMap` keyed by the internal sequence
//! number gives the ordered walk paged `list` and `iterate_all` need.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::extent::Extent;
use utils::id::ExtentId;

#[derive(Default, Serialize, Deserialize)]
struct CatalogDocument {
    next_sequence: u64,
    extents: Vec<Extent>,
}

struct CatalogInner {
    by_id: HashMap<ExtentId, Extent>,
    by_sequence: BTreeMap<u64, ExtentId>,
}

impl CatalogInner {
    fn from_document(doc: CatalogDocument) -> Self {
        let mut by_id = HashMap::with_capacity(doc.extents.len());
        let mut by_sequence = BTreeMap::new();
        for extent in doc.extents {
            by_sequence.insert(extent.sequence, extent.id);
            by_id.insert(extent.id, extent);
        }
        Self { by_id, by_sequence }
    }

    fn to_document(&self, next_sequence: u64) -> CatalogDocument {
        let mut extents: Vec<Extent> = self.by_id.values().cloned().collect();
        extents.sort_by_key(|e| e.sequence);
        CatalogDocument {
            next_sequence,
            extents,
        }
    }
}

/// Optional constraints applied by `list` (spec.md §4.D and §9's
/// guidance to model the query as a structured predicate rather than a
/// DSL).
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub id: Option<ExtentId>,
    /// Entries whose `last_modify_ms < unmodified_before_ms`.
    pub unmodified_before_ms: Option<u64>,
}

impl ListFilter {
    fn matches(&self, extent: &Extent) -> bool {
        if let Some(id) = self.id {
            if extent.id != id {
                return false;
            }
        }
        if let Some(before) = self.unmodified_before_ms {
            if !(extent.last_modify_ms < before) {
                return false;
            }
        }
        true
    }
}

pub struct ListPage {
    pub records: Vec<Extent>,
    pub next_marker: Option<u64>,
}

/// The durable extent metadata catalog.
pub struct ExtentMetadataCatalog {
    path: Utf8PathBuf,
    inner: RwLock<CatalogInner>,
    next_sequence: AtomicU64,
    closed: AtomicBool,
    default_limit: usize,
}

impl ExtentMetadataCatalog {
    /// Startup/recovery step (spec.md §4.I): load the backing file if it
    /// exists, else start empty and persist once to materialize it.
    pub async fn open(path: &Utf8Path, default_limit: usize) -> Result<Self> {
        let doc = match tokio::fs::read(path.as_std_path()).await {
            Ok(bytes) => {
                let doc: CatalogDocument = serde_json::from_slice(&bytes).map_err(|e| {
                    Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
                })?;
                info!(extents = doc.extents.len(), path = %path, "loaded extent catalog");
                doc
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path, "no extent catalog found, starting empty");
                CatalogDocument::default()
            }
            Err(e) => return Err(e.into()),
        };

        let next_sequence = doc.next_sequence;
        let catalog = Self {
            path: path.to_owned(),
            inner: RwLock::new(CatalogInner::from_document(doc)),
            next_sequence: AtomicU64::new(next_sequence),
            closed: AtomicBool::new(false),
            default_limit,
        };
        catalog.save().await?;
        Ok(catalog)
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    /// Allocates the next internal sequence number for a freshly created
    /// extent row. Never reused, even across restarts.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn upsert(&self, extent: Extent) -> Result<()> {
        self.check_open()?;
        let mut inner = self.inner.write().await;
        if let Some(previous) = inner.by_id.get(&extent.id) {
            if previous.sequence != extent.sequence {
                inner.by_sequence.remove(&previous.sequence);
                inner.by_sequence.insert(extent.sequence, extent.id);
            }
        } else {
            inner.by_sequence.insert(extent.sequence, extent.id);
        }
        inner.by_id.insert(extent.id, extent);
        Ok(())
    }

    pub async fn get(&self, id: ExtentId) -> Result<Extent> {
        self.check_open()?;
        let inner = self.inner.read().await;
        inner.by_id.get(&id).cloned().ok_or(Error::ExtentNotFound(id))
    }

    /// Idempotent: removing an id that is not present succeeds silently
    /// (spec.md §9: `findAndRemove`'s unused result becomes an explicit
    /// idempotent-delete contract here).
    pub async fn delete(&self, id: ExtentId) -> Result<()> {
        self.check_open()?;
        let mut inner = self.inner.write().await;
        if let Some(extent) = inner.by_id.remove(&id) {
            inner.by_sequence.remove(&extent.sequence);
        }
        Ok(())
    }

    /// Paged enumeration (spec.md §4.D). `marker` is `None` to start from
    /// the beginning (spec.md §9's open question, resolved explicitly:
    /// absence of a marker means "from the start", not an unbounded
    /// `$gt` on an undefined value). `limit` defaults to the catalog's
    /// configured default (5000 unless overridden) when `None`.
    pub async fn list(
        &self,
        filter: ListFilter,
        marker: Option<u64>,
        limit: Option<usize>,
    ) -> Result<ListPage> {
        self.check_open()?;
        let limit = limit.unwrap_or(self.default_limit);
        let inner = self.inner.read().await;

        let range = match marker {
            Some(m) => inner.by_sequence.range((
                std::ops::Bound::Excluded(m),
                std::ops::Bound::Unbounded,
            )),
            None => inner.by_sequence.range(..),
        };

        let mut records = Vec::new();
        let mut last_sequence = None;
        for (&sequence, id) in range {
            if records.len() == limit {
                break;
            }
            let extent = inner
                .by_id
                .get(id)
                .expect("by_sequence and by_id must stay in sync");
            if filter.matches(extent) {
                records.push(extent.clone());
                last_sequence = Some(sequence);
            }
        }

        let next_marker = if records.len() == limit {
            last_sequence
        } else {
            None
        };

        Ok(ListPage {
            records,
            next_marker,
        })
    }

    /// Snapshot of every extent id, in fixed-size batches, for GC to
    /// consume. Restartable from the beginning by constructing a new
    /// `ExtentIdBatches`; never restartable from an arbitrary point
    /// (spec.md §4.D).
    pub async fn extent_id_batches(&self, batch_size: usize) -> ExtentIdBatches {
        let inner = self.inner.read().await;
        let ids: Vec<ExtentId> = inner.by_sequence.values().copied().collect();
        ExtentIdBatches {
            ids,
            batch_size,
            cursor: 0,
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Persists the whole catalog document atomically.
    pub async fn save(&self) -> Result<()> {
        let inner = self.inner.read().await;
        let doc = inner.to_document(self.next_sequence.load(Ordering::Relaxed));
        drop(inner);
        let bytes = serde_json::to_vec(&doc)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        utils::fs_ext::durable_write(self.path.as_std_path(), &bytes).await?;
        debug!(path = %self.path, extents = doc.extents.len(), "autosaved extent catalog");
        Ok(())
    }

    /// Flushes and marks the catalog closed; further operations return
    /// `Error::Closed`.
    pub async fn close(&self) -> Result<()> {
        self.save().await?;
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    /// Spawns the periodic autosave task (spec.md §4.D: "autosaved at a
    /// fixed cadence"). The returned handle should be aborted or allowed
    /// to exit via `cancel` before process shutdown; a crash loses at
    /// most the last autosave window of metadata changes.
    pub fn spawn_autosave(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let catalog = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        if let Err(e) = catalog.save().await {
                            warn!("catalog autosave failed: {e}");
                        }
                    }
                    _ = cancel.cancelled() => {
                        break;
                    }
                }
            }
        })
    }
}

/// Lazy, finite, restartable-from-the-start sequence of extent id
/// batches (spec.md §4.D `iterateAll`).
pub struct ExtentIdBatches {
    ids: Vec<ExtentId>,
    batch_size: usize,
    cursor: usize,
}

impl ExtentIdBatches {
    pub fn next_batch(&mut self) -> Option<Vec<ExtentId>> {
        if self.cursor >= self.ids.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.ids.len());
        let batch = self.ids[self.cursor..end].to_vec();
        self.cursor = end;
        Some(batch)
    }
}
