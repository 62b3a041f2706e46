//! The one piece of coupling GC needs from higher-level metadata
//! catalogs (spec.md §6.3, §4.E): "is this extent id referenced by any
//! live blob or message record?" is never asked per-id; instead each
//! external catalog exposes the union of ids it currently references,
//! as a lazy, paged sequence, and GC accumulates the union itself.
//!
//! No concrete blob or queue catalog is implemented here — those are
//! external collaborators (spec.md §1) — but the trait lets GC (and its
//! tests) be written against any number of them.

use utils::id::ExtentId;

/// A source of referenced extent ids: a blob metadata catalog, a queue
/// message catalog, or (in tests) an in-memory stand-in.
#[allow(async_fn_in_trait)]
pub trait ReferencedExtentsSource: Send + Sync {
    /// Returns the next batch of referenced extent ids, or an empty
    /// `Vec` when exhausted. Called repeatedly by the GC sweep until it
    /// returns empty; implementations decide their own internal paging.
    async fn next_referenced_batch(&self) -> Vec<ExtentId>;

    /// Resets iteration back to the start, so a single source instance
    /// can be reused across GC sweeps.
    fn reset(&self);
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::ReferencedExtentsSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use utils::id::ExtentId;

    /// A fixed in-memory set of referenced ids, paged in fixed-size
    /// batches, for tests and GC scenario coverage.
    pub struct StaticReferenceSource {
        ids: Vec<ExtentId>,
        batch_size: usize,
        cursor: AtomicUsize,
    }

    impl StaticReferenceSource {
        pub fn new(ids: Vec<ExtentId>, batch_size: usize) -> Self {
            Self {
                ids,
                batch_size: batch_size.max(1),
                cursor: AtomicUsize::new(0),
            }
        }
    }

    impl ReferencedExtentsSource for StaticReferenceSource {
        async fn next_referenced_batch(&self) -> Vec<ExtentId> {
            let start = self.cursor.load(Ordering::Relaxed);
            if start >= self.ids.len() {
                return Vec::new();
            }
            let end = (start + self.batch_size).min(self.ids.len());
            self.cursor.store(end, Ordering::Relaxed);
            self.ids[start..end].to_vec()
        }

        fn reset(&self) {
            self.cursor.store(0, Ordering::Relaxed);
        }
    }
}
