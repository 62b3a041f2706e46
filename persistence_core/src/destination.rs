//! Persistence Destinations (spec.md §4.A).
//!
//! Pure configuration lookup: `destinationId -> rootPath, maxConcurrency`.
//! Destinations are named, not indexed by position, so on-disk catalog
//! rows survive configuration reordering across restarts.

use std::collections::HashMap;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

use crate::config::DestinationConfig;
use crate::error::{Error, Result};
use crate::extent::Extent;

#[derive(Debug, Clone)]
struct Destination {
    root_path: Utf8PathBuf,
    max_concurrency: usize,
}

/// Cheaply clonable (`Arc`-backed) table of configured destinations,
/// shared by the writer pool, reader, and any admin surface without a
/// process-global.
#[derive(Clone)]
pub struct DestinationTable {
    inner: Arc<DestinationTableInner>,
}

struct DestinationTableInner {
    destinations: HashMap<String, Destination>,
    /// Stable order for round-robin selection; `HashMap` iteration order
    /// is not stable across runs.
    order: Vec<String>,
}

impl DestinationTable {
    pub fn new(configs: &[DestinationConfig]) -> Self {
        let mut destinations = HashMap::with_capacity(configs.len());
        let mut order = Vec::with_capacity(configs.len());
        for cfg in configs {
            destinations.insert(
                cfg.id.clone(),
                Destination {
                    root_path: cfg.root_path.clone(),
                    max_concurrency: cfg.max_concurrency,
                },
            );
            order.push(cfg.id.clone());
        }
        Self {
            inner: Arc::new(DestinationTableInner { destinations, order }),
        }
    }

    /// Adding destinations after startup is allowed (spec.md §3): returns
    /// a new table sharing no mutable state with the old one, so callers
    /// that already hold a clone of the previous table keep operating
    /// against the configuration that was current when they started.
    pub fn with_added(&self, cfg: DestinationConfig) -> Self {
        let mut destinations = self.inner.destinations.clone();
        let mut order = self.inner.order.clone();
        if !destinations.contains_key(&cfg.id) {
            order.push(cfg.id.clone());
        }
        destinations.insert(
            cfg.id.clone(),
            Destination {
                root_path: cfg.root_path,
                max_concurrency: cfg.max_concurrency,
            },
        );
        Self {
            inner: Arc::new(DestinationTableInner { destinations, order }),
        }
    }

    pub fn max_concurrency(&self, id: &str) -> Result<usize> {
        self.inner
            .destinations
            .get(id)
            .map(|d| d.max_concurrency)
            .ok_or_else(|| Error::UnknownDestination(id.to_string()))
    }

    pub fn root_path(&self, id: &str) -> Result<&Utf8Path> {
        self.inner
            .destinations
            .get(id)
            .map(|d| d.root_path.as_path())
            .ok_or_else(|| Error::UnknownDestination(id.to_string()))
    }

    /// Resolves an extent's logical location to an absolute file path.
    pub fn resolve(&self, extent: &Extent) -> Result<Utf8PathBuf> {
        Ok(self.root_path(&extent.destination_id)?.join(&extent.relative_path))
    }

    /// Stable round-robin order over configured destination ids, used
    /// when `append` is called without an explicit destination hint.
    pub fn round_robin_order(&self) -> &[String] {
        &self.inner.order
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.destinations.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(id: &str) -> DestinationConfig {
        DestinationConfig {
            id: id.to_string(),
            root_path: Utf8PathBuf::from(format!("/tmp/{id}")),
            max_concurrency: 2,
        }
    }

    #[test]
    fn unknown_destination_is_an_error() {
        let table = DestinationTable::new(&[cfg("a")]);
        assert!(matches!(
            table.max_concurrency("b"),
            Err(Error::UnknownDestination(_))
        ));
    }

    #[test]
    fn round_robin_order_matches_configuration_order() {
        let table = DestinationTable::new(&[cfg("a"), cfg("b"), cfg("c")]);
        assert_eq!(table.round_robin_order(), &["a", "b", "c"]);
    }

    #[test]
    fn with_added_preserves_existing_destinations() {
        let table = DestinationTable::new(&[cfg("a")]);
        let table = table.with_added(cfg("b"));
        assert!(table.contains("a"));
        assert!(table.contains("b"));
    }
}
