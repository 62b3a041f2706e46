//! Core persistence substrate for the local object-storage emulator:
//! the extent store (append-only byte files), the extent metadata
//! catalog (the durable row per extent), the garbage collector that
//! reclaims unreferenced extents, and the recovery path that wires
//! them together at startup.
//!
//! This crate has no network surface of its own; `persistence_daemon`
//! and any protocol-facing crate built on top of it own that.

pub mod catalog;
pub mod config;
pub mod destination;
pub mod error;
pub mod extent;
pub mod gc;
pub mod properties;
pub mod reader;
pub mod recovery;
pub mod reference_source;
pub mod writer_pool;

pub use catalog::{ExtentMetadataCatalog, ListFilter, ListPage};
pub use config::{DestinationConfig, StoreConfig};
pub use destination::DestinationTable;
pub use error::{Error, Result};
pub use extent::{Extent, ExtentDescriptor, ExtentId};
pub use gc::{GarbageCollector, GcOutcome};
pub use properties::{ServiceProperties, ServicePropertiesStore, ServicePropertiesUpdate};
pub use reader::ExtentReader;
pub use recovery::PersistenceStore;
pub use reference_source::ReferencedExtentsSource;
pub use writer_pool::ExtentWriterPool;
