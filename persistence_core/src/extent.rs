//! The extent data model (spec.md §3).

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
pub use utils::id::ExtentId;

/// A durable row in the extent metadata catalog: everything needed to
/// locate and validate reads against one extent file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub id: ExtentId,
    pub destination_id: String,
    pub relative_path: Utf8PathBuf,
    pub size: u64,
    pub last_modify_ms: u64,
    /// Monotonically increasing internal sequence number, assigned by the
    /// catalog on insert. Used as the opaque pagination marker (spec.md
    /// §4.D) and never reused, even after the row is deleted.
    pub sequence: u64,
}

/// The value higher-level catalogs store to refer to a byte range
/// (spec.md §6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtentDescriptor {
    pub extent_id: ExtentId,
    pub offset: u64,
    pub count: u64,
}

impl ExtentDescriptor {
    pub fn end(&self) -> u64 {
        self.offset + self.count
    }
}
