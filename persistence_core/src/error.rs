//! Error kinds for the persistence core (spec.md §7). Each variant maps
//! 1:1 to an HTTP status at a boundary this crate does not implement; we
//! only guarantee the variant is distinguishable by the caller.

use utils::id::ExtentId;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("store not initialized")]
    NotInitialized,

    #[error("store is closed")]
    Closed,

    #[error("unknown destination: {0}")]
    UnknownDestination(String),

    #[error("extent not found: {0}")]
    ExtentNotFound(ExtentId),

    #[error("requested range exceeds extent size")]
    RangeExceeded,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation cancelled")]
    OperationCancelled,

    #[error("payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;
