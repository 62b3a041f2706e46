//! Extent Reader (spec.md §4.C).

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::catalog::ExtentMetadataCatalog;
use crate::destination::DestinationTable;
use crate::error::{Error, Result};
use crate::extent::ExtentDescriptor;

pub struct ExtentReader {
    destinations: DestinationTable,
    catalog: Arc<ExtentMetadataCatalog>,
}

impl ExtentReader {
    pub fn new(destinations: DestinationTable, catalog: Arc<ExtentMetadataCatalog>) -> Self {
        Self {
            destinations,
            catalog,
        }
    }

    /// Resolves `descriptor` via the catalog, opens the extent read-only,
    /// seeks to `offset`, and reads exactly `count` bytes.
    ///
    /// Because writers only append and a catalog `size` update follows
    /// the corresponding bytes becoming durable at that offset (spec.md
    /// §4.C), any `offset + count <= size` read observes stable bytes
    /// even while a writer is concurrently appending further on.
    pub async fn read(&self, descriptor: ExtentDescriptor) -> Result<Bytes> {
        let extent = self.catalog.get(descriptor.extent_id).await?;

        if descriptor.end() > extent.size {
            return Err(Error::RangeExceeded);
        }

        let path = self.destinations.resolve(&extent)?;
        let mut file = tokio::fs::File::open(path.as_std_path()).await?;
        file.seek(std::io::SeekFrom::Start(descriptor.offset)).await?;

        let mut buf = BytesMut::zeroed(descriptor.count as usize);
        file.read_exact(&mut buf).await?;

        Ok(buf.freeze())
    }
}
