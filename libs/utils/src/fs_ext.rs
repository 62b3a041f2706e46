//! Filesystem helpers used throughout the catalog and extent store.

use std::io;
use std::path::Path;

/// Turns a `NotFound` error into `Ok(())`, for cleanup code paths where a
/// missing file is not a failure (e.g. GC deleting an extent file that a
/// prior crash already removed).
pub fn ignore_not_found(e: io::Error) -> io::Result<()> {
    if e.kind() == io::ErrorKind::NotFound {
        Ok(())
    } else {
        Err(e)
    }
}

/// Writes `contents` to `path` durably: write to a sibling temp file, fsync
/// it, then rename over the destination. A crash can only ever observe the
/// old contents or the new contents, never a partial write.
pub async fn durable_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp_path = tmp_path_for(path);
    {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        use tokio::io::AsyncWriteExt;
        file.write_all(contents).await?;
        file.sync_all().await?;
    }
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn durable_write_creates_file_with_contents() {
        let dir = camino_tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json").into_std_path_buf();
        durable_write(&path, b"hello").await.unwrap();
        let read = tokio::fs::read(&path).await.unwrap();
        assert_eq!(read, b"hello");
    }

    #[tokio::test]
    async fn durable_write_overwrites_existing_contents() {
        let dir = camino_tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json").into_std_path_buf();
        durable_write(&path, b"first").await.unwrap();
        durable_write(&path, b"second").await.unwrap();
        let read = tokio::fs::read(&path).await.unwrap();
        assert_eq!(read, b"second");
    }

    #[test]
    fn ignore_not_found_passes_through_other_errors() {
        let other = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert!(ignore_not_found(other).is_err());
        let not_found = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert!(ignore_not_found(not_found).is_ok());
    }
}
