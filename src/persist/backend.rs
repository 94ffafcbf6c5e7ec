//! Full-snapshot file I/O.
//!
//! Every store rewrites the whole location; there is no incremental format.

use super::format::Format;
use crate::core::{Result, StoreError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Reads the snapshot at `location`.
///
/// A missing file is the first-run case: missing parent directories are
/// created and an empty dataset is returned.
pub async fn load<D>(location: &str, format: Format, dir_mode: u32) -> Result<D>
where
    D: DeserializeOwned + Default,
{
    match fs::read(location).await {
        Ok(bytes) => format.decode(location, &bytes),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            create_parent_dirs(location, dir_mode).await?;
            debug!(location, "no snapshot found, starting empty");
            Ok(D::default())
        }
        Err(err) => Err(StoreError::io(location, "failed to open file", err)),
    }
}

/// Overwrites `location` with a snapshot of `data`.
pub async fn store<D>(location: &str, format: Format, dir_mode: u32, data: &D) -> Result<()>
where
    D: Serialize,
{
    let bytes = format.encode(location, data)?;
    create_parent_dirs(location, dir_mode).await?;
    atomic_write(location, &bytes).await?;
    debug!(location, bytes = bytes.len(), "snapshot written");
    Ok(())
}

async fn create_parent_dirs(location: &str, dir_mode: u32) -> Result<()> {
    let Some(parent) = Path::new(location).parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(dir_mode);
    #[cfg(not(unix))]
    let _ = dir_mode;

    builder.create(parent).await.map_err(|err| {
        StoreError::io(
            location,
            &format!("failed to create directory '{}'", parent.display()),
            err,
        )
    })
}

async fn atomic_write(location: &str, bytes: &[u8]) -> Result<()> {
    let tmp = format!("{}.tmp", location);

    let mut file = fs::File::create(&tmp)
        .await
        .map_err(|err| StoreError::io(location, &format!("failed to create temp file '{}'", tmp), err))?;

    let written = write_and_replace(location, &tmp, &mut file, bytes).await;
    if written.is_err() {
        drop(file);
        // Best effort: the original error is what the caller needs.
        if let Err(err) = fs::remove_file(&tmp).await {
            debug!(location, error = %err, "failed to remove temp file");
        }
    }
    written
}

async fn write_and_replace(location: &str, tmp: &str, file: &mut fs::File, bytes: &[u8]) -> Result<()> {
    file.write_all(bytes)
        .await
        .map_err(|err| StoreError::io(location, "failed to write snapshot", err))?;
    file.sync_all()
        .await
        .map_err(|err| StoreError::io(location, "failed to sync snapshot", err))?;

    fs::rename(tmp, location)
        .await
        .map_err(|err| StoreError::io(location, &format!("failed to rename temp file '{}'", tmp), err))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_missing_bootstraps_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("nested").join("deeper");
        let location = dir.join("items.json");
        let location = location.to_str().unwrap();

        let data: Vec<u32> = load(location, Format::Json, 0o740).await.unwrap();
        assert!(data.is_empty());
        assert!(dir.is_dir());
        assert!(!Path::new(location).exists());
    }

    #[tokio::test]
    async fn test_store_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let location = temp_dir.path().join("items.mpk");
        let location = location.to_str().unwrap();

        store(location, Format::MessagePack, 0o740, &vec!["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        let data: Vec<String> = load(location, Format::MessagePack, 0o740).await.unwrap();
        assert_eq!(data, vec!["a", "b"]);
        assert!(!Path::new(&format!("{}.tmp", location)).exists());
    }

    #[tokio::test]
    async fn test_load_malformed_fails() {
        let temp_dir = TempDir::new().unwrap();
        let location = temp_dir.path().join("broken.json");
        std::fs::write(&location, b"[1, 2,").unwrap();

        let res: Result<Vec<u32>> = load(location.to_str().unwrap(), Format::Json, 0o740).await;
        assert!(matches!(res, Err(StoreError::Encoding { .. })));
    }

    #[tokio::test]
    async fn test_bootstrap_failure_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();
        let location = blocker.join("sub").join("items.json");

        let res: Result<Vec<u32>> = load(location.to_str().unwrap(), Format::Json, 0o740).await;
        assert!(matches!(res, Err(StoreError::Io { .. })));
    }

    #[tokio::test]
    async fn test_failed_write_removes_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        // A directory in the target's place makes the final rename fail.
        let location = temp_dir.path().join("items.json");
        std::fs::create_dir(&location).unwrap();
        let location = location.to_str().unwrap();

        let res = store(location, Format::Json, 0o740, &vec![1u32, 2]).await;
        assert!(matches!(res, Err(StoreError::Io { .. })));
        assert!(!Path::new(&format!("{}.tmp", location)).exists());
        assert!(Path::new(location).is_dir());
    }
}
