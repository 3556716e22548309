//! JSON file persistence for the capture store.
//!
//! The output file is the source of truth. It is read whole, changed in memory and written
//! back whole through a temporary file and a rename, so readers never see a partial write.

mod repository;

pub use repository::*;

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::errors::AppError;
use crate::models::{CaptureStore, StoreDocument};

/// Create the output directory and an empty document if nothing is there yet.
pub async fn ensure_output_file(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    if tokio::fs::try_exists(path).await? {
        return Ok(());
    }
    write_document(path, &CaptureStore::default()).await
}

/// Load the document, migrating legacy shapes.
///
/// A missing, unreadable or corrupt file is an empty store, never an error.
pub async fn read_document(path: &Path) -> CaptureStore {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CaptureStore::default(),
        Err(e) => {
            tracing::warn!("Failed to read {}: {}, treating as empty", path.display(), e);
            return CaptureStore::default();
        }
    };

    if raw.iter().all(u8::is_ascii_whitespace) {
        return CaptureStore::default();
    }

    let value = match serde_json::from_slice::<serde_json::Value>(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Corrupt capture file {}: {}, treating as empty", path.display(), e);
            return CaptureStore::default();
        }
    };

    match StoreDocument::from_value(value) {
        Some(StoreDocument::Sessioned(store)) => store,
        Some(legacy) => {
            let store = legacy.into_store();
            tracing::info!(
                "Migrated legacy capture file {} ({} clicks)",
                path.display(),
                store.total_clicks()
            );
            store
        }
        None => {
            tracing::warn!(
                "Capture file {} has an unknown shape, treating as empty",
                path.display()
            );
            CaptureStore::default()
        }
    }
}

/// Write the whole document to a sibling temp file, then rename it over the live path.
pub async fn write_document(path: &Path, store: &CaptureStore) -> Result<(), AppError> {
    let json = serde_json::to_vec_pretty(store)?;
    let temp_path = temp_path_for(path);

    let mut file = tokio::fs::File::create(&temp_path).await?;
    file.write_all(&json).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        tokio::fs::remove_file(&temp_path).await.ok();
        return Err(e.into());
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
