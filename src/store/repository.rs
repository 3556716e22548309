//! Capture repository: every store operation as one serialized read-modify-write.
//!
//! A single FIFO lock per output file orders operations, so two near-simultaneous captures
//! never overwrite each other: the second always loads what the first wrote.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{ensure_output_file, read_document, write_document};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{
    format_timestamp, CaptureStore, CreateCaptureRequest, CreateCaptureResponse, DeleteResponse,
    StoreUpdate,
};

/// Repository over one JSON output file.
pub struct CaptureRepository {
    path: PathBuf,
    max_entries: usize,
    expiry: chrono::Duration,
    /// Held for the whole of one read-modify-write. Tokio's mutex grants the lock in
    /// request order.
    queue: Mutex<()>,
}

impl CaptureRepository {
    pub fn new(path: impl Into<PathBuf>, max_entries: usize, expiry: chrono::Duration) -> Self {
        Self {
            path: path.into(),
            max_entries: max_entries.max(1),
            expiry,
            queue: Mutex::new(()),
        }
    }

    /// Build from configuration and make sure the output file exists.
    pub async fn open(config: &Config) -> Result<Self, AppError> {
        let repo = Self::new(&config.output_file, config.max_entries, config.expiry());
        ensure_output_file(&repo.path).await?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` against the swept store under the queue lock and persist the result.
    ///
    /// If `op` fails nothing is written.
    async fn transact<T>(
        &self,
        operation: &'static str,
        op: impl FnOnce(&mut CaptureStore, DateTime<Utc>) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let _turn = self.queue.lock().await;

        let now = Utc::now();
        let mut store = read_document(&self.path).await;
        let swept = store.sweep_expired(now, self.expiry);
        if swept > 0 {
            tracing::debug!(operation, swept, "Swept expired clicks");
        }

        let result = op(&mut store, now)?;

        write_document(&self.path, &store).await.map_err(|e| {
            tracing::error!(operation, path = %self.path.display(), "Failed to persist store: {}", e);
            e
        })?;
        Ok(result)
    }

    /// Record a new capture in the active session, or in a new one.
    pub async fn create_capture(
        &self,
        request: CreateCaptureRequest,
    ) -> Result<CreateCaptureResponse, AppError> {
        let CreateCaptureRequest {
            mut data,
            new_session,
            session_name,
        } = request;

        if data.click_id.trim().is_empty() || data.tag_name.trim().is_empty() {
            tracing::warn!(
                click_id = %data.click_id,
                tag = %data.tag_name,
                "Rejected capture without clickId/tagName"
            );
            return Err(AppError::Validation(
                "Capture requires non-empty clickId and tagName".to_string(),
            ));
        }

        let max_entries = self.max_entries;
        self.transact("create", move |store, now| {
            if data.timestamp.trim().is_empty() {
                data.timestamp = format_timestamp(now);
            }
            let tag = data.tag_name.clone();
            let click_id = data.click_id.clone();

            let outcome =
                store.append_capture(data, new_session, session_name.as_deref(), max_entries, now);
            let total_clicks = store.total_clicks();

            tracing::info!(
                click_id = %click_id,
                session = %outcome.session_name,
                new_session = outcome.created_session,
                evicted = outcome.evicted,
                "Added click on <{}> ({} total)",
                tag,
                total_clicks
            );

            Ok(CreateCaptureResponse {
                success: true,
                session_id: outcome.session_id,
                session_name: outcome.session_name,
                session_color: outcome.session_color,
                total_clicks,
            })
        })
        .await
    }

    /// Return the swept store.
    ///
    /// Afterwards the persisted store keeps everything when `keep`, loses only
    /// `consume_ids` when any are given, and is emptied otherwise.
    pub async fn read_store(
        &self,
        keep: bool,
        consume_ids: &[String],
    ) -> Result<CaptureStore, AppError> {
        self.transact("read", |store, _| {
            let snapshot = store.clone();
            if !consume_ids.is_empty() {
                let removed = store.remove_clicks(consume_ids);
                tracing::info!("Consumed {} of {} requested clicks", removed, consume_ids.len());
            } else if !keep {
                store.clear();
                tracing::info!("Read and cleared {} clicks", snapshot.total_clicks());
            } else {
                tracing::debug!("Read {} clicks", snapshot.total_clicks());
            }
            Ok(snapshot)
        })
        .await
    }

    /// Delete one capture by id, or everything when no id is given.
    pub async fn delete(&self, click_id: Option<&str>) -> Result<DeleteResponse, AppError> {
        self.transact("delete", |store, _| match click_id {
            Some(id) => {
                if store.remove_click(id) {
                    tracing::info!(click_id = %id, "Deleted click ({} total)", store.total_clicks());
                } else {
                    tracing::warn!(click_id = %id, "Delete for unknown click");
                }
                Ok(DeleteResponse {
                    success: true,
                    total_clicks: store.total_clicks(),
                    sessions: Some(store.sessions.clone()),
                })
            }
            None => {
                store.clear();
                tracing::info!("Cleared all sessions");
                Ok(DeleteResponse {
                    success: true,
                    total_clicks: 0,
                    sessions: None,
                })
            }
        })
        .await
    }

    /// Apply a comment or session color update.
    pub async fn update(&self, update: StoreUpdate) -> Result<(), AppError> {
        self.transact("update", |store, _| match update {
            StoreUpdate::Comment { click_id, comment } => {
                if !store.set_comment(&click_id, comment) {
                    tracing::warn!(click_id = %click_id, "Comment update for unknown click");
                    return Err(AppError::NotFound(format!("Click {} not found", click_id)));
                }
                tracing::info!(click_id = %click_id, "Updated comment");
                Ok(())
            }
            StoreUpdate::SessionColor { session_id, color } => {
                if !store.set_session_color(&session_id, &color) {
                    tracing::warn!(session_id = %session_id, "Color update for unknown session");
                    return Err(AppError::NotFound(format!("Session {} not found", session_id)));
                }
                tracing::info!(session_id = %session_id, color = %color, "Updated session color");
                Ok(())
            }
        })
        .await
    }
}
