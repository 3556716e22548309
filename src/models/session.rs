//! Session model: a named, capped batch of captures.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::CaptureRecord;

/// Colors handed out to sessions round-robin by session index.
pub const SESSION_PALETTE: [&str; 8] = [
    "#8b5cf6", "#3b82f6", "#10b981", "#f59e0b", "#ef4444", "#ec4899", "#14b8a6", "#f97316",
];

/// Name given to the session synthesized from a legacy flat document.
pub const MIGRATED_SESSION_NAME: &str = "Migrated Session";

/// Palette color for the session at `index`.
pub fn palette_color(index: usize) -> &'static str {
    SESSION_PALETTE[index % SESSION_PALETTE.len()]
}

/// An ordered group of captures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub started_at: String,
    #[serde(default)]
    pub clicks: VecDeque<CaptureRecord>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Session {
    /// Append a capture, evicting from the front until at most `max_entries` remain.
    ///
    /// Returns the evicted captures, oldest first.
    pub fn push_capped(&mut self, record: CaptureRecord, max_entries: usize) -> Vec<CaptureRecord> {
        self.clicks.push_back(record);
        let mut evicted = Vec::new();
        while self.clicks.len() > max_entries.max(1) {
            if let Some(oldest) = self.clicks.pop_front() {
                evicted.push(oldest);
            }
        }
        evicted
    }

    pub fn find_click_mut(&mut self, click_id: &str) -> Option<&mut CaptureRecord> {
        self.clicks.iter_mut().find(|c| c.click_id == click_id)
    }
}
