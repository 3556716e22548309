//! Capture record model matching the in-page capture payload.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Element bounding box at capture time, in integer CSS pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Browser viewport dimensions at capture time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ViewportSize {
    pub width: i32,
    pub height: i32,
}

/// UI-framework component that owns a captured element.
///
/// Resolvers may report more than these three fields; the rest ride along in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ComponentInfo {
    #[serde(default)]
    pub framework: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub file: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One ancestor of a captured element, nearest first.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParentEntry {
    pub tag_name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub class_list: Vec<String>,
    #[serde(default)]
    pub component: Option<ComponentInfo>,
}

/// A single Alt+Click capture.
///
/// Only `comment` changes after creation. Fields the store does not know about are kept
/// in `extra` so they survive a round-trip through the document.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRecord {
    #[serde(default)]
    pub click_id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub element_id: Option<String>,
    #[serde(default)]
    pub class_list: Vec<String>,
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub component: Option<ComponentInfo>,
    #[serde(default)]
    pub parent_chain: Vec<ParentEntry>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub viewport_size: ViewportSize,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CaptureRecord {
    /// Parsed creation time, `None` when the stored timestamp is not RFC 3339.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Whether the record is still live at `now`.
    ///
    /// Unparseable timestamps count as expired.
    pub fn is_fresh(&self, now: DateTime<Utc>, expiry: chrono::Duration) -> bool {
        self.created_at()
            .map(|created| now.signed_duration_since(created) < expiry)
            .unwrap_or(false)
    }

    /// Short human label used in logs and notices.
    pub fn label(&self) -> &str {
        self.component
            .as_ref()
            .map(|c| c.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(self.tag_name.as_str())
    }
}
