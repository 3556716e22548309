//! Request and response bodies for the capture endpoint.

use serde::{Deserialize, Serialize};

use super::{CaptureRecord, Session};

/// Body of `POST /`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateCaptureRequest {
    pub data: CaptureRecord,
    #[serde(default)]
    pub new_session: bool,
    #[serde(default)]
    pub session_name: Option<String>,
}

/// Response to a successful capture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateCaptureResponse {
    pub success: bool,
    pub session_id: String,
    pub session_name: String,
    pub session_color: String,
    pub total_clicks: usize,
}

/// Body of `PUT /`: either a comment update or a session color update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_id: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// The two mutations a `PUT` can ask for.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreUpdate {
    Comment {
        click_id: String,
        comment: Option<String>,
    },
    SessionColor {
        session_id: String,
        color: String,
    },
}

impl UpdateRequest {
    pub fn comment(click_id: &str, comment: Option<String>) -> Self {
        Self {
            click_id: Some(click_id.to_string()),
            comment,
            ..Default::default()
        }
    }

    pub fn session_color(session_id: &str, color: &str) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            color: Some(color.to_string()),
            ..Default::default()
        }
    }

    /// Decide which update this body describes. `None` when it is neither.
    pub fn into_update(self) -> Option<StoreUpdate> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        if let Some(click_id) = non_empty(self.click_id) {
            let comment = self
                .comment
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty());
            return Some(StoreUpdate::Comment { click_id, comment });
        }

        match (non_empty(self.session_id), non_empty(self.color)) {
            (Some(session_id), Some(color)) => Some(StoreUpdate::SessionColor { session_id, color }),
            _ => None,
        }
    }
}

/// Query string of `GET /`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadQuery {
    #[serde(default)]
    pub keep: Option<String>,
    #[serde(default)]
    pub ids: Option<String>,
}

impl ReadQuery {
    /// Only the literal `true` keeps the store.
    pub fn keep(&self) -> bool {
        self.keep.as_deref() == Some("true")
    }

    /// Comma-separated click ids to consume after the read.
    pub fn consume_ids(&self) -> Vec<String> {
        self.ids
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Query string of `DELETE /`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteQuery {
    #[serde(default)]
    pub click_id: Option<String>,
}

/// Response to a delete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub success: bool,
    pub total_clicks: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<Session>>,
}

/// Plain acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_prefers_click_id() {
        let req: UpdateRequest =
            serde_json::from_value(json!({ "clickId": "abc", "comment": "  fix spacing " })).unwrap();
        assert_eq!(
            req.into_update(),
            Some(StoreUpdate::Comment {
                click_id: "abc".to_string(),
                comment: Some("fix spacing".to_string()),
            })
        );
    }

    #[test]
    fn test_blank_comment_becomes_null() {
        let req: UpdateRequest = serde_json::from_value(json!({ "clickId": "abc", "comment": "   " })).unwrap();
        assert_eq!(
            req.into_update(),
            Some(StoreUpdate::Comment {
                click_id: "abc".to_string(),
                comment: None,
            })
        );
    }

    #[test]
    fn test_color_update_needs_both_fields() {
        let req: UpdateRequest = serde_json::from_value(json!({ "sessionId": "s1" })).unwrap();
        assert_eq!(req.into_update(), None);

        let req: UpdateRequest =
            serde_json::from_value(json!({ "sessionId": "s1", "color": "#fff" })).unwrap();
        assert!(matches!(req.into_update(), Some(StoreUpdate::SessionColor { .. })));
    }

    #[test]
    fn test_read_query_parsing() {
        let q = ReadQuery {
            keep: Some("1".to_string()),
            ids: Some("a, b,,c".to_string()),
        };
        assert!(!q.keep());
        assert_eq!(q.consume_ids(), vec!["a", "b", "c"]);
        assert!(ReadQuery::default().consume_ids().is_empty());
    }
}
