//! The capture store document and its in-memory mutations.
//!
//! Everything here is pure: the persistence layer loads a `CaptureStore`, calls these
//! methods under its lock and writes the result back.

use std::collections::VecDeque;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{palette_color, CaptureRecord, Session, MIGRATED_SESSION_NAME};

/// Root document: sessions oldest first, the last one is active.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CaptureStore {
    pub sessions: Vec<Session>,
}

/// Every shape the output file has been written in.
#[derive(Debug)]
pub enum StoreDocument {
    /// `{"sessions": [...]}`, the canonical form.
    Sessioned(CaptureStore),
    /// A bare array of captures.
    Flat(Vec<CaptureRecord>),
    /// One capture object with a non-empty `clickId`.
    Single(Box<CaptureRecord>),
}

impl StoreDocument {
    /// Recognise the document by its JSON shape.
    ///
    /// Sessions and captures are parsed one at a time; one that does not fit the schema is
    /// dropped with a warning and the rest survive. `None` when the value is none of the
    /// known shapes.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(mut map) if map.contains_key("sessions") => match map.remove("sessions") {
                Some(Value::Array(sessions)) => Some(StoreDocument::Sessioned(CaptureStore {
                    sessions: sessions.into_iter().filter_map(parse_session).collect(),
                })),
                _ => None,
            },
            Value::Array(records) => Some(StoreDocument::Flat(parse_records(records))),
            Value::Object(map) if has_click_id(&map) => {
                parse_record(Value::Object(map)).map(|r| StoreDocument::Single(Box::new(r)))
            }
            _ => None,
        }
    }

    /// Convert to the canonical sessioned form.
    pub fn into_store(self) -> CaptureStore {
        match self {
            StoreDocument::Sessioned(store) => store,
            StoreDocument::Flat(records) => CaptureStore::migrate(records),
            StoreDocument::Single(record) => CaptureStore::migrate(vec![*record]),
        }
    }
}

fn has_click_id(map: &serde_json::Map<String, Value>) -> bool {
    map.get("clickId")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.trim().is_empty())
}

fn parse_record(value: Value) -> Option<CaptureRecord> {
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!("Dropping unreadable capture: {}", e);
            None
        }
    }
}

fn parse_records(values: Vec<Value>) -> Vec<CaptureRecord> {
    values.into_iter().filter_map(parse_record).collect()
}

fn parse_session(value: Value) -> Option<Session> {
    let Value::Object(mut map) = value else {
        tracing::warn!("Dropping session that is not an object");
        return None;
    };
    let clicks = match map.remove("clicks") {
        Some(Value::Array(clicks)) => parse_records(clicks),
        _ => Vec::new(),
    };
    match serde_json::from_value::<Session>(Value::Object(map)) {
        Ok(mut session) => {
            session.clicks = clicks.into();
            Some(session)
        }
        Err(e) => {
            tracing::warn!("Dropping unreadable session: {}", e);
            None
        }
    }
}

/// Where a new capture landed.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendOutcome {
    pub session_id: String,
    pub session_name: String,
    pub session_color: String,
    pub created_session: bool,
    pub evicted: usize,
}

impl CaptureStore {
    /// Wrap a legacy flat list of captures in a single synthetic session.
    pub fn migrate(records: Vec<CaptureRecord>) -> Self {
        let clicks: VecDeque<CaptureRecord> = records
            .into_iter()
            .filter(|r| !r.click_id.trim().is_empty())
            .collect();
        if clicks.is_empty() {
            return Self::default();
        }

        let started_at = clicks
            .iter()
            .filter_map(CaptureRecord::created_at)
            .min()
            .map(format_timestamp)
            .unwrap_or_else(|| format_timestamp(Utc::now()));

        Self {
            sessions: vec![Session {
                id: uuid::Uuid::new_v4().to_string(),
                name: MIGRATED_SESSION_NAME.to_string(),
                color: palette_color(0).to_string(),
                started_at,
                clicks,
                extra: Default::default(),
            }],
        }
    }

    pub fn total_clicks(&self) -> usize {
        self.sessions.iter().map(|s| s.clicks.len()).sum()
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.sessions.last()
    }

    /// All captures in chronological order (session order, then insertion order).
    pub fn clicks(&self) -> impl Iterator<Item = &CaptureRecord> {
        self.sessions.iter().flat_map(|s| s.clicks.iter())
    }

    pub fn find_click(&self, click_id: &str) -> Option<&CaptureRecord> {
        self.clicks().find(|c| c.click_id == click_id)
    }

    /// Drop expired captures and any session left empty. Returns how many captures went.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>, expiry: chrono::Duration) -> usize {
        let before = self.total_clicks();
        for session in &mut self.sessions {
            session.clicks.retain(|c| c.is_fresh(now, expiry));
        }
        self.prune_empty_sessions();
        before - self.total_clicks()
    }

    pub fn prune_empty_sessions(&mut self) {
        self.sessions.retain(|s| !s.clicks.is_empty());
    }

    /// Add a capture to the active session, or open a new one when asked to or when
    /// there is none.
    pub fn append_capture(
        &mut self,
        record: CaptureRecord,
        new_session: bool,
        session_name: Option<&str>,
        max_entries: usize,
        now: DateTime<Utc>,
    ) -> AppendOutcome {
        let created_session = new_session || self.sessions.is_empty();
        if created_session {
            let index = self.sessions.len();
            let name = session_name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Session {}", index + 1));
            self.sessions.push(Session {
                id: uuid::Uuid::new_v4().to_string(),
                name,
                color: palette_color(index).to_string(),
                started_at: format_timestamp(now),
                clicks: VecDeque::new(),
                extra: Default::default(),
            });
        }

        let (session_id, session_name, session_color, evicted) = self
            .sessions
            .last_mut()
            .map(|session| {
                let evicted = session.push_capped(record, max_entries).len();
                (session.id.clone(), session.name.clone(), session.color.clone(), evicted)
            })
            .unwrap_or_default();

        AppendOutcome {
            session_id,
            session_name,
            session_color,
            created_session,
            evicted,
        }
    }

    /// Remove one capture by id, pruning its session if it became empty.
    pub fn remove_click(&mut self, click_id: &str) -> bool {
        let mut removed = false;
        for session in &mut self.sessions {
            let before = session.clicks.len();
            session.clicks.retain(|c| c.click_id != click_id);
            if session.clicks.len() != before {
                removed = true;
                break;
            }
        }
        if removed {
            self.prune_empty_sessions();
        }
        removed
    }

    /// Remove every listed capture. Returns how many were found.
    pub fn remove_clicks(&mut self, click_ids: &[String]) -> usize {
        let before = self.total_clicks();
        for session in &mut self.sessions {
            session.clicks.retain(|c| !click_ids.contains(&c.click_id));
        }
        self.prune_empty_sessions();
        before - self.total_clicks()
    }

    /// Set the comment on the first capture with this id.
    pub fn set_comment(&mut self, click_id: &str, comment: Option<String>) -> bool {
        for session in &mut self.sessions {
            if let Some(record) = session.find_click_mut(click_id) {
                record.comment = comment;
                return true;
            }
        }
        false
    }

    pub fn set_session_color(&mut self, session_id: &str, color: &str) -> bool {
        match self.sessions.iter_mut().find(|s| s.id == session_id) {
            Some(session) => {
                session.color = color.to_string();
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}

/// ISO-8601 timestamp with millisecond precision, the format captures are written in.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
