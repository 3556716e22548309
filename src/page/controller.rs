//! In-page interaction state: capture, comment, session prompt, undo.
//!
//! [`CaptureController`] is the one context object the page's event handlers share. It
//! never talks to the network itself. Transitions return [`Command`]s; the caller runs
//! them against the endpoint and reports back through `on_*`, which keeps the badge,
//! the notice and the undo pointer current.

use chrono::{DateTime, Duration, Utc};

use super::capture::{CaptureBuilder, PageContext};
use super::dom::{is_overlay_element, Dom, NodeId};
use crate::models::{CaptureRecord, CreateCaptureRequest, CreateCaptureResponse, DeleteResponse};

/// How long an ordinary notice stays up, in milliseconds.
pub const NOTICE_TTL_MS: i64 = 2000;
/// Errors stay up a little longer.
pub const ERROR_NOTICE_TTL_MS: i64 = 3000;

/// What the session-name prompt was opened for.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptPurpose {
    /// Shift+Alt+Click: this capture starts the new session.
    Capture(Box<CaptureRecord>),
    /// Panel button: the next capture starts the new session.
    ArmNextCapture,
}

/// A capture waiting for its comment, or an existing one being re-commented.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingComment {
    pub record: CaptureRecord,
    pub new_session: bool,
    pub session_name: Option<String>,
    /// True when the record is already stored and only its comment changes.
    pub editing: bool,
}

impl PendingComment {
    /// Text to prefill the comment box with.
    pub fn initial_text(&self) -> &str {
        self.record.comment.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Interaction {
    #[default]
    Idle,
    SessionPrompt(PromptPurpose),
    Comment(PendingComment),
}

/// Work for the caller to run against the endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Save(CreateCaptureRequest),
    UpdateComment {
        click_id: String,
        comment: Option<String>,
    },
    Delete {
        click_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

/// Modifier keys held during a click.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub alt: bool,
    pub shift: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct ArmedSession {
    name: Option<String>,
}

fn normalize(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Badge text for a store-wide count; hidden at zero.
pub fn badge_label(total: usize) -> Option<String> {
    match total {
        0 => None,
        n if n > 99 => Some("99+".to_string()),
        n => Some(n.to_string()),
    }
}

pub struct CaptureController {
    builder: CaptureBuilder,
    interaction: Interaction,
    armed: Option<ArmedSession>,
    last_saved: Option<String>,
    total_clicks: usize,
    notice: Option<Notice>,
}

impl Default for CaptureController {
    fn default() -> Self {
        Self::new(CaptureBuilder::default())
    }
}

impl CaptureController {
    pub fn new(builder: CaptureBuilder) -> Self {
        Self {
            builder,
            interaction: Interaction::Idle,
            armed: None,
            last_saved: None,
            total_clicks: 0,
            notice: None,
        }
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn is_new_session_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn total_clicks(&self) -> usize {
        self.total_clicks
    }

    pub fn badge(&self) -> Option<String> {
        badge_label(self.total_clicks)
    }

    /// The notice to show at `now`, if one is still up.
    pub fn notice(&self, now: DateTime<Utc>) -> Option<&Notice> {
        self.notice.as_ref().filter(|n| n.expires_at > now)
    }

    fn flash(&mut self, kind: NoticeKind, message: impl Into<String>, now: DateTime<Utc>) {
        let ttl = match kind {
            NoticeKind::Info => NOTICE_TTL_MS,
            NoticeKind::Error => ERROR_NOTICE_TTL_MS,
        };
        self.notice = Some(Notice {
            kind,
            message: message.into(),
            expires_at: now + Duration::milliseconds(ttl),
        });
    }

    /// A document click.
    ///
    /// A click outside an open comment box first saves the pending capture without a
    /// comment. Alt+Click then captures `node` synchronously; with Shift it asks for a
    /// session name first.
    pub fn click(
        &mut self,
        dom: &dyn Dom,
        node: NodeId,
        modifiers: Modifiers,
        page: &PageContext,
        now: DateTime<Utc>,
    ) -> Option<Command> {
        if matches!(self.interaction, Interaction::SessionPrompt(_)) {
            return None;
        }
        if is_overlay_element(dom, node) {
            return None;
        }

        let flushed = self.skip_comment();
        if !modifiers.alt {
            return flushed;
        }

        let record = self.builder.capture(dom, node, page, now);
        tracing::debug!(click_id = %record.click_id, tag = %record.tag_name, "Captured element");

        if modifiers.shift {
            self.interaction = Interaction::SessionPrompt(PromptPurpose::Capture(Box::new(record)));
            return flushed;
        }

        let (new_session, session_name) = match self.armed.take() {
            Some(armed) => (true, armed.name),
            None => (false, None),
        };
        self.interaction = Interaction::Comment(PendingComment {
            record,
            new_session,
            session_name,
            editing: false,
        });
        flushed
    }

    /// Panel "new session": ask for a name, then arm the next capture.
    pub fn request_new_session(&mut self) {
        if matches!(self.interaction, Interaction::Idle) {
            self.interaction = Interaction::SessionPrompt(PromptPurpose::ArmNextCapture);
        }
    }

    /// Session prompt confirmed; a blank name lets the server pick one.
    pub fn confirm_session(&mut self, name: &str, now: DateTime<Utc>) {
        let purpose = match std::mem::take(&mut self.interaction) {
            Interaction::SessionPrompt(purpose) => purpose,
            other => {
                self.interaction = other;
                return;
            }
        };
        let name = normalize(Some(name));
        match purpose {
            PromptPurpose::Capture(record) => {
                self.interaction = Interaction::Comment(PendingComment {
                    record: *record,
                    new_session: true,
                    session_name: name,
                    editing: false,
                });
            }
            PromptPurpose::ArmNextCapture => {
                let label = name.clone().unwrap_or_else(|| "Unnamed".to_string());
                self.armed = Some(ArmedSession { name });
                self.flash(
                    NoticeKind::Info,
                    format!("New session: {} - Alt+Click to capture", label),
                    now,
                );
            }
        }
    }

    /// Session prompt dismissed; a capture taken for it is dropped.
    pub fn cancel_session(&mut self) {
        if matches!(self.interaction, Interaction::SessionPrompt(_)) {
            self.interaction = Interaction::Idle;
        }
    }

    /// Open the comment box for a stored capture (marker click).
    pub fn edit(&mut self, record: CaptureRecord) -> Option<Command> {
        if matches!(self.interaction, Interaction::SessionPrompt(_)) {
            return None;
        }
        let flushed = self.skip_comment();
        self.interaction = Interaction::Comment(PendingComment {
            record,
            new_session: false,
            session_name: None,
            editing: true,
        });
        flushed
    }

    /// Comment box submitted.
    pub fn submit_comment(&mut self, text: &str) -> Option<Command> {
        let pending = self.take_pending()?;
        let comment = normalize(Some(text));
        if pending.editing {
            return Some(Command::UpdateComment {
                click_id: pending.record.click_id,
                comment,
            });
        }
        Some(Self::save(pending, comment))
    }

    /// Comment box dismissed: a new capture is saved without a comment, an edit is
    /// abandoned.
    pub fn skip_comment(&mut self) -> Option<Command> {
        let pending = self.take_pending()?;
        if pending.editing {
            return None;
        }
        Some(Self::save(pending, None))
    }

    /// Close the comment box, leaving any other interaction untouched.
    fn take_pending(&mut self) -> Option<PendingComment> {
        match std::mem::take(&mut self.interaction) {
            Interaction::Comment(pending) => Some(pending),
            other => {
                self.interaction = other;
                None
            }
        }
    }

    fn save(pending: PendingComment, comment: Option<String>) -> Command {
        let mut data = pending.record;
        data.comment = comment;
        Command::Save(CreateCaptureRequest {
            data,
            new_session: pending.new_session,
            session_name: pending.session_name,
        })
    }

    /// Ctrl/Cmd+Alt+Z: delete the last saved capture, once.
    pub fn undo(&mut self, now: DateTime<Utc>) -> Option<Command> {
        match self.last_saved.take() {
            Some(click_id) => {
                self.flash(NoticeKind::Info, "Undid last click", now);
                Some(Command::Delete { click_id })
            }
            None => {
                self.flash(NoticeKind::Info, "Nothing to undo", now);
                None
            }
        }
    }

    pub fn on_saved(
        &mut self,
        record: &CaptureRecord,
        response: &CreateCaptureResponse,
        now: DateTime<Utc>,
    ) {
        self.last_saved = Some(record.click_id.clone());
        self.total_clicks = response.total_clicks;
        let session = if response.session_name.is_empty() {
            String::new()
        } else {
            format!(" [{}]", response.session_name)
        };
        self.flash(
            NoticeKind::Info,
            format!("Clicked: {}{}", record.label(), session),
            now,
        );
    }

    pub fn on_comment_updated(&mut self, comment: Option<&str>, now: DateTime<Utc>) {
        let message = if comment.is_some() {
            "Comment updated"
        } else {
            "Comment removed"
        };
        self.flash(NoticeKind::Info, message, now);
    }

    pub fn on_deleted(&mut self, click_id: &str, response: &DeleteResponse) {
        if self.last_saved.as_deref() == Some(click_id) {
            self.last_saved = None;
        }
        self.total_clicks = response.total_clicks;
    }

    /// Store re-read (initial load, resync).
    pub fn on_store_loaded(&mut self, total_clicks: usize) {
        self.total_clicks = total_clicks;
    }

    /// A command failed; tell the user and carry on.
    pub fn on_failure(&mut self, error: &dyn std::error::Error, now: DateTime<Utc>) {
        tracing::warn!("Store request failed: {}", error);
        self.flash(NoticeKind::Error, format!("Error: {}", error), now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::dom::{Document, Rect};

    const ALT: Modifiers = Modifiers {
        alt: true,
        shift: false,
    };
    const SHIFT_ALT: Modifiers = Modifiers {
        alt: true,
        shift: true,
    };

    struct Page {
        doc: Document,
        button: NodeId,
        marker: NodeId,
        ctx: PageContext,
    }

    fn page() -> Page {
        let mut doc = Document::new();
        let root = doc.root();
        let button = doc.append(root, "button");
        doc.set_text(button, "Save")
            .set_rect(button, Rect::new(0.0, 0.0, 60.0, 24.0));
        let marker = doc.append(root, "div");
        doc.set_attribute(marker, "class", "__smc-marker");
        Page {
            doc,
            button,
            marker,
            ctx: PageContext::new("http://localhost:5173/", 1024, 768),
        }
    }

    fn saved(command: Option<Command>) -> CreateCaptureRequest {
        match command {
            Some(Command::Save(request)) => request,
            other => panic!("expected save, got {:?}", other),
        }
    }

    fn response(total: usize) -> CreateCaptureResponse {
        CreateCaptureResponse {
            success: true,
            session_id: "s1".to_string(),
            session_name: "Session 1".to_string(),
            session_color: "#8b5cf6".to_string(),
            total_clicks: total,
        }
    }

    #[test]
    fn test_alt_click_then_comment_saves() {
        let p = page();
        let mut ctl = CaptureController::default();
        let now = Utc::now();

        assert!(ctl.click(&p.doc, p.button, ALT, &p.ctx, now).is_none());
        assert!(matches!(ctl.interaction(), Interaction::Comment(c) if !c.editing));

        let request = saved(ctl.submit_comment("  fix spacing "));
        assert_eq!(request.data.tag_name, "button");
        assert_eq!(request.data.comment.as_deref(), Some("fix spacing"));
        assert!(!request.new_session);
        assert_eq!(ctl.interaction(), &Interaction::Idle);
    }

    #[test]
    fn test_plain_click_and_overlay_click_do_nothing() {
        let p = page();
        let mut ctl = CaptureController::default();
        let now = Utc::now();

        assert!(ctl.click(&p.doc, p.button, Modifiers::default(), &p.ctx, now).is_none());
        assert!(ctl.click(&p.doc, p.marker, ALT, &p.ctx, now).is_none());
        assert_eq!(ctl.interaction(), &Interaction::Idle);
    }

    #[test]
    fn test_click_outside_open_comment_saves_it_first() {
        let p = page();
        let mut ctl = CaptureController::default();
        let now = Utc::now();
        ctl.click(&p.doc, p.button, ALT, &p.ctx, now);

        let request = saved(ctl.click(&p.doc, p.button, ALT, &p.ctx, now));
        assert!(request.data.comment.is_none());
        // The second Alt+Click opened a fresh comment box.
        assert!(matches!(ctl.interaction(), Interaction::Comment(c) if c.record.click_id != request.data.click_id));
    }

    #[test]
    fn test_shift_alt_click_prompts_for_session() {
        let p = page();
        let mut ctl = CaptureController::default();
        let now = Utc::now();

        ctl.click(&p.doc, p.button, SHIFT_ALT, &p.ctx, now);
        assert!(matches!(ctl.interaction(), Interaction::SessionPrompt(PromptPurpose::Capture(_))));
        // Clicks are ignored while the prompt is open.
        assert!(ctl.click(&p.doc, p.button, ALT, &p.ctx, now).is_none());

        ctl.confirm_session(" Header fixes ", now);
        let request = saved(ctl.skip_comment());
        assert!(request.new_session);
        assert_eq!(request.session_name.as_deref(), Some("Header fixes"));
    }

    #[test]
    fn test_cancelled_prompt_drops_capture() {
        let p = page();
        let mut ctl = CaptureController::default();
        ctl.click(&p.doc, p.button, SHIFT_ALT, &p.ctx, Utc::now());
        ctl.cancel_session();
        assert_eq!(ctl.interaction(), &Interaction::Idle);
        assert!(ctl.skip_comment().is_none());
    }

    #[test]
    fn test_armed_session_applies_to_next_capture_only() {
        let p = page();
        let mut ctl = CaptureController::default();
        let now = Utc::now();

        ctl.request_new_session();
        ctl.confirm_session("", now);
        assert!(ctl.is_new_session_armed());
        assert_eq!(ctl.notice(now).unwrap().message, "New session: Unnamed - Alt+Click to capture");

        ctl.click(&p.doc, p.button, ALT, &p.ctx, now);
        let first = saved(ctl.submit_comment(""));
        assert!(first.new_session);
        assert!(first.session_name.is_none());
        assert!(first.data.comment.is_none());

        ctl.click(&p.doc, p.button, ALT, &p.ctx, now);
        assert!(!saved(ctl.skip_comment()).new_session);
    }

    #[test]
    fn test_edit_updates_comment() {
        let mut ctl = CaptureController::default();
        let record = CaptureRecord {
            click_id: "abc".to_string(),
            tag_name: "div".to_string(),
            comment: Some("old".to_string()),
            ..Default::default()
        };

        ctl.edit(record.clone());
        match ctl.interaction() {
            Interaction::Comment(c) => assert_eq!(c.initial_text(), "old"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            ctl.submit_comment("   "),
            Some(Command::UpdateComment {
                click_id: "abc".to_string(),
                comment: None
            })
        );

        ctl.edit(record);
        assert!(ctl.skip_comment().is_none());
    }

    #[test]
    fn test_undo_once() {
        let mut ctl = CaptureController::default();
        let now = Utc::now();
        assert!(ctl.undo(now).is_none());
        assert_eq!(ctl.notice(now).unwrap().message, "Nothing to undo");

        let record = CaptureRecord {
            click_id: "abc".to_string(),
            tag_name: "a".to_string(),
            ..Default::default()
        };
        ctl.on_saved(&record, &response(3), now);
        assert_eq!(ctl.notice(now).unwrap().message, "Clicked: a [Session 1]");

        assert_eq!(
            ctl.undo(now),
            Some(Command::Delete {
                click_id: "abc".to_string()
            })
        );
        assert!(ctl.undo(now).is_none());
    }

    #[test]
    fn test_badge_and_notice_expiry() {
        let mut ctl = CaptureController::default();
        let now = Utc::now();
        assert_eq!(ctl.badge(), None);

        ctl.on_store_loaded(150);
        assert_eq!(ctl.badge().as_deref(), Some("99+"));
        ctl.on_deleted(
            "x",
            &DeleteResponse {
                success: true,
                total_clicks: 7,
                sessions: Some(Vec::new()),
            },
        );
        assert_eq!(ctl.badge().as_deref(), Some("7"));

        let err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        ctl.on_failure(&err, now);
        let notice = ctl.notice(now).unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert!(ctl.notice(now + Duration::milliseconds(ERROR_NOTICE_TTL_MS)).is_none());
    }
}
