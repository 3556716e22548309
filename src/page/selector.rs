//! CSS path selectors and text fingerprints.
//!
//! A selector is a best-effort locator: `#id` segments where an element has an id, otherwise
//! `tag.class1.class2` with `:nth-of-type(k)` only when siblings share the tag, joined with
//! `" > "` from just below the root down to the element. A lookup that finds nothing, or
//! finds an element whose text no longer matches, means "not found", never an error.

use super::dom::{Dom, NodeId};
use crate::models::CaptureRecord;

/// Captured text is cut to this many characters.
pub const TEXT_LIMIT: usize = 100;

/// Escape an identifier for use in a selector, like the browser's `CSS.escape`.
pub fn css_escape(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    let chars: Vec<char> = ident.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        let leading_digit = c.is_ascii_digit()
            && (i == 0 || (i == 1 && chars.first() == Some(&'-')));
        if c == '\0' {
            out.push('\u{FFFD}');
        } else if leading_digit || c.is_control() {
            out.push_str(&format!("\\{:x} ", c as u32));
        } else if i == 0 && c == '-' && chars.len() == 1 {
            out.push_str("\\-");
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// Selector segment for one element.
pub fn segment_for(dom: &dyn Dom, node: NodeId) -> String {
    if let Some(id) = dom.id(node) {
        return format!("#{}", css_escape(&id));
    }

    let tag = dom.tag_name(node);
    let mut segment = tag.clone();
    for class in dom.class_list(node) {
        segment.push('.');
        segment.push_str(&css_escape(&class));
    }

    if let Some(parent) = dom.parent(node) {
        let same_tag: Vec<NodeId> = dom
            .children(parent)
            .into_iter()
            .filter(|c| dom.tag_name(*c) == tag)
            .collect();
        if same_tag.len() > 1 {
            if let Some(pos) = same_tag.iter().position(|c| *c == node) {
                segment.push_str(&format!(":nth-of-type({})", pos + 1));
            }
        }
    }
    segment
}

/// Full path from just below the root container down to `node`.
pub fn compute_selector(dom: &dyn Dom, node: NodeId) -> String {
    let root = dom.root();
    let mut parts = Vec::new();
    let mut current = Some(node);
    while let Some(n) = current {
        if n == root {
            break;
        }
        parts.push(segment_for(dom, n));
        current = dom.parent(n);
    }
    parts.reverse();
    parts.join(" > ")
}

/// Trimmed, whitespace-collapsed text cut to `max` characters. Empty text is `None`.
pub fn truncate_text(text: &str, max: usize) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    if collapsed.chars().count() > max {
        let cut: String = collapsed.chars().take(max).collect();
        return Some(format!("{}...", cut));
    }
    Some(collapsed)
}

/// Whether `candidate` still looks like the captured element.
///
/// True when the record kept no text, or the candidate's current text matches it exactly.
pub fn verify(dom: &dyn Dom, candidate: NodeId, record: &CaptureRecord) -> bool {
    match &record.text_content {
        None => true,
        Some(expected) => truncate_text(&dom.text(candidate), TEXT_LIMIT).as_ref() == Some(expected),
    }
}

/// One compound selector between `>` combinators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub nth_of_type: Option<usize>,
}

impl Segment {
    fn matches(&self, dom: &dyn Dom, node: NodeId) -> bool {
        let tag = dom.tag_name(node);
        if self.tag.as_ref().is_some_and(|t| *t != tag) {
            return false;
        }
        if self.id.is_some() && dom.id(node) != self.id {
            return false;
        }
        if !self.classes.is_empty() {
            let classes = dom.class_list(node);
            if !self.classes.iter().all(|c| classes.contains(c)) {
                return false;
            }
        }
        if let Some(k) = self.nth_of_type {
            let Some(parent) = dom.parent(node) else {
                return false;
            };
            let position = dom
                .children(parent)
                .into_iter()
                .filter(|c| dom.tag_name(*c) == tag)
                .position(|c| c == node);
            if position.map(|p| p + 1) != Some(k) {
                return false;
            }
        }
        true
    }
}

/// Parse the selector grammar produced by [`compute_selector`].
pub fn parse_selector(selector: &str) -> Option<Vec<Segment>> {
    let segments: Option<Vec<Segment>> = selector
        .split(" > ")
        .map(|part| parse_segment(part.trim()))
        .collect();
    segments.filter(|s| !s.is_empty())
}

fn parse_segment(part: &str) -> Option<Segment> {
    if part.is_empty() {
        return None;
    }
    let mut segment = Segment::default();
    let chars: Vec<char> = part.chars().collect();
    let mut i = 0;

    let tag = read_ident(&chars, &mut i);
    if !tag.is_empty() {
        segment.tag = Some(tag.to_ascii_lowercase());
    }

    while i < chars.len() {
        match chars[i] {
            '#' => {
                i += 1;
                let id = read_ident(&chars, &mut i);
                if id.is_empty() {
                    return None;
                }
                segment.id = Some(id);
            }
            '.' => {
                i += 1;
                let class = read_ident(&chars, &mut i);
                if class.is_empty() {
                    return None;
                }
                segment.classes.push(class);
            }
            ':' => {
                let rest: String = chars[i..].iter().collect();
                let inner = rest.strip_prefix(":nth-of-type(")?;
                let close = inner.find(')')?;
                segment.nth_of_type = Some(inner[..close].trim().parse().ok()?);
                i += ":nth-of-type(".chars().count() + inner[..=close].chars().count();
            }
            _ => return None,
        }
    }
    Some(segment)
}

/// Read an identifier starting at `i`, resolving backslash escapes.
fn read_ident(chars: &[char], i: &mut usize) -> String {
    let mut out = String::new();
    while *i < chars.len() {
        let c = chars[*i];
        if c == '\\' {
            *i += 1;
            let hex: String = chars[*i..]
                .iter()
                .take(6)
                .take_while(|h| h.is_ascii_hexdigit())
                .collect();
            if !hex.is_empty() {
                *i += hex.len();
                if chars.get(*i) == Some(&' ') {
                    *i += 1;
                }
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or('\u{FFFD}');
                out.push(decoded);
            } else if let Some(&escaped) = chars.get(*i) {
                out.push(escaped);
                *i += 1;
            }
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            out.push(c);
            *i += 1;
        } else {
            break;
        }
    }
    out
}

/// First element in document order that the selector matches, like `querySelector`.
pub fn query_selector(dom: &dyn Dom, selector: &str) -> Option<NodeId> {
    let segments = parse_selector(selector)?;
    dom.descendants(dom.root())
        .into_iter()
        .find(|node| matches_chain(dom, *node, &segments))
}

fn matches_chain(dom: &dyn Dom, node: NodeId, segments: &[Segment]) -> bool {
    let mut current = node;
    for (depth, segment) in segments.iter().rev().enumerate() {
        if depth > 0 {
            match dom.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        if !segment.matches(dom, current) {
            return false;
        }
    }
    true
}
