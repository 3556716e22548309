//! Builds a [`CaptureRecord`] from a live element in one synchronous pass.
//!
//! Call this inside the input event handler: bounding box and text must reflect the page at
//! the moment of the click, not a later frame.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;

use super::dom::{Dom, NodeId};
use super::resolver::ResolverChain;
use super::selector::{compute_selector, truncate_text, TEXT_LIMIT};
use crate::models::{format_timestamp, BoundingBox, CaptureRecord, ParentEntry, ViewportSize};

/// Ancestors recorded per capture.
pub const PARENT_CHAIN_DEPTH: usize = 5;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Where the capture happened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContext {
    pub url: String,
    pub viewport: ViewportSize,
}

impl PageContext {
    pub fn new(url: impl Into<String>, width: i32, height: i32) -> Self {
        Self {
            url: url.into(),
            viewport: ViewportSize { width, height },
        }
    }
}

/// Attributes frameworks add for style scoping; they say nothing about the element.
pub fn is_scoping_attribute(name: &str) -> bool {
    name.starts_with("data-v-") || name.starts_with("data-svelte-h")
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// Time component in base 36 followed by five random base-36 characters.
pub fn generate_click_id(now: DateTime<Utc>) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..5)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}{}", to_base36(millis), suffix)
}

pub struct CaptureBuilder {
    resolvers: ResolverChain,
    parent_depth: usize,
}

impl Default for CaptureBuilder {
    fn default() -> Self {
        Self::new(ResolverChain::default())
    }
}

impl CaptureBuilder {
    pub fn new(resolvers: ResolverChain) -> Self {
        Self {
            resolvers,
            parent_depth: PARENT_CHAIN_DEPTH,
        }
    }

    pub fn with_parent_depth(mut self, depth: usize) -> Self {
        self.parent_depth = depth;
        self
    }

    /// Snapshot `node` into a fresh record with a new click id.
    pub fn capture(
        &self,
        dom: &dyn Dom,
        node: NodeId,
        page: &PageContext,
        now: DateTime<Utc>,
    ) -> CaptureRecord {
        let rect = dom.bounding_rect(node);
        CaptureRecord {
            click_id: generate_click_id(now),
            timestamp: format_timestamp(now),
            tag_name: dom.tag_name(node),
            element_id: dom.id(node),
            class_list: dom.class_list(node),
            selector: compute_selector(dom, node),
            text_content: truncate_text(&dom.text(node), TEXT_LIMIT),
            bounding_box: BoundingBox {
                x: rect.x.round() as i32,
                y: rect.y.round() as i32,
                width: rect.width.round() as i32,
                height: rect.height.round() as i32,
            },
            attributes: self.attributes(dom, node),
            component: self.resolvers.resolve_from_ancestors(dom, node),
            parent_chain: self.parent_chain(dom, node),
            url: page.url.clone(),
            viewport_size: page.viewport,
            comment: None,
            extra: Default::default(),
        }
    }

    fn parent_chain(&self, dom: &dyn Dom, node: NodeId) -> Vec<ParentEntry> {
        let root = dom.root();
        let mut chain = Vec::new();
        let mut current = dom.parent(node);
        while let Some(n) = current.filter(|n| *n != root) {
            if chain.len() >= self.parent_depth {
                break;
            }
            chain.push(ParentEntry {
                tag_name: dom.tag_name(n),
                id: dom.id(n),
                class_list: dom.class_list(n),
                component: self.resolvers.resolve(dom, n),
            });
            current = dom.parent(n);
        }
        chain
    }

    fn attributes(&self, dom: &dyn Dom, node: NodeId) -> BTreeMap<String, String> {
        dom.attributes(node)
            .into_iter()
            .filter(|(name, _)| !is_scoping_attribute(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::dom::{Document, Rect};
    use serde_json::json;

    fn nested_page(depth: usize) -> (Document, NodeId) {
        let mut doc = Document::new();
        let mut current = doc.root();
        for i in 0..depth {
            current = doc.append(current, "div");
            doc.set_attribute(current, "class", &format!("level-{}", i));
        }
        let button = doc.append(current, "button");
        doc.set_attribute(button, "id", "save")
            .set_attribute(button, "class", "btn primary")
            .set_attribute(button, "data-v-7ba5bd90", "")
            .set_attribute(button, "data-testid", "save-btn")
            .set_text(button, "  Save\n changes ")
            .set_rect(button, Rect::new(10.4, 20.6, 80.2, 31.5));
        (doc, button)
    }

    #[test]
    fn test_capture_populates_every_field() {
        let (doc, button) = nested_page(2);
        let page = PageContext::new("http://localhost:5173/settings#profile", 1280, 720);
        let now = Utc::now();

        let record = CaptureBuilder::default().capture(&doc, button, &page, now);

        assert!(!record.click_id.is_empty());
        assert_eq!(record.timestamp, format_timestamp(now));
        assert_eq!(record.tag_name, "button");
        assert_eq!(record.element_id.as_deref(), Some("save"));
        assert_eq!(record.class_list, vec!["btn", "primary"]);
        assert_eq!(record.selector, "div.level-0 > div.level-1 > #save");
        assert_eq!(record.text_content.as_deref(), Some("Save changes"));
        assert_eq!(
            record.bounding_box,
            BoundingBox {
                x: 10,
                y: 21,
                width: 80,
                height: 32
            }
        );
        assert!(!record.attributes.contains_key("data-v-7ba5bd90"));
        assert_eq!(record.attributes["data-testid"], "save-btn");
        assert_eq!(record.url, page.url);
        assert_eq!(record.viewport_size.width, 1280);
        assert!(record.component.is_none());
        assert!(record.comment.is_none());
    }

    #[test]
    fn test_parent_chain_is_nearest_first_and_capped() {
        let (doc, button) = nested_page(8);
        let record = CaptureBuilder::default().capture(&doc, button, &PageContext::default(), Utc::now());

        assert_eq!(record.parent_chain.len(), PARENT_CHAIN_DEPTH);
        assert_eq!(record.parent_chain[0].class_list, vec!["level-7"]);
        assert_eq!(record.parent_chain[4].class_list, vec!["level-3"]);
    }

    #[test]
    fn test_component_comes_from_nearest_ancestor() {
        let (mut doc, button) = nested_page(2);
        let outer = doc.parent(doc.parent(button).unwrap()).unwrap();
        doc.set_property(
            outer,
            "__vueParentComponent",
            json!({ "type": { "__name": "SettingsForm", "__file": "src/SettingsForm.vue" } }),
        );

        let record = CaptureBuilder::default().capture(&doc, button, &PageContext::default(), Utc::now());

        let component = record.component.unwrap();
        assert_eq!(component.framework, "vue");
        assert_eq!(component.name, "SettingsForm");
        assert_eq!(record.parent_chain[1].component.as_ref().unwrap().name, "SettingsForm");
    }

    #[test]
    fn test_recapture_gets_new_id() {
        let (doc, button) = nested_page(1);
        let builder = CaptureBuilder::default();
        let now = Utc::now();
        let a = builder.capture(&doc, button, &PageContext::default(), now);
        let b = builder.capture(&doc, button, &PageContext::default(), now);
        assert_ne!(a.click_id, b.click_id);
        assert_eq!(a.selector, b.selector);
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
