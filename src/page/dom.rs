//! Read-only view of a page's element tree.
//!
//! The capture builder and the marker reconciler only ever talk to a [`Dom`]. A browser
//! binding implements it over live elements; [`Document`] is an in-memory tree used for
//! headless runs and tests.

use serde_json::{Map, Value};

/// Handle to one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Layout box in viewport coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// No layout box at all, as for `display: none`.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 && self.height <= 0.0
    }
}

/// Prefix of every element id the overlay creates.
pub const OVERLAY_ID_PREFIX: &str = "__smc-";
/// Class carried by numbered markers.
pub const MARKER_CLASS: &str = "__smc-marker";

pub trait Dom {
    /// The root container (`<body>`). Selectors stop below it.
    fn root(&self) -> NodeId;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn children(&self, node: NodeId) -> Vec<NodeId>;
    /// Lower-case tag name.
    fn tag_name(&self, node: NodeId) -> String;
    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;
    /// Attributes in document order.
    fn attributes(&self, node: NodeId) -> Vec<(String, String)>;
    /// Rendered text of the element and its descendants.
    fn text(&self, node: NodeId) -> String;
    fn bounding_rect(&self, node: NodeId) -> Rect;
    fn is_attached(&self, node: NodeId) -> bool;
    fn is_hidden(&self, node: NodeId) -> bool;
    /// Non-attribute properties frameworks hang off elements (`__vue__`, fiber keys...).
    fn property(&self, node: NodeId, key: &str) -> Option<Value>;
    fn property_keys(&self, node: NodeId) -> Vec<String>;

    fn id(&self, node: NodeId) -> Option<String> {
        self.attribute(node, "id").filter(|id| !id.is_empty())
    }

    fn class_list(&self, node: NodeId) -> Vec<String> {
        self.attribute(node, "class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Every element below `node`, in document order.
    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).into_iter().rev());
        }
        out
    }

    /// Attached, not hidden, and laid out.
    fn is_visible(&self, node: NodeId) -> bool {
        self.is_attached(node) && !self.is_hidden(node) && !self.bounding_rect(node).is_empty()
    }
}

/// Whether `node` is part of the overlay's own UI (markers, modal, panel, badge).
pub fn is_overlay_element(dom: &dyn Dom, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        if dom.id(n).is_some_and(|id| id.starts_with(OVERLAY_ID_PREFIX)) {
            return true;
        }
        if dom.class_list(n).iter().any(|c| c == MARKER_CLASS) {
            return true;
        }
        current = dom.parent(n);
    }
    false
}

#[derive(Debug, Clone)]
struct NodeData {
    tag: String,
    attributes: Vec<(String, String)>,
    text: String,
    rect: Rect,
    hidden: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    properties: Map<String, Value>,
}

impl NodeData {
    fn new(tag: &str, parent: Option<NodeId>) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            text: String::new(),
            rect: Rect::default(),
            hidden: false,
            parent,
            children: Vec::new(),
            properties: Map::new(),
        }
    }
}

/// In-memory element tree rooted at `<body>`.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData::new("body", None)],
        }
    }

    /// Append a new element as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData::new(tag, Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Insert a new element at `index` among `parent`'s children.
    pub fn insert(&mut self, parent: NodeId, index: usize, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData::new(tag, Some(parent)));
        let children = &mut self.nodes[parent.0].children;
        children.insert(index.min(children.len()), id);
        id
    }

    /// Unhook `node` (and its subtree) from its parent.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> &mut Self {
        let attrs = &mut self.nodes[node.0].attributes;
        match attrs.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => attrs.push((name.to_string(), value.to_string())),
        }
        self
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) -> &mut Self {
        self.nodes[node.0].text = text.to_string();
        self
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) -> &mut Self {
        self.nodes[node.0].rect = rect;
        self
    }

    pub fn set_hidden(&mut self, node: NodeId, hidden: bool) -> &mut Self {
        self.nodes[node.0].hidden = hidden;
        self
    }

    pub fn set_property(&mut self, node: NodeId, key: &str, value: Value) -> &mut Self {
        self.nodes[node.0].properties.insert(key.to_string(), value);
        self
    }
}

impl Dom for Document {
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node.0)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn tag_name(&self, node: NodeId) -> String {
        self.nodes
            .get(node.0)
            .map(|n| n.tag.clone())
            .unwrap_or_default()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes.get(node.0).and_then(|n| {
            n.attributes
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        })
    }

    fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.nodes
            .get(node.0)
            .map(|n| n.attributes.clone())
            .unwrap_or_default()
    }

    fn text(&self, node: NodeId) -> String {
        let Some(data) = self.nodes.get(node.0) else {
            return String::new();
        };
        let mut parts = vec![data.text.clone()];
        parts.extend(data.children.iter().map(|c| self.text(*c)));
        parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn bounding_rect(&self, node: NodeId) -> Rect {
        self.nodes.get(node.0).map(|n| n.rect).unwrap_or_default()
    }

    fn is_attached(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root() {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn is_hidden(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.nodes.get(n.0).is_some_and(|d| d.hidden) {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    fn property(&self, node: NodeId, key: &str) -> Option<Value> {
        self.nodes
            .get(node.0)
            .and_then(|n| n.properties.get(key).cloned())
    }

    fn property_keys(&self, node: NodeId) -> Vec<String> {
        self.nodes
            .get(node.0)
            .map(|n| n.properties.keys().cloned().collect())
            .unwrap_or_default()
    }
}
