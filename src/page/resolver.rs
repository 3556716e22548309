//! Component resolution: which UI-framework component owns an element.
//!
//! Each framework gets a [`ComponentResolver`]. A [`ResolverChain`] tries them in a fixed
//! order and the first hit wins; a miss from every resolver is a normal outcome.

use serde_json::Value;

use super::dom::{Dom, NodeId};
use crate::models::ComponentInfo;

const UNKNOWN: &str = "Unknown";

/// Longest `return` chain followed when walking a React fiber.
const MAX_FIBER_DEPTH: usize = 64;

pub trait ComponentResolver: Send + Sync {
    fn framework(&self) -> &'static str;
    fn resolve(&self, dom: &dyn Dom, node: NodeId) -> Option<ComponentInfo>;
}

fn component(framework: &str, name: &str, file: &str) -> ComponentInfo {
    ComponentInfo {
        framework: framework.to_string(),
        name: name.to_string(),
        file: file.to_string(),
        ..Default::default()
    }
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Svelte dev builds attach `__svelte_meta`; otherwise fall back to `data-component` or a
/// scoped `svelte-xxxx` class.
pub struct SvelteResolver;

impl ComponentResolver for SvelteResolver {
    fn framework(&self) -> &'static str {
        "svelte"
    }

    fn resolve(&self, dom: &dyn Dom, node: NodeId) -> Option<ComponentInfo> {
        if let Some(meta) = dom.property(node, "__svelte_meta") {
            let file = str_at(&meta, &["loc", "file"]);
            let name = file
                .and_then(|f| f.rsplit('/').next())
                .map(|base| base.trim_end_matches(".svelte"))
                .unwrap_or(UNKNOWN);
            return Some(component("svelte", name, file.unwrap_or(UNKNOWN)));
        }
        if let Some(name) = dom.attribute(node, "data-component").filter(|n| !n.is_empty()) {
            return Some(component("svelte", &name, UNKNOWN));
        }
        dom.class_list(node)
            .into_iter()
            .find(|c| c.starts_with("svelte-"))
            .map(|class| component("svelte", &format!("Unknown ({})", class), UNKNOWN))
    }
}

/// Walks the fiber attached under `__reactFiber$*` / `__reactInternalInstance$*` up its
/// `return` chain to the first named component.
pub struct ReactResolver;

impl ComponentResolver for ReactResolver {
    fn framework(&self) -> &'static str {
        "react"
    }

    fn resolve(&self, dom: &dyn Dom, node: NodeId) -> Option<ComponentInfo> {
        let key = dom.property_keys(node).into_iter().find(|k| {
            k.starts_with("__reactFiber$") || k.starts_with("__reactInternalInstance$")
        })?;
        let fiber = dom.property(node, &key)?;

        let mut current = Some(&fiber);
        for _ in 0..MAX_FIBER_DEPTH {
            let Some(f) = current else { break };
            // Host components have a string type ("div"); components have an object.
            if let Some(ty) = f.get("type").filter(|t| t.is_object()) {
                let name = str_at(ty, &["displayName"]).or_else(|| str_at(ty, &["name"]));
                if let Some(name) = name {
                    let file = str_at(f, &["_debugSource", "fileName"]).unwrap_or(UNKNOWN);
                    return Some(component("react", name, file));
                }
            }
            current = f.get("return").filter(|r| !r.is_null());
        }
        None
    }
}

/// Vue 3 `__vueParentComponent`, then Vue 2 `__vue__`.
pub struct VueResolver;

impl ComponentResolver for VueResolver {
    fn framework(&self) -> &'static str {
        "vue"
    }

    fn resolve(&self, dom: &dyn Dom, node: NodeId) -> Option<ComponentInfo> {
        if let Some(instance) = dom.property(node, "__vueParentComponent") {
            let name = str_at(&instance, &["type", "name"])
                .or_else(|| str_at(&instance, &["type", "__name"]))
                .unwrap_or(UNKNOWN);
            let file = str_at(&instance, &["type", "__file"]).unwrap_or(UNKNOWN);
            return Some(component("vue", name, file));
        }
        let instance = dom.property(node, "__vue__")?;
        let name = str_at(&instance, &["$options", "name"])
            .or_else(|| str_at(&instance, &["$options", "_componentTag"]))
            .unwrap_or(UNKNOWN);
        let file = str_at(&instance, &["$options", "__file"]).unwrap_or(UNKNOWN);
        Some(component("vue", name, file))
    }
}

/// Ordered resolvers; the first non-empty answer wins.
pub struct ResolverChain {
    resolvers: Vec<Box<dyn ComponentResolver>>,
}

impl Default for ResolverChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(SvelteResolver),
            Box::new(ReactResolver),
            Box::new(VueResolver),
        ])
    }
}

impl ResolverChain {
    pub fn new(resolvers: Vec<Box<dyn ComponentResolver>>) -> Self {
        Self { resolvers }
    }

    pub fn frameworks(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(|r| r.framework()).collect()
    }

    /// Component of this exact element.
    pub fn resolve(&self, dom: &dyn Dom, node: NodeId) -> Option<ComponentInfo> {
        self.resolvers.iter().find_map(|r| r.resolve(dom, node))
    }

    /// Component of the element or its nearest resolvable ancestor below the root.
    pub fn resolve_from_ancestors(&self, dom: &dyn Dom, node: NodeId) -> Option<ComponentInfo> {
        let root = dom.root();
        let mut current = Some(node);
        while let Some(n) = current.filter(|n| *n != root) {
            if let Some(found) = self.resolve(dom, n) {
                return Some(found);
            }
            current = dom.parent(n);
        }
        None
    }
}
