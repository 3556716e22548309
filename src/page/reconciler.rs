//! Marker reconciliation: keep numbered markers 1:1 with the captures of the current route.
//!
//! The store and the DOM can both change under the page at any time (navigation, expiry,
//! deletion in another tab, re-renders). [`MarkerReconciler::sync`] is idempotent, so
//! running it again against newer state repairs any earlier inconsistency.

use std::collections::{BTreeMap, HashSet};

use url::Url;

use super::capture::is_scoping_attribute;
use super::dom::{Dom, NodeId};
use super::selector::{query_selector, verify};
use crate::models::{CaptureRecord, CaptureStore};

/// Markers sit centered on the target's top-right corner.
const MARKER_RADIUS: f64 = 10.0;

/// Path plus fragment of a URL; host and query are ignored.
///
/// A bare `#` is no fragment, the same as `location.hash` reports it.
pub fn route_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let mut route = parsed.path().to_string();
    if let Some(fragment) = parsed.fragment().filter(|f| !f.is_empty()) {
        route.push('#');
        route.push_str(fragment);
    }
    Some(route)
}

/// One rendered marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub click_id: String,
    /// Chronological position across all sessions, oldest = 1.
    pub number: usize,
    pub target: NodeId,
    pub left: i32,
    pub top: i32,
    pub record: CaptureRecord,
}

/// What a sync pass changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub total_clicks: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Default)]
pub struct MarkerReconciler {
    markers: BTreeMap<String, Marker>,
}

fn marker_position(dom: &dyn Dom, target: NodeId) -> (i32, i32) {
    let rect = dom.bounding_rect(target);
    (
        (rect.right() - MARKER_RADIUS).round() as i32,
        (rect.y - MARKER_RADIUS).round() as i32,
    )
}

/// Try the stored selector, then a retained `data-*` attribute, then the element id.
/// Only attached, visible candidates whose text still matches are accepted.
fn resolve_target(dom: &dyn Dom, record: &CaptureRecord) -> Option<NodeId> {
    let accept = |node: NodeId| dom.is_visible(node) && verify(dom, node, record);

    if let Some(node) = query_selector(dom, &record.selector).filter(|n| accept(*n)) {
        return Some(node);
    }

    let data_attrs: Vec<(&String, &String)> = record
        .attributes
        .iter()
        .filter(|(name, _)| name.starts_with("data-") && !is_scoping_attribute(name))
        .collect();
    if !data_attrs.is_empty() {
        let by_data = dom.descendants(dom.root()).into_iter().find(|node| {
            dom.tag_name(*node) == record.tag_name
                && data_attrs
                    .iter()
                    .any(|(name, value)| dom.attribute(*node, name).as_ref() == Some(*value))
                && accept(*node)
        });
        if by_data.is_some() {
            return by_data;
        }
    }

    let element_id = record.element_id.as_deref().filter(|id| !id.is_empty())?;
    dom.descendants(dom.root())
        .into_iter()
        .find(|node| dom.id(*node).as_deref() == Some(element_id) && accept(*node))
}

impl MarkerReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring markers in line with `store` for the page at `current_url`.
    pub fn sync(&mut self, dom: &dyn Dom, store: &CaptureStore, current_url: &str) -> SyncReport {
        let current_route = route_of(current_url);
        let mut report = SyncReport {
            total_clicks: store.total_clicks(),
            ..Default::default()
        };
        let mut known = HashSet::new();

        for (index, record) in store.clicks().enumerate() {
            let number = index + 1;
            known.insert(record.click_id.as_str());

            let on_route = current_route.is_some() && route_of(&record.url) == current_route;
            let had_marker = self.markers.contains_key(&record.click_id);

            // An existing marker survives only if its target still holds up.
            let kept = on_route
                && self.markers.get(&record.click_id).is_some_and(|m| {
                    dom.is_visible(m.target) && verify(dom, m.target, record)
                });

            if kept {
                if let Some(marker) = self.markers.get_mut(&record.click_id) {
                    marker.number = number;
                    marker.record = record.clone();
                }
                continue;
            }

            let target = if on_route {
                resolve_target(dom, record)
            } else {
                None
            };

            match target {
                Some(target) => {
                    let (left, top) = marker_position(dom, target);
                    self.markers.insert(
                        record.click_id.clone(),
                        Marker {
                            click_id: record.click_id.clone(),
                            number,
                            target,
                            left,
                            top,
                            record: record.clone(),
                        },
                    );
                    if !had_marker {
                        report.added.push(record.click_id.clone());
                    }
                }
                None => {
                    if had_marker {
                        self.markers.remove(&record.click_id);
                        report.removed.push(record.click_id.clone());
                    } else {
                        tracing::trace!(click_id = %record.click_id, "No target for capture");
                    }
                }
            }
        }

        // Captures gone from the store (deleted, expired, consumed)
        let stale: Vec<String> = self
            .markers
            .keys()
            .filter(|id| !known.contains(id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            self.markers.remove(&id);
            report.removed.push(id);
        }

        if !report.is_noop() {
            tracing::debug!(
                added = report.added.len(),
                removed = report.removed.len(),
                "Markers reconciled"
            );
        }
        report
    }

    /// Follow targets on scroll/resize. Markers whose target went away are dropped and
    /// their ids returned.
    pub fn tick_positions(&mut self, dom: &dyn Dom) -> Vec<String> {
        let mut detached = Vec::new();
        for marker in self.markers.values_mut() {
            if !dom.is_visible(marker.target) {
                detached.push(marker.click_id.clone());
                continue;
            }
            let (left, top) = marker_position(dom, marker.target);
            marker.left = left;
            marker.top = top;
        }
        for id in &detached {
            self.markers.remove(id);
        }
        detached
    }

    pub fn remove(&mut self, click_id: &str) -> bool {
        self.markers.remove(click_id).is_some()
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }

    pub fn get(&self, click_id: &str) -> Option<&Marker> {
        self.markers.get(click_id)
    }

    /// Markers ordered by number.
    pub fn markers(&self) -> Vec<&Marker> {
        let mut markers: Vec<&Marker> = self.markers.values().collect();
        markers.sort_by_key(|m| m.number);
        markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}
