//! When to re-run marker reconciliation.
//!
//! Page events arrive as [`SyncTrigger`]s on a channel. [`run_debounced`] waits for the page
//! to settle, collapses bursts into one pass and hands the merged trigger to the sync
//! callback. A steady stream of mutations cannot starve the sync: a burst is flushed after
//! [`MAX_COALESCE`] at the latest.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use super::dom::{is_overlay_element, Dom, NodeId};
use super::reconciler::route_of;

/// Longest a burst of triggers is held back.
pub const MAX_COALESCE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// First load; the app may not have rendered yet.
    InitialLoad,
    /// History push/replace, back/forward or hash change to a different route.
    Navigation,
    /// DOM changed outside the overlay.
    Mutation,
}

impl SyncTrigger {
    /// How long to let the page settle after this trigger.
    pub fn settle_delay(self) -> Duration {
        match self {
            SyncTrigger::InitialLoad | SyncTrigger::Navigation => Duration::from_millis(300),
            SyncTrigger::Mutation => Duration::from_millis(200),
        }
    }

    fn rank(self) -> u8 {
        match self {
            SyncTrigger::Mutation => 0,
            SyncTrigger::Navigation => 1,
            SyncTrigger::InitialLoad => 2,
        }
    }

    /// The more significant of two coalesced triggers.
    pub fn merge(self, other: SyncTrigger) -> SyncTrigger {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

/// Debounce triggers from `triggers` and call `on_sync` once per settled burst.
///
/// Returns when the sending side is dropped; a burst still pending at that point is
/// flushed first.
pub async fn run_debounced<F, Fut>(mut triggers: mpsc::Receiver<SyncTrigger>, mut on_sync: F)
where
    F: FnMut(SyncTrigger) -> Fut,
    Fut: Future<Output = ()>,
{
    while let Some(first) = triggers.recv().await {
        let started = Instant::now();
        let cap = started + MAX_COALESCE;
        let mut pending = first;
        let mut deadline = started + first.settle_delay();
        let mut closed = false;

        loop {
            let wake = deadline.min(cap);
            if closed {
                sleep_until(wake).await;
                break;
            }
            tokio::select! {
                _ = sleep_until(wake) => break,
                next = triggers.recv() => match next {
                    Some(trigger) => {
                        pending = pending.merge(trigger);
                        deadline = deadline.max(Instant::now() + trigger.settle_delay());
                    }
                    None => closed = true,
                },
            }
        }

        tracing::trace!(trigger = ?pending, "Running marker sync");
        on_sync(pending).await;

        if closed {
            break;
        }
    }
}

/// Remembers the current route so only real navigations trigger a sync.
#[derive(Debug, Clone, Default)]
pub struct RouteTracker {
    current: Option<String>,
}

impl RouteTracker {
    pub fn new(url: &str) -> Self {
        Self {
            current: route_of(url),
        }
    }

    /// Record `url`; true when its route differs from the last one seen.
    pub fn observe(&mut self, url: &str) -> bool {
        let route = route_of(url);
        if route == self.current {
            return false;
        }
        self.current = route;
        true
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }
}

/// A mutation batch triggers a sync unless every changed node belongs to the overlay.
pub fn mutation_trigger(dom: &dyn Dom, targets: &[NodeId]) -> Option<SyncTrigger> {
    targets
        .iter()
        .any(|node| !is_overlay_element(dom, *node))
        .then_some(SyncTrigger::Mutation)
}

/// At most one position update per animation frame.
#[derive(Debug, Default)]
pub struct FrameThrottle {
    scheduled: bool,
}

impl FrameThrottle {
    /// Note a scroll/resize. True when the caller must schedule a frame callback.
    pub fn request(&mut self) -> bool {
        !std::mem::replace(&mut self.scheduled, true)
    }

    /// Called from the frame callback; true when an update was pending.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.scheduled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::dom::Document;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<(SyncTrigger, Duration)>>>;

    fn spawn_scheduler(rx: mpsc::Receiver<SyncTrigger>) -> (Log, tokio::task::JoinHandle<()>) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();
        let sink = log.clone();
        let handle = tokio::spawn(run_debounced(rx, move |trigger| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push((trigger, start.elapsed()));
            }
        }));
        (log, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_sync() {
        let (tx, rx) = mpsc::channel(16);
        let (log, handle) = spawn_scheduler(rx);

        tx.send(SyncTrigger::Mutation).await.unwrap();
        tx.send(SyncTrigger::Navigation).await.unwrap();
        tx.send(SyncTrigger::Mutation).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, SyncTrigger::Navigation);
        assert!(log[0].1 >= Duration::from_millis(200));
        assert!(log[0].1 < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_sync_separately() {
        let (tx, rx) = mpsc::channel(16);
        let (log, handle) = spawn_scheduler(rx);

        tx.send(SyncTrigger::InitialLoad).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        tx.send(SyncTrigger::Mutation).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        let triggers: Vec<SyncTrigger> = log.lock().unwrap().iter().map(|e| e.0).collect();
        assert_eq!(triggers, vec![SyncTrigger::InitialLoad, SyncTrigger::Mutation]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_mutations_flush_at_cap() {
        let (tx, rx) = mpsc::channel(64);
        let (log, handle) = spawn_scheduler(rx);

        for _ in 0..14 {
            tx.send(SyncTrigger::Mutation).await.unwrap();
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        drop(tx);
        handle.await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert!(log[0].1 >= MAX_COALESCE);
        assert!(log[0].1 < MAX_COALESCE + Duration::from_millis(50));
    }

    #[test]
    fn test_route_tracker_ignores_query_changes() {
        let mut tracker = RouteTracker::new("http://localhost:5173/orders");
        assert!(!tracker.observe("http://localhost:5173/orders?page=2"));
        assert!(tracker.observe("http://localhost:5173/orders#archived"));
        assert_eq!(tracker.current(), Some("/orders#archived"));
        assert!(tracker.observe("http://localhost:5173/"));
    }

    #[test]
    fn test_overlay_mutations_are_ignored() {
        let mut doc = Document::new();
        let root = doc.root();
        let marker = doc.append(root, "div");
        doc.set_attribute(marker, "class", "__smc-marker");
        let app = doc.append(root, "main");

        assert_eq!(mutation_trigger(&doc, &[marker]), None);
        assert_eq!(mutation_trigger(&doc, &[marker, app]), Some(SyncTrigger::Mutation));
        assert_eq!(mutation_trigger(&doc, &[]), None);
    }

    #[test]
    fn test_frame_throttle() {
        let mut throttle = FrameThrottle::default();
        assert!(throttle.request());
        assert!(!throttle.request());
        assert!(throttle.take());
        assert!(!throttle.take());
        assert!(throttle.request());
    }
}
