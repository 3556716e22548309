//! The in-page runtime: controller, reconciler and endpoint client wired together.
//!
//! Markers are a convenience. Nothing here returns an error to the page: failed requests
//! become a notice (for user actions) or a log line (for background resyncs).

use chrono::{DateTime, Utc};

use super::client::StoreClient;
use super::controller::{CaptureController, Command};
use super::dom::{Dom, NodeId};
use super::reconciler::{MarkerReconciler, SyncReport};
use super::scheduler::{mutation_trigger, FrameThrottle, RouteTracker, SyncTrigger};

pub struct Overlay {
    client: StoreClient,
    controller: CaptureController,
    reconciler: MarkerReconciler,
    route: RouteTracker,
    throttle: FrameThrottle,
}

impl Overlay {
    pub fn new(client: StoreClient, page_url: &str) -> Self {
        Self {
            client,
            controller: CaptureController::default(),
            reconciler: MarkerReconciler::new(),
            route: RouteTracker::new(page_url),
            throttle: FrameThrottle::default(),
        }
    }

    pub fn controller(&self) -> &CaptureController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut CaptureController {
        &mut self.controller
    }

    pub fn reconciler(&self) -> &MarkerReconciler {
        &self.reconciler
    }

    /// Re-read the store (without consuming it) and reconcile markers.
    pub async fn resync(&mut self, dom: &dyn Dom, page_url: &str) -> Option<SyncReport> {
        match self.client.fetch_store(true).await {
            Ok(store) => {
                self.controller.on_store_loaded(store.total_clicks());
                Some(self.reconciler.sync(dom, &store, page_url))
            }
            Err(e) => {
                tracing::warn!("Marker resync skipped: {}", e);
                None
            }
        }
    }

    /// Run a controller command, report the outcome back and resync on success.
    pub async fn dispatch(
        &mut self,
        command: Command,
        dom: &dyn Dom,
        page_url: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let result = match &command {
            Command::Save(request) => self.client.create(request).await.map(|response| {
                self.controller.on_saved(&request.data, &response, now);
            }),
            Command::UpdateComment { click_id, comment } => self
                .client
                .update_comment(click_id, comment.clone())
                .await
                .map(|()| self.controller.on_comment_updated(comment.as_deref(), now)),
            Command::Delete { click_id } => {
                self.client.delete_click(click_id).await.map(|response| {
                    self.reconciler.remove(click_id);
                    self.controller.on_deleted(click_id, &response);
                })
            }
        };

        match result {
            Ok(()) => {
                self.resync(dom, page_url).await;
                true
            }
            Err(e) => {
                self.controller.on_failure(&e, now);
                false
            }
        }
    }

    /// History or hash change; a sync is due only when the route moved.
    pub fn navigated(&mut self, page_url: &str) -> Option<SyncTrigger> {
        self.route
            .observe(page_url)
            .then_some(SyncTrigger::Navigation)
    }

    /// A batch of DOM mutations. Batches that only touched the overlay are ignored.
    pub fn mutated(&self, dom: &dyn Dom, targets: &[NodeId]) -> Option<SyncTrigger> {
        mutation_trigger(dom, targets)
    }

    /// Scroll or resize. True when a frame callback must be scheduled.
    pub fn viewport_changed(&mut self) -> bool {
        self.throttle.request()
    }

    /// Frame callback: move markers onto their targets. Returns ids of dropped markers.
    pub fn frame(&mut self, dom: &dyn Dom) -> Vec<String> {
        if !self.throttle.take() {
            return Vec::new();
        }
        self.reconciler.tick_positions(dom)
    }
}
