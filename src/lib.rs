//! See My Clicks
//!
//! Alt+Click capture service: an HTTP endpoint that persists element captures into named
//! sessions in a single JSON document, plus the in-page side that builds captures and keeps
//! numbered markers in sync with the store.

pub mod api;
pub mod config;
pub mod errors;
pub mod models;
pub mod page;
pub mod store;

use std::sync::Arc;

use axum::{
    routing::{any, get, MethodRouter},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use store::CaptureRepository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CaptureRepository>,
    pub config: Arc<Config>,
}

/// Store read and mutations on the mount root.
fn store_methods() -> MethodRouter<AppState> {
    get(api::get_store)
        .post(api::create_capture)
        .put(api::update)
        .delete(api::delete)
        .fallback(api::method_not_allowed)
}

/// Routes served under the mount path.
///
/// This is what a host server embeds when it wants the endpoint without the rest of the app.
/// Nesting does not match the mount path with a trailing slash; [`create_router`] adds
/// that route itself.
pub fn capture_routes() -> Router<AppState> {
    Router::new()
        .route("/", store_methods())
        .route(
            "/client.js",
            get(api::client_script).fallback(api::method_not_allowed),
        )
        .route("/{*rest}", any(api::method_not_allowed))
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // The dev app usually runs on another port
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Health check
    let health_routes = Router::new().route("/health", get(health_check));

    let mount = state.config.mount_path.clone();

    Router::new()
        .nest(&mount, capture_routes())
        .route(&format!("{}/", mount), store_methods())
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
