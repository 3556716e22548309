//! See My Clicks server
//!
//! Serves the capture endpoint and the in-page script for a local development app.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use see_my_clicks::config::Config;
use see_my_clicks::store::CaptureRepository;
use see_my_clicks::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting See My Clicks");
    tracing::info!("Output file: {:?}", config.output_file);
    tracing::info!(
        "Max entries per session: {}, expiry: {} minutes",
        config.max_entries,
        config.expiry_minutes
    );

    // Open the store, creating an empty document if needed
    let store = Arc::new(CaptureRepository::open(&config).await?);

    let state = AppState {
        store,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(
        "Capture endpoint at http://{}{}",
        config.bind_addr,
        config.mount_path
    );
    tracing::info!(
        "Add <script src=\"http://{}{}/client.js\"></script> to your app",
        config.bind_addr,
        config.mount_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}
