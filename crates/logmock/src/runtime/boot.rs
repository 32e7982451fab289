//! Boot — logging init, config load, state creation, directory auto-load.

use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::conf::AppConfig;
use crate::state::{AppState, SharedState};

use super::autoload;

/// Initialise the tracing / logging subsystem.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logmock=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load config, build shared state and ingest the configured directories.
pub async fn boot() -> Result<SharedState, Box<dyn std::error::Error>> {
    info!("Starting logmock v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file or env)
    let config = AppConfig::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    info!(
        "Loaded configuration: samples={}, uploads={}, generated={}, output={}",
        config.sample_dir.display(),
        config.uploads_dir.display(),
        config.generated_dir.display(),
        config.output_log_path.display()
    );

    let state = Arc::new(AppState::new(config));
    info!("Initialized shared application state");

    autoload::autoload(&state).await;

    let snapshot = state.metrics.snapshot();
    info!(
        "Ingestion metrics: jobs={}, events={}, low_confidence={}, rejected={}, high_confidence_ratio={:.2}",
        snapshot.jobs,
        snapshot.events,
        snapshot.low_confidence_events,
        snapshot.rejected_inputs,
        snapshot.high_confidence_ratio
    );

    Ok(state)
}
