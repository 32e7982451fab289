use logmock::replay::ReplayState;
use logmock::runtime::boot;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    boot::init_logging();
    let state = boot::boot().await?;

    let mut states = state.engine.subscribe();
    if let Some(config) = state.config.startup_replay.clone() {
        if let Err(e) = state.engine.start(config) {
            error!("Startup replay not started: {}", e);
        }
    }

    let replaying = state.engine.status().state == ReplayState::Running;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
        result = states.wait_for(|s| s.is_terminal()), if replaying => {
            if let Ok(final_state) = result {
                info!("Startup replay finished: {}", *final_state);
            }
        }
    }

    let final_state = state.engine.stop();
    if final_state == ReplayState::Running {
        // Let the worker observe cancellation and close its sinks
        let _ = states.wait_for(|s| s.is_terminal()).await;
    }
    info!("logmock stopped");
    Ok(())
}
