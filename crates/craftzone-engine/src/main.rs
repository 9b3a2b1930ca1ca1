//! Simulated host for the Craftzone capability tracker.
//!
//! Wires the tracker core to an in-memory world and drives it the way a
//! game server would: a fixed-rate tick loop, wandering agents, and a
//! trickle of authorization, fixture, and permission changes.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `craftzone-config.yaml` (or `CRAFTZONE_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Build the starting world and bootstrap the tracker
//! 4. Arm Ctrl-C to raise the shutdown signal
//! 5. Run the tick loop until shutdown or `max_ticks`
//! 6. Log the result

mod activity;
mod error;
mod runner;

use std::path::PathBuf;

use craftzone_core::{CraftzoneConfig, ShutdownSignal};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::runner::Engine;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "craftzone-config.yaml";

/// Environment variable overriding the configuration path.
const CONFIG_PATH_ENV: &str = "CRAFTZONE_CONFIG";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the starting
/// world cannot be built.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet, so remember whether the
    //    defaults were used and report it afterwards.
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    let fallback = config.logging.level.clone();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_target(true)
        .init();

    info!("craftzone-engine starting");
    match config_path {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }
    info!(
        update_interval_seconds = config.tracker.update_interval_seconds,
        base_distance_meters = config.tracker.base_distance_meters,
        target_frame_rate = config.tracker.target_frame_rate,
        agent_count = config.simulation.agent_count,
        seed = config.simulation.seed,
        "Tracker configuration"
    );

    // 3. Build the world and bootstrap the tracker.
    let shutdown = ShutdownSignal::new();
    let engine = Engine::new(&config, shutdown.clone())?;

    // 4. Ctrl-C raises the shutdown signal; the scheduler stops at its next
    //    slice boundary.
    let ctrl_c_signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                ctrl_c_signal.request();
            }
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
        }
    });

    // 5. Run.
    let summary = engine.run().await;

    // 6. Log results.
    info!(
        end_reason = ?summary.end_reason,
        total_ticks = summary.ticks,
        passes_completed = summary.stats.passes_completed,
        agents_scanned = summary.stats.agents_scanned,
        agents_skipped = summary.stats.agents_skipped,
        last_pass_ticks = summary.stats.last_pass_ticks,
        released = summary.released,
        "craftzone-engine shutdown complete"
    );

    Ok(())
}

/// Load configuration from `CRAFTZONE_CONFIG` or `craftzone-config.yaml`.
///
/// Returns the path actually read, or `None` when no file existed and the
/// defaults are used.
fn load_config() -> Result<(CraftzoneConfig, Option<PathBuf>), EngineError> {
    let config_path = std::env::var_os(CONFIG_PATH_ENV)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if config_path.exists() {
        let config = CraftzoneConfig::from_file(&config_path)?;
        Ok((config, Some(config_path)))
    } else {
        Ok((CraftzoneConfig::default(), None))
    }
}
