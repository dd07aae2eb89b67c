//! Engine binary for the Weaver ecosystem simulation.
//!
//! Loads a run configuration, assembles the species and the landscape,
//! seeds (or restores) the populations and drives the tick loop on a
//! blocking worker until a stop condition holds. Ctrl-C requests a
//! cooperative stop that takes effect before the next tick.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `WEAVER_CONFIG` (default `weaver.yaml`)
//! 3. Seed the populations, or restore the snapshot named by `WEAVER_RESUME`
//! 4. Create operator state from simulation bounds
//! 5. Install the Ctrl-C handler
//! 6. Run the simulation loop on a blocking worker
//! 7. Flush the remaining output and write the final snapshot
//! 8. Log the result

mod error;
mod output_callback;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use weaver_core::config::SimulationConfig;
use weaver_core::operator::OperatorState;
use weaver_core::runner;
use weaver_core::snapshot::SimulationSnapshot;
use weaver_core::tick::SimulationState;
use weaver_core::view::TracingView;

use crate::error::EngineError;
use crate::output_callback::OutputCallback;

/// Name of the snapshot written next to the output logs.
const FINAL_SNAPSHOT_FILE: &str = "snapshot.json";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any initialization step or the simulation itself fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("weaver-engine starting");

    // 2. Load configuration.
    let config_path = config_path();
    let config = SimulationConfig::from_file(&config_path).map_err(EngineError::from)?;
    info!(
        path = %config_path.display(),
        seed = config.world.seed,
        species = config.species.len(),
        time_steps_per_day = config.world.time_steps_per_day,
        max_ticks = config.simulation.max_ticks,
        "Configuration loaded"
    );

    // 3. Seed or restore the populations.
    let state = initial_state(&config)?;
    info!(
        animals = state.alive(),
        populations = ?state.populations(),
        "Simulation state assembled"
    );

    // 4. Create operator state.
    let operator = Arc::new(OperatorState::new(&config.simulation));

    // 5. Ctrl-C flips the stop flag; the loop notices it before the next tick.
    let stop = Arc::clone(&operator);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping after the current tick");
            stop.request_stop();
        }
    });

    // 6. Run the simulation.
    let directory = config.output.directory.clone();
    let callback = OutputCallback::new(directory.clone(), config.output.flush_every, TracingView);
    let (mut state, result) = run_on_worker(state, operator, callback).await?;

    // 7. Flush and checkpoint.
    state.output.flush_to(&directory).map_err(EngineError::from)?;
    let snapshot_path = directory.join(FINAL_SNAPSHOT_FILE);
    write_snapshot(&state, &snapshot_path)?;
    info!(path = %snapshot_path.display(), "Final snapshot written");

    // 8. Log results.
    runner::log_simulation_end(&result);

    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        "weaver-engine shutdown complete"
    );

    Ok(())
}

/// Path of the configuration file, from `WEAVER_CONFIG` or `weaver.yaml`.
fn config_path() -> PathBuf {
    std::env::var_os("WEAVER_CONFIG").map_or_else(|| PathBuf::from("weaver.yaml"), PathBuf::from)
}

/// Fresh populations, or the state stored in the snapshot named by
/// `WEAVER_RESUME`.
fn initial_state(config: &SimulationConfig) -> Result<SimulationState, EngineError> {
    let Some(resume) = std::env::var_os("WEAVER_RESUME") else {
        return Ok(SimulationState::from_config(config)?);
    };
    let resume = PathBuf::from(resume);
    let json = std::fs::read_to_string(&resume)?;
    let snapshot = SimulationSnapshot::from_json(&json)?;
    if snapshot.seed != config.world.seed {
        warn!(
            snapshot_seed = snapshot.seed,
            config_seed = config.world.seed,
            "Snapshot was taken with a different seed; keeping the snapshot's"
        );
    }
    info!(path = %resume.display(), "Resuming from snapshot");
    Ok(snapshot.into_state(config)?)
}

/// Run the tick loop on a blocking worker and hand the state back.
async fn run_on_worker(
    mut state: SimulationState,
    operator: Arc<OperatorState>,
    mut callback: OutputCallback<TracingView>,
) -> Result<(SimulationState, runner::SimulationResult), EngineError> {
    let (state, result) = tokio::task::spawn_blocking(move || {
        let result = runner::run_simulation(&mut state, &operator, &mut callback);
        (state, result)
    })
    .await?;
    Ok((state, result?))
}

fn write_snapshot(state: &SimulationState, path: &Path) -> Result<(), EngineError> {
    let json = SimulationSnapshot::capture(state).to_json()?;
    std::fs::write(path, json)?;
    Ok(())
}
