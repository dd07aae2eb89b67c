//! The loop that runs time steps until the run is over.
//!
//! [`run_simulation`] executes ticks back to back and asks two questions
//! around each one. Before the tick it checks the operator: a Ctrl-C stop
//! or an exhausted wall-clock budget ends the run without another step.
//! After the tick it checks the outcome: a run with no living animal, or
//! one that reached `max_ticks`, is complete.
//!
//! The loop is synchronous. The engine runs it on a blocking worker and
//! shares the [`OperatorState`] with its signal handler.

use tracing::{info, warn};

use crate::operator::{OperatorState, SimulationEndReason};
use crate::tick::{self, SimulationState, TickError, TickSummary};

/// Errors that end a run early.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A time step failed as a whole.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Outcome of [`run_simulation`].
#[derive(Debug)]
pub struct SimulationResult {
    /// Why the loop stopped.
    pub end_reason: SimulationEndReason,
    /// Summary of the last completed tick, if any.
    pub final_summary: Option<TickSummary>,
    /// Ticks executed by this call.
    pub total_ticks: u64,
}

/// Hook run after every completed tick.
///
/// It receives the mutable state so the engine can drain the output
/// buffers between steps.
pub trait TickCallback: Send {
    /// Called once per completed tick.
    fn on_tick(&mut self, summary: &TickSummary, state: &mut SimulationState);
}

/// Callback that ignores every tick.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _state: &mut SimulationState) {}
}

/// Run ticks until a stop condition holds.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick fails as a whole. Failures of single
/// animals do not end the run.
pub fn run_simulation(
    state: &mut SimulationState,
    operator: &OperatorState,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, RunnerError> {
    let mut final_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;

    info!(
        max_ticks = operator.max_ticks(),
        max_real_time_seconds = operator.max_real_time_seconds(),
        animals = state.alive(),
        start_tick = state.clock.tick(),
        "Simulation starting"
    );

    let end_reason = loop {
        if let Some(reason) = interrupted(operator) {
            break reason;
        }

        let summary = tick::run_tick(state)?;
        total_ticks = total_ticks.saturating_add(1);
        callback.on_tick(&summary, state);

        let finished = completed(operator, &summary);
        final_summary = Some(summary);
        if let Some(reason) = finished {
            break reason;
        }
    };

    Ok(SimulationResult {
        end_reason,
        final_summary,
        total_ticks,
    })
}

/// Stop conditions checked before a tick starts.
fn interrupted(operator: &OperatorState) -> Option<SimulationEndReason> {
    if operator.is_stop_requested() {
        info!("Operator stop requested");
        return Some(SimulationEndReason::OperatorStop);
    }
    if operator.time_limit_reached() {
        info!(
            limit_seconds = operator.max_real_time_seconds(),
            elapsed = operator.elapsed_seconds(),
            "Wall-clock budget spent"
        );
        return Some(SimulationEndReason::MaxRealTimeReached);
    }
    None
}

/// Stop conditions checked once a tick has completed.
///
/// `summary.tick` counts completed ticks, so a limit of 5 stops right
/// after the fifth.
fn completed(operator: &OperatorState, summary: &TickSummary) -> Option<SimulationEndReason> {
    if summary.alive == 0 {
        info!(tick = summary.tick, "No animal left alive");
        return Some(SimulationEndReason::Extinction);
    }
    if operator.tick_limit_reached(summary.tick) {
        info!(tick = summary.tick, "Configured number of ticks completed");
        return Some(SimulationEndReason::MaxTicksReached);
    }
    None
}

/// Write the end-of-run report to the log.
pub fn log_simulation_end(result: &SimulationResult) {
    let Some(summary) = result.final_summary.as_ref() else {
        warn!(reason = ?result.end_reason, "Run ended before its first tick");
        return;
    };
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        final_tick = summary.tick,
        day = summary.day.value(),
        alive = summary.alive,
        "Simulation ended"
    );
    for (species, population) in &summary.populations {
        info!(species = %species, population, "Final population");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::SimulationBoundsConfig;
    use crate::fixtures;

    fn operator(max_ticks: u64) -> OperatorState {
        OperatorState::new(&SimulationBoundsConfig {
            max_ticks,
            max_real_time_seconds: 0,
        })
    }

    struct LastTick(u64);

    impl TickCallback for LastTick {
        fn on_tick(&mut self, summary: &TickSummary, _state: &mut SimulationState) {
            self.0 = summary.tick;
        }
    }

    #[test]
    fn stops_after_max_ticks() {
        let mut state = SimulationState::from_config(&fixtures::config()).unwrap();
        let mut last = LastTick(0);

        let result = run_simulation(&mut state, &operator(3), &mut last).unwrap();

        // The fixture populations cannot die out in three days.
        assert_eq!(result.end_reason, SimulationEndReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 3);
        assert_eq!(last.0, 3);
        assert_eq!(result.final_summary.map(|s| s.tick), Some(3));
    }

    #[test]
    fn stop_request_prevents_the_next_tick() {
        let mut state = SimulationState::from_config(&fixtures::config()).unwrap();
        let operator = operator(0);
        operator.request_stop();

        let result = run_simulation(&mut state, &operator, &mut NoOpCallback).unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::OperatorStop);
        assert_eq!(result.total_ticks, 0);
        assert!(result.final_summary.is_none());
        assert_eq!(state.clock.tick(), 0);
    }

    #[test]
    fn empty_world_ends_in_extinction() {
        let mut config = fixtures::config();
        for species in &mut config.species {
            species.initial_population.clear();
        }
        let mut state = SimulationState::from_config(&config).unwrap();

        let result = run_simulation(&mut state, &operator(0), &mut NoOpCallback).unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::Extinction);
        assert_eq!(result.total_ticks, 1);
    }
}
