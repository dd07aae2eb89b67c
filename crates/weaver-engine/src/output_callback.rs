//! Tick callback that flushes the output logs and reports progress.

use std::path::PathBuf;

use tracing::debug;
use weaver_core::runner::TickCallback;
use weaver_core::tick::{SimulationState, TickSummary};
use weaver_core::view::ViewSink;

/// Appends the movement and predation buffers to disk every
/// `flush_every` ticks and reports one progress line per tick.
pub struct OutputCallback<V> {
    directory: PathBuf,
    flush_every: u64,
    view: V,
}

impl<V: ViewSink> OutputCallback<V> {
    /// Create a callback writing into `directory`.
    ///
    /// A `flush_every` of 0 leaves every line in memory until the engine
    /// flushes at the end of the run.
    pub const fn new(directory: PathBuf, flush_every: u64, view: V) -> Self {
        Self {
            directory,
            flush_every,
            view,
        }
    }

    const fn flush_due(&self, tick: u64) -> bool {
        matches!(tick.checked_rem(self.flush_every), Some(0))
    }
}

impl<V: ViewSink> TickCallback for OutputCallback<V> {
    fn on_tick(&mut self, summary: &TickSummary, state: &mut SimulationState) {
        self.view.update_log(&format!(
            "day {:.2}: {} alive, {} hatched, {} births, {} predations",
            summary.day.value(),
            summary.alive,
            summary.hatched,
            summary.births,
            summary.predations,
        ));

        if !self.flush_due(summary.tick) {
            return;
        }
        // A failed flush keeps the run going; the lines are lost but the
        // buffers are drained so memory stays bounded.
        match state.output.flush_to(&self.directory) {
            Ok(()) => debug!(
                tick = summary.tick,
                directory = %self.directory.display(),
                "Output flushed"
            ),
            Err(error) => self.view.update_log_error(&format!(
                "cannot write output to {}: {error}",
                self.directory.display()
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use weaver_core::config::SimulationConfig;
    use weaver_core::output::MOVEMENTS_FILE;
    use weaver_core::tick::run_tick;

    use super::*;

    #[derive(Clone, Default)]
    struct Recorded {
        logs: Arc<Mutex<Vec<String>>>,
        errors: Arc<Mutex<Vec<String>>>,
    }

    impl ViewSink for Recorded {
        fn update_log(&self, message: &str) {
            self.logs.lock().unwrap().push(message.to_owned());
        }

        fn update_log_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_owned());
        }
    }

    fn state() -> SimulationState {
        let config = SimulationConfig::parse(include_str!(
            "../../weaver-core/tests/data/two_species.yaml"
        ))
        .unwrap();
        SimulationState::from_config(&config).unwrap()
    }

    fn scratch() -> PathBuf {
        std::env::temp_dir().join(format!("weaver-engine-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn flushes_on_the_configured_cadence() {
        let directory = scratch();
        let view = Recorded::default();
        let mut callback = OutputCallback::new(directory.clone(), 2, view.clone());
        let mut state = state();

        let first = run_tick(&mut state).unwrap();
        callback.on_tick(&first, &mut state);
        assert!(!directory.join(MOVEMENTS_FILE).exists());

        let second = run_tick(&mut state).unwrap();
        callback.on_tick(&second, &mut state);
        assert!(directory.join(MOVEMENTS_FILE).exists());
        assert!(state.output.movements().is_empty());
        assert_eq!(view.logs.lock().unwrap().len(), 2);
        assert!(view.errors.lock().unwrap().is_empty());

        std::fs::remove_dir_all(&directory).unwrap();
    }

    #[test]
    fn zero_cadence_never_flushes() {
        let directory = scratch();
        let mut callback = OutputCallback::new(directory.clone(), 0, Recorded::default());
        let mut state = state();

        let summary = run_tick(&mut state).unwrap();
        callback.on_tick(&summary, &mut state);

        assert!(!directory.exists());
    }

    #[test]
    fn write_failure_is_reported_to_the_view() {
        // A regular file where the output directory should be.
        let blocker = scratch();
        std::fs::write(&blocker, "").unwrap();
        let view = Recorded::default();
        let mut callback = OutputCallback::new(blocker.join("out"), 1, view.clone());
        let mut state = state();

        let summary = run_tick(&mut state).unwrap();
        callback.on_tick(&summary, &mut state);

        assert_eq!(view.errors.lock().unwrap().len(), 1);
        std::fs::remove_file(&blocker).unwrap();
    }
}
