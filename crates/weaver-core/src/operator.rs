//! Run bounds and the cooperative stop flag.
//!
//! The engine owns an [`OperatorState`] behind an `Arc`: its Ctrl-C task
//! raises the flag and the runner polls it between ticks, so a stop never
//! interrupts a time step halfway.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SimulationBoundsConfig;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationEndReason {
    /// `max_ticks` time steps completed.
    MaxTicksReached,
    /// `max_real_time_seconds` of wall-clock time spent.
    MaxRealTimeReached,
    /// The operator asked the run to stop.
    OperatorStop,
    /// No animal of any species is alive.
    Extinction,
}

/// Stop flag and run bounds shared between the engine and the runner.
#[derive(Debug)]
pub struct OperatorState {
    stop_requested: AtomicBool,
    started_at: DateTime<Utc>,
    /// 0 means unbounded.
    max_ticks: u64,
    /// 0 means unbounded.
    max_real_time_seconds: u64,
}

impl OperatorState {
    /// Start the wall clock for a run bounded by `bounds`.
    pub fn new(bounds: &SimulationBoundsConfig) -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            started_at: Utc::now(),
            max_ticks: bounds.max_ticks,
            max_real_time_seconds: bounds.max_real_time_seconds,
        }
    }

    /// Ask the runner to stop before its next tick.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    /// Whether [`request_stop`](Self::request_stop) has been called.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Whether `completed_ticks` reaches a non-zero tick bound.
    pub const fn tick_limit_reached(&self, completed_ticks: u64) -> bool {
        self.max_ticks != 0 && completed_ticks >= self.max_ticks
    }

    /// Whether a non-zero wall-clock bound has been spent.
    pub fn time_limit_reached(&self) -> bool {
        self.max_real_time_seconds != 0 && self.elapsed_seconds() >= self.max_real_time_seconds
    }

    /// When the run started.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whole seconds since the run started. A clock that went backwards
    /// reads as zero.
    pub fn elapsed_seconds(&self) -> u64 {
        let seconds = Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds();
        u64::try_from(seconds).unwrap_or(0)
    }

    /// Tick bound, 0 when unbounded.
    pub const fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// Wall-clock bound in seconds, 0 when unbounded.
    pub const fn max_real_time_seconds(&self) -> u64 {
        self.max_real_time_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounded(max_ticks: u64, max_real_time_seconds: u64) -> OperatorState {
        OperatorState::new(&SimulationBoundsConfig {
            max_ticks,
            max_real_time_seconds,
        })
    }

    #[test]
    fn fresh_run_is_not_stopped() {
        let operator = bounded(0, 0);
        assert!(!operator.is_stop_requested());
        assert!(operator.started_at() <= Utc::now());
    }

    #[test]
    fn stop_flag_is_sticky() {
        let operator = bounded(0, 0);
        operator.request_stop();
        operator.request_stop();
        assert!(operator.is_stop_requested());
    }

    #[test]
    fn zero_bounds_never_trigger() {
        let operator = bounded(0, 0);
        assert!(!operator.tick_limit_reached(u64::MAX));
        assert!(!operator.time_limit_reached());
    }

    #[test]
    fn tick_bound_counts_completed_ticks() {
        let operator = bounded(30, 0);
        assert!(!operator.tick_limit_reached(29));
        assert!(operator.tick_limit_reached(30));
        assert!(operator.tick_limit_reached(31));
        assert_eq!(operator.max_ticks(), 30);
    }

    #[test]
    fn generous_time_bound_is_not_spent() {
        let operator = bounded(0, 3600);
        assert!(!operator.time_limit_reached());
        assert_eq!(operator.max_real_time_seconds(), 3600);
    }
}
