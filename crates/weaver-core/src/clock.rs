//! Simulation clock.
//!
//! The clock is the single source of truth for time in a run. It counts
//! time steps and converts them to days through the configured number of
//! time steps per day.
//!
//! # Design Principles
//!
//! - Advancing uses checked arithmetic (no silent overflow).
//! - Days are derived from the step counter, never stored independently.

use weaver_types::{Day, TimeStep};

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Time step counter would overflow.
    #[error("time step counter overflow: cannot advance beyond u32::MAX")]
    TickOverflow,

    /// Invalid timing configuration.
    #[error("invalid time configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// Clock tracking the current time step of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationClock {
    /// Current time step (0 before the first tick).
    time_step: TimeStep,

    /// Time steps that make up one day.
    time_steps_per_day: f64,
}

fn check_time_steps_per_day(time_steps_per_day: f64) -> Result<(), ClockError> {
    if time_steps_per_day > 0.0 && time_steps_per_day.is_finite() {
        Ok(())
    } else {
        Err(ClockError::InvalidConfig {
            reason: format!("time_steps_per_day must be positive, got {time_steps_per_day}"),
        })
    }
}

impl SimulationClock {
    /// Create a clock at time step 0.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `time_steps_per_day` is not
    /// a positive finite number.
    pub fn new(time_steps_per_day: f64) -> Result<Self, ClockError> {
        Self::from_parts(TimeStep::ZERO, time_steps_per_day)
    }

    /// Create a clock at an explicit time step (state restoration).
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `time_steps_per_day` is not
    /// a positive finite number.
    pub fn from_parts(time_step: TimeStep, time_steps_per_day: f64) -> Result<Self, ClockError> {
        check_time_steps_per_day(time_steps_per_day)?;
        Ok(Self {
            time_step,
            time_steps_per_day,
        })
    }

    /// Advance the clock by one step. Returns the new time step.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the counter would exceed
    /// `u32::MAX`.
    pub fn advance(&mut self) -> Result<TimeStep, ClockError> {
        let next = self
            .time_step
            .value()
            .checked_add(1)
            .ok_or(ClockError::TickOverflow)?;
        self.time_step = TimeStep::new(next);
        Ok(self.time_step)
    }

    /// Current time step.
    pub const fn time_step(&self) -> TimeStep {
        self.time_step
    }

    /// Current time step as a tick number.
    pub fn tick(&self) -> u64 {
        u64::from(self.time_step.value())
    }

    /// Time steps per day.
    pub const fn time_steps_per_day(&self) -> f64 {
        self.time_steps_per_day
    }

    /// Current (fractional) day.
    pub fn day(&self) -> Day {
        Day::from_time_steps(self.time_step, self.time_steps_per_day)
    }

    /// Whole time steps spanned by `days`.
    pub fn steps_in(&self, days: Day) -> TimeStep {
        TimeStep::from_days(days, self.time_steps_per_day)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn new_clock_starts_at_zero() {
        let clock = SimulationClock::new(4.0).unwrap();
        assert_eq!(clock.time_step(), TimeStep::ZERO);
        assert_eq!(clock.tick(), 0);
        assert!(clock.day().value().abs() < f64::EPSILON);
    }

    #[test]
    fn advance_increments_and_converts_to_days() {
        let mut clock = SimulationClock::new(4.0).unwrap();
        for _ in 0..6 {
            clock.advance().unwrap();
        }
        assert_eq!(clock.tick(), 6);
        assert!((clock.day().value() - 1.5).abs() < f64::EPSILON);
        assert_eq!(clock.steps_in(Day::new(2.0)), TimeStep::new(8));
    }

    #[test]
    fn advance_overflow_is_an_error() {
        let mut clock = SimulationClock::from_parts(TimeStep::new(u32::MAX), 1.0).unwrap();
        assert!(matches!(clock.advance(), Err(ClockError::TickOverflow)));
    }

    #[test]
    fn rejects_non_positive_steps_per_day() {
        assert!(matches!(
            SimulationClock::new(0.0),
            Err(ClockError::InvalidConfig { .. })
        ));
        assert!(matches!(
            SimulationClock::new(f64::NAN),
            Err(ClockError::InvalidConfig { .. })
        ));
    }
}
