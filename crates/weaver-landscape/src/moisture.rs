//! Temperature and relative humidity of terrain cells.
//!
//! Leaves share [`MoistureSource`]s instead of owning their own cycles: the
//! tree keeps one source per moisture patch and each leaf stores the index
//! of the source that covers it.

use serde::{Deserialize, Serialize};
use weaver_types::{Day, Temperature, TimeStep};

use crate::config::MoistureConfig;
use crate::error::LandscapeError;

/// Conditions of a moisture source at the current time step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoistureState {
    /// Air temperature.
    pub temperature: Temperature,
    /// Relative humidity in percent.
    pub relative_humidity: f64,
}

/// Repeating daily cycles of temperature and humidity.
#[derive(Debug, Clone, PartialEq)]
pub struct MoistureSource {
    temperature_cycle: Vec<Temperature>,
    relative_humidity_cycle: Vec<f64>,
    in_enemy_free_space: bool,
    in_competitor_free_space: bool,
    current: MoistureState,
}

impl MoistureSource {
    /// Build a source positioned at day zero.
    ///
    /// # Errors
    ///
    /// [`LandscapeError::InvalidConfig`] when a cycle is empty or holds a
    /// non-finite value.
    pub fn from_config(config: &MoistureConfig) -> Result<Self, LandscapeError> {
        if config.temperature_cycle.is_empty() || config.relative_humidity_cycle.is_empty() {
            return Err(LandscapeError::InvalidConfig {
                reason: "moisture cycles must hold at least one day".to_owned(),
            });
        }
        let finite = config
            .temperature_cycle
            .iter()
            .chain(&config.relative_humidity_cycle)
            .all(|value| value.is_finite());
        if !finite {
            return Err(LandscapeError::InvalidConfig {
                reason: "moisture cycles must hold finite values".to_owned(),
            });
        }
        let temperature_cycle: Vec<Temperature> = config
            .temperature_cycle
            .iter()
            .map(|celsius| Temperature::from_celsius(*celsius))
            .collect();
        let current = MoistureState {
            temperature: temperature_cycle
                .first()
                .copied()
                .unwrap_or(Temperature::from_celsius(0.0)),
            relative_humidity: config.relative_humidity_cycle.first().copied().unwrap_or(0.0),
        };
        Ok(Self {
            temperature_cycle,
            relative_humidity_cycle: config.relative_humidity_cycle.clone(),
            in_enemy_free_space: config.in_enemy_free_space,
            in_competitor_free_space: config.in_competitor_free_space,
            current,
        })
    }

    /// Move the cycles to the day containing `time_step`.
    pub fn update(&mut self, time_step: TimeStep, time_steps_per_day: f64) {
        let day = Day::from_time_steps(time_step, time_steps_per_day);
        if let Some(temperature) = cycle_entry(&self.temperature_cycle, day) {
            self.current.temperature = temperature;
        }
        if let Some(humidity) = cycle_entry(&self.relative_humidity_cycle, day) {
            self.current.relative_humidity = humidity;
        }
    }

    /// Conditions at the last update.
    pub const fn current(&self) -> MoistureState {
        self.current
    }

    /// Whether predators are excluded from cells of this source.
    pub const fn is_enemy_free(&self) -> bool {
        self.in_enemy_free_space
    }

    /// Whether conspecifics are ignored in cells of this source.
    pub const fn is_competitor_free(&self) -> bool {
        self.in_competitor_free_space
    }
}

/// Entry of a repeating per-day cycle for (fractional) `day`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn cycle_entry<T: Copy>(cycle: &[T], day: Day) -> Option<T> {
    let whole_days = day.value().max(0.0).floor() as usize;
    let position = whole_days.checked_rem(cycle.len())?;
    cycle.get(position).copied()
}
