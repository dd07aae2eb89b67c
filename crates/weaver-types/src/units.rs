//! Physical quantities used by the simulation.
//!
//! Masses are stored in milligrams, lengths in millimetres and temperatures
//! in degrees Celsius. The wrappers exist so that dry and wet masses cannot
//! be mixed up; arithmetic happens on the raw `f64` via [`DryMass::value`]
//! and friends.

use serde::{Deserialize, Serialize};

/// Offset between the Celsius and Kelvin scales.
pub const KELVIN_OFFSET: f64 = 273.15;

// ---------------------------------------------------------------------------
// Masses
// ---------------------------------------------------------------------------

/// Body mass excluding water content.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DryMass(f64);

impl DryMass {
    /// The zero mass.
    pub const ZERO: Self = Self(0.0);

    /// Wrap a raw dry mass.
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Raw value in milligrams.
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Convert a wet mass using the dry-to-wet conversion factor of the instar.
    pub fn from_wet(wet: WetMass, conversion_to_wet_mass: f64) -> Self {
        if conversion_to_wet_mass > 0.0 {
            Self(wet.value() / conversion_to_wet_mass)
        } else {
            Self::ZERO
        }
    }

    /// Allometric mass from length: `coefficient * length^scale`.
    pub fn from_length(length: Length, coefficient: f64, scale: f64) -> Self {
        Self(coefficient * length.value().powf(scale))
    }

    /// Sum of two dry masses.
    pub const fn plus(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }

    /// Difference of two dry masses (may be negative).
    pub const fn minus(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }

    /// Multiply by a dimensionless factor.
    pub const fn scaled(self, factor: f64) -> Self {
        Self(self.0 * factor)
    }

    /// The smaller of two masses.
    pub const fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    /// The larger of two masses.
    pub const fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }
}

/// Body mass including water content.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WetMass(f64);

impl WetMass {
    /// Wrap a raw wet mass.
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Raw value in milligrams.
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Convert a dry mass using the dry-to-wet conversion factor of the instar.
    pub const fn from_dry(dry: DryMass, conversion_to_wet_mass: f64) -> Self {
        Self(dry.value() * conversion_to_wet_mass)
    }
}

// ---------------------------------------------------------------------------
// Length
// ---------------------------------------------------------------------------

/// Body length.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Length(f64);

impl Length {
    /// Wrap a raw length.
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Raw value in millimetres.
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Inverse allometry: `(dryMass / coefficient)^(1/scale)`.
    pub fn from_dry_mass(dry: DryMass, coefficient: f64, scale: f64) -> Self {
        if coefficient <= 0.0 || scale.abs() < f64::EPSILON {
            return Self(0.0);
        }
        Self((dry.value() / coefficient).powf(scale.recip()))
    }
}

// ---------------------------------------------------------------------------
// Temperature
// ---------------------------------------------------------------------------

/// Ambient or body temperature.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Temperature(f64);

impl Temperature {
    /// Build a temperature from degrees Celsius.
    pub const fn from_celsius(celsius: f64) -> Self {
        Self(celsius)
    }

    /// Build a temperature from Kelvin.
    pub const fn from_kelvin(kelvin: f64) -> Self {
        Self(kelvin - KELVIN_OFFSET)
    }

    /// Degrees Celsius.
    pub const fn celsius(self) -> f64 {
        self.0
    }

    /// Kelvin, as required by the Boltzmann-Arrhenius terms.
    pub const fn kelvin(self) -> f64 {
        self.0 + KELVIN_OFFSET
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A duration or instant measured in (fractional) days.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Day(f64);

impl Day {
    /// Wrap a raw number of days.
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Raw number of days.
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Convert a number of time steps into days.
    pub fn from_time_steps(steps: TimeStep, time_steps_per_day: f64) -> Self {
        if time_steps_per_day > 0.0 {
            Self(f64::from(steps.value()) / time_steps_per_day)
        } else {
            Self(0.0)
        }
    }
}

/// A discrete simulation step counter.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TimeStep(u32);

impl TimeStep {
    /// The first time step.
    pub const ZERO: Self = Self(0);

    /// Wrap a raw step count.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Raw step count.
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Convert days into time steps, rounding to the nearest step.
    pub fn from_days(days: Day, time_steps_per_day: f64) -> Self {
        Self(round_to_steps(days.value() * time_steps_per_day))
    }

    /// Round a real number of steps to the nearest step.
    pub fn from_real(steps: f64) -> Self {
        Self(round_to_steps(steps))
    }

    /// Scale a step count by a real factor, rounding to the nearest step.
    pub fn scaled(self, factor: f64) -> Self {
        Self(round_to_steps(f64::from(self.0) * factor))
    }

    /// Add steps, saturating at the maximum.
    pub const fn plus(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Subtract steps, saturating at zero.
    pub const fn minus(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// The following step.
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Round a non-negative real to a step count, clamping to the `u32` range.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_to_steps(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        0
    } else if value >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        value.round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wet_and_dry_conversions_are_inverse() {
        let dry = DryMass::new(2.0);
        let wet = WetMass::from_dry(dry, 3.0);
        assert!((wet.value() - 6.0).abs() < 1e-12);
        assert!((DryMass::from_wet(wet, 3.0).value() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn allometry_round_trips_through_length() {
        let length = Length::new(4.0);
        let mass = DryMass::from_length(length, 0.5, 2.0);
        assert!((mass.value() - 8.0).abs() < 1e-12);
        let back = Length::from_dry_mass(mass, 0.5, 2.0);
        assert!((back.value() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn time_steps_round_and_saturate() {
        assert_eq!(TimeStep::from_days(Day::new(1.5), 2.0).value(), 3);
        assert_eq!(TimeStep::from_days(Day::new(-4.0), 2.0).value(), 0);
        assert_eq!(TimeStep::new(2).minus(TimeStep::new(5)), TimeStep::ZERO);
        assert!((Day::from_time_steps(TimeStep::new(6), 4.0).value() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn kelvin_offset() {
        let t = Temperature::from_celsius(20.0);
        assert!((t.kelvin() - 293.15).abs() < 1e-9);
        assert!((Temperature::from_kelvin(293.15).celsius() - 20.0).abs() < 1e-9);
    }
}
