//! Thermal performance curves.
//!
//! Two responses are supported: the Pawar (2018) unimodal curve used by
//! most traits, and the temperature-size rule used for the length at
//! maturation.

use serde::{Deserialize, Serialize};
use weaver_types::{DryMass, Length, Temperature};

/// Boltzmann constant in eV/K.
pub const BOLTZMANN: f64 = 8.617e-5;

/// Fraction of the trait value below which the curve is floored.
const NEXT_TO_ZERO: f64 = 1e-2;

/// Pawar (2018) unimodal thermal performance curve.
///
/// The curve is normalised so that it returns the constitutive trait value
/// at the optimal temperature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PawarCurve {
    /// Activation energy `E` (eV).
    pub activation_energy: f64,
    /// Deactivation energy `ED` (eV), must exceed `E`.
    pub energy_decay: f64,
    /// Temperature of peak performance.
    pub temperature_optimal: Temperature,
}

impl PawarCurve {
    /// Whether the curve has a finite peak (`ED > E`).
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.energy_decay > self.activation_energy
            && self.temperature_optimal.kelvin() > 0.0
            && self.activation_energy.is_finite()
    }

    /// Raw curve for a non-negative trait value measured at the optimum.
    fn raw(&self, value_at_optimum: f64, temperature: Temperature, reference: Temperature) -> f64 {
        let e = self.activation_energy;
        let ed = self.energy_decay;
        let t_opt = self.temperature_optimal.kelvin();
        let t_ref = reference.kelvin();
        let t = temperature.kelvin();
        let ratio = e / (ed - e);

        let boltzmann_at = |kelvin: f64| (-e * (1.0 / (BOLTZMANN * kelvin) - 1.0 / (BOLTZMANN * t_ref))).exp();

        let at_reference = value_at_optimum / (boltzmann_at(t_opt) / (1.0 + ratio));
        at_reference * boltzmann_at(t) / (1.0 + ratio * ((ed / BOLTZMANN) * (1.0 / t_opt - 1.0 / t)).exp())
    }

    /// Applies the curve to `value`, the trait value at the optimal temperature.
    ///
    /// Inverse traits (durations) are inverted before and after evaluation.
    /// Negative values of traits that may be negative are reflected around
    /// zero. Returns `None` when the curve is not well formed or the result
    /// is not finite, in which case callers keep the constitutive value.
    #[must_use]
    pub fn apply(
        &self,
        value: f64,
        temperature: Temperature,
        reference: Temperature,
        inverse: bool,
        strictly_positive: bool,
    ) -> Option<f64> {
        if !self.is_well_formed() {
            return None;
        }

        let mut processed = value;
        if !strictly_positive && processed < 0.0 {
            processed = processed.abs();
        }
        if inverse {
            processed = 1.0 / processed;
        }

        let floor = NEXT_TO_ZERO * processed;
        let mut result = self.raw(processed, temperature, reference).max(floor);

        if inverse {
            result = 1.0 / result;
        }
        if !strictly_positive && value < 0.0 {
            result -= 2.0 * value.abs();
        }
        result.is_finite().then_some(result)
    }
}

/// Temperature-size rule: adult dry mass measured at several temperatures.
///
/// The mass is linearly interpolated (and extrapolated beyond the end
/// points) and turned into a length through the mature mass-length
/// allometry. The curve is rescaled so that it passes through the
/// individual's genetic value at the reference temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSizeRule {
    points: Vec<(Temperature, DryMass)>,
}

impl TemperatureSizeRule {
    /// Builds the rule from `(temperature, dry mass)` points.
    ///
    /// Returns `None` if fewer than two points are given.
    #[must_use]
    pub fn new(mut points: Vec<(Temperature, DryMass)>) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        points.sort_by(|a, b| a.0.kelvin().total_cmp(&b.0.kelvin()));
        Some(Self { points })
    }

    /// Interpolated dry mass at `temperature`.
    fn mass_at(&self, temperature: Temperature) -> DryMass {
        let x = temperature.celsius();
        let mut segments = self.points.windows(2);
        let segment = segments
            .clone()
            .find(|w| w.get(1).is_some_and(|p| x <= p.0.celsius()))
            .or_else(|| segments.next_back());
        let Some(&[(t0, m0), (t1, m1)]) = segment else {
            return DryMass::ZERO;
        };
        let span = t1.celsius() - t0.celsius();
        if span.abs() < f64::EPSILON {
            return m0;
        }
        DryMass::new(m0.value() + (x - t0.celsius()) * (m1.value() - m0.value()) / span)
    }

    /// Length at `temperature` for an individual whose length at the
    /// reference temperature is `value`.
    #[must_use]
    pub fn apply(
        &self,
        value: f64,
        temperature: Temperature,
        reference: Temperature,
        coefficient: f64,
        scale: f64,
    ) -> Option<f64> {
        let at_reference = Length::from_dry_mass(self.mass_at(reference), coefficient, scale);
        if at_reference.value() <= 0.0 {
            return None;
        }
        let at_temperature = Length::from_dry_mass(self.mass_at(temperature), coefficient, scale);
        let length = value * at_temperature.value() / at_reference.value();
        length.is_finite().then_some(length)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn curve() -> PawarCurve {
        PawarCurve {
            activation_energy: 0.65,
            energy_decay: 3.0,
            temperature_optimal: Temperature::from_celsius(25.0),
        }
    }

    #[test]
    fn optimum_returns_the_constitutive_value() {
        let lab = Temperature::from_celsius(20.0);
        let value = curve()
            .apply(1.5, Temperature::from_celsius(25.0), lab, false, true)
            .unwrap();
        assert!((value - 1.5).abs() < 1e-9);

        let inverse = curve()
            .apply(12.0, Temperature::from_celsius(25.0), lab, true, true)
            .unwrap();
        assert!((inverse - 12.0).abs() < 1e-9);
    }

    #[test]
    fn performance_peaks_near_the_optimum() {
        let lab = Temperature::from_celsius(20.0);
        let at = |c: f64| {
            curve()
                .apply(1.0, Temperature::from_celsius(c), lab, false, true)
                .unwrap()
        };
        assert!(at(10.0) < at(20.0));
        assert!(at(40.0) < at(25.0));
        assert!(at(60.0) >= NEXT_TO_ZERO - 1e-12);
    }

    #[test]
    fn inverse_traits_shorten_when_warmer() {
        let lab = Temperature::from_celsius(20.0);
        let cold = curve()
            .apply(10.0, Temperature::from_celsius(15.0), lab, true, true)
            .unwrap();
        assert!(cold > 10.0);
    }

    #[test]
    fn negative_values_keep_their_sign_at_optimum() {
        let lab = Temperature::from_celsius(20.0);
        let value = curve()
            .apply(-0.3, Temperature::from_celsius(25.0), lab, false, false)
            .unwrap();
        assert!((value + 0.3).abs() < 1e-9);
    }

    #[test]
    fn malformed_curve_is_rejected() {
        let flat = PawarCurve {
            activation_energy: 1.0,
            energy_decay: 0.5,
            temperature_optimal: Temperature::from_celsius(25.0),
        };
        assert!(
            flat.apply(1.0, Temperature::from_celsius(20.0), Temperature::from_celsius(20.0), false, true)
                .is_none()
        );
    }

    #[test]
    fn size_rule_passes_through_the_individual_value() {
        let rule = TemperatureSizeRule::new(vec![
            (Temperature::from_celsius(30.0), DryMass::new(1.0)),
            (Temperature::from_celsius(10.0), DryMass::new(2.0)),
        ])
        .unwrap();
        let reference = Temperature::from_celsius(20.0);
        let at_reference = rule.apply(4.0, reference, reference, 0.5, 3.0).unwrap();
        assert!((at_reference - 4.0).abs() < 1e-9);
        let warm = rule.apply(4.0, Temperature::from_celsius(30.0), reference, 0.5, 3.0).unwrap();
        assert!(warm < at_reference);
    }
}
