//! Metabolic mass loss of arthropods.
//!
//! The basal rate follows the arthropod allometry
//! `exp(-7.2945 + 43.966 * actE + met * ln(wet) - actE / (k * T))`, with a
//! correction for bodies under 5.2 mg of wet mass. Moving time is charged at
//! the field rate, a multiple of the basal one. Rates are per hour, so a day
//! costs 24 of them; the division by 7 converts from joules.

use weaver_genetics::thermal::BOLTZMANN;
use weaver_types::{DryMass, Temperature, WetMass};

/// Wet mass (mg) under which the small-body correction applies.
pub const SMALL_BODY_WET_MASS: f64 = 5.2;

const SMALL_BODY_INTERCEPT: f64 = -2.605_722;
const SMALL_BODY_EXPONENT: f64 = 0.796_185_1;
const HOURS_PER_DAY: f64 = 24.0;
const JOULES_TO_MASS: f64 = 7.0;

/// Inputs of one metabolic evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metabolism {
    /// Current dry mass of the animal.
    pub dry_mass: DryMass,
    /// Wet mass per unit of dry mass at the current instar.
    pub conversion_to_wet_mass: f64,
    /// Mass exponent of the metabolic rate (`met_rate`).
    pub met_rate: f64,
    /// Activation energy of the metabolic rate (`actE_met`).
    pub activation_energy: f64,
    /// Body temperature the rate is evaluated at.
    pub temperature: Temperature,
    /// Field rate as a multiple of the basal rate.
    pub fmr_multiplier: f64,
}

impl Metabolism {
    /// Basal metabolic rate at the current mass and temperature.
    pub fn basal_rate(&self) -> f64 {
        let wet = WetMass::from_dry(self.dry_mass, self.conversion_to_wet_mass).value();
        if wet <= 0.0 || self.temperature.kelvin() <= 0.0 {
            return 0.0;
        }
        let act_e = self.activation_energy;
        let bmr = (-7.2945 + 43.966 * act_e + self.met_rate * wet.ln()
            - act_e / (self.temperature.kelvin() * BOLTZMANN))
            .exp();
        if wet < SMALL_BODY_WET_MASS {
            SMALL_BODY_INTERCEPT.exp() * bmr.powf(SMALL_BODY_EXPONENT)
        } else {
            bmr
        }
    }

    /// Dry mass lost in one day with `proportion_moving` of it spent moving.
    pub fn daily_loss(&self, proportion_moving: f64) -> DryMass {
        let p = proportion_moving.clamp(0.0, 1.0);
        let bmr = self.basal_rate();
        let from_basal = (1.0 - p) * bmr * HOURS_PER_DAY;
        let from_field = p * self.fmr_multiplier * bmr * HOURS_PER_DAY;
        DryMass::from_wet(
            WetMass::new((from_basal + from_field) / JOULES_TO_MASS),
            self.conversion_to_wet_mass,
        )
    }

    /// Dry mass lost in one time step.
    pub fn loss_per_step(&self, proportion_moving: f64, time_steps_per_day: f64) -> DryMass {
        if time_steps_per_day <= 0.0 {
            return DryMass::ZERO;
        }
        self.daily_loss(proportion_moving)
            .scaled(1.0 / time_steps_per_day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metabolism(dry: f64) -> Metabolism {
        Metabolism {
            dry_mass: DryMass::new(dry),
            conversion_to_wet_mass: 3.0,
            met_rate: 0.7,
            activation_energy: 0.3,
            temperature: Temperature::from_celsius(20.0),
            fmr_multiplier: 3.0,
        }
    }

    #[test]
    fn basal_rate_follows_the_allometry() {
        // 10 dry * 3 = 30 mg wet, above the small-body threshold.
        let m = metabolism(10.0);
        let kelvin = 293.15;
        let expected =
            (-7.2945 + 43.966 * 0.3 + 0.7 * 30.0_f64.ln() - 0.3 / (kelvin * BOLTZMANN)).exp();
        assert!((m.basal_rate() - expected).abs() < 1e-12);
    }

    #[test]
    fn small_bodies_are_corrected() {
        let m = metabolism(1.0);
        let raw = (-7.2945 + 43.966 * 0.3 + 0.7 * 3.0_f64.ln()
            - 0.3 / (293.15 * BOLTZMANN))
            .exp();
        let corrected = (-2.605_722_f64).exp() * raw.powf(0.796_185_1);
        assert!((m.basal_rate() - corrected).abs() < 1e-12);
    }

    #[test]
    fn rate_rises_with_temperature() {
        let cold = metabolism(10.0);
        let warm = Metabolism {
            temperature: Temperature::from_celsius(30.0),
            ..cold
        };
        assert!(warm.basal_rate() > cold.basal_rate());
    }

    #[test]
    fn moving_costs_the_field_rate() {
        let m = metabolism(10.0);
        let resting = m.daily_loss(0.0).value();
        let moving = m.daily_loss(1.0).value();
        assert!(resting > 0.0);
        assert!((moving - 3.0 * resting).abs() < 1e-12);
        let half = m.daily_loss(0.5).value();
        assert!((half - 2.0 * resting).abs() < 1e-12);
    }

    #[test]
    fn loss_is_split_across_the_steps_of_a_day() {
        let m = metabolism(10.0);
        let day = m.daily_loss(0.2).value();
        let step = m.loss_per_step(0.2, 4.0).value();
        assert!((step * 4.0 - day).abs() < 1e-12);
        assert!(metabolism(0.0).daily_loss(1.0).value().abs() < f64::EPSILON);
    }
}
