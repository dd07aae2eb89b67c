//! Sub-probability formulas.
//!
//! Pure functions over plain numbers. [`SpeciesDecisions`] wires them into
//! the weighted combinations.
//!
//! [`SpeciesDecisions`]: crate::species::SpeciesDecisions

use std::f64::consts::PI;

use crate::error::{NotComputable, ratio};
use crate::sensory::SensoryModel;

/// Speed reduced by the mass an animal carries: `v - c * load * v`.
pub fn tuned_speed(speed: f64, mass_load: f64, c_velocity: f64) -> f64 {
    speed - c_velocity * mass_load * speed
}

/// Share of the combined speed belonging to the prey.
///
/// # Errors
///
/// [`NotComputable::DegenerateRatio`] when both animals are motionless.
pub fn velocity_probability(prey_speed: f64, predator_speed: f64) -> Result<f64, NotComputable> {
    ratio(prey_speed, prey_speed + predator_speed)
}

/// `min(1, distance / interaction_radius)`.
///
/// # Errors
///
/// [`NotComputable::DegenerateRatio`] for a non-positive radius.
pub fn attack_distance_probability(
    distance: f64,
    interaction_radius: f64,
) -> Result<f64, NotComputable> {
    ratio(distance, interaction_radius)
}

/// Probability that the prey notices the attack early enough to flee.
///
/// One minus the chance of detecting the predator from the edge of its
/// interaction area.
pub fn fleeing_probability(
    sensory: SensoryModel,
    distance: f64,
    interaction_radius: f64,
    prey_scope_radius: f64,
) -> f64 {
    1.0 - sensory.probability(distance - interaction_radius, prey_scope_radius)
}

/// Lognormal size-matching density of a predator/prey mass ratio.
///
/// `exp(-0.5 * ((ln(mPred / mPrey) - mu) / sigma)^2) / (sigma * sqrt(2π))`
///
/// # Errors
///
/// [`NotComputable::DegenerateRatio`] for non-positive masses or spread.
pub fn size_matching_density(
    predator_mass: f64,
    prey_mass: f64,
    mu: f64,
    sigma: f64,
) -> Result<f64, NotComputable> {
    if predator_mass <= 0.0 || prey_mass <= 0.0 || sigma <= 0.0 {
        return Err(NotComputable::DegenerateRatio);
    }
    let z = ((predator_mass / prey_mass).ln() - mu) / sigma;
    let density = (-0.5 * z * z).exp() / (sigma * (2.0 * PI).sqrt());
    if density.is_finite() {
        Ok(density)
    } else {
        Err(NotComputable::DegenerateRatio)
    }
}

/// Value of a food item relative to the predator's appetite: `m / (m + voracity)`.
///
/// # Errors
///
/// [`NotComputable::DegenerateRatio`] when both are zero.
pub fn relative_resource_value(mass: f64, voracity: f64) -> Result<f64, NotComputable> {
    ratio(mass, mass + voracity)
}

/// Linear falloff from 1 at distance zero to 0 at the scope radius.
pub fn proximity(distance: f64, scope_radius: f64) -> f64 {
    if scope_radius <= 0.0 || scope_radius.is_nan() {
        return 0.0;
    }
    (1.0 - distance.max(0.0) / scope_radius).max(0.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn velocity_probability_favours_the_faster_animal() {
        assert!((velocity_probability(3.0, 1.0).unwrap() - 0.75).abs() < 1e-12);
        assert_eq!(
            velocity_probability(0.0, 0.0),
            Err(NotComputable::DegenerateRatio)
        );
        let loaded = tuned_speed(2.0, 0.5, 0.4);
        assert!((loaded - 1.6).abs() < 1e-12);
    }

    #[test]
    fn attack_distance_is_capped_at_one() {
        assert!((attack_distance_probability(0.5, 2.0).unwrap() - 0.25).abs() < 1e-12);
        assert!((attack_distance_probability(5.0, 2.0).unwrap() - 1.0).abs() < f64::EPSILON);
        assert!(attack_distance_probability(1.0, 0.0).is_err());
    }

    #[test]
    fn density_peaks_at_the_preferred_ratio() {
        let sigma = 0.5;
        let peak = size_matching_density(std::f64::consts::E, 1.0, 1.0, sigma).unwrap();
        assert!((peak - 1.0 / (sigma * (2.0 * PI).sqrt())).abs() < 1e-12);
        let off = size_matching_density(1.0, 1.0, 1.0, sigma).unwrap();
        assert!(off < peak);
        assert!(size_matching_density(0.0, 1.0, 1.0, sigma).is_err());
    }

    #[test]
    fn proximity_falls_linearly() {
        assert!((proximity(0.0, 4.0) - 1.0).abs() < f64::EPSILON);
        assert!((proximity(1.0, 4.0) - 0.75).abs() < 1e-12);
        assert!(proximity(5.0, 4.0).abs() < f64::EPSILON);
        assert!(proximity(1.0, 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fleeing_is_certain_outside_the_prey_scope() {
        let sensory = SensoryModel::new(2.0);
        assert!((fleeing_probability(sensory, 10.0, 1.0, 5.0) - 1.0).abs() < f64::EPSILON);
        let close = fleeing_probability(sensory, 1.0, 1.0, 5.0);
        assert!(close.abs() < 1e-12);
    }
}
