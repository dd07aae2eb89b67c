//! Patch value used when choosing where to move.

use std::cmp::Ordering;

use rand::Rng;
use serde::{Deserialize, Serialize};
use weaver_genetics::{CellValueTrait, Genetics};

/// Individual weights of the patch value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellValueWeights {
    /// Balance between food (1) and predation risk (0).
    pub biomass: f64,
    /// Attraction (1) or repulsion (0) towards conspecific biomass.
    pub pro_conspecific: f64,
    /// Weight of the conspecific component against food and risk.
    pub conspecific: f64,
}

impl CellValueWeights {
    /// Reads the weights from an animal's traits.
    pub fn from_genetics(genetics: &Genetics) -> Self {
        Self {
            biomass: genetics.phenotypic(CellValueTrait::CellEvaluationBiomass),
            pro_conspecific: genetics.phenotypic(CellValueTrait::CellEvaluationProConspecific),
            conspecific: genetics.phenotypic(CellValueTrait::ConspecificWeight),
        }
    }
}

/// Normalised assessments of one patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CellAssessment {
    /// Edible biomass value in `[0, 1]`.
    pub edibility: f64,
    /// Predation risk in `[0, 1]`.
    pub predation_risk: f64,
    /// Conspecific biomass in `[0, 1]`.
    pub conspecific_biomass: f64,
}

impl CellAssessment {
    /// Real value of the patch.
    ///
    /// `(b * edib - (1 - b) * risk) * (1 - w) + (c * cons - (1 - c) * cons²) * w`
    pub fn real_value(&self, weights: CellValueWeights) -> f64 {
        let b = weights.biomass;
        let c = weights.pro_conspecific;
        let w = weights.conspecific;
        let food_and_risk = b * self.edibility - (1.0 - b) * self.predation_risk;
        let cons = self.conspecific_biomass;
        let conspecifics = c * cons - (1.0 - c) * cons * cons;
        food_and_risk * (1.0 - w) + conspecifics * w
    }

    /// Real value blurred by imperfect perception.
    ///
    /// The relative error is uniform in `±(1 - detection)`, where
    /// `detection` is the probability of perceiving the patch.
    pub fn perceived_value(
        &self,
        weights: CellValueWeights,
        detection: f64,
        rng: &mut impl Rng,
    ) -> f64 {
        let real = self.real_value(weights);
        let spread = (1.0 - detection).clamp(0.0, 1.0);
        if spread > 0.0 {
            real + real * rng.random_range(-spread..=spread)
        } else {
            real
        }
    }
}

/// `value / maximum`, or zero before any maximum was observed.
pub fn normalize(value: f64, maximum: f64) -> f64 {
    if maximum <= 0.0 || maximum.is_nan() {
        0.0
    } else {
        value / maximum
    }
}

/// Comparable score of a candidate patch.
///
/// Patches inside the animal's habitat always beat patches outside it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellScore {
    /// Whether the patch belongs to the animal's habitat.
    pub in_habitat: bool,
    /// Perceived value.
    pub value: f64,
}

impl CellScore {
    /// Total order: habitat first, then value.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.in_habitat
            .cmp(&other.in_habitat)
            .then_with(|| self.value.total_cmp(&other.value))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    const WEIGHTS: CellValueWeights = CellValueWeights {
        biomass: 0.7,
        pro_conspecific: 0.4,
        conspecific: 0.2,
    };

    #[test]
    fn real_value_combines_food_risk_and_conspecifics() {
        let cell = CellAssessment {
            edibility: 0.8,
            predation_risk: 0.5,
            conspecific_biomass: 0.5,
        };
        let expected = (0.7 * 0.8 - 0.3 * 0.5) * 0.8 + (0.4 * 0.5 - 0.6 * 0.25) * 0.2;
        assert!((cell.real_value(WEIGHTS) - expected).abs() < 1e-12);
    }

    #[test]
    fn perfect_detection_perceives_the_real_value() {
        let mut rng = SmallRng::seed_from_u64(42);
        let cell = CellAssessment {
            edibility: 1.0,
            ..CellAssessment::default()
        };
        let real = cell.real_value(WEIGHTS);
        assert!((cell.perceived_value(WEIGHTS, 1.0, &mut rng) - real).abs() < f64::EPSILON);
        for _ in 0..50 {
            let blurred = cell.perceived_value(WEIGHTS, 0.6, &mut rng);
            assert!((blurred - real).abs() <= real.abs() * 0.4 + 1e-12);
        }
    }

    #[test]
    fn habitat_cells_dominate() {
        let inside = CellScore {
            in_habitat: true,
            value: -1.0,
        };
        let outside = CellScore {
            in_habitat: false,
            value: 10.0,
        };
        assert_eq!(inside.compare(&outside), Ordering::Greater);
        assert!(normalize(1.0, 0.0).abs() < f64::EPSILON);
        assert!((normalize(1.0, 4.0) - 0.25).abs() < f64::EPSILON);
    }
}
