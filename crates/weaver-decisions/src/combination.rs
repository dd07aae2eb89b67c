//! Weighted combination of sub-probabilities.

use serde::{Deserialize, Serialize};
use weaver_genetics::{Genetics, SpeciesGenetics, TraitSlot};

use crate::error::NotComputable;

/// Combines weighted sub-probabilities additively or multiplicatively.
///
/// Each slot corresponds to one weight trait. Slots whose trait is disabled
/// for the species are never evaluated. The remaining weight
/// `1 - sum(weights)` is applied to a fallback probability unless it was
/// configured as null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedCombination {
    additive: bool,
    computed_weights: Vec<bool>,
    computed_remaining_weight: bool,
}

impl WeightedCombination {
    /// Creates a combination over explicitly enabled slots.
    pub const fn new(
        additive: bool,
        computed_weights: Vec<bool>,
        is_remaining_weight_null: bool,
    ) -> Self {
        Self {
            additive,
            computed_weights,
            computed_remaining_weight: !is_remaining_weight_null,
        }
    }

    /// Creates a combination whose slots are the traits of `T`, enabled
    /// when the species does not define them as null.
    pub fn for_traits<T: TraitSlot>(
        species: &SpeciesGenetics,
        additive: bool,
        is_remaining_weight_null: bool,
    ) -> Self {
        let computed = T::ALL.iter().map(|t| species.is_computed(*t)).collect();
        Self::new(additive, computed, is_remaining_weight_null)
    }

    /// Whether weighted terms are summed rather than multiplied.
    pub const fn is_additive(&self) -> bool {
        self.additive
    }

    /// Whether a slot takes part in the combination.
    pub fn is_computed(&self, slot: usize) -> bool {
        self.computed_weights.get(slot).copied().unwrap_or(false)
    }

    /// Whether the remaining weight is applied.
    pub const fn has_remaining_weight(&self) -> bool {
        self.computed_remaining_weight
    }

    /// Evaluates the combination with weights read from `genetics`.
    ///
    /// # Errors
    ///
    /// Propagates the first [`NotComputable`] raised by an evaluated slot.
    pub fn evaluate<T: TraitSlot>(
        &self,
        genetics: &Genetics,
        mut probability: impl FnMut(T) -> Result<f64, NotComputable>,
        remaining: impl FnOnce() -> Result<f64, NotComputable>,
    ) -> Result<f64, NotComputable> {
        self.evaluate_with(
            |slot| T::ALL.get(slot).map_or(0.0, |t| genetics.phenotypic(*t)),
            |slot| {
                let trait_type = T::ALL.get(slot).ok_or(NotComputable::DegenerateRatio)?;
                probability(*trait_type)
            },
            remaining,
        )
    }

    /// Evaluates the combination with arbitrary weight and probability
    /// functions indexed by slot.
    ///
    /// The result is clamped to `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Propagates the first [`NotComputable`] raised by an evaluated slot.
    pub fn evaluate_with(
        &self,
        weight: impl Fn(usize) -> f64,
        mut probability: impl FnMut(usize) -> Result<f64, NotComputable>,
        remaining: impl FnOnce() -> Result<f64, NotComputable>,
    ) -> Result<f64, NotComputable> {
        let mut value = if self.additive { 0.0 } else { 1.0 };
        let mut remaining_weight = 1.0;

        for (slot, computed) in self.computed_weights.iter().enumerate() {
            if !computed {
                continue;
            }
            let w = weight(slot);
            let term = w * probability(slot)?;
            value = self.accumulate(value, term);
            remaining_weight -= w;
        }

        if self.computed_remaining_weight {
            let term = remaining_weight * remaining()?;
            value = self.accumulate(value, term);
        }

        if value.is_finite() {
            Ok(value.clamp(0.0, 1.0))
        } else {
            Err(NotComputable::DegenerateRatio)
        }
    }

    fn accumulate(&self, value: f64, term: f64) -> f64 {
        if self.additive { value + term } else { value * term }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn additive_combination_uses_the_remaining_weight() {
        let combination = WeightedCombination::new(true, vec![true, true], false);
        let weights = [0.2, 0.3];
        let probabilities = [0.5, 1.0];
        let value = combination
            .evaluate_with(
                |i| weights[i],
                |i| Ok(probabilities[i]),
                || Ok(0.4),
            )
            .unwrap();
        let expected = 0.2 * 0.5 + 0.3 * 1.0 + 0.5 * 0.4;
        assert!((value - expected).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&value));
    }

    #[test]
    fn disabled_slots_are_never_evaluated() {
        let combination = WeightedCombination::new(true, vec![false, true], true);
        let calls = Cell::new(0);
        let value = combination
            .evaluate_with(
                |_| 0.5,
                |i| {
                    calls.set(calls.get() + 1);
                    assert_eq!(i, 1);
                    Ok(1.0)
                },
                || Err(NotComputable::Inedible),
            )
            .unwrap();
        assert_eq!(calls.get(), 1);
        assert!((value - 0.5).abs() < 1e-12);
    }

    #[test]
    fn multiplicative_combination_starts_from_one() {
        let combination = WeightedCombination::new(false, vec![true], false);
        let value = combination
            .evaluate_with(|_| 0.5, |_| Ok(0.8), || Ok(1.0))
            .unwrap();
        assert!((value - 0.5 * 0.8 * 0.5).abs() < 1e-12);
    }

    #[test]
    fn not_computable_slots_propagate() {
        let combination = WeightedCombination::new(true, vec![true], true);
        let result = combination.evaluate_with(
            |_| 1.0,
            |_| Err(NotComputable::ZeroRunningMaximum),
            || Ok(0.0),
        );
        assert_eq!(result, Err(NotComputable::ZeroRunningMaximum));
    }

    #[test]
    fn results_are_clamped() {
        let combination = WeightedCombination::new(true, vec![true, true], true);
        let value = combination
            .evaluate_with(|_| 0.9, |_| Ok(1.0), || Ok(0.0))
            .unwrap();
        assert!((value - 1.0).abs() < f64::EPSILON);
    }
}
