//! Alleles and loci.
//!
//! A [`Locus`] is the species-wide pool of alleles available at one position
//! of a trait correlosome. Individual genomes sample one allele per locus per
//! homologue.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// One allele: an additive effect in `[0, 1]` and its dominance order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Allele {
    /// Additive contribution to the trait pseudo-value.
    pub value: f64,
    /// Alphabetic order; the allele with the higher order is dominant.
    pub order: u16,
}

impl Allele {
    /// Returns the dominant allele of a homologous pair.
    ///
    /// Ties go to the first homologue.
    #[must_use]
    pub const fn dominant(first: Self, second: Self) -> Self {
        if first.order >= second.order {
            first
        } else {
            second
        }
    }
}

/// The alleles available at one locus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locus {
    alleles: Vec<Allele>,
}

impl Locus {
    /// Creates a locus with `count` alleles of uniformly random value.
    pub fn random(count: u16, rng: &mut impl Rng) -> Self {
        let alleles = (0..count)
            .map(|order| Allele {
                value: rng.random::<f64>(),
                order,
            })
            .collect();
        Self { alleles }
    }

    /// The alleles of this locus.
    #[must_use]
    pub fn alleles(&self) -> &[Allele] {
        &self.alleles
    }

    /// Draws one allele uniformly at random.
    ///
    /// Returns `None` only for a locus without alleles.
    pub fn random_allele(&self, rng: &mut impl Rng) -> Option<Allele> {
        if self.alleles.is_empty() {
            return None;
        }
        let index = rng.random_range(0..self.alleles.len());
        self.alleles.get(index).copied()
    }

    /// Multiplies the value of the allele at `position` by `times`.
    pub fn modify_allele(&mut self, position: usize, times: f64) {
        if let Some(allele) = self.alleles.get_mut(position) {
            allele.value *= times;
        }
    }

    /// Smallest allele value at this locus.
    #[must_use]
    pub fn min_value(&self) -> f64 {
        self.alleles
            .iter()
            .map(|a| a.value)
            .fold(f64::INFINITY, f64::min)
    }

    /// Largest allele value at this locus.
    #[must_use]
    pub fn max_value(&self) -> f64 {
        self.alleles
            .iter()
            .map(|a| a.value)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn alleles_have_dense_orders_and_unit_values() {
        let mut rng = SmallRng::seed_from_u64(42);
        let locus = Locus::random(10, &mut rng);
        assert_eq!(locus.alleles().len(), 10);
        for (position, allele) in locus.alleles().iter().enumerate() {
            assert_eq!(usize::from(allele.order), position);
            assert!((0.0..1.0).contains(&allele.value));
        }
    }

    #[test]
    fn higher_order_dominates_and_ties_keep_first() {
        let low = Allele { value: 0.1, order: 1 };
        let high = Allele { value: 0.9, order: 4 };
        assert_eq!(Allele::dominant(low, high), high);
        assert_eq!(Allele::dominant(high, low), high);
        let twin = Allele { value: 0.5, order: 4 };
        assert_eq!(Allele::dominant(twin, high), twin);
    }

    #[test]
    fn modify_allele_scales_value() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut locus = Locus::random(3, &mut rng);
        let before = locus.alleles().get(2).map(|a| a.value).unwrap_or_default();
        locus.modify_allele(2, 2.0);
        let after = locus.alleles().get(2).map(|a| a.value).unwrap_or_default();
        assert!((after - before * 2.0).abs() < 1e-12);
        assert!(locus.max_value() >= after);
    }
}
