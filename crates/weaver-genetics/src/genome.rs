//! Diploid genomes, chromosome layout and meiosis.
//!
//! Alleles are read per trait through *correlosomes* (one homologous pair
//! per individual-level trait, `L` loci each) but inherited through
//! *chromosomes*. The species [`ChromosomeLayout`] is a fixed random
//! permutation linking the two views, so loci of one trait are scattered
//! across chromosomes and recombine independently.

use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use crate::error::GeneticsError;
use crate::locus::{Allele, Locus};

/// Number of chromatids produced from one homologous pair.
const CHROMATIDS: usize = 4;

/// A homologous pair of allele sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Homologues {
    /// Maternal sequence.
    pub first: Vec<Allele>,
    /// Paternal sequence.
    pub second: Vec<Allele>,
}

/// Species-wide mapping between correlosome and chromosome positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChromosomeLayout {
    /// `positions[i]` is the correlosome flat index (`trait * L + locus`)
    /// stored at chromosome flat index `i`.
    positions: Vec<usize>,
    loci_per_chromosome: usize,
    chiasmas_per_chromosome: usize,
}

impl ChromosomeLayout {
    /// Builds a shuffled layout for `traits` correlosomes of `loci` loci.
    ///
    /// # Errors
    ///
    /// Returns [`GeneticsError::InvalidConfig`] if the number of chiasmas is
    /// odd or does not fit in the interior of a chromosome.
    pub fn shuffled(
        traits: usize,
        loci: usize,
        chiasmas: usize,
        rng: &mut impl Rng,
    ) -> Result<Self, GeneticsError> {
        if chiasmas % 2 != 0 {
            return Err(GeneticsError::InvalidConfig {
                reason: format!("number_of_chiasmas_per_chromosome must be even, got {chiasmas}"),
            });
        }
        if chiasmas > loci.saturating_sub(2) {
            return Err(GeneticsError::InvalidConfig {
                reason: format!(
                    "{chiasmas} chiasmas do not fit in the interior of a chromosome of {loci} loci"
                ),
            });
        }
        let total = traits.saturating_mul(loci);
        let mut positions: Vec<usize> = (0..total).collect();
        rand::seq::SliceRandom::shuffle(positions.as_mut_slice(), rng);
        Ok(Self {
            positions,
            loci_per_chromosome: loci,
            chiasmas_per_chromosome: chiasmas,
        })
    }

    /// Number of chromosomes (one per individual-level trait).
    #[must_use]
    pub fn chromosomes(&self) -> usize {
        self.positions
            .len()
            .checked_div(self.loci_per_chromosome)
            .unwrap_or(0)
    }

    /// Loci per chromosome, equal to loci per trait.
    #[must_use]
    pub const fn loci_per_chromosome(&self) -> usize {
        self.loci_per_chromosome
    }

    /// Chiasmas drawn per chromosome during meiosis.
    #[must_use]
    pub const fn chiasmas_per_chromosome(&self) -> usize {
        self.chiasmas_per_chromosome
    }

    /// Splits a flat index into (sequence, locus).
    fn split(&self, flat: usize) -> (usize, usize) {
        (
            flat.checked_div(self.loci_per_chromosome).unwrap_or(0),
            flat.checked_rem(self.loci_per_chromosome).unwrap_or(0),
        )
    }

    /// Pairs of (chromosome position, correlosome position).
    fn links(&self) -> impl Iterator<Item = ((usize, usize), (usize, usize))> + '_ {
        self.positions
            .iter()
            .enumerate()
            .map(|(chromosome_flat, &correlosome_flat)| {
                (self.split(chromosome_flat), self.split(correlosome_flat))
            })
    }
}

/// One haploid set of chromosomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gamete {
    chromosomes: Vec<Vec<Allele>>,
}

impl Gamete {
    /// Number of chromosomes carried.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chromosomes.len()
    }

    /// Whether the gamete carries no chromosomes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chromosomes.is_empty()
    }
}

/// A diploid genome stored as homologous chromosome pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    chromosomes: Vec<Homologues>,
}

impl Genome {
    /// Creates a genome by sampling one allele per locus for each homologue.
    ///
    /// `loci` holds the species locus pool, one vector of `L` loci per
    /// individual-level trait.
    ///
    /// # Errors
    ///
    /// Returns [`GeneticsError::InvalidConfig`] if a locus has no alleles or
    /// the pool does not match the layout.
    pub fn random(
        loci: &[Vec<Locus>],
        layout: &ChromosomeLayout,
        rng: &mut impl Rng,
    ) -> Result<Self, GeneticsError> {
        let mut correlosomes = Vec::with_capacity(loci.len());
        for trait_loci in loci {
            let mut first = Vec::with_capacity(trait_loci.len());
            let mut second = Vec::with_capacity(trait_loci.len());
            for locus in trait_loci {
                let (Some(a), Some(b)) = (locus.random_allele(rng), locus.random_allele(rng))
                else {
                    return Err(GeneticsError::InvalidConfig {
                        reason: "locus without alleles".to_owned(),
                    });
                };
                first.push(a);
                second.push(b);
            }
            correlosomes.push(Homologues { first, second });
        }
        Self::from_correlosomes(&correlosomes, layout)
    }

    /// Combines two gametes into a zygote genome.
    ///
    /// # Errors
    ///
    /// Returns [`GeneticsError::GameteMismatch`] if either gamete does not
    /// match the layout.
    pub fn from_gametes(
        first: Gamete,
        second: Gamete,
        layout: &ChromosomeLayout,
    ) -> Result<Self, GeneticsError> {
        let expected = layout.chromosomes();
        let loci = layout.loci_per_chromosome();
        let fits = |gamete: &Gamete| {
            gamete.len() == expected && gamete.chromosomes.iter().all(|c| c.len() == loci)
        };
        if !fits(&first) || !fits(&second) {
            return Err(GeneticsError::GameteMismatch { expected, loci });
        }
        let chromosomes = first
            .chromosomes
            .into_iter()
            .zip(second.chromosomes)
            .map(|(first, second)| Homologues { first, second })
            .collect();
        Ok(Self { chromosomes })
    }

    /// Rebuilds the chromosome view from per-trait correlosomes.
    fn from_correlosomes(
        correlosomes: &[Homologues],
        layout: &ChromosomeLayout,
    ) -> Result<Self, GeneticsError> {
        let loci = layout.loci_per_chromosome();
        let mut chromosomes: Vec<Homologues> = (0..layout.chromosomes())
            .map(|_| Homologues {
                first: Vec::with_capacity(loci),
                second: Vec::with_capacity(loci),
            })
            .collect();

        for ((chromosome, _), (sequence, locus)) in layout.links() {
            let source = correlosomes
                .get(sequence)
                .and_then(|pair| Some((*pair.first.get(locus)?, *pair.second.get(locus)?)));
            let target = chromosomes.get_mut(chromosome);
            match (source, target) {
                (Some((a, b)), Some(target)) => {
                    target.first.push(a);
                    target.second.push(b);
                }
                _ => {
                    return Err(GeneticsError::GameteMismatch {
                        expected: layout.chromosomes(),
                        loci,
                    });
                }
            }
        }
        Ok(Self { chromosomes })
    }

    /// The homologous chromosome pairs.
    #[must_use]
    pub fn chromosomes(&self) -> &[Homologues] {
        &self.chromosomes
    }

    /// Reassembles the per-trait correlosomes from the chromosomes.
    #[must_use]
    pub fn correlosomes(&self, layout: &ChromosomeLayout) -> Vec<Homologues> {
        let loci = layout.loci_per_chromosome();
        let placeholder = Allele {
            value: 0.0,
            order: 0,
        };
        let mut correlosomes: Vec<Homologues> = (0..layout.chromosomes())
            .map(|_| Homologues {
                first: vec![placeholder; loci],
                second: vec![placeholder; loci],
            })
            .collect();

        for ((chromosome, position), (sequence, locus)) in layout.links() {
            let Some(source) = self.chromosomes.get(chromosome) else {
                continue;
            };
            let Some(target) = correlosomes.get_mut(sequence) else {
                continue;
            };
            if let (Some(a), Some(slot)) = (source.first.get(position), target.first.get_mut(locus))
            {
                *slot = *a;
            }
            if let (Some(b), Some(slot)) =
                (source.second.get(position), target.second.get_mut(locus))
            {
                *slot = *b;
            }
        }
        correlosomes
    }

    /// Produces one recombinant gamete.
    ///
    /// Each homologous pair is duplicated into four chromatids. The inner
    /// two exchange alleles on alternating segments delimited by randomly
    /// placed interior chiasmas, then one chromatid is kept.
    pub fn meiosis(&self, layout: &ChromosomeLayout, rng: &mut impl Rng) -> Gamete {
        let loci = layout.loci_per_chromosome();
        let chiasmas = layout.chiasmas_per_chromosome();
        let chromosomes = self
            .chromosomes
            .iter()
            .map(|pair| {
                let mut chromatids = [
                    pair.first.clone(),
                    pair.first.clone(),
                    pair.second.clone(),
                    pair.second.clone(),
                ];
                let bounds = chiasma_bounds(loci, chiasmas, rng);
                for segment in bounds.chunks_exact(2) {
                    if let [start, end] = *segment {
                        cross_over(&mut chromatids, start, end);
                    }
                }
                let pick = rng.random_range(0..CHROMATIDS);
                let [a, b, c, d] = chromatids;
                match pick {
                    0 => a,
                    1 => b,
                    2 => c,
                    _ => d,
                }
            })
            .collect();
        Gamete { chromosomes }
    }

    /// Clones the first homologue of every pair as a gamete.
    #[must_use]
    pub fn first_haploid_gamete(&self) -> Gamete {
        Gamete {
            chromosomes: self.chromosomes.iter().map(|p| p.first.clone()).collect(),
        }
    }

    /// Clones the second homologue of every pair as a gamete.
    #[must_use]
    pub fn second_haploid_gamete(&self) -> Gamete {
        Gamete {
            chromosomes: self.chromosomes.iter().map(|p| p.second.clone()).collect(),
        }
    }
}

/// Sorted segment bounds: `0`, the chiasmas, then `loci - 1`.
fn chiasma_bounds(loci: usize, chiasmas: usize, rng: &mut impl Rng) -> Vec<usize> {
    let interior = loci.saturating_sub(2);
    let amount = chiasmas.min(interior);
    let mut bounds = Vec::with_capacity(amount.saturating_add(2));
    bounds.push(0);
    bounds.extend(
        index::sample(rng, interior, amount)
            .into_iter()
            .map(|i| i.saturating_add(1)),
    );
    bounds.push(loci.saturating_sub(1));
    bounds.sort_unstable();
    bounds
}

/// Swaps alleles `start..end` between the two inner chromatids.
fn cross_over(chromatids: &mut [Vec<Allele>; CHROMATIDS], start: usize, end: usize) {
    let [_, left, right, _] = chromatids;
    let end = end.min(left.len()).min(right.len());
    if start >= end {
        return;
    }
    if let (Some(a), Some(b)) = (left.get_mut(start..end), right.get_mut(start..end)) {
        a.swap_with_slice(b);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn pool(traits: usize, loci: usize, rng: &mut SmallRng) -> Vec<Vec<Locus>> {
        (0..traits)
            .map(|_| (0..loci).map(|_| Locus::random(6, rng)).collect())
            .collect()
    }

    #[test]
    fn layout_is_a_permutation() {
        let mut rng = SmallRng::seed_from_u64(42);
        let layout = ChromosomeLayout::shuffled(4, 8, 2, &mut rng).unwrap();
        let mut seen = layout.positions.clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..32).collect::<Vec<_>>());
        assert_eq!(layout.chromosomes(), 4);
    }

    #[test]
    fn odd_or_oversized_chiasmas_are_rejected() {
        let mut rng = SmallRng::seed_from_u64(42);
        assert!(ChromosomeLayout::shuffled(2, 8, 3, &mut rng).is_err());
        assert!(ChromosomeLayout::shuffled(2, 4, 4, &mut rng).is_err());
    }

    #[test]
    fn correlosome_view_round_trips_through_chromosomes() {
        let mut rng = SmallRng::seed_from_u64(42);
        let loci = pool(3, 10, &mut rng);
        let layout = ChromosomeLayout::shuffled(3, 10, 2, &mut rng).unwrap();
        let genome = Genome::random(&loci, &layout, &mut rng).unwrap();
        let correlosomes = genome.correlosomes(&layout);
        let rebuilt = Genome::from_correlosomes(&correlosomes, &layout).unwrap();
        assert_eq!(rebuilt, genome);
    }

    #[test]
    fn meiosis_keeps_shape_and_parental_alleles() {
        let mut rng = SmallRng::seed_from_u64(42);
        let loci = pool(5, 12, &mut rng);
        let layout = ChromosomeLayout::shuffled(5, 12, 4, &mut rng).unwrap();
        let genome = Genome::random(&loci, &layout, &mut rng).unwrap();
        let gamete = genome.meiosis(&layout, &mut rng);
        assert_eq!(gamete.len(), 5);
        for (chromatid, pair) in gamete.chromosomes.iter().zip(genome.chromosomes()) {
            assert_eq!(chromatid.len(), 12);
            for (position, allele) in chromatid.iter().enumerate() {
                let first = pair.first.get(position).unwrap();
                let second = pair.second.get(position).unwrap();
                assert!(allele == first || allele == second);
            }
        }
    }

    #[test]
    fn crossing_over_swaps_only_the_inner_chromatids() {
        let a = |v: f64| Allele { value: v, order: 0 };
        let mut chromatids = [
            vec![a(0.0); 4],
            vec![a(0.0); 4],
            vec![a(1.0); 4],
            vec![a(1.0); 4],
        ];
        cross_over(&mut chromatids, 0, 2);
        assert_eq!(chromatids[0], vec![a(0.0); 4]);
        assert_eq!(chromatids[1], vec![a(1.0), a(1.0), a(0.0), a(0.0)]);
        assert_eq!(chromatids[2], vec![a(0.0), a(0.0), a(1.0), a(1.0)]);
        assert_eq!(chromatids[3], vec![a(1.0); 4]);
    }

    #[test]
    fn zygote_from_mismatched_gametes_fails() {
        let mut rng = SmallRng::seed_from_u64(42);
        let loci = pool(2, 6, &mut rng);
        let layout = ChromosomeLayout::shuffled(2, 6, 2, &mut rng).unwrap();
        let genome = Genome::random(&loci, &layout, &mut rng).unwrap();
        let good = genome.first_haploid_gamete();
        let bad = Gamete {
            chromosomes: vec![Vec::new()],
        };
        assert!(Genome::from_gametes(good.clone(), bad, &layout).is_err());
        let clone = Genome::from_gametes(good, genome.second_haploid_gamete(), &layout).unwrap();
        assert_eq!(clone, genome);
    }
}
