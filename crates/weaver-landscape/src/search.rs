//! Filters applied while searching the tree.
//!
//! Animals are bucketed in leaf cells by [`AnimalClass`]. An
//! [`AnimalSearchParams`] is a nested table indexed by life stage, species
//! and instar whose entries are gender bit sets, so accepting or rejecting a
//! bucket is a handful of vector lookups.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use weaver_types::{Gender, Instar, LifeStage, ResourceSpeciesId, SpeciesId};

/// The category an animal is stored under in its terrain cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnimalClass {
    /// Current life stage.
    pub life_stage: LifeStage,
    /// Species of the animal.
    pub species: SpeciesId,
    /// Current instar.
    pub instar: Instar,
    /// Gender of the animal.
    pub gender: Gender,
}

const fn gender_bit(gender: Gender) -> u8 {
    match gender {
        Gender::Male => 0b001,
        Gender::Female => 0b010,
        Gender::Hermaphrodite => 0b100,
    }
}

const ALL_GENDERS: u8 = 0b111;

/// Which animal classes a search should return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimalSearchParams {
    /// `stages[life_stage][species][instar]` is a gender bit set.
    stages: Vec<Vec<Vec<u8>>>,
}

impl AnimalSearchParams {
    /// Parameters that accept nothing.
    pub const fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Accept animals of one class.
    pub fn add(&mut self, class: AnimalClass) {
        self.insert_bits(
            class.life_stage,
            class.species,
            class.instar,
            gender_bit(class.gender),
        );
    }

    /// Accept every gender of a species instar in a life stage.
    pub fn add_all_genders(&mut self, life_stage: LifeStage, species: SpeciesId, instar: Instar) {
        self.insert_bits(life_stage, species, instar, ALL_GENDERS);
    }

    fn insert_bits(&mut self, life_stage: LifeStage, species: SpeciesId, instar: Instar, bits: u8) {
        if let Some(genders) = slot(&mut self.stages, life_stage.index())
            .and_then(|table| slot(table, species.index()))
            .and_then(|table| slot(table, instar.index()))
        {
            *genders |= bits;
        }
    }

    /// Accept everything `other` accepts.
    pub fn merge(&mut self, other: &Self) {
        for (stage_index, species_table) in other.stages.iter().enumerate() {
            for (species_index, instars) in species_table.iter().enumerate() {
                for (instar_index, bits) in instars.iter().enumerate() {
                    if *bits == 0 {
                        continue;
                    }
                    if let Some(genders) = slot(&mut self.stages, stage_index)
                        .and_then(|table| slot(table, species_index))
                        .and_then(|table| slot(table, instar_index))
                    {
                        *genders |= *bits;
                    }
                }
            }
        }
    }

    /// Whether animals of `class` pass the filter.
    pub fn accepts(&self, class: AnimalClass) -> bool {
        self.stages
            .get(class.life_stage.index())
            .and_then(|species| species.get(class.species.index()))
            .and_then(|instars| instars.get(class.instar.index()))
            .is_some_and(|bits| bits & gender_bit(class.gender) != 0)
    }

    /// Whether any class is accepted in `life_stage`.
    pub fn searches_life_stage(&self, life_stage: LifeStage) -> bool {
        self.stages.get(life_stage.index()).is_some_and(|species| {
            species
                .iter()
                .any(|instars| instars.iter().any(|bits| *bits != 0))
        })
    }

    /// Whether the filter accepts nothing.
    pub fn is_empty(&self) -> bool {
        !LifeStage::ALL
            .iter()
            .any(|stage| self.searches_life_stage(*stage))
    }
}

/// Grow `table` so `index` exists and return that entry.
fn slot<T: Default>(table: &mut Vec<T>, index: usize) -> Option<&mut T> {
    if table.len() <= index {
        table.resize_with(index.saturating_add(1), T::default);
    }
    table.get_mut(index)
}

/// Which resource species a search should return.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSearchParams {
    species: BTreeSet<ResourceSpeciesId>,
}

impl ResourceSearchParams {
    /// Parameters that accept nothing.
    pub const fn new() -> Self {
        Self {
            species: BTreeSet::new(),
        }
    }

    /// Accept a resource species.
    pub fn add(&mut self, species: ResourceSpeciesId) {
        self.species.insert(species);
    }

    /// Whether `species` passes the filter.
    pub fn accepts(&self, species: ResourceSpeciesId) -> bool {
        self.species.contains(&species)
    }

    /// Accepted species in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ResourceSpeciesId> + '_ {
        self.species.iter().copied()
    }

    /// Whether the filter accepts nothing.
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(life_stage: LifeStage, species: u16, instar: u16, gender: Gender) -> AnimalClass {
        AnimalClass {
            life_stage,
            species: SpeciesId(species),
            instar: Instar::new(instar),
            gender,
        }
    }

    #[test]
    fn accepts_only_added_classes() {
        let mut params = AnimalSearchParams::new();
        assert!(params.is_empty());
        params.add(class(LifeStage::Active, 1, 2, Gender::Female));
        assert!(params.accepts(class(LifeStage::Active, 1, 2, Gender::Female)));
        assert!(!params.accepts(class(LifeStage::Active, 1, 2, Gender::Male)));
        assert!(!params.accepts(class(LifeStage::Active, 1, 3, Gender::Female)));
        assert!(!params.accepts(class(LifeStage::Unborn, 1, 2, Gender::Female)));
        assert!(!params.accepts(class(LifeStage::Active, 0, 2, Gender::Female)));
        assert!(params.searches_life_stage(LifeStage::Active));
        assert!(!params.is_empty());
    }

    #[test]
    fn merge_unions_both_filters() {
        let mut prey = AnimalSearchParams::new();
        prey.add_all_genders(LifeStage::Active, SpeciesId(0), Instar::FIRST);
        let mut mates = AnimalSearchParams::new();
        mates.add(class(LifeStage::Active, 2, 4, Gender::Male));
        prey.merge(&mates);
        assert!(prey.accepts(class(LifeStage::Active, 0, 1, Gender::Hermaphrodite)));
        assert!(prey.accepts(class(LifeStage::Active, 2, 4, Gender::Male)));
        assert!(!prey.accepts(class(LifeStage::Active, 2, 4, Gender::Female)));
    }

    #[test]
    fn resource_filter() {
        let mut params = ResourceSearchParams::new();
        params.add(ResourceSpeciesId(3));
        assert!(params.accepts(ResourceSpeciesId(3)));
        assert!(!params.accepts(ResourceSpeciesId(0)));
        assert_eq!(params.iter().collect::<Vec<_>>(), vec![ResourceSpeciesId(3)]);
    }
}
