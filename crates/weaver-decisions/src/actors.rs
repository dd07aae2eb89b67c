//! Views of the organisms a decision is evaluated on.
//!
//! The decision crate never owns animals. Callers expose the quantities a
//! score needs through [`AnimalView`] and resolve other species' decision
//! blocks through [`DecisionsLookup`].

use serde::{Deserialize, Serialize};
use weaver_genetics::Genetics;
use weaver_types::{DryMass, Instar, Point, Rect, ResourceSpeciesId, SpeciesId};

use crate::species::SpeciesDecisions;

/// Species of an edible organism, animal or resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SpeciesKey {
    /// An animal species.
    Animal(SpeciesId),
    /// A resource species.
    Resource(ResourceSpeciesId),
}

/// A feeding class: a species at a given instar.
///
/// Resources always use [`Instar::FIRST`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PreyClass {
    /// Species of the prey.
    pub species: SpeciesKey,
    /// Instar of the prey.
    pub instar: Instar,
}

impl PreyClass {
    /// Feeding class of an animal.
    pub const fn animal(species: SpeciesId, instar: Instar) -> Self {
        Self {
            species: SpeciesKey::Animal(species),
            instar,
        }
    }

    /// Feeding class of a resource.
    pub const fn resource(species: ResourceSpeciesId) -> Self {
        Self {
            species: SpeciesKey::Resource(species),
            instar: Instar::FIRST,
        }
    }
}

/// Read access to the state of an animal taking part in a decision.
pub trait AnimalView {
    /// Species of the animal.
    fn species(&self) -> SpeciesId;

    /// Current instar.
    fn instar(&self) -> Instar;

    /// Instar whose statistics the animal uses to evaluate cells.
    ///
    /// The first instar while the animal is breeding, since it then looks
    /// for a place for its offspring; otherwise [`AnimalView::instar`].
    fn instar_to_evaluate_cells(&self) -> Instar;

    /// Current position.
    fn position(&self) -> Point;

    /// Current total dry mass.
    fn dry_mass(&self) -> DryMass;

    /// Dry mass used by the size-matching density.
    ///
    /// The mass of one of its eggs while the animal evaluates cells with
    /// another instar, otherwise the current total dry mass.
    fn pdf_dry_mass(&self) -> DryMass;

    /// Current speed.
    fn speed(&self) -> f64;

    /// Fraction of the body mass carried as undigested food.
    fn mass_load(&self) -> f64;

    /// Food the animal wants in this time step, regardless of what it has
    /// already eaten.
    fn voracity(&self) -> f64;

    /// Radius inside which the animal can attack.
    fn interaction_radius(&self) -> f64;

    /// Radius inside which the animal perceives its surroundings.
    fn scope_radius(&self) -> f64;

    /// Realised traits.
    fn genetics(&self) -> &Genetics;

    /// Learned preference for a feeding class.
    fn preference(&self, class: PreyClass) -> f64;

    /// Mass that would be assimilated from eating `mass` of a feeding class.
    fn assimilated_mass(&self, mass: DryMass, class: PreyClass) -> DryMass;

    /// Whether the animal's species moves.
    fn is_mobile(&self) -> bool;
}

/// A resource patch seen as a prey.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourcePatch {
    /// Feeding class of the resource.
    pub class: PreyClass,
    /// Region occupied by the patch.
    pub area: Rect,
}

/// The target of a feeding decision.
#[derive(Debug)]
pub enum Prey<'a, A> {
    /// Another animal.
    Animal(&'a A),
    /// A resource patch.
    Resource(ResourcePatch),
}

impl<A> Clone for Prey<'_, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for Prey<'_, A> {}

impl<A: AnimalView> Prey<'_, A> {
    /// Feeding class of the prey.
    pub fn class(&self) -> PreyClass {
        match self {
            Self::Animal(animal) => PreyClass::animal(animal.species(), animal.instar()),
            Self::Resource(patch) => patch.class,
        }
    }

    /// Distance from `point` to the prey; zero inside a resource patch.
    pub fn distance_from(&self, point: Point) -> f64 {
        match self {
            Self::Animal(animal) => point.distance_to(animal.position()),
            Self::Resource(patch) => patch.area.distance_to_point(point),
        }
    }

    /// Whether the prey can move and therefore escape.
    pub fn is_mobile(&self) -> bool {
        match self {
            Self::Animal(animal) => animal.is_mobile(),
            Self::Resource(_) => false,
        }
    }
}

/// Resolves the decision block of any animal species.
pub trait DecisionsLookup {
    /// Decision block of a species, if it exists.
    fn species_decisions(&self, species: SpeciesId) -> Option<&SpeciesDecisions>;
}

impl DecisionsLookup for [SpeciesDecisions] {
    fn species_decisions(&self, species: SpeciesId) -> Option<&SpeciesDecisions> {
        self.get(species.index())
    }
}

impl DecisionsLookup for Vec<SpeciesDecisions> {
    fn species_decisions(&self, species: SpeciesId) -> Option<&SpeciesDecisions> {
        self.as_slice().species_decisions(species)
    }
}
