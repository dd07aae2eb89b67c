//! Prey, resource and mate search, patch choice and movement.
//!
//! An animal forages by repeating three moves until it is sated or has
//! walked its whole search radius:
//!
//! 1. **Search** -- collect the prey and resources inside its interaction
//!    radius, ranked by edibility value.
//! 2. **Attack** -- try to eat the best candidate. A failed attack on a
//!    mobile prey lets the prey strike back.
//! 3. **Walk** -- with nothing left to eat, walk one step towards the best
//!    patch inside its scope radius, choosing a new patch on arrival.
//!
//! Mature animals also look for partners after every search. Animals are
//! processed one at a time, so later foragers see the kills, meals and
//! running maxima of earlier ones in the same step.

use std::collections::BTreeMap;

use rand::Rng;
use tracing::debug;
use weaver_decisions::cell_value::normalize;
use weaver_decisions::{
    AnimalView, CellAssessment, CellScore, CellValueWeights, MaximumKind, Prey, PreyClass,
    ResourcePatch,
};
use weaver_landscape::{CellId, SpatialTree};
use weaver_types::{AnimalId, DryMass, Gender, LifeStage, Point, ResourceSpeciesId, TimeStep};

use crate::animal::{Animal, AnimalError, Mate};
use crate::output::{OutputBuffers, PredationRecord};
use crate::species::{AnimalSpecies, SEARCHABLE_STAGES, SpeciesTable};
use crate::tick::SimulationState;

/// Counters of one foraging phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForagingTally {
    /// Successful attacks, retaliations included.
    pub predations: u32,
    /// Predators killed by the prey they attacked.
    pub retaliations: u32,
    /// Females that found a partner.
    pub matings: u32,
    /// Single moves walked.
    pub moves: u32,
}

/// What a candidate meal is.
#[derive(Debug, Clone, Copy, PartialEq)]
enum EdibleTarget {
    Animal(AnimalId),
    Resource {
        cell: CellId,
        species: ResourceSpeciesId,
    },
}

/// A candidate meal and its value for the forager.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Edible {
    value: f64,
    target: EdibleTarget,
    dry_mass: DryMass,
}

fn find(animals: &BTreeMap<AnimalId, Animal>, id: AnimalId) -> Result<&Animal, AnimalError> {
    animals.get(&id).ok_or(AnimalError::UnknownAnimal { id })
}

fn find_mut(
    animals: &mut BTreeMap<AnimalId, Animal>,
    id: AnimalId,
) -> Result<&mut Animal, AnimalError> {
    animals.get_mut(&id).ok_or(AnimalError::UnknownAnimal { id })
}

/// Split borrow of the simulation state used while one animal forages.
struct Forager<'s, R> {
    species: &'s SpeciesTable,
    tree: &'s mut SpatialTree<AnimalId>,
    animals: &'s mut BTreeMap<AnimalId, Animal>,
    rng: &'s mut R,
    output: &'s mut OutputBuffers,
    time_step: TimeStep,
    depth: u32,
}

impl SimulationState {
    /// Let one animal search, eat, mate and walk for the current step.
    ///
    /// Only active animals forage, plus reproducing animals of instars that
    /// shift habitat before laying. Dead or missing animals are skipped.
    ///
    /// # Errors
    ///
    /// Returns an [`AnimalError`] if the tree or the species table is out
    /// of step with the population.
    pub fn forage(&mut self, id: AnimalId, tally: &mut ForagingTally) -> Result<(), AnimalError> {
        let depth = self.tree.leaf_depth();
        let mut forager = Forager {
            species: &self.species,
            tree: &mut self.tree,
            animals: &mut self.animals,
            rng: &mut self.rng,
            output: &mut self.output,
            time_step: self.clock.time_step(),
            depth,
        };
        forager.run(id, tally)
    }

    /// [`SimulationState::forage`] with every attack, grazing and movement
    /// draw taken from `rng` instead of the run's generator.
    ///
    /// # Errors
    ///
    /// As [`SimulationState::forage`].
    pub fn forage_with<R: Rng>(
        &mut self,
        id: AnimalId,
        tally: &mut ForagingTally,
        rng: &mut R,
    ) -> Result<(), AnimalError> {
        let depth = self.tree.leaf_depth();
        let mut forager = Forager {
            species: &self.species,
            tree: &mut self.tree,
            animals: &mut self.animals,
            rng,
            output: &mut self.output,
            time_step: self.clock.time_step(),
            depth,
        };
        forager.run(id, tally)
    }
}

impl<'s, R: Rng> Forager<'s, R> {
    fn species_of(&self, animal: &Animal) -> Result<&'s AnimalSpecies, AnimalError> {
        self.species
            .get(animal.species)
            .ok_or(AnimalError::UnknownSpecies {
                species: animal.species,
            })
    }

    fn run(&mut self, id: AnimalId, tally: &mut ForagingTally) -> Result<(), AnimalError> {
        let Some(animal) = self.animals.get(&id) else {
            return Ok(());
        };
        let species = self.species_of(animal)?;
        let shifting = animal.life_stage == LifeStage::Reproducing
            && species.growth.has_habitat_shift(animal.growth.instar());
        if animal.life_stage != LifeStage::Active && !shifting {
            return Ok(());
        }
        if shifting {
            self.shift_habitat(id, species, tally)?;
        }

        let mut edibles = self.search_edibles(id, species)?;
        self.search_partner(id, species, tally)?;
        loop {
            let animal = find(self.animals, id)?;
            let can_act = animal.life_stage == LifeStage::Active
                || (shifting && animal.life_stage == LifeStage::Reproducing);
            if !can_act || animal.activity.exhausted {
                break;
            }
            let sated = animal.is_sated();
            if sated && !animal.is_searching_partner() {
                break;
            }
            if edibles.is_empty() || sated {
                if !species.mobile {
                    break;
                }
                self.walk(id, species, tally)?;
                edibles = self.search_edibles(id, species)?;
                self.search_partner(id, species, tally)?;
            } else {
                let edible = edibles.remove(0);
                self.try_to_eat(id, species, edible, tally)?;
            }
        }

        if let Some(animal) = self.animals.get_mut(&id) {
            animal.close_foraging(species);
        }
        Ok(())
    }

    /// Edibles inside the interaction radius, best first.
    fn search_edibles(
        &self,
        id: AnimalId,
        species: &AnimalSpecies,
    ) -> Result<Vec<Edible>, AnimalError> {
        let predator = find(self.animals, id)?;
        let tables = species.tables(predator.growth.instar());
        let center = predator.position;
        let radius = predator.activity.interaction_radius;
        let mut edibles = Vec::new();

        for hit in self
            .tree
            .animals_on_radius(center, radius, self.depth, &tables.prey)
        {
            if hit.key == id {
                continue;
            }
            let Some(prey) = self.animals.get(&hit.key) else {
                continue;
            };
            if center.distance_to(prey.position) > radius {
                continue;
            }
            species.decisions.observe_prey_voracity(predator, prey);
            let dry_mass = prey.growth.dry_mass();
            let value =
                species
                    .decisions
                    .edibility_value(predator, Prey::Animal(prey), dry_mass, self.species);
            if value > 0.0 {
                edibles.push(Edible {
                    value,
                    target: EdibleTarget::Animal(hit.key),
                    dry_mass,
                });
            }
        }

        for hit in self
            .tree
            .resources_on_radius(center, radius, self.depth, &tables.resources)
        {
            if hit.available.value() <= 0.0 {
                continue;
            }
            let patch = ResourcePatch {
                class: PreyClass::resource(hit.species),
                area: self.tree.cell(hit.cell)?.area(),
            };
            let value = species.decisions.edibility_value(
                predator,
                Prey::Resource(patch),
                hit.available,
                self.species,
            );
            if value > 0.0 {
                edibles.push(Edible {
                    value,
                    target: EdibleTarget::Resource {
                        cell: hit.cell,
                        species: hit.species,
                    },
                    dry_mass: hit.available,
                });
            }
        }

        edibles.sort_by(|a, b| b.value.total_cmp(&a.value));
        Ok(edibles)
    }

    fn try_to_eat(
        &mut self,
        id: AnimalId,
        species: &AnimalSpecies,
        edible: Edible,
        tally: &mut ForagingTally,
    ) -> Result<(), AnimalError> {
        match edible.target {
            EdibleTarget::Animal(prey) => self.attack(id, prey, species, tally),
            EdibleTarget::Resource {
                cell,
                species: resource,
            } => self.graze(id, species, cell, resource, edible.dry_mass),
        }
    }

    /// One attack on an animal.
    ///
    /// The attack succeeds when a uniform draw falls below the kill
    /// probability times the predation probability.
    fn attack(
        &mut self,
        id: AnimalId,
        prey_id: AnimalId,
        species: &AnimalSpecies,
        tally: &mut ForagingTally,
    ) -> Result<(), AnimalError> {
        let predator = find(self.animals, id)?;
        let Some(prey) = self.animals.get(&prey_id) else {
            return Ok(());
        };
        if !prey.is_searchable() || predator.is_sated() {
            return Ok(());
        }
        self.species_of(prey)?
            .decisions
            .observe_predator_interaction_area(prey, predator);
        let probability =
            species
                .decisions
                .predation_probability(predator, Prey::Animal(prey), self.species);
        let prey_is_mobile = prey.is_mobile();

        let draw: f64 = self.rng.random();
        if draw < species.decisions.kill_probability() * probability {
            self.kill_and_eat(id, prey_id, probability, tally)
        } else if prey_is_mobile {
            self.retaliate(prey_id, id, tally)
        } else {
            Ok(())
        }
    }

    fn retaliate(
        &mut self,
        attacker_id: AnimalId,
        victim_id: AnimalId,
        tally: &mut ForagingTally,
    ) -> Result<(), AnimalError> {
        let attacker = find(self.animals, attacker_id)?;
        let victim = find(self.animals, victim_id)?;
        let species = self.species_of(attacker)?;
        let eats_victim = species
            .tables(attacker.growth.instar())
            .prey
            .accepts(victim.class());
        if !eats_victim || attacker.is_sated() {
            return Ok(());
        }
        let probability =
            species
                .decisions
                .predation_probability(attacker, Prey::Animal(victim), self.species);
        let draw: f64 = self.rng.random();
        if draw < species.decisions.kill_probability() * probability {
            debug!(prey = %attacker_id, predator = %victim_id, "Prey retaliated");
            tally.retaliations = tally.retaliations.saturating_add(1);
            self.kill_and_eat(attacker_id, victim_id, probability, tally)?;
        }
        Ok(())
    }

    /// The prey dies and the predator eats what it still wants of it.
    fn kill_and_eat(
        &mut self,
        predator_id: AnimalId,
        prey_id: AnimalId,
        probability: f64,
        tally: &mut ForagingTally,
    ) -> Result<(), AnimalError> {
        let prey = find_mut(self.animals, prey_id)?;
        let available = prey.growth.dry_mass();
        let class = PreyClass::animal(prey.species, prey.growth.instar());
        let prey_species = self
            .species
            .get(prey.species)
            .ok_or(AnimalError::UnknownSpecies {
                species: prey.species,
            })?;
        prey.set_life_stage(self.tree, LifeStage::Predated)?;

        let predator = find_mut(self.animals, predator_id)?;
        let food = predator.remaining_voracity().min(available);
        predator.ingest(class, food);
        predator.memory.add_predation_probability(probability);

        self.output.record_predation(&PredationRecord {
            time_step: self.time_step,
            predator: predator_id,
            prey: prey_id,
            prey_species: &prey_species.name,
            prey_instar: class.instar,
            food,
        });
        tally.predations = tally.predations.saturating_add(1);
        debug!(
            predator = %predator_id,
            prey = %prey_id,
            food = food.value(),
            "Predation"
        );
        Ok(())
    }

    /// Eat from a resource patch; resources never escape.
    fn graze(
        &mut self,
        id: AnimalId,
        species: &AnimalSpecies,
        cell: CellId,
        resource: ResourceSpeciesId,
        available: DryMass,
    ) -> Result<(), AnimalError> {
        let animal = find_mut(self.animals, id)?;
        let wanted = animal.remaining_voracity().min(available);
        if wanted.value() <= 0.0 {
            return Ok(());
        }
        let draw: f64 = self.rng.random();
        if draw >= species.decisions.kill_probability() {
            return Ok(());
        }
        let eaten = self.tree.subtract_resource(cell, resource, wanted)?;
        animal.ingest(PreyClass::resource(resource), eaten);
        animal.memory.add_predation_probability(1.0);
        Ok(())
    }

    /// Pair a mature animal with the first partner inside its interaction
    /// radius. The female stores a gamete of the male.
    fn search_partner(
        &mut self,
        id: AnimalId,
        species: &AnimalSpecies,
        tally: &mut ForagingTally,
    ) -> Result<(), AnimalError> {
        let animal = find(self.animals, id)?;
        if !animal.wants_partner(species) {
            return Ok(());
        }
        let gender = animal.growth.gender();
        let center = animal.position;
        let radius = animal.activity.interaction_radius;
        let partner = self
            .tree
            .animals_on_radius(center, radius, self.depth, species.mate_params(gender))
            .into_iter()
            .filter(|hit| hit.key != id)
            .filter_map(|hit| self.animals.get(&hit.key))
            .find(|other| {
                center.distance_to(other.position) <= radius
                    && (gender == Gender::Female || other.mate.is_none())
            })
            .map(Animal::id);
        let Some(partner) = partner else {
            return Ok(());
        };

        let (female, male) = if gender == Gender::Female {
            (id, partner)
        } else {
            (partner, id)
        };
        let gamete = find(self.animals, male)?.gamete(species, self.rng);
        find_mut(self.animals, female)?.mate_with(Mate { id: male, gamete });
        tally.matings = tally.matings.saturating_add(1);
        debug!(female = %female, male = %male, "Mated");
        Ok(())
    }

    /// Best leaf within `radius`, scored by perceived patch value.
    fn best_patch(
        &mut self,
        id: AnimalId,
        species: &AnimalSpecies,
        radius: f64,
        breeding: bool,
    ) -> Result<Option<CellId>, AnimalError> {
        let animal = find(self.animals, id)?;
        let instar = animal.instar_to_evaluate_cells();
        let tables = species.tables(animal.growth.instar());
        let mut assessed = Vec::new();

        for hit in self.tree.cells_on_radius(animal.position, radius, self.depth) {
            let cell = self.tree.cell(hit.cell)?;
            if !cell.is_leaf() {
                continue;
            }
            let mut raw = CellAssessment::default();
            for prey_hit in self.tree.animals_in(hit.cell, &tables.prey)? {
                let Some(prey) = self.animals.get(&prey_hit.key).filter(|p| p.id != id) else {
                    continue;
                };
                raw.edibility += species.decisions.cell_quality(
                    animal,
                    Prey::Animal(prey),
                    prey.growth.dry_mass(),
                    self.species,
                );
            }
            for resource in self.tree.resources_in(hit.cell, &tables.resources)? {
                let patch = ResourcePatch {
                    class: PreyClass::resource(resource.species),
                    area: cell.area(),
                };
                raw.edibility += species.decisions.cell_quality(
                    animal,
                    Prey::Resource(patch),
                    resource.available,
                    self.species,
                );
            }
            for predator_hit in self.tree.animals_in(hit.cell, &tables.predators)? {
                let Some(predator) = self.animals.get(&predator_hit.key).filter(|p| p.id != id)
                else {
                    continue;
                };
                raw.predation_risk += self.species_of(predator)?.decisions.predation_probability(
                    predator,
                    Prey::Animal(animal),
                    self.species,
                );
            }
            for (class, keys) in cell.animals() {
                if class.species != animal.species
                    || !SEARCHABLE_STAGES.contains(&class.life_stage)
                {
                    continue;
                }
                raw.conspecific_biomass += keys
                    .iter()
                    .filter(|key| **key != id)
                    .filter_map(|key| self.animals.get(key))
                    .map(|other| other.growth.dry_mass().value())
                    .sum::<f64>();
            }
            let in_habitat = species.is_habitat(self.tree, hit.cell, breeding);
            assessed.push((hit.cell, cell.area().center(), raw, in_habitat));
        }

        let maxima = species.decisions.maxima();
        let animal = find_mut(self.animals, id)?;
        for (_, _, raw, _) in &assessed {
            let patch = animal.memory.patch_maxima_mut();
            patch.observe(MaximumKind::PatchEdibility, raw.edibility, instar, maxima);
            patch.observe(MaximumKind::PatchPredationRisk, raw.predation_risk, instar, maxima);
            patch.observe(
                MaximumKind::PatchConspecificBiomass,
                raw.conspecific_biomass,
                instar,
                maxima,
            );
        }

        let patch = *animal.memory.patch_maxima();
        let weight = species.decisions.weight_individual_to_global_assessment();
        let blended = |kind| patch.blended(kind, instar, maxima, weight);
        let weights = CellValueWeights::from_genetics(&animal.genetics);
        let sensory = species.decisions.sensory();
        let position = animal.position;

        let mut best: Option<(CellId, CellScore)> = None;
        for (cell, centre, raw, in_habitat) in assessed {
            let normalized = CellAssessment {
                edibility: normalize(raw.edibility, blended(MaximumKind::PatchEdibility)),
                predation_risk: normalize(
                    raw.predation_risk,
                    blended(MaximumKind::PatchPredationRisk),
                ),
                conspecific_biomass: normalize(
                    raw.conspecific_biomass,
                    blended(MaximumKind::PatchConspecificBiomass),
                ),
            };
            let detection = sensory.probability(position.distance_to(centre), radius);
            let score = CellScore {
                in_habitat,
                value: normalized.perceived_value(weights, detection, self.rng),
            };
            if best
                .as_ref()
                .is_none_or(|(_, current)| score.compare(current).is_gt())
            {
                best = Some((cell, score));
            }
        }
        Ok(best.map(|(cell, _)| cell))
    }

    /// Instars that shift habitat jump to the best breeding patch within
    /// their widened scope before laying.
    fn shift_habitat(
        &mut self,
        id: AnimalId,
        species: &AnimalSpecies,
        tally: &mut ForagingTally,
    ) -> Result<(), AnimalError> {
        let radius =
            find(self.animals, id)?.activity.scope_radius * species.growth.habitat_shift_factor();
        let Some(cell) = self.best_patch(id, species, radius, true)? else {
            return Ok(());
        };
        let destination = self.tree.random_point_in(cell, self.rng)?;
        self.relocate(id, destination, tally)?;
        debug!(animal = %id, "Habitat shift");
        Ok(())
    }

    fn relocate(
        &mut self,
        id: AnimalId,
        destination: Point,
        tally: &mut ForagingTally,
    ) -> Result<(), AnimalError> {
        let animal = find_mut(self.animals, id)?;
        let start = animal.position;
        let end = self.tree.clamp_to_map(destination);
        animal.cell = self.tree.move_animal(animal.cell, id, animal.class(), end)?;
        animal.position = end;
        self.output.record_movement(id, self.time_step, start, end);
        tally.moves = tally.moves.saturating_add(1);
        Ok(())
    }

    /// One move of at most `speed` towards the current target.
    fn walk(
        &mut self,
        id: AnimalId,
        species: &AnimalSpecies,
        tally: &mut ForagingTally,
    ) -> Result<(), AnimalError> {
        let animal = find(self.animals, id)?;
        if animal.activity.target.is_none() {
            let radius = animal.activity.scope_radius;
            if let Some(cell) = self.best_patch(id, species, radius, false)? {
                let target = self.tree.random_point_in(cell, self.rng)?;
                let animal = find_mut(self.animals, id)?;
                animal.activity.target = Some(target);
                animal.memory.set_new_destination();
            }
        }

        let animal = find_mut(self.animals, id)?;
        let Some(target) = animal.activity.target else {
            animal.activity.exhausted = true;
            return Ok(());
        };
        let start = animal.position;
        let distance = start.distance_to(target);
        let left = (animal.activity.search_radius - animal.activity.steps).max(0.0);
        let step = animal.activity.speed.min(distance).min(left);
        if step <= 0.0 {
            if distance <= 0.0 {
                animal.activity.target = None;
            }
            animal.activity.exhausted = true;
            return Ok(());
        }
        let destination = if step >= distance {
            target
        } else {
            let share = step / distance;
            Point::new(
                start.x + (target.x - start.x) * share,
                start.y + (target.y - start.y) * share,
            )
        };

        animal.activity.steps += step;
        if step >= distance {
            animal.activity.target = None;
        }
        if animal.activity.steps >= animal.activity.search_radius {
            animal.activity.exhausted = true;
        }
        self.relocate(id, destination, tally)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use weaver_types::{Instar, SpeciesId};

    use super::*;
    use crate::fixtures;

    const SPIDER: SpeciesId = SpeciesId(0);
    const SPRINGTAIL: SpeciesId = SpeciesId(1);

    fn empty_state() -> SimulationState {
        let mut config = fixtures::config();
        for species in &mut config.species {
            species.initial_population.clear();
        }
        SimulationState::from_config(&config).unwrap()
    }

    fn ready(state: &mut SimulationState, species: SpeciesId, instar: u16, at: Point) -> AnimalId {
        let id = state.spawn(species, Instar::new(instar), at).unwrap();
        let animal = state.animals.get_mut(&id).unwrap();
        if animal.life_stage() != LifeStage::Active {
            animal
                .set_life_stage(&mut state.tree, LifeStage::Active)
                .unwrap();
        }
        state.tune_animal(id).unwrap();
        id
    }

    #[test]
    fn predator_eats_prey_in_reach() {
        let mut state = empty_state();
        let spider = ready(&mut state, SPIDER, 3, Point::new(0.0, 0.0));
        let prey = ready(&mut state, SPRINGTAIL, 1, Point::new(1.0, 0.0));
        let voracity = state.animals.get(&spider).unwrap().remaining_voracity();
        let prey_mass = state.animals.get(&prey).unwrap().growth().dry_mass();
        assert!(voracity.value() > 0.0);

        let mut tally = ForagingTally::default();
        state.forage(spider, &mut tally).unwrap();

        assert_eq!(tally.predations, 1);
        let prey = state.animals.get(&prey).unwrap();
        assert_eq!(prey.life_stage(), LifeStage::Predated);
        let eaten = state
            .animals
            .get(&spider)
            .unwrap()
            .ingestion()
            .total_eaten();
        let expected = voracity.min(prey_mass);
        assert!((eaten.value() - expected.value()).abs() < 1e-12);
        assert_eq!(state.output.predations().lines().count(), 1);
    }

    #[test]
    fn prey_out_of_reach_is_not_a_candidate() {
        let mut state = empty_state();
        let spider = ready(&mut state, SPIDER, 3, Point::new(0.5, 0.5));
        let _far = ready(&mut state, SPRINGTAIL, 1, Point::new(7.5, 7.5));
        let depth = state.tree.leaf_depth();
        let forager = Forager {
            species: &state.species,
            tree: &mut state.tree,
            animals: &mut state.animals,
            rng: &mut state.rng,
            output: &mut state.output,
            time_step: TimeStep::ZERO,
            depth,
        };
        let species = state.species.get(SPIDER).unwrap();
        let edibles = forager.search_edibles(spider, species).unwrap();
        assert!(edibles.is_empty());
    }

    #[test]
    fn hungry_predator_walks_within_its_search_radius() {
        let mut state = empty_state();
        let spider = ready(&mut state, SPIDER, 3, Point::new(4.0, 4.0));
        let start = state.animals.get(&spider).unwrap().position();

        let mut tally = ForagingTally::default();
        state.forage(spider, &mut tally).unwrap();

        let spider = state.animals.get(&spider).unwrap();
        let activity = spider.activity();
        assert!(tally.moves > 0);
        assert!(activity.exhausted);
        assert!(activity.steps <= activity.search_radius + 1e-9);
        assert!(start.distance_to(spider.position()) <= activity.search_radius + 1e-9);
        assert_eq!(spider.steps_without_food(), 1);
        assert_eq!(
            state.tree.leaf_at(spider.position()).unwrap(),
            spider.cell()
        );
    }

    #[test]
    fn immobile_grazer_eats_mould_in_place() {
        let mut state = empty_state();
        let springtail = ready(&mut state, SPRINGTAIL, 2, Point::new(3.5, 3.5));
        let start = state.animals.get(&springtail).unwrap().position();

        let mut tally = ForagingTally::default();
        state.forage(springtail, &mut tally).unwrap();

        let springtail = state.animals.get(&springtail).unwrap();
        assert_eq!(tally.moves, 0);
        assert_eq!(springtail.position(), start);
        assert!(springtail.ingestion().total_eaten().value() > 0.0);
        assert!(springtail.is_sated());
    }

    #[test]
    fn mature_female_mates_with_nearby_male() {
        let mut state = empty_state();
        let mut female = None;
        let mut male = None;
        for _ in 0..64 {
            let id = ready(&mut state, SPIDER, 4, Point::new(2.0, 2.0));
            match state.animals.get(&id).unwrap().growth().gender() {
                Gender::Female if female.is_none() => female = Some(id),
                Gender::Male if male.is_none() => male = Some(id),
                _ => {
                    let animal = state.animals.get_mut(&id).unwrap();
                    animal
                        .set_life_stage(&mut state.tree, LifeStage::Background)
                        .unwrap();
                }
            }
            if female.is_some() && male.is_some() {
                break;
            }
        }
        let (female, male) = (female.unwrap(), male.unwrap());

        let mut tally = ForagingTally::default();
        state.forage(female, &mut tally).unwrap();

        assert_eq!(tally.matings, 1);
        assert_eq!(state.animals.get(&female).unwrap().mate_id(), Some(male));
    }
}
