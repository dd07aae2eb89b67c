//! Tick cycle: the phases of one simulation time step.
//!
//! Each tick runs through these phases:
//!
//! 1. **Environment** -- advance the clock, update moisture and regrow
//!    every resource patch.
//!
//! 2. **Activation** -- close the previous step of every living animal,
//!    hatch eggs, run pupa and diapause countdowns, senesce the old and
//!    retune traits to the cell temperature.
//!
//! 3. **Foraging** -- active animals search, eat, mate and walk one at a
//!    time in shuffled order.
//!
//! 4. **Actions** -- background mortality, digestion and metabolism, then
//!    moulting on the food of this step, laying and starvation.
//!
//! 5. **Sweep** -- dead animals leave the tree and the population.
//!
//! 6. **Summary** -- per-species population counts.
//!
//! Animals are processed sequentially, and later animals observe the
//! kills and running maxima of earlier ones in the same tick. The cycle is
//! deterministic for a given seed.
//!
//! A failure inside one animal's step never aborts the tick: it is logged
//! and the animal is removed as a background death.

use std::collections::BTreeMap;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};
use weaver_landscape::{LandscapeError, SpatialTree};
use weaver_types::{
    AnimalId, Day, Gender, Instar, LifeStage, Point, SexualType, SpeciesId, Temperature, TimeStep,
};

use crate::animal::{Animal, AnimalError, Lineage, Newborn};
use crate::clock::{ClockError, SimulationClock};
use crate::config::{ConfigError, SimulationConfig};
use crate::foraging::ForagingTally;
use crate::output::OutputBuffers;
use crate::species::SpeciesTable;

/// Errors that can occur during tick execution.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// Species could not be assembled.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: ConfigError,
    },

    /// The landscape could not be built or updated.
    #[error("landscape error: {source}")]
    Landscape {
        /// The underlying landscape error.
        #[from]
        source: LandscapeError,
    },

    /// A founder of the initial population could not be created.
    #[error("cannot seed species {species}: {source}")]
    Seed {
        /// Species of the founder.
        species: SpeciesId,
        /// The underlying animal error.
        source: AnimalError,
    },
}

/// Summary of a single tick's execution.
#[derive(Debug, Clone, PartialEq)]
pub struct TickSummary {
    /// The tick number that was executed.
    pub tick: u64,
    /// Simulated days elapsed at the end of the tick.
    pub day: Day,
    /// Living animals (eggs included) at the end of the tick.
    pub alive: u32,
    /// Eggs that hatched.
    pub hatched: u32,
    /// Eggs laid.
    pub births: u32,
    /// Successful attacks.
    pub predations: u32,
    /// Predators killed by their prey.
    pub retaliations: u32,
    /// Females that mated.
    pub matings: u32,
    /// Animals removed this tick, by cause of death.
    pub deaths: BTreeMap<LifeStage, u32>,
    /// Living animals per species.
    pub populations: BTreeMap<SpeciesId, u32>,
    /// Change of resource wet biomass during the environment phase.
    pub resource_change: f64,
}

/// The mutable simulation state passed through the tick cycle.
#[derive(Debug, Clone)]
pub struct SimulationState {
    /// The simulation clock.
    pub clock: SimulationClock,
    /// Temperature at which constitutive trait values were measured.
    pub lab_temperature: Temperature,
    /// Animal species of the run.
    pub species: SpeciesTable,
    /// Terrain cells, resources and the animal index.
    pub tree: SpatialTree<AnimalId>,
    /// Every animal still in the simulation, keyed by id.
    pub animals: BTreeMap<AnimalId, Animal>,
    /// The run's random number generator.
    pub rng: SmallRng,
    /// Movement and predation logs awaiting a flush.
    pub output: OutputBuffers,
    /// Seed the run was started with.
    pub seed: u64,
}

/// Counters collected while the phases run.
#[derive(Debug, Default)]
struct PhaseCounters {
    hatched: u32,
    births: u32,
    foraging: ForagingTally,
}

impl SimulationState {
    /// Build the landscape and species of `config` and seed the initial
    /// populations at random points.
    ///
    /// # Errors
    ///
    /// Returns a [`TickError`] if the configuration cannot be assembled or a
    /// founder cannot be created.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, TickError> {
        let mut state = Self::assemble(config)?;
        state.seed_populations()?;
        info!(
            seed = state.seed,
            species = state.species.len(),
            animals = state.animals.len(),
            "Simulation state initialised"
        );
        Ok(state)
    }

    /// Landscape and species without any animal.
    ///
    /// Species are assembled from a generator seeded with the run seed, so
    /// repeated calls produce identical chromosome layouts.
    ///
    /// # Errors
    ///
    /// Returns a [`TickError`] if the configuration cannot be assembled.
    pub fn assemble(config: &SimulationConfig) -> Result<Self, TickError> {
        let seed = config.world.seed;
        let mut rng = SmallRng::seed_from_u64(seed);
        let clock = SimulationClock::new(config.world.time_steps_per_day)?;
        let tree = SpatialTree::new(&config.landscape, config.world.time_steps_per_day)?;
        let lab_temperature = Temperature::from_celsius(config.world.lab_temperature);
        let species = SpeciesTable::from_config(
            &config.species,
            tree.resource_species(),
            lab_temperature,
            &mut rng,
        )?;
        Ok(Self {
            clock,
            lab_temperature,
            species,
            tree,
            animals: BTreeMap::new(),
            rng,
            output: OutputBuffers::new(&config.output),
            seed,
        })
    }

    fn seed_populations(&mut self) -> Result<(), TickError> {
        let founders: Vec<(SpeciesId, Instar, u32)> = self
            .species
            .iter()
            .flat_map(|species| {
                species
                    .initial_population()
                    .map(move |(instar, count)| (species.id, instar, count))
            })
            .collect();
        for (species, instar, count) in founders {
            for _ in 0..count {
                let position = self.tree.random_point(&mut self.rng);
                self.spawn(species, instar, position)
                    .map_err(|source| TickError::Seed { species, source })?;
            }
        }
        Ok(())
    }

    /// Create a founder of `species` at `instar` with a random genome.
    ///
    /// # Errors
    ///
    /// Returns an [`AnimalError`] for an unknown species, a point off the
    /// map, or a genome that cannot be drawn or grown.
    pub fn spawn(
        &mut self,
        species_id: SpeciesId,
        instar: Instar,
        position: Point,
    ) -> Result<AnimalId, AnimalError> {
        let species = self
            .species
            .get(species_id)
            .ok_or(AnimalError::UnknownSpecies {
                species: species_id,
            })?;
        let (genetics, discarded) = species.genetics.random_genetics(&mut self.rng)?;
        let gender = if species.sexual_type == SexualType::Asexual {
            Gender::Female
        } else {
            Animal::draw_gender(species, &mut self.rng)
        };
        let cell = self.tree.leaf_at(position)?;
        let temperature = self.tree.moisture_at(cell)?.temperature;
        let id = AnimalId::from_rng(&mut self.rng);
        let mut animal = Animal::new(
            species,
            Newborn {
                id,
                genetics,
                gender,
                position,
                cell,
                lineage: Lineage::default(),
                life_stage: LifeStage::Active,
            },
            temperature,
            self.clock.time_steps_per_day(),
        )?;
        animal.initialise_at_instar(species, instar, &mut self.rng)?;
        self.tree.insert_animal(id, animal.class(), position)?;
        debug!(
            animal = %id,
            species = %species_id,
            %instar,
            stage = %animal.life_stage(),
            discarded,
            "Founder spawned"
        );
        self.animals.insert(id, animal);
        Ok(id)
    }

    /// Retune one animal to the conditions of its cell.
    ///
    /// # Errors
    ///
    /// Returns an [`AnimalError`] if the animal or its species is unknown,
    /// or tuning fails.
    pub fn tune_animal(&mut self, id: AnimalId) -> Result<(), AnimalError> {
        let animal = self
            .animals
            .get_mut(&id)
            .ok_or(AnimalError::UnknownAnimal { id })?;
        let species = self
            .species
            .get(animal.species)
            .ok_or(AnimalError::UnknownSpecies {
                species: animal.species,
            })?;
        let moisture = self.tree.moisture_at(animal.cell)?;
        animal.tune(
            species,
            &mut self.tree,
            moisture,
            self.lab_temperature,
            self.clock.time_step(),
            self.clock.time_steps_per_day(),
        )
    }

    /// Living animals, eggs included.
    pub fn alive(&self) -> usize {
        self.animals
            .values()
            .filter(|animal| animal.life_stage().is_alive())
            .count()
    }

    /// Living animals per species.
    pub fn populations(&self) -> BTreeMap<SpeciesId, u32> {
        let mut populations: BTreeMap<SpeciesId, u32> =
            self.species.iter().map(|species| (species.id, 0)).collect();
        for animal in self.animals.values() {
            if animal.life_stage().is_alive() {
                let count = populations.entry(animal.species).or_insert(0);
                *count = count.saturating_add(1);
            }
        }
        populations
    }

    /// Log a failed animal step and remove the animal as a background death.
    fn discard(&mut self, id: AnimalId, error: &AnimalError) {
        warn!(animal = %id, %error, "Animal step failed, removing animal");
        let Some(animal) = self.animals.get_mut(&id) else {
            return;
        };
        if animal
            .set_life_stage(&mut self.tree, LifeStage::Background)
            .is_ok()
        {
            return;
        }
        // The tree lost track of the animal's class: drop whatever it still
        // holds and file the animal again so the sweep finds it.
        let evicted = self.tree.evict_animal(id);
        animal.life_stage = LifeStage::Background;
        match self.tree.insert_animal(id, animal.class(), animal.position) {
            Ok(cell) => animal.cell = cell,
            Err(error) => {
                warn!(animal = %id, %error, evicted, "Could not refile discarded animal");
            }
        }
    }

    /// Phase 2 for one animal. Returns whether an egg hatched.
    fn activate(&mut self, id: AnimalId, time_step: TimeStep) -> Result<bool, AnimalError> {
        let time_steps_per_day = self.clock.time_steps_per_day();
        let animal = self
            .animals
            .get_mut(&id)
            .ok_or(AnimalError::UnknownAnimal { id })?;
        if animal.life_stage.is_dead() {
            return Ok(false);
        }
        let species = self
            .species
            .get(animal.species)
            .ok_or(AnimalError::UnknownSpecies {
                species: animal.species,
            })?;
        let was_unborn = animal.life_stage == LifeStage::Unborn;

        animal.reset_step(species);
        animal.advance_life(species, &mut self.tree, time_steps_per_day)?;
        let hatched = was_unborn && animal.life_stage != LifeStage::Unborn;
        if animal.life_stage.is_dead() || animal.life_stage == LifeStage::Unborn {
            return Ok(hatched);
        }

        let moisture = self.tree.moisture_at(animal.cell)?;
        animal.tune(
            species,
            &mut self.tree,
            moisture,
            self.lab_temperature,
            time_step,
            time_steps_per_day,
        )?;
        Ok(hatched)
    }

    /// Phase 4 for one animal. Returns the number of eggs laid.
    fn act(&mut self, id: AnimalId) -> Result<u32, AnimalError> {
        let time_steps_per_day = self.clock.time_steps_per_day();
        let animal = self
            .animals
            .get_mut(&id)
            .ok_or(AnimalError::UnknownAnimal { id })?;
        if animal.life_stage.is_dead() {
            return Ok(0);
        }
        let species = self
            .species
            .get(animal.species)
            .ok_or(AnimalError::UnknownSpecies {
                species: animal.species,
            })?;

        if animal.life_stage == LifeStage::Active {
            let mortality =
                species.background_mortality_per_step(animal.growth.instar(), time_steps_per_day);
            if self.rng.random::<f64>() < mortality {
                animal.set_life_stage(&mut self.tree, LifeStage::Background)?;
                debug!(animal = %id, "Background death");
                return Ok(0);
            }
        }

        animal.digest();
        if !matches!(
            animal.life_stage,
            LifeStage::Active | LifeStage::Reproducing
        ) {
            return Ok(0);
        }
        let temperature = self.tree.moisture_at(animal.cell)?.temperature;
        animal.metabolize(species, temperature, time_steps_per_day);
        if animal.life_stage == LifeStage::Active {
            animal.grow(species, &mut self.tree)?;
        }

        let mut laid: u32 = 0;
        if animal.life_stage == LifeStage::Reproducing {
            let clutch = animal.breed(species, &mut self.tree, &mut self.rng)?;
            let position = animal.position;
            let cell = animal.cell;
            let lineage = animal.lineage;
            for offspring in clutch {
                let child = Animal::new(
                    species,
                    Newborn {
                        id: AnimalId::from_rng(&mut self.rng),
                        genetics: offspring.genetics,
                        gender: offspring.gender,
                        position,
                        cell,
                        lineage: Lineage {
                            mother: Some(id),
                            father: offspring.father,
                            generation: lineage.generation.saturating_add(1),
                        },
                        life_stage: LifeStage::Unborn,
                    },
                    temperature,
                    time_steps_per_day,
                )?;
                self.tree.insert_animal(child.id, child.class(), position)?;
                self.animals.insert(child.id, child);
                laid = laid.saturating_add(1);
            }
        }

        let animal = self
            .animals
            .get_mut(&id)
            .ok_or(AnimalError::UnknownAnimal { id })?;
        if animal.check_energy_tank(species, &mut self.tree)? {
            debug!(animal = %id, "Starved");
        }
        Ok(laid)
    }

    /// Phase 5: drop dead animals from the tree and the population.
    fn sweep(&mut self) -> BTreeMap<LifeStage, u32> {
        let dead: Vec<AnimalId> = self
            .animals
            .iter()
            .filter(|(_, animal)| animal.life_stage.is_dead())
            .map(|(id, _)| *id)
            .collect();
        let mut deaths = BTreeMap::new();
        for id in dead {
            let Some(animal) = self.animals.remove(&id) else {
                continue;
            };
            if let Err(error) = self.tree.remove_animal(animal.cell, id, animal.class()) {
                warn!(animal = %id, %error, "Dead animal missing from the tree");
            }
            let count = deaths.entry(animal.life_stage).or_insert(0_u32);
            *count = count.saturating_add(1);
        }
        deaths
    }
}

/// Execute one complete tick of the simulation.
///
/// Runs the six phases in sequence and returns a summary of what happened.
///
/// # Errors
///
/// Returns [`TickError::Clock`] if the clock cannot advance. Failures of
/// single animals are logged and do not abort the tick.
pub fn run_tick(state: &mut SimulationState) -> Result<TickSummary, TickError> {
    // --- Phase 1: Environment ---
    let time_step = state.clock.advance()?;
    let resource_change = state.tree.update(time_step);
    let tick = state.clock.tick();
    info!(tick, animals = state.animals.len(), "Tick started");

    let mut counters = PhaseCounters::default();
    let ids: Vec<AnimalId> = state.animals.keys().copied().collect();

    // --- Phase 2: Activation ---
    for &id in &ids {
        match state.activate(id, time_step) {
            Ok(true) => counters.hatched = counters.hatched.saturating_add(1),
            Ok(false) => {}
            Err(error) => state.discard(id, &error),
        }
    }

    // --- Phase 3: Foraging ---
    let mut foragers: Vec<AnimalId> = ids
        .iter()
        .copied()
        .filter(|id| {
            state
                .animals
                .get(id)
                .is_some_and(|animal| animal.is_searchable())
        })
        .collect();
    foragers.shuffle(&mut state.rng);
    for id in foragers {
        if let Err(error) = state.forage(id, &mut counters.foraging) {
            state.discard(id, &error);
        }
    }

    // --- Phase 4: Actions ---
    for &id in &ids {
        match state.act(id) {
            Ok(laid) => counters.births = counters.births.saturating_add(laid),
            Err(error) => state.discard(id, &error),
        }
    }

    // --- Phase 5: Sweep ---
    let deaths = state.sweep();

    // --- Phase 6: Summary ---
    let alive = u32::try_from(state.alive()).unwrap_or(u32::MAX);
    let summary = TickSummary {
        tick,
        day: state.clock.day(),
        alive,
        hatched: counters.hatched,
        births: counters.births,
        predations: counters.foraging.predations,
        retaliations: counters.foraging.retaliations,
        matings: counters.foraging.matings,
        deaths,
        populations: state.populations(),
        resource_change,
    };
    debug!(
        tick,
        alive,
        births = summary.births,
        predations = summary.predations,
        deaths = ?summary.deaths,
        "Tick completed"
    );
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use weaver_decisions::PreyClass;
    use weaver_landscape::AnimalClass;

    use super::*;
    use crate::fixtures;

    #[test]
    fn from_config_seeds_initial_populations() {
        let state = SimulationState::from_config(&fixtures::config()).unwrap();
        assert_eq!(state.animals.len(), 19);
        assert_eq!(state.tree.population(), 19);
        let populations = state.populations();
        assert_eq!(populations.get(&SpeciesId(0)), Some(&4));
        assert_eq!(populations.get(&SpeciesId(1)), Some(&15));
    }

    #[test]
    fn tick_advances_clock_and_reports() {
        let mut state = SimulationState::from_config(&fixtures::config()).unwrap();
        let summary = run_tick(&mut state).unwrap();
        assert_eq!(summary.tick, 1);
        assert_eq!(state.clock.tick(), 1);
        let populated: u32 = summary.populations.values().sum();
        assert_eq!(populated, summary.alive);
        let died: u32 = summary.deaths.values().sum();
        assert_eq!(
            u32::try_from(state.animals.len()).unwrap(),
            19 + summary.births - died
        );
    }

    #[test]
    fn dead_animals_leave_the_tree() {
        let mut state = SimulationState::from_config(&fixtures::config()).unwrap();
        for _ in 0..10 {
            run_tick(&mut state).unwrap();
            assert!(state.animals.values().all(|a| a.life_stage().is_alive()));
            assert_eq!(state.tree.population(), state.animals.len());
        }
    }

    #[test]
    fn seeded_runs_are_deterministic() {
        let config = fixtures::config();
        let mut first = SimulationState::from_config(&config).unwrap();
        let mut second = SimulationState::from_config(&config).unwrap();
        for _ in 0..5 {
            let a = run_tick(&mut first).unwrap();
            let b = run_tick(&mut second).unwrap();
            assert_eq!(a, b);
        }
        let positions = |state: &SimulationState| -> Vec<(AnimalId, f64, f64)> {
            state
                .animals
                .values()
                .map(|a| (a.id(), a.position.x, a.position.y))
                .collect()
        };
        assert_eq!(positions(&first), positions(&second));
    }

    #[test]
    fn failed_animal_is_discarded_as_background_death() {
        let mut state = SimulationState::from_config(&fixtures::config()).unwrap();
        let id = *state.animals.keys().next().unwrap();
        state.discard(id, &AnimalError::UnknownAnimal { id });
        assert_eq!(
            state.animals.get(&id).unwrap().life_stage(),
            LifeStage::Background
        );
        let deaths = state.sweep();
        assert_eq!(deaths.get(&LifeStage::Background), Some(&1));
        assert!(!state.animals.contains_key(&id));
    }

    #[test]
    fn meal_past_the_moult_threshold_moults_in_the_same_step() {
        let mut config = fixtures::config();
        for species in &mut config.species {
            species.initial_population.clear();
        }
        let mut state = SimulationState::from_config(&config).unwrap();
        let id = state
            .spawn(SpeciesId(0), Instar::new(2), Point::new(4.0, 4.0))
            .unwrap();
        state.tune_animal(id).unwrap();

        let next = Instar::new(3);
        let animal = state.animals.get_mut(&id).unwrap();
        while animal.growth.age() < animal.growth.instar_age(next) {
            animal.growth.advance_age();
        }
        let target = animal.growth.instar_mass(next);
        assert!(animal.growth.dry_mass() < target);
        assert!(animal.growth.age() < animal.growth.instar_age(next).scaled(1.5));
        let meal = target.minus(animal.growth.dry_mass()).scaled(4.0);
        animal.ingest(PreyClass::animal(SpeciesId(1), Instar::FIRST), meal);

        assert_eq!(state.act(id).unwrap(), 0);
        let animal = state.animals.get(&id).unwrap();
        assert_eq!(animal.growth().instar(), next);
        assert_eq!(animal.life_stage(), LifeStage::Active);
        assert_eq!(state.tree.population(), 1);
        assert_eq!(state.tree.total_active(), 1);
    }

    #[test]
    fn discard_with_a_stale_class_leaves_no_key_behind() {
        let mut state = SimulationState::from_config(&fixtures::config()).unwrap();
        let id = *state.animals.keys().next().unwrap();
        let animal = state.animals.get(&id).unwrap();
        let (cell, class) = (animal.cell(), animal.class());
        let stale = AnimalClass {
            life_stage: LifeStage::Pupa,
            ..class
        };
        state.tree.reclassify(cell, id, class, stale).unwrap();
        let active = state.tree.total_active();

        state.discard(id, &AnimalError::UnknownAnimal { id });
        assert_eq!(
            state.animals.get(&id).unwrap().life_stage(),
            LifeStage::Background
        );
        assert_eq!(state.tree.population(), state.animals.len());
        let deaths = state.sweep();
        assert_eq!(deaths.get(&LifeStage::Background), Some(&1));
        assert_eq!(state.tree.population(), state.animals.len());
        assert_eq!(state.tree.total_active(), active);
        assert_eq!(state.tree.evict_animal(id), 0);
    }
}
