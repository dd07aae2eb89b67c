//! Versioned JSON checkpoints of a run.
//!
//! A snapshot holds the mutable state of a simulation at the end of a time
//! step: every animal's genome, realised traits, growth counters and
//! decision memory, every species' running maxima and the biomass of every
//! resource patch. The species, landscape and chromosome layouts are
//! rebuilt from the configuration, so a snapshot is only meaningful next to
//! the configuration that produced it.
//!
//! The schema is plain data, kept apart from the domain types. The random
//! generator is reseeded from the run seed and the time step on restore,
//! and the ingestion record of the last step is not kept.

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use tracing::info;
use weaver_decisions::{DecisionMemory, IngestionRecord, RunningMaximaSnapshot};
use weaver_genetics::Genetics;
use weaver_growth::{GrowthTraits, IndividualGrowth};
use weaver_landscape::{LandscapeError, ResourceBiomass};
use weaver_types::{AnimalId, LifeStage, Point, SpeciesId, TimeStep};

use crate::animal::{Activity, Animal, Lineage, Mate};
use crate::clock::{ClockError, SimulationClock};
use crate::config::SimulationConfig;
use crate::tick::{SimulationState, TickError};

/// Version of the snapshot schema written by this build.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Errors raised while writing or restoring a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The JSON document could not be written or read.
    #[error("snapshot serialization: {source}")]
    Json {
        /// The underlying serde error.
        #[from]
        source: serde_json::Error,
    },

    /// The snapshot was written by an incompatible schema.
    #[error("unsupported snapshot format {found}, expected {expected}")]
    Version {
        /// Version found in the document.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },

    /// The configuration could not be assembled.
    #[error("cannot rebuild the simulation: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },

    /// The stored time step is invalid for the configuration.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// An animal or a resource does not fit the rebuilt landscape.
    #[error("landscape error: {source}")]
    Landscape {
        /// The underlying landscape error.
        #[from]
        source: LandscapeError,
    },

    /// The snapshot and the configuration disagree on the species.
    #[error("snapshot has {found} species, configuration has {expected}")]
    SpeciesMismatch {
        /// Species in the configuration.
        expected: usize,
        /// Species in the snapshot.
        found: usize,
    },

    /// An animal names a species missing from the configuration.
    #[error("animal {id} belongs to unknown species {species}")]
    UnknownSpecies {
        /// The animal.
        id: AnimalId,
        /// Its species.
        species: SpeciesId,
    },
}

/// Persistent state of one animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalRecord {
    /// Identifier.
    pub id: AnimalId,
    /// Species.
    pub species: SpeciesId,
    /// Life stage.
    pub life_stage: LifeStage,
    /// Position.
    pub position: Point,
    /// Parents and generation.
    pub lineage: Lineage,
    /// Genome with constitutive and phenotypic trait values.
    pub genetics: Genetics,
    /// Growth-relevant trait values.
    pub traits: GrowthTraits,
    /// Growth and life-stage counters.
    pub growth: IndividualGrowth,
    /// Ring buffers, preferences and patch maxima.
    pub memory: DecisionMemory,
    /// Stored partner of a mated female.
    pub mate: Option<Mate>,
    /// Steps spent as an egg.
    pub unborn_steps: u32,
    /// Steps without a meal.
    pub steps_without_food: u32,
    /// Whether the animal has been tuned at least once.
    pub tuned: bool,
    /// Point the animal was walking to.
    pub target: Option<Point>,
}

impl From<&Animal> for AnimalRecord {
    fn from(animal: &Animal) -> Self {
        Self {
            id: animal.id,
            species: animal.species,
            life_stage: animal.life_stage,
            position: animal.position,
            lineage: animal.lineage,
            genetics: animal.genetics.clone(),
            traits: animal.traits,
            growth: animal.growth.clone(),
            memory: animal.memory.clone(),
            mate: animal.mate.clone(),
            unborn_steps: animal.unborn_steps,
            steps_without_food: animal.steps_without_food,
            tuned: animal.tuned,
            target: animal.activity.target,
        }
    }
}

/// Checkpoint of a whole simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    /// Schema version, [`SNAPSHOT_FORMAT_VERSION`] when written.
    pub format_version: u32,
    /// Wall-clock time of the capture.
    pub taken_at: DateTime<Utc>,
    /// Last completed time step.
    pub time_step: TimeStep,
    /// Seed of the run.
    pub seed: u64,
    /// Every animal still in the simulation.
    pub animals: Vec<AnimalRecord>,
    /// Running maxima per species, in species id order.
    pub maxima: Vec<RunningMaximaSnapshot>,
    /// Resource biomass per leaf.
    pub resources: Vec<ResourceBiomass>,
}

impl SimulationSnapshot {
    /// Capture the mutable state of `state`.
    pub fn capture(state: &SimulationState) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            taken_at: Utc::now(),
            time_step: state.clock.time_step(),
            seed: state.seed,
            animals: state.animals.values().map(AnimalRecord::from).collect(),
            maxima: state
                .species
                .iter()
                .map(|species| species.decisions.maxima().snapshot())
                .collect(),
            resources: state.tree.resource_biomass(),
        }
    }

    /// Rebuild a simulation from this snapshot and the configuration that
    /// produced it.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] for a foreign schema version, a
    /// configuration that does not match the snapshot, or an animal that
    /// does not fit the landscape.
    pub fn into_state(self, config: &SimulationConfig) -> Result<SimulationState, SnapshotError> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(SnapshotError::Version {
                found: self.format_version,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }
        let mut state = SimulationState::assemble(config)?;
        if self.maxima.len() != state.species.len() {
            return Err(SnapshotError::SpeciesMismatch {
                expected: state.species.len(),
                found: self.maxima.len(),
            });
        }

        state.clock =
            SimulationClock::from_parts(self.time_step, config.world.time_steps_per_day)?;
        state.seed = self.seed;
        state.rng = SmallRng::seed_from_u64(
            self.seed
                .wrapping_add(u64::from(self.time_step.value())),
        );
        for (index, maxima) in (0_u16..).zip(&self.maxima) {
            if let Some(species) = state.species.get_mut(SpeciesId(index)) {
                species.decisions.restore_maxima(maxima);
            }
        }
        state.tree.restore_resource_biomass(&self.resources)?;

        let restored = self.animals.len();
        for record in self.animals {
            let mobile = state
                .species
                .get(record.species)
                .ok_or(SnapshotError::UnknownSpecies {
                    id: record.id,
                    species: record.species,
                })?
                .mobile;
            let cell = state.tree.leaf_at(record.position)?;
            let animal = Animal {
                id: record.id,
                species: record.species,
                mobile,
                life_stage: record.life_stage,
                position: record.position,
                cell,
                lineage: record.lineage,
                genetics: record.genetics,
                traits: record.traits,
                growth: record.growth,
                memory: record.memory,
                ingestion: IngestionRecord::new(),
                mate: record.mate,
                unborn_steps: record.unborn_steps,
                steps_without_food: record.steps_without_food,
                tuned: record.tuned,
                activity: Activity {
                    target: record.target,
                    ..Activity::default()
                },
            };
            state
                .tree
                .insert_animal(animal.id, animal.class(), animal.position)?;
            state.animals.insert(animal.id, animal);
        }

        info!(
            time_step = self.time_step.value(),
            animals = restored,
            "Simulation restored from snapshot"
        );
        Ok(state)
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Json`] if a value cannot be serialized.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a snapshot from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Json`] for malformed input.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::tick::run_tick;

    fn advanced_state() -> SimulationState {
        let mut state = SimulationState::from_config(&fixtures::config()).unwrap();
        for _ in 0..3 {
            run_tick(&mut state).unwrap();
        }
        state
    }

    #[test]
    fn restore_keeps_animals_maxima_and_resources() {
        let config = fixtures::config();
        let state = advanced_state();
        let snapshot = SimulationSnapshot::capture(&state);
        let json = snapshot.to_json().unwrap();

        let restored = SimulationSnapshot::from_json(&json)
            .unwrap()
            .into_state(&config)
            .unwrap();

        assert_eq!(restored.clock.time_step(), state.clock.time_step());
        assert_eq!(restored.animals.len(), state.animals.len());
        assert_eq!(restored.tree.population(), state.animals.len());
        for (id, animal) in &state.animals {
            let copy = restored.animals.get(id).unwrap();
            assert_eq!(AnimalRecord::from(copy), AnimalRecord::from(animal));
            assert_eq!(copy.cell(), animal.cell());
        }
        assert_eq!(restored.tree.resource_biomass(), state.tree.resource_biomass());
        let maxima = |s: &SimulationState| -> Vec<RunningMaximaSnapshot> {
            s.species
                .iter()
                .map(|species| species.decisions.maxima().snapshot())
                .collect()
        };
        assert_eq!(maxima(&restored), maxima(&state));
    }

    #[test]
    fn restored_run_keeps_ticking() {
        let config = fixtures::config();
        let snapshot = SimulationSnapshot::capture(&advanced_state());
        let mut restored = snapshot.into_state(&config).unwrap();
        let summary = run_tick(&mut restored).unwrap();
        assert_eq!(summary.tick, 4);
    }

    #[test]
    fn foreign_version_is_rejected() {
        let mut snapshot = SimulationSnapshot::capture(&advanced_state());
        snapshot.format_version = 99;
        let error = snapshot.into_state(&fixtures::config()).unwrap_err();
        assert!(matches!(error, SnapshotError::Version { .. }));
    }

    #[test]
    fn species_mismatch_is_rejected() {
        let mut snapshot = SimulationSnapshot::capture(&advanced_state());
        snapshot.maxima.pop();
        let error = snapshot.into_state(&fixtures::config()).unwrap_err();
        assert!(matches!(error, SnapshotError::SpeciesMismatch { .. }));
    }
}
