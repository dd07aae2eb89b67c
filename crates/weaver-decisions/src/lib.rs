//! Decision-making for Weaver animals.
//!
//! Every decision an animal takes about another organism is scored by a
//! [`WeightedCombination`] of sub-probabilities whose weights are the
//! animal's own traits. The concrete scores are the escape probability, the
//! predation probability, the edibility value and the cell quality. Patch
//! choice combines them into a [`cell_value`] perceived through the
//! [`SensoryModel`].
//!
//! Sub-probabilities that cannot be evaluated return [`NotComputable`]. The
//! public scores map that outcome to a fixed default in one place.
//!
//! # Modules
//!
//! - [`actors`] -- Views of predators and prey the scores are evaluated on
//! - [`combination`] -- Additive or multiplicative weighted combination
//! - [`config`] -- Deserializable species decision configuration
//! - [`error`] -- Error types and the not-computable outcome
//! - [`sensory`] -- Distance decay of detection probability
//! - [`maxima`] -- Per-species running maxima used for normalisation
//! - [`probabilities`] -- Escape, predation, edibility and cell quality
//! - [`cell_value`] -- Patch value from food, risk and conspecifics
//! - [`memory`] -- Per-individual ring buffers and learned preferences
//! - [`species`] -- Species-level decision block

pub mod actors;
pub mod cell_value;
pub mod combination;
pub mod config;
pub mod error;
pub mod maxima;
pub mod memory;
pub mod probabilities;
pub mod sensory;
pub mod species;

pub use actors::{AnimalView, DecisionsLookup, Prey, PreyClass, ResourcePatch, SpeciesKey};
pub use cell_value::{CellAssessment, CellScore, CellValueWeights};
pub use combination::WeightedCombination;
pub use config::{
    DecisionsConfig, EdibilityValueConfig, EscapeProbabilityConfig, PredationProbabilityConfig,
    SensoryModelConfig,
};
pub use error::{DecisionError, NotComputable};
pub use maxima::{MaximumKind, RunningMaxima, RunningMaximaSnapshot};
pub use memory::{DecisionMemory, IngestionRecord, PatchMaxima, PreferenceEntry, RingBuffer};
pub use sensory::SensoryModel;
pub use species::SpeciesDecisions;
