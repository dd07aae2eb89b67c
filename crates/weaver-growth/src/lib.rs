//! Growth and life-stage bookkeeping for Weaver animals.
//!
//! A species carries one [`SpeciesGrowth`] block; each animal carries an
//! [`IndividualGrowth`] that fits its own [`GrowthCurve`] from its traits,
//! tracks body and reserve mass, and reports when moult and reproduction
//! targets are met.
//!
//! # Modules
//!
//! - [`config`] -- Deserializable species growth configuration
//! - [`error`] -- Growth error types
//! - [`model`] -- Length-at-age curve families
//! - [`species`] -- Validated species growth block
//! - [`individual`] -- Per-animal moult, pupa, diapause and reproduction state

pub mod config;
pub mod error;
pub mod individual;
pub mod model;
pub mod species;

pub use config::{
    CapitalBreedingConfig, EggDryMassConfig, EggsPerBatchConfig, GrowthConfig, GrowthModelConfig,
    ThermalModelChange,
};
pub use error::GrowthError;
pub use individual::{DiapauseStep, GrowthOutcome, GrowthTraits, IndividualGrowth};
pub use model::{GrowthCurve, GrowthModelKind, ModelChoice};
pub use species::{Allometry, CapitalBreeding, SpeciesGrowth};
