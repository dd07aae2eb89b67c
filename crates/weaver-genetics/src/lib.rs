//! Genome and trait engine for the Weaver simulator.
//!
//! A species owns its [`SpeciesGenetics`]: the locus pool, the mapping from
//! trait correlosomes onto chromosomes, and the definition of every trait.
//! Each animal owns one [`Genetics`]: its diploid [`Genome`] and the realised
//! [`IndividualTrait`] values derived from it, re-tuned against the ambient
//! temperature every time step.
//!
//! # Modules
//!
//! - [`config`] -- Deserializable genetics and trait configuration
//! - [`error`] -- Error type for genetics operations
//! - [`locus`] -- Alleles and the species locus pool
//! - [`genome`] -- Correlosomes, chromosome layout, meiosis and gametes
//! - [`thermal`] -- Pawar curve and temperature-size rule
//! - [`traits`] -- Trait type enumerations grouped by execution order
//! - [`individual_trait`] -- Constitutive and phenotypic value of one trait
//! - [`species`] -- Species-level trait definitions and genome factory
//! - [`genetics`] -- Per-animal realised traits and temperature tuning

pub mod config;
pub mod error;
pub mod genetics;
pub mod genome;
pub mod individual_trait;
pub mod locus;
pub mod species;
pub mod thermal;
pub mod traits;

pub use config::{
    AffectedTraitConfig, AlleleModificationConfig, GeneticsConfig, IndividualLevelConfig,
    LimitsConfig, ThermalConfig, TraitConfig, TraitDefinitionConfig, TraitElement, TraitsConfig,
};
pub use error::GeneticsError;
pub use genetics::{Genetics, MassCoefficients};
pub use genome::{ChromosomeLayout, Gamete, Genome, Homologues};
pub use individual_trait::IndividualTrait;
pub use locus::{Allele, Locus};
pub use species::{
    IndividualLevelRange, SpeciesGenetics, ThermalDefinition, TraitDefinition, ValueSource,
};
pub use thermal::{PawarCurve, TemperatureSizeRule};
pub use traits::{
    BaseTrait, CellValueTrait, EdibilityWeight, EscapeWeight, PdfParameter, PredationWeight,
    PreferenceTrait, TraitSlot,
};
