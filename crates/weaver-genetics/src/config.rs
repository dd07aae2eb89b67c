//! Deserializable genetics configuration.
//!
//! Trait maps are keyed by the trait names used in log lines (for example
//! `energy_tank` or `Pvelocity`). A base trait missing from the map is a
//! configuration error; a missing decision trait is treated as `null`, which
//! disables its weight slot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::traits::{
    BaseTrait, CellValueTrait, EdibilityWeight, EscapeWeight, PdfParameter, PredationWeight,
    PreferenceTrait,
};

/// Species genetics configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneticsConfig {
    /// Loci per trait correlosome (and per chromosome).
    #[serde(default = "default_loci_per_trait")]
    pub number_of_loci_per_trait: usize,

    /// Alleles in the species pool of every locus.
    #[serde(default = "default_alleles_per_locus")]
    pub number_of_alleles_per_locus: u16,

    /// Chiasmas per chromosome during meiosis; must be even.
    #[serde(default = "default_chiasmas")]
    pub number_of_chiasmas_per_chromosome: usize,

    /// Consecutive individual-level traits sharing one correlation module.
    #[serde(default = "default_traits_per_module")]
    pub traits_per_module: usize,

    /// Correlation coefficient of each module. Empty means uncorrelated.
    #[serde(default)]
    pub rho_per_module: Vec<f64>,

    /// Random genomes sampled to calibrate the pseudo-value ranges.
    #[serde(default = "default_calibration_genomes")]
    pub calibration_genomes: usize,

    /// Genomes tried before giving up on the restricted ranges.
    #[serde(default = "default_max_genome_attempts")]
    pub max_genome_attempts: usize,

    /// Deterministic edits of the locus pool.
    #[serde(default)]
    pub modify_alleles: Vec<AlleleModificationConfig>,

    /// Trait definitions grouped by execution order.
    #[serde(default)]
    pub traits: TraitsConfig,
}

impl Default for GeneticsConfig {
    fn default() -> Self {
        Self {
            number_of_loci_per_trait: default_loci_per_trait(),
            number_of_alleles_per_locus: default_alleles_per_locus(),
            number_of_chiasmas_per_chromosome: default_chiasmas(),
            traits_per_module: default_traits_per_module(),
            rho_per_module: Vec::new(),
            calibration_genomes: default_calibration_genomes(),
            max_genome_attempts: default_max_genome_attempts(),
            modify_alleles: Vec::new(),
            traits: TraitsConfig::default(),
        }
    }
}

const fn default_loci_per_trait() -> usize {
    30
}

const fn default_alleles_per_locus() -> u16 {
    10
}

const fn default_chiasmas() -> usize {
    2
}

const fn default_traits_per_module() -> usize {
    1
}

const fn default_calibration_genomes() -> usize {
    1000
}

const fn default_max_genome_attempts() -> usize {
    10_000
}

/// Scales one allele position of selected loci of selected traits.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlleleModificationConfig {
    /// Relative locus positions in `[0, 1]`, rounded onto `0..L`.
    pub affected_locus: Vec<f64>,
    /// Relative allele position in `[0, 1]`, rounded onto `0..alleles`.
    pub affected_alleles: f64,
    /// Factor applied to the allele value.
    pub times_alleles: f64,
    /// Traits affected, as `(trait name, element)` pairs.
    pub affected_traits: Vec<AffectedTraitConfig>,
}

/// Reference to one individual-level value of a trait.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AffectedTraitConfig {
    /// Trait name, e.g. `growth`.
    #[serde(rename = "trait")]
    pub trait_name: String,
    /// Which value of the trait.
    #[serde(default)]
    pub element: TraitElement,
}

/// The genome-derived values attached to one trait.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitElement {
    /// The trait value itself.
    #[default]
    Value,
    /// Pawar activation energy.
    ActivationEnergy,
    /// Pawar deactivation energy.
    EnergyDecay,
    /// Pawar optimal temperature.
    TemperatureOptimal,
}

/// Trait definitions, one map per execution order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TraitsConfig {
    /// Physiological traits; every trait must be present.
    #[serde(default)]
    pub base: BTreeMap<BaseTrait, TraitConfig>,
    /// Escape probability weights.
    #[serde(default)]
    pub escape_probability_weight: BTreeMap<EscapeWeight, TraitConfig>,
    /// Predation probability weights.
    #[serde(default)]
    pub predation_probability_weight: BTreeMap<PredationWeight, TraitConfig>,
    /// Edibility value weights.
    #[serde(default)]
    pub edibility_value_weight: BTreeMap<EdibilityWeight, TraitConfig>,
    /// Size-matching density parameters.
    #[serde(default)]
    pub probability_density_function: BTreeMap<PdfParameter, TraitConfig>,
    /// Patch value weights.
    #[serde(default)]
    pub cell_value: BTreeMap<CellValueTrait, TraitConfig>,
    /// Preference traits.
    #[serde(default)]
    pub preferences: BTreeMap<PreferenceTrait, TraitConfig>,
}

/// Definition of one trait and its optional thermal response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TraitConfig {
    /// How the value is obtained.
    pub definition: TraitDefinitionConfig,
    /// Temperature dependency; absent for thermally independent traits.
    #[serde(default)]
    pub temperature: Option<ThermalConfig>,
}

/// Source of a trait value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraitDefinitionConfig {
    /// The trait is disabled.
    Null,
    /// Every individual shares the same value.
    SpeciesLevel {
        /// The shared value.
        value: f64,
    },
    /// The value is derived from the individual's genome.
    IndividualLevel(IndividualLevelConfig),
}

/// Ranges of a genome-derived value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndividualLevelConfig {
    /// Lower bound of the trait range.
    pub min: f64,
    /// Upper bound of the trait range.
    pub max: f64,
    /// Fraction of the range trimmed (half on each side) to form the
    /// restricted range new genomes must fall into.
    #[serde(default)]
    pub restrict_value: f64,
    /// Relative widening of the range used as an outer clamp.
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Relative widening of a trait range.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LimitsConfig {
    /// Widening below `min`, relative to `|min|`.
    #[serde(default)]
    pub min: f64,
    /// Widening above `max`, relative to `|max|`.
    #[serde(default)]
    pub max: f64,
}

/// Temperature dependency of a trait.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ThermalConfig {
    /// Pawar unimodal curve with possibly genome-derived parameters.
    Pawar {
        /// Activation energy (eV).
        activation_energy: TraitDefinitionConfig,
        /// Deactivation energy (eV).
        energy_decay: TraitDefinitionConfig,
        /// Optimal temperature (degrees Celsius).
        temperature_optimal: TraitDefinitionConfig,
    },
    /// Temperature-size rule from adult dry masses at fixed temperatures.
    TemperatureSizeRule {
        /// `(temperature in degrees Celsius, dry mass)` points.
        points: Vec<(f64, f64)>,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_trait_definitions() {
        let yaml = r"
number_of_loci_per_trait: 12
rho_per_module: [0.5, -0.25]
traits:
  base:
    growth:
      definition:
        type: individual_level
        min: 0.1
        max: 0.3
        restrict_value: 0.2
        limits: { min: 0.5, max: 0.5 }
      temperature:
        model: pawar
        activation_energy: { type: species_level, value: 0.65 }
        energy_decay: { type: species_level, value: 3.0 }
        temperature_optimal: { type: species_level, value: 25.0 }
    energy_tank:
      definition: { type: species_level, value: 0.2 }
  predation_probability_weight:
    Ppdf:
      definition: { type: 'null' }
";
        let config: GeneticsConfig = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.number_of_loci_per_trait, 12);
        assert_eq!(config.number_of_alleles_per_locus, 10);
        assert_eq!(config.rho_per_module, vec![0.5, -0.25]);

        let growth = config.traits.base.get(&BaseTrait::Growth).unwrap();
        assert!(matches!(
            growth.definition,
            TraitDefinitionConfig::IndividualLevel(IndividualLevelConfig { min, .. }) if (min - 0.1).abs() < 1e-12
        ));
        assert!(matches!(growth.temperature, Some(ThermalConfig::Pawar { .. })));

        let ppdf = config
            .traits
            .predation_probability_weight
            .get(&PredationWeight::Ppdf)
            .unwrap();
        assert_eq!(ppdf.definition, TraitDefinitionConfig::Null);
    }

    #[test]
    fn parses_allele_modifications() {
        let yaml = r"
modify_alleles:
  - affected_locus: [0.0, 1.0]
    affected_alleles: 0.5
    times_alleles: 2.0
    affected_traits:
      - trait: growth
      - trait: devTime
        element: activation_energy
";
        let config: GeneticsConfig = serde_yml::from_str(yaml).unwrap();
        let modification = config.modify_alleles.first().unwrap();
        assert_eq!(modification.affected_traits.len(), 2);
        assert_eq!(
            modification.affected_traits.get(1).map(|t| t.element),
            Some(TraitElement::ActivationEnergy)
        );
    }
}
