//! Configuration loading and typed config structures for Weaver.
//!
//! A run is described by one YAML document: world timing, run bounds,
//! output switches, the landscape and every animal species. Each species
//! embeds the genetics, decisions and growth blocks of the lower crates
//! unchanged, so their defaults and validation apply as they are.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use weaver_decisions::{DecisionError, DecisionsConfig};
use weaver_genetics::{GeneticsConfig, GeneticsError};
use weaver_growth::{GrowthConfig, GrowthError};
use weaver_landscape::{LandscapeConfig, LandscapeError};
use weaver_types::{HuntingMode, SexualType};

/// Errors that can occur when loading configuration or assembling species.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A species genetics block is inconsistent.
    #[error("genetics configuration: {source}")]
    Genetics {
        /// The underlying genetics error.
        #[from]
        source: GeneticsError,
    },

    /// A species decisions block is inconsistent.
    #[error("decisions configuration: {source}")]
    Decisions {
        /// The underlying decisions error.
        #[from]
        source: DecisionError,
    },

    /// A species growth block is inconsistent.
    #[error("growth configuration: {source}")]
    Growth {
        /// The underlying growth error.
        #[from]
        source: GrowthError,
    },

    /// The landscape block is inconsistent.
    #[error("landscape configuration: {source}")]
    Landscape {
        /// The underlying landscape error.
        #[from]
        source: LandscapeError,
    },

    /// Cross-section validation failed.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Description of the inconsistency.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Seed, timing and laboratory temperature.
    #[serde(default)]
    pub world: WorldConfig,

    /// Run boundaries.
    #[serde(default)]
    pub simulation: SimulationBoundsConfig,

    /// Output files.
    #[serde(default)]
    pub output: OutputConfig,

    /// Map, moisture and resources.
    #[serde(default)]
    pub landscape: LandscapeConfig,

    /// Animal species, in the order their ids are assigned.
    #[serde(default)]
    pub species: Vec<AnimalSpeciesConfig>,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }
}

/// World-level settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorldConfig {
    /// Seed of the simulation random number generator.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Time steps that make up one day.
    #[serde(default = "default_time_steps_per_day")]
    pub time_steps_per_day: f64,

    /// Temperature (Celsius) at which constitutive trait values were measured.
    #[serde(default = "default_lab_temperature")]
    pub lab_temperature: f64,
}

const fn default_seed() -> u64 {
    42
}

const fn default_time_steps_per_day() -> f64 {
    1.0
}

const fn default_lab_temperature() -> f64 {
    20.0
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            time_steps_per_day: default_time_steps_per_day(),
            lab_temperature: default_lab_temperature(),
        }
    }
}

/// Simulation boundary parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationBoundsConfig {
    /// Maximum number of time steps (0 = unlimited).
    #[serde(default)]
    pub max_ticks: u64,

    /// Maximum wall-clock seconds (0 = unlimited).
    #[serde(default)]
    pub max_real_time_seconds: u64,
}

/// Output file settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    /// Directory the engine writes into.
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,

    /// Record one movement line per animal and step.
    #[serde(default = "default_true")]
    pub movements: bool,

    /// Record one line per successful predation.
    #[serde(default = "default_true")]
    pub predation: bool,

    /// Time steps between output flushes.
    #[serde(default = "default_flush_every")]
    pub flush_every: u64,
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("output")
}

const fn default_true() -> bool {
    true
}

const fn default_flush_every() -> u64 {
    10
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            movements: true,
            predation: true,
            flush_every: default_flush_every(),
        }
    }
}

/// One animal species.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnimalSpeciesConfig {
    /// Scientific name, unique among animal species.
    pub name: String,

    /// How offspring genomes are formed.
    #[serde(default = "default_sexual_type")]
    pub sexual_type: SexualType,

    /// Foraging strategy.
    #[serde(default = "default_hunting_mode")]
    pub hunting_mode: HuntingMode,

    /// Whether animals of the species move and can escape.
    #[serde(default = "default_true")]
    pub mobile: bool,

    /// Share of females among sexually produced offspring.
    #[serde(default = "default_female_proportion")]
    pub female_proportion: f64,

    /// Genome and trait definitions.
    pub genetics: GeneticsConfig,

    /// Decision weights and parameters.
    #[serde(default)]
    pub decisions: DecisionsConfig,

    /// Growth curve and reproduction parameters.
    pub growth: GrowthConfig,

    /// Metabolic parameters.
    #[serde(default)]
    pub metabolism: MetabolismConfig,

    /// Trophic links of the species as a predator.
    #[serde(default)]
    pub links: Vec<FeedingLinkConfig>,

    /// Individuals created at start, per instar.
    #[serde(default)]
    pub initial_population: Vec<u32>,

    /// Daily background death probability, per instar.
    #[serde(default)]
    pub background_mortality: Vec<f64>,

    /// Relative humidity below which each instar enters diapause.
    #[serde(default)]
    pub diapause_relative_humidity: Vec<f64>,

    /// Starving animals reset their reserve instead of dying.
    #[serde(default)]
    pub survive_without_food: bool,

    /// Resource species whose cells count as habitat when moving.
    #[serde(default)]
    pub habitat_domain: Vec<String>,

    /// Resource species whose cells count as habitat when breeding.
    #[serde(default)]
    pub breeding_domain: Vec<String>,
}

const fn default_sexual_type() -> SexualType {
    SexualType::Diploid
}

const fn default_hunting_mode() -> HuntingMode {
    HuntingMode::ActiveHunting
}

const fn default_female_proportion() -> f64 {
    0.5
}

/// Metabolic parameters of a species.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetabolismConfig {
    /// Field metabolic rate as a multiple of the basal rate.
    #[serde(default = "default_fmr_multiplier")]
    pub fmr_multiplier: f64,

    /// Days without food after which hunters downregulate their metabolism.
    #[serde(default = "default_days_without_food")]
    pub days_without_food_for_downregulation: f64,

    /// Share of the metabolic loss saved while downregulated.
    #[serde(default)]
    pub percentage_downregulation: f64,
}

const fn default_fmr_multiplier() -> f64 {
    3.0
}

const fn default_days_without_food() -> f64 {
    f64::INFINITY
}

impl Default for MetabolismConfig {
    fn default() -> Self {
        Self {
            fmr_multiplier: default_fmr_multiplier(),
            days_without_food_for_downregulation: default_days_without_food(),
            percentage_downregulation: 0.0,
        }
    }
}

/// One trophic link: a predator instar eating a prey (instar).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedingLinkConfig {
    /// Predator instar; every instar when absent.
    #[serde(default)]
    pub predator_instar: Option<u16>,

    /// Name of the prey, an animal or a resource species.
    pub prey: String,

    /// Prey instar; every instar when absent. Ignored for resources.
    #[serde(default)]
    pub prey_instar: Option<u16>,

    /// Innate preference for the prey.
    #[serde(default = "default_preference")]
    pub preference: f64,
}

const fn default_preference() -> f64 {
    1.0
}
