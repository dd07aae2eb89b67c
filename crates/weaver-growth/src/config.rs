//! Deserializable growth configuration of one animal species.

use serde::Deserialize;
use weaver_types::Temperature;

use crate::model::{GrowthModelKind, ModelChoice};

/// Species growth parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GrowthConfig {
    /// Wet mass of a reference adult female, used by the egg-mass equation.
    pub female_wet_mass: f64,

    /// Dry mass of a freshly laid egg.
    pub egg_dry_mass: EggDryMassConfig,

    /// Growth curve family, optionally switched by temperature.
    pub growth_model: GrowthModelConfig,

    /// First instar able to reproduce. Values below the last instar give
    /// indeterminate growth (adults keep moulting).
    pub instar_first_reproduction: u16,

    /// Reference age in days at which each instar starts; one entry per instar.
    pub age_vector: Vec<f64>,

    /// Dry-to-wet mass conversion factor of each instar.
    pub conversion_to_wet_mass: Vec<f64>,

    /// Upper relative deviation allowed for the egg mass of a female.
    #[serde(default = "default_plasticity")]
    pub max_plasticity_k_von_bertalanffy: f64,

    /// Lower relative deviation allowed for the egg mass of a female.
    #[serde(default = "default_plasticity")]
    pub min_plasticity_k_von_bertalanffy: f64,

    /// Allometric coefficient of immature mass on length.
    pub coefficient_for_mass_a: f64,

    /// Allometric exponent of immature mass on length.
    pub scale_for_mass_b: f64,

    /// Allometric coefficient of mature mass on length.
    pub coefficient_for_mass_a_for_mature: f64,

    /// Allometric exponent of mature mass on length.
    pub scale_for_mass_b_for_mature: f64,

    /// Exponent of the energy tank on dry mass.
    #[serde(default = "default_one")]
    pub beta_scale_tank: f64,

    /// Share of surplus investment that goes into body size rather than reserve.
    #[serde(default)]
    pub excess_invest_in_size: f64,

    /// Share of mass kept through a moult.
    #[serde(default = "default_one")]
    pub assigned_for_molt: f64,

    /// Relative delay after which a target age is met regardless of mass.
    #[serde(default = "default_molting_age_threshold")]
    pub molting_age_threshold: f64,

    /// Number of eggs in each clutch.
    pub eggs_per_batch: EggsPerBatchConfig,

    /// Maximum number of clutches a female lays in her life.
    pub female_max_reproduction_events: u32,

    /// Capital breeding parameters; absent for income breeders.
    #[serde(default)]
    pub capital_breeding: Option<CapitalBreedingConfig>,

    /// Instars that undergo a habitat shift.
    #[serde(default)]
    pub habitat_shift: Vec<u16>,

    /// Scope multiplier applied while shifting habitat.
    #[serde(default = "default_one")]
    pub habitat_shift_factor: f64,
}

fn default_plasticity() -> f64 {
    0.1
}

fn default_one() -> f64 {
    1.0
}

fn default_molting_age_threshold() -> f64 {
    0.5
}

/// Egg dry mass: fixed, or allometric on the reference female wet mass.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EggDryMassConfig {
    /// Fixed dry mass.
    Value {
        /// Dry mass in milligrams.
        value: f64,
    },
    /// `coefficient * femaleWetMass^scale`, a wet mass converted with the
    /// first instar's conversion factor.
    FromEquation {
        /// Allometric coefficient.
        coefficient: f64,
        /// Allometric exponent.
        scale: f64,
    },
}

/// Eggs per clutch: fixed, or linear on the mother's wet mass.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EggsPerBatchConfig {
    /// Fixed count.
    Value {
        /// Eggs per clutch.
        value: f64,
    },
    /// `intercept + slope * wetMass`.
    FromEquation {
        /// Intercept of the regression.
        intercept: f64,
        /// Slope of the regression.
        slope: f64,
    },
}

/// Stored-energy reproduction at a fixed interval.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CapitalBreedingConfig {
    /// Days between two capital clutches.
    pub time_of_reproduction_event: f64,
    /// Number of clutches funded from reserves before switching to income breeding.
    pub number_of_capital_breeds: u32,
}

/// Growth curve family at the lab temperature and its thermal switches.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GrowthModelConfig {
    /// Curve used at (and between the breakpoints around) the lab temperature.
    pub default_at_lab_temperature: ModelChoice,

    /// Curves replacing the default beyond a temperature breakpoint.
    #[serde(default)]
    pub thermal_changes: Vec<ThermalModelChange>,
}

impl Default for GrowthModelConfig {
    fn default() -> Self {
        Self {
            default_at_lab_temperature: ModelChoice::new(GrowthModelKind::VonBertalanffy),
            thermal_changes: Vec::new(),
        }
    }
}

/// A curve family that applies once the temperature passes a breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ThermalModelChange {
    /// Breakpoint in degrees Celsius.
    pub temperature: f64,
    /// Curve used beyond the breakpoint.
    #[serde(flatten)]
    pub choice: ModelChoice,
}

impl ThermalModelChange {
    /// Breakpoint as a temperature.
    pub const fn breakpoint(&self) -> Temperature {
        Temperature::from_celsius(self.temperature)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_growth_config() {
        let yaml = r"
female_wet_mass: 100.0
egg_dry_mass: { type: from_equation, coefficient: 0.01, scale: 0.75 }
growth_model:
  default_at_lab_temperature: { model: von_bertalanffy }
  thermal_changes:
    - { temperature: 10.0, model: linear }
    - { temperature: 30.0, model: logistic_4p, a: 0.1 }
instar_first_reproduction: 4
age_vector: [0.0, 5.0, 10.0, 20.0]
conversion_to_wet_mass: [3.0, 3.0, 3.0, 3.0]
coefficient_for_mass_a: 0.02
scale_for_mass_b: 2.8
coefficient_for_mass_a_for_mature: 0.02
scale_for_mass_b_for_mature: 2.8
eggs_per_batch: { type: value, value: 20.0 }
female_max_reproduction_events: 3
capital_breeding: { time_of_reproduction_event: 2.0, number_of_capital_breeds: 1 }
";
        let config: GrowthConfig = serde_yml::from_str(yaml).unwrap();
        assert_eq!(
            config.egg_dry_mass,
            EggDryMassConfig::FromEquation {
                coefficient: 0.01,
                scale: 0.75
            }
        );
        assert_eq!(config.growth_model.thermal_changes.len(), 2);
        assert_eq!(
            config.growth_model.thermal_changes.get(1).map(|c| c.choice.model),
            Some(GrowthModelKind::Logistic4P)
        );
        assert!((config.assigned_for_molt - 1.0).abs() < f64::EPSILON);
        assert!((config.molting_age_threshold - 0.5).abs() < f64::EPSILON);
        assert!(config.habitat_shift.is_empty());
        assert_eq!(
            config.capital_breeding.map(|c| c.number_of_capital_breeds),
            Some(1)
        );
    }
}
