//! Species-level growth block shared by every individual of a species.

use serde::{Deserialize, Serialize};
use tracing::debug;
use weaver_types::{Day, DryMass, Instar, Length, Temperature, WetMass};

use crate::config::{EggDryMassConfig, EggsPerBatchConfig, GrowthConfig};
use crate::error::GrowthError;
use crate::model::ModelChoice;

/// Allometric relation `mass = coefficient * length^scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Allometry {
    /// Coefficient.
    pub coefficient: f64,
    /// Exponent.
    pub scale: f64,
}

impl Allometry {
    /// Dry mass of an animal of the given length.
    pub fn mass(self, length: Length) -> DryMass {
        DryMass::from_length(length, self.coefficient, self.scale)
    }

    /// Length of an animal of the given dry mass.
    pub fn length(self, mass: DryMass) -> Length {
        Length::from_dry_mass(mass, self.coefficient, self.scale)
    }
}

/// Capital breeding parameters after validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapitalBreeding {
    /// Days between two capital clutches.
    pub interval: Day,
    /// Clutches funded from reserves.
    pub breeds: u32,
}

/// Validated growth parameters of one species.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesGrowth {
    config: GrowthConfig,
    egg_dry_mass: DryMass,
    /// Breakpoints below the lab temperature, warmest first.
    lower_models: Vec<(Temperature, ModelChoice)>,
    /// Breakpoints at or above the lab temperature, coldest first.
    upper_models: Vec<(Temperature, ModelChoice)>,
    lab_temperature: Temperature,
    capital_breeding: Option<CapitalBreeding>,
}

fn invalid(reason: impl Into<String>) -> GrowthError {
    GrowthError::InvalidConfig {
        reason: reason.into(),
    }
}

impl SpeciesGrowth {
    /// Validates a configuration and derives the species egg mass.
    ///
    /// # Errors
    ///
    /// Returns [`GrowthError::InvalidConfig`] when per-instar vectors are
    /// empty or of different lengths, ages decrease, the first reproduction
    /// instar is out of range, or a scalar lies outside its domain.
    pub fn from_config(
        config: GrowthConfig,
        lab_temperature: Temperature,
    ) -> Result<Self, GrowthError> {
        let instars = config.age_vector.len();
        if instars == 0 {
            return Err(invalid("age_vector is empty"));
        }
        if config.conversion_to_wet_mass.len() != instars {
            return Err(invalid(format!(
                "conversion_to_wet_mass has {} entries for {instars} instars",
                config.conversion_to_wet_mass.len()
            )));
        }
        if config.conversion_to_wet_mass.iter().any(|c| *c <= 0.0) {
            return Err(invalid("conversion_to_wet_mass must be positive"));
        }
        if config.age_vector.windows(2).any(|w| matches!(w, [a, b] if b < a)) {
            return Err(invalid("age_vector must be non-decreasing"));
        }
        if config.age_vector.last().is_none_or(|last| *last <= 0.0) {
            return Err(invalid("the last instar must start after birth"));
        }
        if config.instar_first_reproduction == 0
            || usize::from(config.instar_first_reproduction) > instars
        {
            return Err(invalid(format!(
                "instar_first_reproduction {} outside 1..={instars}",
                config.instar_first_reproduction
            )));
        }
        if config.assigned_for_molt <= 0.0 {
            return Err(invalid("assigned_for_molt must be positive"));
        }
        if !(0.0..=1.0).contains(&config.excess_invest_in_size) {
            return Err(invalid("excess_invest_in_size must lie in [0, 1]"));
        }
        if config.molting_age_threshold < 0.0 {
            return Err(invalid("molting_age_threshold must be non-negative"));
        }
        if config.female_max_reproduction_events == 0 {
            return Err(invalid("female_max_reproduction_events must be positive"));
        }
        if let Some(shift) = config
            .habitat_shift
            .iter()
            .find(|i| **i == 0 || usize::from(**i) > instars)
        {
            return Err(invalid(format!("habitat_shift instar {shift} outside 1..={instars}")));
        }
        let capital_breeding = match config.capital_breeding {
            Some(capital) => {
                if capital.number_of_capital_breeds == 0
                    || capital.number_of_capital_breeds > config.female_max_reproduction_events
                {
                    return Err(invalid(format!(
                        "number_of_capital_breeds {} outside 1..={}",
                        capital.number_of_capital_breeds, config.female_max_reproduction_events
                    )));
                }
                if capital.time_of_reproduction_event < 0.0 {
                    return Err(invalid("time_of_reproduction_event must be non-negative"));
                }
                Some(CapitalBreeding {
                    interval: Day::new(capital.time_of_reproduction_event),
                    breeds: capital.number_of_capital_breeds,
                })
            }
            None => None,
        };

        let first_conversion = config.conversion_to_wet_mass.first().copied().unwrap_or(1.0);
        let egg_dry_mass = match config.egg_dry_mass {
            EggDryMassConfig::Value { value } => DryMass::new(value),
            EggDryMassConfig::FromEquation { coefficient, scale } => DryMass::from_wet(
                WetMass::new(coefficient * config.female_wet_mass.powf(scale)),
                first_conversion,
            ),
        };
        if egg_dry_mass.value() <= 0.0 || !egg_dry_mass.value().is_finite() {
            return Err(invalid(format!(
                "egg dry mass must be positive, got {}",
                egg_dry_mass.value()
            )));
        }

        let (mut lower_models, mut upper_models): (Vec<_>, Vec<_>) = config
            .growth_model
            .thermal_changes
            .iter()
            .map(|change| (change.breakpoint(), change.choice))
            .partition(|(t, _)| t.celsius() < lab_temperature.celsius());
        lower_models.sort_by(|a, b| b.0.celsius().total_cmp(&a.0.celsius()));
        upper_models.sort_by(|a, b| a.0.celsius().total_cmp(&b.0.celsius()));

        debug!(
            instars,
            egg_dry_mass = egg_dry_mass.value(),
            thermal_switches = lower_models.len() + upper_models.len(),
            "species growth configured"
        );

        Ok(Self {
            config,
            egg_dry_mass,
            lower_models,
            upper_models,
            lab_temperature,
            capital_breeding,
        })
    }

    /// The configuration this block was built from.
    pub const fn config(&self) -> &GrowthConfig {
        &self.config
    }

    /// Number of instars.
    pub fn instars(&self) -> usize {
        self.config.age_vector.len()
    }

    /// The last instar.
    pub fn last_instar(&self) -> Instar {
        Instar::from_index(self.instars().saturating_sub(1))
    }

    /// Species egg dry mass.
    pub const fn egg_dry_mass(&self) -> DryMass {
        self.egg_dry_mass
    }

    /// Reference female wet mass.
    pub const fn female_wet_mass(&self) -> f64 {
        self.config.female_wet_mass
    }

    /// First instar able to reproduce.
    pub fn instar_first_reproduction(&self) -> Instar {
        Instar::new(self.config.instar_first_reproduction)
    }

    /// Whether adults keep moulting after their first reproduction.
    pub fn has_indeterminate_growth(&self) -> bool {
        self.instar_first_reproduction() < self.last_instar()
    }

    /// Instar at which an animal becomes mature.
    pub fn instar_first_maturation(&self) -> Instar {
        if self.has_indeterminate_growth() {
            self.instar_first_reproduction()
        } else {
            self.last_instar()
        }
    }

    /// Reference start age of every instar.
    pub fn age_vector(&self) -> &[f64] {
        &self.config.age_vector
    }

    /// Reference development time: the start age of the last instar.
    pub fn development_time(&self) -> Day {
        Day::new(self.config.age_vector.last().copied().unwrap_or_default())
    }

    /// Dry-to-wet conversion factor of an instar (1 for unknown instars).
    pub fn conversion_to_wet_mass(&self, instar: Instar) -> f64 {
        self.config
            .conversion_to_wet_mass
            .get(instar.index())
            .copied()
            .unwrap_or(1.0)
    }

    /// Allometry of immature or mature animals.
    pub const fn allometry(&self, mature: bool) -> Allometry {
        if mature {
            Allometry {
                coefficient: self.config.coefficient_for_mass_a_for_mature,
                scale: self.config.scale_for_mass_b_for_mature,
            }
        } else {
            Allometry {
                coefficient: self.config.coefficient_for_mass_a,
                scale: self.config.scale_for_mass_b,
            }
        }
    }

    /// Growth curve family at the given temperature.
    ///
    /// Below the lab temperature the breakpoints are walked from the warmest
    /// down and the coldest breakpoint still at or above `temperature` wins.
    /// Above it the walk is symmetric.
    pub fn model_at(&self, temperature: Temperature) -> ModelChoice {
        let t = temperature.celsius();
        let default = self.config.growth_model.default_at_lab_temperature;
        if t < self.lab_temperature.celsius() {
            self.lower_models
                .iter()
                .take_while(|(breakpoint, _)| breakpoint.celsius() >= t)
                .last()
                .map_or(default, |(_, choice)| *choice)
        } else {
            self.upper_models
                .iter()
                .take_while(|(breakpoint, _)| breakpoint.celsius() <= t)
                .last()
                .map_or(default, |(_, choice)| *choice)
        }
    }

    /// Splits a dry mass into `(energy tank, body)`.
    ///
    /// `tank = energyTankTrait * mass^betaScaleTank`.
    pub fn decompose(&self, mass: DryMass, energy_tank_trait: f64) -> (DryMass, DryMass) {
        let tank = DryMass::new(
            energy_tank_trait * mass.value().max(0.0).powf(self.config.beta_scale_tank),
        )
        .min(mass)
        .max(DryMass::ZERO);
        (tank, mass.minus(tank))
    }

    /// Eggs in a clutch of a mother of the given dry mass.
    pub fn eggs_per_batch(&self, mother: DryMass) -> f64 {
        let eggs = match self.config.eggs_per_batch {
            EggsPerBatchConfig::Value { value } => value,
            EggsPerBatchConfig::FromEquation { intercept, slope } => {
                let wet =
                    WetMass::from_dry(mother, self.conversion_to_wet_mass(Instar::FIRST));
                intercept + slope * wet.value()
            }
        };
        eggs.max(0.0)
    }

    /// Capital breeding parameters, if the species stores energy for breeding.
    pub const fn capital_breeding(&self) -> Option<CapitalBreeding> {
        self.capital_breeding
    }

    /// Maximum number of clutches.
    pub const fn female_max_reproduction_events(&self) -> u32 {
        self.config.female_max_reproduction_events
    }

    /// Upper relative deviation of a female's egg mass.
    pub const fn max_plasticity(&self) -> f64 {
        self.config.max_plasticity_k_von_bertalanffy
    }

    /// Lower relative deviation of a female's egg mass.
    pub const fn min_plasticity(&self) -> f64 {
        self.config.min_plasticity_k_von_bertalanffy
    }

    /// Share of surplus investment put into body size.
    pub const fn excess_invest_in_size(&self) -> f64 {
        self.config.excess_invest_in_size
    }

    /// Share of mass kept through a moult.
    pub const fn assigned_for_molt(&self) -> f64 {
        self.config.assigned_for_molt
    }

    /// Relative delay after which a target age is met regardless of mass.
    pub const fn molting_age_threshold(&self) -> f64 {
        self.config.molting_age_threshold
    }

    /// Whether the instar migrates to a new habitat.
    pub fn has_habitat_shift(&self, instar: Instar) -> bool {
        self.config.habitat_shift.contains(&instar.value())
    }

    /// Scope multiplier applied while shifting habitat.
    pub const fn habitat_shift_factor(&self) -> f64 {
        self.config.habitat_shift_factor
    }
}
