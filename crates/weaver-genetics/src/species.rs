//! Species-level genetics: trait definitions, locus pool and genome factory.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use weaver_types::{DryMass, ExecutionOrder, Temperature};

use crate::config::{
    GeneticsConfig, IndividualLevelConfig, ThermalConfig, TraitConfig, TraitDefinitionConfig,
    TraitElement,
};
use crate::error::GeneticsError;
use crate::genetics::Genetics;
use crate::genome::{ChromosomeLayout, Genome, Homologues};
use crate::locus::{Allele, Locus};
use crate::thermal::TemperatureSizeRule;
use crate::traits::{TraitSlot, order_index, slot_can_be_negative, slot_is_inverse, slot_name, slots_in};

/// Where a trait value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ValueSource {
    /// Disabled trait.
    Null,
    /// Shared by every individual.
    SpeciesLevel(f64),
    /// Index into the species' individual-level values.
    IndividualLevel(usize),
}

/// Species-level temperature dependency of one trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ThermalDefinition {
    /// Pawar curve parameters.
    Pawar {
        /// Activation energy (eV).
        activation_energy: ValueSource,
        /// Deactivation energy (eV).
        energy_decay: ValueSource,
        /// Optimal temperature (degrees Celsius).
        temperature_optimal: ValueSource,
    },
    /// Temperature-size rule.
    SizeRule(TemperatureSizeRule),
}

/// Species-level definition of one trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitDefinition {
    /// Source of the constitutive value.
    pub value: ValueSource,
    /// Optional temperature dependency.
    pub thermal: Option<ThermalDefinition>,
    /// Durations respond inversely to temperature.
    pub inverse: bool,
    /// The trait may take negative values.
    pub can_be_negative: bool,
}

impl TraitDefinition {
    /// Whether the trait is disabled.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self.value, ValueSource::Null)
    }
}

/// Ranges of one genome-derived value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualLevelRange {
    /// Trait name.
    pub trait_name: String,
    /// Which value of the trait.
    pub element: TraitElement,
    /// Lower bound of the restricted range.
    pub min_restricted: f64,
    /// Upper bound of the restricted range.
    pub max_restricted: f64,
    /// Lower clamp.
    pub min_limit: f64,
    /// Upper clamp.
    pub max_limit: f64,
    /// Smallest pseudo-value seen during calibration.
    pub min_pseudo: f64,
    /// Largest pseudo-value seen during calibration.
    pub max_pseudo: f64,
}

impl IndividualLevelRange {
    fn new(trait_name: &str, element: TraitElement, config: &IndividualLevelConfig) -> Self {
        let span = config.max - config.min;
        Self {
            trait_name: trait_name.to_owned(),
            element,
            min_restricted: config.min + span * 0.5 * config.restrict_value,
            max_restricted: config.max - span * 0.5 * config.restrict_value,
            min_limit: config.min - config.min.abs() * config.limits.min,
            max_limit: config.max + config.max.abs() * config.limits.max,
            min_pseudo: f64::INFINITY,
            max_pseudo: f64::NEG_INFINITY,
        }
    }

    /// Maps a pseudo-value onto the restricted range, clamped to the limits.
    #[must_use]
    pub fn phenotype(&self, pseudo: f64) -> f64 {
        let pseudo_span = self.max_pseudo - self.min_pseudo;
        let value = if !pseudo_span.is_finite() || pseudo_span <= f64::EPSILON {
            (self.min_restricted + self.max_restricted) * 0.5
        } else {
            self.min_restricted
                + (pseudo - self.min_pseudo) * (self.max_restricted - self.min_restricted) / pseudo_span
        };
        value.clamp(
            self.min_limit.min(self.max_limit),
            self.max_limit.max(self.min_limit),
        )
    }

    /// Whether `value` lies inside the restricted range.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min_restricted && value <= self.max_restricted
    }
}

/// Genetics shared by every individual of a species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesGenetics {
    definitions: Vec<Vec<TraitDefinition>>,
    individual_levels: Vec<IndividualLevelRange>,
    loci: Vec<Vec<Locus>>,
    layout: ChromosomeLayout,
    traits_per_module: usize,
    rho_per_module: Vec<f64>,
    rho_range_per_module: Vec<usize>,
    max_genome_attempts: usize,
}

/// Accumulates individual-level ranges while definitions are resolved.
#[derive(Default)]
struct Resolver {
    individual_levels: Vec<IndividualLevelRange>,
}

impl Resolver {
    fn source(
        &mut self,
        name: &str,
        element: TraitElement,
        config: &TraitDefinitionConfig,
    ) -> ValueSource {
        match config {
            TraitDefinitionConfig::Null => ValueSource::Null,
            TraitDefinitionConfig::SpeciesLevel { value } => ValueSource::SpeciesLevel(*value),
            TraitDefinitionConfig::IndividualLevel(range) => {
                self.individual_levels
                    .push(IndividualLevelRange::new(name, element, range));
                ValueSource::IndividualLevel(self.individual_levels.len().saturating_sub(1))
            }
        }
    }

    fn thermal_source(
        &mut self,
        name: &str,
        element: TraitElement,
        config: &TraitDefinitionConfig,
    ) -> Result<ValueSource, GeneticsError> {
        match self.source(name, element, config) {
            ValueSource::Null => Err(GeneticsError::InvalidConfig {
                reason: format!("thermal parameter {element:?} of {name} cannot be null"),
            }),
            source => Ok(source),
        }
    }

    fn definition(
        &mut self,
        order: ExecutionOrder,
        slot: usize,
        config: Option<&TraitConfig>,
    ) -> Result<TraitDefinition, GeneticsError> {
        let name = slot_name(order, slot);
        let inverse = slot_is_inverse(order, slot);
        let can_be_negative = slot_can_be_negative(order, slot);

        let Some(config) = config else {
            if order == ExecutionOrder::Base {
                return Err(GeneticsError::InvalidConfig {
                    reason: format!("base trait {name} is not defined"),
                });
            }
            return Ok(TraitDefinition {
                value: ValueSource::Null,
                thermal: None,
                inverse,
                can_be_negative,
            });
        };

        let value = self.source(name, TraitElement::Value, &config.definition);
        if order == ExecutionOrder::Base && value == ValueSource::Null {
            return Err(GeneticsError::InvalidConfig {
                reason: format!("base trait {name} cannot be null"),
            });
        }

        let thermal = match &config.temperature {
            None => None,
            Some(_) if value == ValueSource::Null => None,
            Some(ThermalConfig::Pawar {
                activation_energy,
                energy_decay,
                temperature_optimal,
            }) => Some(ThermalDefinition::Pawar {
                activation_energy: self.thermal_source(
                    name,
                    TraitElement::ActivationEnergy,
                    activation_energy,
                )?,
                energy_decay: self.thermal_source(name, TraitElement::EnergyDecay, energy_decay)?,
                temperature_optimal: self.thermal_source(
                    name,
                    TraitElement::TemperatureOptimal,
                    temperature_optimal,
                )?,
            }),
            Some(ThermalConfig::TemperatureSizeRule { points }) => {
                let points = points
                    .iter()
                    .map(|&(celsius, mass)| (Temperature::from_celsius(celsius), DryMass::new(mass)))
                    .collect();
                let rule = TemperatureSizeRule::new(points).ok_or_else(|| {
                    GeneticsError::InvalidConfig {
                        reason: format!("temperature-size rule of {name} needs at least two points"),
                    }
                })?;
                Some(ThermalDefinition::SizeRule(rule))
            }
        };

        Ok(TraitDefinition {
            value,
            thermal,
            inverse,
            can_be_negative,
        })
    }

    fn order<T: TraitSlot>(
        &mut self,
        configs: &BTreeMap<T, TraitConfig>,
    ) -> Result<Vec<TraitDefinition>, GeneticsError> {
        T::ALL
            .iter()
            .map(|t| self.definition(T::ORDER, t.index(), configs.get(t)))
            .collect()
    }
}

impl SpeciesGenetics {
    /// Builds and calibrates the species genetics.
    ///
    /// # Errors
    ///
    /// Returns [`GeneticsError::InvalidConfig`] for missing base traits,
    /// a module correlation list of the wrong length, odd chiasma counts,
    /// or malformed thermal definitions.
    pub fn from_config(config: &GeneticsConfig, rng: &mut impl Rng) -> Result<Self, GeneticsError> {
        let traits = &config.traits;
        let mut resolver = Resolver::default();
        let mut definitions = vec![Vec::new(); ExecutionOrder::ALL.len()];
        let resolved = [
            (ExecutionOrder::Base, resolver.order(&traits.base)?),
            (
                ExecutionOrder::EscapeProbabilityWeight,
                resolver.order(&traits.escape_probability_weight)?,
            ),
            (
                ExecutionOrder::PredationProbabilityWeight,
                resolver.order(&traits.predation_probability_weight)?,
            ),
            (
                ExecutionOrder::EdibilityValueWeight,
                resolver.order(&traits.edibility_value_weight)?,
            ),
            (
                ExecutionOrder::ProbabilityDensityFunction,
                resolver.order(&traits.probability_density_function)?,
            ),
            (ExecutionOrder::CellValue, resolver.order(&traits.cell_value)?),
            (ExecutionOrder::Preferences, resolver.order(&traits.preferences)?),
        ];
        for (order, defs) in resolved {
            if let Some(slot) = definitions.get_mut(order_index(order)) {
                *slot = defs;
            }
        }

        let individual_count = resolver.individual_levels.len();
        let loci_per_trait = config.number_of_loci_per_trait;
        if config.traits_per_module == 0 {
            return Err(GeneticsError::InvalidConfig {
                reason: "traits_per_module must be at least 1".to_owned(),
            });
        }
        if individual_count > 0 && loci_per_trait == 0 {
            return Err(GeneticsError::InvalidConfig {
                reason: "number_of_loci_per_trait must be at least 1".to_owned(),
            });
        }

        let modules = individual_count.div_ceil(config.traits_per_module);
        let rho_per_module = if config.rho_per_module.is_empty() {
            vec![0.0; modules]
        } else if config.rho_per_module.len() == modules {
            config.rho_per_module.clone()
        } else {
            return Err(GeneticsError::InvalidConfig {
                reason: format!(
                    "rho_per_module has {} entries but {individual_count} individual-level traits \
                     in modules of {} need {modules}",
                    config.rho_per_module.len(),
                    config.traits_per_module
                ),
            });
        };
        if let Some(rho) = rho_per_module.iter().find(|rho| !(-1.0..=1.0).contains(*rho)) {
            return Err(GeneticsError::InvalidConfig {
                reason: format!("correlation coefficient {rho} is outside [-1, 1]"),
            });
        }
        let rho_range_per_module = rho_per_module
            .iter()
            .map(|rho| scaled_count(1.0 - rho.abs(), loci_per_trait))
            .collect();

        let mut loci: Vec<Vec<Locus>> = (0..individual_count)
            .map(|_| {
                (0..loci_per_trait)
                    .map(|_| Locus::random(config.number_of_alleles_per_locus, rng))
                    .collect()
            })
            .collect();
        apply_modifications(config, &resolver.individual_levels, &mut loci)?;

        let layout = ChromosomeLayout::shuffled(
            individual_count,
            loci_per_trait,
            config.number_of_chiasmas_per_chromosome,
            rng,
        )?;

        let mut species = Self {
            definitions,
            individual_levels: resolver.individual_levels,
            loci,
            layout,
            traits_per_module: config.traits_per_module,
            rho_per_module,
            rho_range_per_module,
            max_genome_attempts: config.max_genome_attempts.max(1),
        };
        species.calibrate(config.calibration_genomes.max(1), rng)?;
        debug!(
            individual_level_traits = individual_count,
            loci_per_trait, "species genetics calibrated"
        );
        Ok(species)
    }

    /// Estimates the pseudo-value range of every individual-level value
    /// from a sample of random genomes.
    fn calibrate(&mut self, samples: usize, rng: &mut impl Rng) -> Result<(), GeneticsError> {
        for _ in 0..samples {
            let genome = Genome::random(&self.loci, &self.layout, rng)?;
            let correlosomes = genome.correlosomes(&self.layout);
            for order in 0..self.individual_levels.len() {
                let pseudo = self.pseudo_value(&correlosomes, order);
                if let Some(range) = self.individual_levels.get_mut(order) {
                    range.min_pseudo = range.min_pseudo.min(pseudo);
                    range.max_pseudo = range.max_pseudo.max(pseudo);
                }
            }
        }
        Ok(())
    }

    /// Sum of dominant allele values over the trait's correlosome, with
    /// the tail of the correlosome shared within the correlation module.
    fn pseudo_value(&self, correlosomes: &[Homologues], order: usize) -> f64 {
        let loci = self.layout.loci_per_chromosome();
        let module = order.checked_div(self.traits_per_module).unwrap_or(0);
        let distance_from_head = order.checked_rem(self.traits_per_module).unwrap_or(0);
        let rho = self.rho_per_module.get(module).copied().unwrap_or(0.0);
        let rho_range = self.rho_range_per_module.get(module).copied().unwrap_or(loci);

        let own = correlosomes.get(order);
        let head = correlosomes.get(order.saturating_sub(distance_from_head));

        (0..loci)
            .map(|j| {
                if j < rho_range || (rho < 0.0 && distance_from_head == 0) {
                    own.map_or(0.0, |pair| dominant_value(pair, j))
                } else if rho >= 0.0 {
                    head.map_or(0.0, |pair| dominant_value(pair, j))
                } else {
                    head.map_or(0.0, |pair| 1.0 - dominant_value(pair, j))
                }
            })
            .sum()
    }

    /// Realised value of every individual-level entry for `genome`.
    #[must_use]
    pub fn individual_values(&self, genome: &Genome) -> Vec<f64> {
        let correlosomes = genome.correlosomes(&self.layout);
        self.individual_levels
            .iter()
            .enumerate()
            .map(|(order, range)| range.phenotype(self.pseudo_value(&correlosomes, order)))
            .collect()
    }

    /// Whether every individual-level value lies in its restricted range.
    #[must_use]
    pub fn values_inside_restricted_ranges(&self, values: &[f64]) -> bool {
        self.individual_levels
            .iter()
            .zip(values)
            .all(|(range, value)| range.contains(*value))
    }

    /// Creates a random individual whose traits lie in the restricted ranges.
    ///
    /// Returns the genetics and the number of genomes discarded on the way.
    ///
    /// # Errors
    ///
    /// Returns [`GeneticsError::GenomeAttemptsExhausted`] if no genome was
    /// accepted within the configured number of attempts.
    pub fn random_genetics(&self, rng: &mut impl Rng) -> Result<(Genetics, usize), GeneticsError> {
        for discarded in 0..self.max_genome_attempts {
            let genome = Genome::random(&self.loci, &self.layout, rng)?;
            let genetics = Genetics::new(self, genome)?;
            if genetics.is_inside_restricted_ranges(self) {
                return Ok((genetics, discarded));
            }
        }
        Err(GeneticsError::GenomeAttemptsExhausted {
            attempts: self.max_genome_attempts,
        })
    }

    /// Definition of trait `slot` in category `order`.
    #[must_use]
    pub fn definition_at(&self, order: ExecutionOrder, slot: usize) -> Option<&TraitDefinition> {
        self.definitions.get(order_index(order))?.get(slot)
    }

    /// Definition of a trait.
    #[must_use]
    pub fn definition<T: TraitSlot>(&self, trait_type: T) -> Option<&TraitDefinition> {
        self.definition_at(T::ORDER, trait_type.index())
    }

    /// Whether a trait is enabled (not `null`).
    #[must_use]
    pub fn is_computed<T: TraitSlot>(&self, trait_type: T) -> bool {
        self.definition(trait_type).is_some_and(|d| !d.is_null())
    }

    /// Whether a trait has a temperature dependency.
    #[must_use]
    pub fn is_thermally_dependent<T: TraitSlot>(&self, trait_type: T) -> bool {
        self.definition(trait_type).is_some_and(|d| d.thermal.is_some())
    }

    /// Number of trait slots in category `order`.
    #[must_use]
    pub fn slots(&self, order: ExecutionOrder) -> usize {
        self.definitions
            .get(order_index(order))
            .map_or_else(|| slots_in(order), Vec::len)
    }

    /// Ranges of the genome-derived values.
    #[must_use]
    pub fn individual_levels(&self) -> &[IndividualLevelRange] {
        &self.individual_levels
    }

    /// The chromosome layout used for inheritance.
    #[must_use]
    pub const fn layout(&self) -> &ChromosomeLayout {
        &self.layout
    }

    /// The species locus pool.
    #[must_use]
    pub fn loci(&self) -> &[Vec<Locus>] {
        &self.loci
    }
}

/// Dominant allele value at locus `j` of a homologous pair.
fn dominant_value(pair: &Homologues, j: usize) -> f64 {
    match (pair.first.get(j), pair.second.get(j)) {
        (Some(a), Some(b)) => Allele::dominant(*a, *b).value,
        (Some(a), None) | (None, Some(a)) => a.value,
        (None, None) => 0.0,
    }
}

/// `round(fraction * count)`, clamped to `0..=count`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scaled_count(fraction: f64, count: usize) -> usize {
    let scaled = (fraction.clamp(0.0, 1.0) * count as f64).round();
    (scaled as usize).min(count)
}

fn apply_modifications(
    config: &GeneticsConfig,
    individual_levels: &[IndividualLevelRange],
    loci: &mut [Vec<Locus>],
) -> Result<(), GeneticsError> {
    let loci_per_trait = config.number_of_loci_per_trait;
    let alleles = usize::from(config.number_of_alleles_per_locus);

    for modification in &config.modify_alleles {
        let positions: Vec<usize> = modification
            .affected_locus
            .iter()
            .map(|p| scaled_count(*p, loci_per_trait.saturating_sub(1)))
            .collect();
        let allele = scaled_count(modification.affected_alleles, alleles.saturating_sub(1));

        for affected in &modification.affected_traits {
            let order = individual_levels
                .iter()
                .position(|r| r.trait_name == affected.trait_name && r.element == affected.element)
                .ok_or_else(|| GeneticsError::InvalidConfig {
                    reason: format!(
                        "modified trait {} ({:?}) is not individual-level",
                        affected.trait_name, affected.element
                    ),
                })?;
            if let Some(trait_loci) = loci.get_mut(order) {
                for position in &positions {
                    if let Some(locus) = trait_loci.get_mut(*position) {
                        locus.modify_allele(allele, modification.times_alleles);
                    }
                }
            }
        }
    }
    Ok(())
}
