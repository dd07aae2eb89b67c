//! Per-animal genetics: genome plus realised trait values.

use rand::Rng;
use serde::{Deserialize, Serialize};
use weaver_types::{ExecutionOrder, Temperature, TimeStep};

use crate::error::GeneticsError;
use crate::genome::{Gamete, Genome};
use crate::individual_trait::IndividualTrait;
use crate::species::{SpeciesGenetics, ThermalDefinition, ValueSource};
use crate::thermal::PawarCurve;
use crate::traits::{TraitSlot, order_index, slot_name};

/// Mature mass-length allometry, used by the temperature-size rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassCoefficients {
    /// Allometric coefficient.
    pub coefficient: f64,
    /// Allometric exponent.
    pub scale: f64,
}

/// Realised temperature response of one trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
enum RealisedThermal {
    Pawar(PawarCurve),
    SizeRule,
}

/// One enabled trait of an individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TraitSlotValue {
    value: IndividualTrait,
    thermal: Option<RealisedThermal>,
}

/// Genome and realised traits of one animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genetics {
    genome: Genome,
    individual_values: Vec<f64>,
    traits: Vec<Vec<Option<TraitSlotValue>>>,
}

impl Genetics {
    /// Derives every trait of `genome` under the species definitions.
    ///
    /// Values outside the restricted ranges are accepted here; use
    /// [`Genetics::is_inside_restricted_ranges`] to reject them.
    ///
    /// # Errors
    ///
    /// Returns [`GeneticsError::NegativePhenotype`] if a trait that must be
    /// non-negative resolves to a negative value.
    pub fn new(species: &SpeciesGenetics, genome: Genome) -> Result<Self, GeneticsError> {
        let individual_values = species.individual_values(&genome);
        let resolve = |source: ValueSource| match source {
            ValueSource::Null => None,
            ValueSource::SpeciesLevel(value) => Some(value),
            ValueSource::IndividualLevel(index) => individual_values.get(index).copied(),
        };

        let mut traits = Vec::with_capacity(ExecutionOrder::ALL.len());
        for order in ExecutionOrder::ALL {
            let mut slots = Vec::with_capacity(species.slots(order));
            for slot in 0..species.slots(order) {
                let Some(definition) = species.definition_at(order, slot) else {
                    slots.push(None);
                    continue;
                };
                let Some(value) = resolve(definition.value) else {
                    slots.push(None);
                    continue;
                };
                let thermal = match &definition.thermal {
                    None => None,
                    Some(ThermalDefinition::SizeRule(_)) => Some(RealisedThermal::SizeRule),
                    Some(ThermalDefinition::Pawar {
                        activation_energy,
                        energy_decay,
                        temperature_optimal,
                    }) => match (
                        resolve(*activation_energy),
                        resolve(*energy_decay),
                        resolve(*temperature_optimal),
                    ) {
                        (Some(e), Some(ed), Some(t_opt)) => Some(RealisedThermal::Pawar(PawarCurve {
                            activation_energy: e,
                            energy_decay: ed,
                            temperature_optimal: Temperature::from_celsius(t_opt),
                        })),
                        _ => None,
                    },
                };
                let value =
                    IndividualTrait::new(slot_name(order, slot), value, definition.can_be_negative)?;
                slots.push(Some(TraitSlotValue { value, thermal }));
            }
            traits.push(slots);
        }

        Ok(Self {
            genome,
            individual_values,
            traits,
        })
    }

    /// Offspring genetics from two parental gametes.
    ///
    /// # Errors
    ///
    /// Returns [`GeneticsError::GameteMismatch`] for malformed gametes, or any
    /// error of [`Genetics::new`].
    pub fn from_gametes(
        species: &SpeciesGenetics,
        first: Gamete,
        second: Gamete,
    ) -> Result<Self, GeneticsError> {
        let genome = Genome::from_gametes(first, second, species.layout())?;
        Self::new(species, genome)
    }

    /// A recombinant gamete of this individual.
    pub fn gamete(&self, species: &SpeciesGenetics, rng: &mut impl Rng) -> Gamete {
        self.genome.meiosis(species.layout(), rng)
    }

    /// The individual's genome.
    #[must_use]
    pub const fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Whether every genome-derived value lies in its restricted range.
    #[must_use]
    pub fn is_inside_restricted_ranges(&self, species: &SpeciesGenetics) -> bool {
        species.values_inside_restricted_ranges(&self.individual_values)
    }

    fn slot(&self, order: ExecutionOrder, slot: usize) -> Option<&TraitSlotValue> {
        self.traits.get(order_index(order))?.get(slot)?.as_ref()
    }

    /// The realised trait, or `None` for a disabled trait.
    #[must_use]
    pub fn get<T: TraitSlot>(&self, trait_type: T) -> Option<&IndividualTrait> {
        self.slot(T::ORDER, trait_type.index()).map(|s| &s.value)
    }

    /// Phenotypic value of a trait; zero for a disabled trait.
    #[must_use]
    pub fn phenotypic<T: TraitSlot>(&self, trait_type: T) -> f64 {
        self.get(trait_type).map_or(0.0, IndividualTrait::phenotypic)
    }

    /// Constitutive value of a trait; zero for a disabled trait.
    #[must_use]
    pub fn constitutive<T: TraitSlot>(&self, trait_type: T) -> f64 {
        self.get(trait_type).map_or(0.0, IndividualTrait::constitutive)
    }

    /// Recomputes the phenotype of every thermally dependent trait.
    ///
    /// Calling this twice with the same inputs in one time step leaves the
    /// values unchanged.
    ///
    /// # Errors
    ///
    /// Returns a [`GeneticsError`] if a tuned value is negative for a trait
    /// that must be non-negative, or (debug builds) if a different value is
    /// written twice in the same time step.
    pub fn tune(
        &mut self,
        species: &SpeciesGenetics,
        temperature: Temperature,
        lab_temperature: Temperature,
        time_step: TimeStep,
        mass: MassCoefficients,
    ) -> Result<(), GeneticsError> {
        for (order, slots) in ExecutionOrder::ALL.iter().zip(self.traits.iter_mut()) {
            for (slot, entry) in slots.iter_mut().enumerate() {
                let Some(entry) = entry else { continue };
                let Some(thermal) = entry.thermal else { continue };
                let Some(definition) = species.definition_at(*order, slot) else {
                    continue;
                };
                let constitutive = entry.value.constitutive();
                let tuned = match (thermal, &definition.thermal) {
                    (RealisedThermal::Pawar(curve), _) => curve.apply(
                        constitutive,
                        temperature,
                        lab_temperature,
                        definition.inverse,
                        !definition.can_be_negative,
                    ),
                    (RealisedThermal::SizeRule, Some(ThermalDefinition::SizeRule(rule))) => rule
                        .apply(
                            constitutive,
                            temperature,
                            lab_temperature,
                            mass.coefficient,
                            mass.scale,
                        ),
                    (RealisedThermal::SizeRule, _) => None,
                };
                entry.value.set_phenotypic(
                    slot_name(*order, slot),
                    tuned.unwrap_or(constitutive),
                    definition.can_be_negative,
                    time_step,
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::config::GeneticsConfig;
    use crate::traits::{BaseTrait, EscapeWeight};

    fn config() -> GeneticsConfig {
        let base: String = BaseTrait::ALL
            .iter()
            .map(|t| match t {
                BaseTrait::Growth => "    growth:\n      definition: { type: individual_level, min: 0.1, max: 0.3, restrict_value: 0.5 }\n      temperature:\n        model: pawar\n        activation_energy: { type: species_level, value: 0.65 }\n        energy_decay: { type: species_level, value: 3.0 }\n        temperature_optimal: { type: individual_level, min: 20.0, max: 30.0 }\n".to_owned(),
                BaseTrait::DevTime => "    devTime:\n      definition: { type: individual_level, min: 10.0, max: 20.0, restrict_value: 0.2 }\n".to_owned(),
                other => format!("    {}:\n      definition: {{ type: species_level, value: 1.0 }}\n", other.name()),
            })
            .collect();
        let yaml = format!(
            "number_of_loci_per_trait: 10\ncalibration_genomes: 200\ntraits_per_module: 3\nrho_per_module: [0.6]\ntraits:\n  base:\n{base}  escape_probability_weight:\n    Pvelocity:\n      definition: {{ type: species_level, value: 0.4 }}\n"
        );
        serde_yml::from_str(&yaml).unwrap()
    }

    fn species(rng: &mut SmallRng) -> SpeciesGenetics {
        SpeciesGenetics::from_config(&config(), rng).unwrap()
    }

    #[test]
    fn random_individuals_respect_restricted_ranges() {
        let mut rng = SmallRng::seed_from_u64(42);
        let species = species(&mut rng);
        assert_eq!(species.individual_levels().len(), 3);
        for _ in 0..20 {
            let (genetics, _) = species.random_genetics(&mut rng).unwrap();
            let growth = genetics.constitutive(BaseTrait::Growth);
            assert!((0.15..=0.25).contains(&growth), "growth {growth}");
            let dev = genetics.constitutive(BaseTrait::DevTime);
            assert!((11.0..=19.0).contains(&dev), "devTime {dev}");
            assert!(genetics.is_inside_restricted_ranges(&species));
        }
    }

    #[test]
    fn disabled_traits_read_as_zero() {
        let mut rng = SmallRng::seed_from_u64(42);
        let species = species(&mut rng);
        let (genetics, _) = species.random_genetics(&mut rng).unwrap();
        assert!(genetics.get(EscapeWeight::PattackDistance).is_none());
        assert!((genetics.phenotypic(EscapeWeight::Pvelocity) - 0.4).abs() < 1e-12);
        assert!(!species.is_computed(EscapeWeight::PattackDistance));
    }

    #[test]
    fn tuning_twice_in_one_step_is_idempotent() {
        let mut rng = SmallRng::seed_from_u64(42);
        let species = species(&mut rng);
        let (mut genetics, _) = species.random_genetics(&mut rng).unwrap();
        let mass = MassCoefficients {
            coefficient: 0.01,
            scale: 3.0,
        };
        let t = Temperature::from_celsius(18.0);
        let lab = Temperature::from_celsius(20.0);
        genetics.tune(&species, t, lab, TimeStep::new(5), mass).unwrap();
        let first = genetics.phenotypic(BaseTrait::Growth);
        genetics.tune(&species, t, lab, TimeStep::new(5), mass).unwrap();
        assert!((genetics.phenotypic(BaseTrait::Growth) - first).abs() < f64::EPSILON);
        assert!(first < genetics.constitutive(BaseTrait::Growth));
        assert!(
            (genetics.phenotypic(BaseTrait::DevTime) - genetics.constitutive(BaseTrait::DevTime))
                .abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn offspring_combine_parental_gametes() {
        let mut rng = SmallRng::seed_from_u64(42);
        let species = species(&mut rng);
        let (mother, _) = species.random_genetics(&mut rng).unwrap();
        let (father, _) = species.random_genetics(&mut rng).unwrap();
        let child = Genetics::from_gametes(
            &species,
            mother.gamete(&species, &mut rng),
            father.gamete(&species, &mut rng),
        )
        .unwrap();
        assert_eq!(child.genome().chromosomes().len(), 3);
    }

    #[test]
    fn missing_base_trait_is_a_config_error() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut config = config();
        config.traits.base.remove(&BaseTrait::Assim);
        assert!(SpeciesGenetics::from_config(&config, &mut rng).is_err());
    }

    #[test]
    fn rho_list_must_match_module_count() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut config = config();
        config.rho_per_module = vec![0.1, 0.2];
        assert!(SpeciesGenetics::from_config(&config, &mut rng).is_err());
        config.rho_per_module.clear();
        assert!(SpeciesGenetics::from_config(&config, &mut rng).is_ok());
    }
}
