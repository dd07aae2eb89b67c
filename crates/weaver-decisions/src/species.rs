//! Species-level decision block.

use tracing::debug;
use weaver_genetics::{
    EdibilityWeight, EscapeWeight, PdfParameter, PredationWeight, SpeciesGenetics,
};
use weaver_types::DryMass;

use crate::actors::{AnimalView, DecisionsLookup, Prey};
use crate::combination::WeightedCombination;
use crate::config::DecisionsConfig;
use crate::error::{DecisionError, NotComputable};
use crate::maxima::{MaximumKind, RunningMaxima, RunningMaximaSnapshot};
use crate::probabilities::{
    attack_distance_probability, fleeing_probability, proximity, relative_resource_value,
    size_matching_density, tuned_speed, velocity_probability,
};
use crate::sensory::SensoryModel;

/// Decision rules and shared statistics of one animal species.
///
/// The probabilities are evaluated from the point of view of a predator of
/// this species.
#[derive(Debug, Clone)]
pub struct SpeciesDecisions {
    config: DecisionsConfig,
    sensory: SensoryModel,
    escape: WeightedCombination,
    predation: WeightedCombination,
    edibility: WeightedCombination,
    maxima: RunningMaxima,
}

fn check_unit(name: &str, value: f64) -> Result<(), DecisionError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(DecisionError::InvalidConfig {
            reason: format!("{name} must lie in [0, 1], got {value}"),
        })
    }
}

impl SpeciesDecisions {
    /// Builds the block for a species with `instars` instars.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionError::InvalidConfig`] for probabilities outside
    /// `[0, 1]`, a non-positive sensory shape, a negative density threshold
    /// or a negative speed penalty.
    pub fn new(
        config: DecisionsConfig,
        genetics: &SpeciesGenetics,
        instars: usize,
    ) -> Result<Self, DecisionError> {
        check_unit("kill_probability", config.kill_probability)?;
        check_unit(
            "weight_individual_to_global_assessment",
            config.weight_individual_to_global_assessment,
        )?;
        if config.sensory_model.beta <= 0.0 || !config.sensory_model.beta.is_finite() {
            return Err(DecisionError::InvalidConfig {
                reason: format!("sensory beta must be positive, got {}", config.sensory_model.beta),
            });
        }
        if config.pdf_threshold < 0.0 {
            return Err(DecisionError::InvalidConfig {
                reason: format!("pdf_threshold must not be negative, got {}", config.pdf_threshold),
            });
        }
        let escape_config = &config.predation_probability.escape_probability;
        if escape_config.c_velocity < 0.0 {
            return Err(DecisionError::InvalidConfig {
                reason: format!("c_velocity must not be negative, got {}", escape_config.c_velocity),
            });
        }

        let escape = WeightedCombination::for_traits::<EscapeWeight>(
            genetics,
            escape_config.additive_mechanism,
            escape_config.is_remaining_weight_null,
        );
        let predation = WeightedCombination::for_traits::<PredationWeight>(
            genetics,
            config.predation_probability.additive_mechanism,
            config.predation_probability.is_remaining_weight_null,
        );
        let edibility = WeightedCombination::for_traits::<EdibilityWeight>(
            genetics,
            config.edibility_value.additive_mechanism,
            config.edibility_value.is_remaining_weight_null,
        );

        debug!(
            instars,
            kill_probability = config.kill_probability,
            beta = config.sensory_model.beta,
            "species decisions built"
        );

        Ok(Self {
            sensory: SensoryModel::new(config.sensory_model.beta),
            config,
            escape,
            predation,
            edibility,
            maxima: RunningMaxima::new(instars),
        })
    }

    /// Configuration the block was built from.
    pub const fn config(&self) -> &DecisionsConfig {
        &self.config
    }

    /// Probability that a successful encounter ends in a kill.
    pub const fn kill_probability(&self) -> f64 {
        self.config.kill_probability
    }

    /// Weight of individual against species patch maxima.
    pub const fn weight_individual_to_global_assessment(&self) -> f64 {
        self.config.weight_individual_to_global_assessment
    }

    /// Whether food is valued by its assimilable mass.
    pub const fn quality_resource_assessment(&self) -> bool {
        self.config.edibility_value.quality_resource_assessment
    }

    /// Sensory model of the species.
    pub const fn sensory(&self) -> SensoryModel {
        self.sensory
    }

    /// Shared running maxima.
    pub const fn maxima(&self) -> &RunningMaxima {
        &self.maxima
    }

    /// Replaces the running maxima with persisted values.
    pub fn restore_maxima(&mut self, snapshot: &RunningMaximaSnapshot) {
        self.maxima = RunningMaxima::from_snapshot(snapshot);
    }

    /// Probability that `prey` escapes an attack of `predator`.
    ///
    /// # Errors
    ///
    /// Propagates a [`NotComputable`] sub-probability.
    pub fn escape_probability<A: AnimalView>(
        &self,
        predator: &A,
        prey: &A,
    ) -> Result<f64, NotComputable> {
        let distance = predator.position().distance_to(prey.position());
        let c_velocity = self.config.predation_probability.escape_probability.c_velocity;
        self.escape.evaluate(
            predator.genetics(),
            |slot: EscapeWeight| match slot {
                EscapeWeight::Pvelocity => velocity_probability(
                    tuned_speed(prey.speed(), prey.mass_load(), c_velocity),
                    tuned_speed(predator.speed(), predator.mass_load(), c_velocity),
                ),
                EscapeWeight::PattackDistance => {
                    attack_distance_probability(distance, predator.interaction_radius())
                }
            },
            || {
                Ok(fleeing_probability(
                    self.sensory,
                    distance,
                    predator.interaction_radius(),
                    prey.scope_radius(),
                ))
            },
        )
    }

    /// Size-matching term normalised by the running maximum.
    ///
    /// The maximum is raised before dividing, so the first observation of
    /// an instar yields one.
    fn pdf_probability<A: AnimalView>(&self, predator: &A, prey: &A) -> Result<f64, NotComputable> {
        let genetics = predator.genetics();
        let density = size_matching_density(
            predator.pdf_dry_mass().value(),
            prey.pdf_dry_mass().value(),
            genetics.phenotypic(PdfParameter::MuForPdf),
            genetics.phenotypic(PdfParameter::SigmaForPdf),
        )?;
        if density < self.config.pdf_threshold {
            return Err(NotComputable::BelowPdfThreshold);
        }
        let instar = predator.instar_to_evaluate_cells();
        self.maxima.update(MaximumKind::Pdf, instar, density);
        self.maxima.normalized(MaximumKind::Pdf, instar, density)
    }

    fn prey_voracity_probability<A, L>(
        &self,
        predator: &A,
        prey: &A,
        lookup: &L,
    ) -> Result<f64, NotComputable>
    where
        A: AnimalView,
        L: DecisionsLookup + ?Sized,
    {
        if self.config.predation_probability.use_global_maximum_prey_voracity {
            self.maxima
                .normalized(MaximumKind::PreyVoracity, predator.instar(), prey.voracity())
        } else {
            lookup
                .species_decisions(prey.species())
                .ok_or(NotComputable::ZeroRunningMaximum)?
                .maxima
                .normalized(MaximumKind::Voracity, prey.instar(), prey.voracity())
        }
    }

    fn predation_on_animal<A, L>(
        &self,
        predator: &A,
        prey: &A,
        lookup: &L,
    ) -> Result<f64, NotComputable>
    where
        A: AnimalView,
        L: DecisionsLookup + ?Sized,
    {
        self.predation.evaluate(
            predator.genetics(),
            |slot: PredationWeight| match slot {
                PredationWeight::Preach => Ok(1.0 - self.escape_probability(predator, prey)?),
                PredationWeight::Ppdf => self.pdf_probability(predator, prey),
                PredationWeight::PvorPred => self.maxima.normalized(
                    MaximumKind::Voracity,
                    predator.instar(),
                    predator.voracity(),
                ),
            },
            || self.prey_voracity_probability(predator, prey, lookup),
        )
    }

    /// Probability that `predator` succeeds in catching `prey`.
    ///
    /// Always one for prey that cannot move. Zero when any term is not
    /// computable.
    pub fn predation_probability<A, L>(&self, predator: &A, prey: Prey<'_, A>, lookup: &L) -> f64
    where
        A: AnimalView,
        L: DecisionsLookup + ?Sized,
    {
        match prey {
            Prey::Animal(animal) if animal.is_mobile() => self
                .predation_on_animal(predator, animal, lookup)
                .unwrap_or(0.0),
            _ => 1.0,
        }
    }

    fn edibility_terms<A, L>(
        &self,
        predator: &A,
        prey: Prey<'_, A>,
        prey_dry_mass: DryMass,
        lookup: &L,
    ) -> Result<f64, NotComputable>
    where
        A: AnimalView,
        L: DecisionsLookup + ?Sized,
    {
        self.edibility.evaluate(
            predator.genetics(),
            |slot: EdibilityWeight| match slot {
                EdibilityWeight::Pp => {
                    let probability = self.predation_probability(predator, prey, lookup);
                    if probability <= 0.0 {
                        Err(NotComputable::Inedible)
                    } else {
                        Ok(probability)
                    }
                }
            },
            || {
                let mass = if self.quality_resource_assessment() {
                    predator.assimilated_mass(prey_dry_mass, prey.class())
                } else {
                    prey_dry_mass
                };
                relative_resource_value(mass.value(), predator.voracity())
            },
        )
    }

    /// Attractiveness of `prey_dry_mass` of `prey` as food for `predator`.
    ///
    /// Weighted by the predator's preference for the prey class. Zero for
    /// inedible prey or when any term is not computable.
    pub fn edibility_value<A, L>(
        &self,
        predator: &A,
        prey: Prey<'_, A>,
        prey_dry_mass: DryMass,
        lookup: &L,
    ) -> f64
    where
        A: AnimalView,
        L: DecisionsLookup + ?Sized,
    {
        self.edibility_terms(predator, prey, prey_dry_mass, lookup)
            .map_or(0.0, |value| {
                (value * predator.preference(prey.class())).clamp(0.0, 1.0)
            })
    }

    /// Edibility value discounted by distance.
    ///
    /// Distance is point to point for animals and point to patch for
    /// resources. The result never exceeds the edibility value.
    pub fn cell_quality<A, L>(
        &self,
        predator: &A,
        prey: Prey<'_, A>,
        prey_dry_mass: DryMass,
        lookup: &L,
    ) -> f64
    where
        A: AnimalView,
        L: DecisionsLookup + ?Sized,
    {
        let edibility = self.edibility_value(predator, prey, prey_dry_mass, lookup);
        edibility * proximity(prey.distance_from(predator.position()), predator.scope_radius())
    }

    /// Records the voracity of one of the species' own animals.
    pub fn observe_voracity<A: AnimalView>(&self, animal: &A) {
        self.maxima
            .update(MaximumKind::Voracity, animal.instar(), animal.voracity());
    }

    /// Records a prey met by a predator of this species.
    pub fn observe_prey_voracity<A: AnimalView>(&self, predator: &A, prey: &A) {
        self.maxima
            .update(MaximumKind::PreyVoracity, predator.instar(), prey.voracity());
    }

    /// Records the interaction area of a predator met by one of this species' animals.
    pub fn observe_predator_interaction_area<A: AnimalView>(&self, prey: &A, predator: &A) {
        let radius = predator.interaction_radius();
        self.maxima.update(
            MaximumKind::PredatorInteractionArea,
            prey.instar(),
            std::f64::consts::PI * radius * radius,
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use weaver_genetics::{BaseTrait, Genetics, GeneticsConfig, TraitSlot};
    use weaver_types::{Instar, Point, Rect, ResourceSpeciesId, SpeciesId};

    use super::*;
    use crate::actors::{PreyClass, ResourcePatch};

    struct Critter {
        species: SpeciesId,
        instar: Instar,
        position: Point,
        mass: f64,
        speed: f64,
        voracity: f64,
        genetics: Genetics,
        mobile: bool,
    }

    impl AnimalView for Critter {
        fn species(&self) -> SpeciesId {
            self.species
        }
        fn instar(&self) -> Instar {
            self.instar
        }
        fn instar_to_evaluate_cells(&self) -> Instar {
            self.instar
        }
        fn position(&self) -> Point {
            self.position
        }
        fn dry_mass(&self) -> DryMass {
            DryMass::new(self.mass)
        }
        fn pdf_dry_mass(&self) -> DryMass {
            DryMass::new(self.mass)
        }
        fn speed(&self) -> f64 {
            self.speed
        }
        fn mass_load(&self) -> f64 {
            0.0
        }
        fn voracity(&self) -> f64 {
            self.voracity
        }
        fn interaction_radius(&self) -> f64 {
            1.5
        }
        fn scope_radius(&self) -> f64 {
            5.0
        }
        fn genetics(&self) -> &Genetics {
            &self.genetics
        }
        fn preference(&self, _class: PreyClass) -> f64 {
            1.0
        }
        fn assimilated_mass(&self, mass: DryMass, _class: PreyClass) -> DryMass {
            mass.scaled(0.5)
        }
        fn is_mobile(&self) -> bool {
            self.mobile
        }
    }

    fn genetics_config() -> GeneticsConfig {
        let base: String = BaseTrait::ALL
            .iter()
            .map(|t| match t {
                BaseTrait::Growth => "    growth:\n      definition: { type: individual_level, min: 0.1, max: 0.3, restrict_value: 0.5 }\n".to_owned(),
                other => format!("    {}:\n      definition: {{ type: species_level, value: 1.0 }}\n", other.name()),
            })
            .collect();
        let weights = "  escape_probability_weight:
    Pvelocity: { definition: { type: species_level, value: 0.5 } }
    PattackDistance: { definition: { type: species_level, value: 0.3 } }
  predation_probability_weight:
    Preach: { definition: { type: species_level, value: 0.4 } }
    Ppdf: { definition: { type: species_level, value: 0.3 } }
    PvorPred: { definition: { type: species_level, value: 0.2 } }
  edibility_value_weight:
    Pp: { definition: { type: species_level, value: 0.5 } }
  probability_density_function:
    muForPDF: { definition: { type: species_level, value: 1.0 } }
    sigmaForPDF: { definition: { type: species_level, value: 1.0 } }
";
        let yaml = format!(
            "number_of_loci_per_trait: 10\ncalibration_genomes: 50\ntraits:\n  base:\n{base}{weights}"
        );
        serde_yml::from_str(&yaml).unwrap()
    }

    struct World {
        species: Vec<SpeciesDecisions>,
        genetics: SpeciesGenetics,
        rng: SmallRng,
    }

    impl World {
        fn new() -> Self {
            let mut rng = SmallRng::seed_from_u64(42);
            let genetics = SpeciesGenetics::from_config(&genetics_config(), &mut rng).unwrap();
            let species = vec![SpeciesDecisions::new(DecisionsConfig::default(), &genetics, 4).unwrap()];
            Self {
                species,
                genetics,
                rng,
            }
        }

        fn critter(&mut self, instar: u16, x: f64, mass: f64) -> Critter {
            let (genetics, _) = self.genetics.random_genetics(&mut self.rng).unwrap();
            Critter {
                species: SpeciesId(0),
                instar: Instar::new(instar),
                position: Point::new(x, 0.0),
                mass,
                speed: 1.0,
                voracity: mass * 0.2,
                genetics,
                mobile: true,
            }
        }
    }

    #[test]
    fn immobile_prey_cannot_escape() {
        let mut world = World::new();
        let predator = world.critter(3, 0.0, 2.0);
        let mut prey = world.critter(1, 1.0, 0.5);
        prey.mobile = false;
        let decisions = &world.species[0];
        let p = decisions.predation_probability(&predator, Prey::Animal(&prey), &world.species);
        assert!((p - 1.0).abs() < f64::EPSILON);

        let patch = ResourcePatch {
            class: PreyClass::resource(ResourceSpeciesId(0)),
            area: Rect::square(Point::new(0.0, 0.0), 1.0),
        };
        let p = decisions.predation_probability(&predator, Prey::Resource(patch), &world.species);
        assert!((p - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unobserved_maxima_make_predation_not_computable() {
        let mut world = World::new();
        let predator = world.critter(3, 0.0, 2.0);
        let prey = world.critter(1, 1.0, 0.5);
        let p = world.species[0].predation_probability(&predator, Prey::Animal(&prey), &world.species);
        assert!(p.abs() < f64::EPSILON);
    }

    #[test]
    fn probabilities_stay_in_the_unit_interval() {
        let mut world = World::new();
        let mut animals = Vec::new();
        for (i, mass) in [0.1, 0.5, 1.0, 3.0, 8.0].into_iter().enumerate() {
            let instar = u16::try_from(i % 4).unwrap() + 1;
            animals.push(world.critter(instar, f64::from(u8::try_from(i).unwrap()) * 0.7, mass));
        }
        let decisions = &world.species[0];
        for animal in &animals {
            decisions.observe_voracity(animal);
        }
        for predator in &animals {
            for prey in &animals {
                let escape = decisions.escape_probability(predator, prey);
                if let Ok(escape) = escape {
                    assert!((0.0..=1.0).contains(&escape));
                }
                let p = decisions.predation_probability(predator, Prey::Animal(prey), &world.species);
                assert!((0.0..=1.0).contains(&p), "predation {p}");
                let e = decisions.edibility_value(predator, Prey::Animal(prey), prey.dry_mass(), &world.species);
                assert!((0.0..=1.0).contains(&e), "edibility {e}");
                let q = decisions.cell_quality(predator, Prey::Animal(prey), prey.dry_mass(), &world.species);
                assert!(q >= 0.0 && q <= e + 1e-12, "cell quality {q}");
            }
        }
    }

    #[test]
    fn resource_edibility_blends_predation_and_relative_value() {
        let mut world = World::new();
        let mut predator = world.critter(2, 0.0, 2.0);
        predator.voracity = 1.0;
        let patch = ResourcePatch {
            class: PreyClass::resource(ResourceSpeciesId(0)),
            area: Rect::square(Point::new(2.0, -0.5), 1.0),
        };
        let decisions = &world.species[0];
        let e = decisions.edibility_value(&predator, Prey::Resource(patch), DryMass::new(1.0), &world.species);
        assert!((e - (0.5 * 1.0 + 0.5 * 0.5)).abs() < 1e-12);

        let q = decisions.cell_quality(&predator, Prey::Resource(patch), DryMass::new(1.0), &world.species);
        assert!((q - e * (1.0 - 2.0 / 5.0)).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_kill_probability_is_rejected() {
        let world = World::new();
        let config = DecisionsConfig {
            kill_probability: 1.5,
            ..DecisionsConfig::default()
        };
        assert!(matches!(
            SpeciesDecisions::new(config, &world.genetics, 4),
            Err(DecisionError::InvalidConfig { .. })
        ));
    }
}
