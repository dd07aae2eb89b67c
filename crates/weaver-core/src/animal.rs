//! One animal and its per-step life cycle.
//!
//! An [`Animal`] owns its genome and realised traits, its growth state, its
//! decision memory and the transient activity of the current step (voracity,
//! radii, distance walked). The spatial tree stores animals by
//! [`AnimalClass`], so every change of life stage or instar goes through
//! [`Animal::set_life_stage`] or a reclassification that keeps the tree in
//! step.
//!
//! Movement and feeding need the whole population and live in
//! [`crate::foraging`]; everything here touches a single animal.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use weaver_decisions::{AnimalView, DecisionMemory, IngestionRecord, PreyClass};
use weaver_genetics::{
    BaseTrait, Gamete, Genetics, GeneticsError, MassCoefficients, PreferenceTrait,
};
use weaver_growth::{DiapauseStep, GrowthError, GrowthOutcome, GrowthTraits, IndividualGrowth};
use weaver_landscape::{AnimalClass, CellId, LandscapeError, MoistureState, SpatialTree};
use weaver_types::{
    AnimalId, Day, DryMass, Gender, Instar, LifeStage, Point, SexualType, SpeciesId, Temperature,
    TimeStep,
};

use crate::metabolism::Metabolism;
use crate::species::AnimalSpecies;

/// Reserve given back to a starving animal of a species that survives
/// without food.
pub const STARVATION_RESERVE: DryMass = DryMass::new(0.1);

/// Errors raised while stepping a single animal.
#[derive(Debug, thiserror::Error)]
pub enum AnimalError {
    /// Trait tuning failed.
    #[error("genetics error: {source}")]
    Genetics {
        /// The underlying genetics error.
        #[from]
        source: GeneticsError,
    },

    /// The growth state machine failed.
    #[error("growth error: {source}")]
    Growth {
        /// The underlying growth error.
        #[from]
        source: GrowthError,
    },

    /// The spatial tree rejected an update.
    #[error("landscape error: {source}")]
    Landscape {
        /// The underlying landscape error.
        #[from]
        source: LandscapeError,
    },

    /// The animal names a species missing from the table.
    #[error("unknown species {species}")]
    UnknownSpecies {
        /// The missing species.
        species: SpeciesId,
    },

    /// The animal is not in the population.
    #[error("unknown animal {id}")]
    UnknownAnimal {
        /// The missing animal.
        id: AnimalId,
    },
}

/// Parents and generation of an animal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    /// Mother, absent for founders.
    pub mother: Option<AnimalId>,
    /// Father, absent for founders and clonal offspring.
    pub father: Option<AnimalId>,
    /// Founders are generation zero.
    pub generation: u32,
}

/// Partner stored by a mated female.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mate {
    /// The male.
    pub id: AnimalId,
    /// Gamete the male passed on.
    pub gamete: Gamete,
}

/// Transient state of the current time step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Activity {
    /// Food the animal pursues this step.
    pub voracity: f64,
    /// Distance the animal may walk this step.
    pub search_radius: f64,
    /// Radius within which the animal perceives patches.
    pub scope_radius: f64,
    /// Radius within which the animal interacts with prey and mates.
    pub interaction_radius: f64,
    /// Distance covered by one move.
    pub speed: f64,
    /// Position of the mass between the previous and next growth targets.
    pub mass_load: f64,
    /// Distance walked this step.
    pub steps: f64,
    /// No distance left to walk.
    pub exhausted: bool,
    /// Point the animal is walking to, if any.
    pub target: Option<Point>,
    /// Dry mass of one of its eggs, `eggDryMass * (1 + factorEggMass)`.
    pub egg_dry_mass: DryMass,
}

/// A new animal about to be placed in the landscape.
#[derive(Debug, Clone)]
pub struct Newborn {
    /// Identifier.
    pub id: AnimalId,
    /// Genome and realised traits.
    pub genetics: Genetics,
    /// Sex.
    pub gender: Gender,
    /// Position.
    pub position: Point,
    /// Leaf containing `position`.
    pub cell: CellId,
    /// Parents and generation.
    pub lineage: Lineage,
    /// Initial life stage.
    pub life_stage: LifeStage,
}

/// Genome and sex of one egg of a clutch.
#[derive(Debug, Clone)]
pub struct Offspring {
    /// Genome and realised traits.
    pub genetics: Genetics,
    /// Sex.
    pub gender: Gender,
    /// Father, when the egg was fertilised.
    pub father: Option<AnimalId>,
}

/// One animal of the simulation.
#[derive(Debug, Clone)]
pub struct Animal {
    pub(crate) id: AnimalId,
    pub(crate) species: SpeciesId,
    pub(crate) mobile: bool,
    pub(crate) life_stage: LifeStage,
    pub(crate) position: Point,
    pub(crate) cell: CellId,
    pub(crate) lineage: Lineage,
    pub(crate) genetics: Genetics,
    pub(crate) traits: GrowthTraits,
    pub(crate) growth: IndividualGrowth,
    pub(crate) memory: DecisionMemory,
    pub(crate) ingestion: IngestionRecord,
    pub(crate) mate: Option<Mate>,
    pub(crate) unborn_steps: u32,
    pub(crate) steps_without_food: u32,
    pub(crate) tuned: bool,
    pub(crate) activity: Activity,
}

impl Animal {
    /// Build an animal as a freshly laid egg of `species`.
    ///
    /// # Errors
    ///
    /// Returns [`AnimalError::Growth`] if the individual growth curve cannot
    /// be fitted.
    pub fn new(
        species: &AnimalSpecies,
        newborn: Newborn,
        temperature: Temperature,
        time_steps_per_day: f64,
    ) -> Result<Self, AnimalError> {
        let traits = GrowthTraits::from_genetics(&newborn.genetics, &species.genetics);
        let growth = IndividualGrowth::new(
            &species.growth,
            &traits,
            newborn.gender,
            temperature,
            time_steps_per_day,
        )?;
        let capacity = DecisionMemory::capacity_for(
            newborn.genetics.phenotypic(BaseTrait::MemoryDepth),
            time_steps_per_day,
        );
        let memory = DecisionMemory::new(capacity, species.links(Instar::FIRST).iter().copied());
        Ok(Self {
            id: newborn.id,
            species: species.id,
            mobile: species.mobile,
            life_stage: newborn.life_stage,
            position: newborn.position,
            cell: newborn.cell,
            lineage: newborn.lineage,
            genetics: newborn.genetics,
            traits,
            growth,
            memory,
            ingestion: IngestionRecord::new(),
            mate: None,
            unborn_steps: 0,
            steps_without_food: 0,
            tuned: false,
            activity: Activity::default(),
        })
    }

    /// Move a founder straight into `instar`.
    ///
    /// Founders of mature instars younger than their first maturation age
    /// start as pupae. Call before the animal is inserted in the tree.
    ///
    /// # Errors
    ///
    /// Returns [`AnimalError::Growth`] for an instar the species lacks.
    pub fn initialise_at_instar(
        &mut self,
        species: &AnimalSpecies,
        instar: Instar,
        rng: &mut impl Rng,
    ) -> Result<(), AnimalError> {
        let pupating = self
            .growth
            .initialise_at_instar(&species.growth, &self.traits, instar, rng)?;
        if instar != Instar::FIRST {
            self.memory
                .change_instar(species.links(instar).iter().copied());
        }
        self.life_stage = if pupating {
            LifeStage::Pupa
        } else {
            LifeStage::Active
        };
        Ok(())
    }

    /// Identifier.
    pub const fn id(&self) -> AnimalId {
        self.id
    }

    /// Current life stage.
    pub const fn life_stage(&self) -> LifeStage {
        self.life_stage
    }

    /// Leaf holding the animal.
    pub const fn cell(&self) -> CellId {
        self.cell
    }

    /// Parents and generation.
    pub const fn lineage(&self) -> Lineage {
        self.lineage
    }

    /// Growth state.
    pub const fn growth(&self) -> &IndividualGrowth {
        &self.growth
    }

    /// Decision memory.
    pub const fn memory(&self) -> &DecisionMemory {
        &self.memory
    }

    /// Food eaten and assimilated this step.
    pub const fn ingestion(&self) -> &IngestionRecord {
        &self.ingestion
    }

    /// Transient state of the current step.
    pub const fn activity(&self) -> &Activity {
        &self.activity
    }

    /// Partner of a mated female.
    pub fn mate_id(&self) -> Option<AnimalId> {
        self.mate.as_ref().map(|mate| mate.id)
    }

    /// Time steps without a meal.
    pub const fn steps_without_food(&self) -> u32 {
        self.steps_without_food
    }

    /// Class the tree stores the animal under.
    pub fn class(&self) -> AnimalClass {
        AnimalClass {
            life_stage: self.life_stage,
            species: self.species,
            instar: self.growth.instar(),
            gender: self.growth.gender(),
        }
    }

    /// Change the life stage and re-bucket the animal in the tree.
    ///
    /// # Errors
    ///
    /// Returns [`LandscapeError::AnimalNotInCell`] if the tree lost track of
    /// the animal.
    pub fn set_life_stage(
        &mut self,
        tree: &mut SpatialTree<AnimalId>,
        life_stage: LifeStage,
    ) -> Result<(), LandscapeError> {
        let old = self.class();
        self.life_stage = life_stage;
        tree.reclassify(self.cell, self.id, old, self.class())
    }

    /// Whether predators and mates can find the animal.
    pub const fn is_searchable(&self) -> bool {
        matches!(self.life_stage, LifeStage::Active | LifeStage::Reproducing)
    }

    /// Food still wanted this step.
    pub fn remaining_voracity(&self) -> DryMass {
        DryMass::new(self.activity.voracity)
            .minus(self.ingestion.total_eaten())
            .max(DryMass::ZERO)
    }

    /// The animal wants no more food this step.
    pub fn is_sated(&self) -> bool {
        self.remaining_voracity().value() <= 0.0
    }

    /// Mature males keep walking to find partners after feeding.
    pub fn is_searching_partner(&self) -> bool {
        self.growth.is_mature() && self.growth.gender() == Gender::Male
    }

    /// Whether a female may lay this step.
    pub fn can_breed(&self, species: &AnimalSpecies) -> bool {
        match self.growth.gender() {
            Gender::Male => false,
            Gender::Hermaphrodite => true,
            Gender::Female => !species.needs_mate() || self.mate.is_some(),
        }
    }

    /// Whether a mature animal still looks for a partner.
    pub fn wants_partner(&self, species: &AnimalSpecies) -> bool {
        if species.sexual_type == SexualType::Asexual || !self.growth.is_mature() {
            return false;
        }
        match self.growth.gender() {
            Gender::Female => self.mate.is_none(),
            Gender::Male => true,
            Gender::Hermaphrodite => false,
        }
    }

    fn is_downregulated(&self, species: &AnimalSpecies, time_steps_per_day: f64) -> bool {
        species.hunts()
            && f64::from(self.steps_without_food)
                >= species.metabolism.days_without_food_for_downregulation * time_steps_per_day
    }

    fn metabolism(&self, species: &AnimalSpecies, temperature: Temperature) -> Metabolism {
        Metabolism {
            dry_mass: self.growth.dry_mass(),
            conversion_to_wet_mass: species.growth.conversion_to_wet_mass(self.growth.instar()),
            met_rate: self.genetics.phenotypic(BaseTrait::MetRate),
            activation_energy: self.genetics.phenotypic(BaseTrait::ActEMet),
            temperature,
            fmr_multiplier: species.metabolism.fmr_multiplier,
        }
    }

    fn allometric(&self, coefficient: BaseTrait, scale: BaseTrait) -> f64 {
        let mass = self.growth.dry_mass().value();
        self.genetics.phenotypic(coefficient) * mass.powf(self.genetics.phenotypic(scale))
    }

    /// Close the previous step: learn from its meals and clear the
    /// transient state. The walking target survives.
    pub fn reset_step(&mut self, species: &AnimalSpecies) {
        self.memory.set_last_ingestion(
            &self.ingestion,
            species.decisions.quality_resource_assessment(),
            self.genetics
                .phenotypic(PreferenceTrait::ExperienceInfluenceWithEdibles),
        );
        self.memory.close_cumulative_predation();
        self.ingestion.clear();
        self.activity = Activity {
            target: self.activity.target,
            ..Activity::default()
        };
    }

    /// Age the animal and run its timers.
    ///
    /// Eggs hatch after `eggDevTime` days, diapausing animals resume when
    /// humidity recovers, pupae emerge when their countdown ends, and
    /// animals past their longevity senesce.
    ///
    /// # Errors
    ///
    /// Returns [`AnimalError::Landscape`] if the tree rejects an update.
    pub fn advance_life(
        &mut self,
        species: &AnimalSpecies,
        tree: &mut SpatialTree<AnimalId>,
        time_steps_per_day: f64,
    ) -> Result<(), AnimalError> {
        match self.life_stage {
            LifeStage::Unborn => {
                self.unborn_steps = self.unborn_steps.saturating_add(1);
                let incubation = TimeStep::from_days(
                    Day::new(self.genetics.phenotypic(BaseTrait::EggDevTime)),
                    time_steps_per_day,
                );
                if TimeStep::new(self.unborn_steps) >= incubation {
                    debug!(animal = %self.id, "Egg hatched");
                    self.set_life_stage(tree, LifeStage::Active)?;
                }
                return Ok(());
            }
            stage if stage.is_dead() => return Ok(()),
            _ => {}
        }

        self.growth.advance_age();
        if self.growth.is_senescent() {
            self.set_life_stage(tree, LifeStage::Senesced)?;
            return Ok(());
        }

        if self.life_stage == LifeStage::Diapause {
            let relative_humidity = tree.moisture_at(self.cell)?.relative_humidity;
            let resumed = match species.diapause_threshold(self.growth.instar()) {
                Some(threshold) => match self.growth.diapause_step(relative_humidity, threshold) {
                    DiapauseStep::Remain => None,
                    DiapauseStep::Resume { into_pupa } => Some(into_pupa),
                },
                None => Some(self.growth.pupa_timer() > 0),
            };
            if let Some(into_pupa) = resumed {
                let next = if into_pupa {
                    LifeStage::Pupa
                } else {
                    LifeStage::Active
                };
                self.set_life_stage(tree, next)?;
            }
        }

        if self.life_stage == LifeStage::Pupa && self.growth.tick_pupa() {
            self.set_life_stage(tree, LifeStage::Active)?;
        }
        Ok(())
    }

    /// Respond to the cell's conditions.
    ///
    /// Retunes the traits to the temperature, recomputes voracity and the
    /// allometric radii, and checks thermal shock and diapause.
    ///
    /// # Errors
    ///
    /// Returns [`AnimalError::Genetics`] for an invalid tuned trait, or
    /// [`AnimalError::Growth`] if the growth curve cannot be refitted.
    pub fn tune(
        &mut self,
        species: &AnimalSpecies,
        tree: &mut SpatialTree<AnimalId>,
        moisture: MoistureState,
        lab_temperature: Temperature,
        time_step: TimeStep,
        time_steps_per_day: f64,
    ) -> Result<(), AnimalError> {
        let temperature = moisture.temperature;
        let allometry = species.growth.allometry(true);
        self.genetics.tune(
            &species.genetics,
            temperature,
            lab_temperature,
            time_step,
            MassCoefficients {
                coefficient: allometry.coefficient,
                scale: allometry.scale,
            },
        )?;
        self.traits = GrowthTraits::from_genetics(&self.genetics, &species.genetics);

        if self.life_stage != LifeStage::Reproducing {
            let basal_loss = self
                .metabolism(species, temperature)
                .loss_per_step(0.0, time_steps_per_day);
            let reached = self.tuned.then_some(self.growth.dry_mass());
            self.growth.predict_next_mass(&species.growth);
            let predicted = self.growth.predicted_voracity(
                basal_loss,
                self.genetics.phenotypic(BaseTrait::Assim),
                reached,
            );
            self.activity.voracity = predicted
                .scaled(self.genetics.phenotypic(BaseTrait::VoracityProportion))
                .value()
                .max(0.0);
        }

        self.activity.scope_radius = self.allometric(
            BaseTrait::CoeffMassForScopeRadius,
            BaseTrait::ScaleMassForScopeRadius,
        );
        self.activity.interaction_radius = self.allometric(
            BaseTrait::CoeffMassForInteractionRadius,
            BaseTrait::ScaleMassForInteractionRadius,
        );
        self.activity.search_radius = self.allometric(
            BaseTrait::CoeffMassForSearchRadius,
            BaseTrait::ScaleMassForSearchRadius,
        ) / time_steps_per_day;
        self.activity.speed =
            self.allometric(BaseTrait::CoeffMassForSpeed, BaseTrait::ScaleMassForSpeed);

        if self.is_downregulated(species, time_steps_per_day) {
            let kept = 1.0 - species.metabolism.percentage_downregulation;
            self.activity.voracity *= kept;
            self.activity.search_radius *= kept;
            self.activity.speed *= kept;
        }
        self.activity.mass_load = self.growth.mass_load(&species.growth);
        let egg = species.growth.egg_dry_mass();
        self.activity.egg_dry_mass = egg.plus(egg.scaled(self.traits.factor_egg_mass));
        self.activity.exhausted = self.activity.search_radius <= 0.0;
        self.tuned = true;

        if self.genetics.phenotypic(BaseTrait::ShockResistance) < temperature.kelvin() {
            debug!(animal = %self.id, kelvin = temperature.kelvin(), "Thermal shock");
            self.set_life_stage(tree, LifeStage::Shocked)?;
            return Ok(());
        }
        if self.life_stage == LifeStage::Active
            && species
                .diapause_threshold(self.growth.instar())
                .is_some_and(|threshold| {
                    IndividualGrowth::should_enter_diapause(moisture.relative_humidity, threshold)
                })
        {
            self.set_life_stage(tree, LifeStage::Diapause)?;
        }

        self.growth
            .tune(&species.growth, &self.traits, temperature)?;
        species.decisions.observe_voracity(&*self);
        Ok(())
    }

    /// Moult or get ready to reproduce when the growth targets are met.
    ///
    /// # Errors
    ///
    /// Returns [`AnimalError::Growth`] when the animal matures without a
    /// reproduction window, or [`AnimalError::Landscape`].
    pub fn grow(
        &mut self,
        species: &AnimalSpecies,
        tree: &mut SpatialTree<AnimalId>,
    ) -> Result<(), AnimalError> {
        let old = self.class();
        match self
            .growth
            .grow(&species.growth, &self.traits, self.can_breed(species))?
        {
            GrowthOutcome::Unchanged => return Ok(()),
            GrowthOutcome::Molted { matured } => {
                let instar = self.growth.instar();
                self.memory
                    .change_instar(species.links(instar).iter().copied());
                if matured && self.growth.pupa_timer() > 0 {
                    self.life_stage = LifeStage::Pupa;
                }
                debug!(animal = %self.id, instar = %instar, matured, "Moulted");
            }
            GrowthOutcome::ReadyToReproduce => self.life_stage = LifeStage::Reproducing,
        }
        tree.reclassify(self.cell, self.id, old, self.class())?;
        Ok(())
    }

    /// Record a meal of `food` from `class`.
    pub fn ingest(&mut self, class: PreyClass, food: DryMass) {
        let assimilated = self.assimilated_mass(food, class);
        self.ingestion.add(class, food, assimilated);
    }

    /// Move the assimilated food of this step into the energy tank.
    pub fn digest(&mut self) {
        self.growth
            .modify_energy_tank(self.ingestion.total_assimilated());
    }

    /// Update the hunger counter at the end of foraging.
    pub fn close_foraging(&mut self, species: &AnimalSpecies) {
        if !species.hunts() {
            return;
        }
        self.steps_without_food = if self.ingestion.is_empty() {
            self.steps_without_food.saturating_add(1)
        } else {
            0
        };
    }

    /// Pay the metabolic cost of the step.
    ///
    /// The share of the step spent moving is the distance walked over the
    /// search radius.
    pub fn metabolize(
        &mut self,
        species: &AnimalSpecies,
        temperature: Temperature,
        time_steps_per_day: f64,
    ) {
        let moving = if self.activity.search_radius > 0.0 {
            self.activity.steps / self.activity.search_radius
        } else {
            0.0
        };
        let mut loss = self
            .metabolism(species, temperature)
            .loss_per_step(moving, time_steps_per_day);
        if self.is_downregulated(species, time_steps_per_day) {
            loss = loss.scaled(1.0 - species.metabolism.percentage_downregulation);
        }
        self.growth.modify_energy_tank(DryMass::ZERO.minus(loss));
    }

    /// Starve the animal if its reserve is gone.
    ///
    /// Returns whether the animal died.
    ///
    /// # Errors
    ///
    /// Returns [`AnimalError::Landscape`] if the tree rejects the update.
    pub fn check_energy_tank(
        &mut self,
        species: &AnimalSpecies,
        tree: &mut SpatialTree<AnimalId>,
    ) -> Result<bool, AnimalError> {
        if self.growth.energy_tank().value() > 0.0 {
            return Ok(false);
        }
        if species.survive_without_food {
            self.growth.reset_energy_tank(STARVATION_RESERVE);
            return Ok(false);
        }
        self.set_life_stage(tree, LifeStage::Starved)?;
        Ok(true)
    }

    /// Gamete passed to a female at mating.
    pub fn gamete(&self, species: &AnimalSpecies, rng: &mut impl Rng) -> Gamete {
        self.genetics.gamete(&species.genetics, rng)
    }

    /// Store the partner of a mated female.
    pub fn mate_with(&mut self, mate: Mate) {
        self.mate = Some(mate);
    }

    /// Sex of a sexually produced egg or founder.
    pub(crate) fn draw_gender(species: &AnimalSpecies, rng: &mut impl Rng) -> Gender {
        if rng.random::<f64>() < species.female_proportion {
            Gender::Female
        } else {
            Gender::Male
        }
    }

    fn offspring(
        &self,
        species: &AnimalSpecies,
        rng: &mut impl Rng,
    ) -> Result<Option<Offspring>, AnimalError> {
        let genome = self.genetics.genome();
        let offspring = match (species.sexual_type, &self.mate) {
            (SexualType::Asexual, _) => Offspring {
                genetics: Genetics::from_gametes(
                    &species.genetics,
                    genome.first_haploid_gamete(),
                    genome.second_haploid_gamete(),
                )?,
                gender: Gender::Female,
                father: None,
            },
            (SexualType::Diploid, None) => return Ok(None),
            (SexualType::Diploid, Some(mate)) => Offspring {
                genetics: Genetics::from_gametes(
                    &species.genetics,
                    self.gamete(species, rng),
                    mate.gamete.clone(),
                )?,
                gender: Self::draw_gender(species, rng),
                father: Some(mate.id),
            },
            (SexualType::Haplodiploid, mate) => {
                let own = self.gamete(species, rng);
                match mate {
                    Some(mate) if Self::draw_gender(species, rng) == Gender::Female => {
                        Offspring {
                            genetics: Genetics::from_gametes(
                                &species.genetics,
                                own,
                                mate.gamete.clone(),
                            )?,
                            gender: Gender::Female,
                            father: Some(mate.id),
                        }
                    }
                    _ => Offspring {
                        genetics: Genetics::from_gametes(&species.genetics, own.clone(), own)?,
                        gender: Gender::Male,
                        father: None,
                    },
                }
            }
        };
        Ok(Some(offspring))
    }

    /// Lay the clutch the growth state prepared.
    ///
    /// Every egg passes a fertility draw. The clutch mass leaves the energy
    /// tank and the animal returns to the active stage.
    ///
    /// # Errors
    ///
    /// Returns [`AnimalError::Genetics`] if a gamete does not match the
    /// species layout, [`AnimalError::Growth`] if the next reproduction
    /// targets cannot be set, or [`AnimalError::Landscape`].
    pub fn breed(
        &mut self,
        species: &AnimalSpecies,
        tree: &mut SpatialTree<AnimalId>,
        rng: &mut impl Rng,
    ) -> Result<Vec<Offspring>, AnimalError> {
        let eggs = self
            .growth
            .eggs_in_clutch(&species.growth, self.traits.factor_egg_mass);
        let fertility = self.genetics.phenotypic(BaseTrait::EggFertility);
        let mut clutch = Vec::new();
        for _ in 0..eggs {
            if rng.random::<f64>() < fertility
                && let Some(offspring) = self.offspring(species, rng)?
            {
                clutch.push(offspring);
            }
        }
        let cost = self.growth.clutch_dry_mass();
        self.growth.after_reproduction(&species.growth, cost)?;
        self.set_life_stage(tree, LifeStage::Active)?;
        debug!(
            animal = %self.id,
            eggs,
            laid = clutch.len(),
            events = self.growth.reproduction_events(),
            "Clutch laid"
        );
        Ok(clutch)
    }
}

impl AnimalView for Animal {
    fn species(&self) -> SpeciesId {
        self.species
    }

    fn instar(&self) -> Instar {
        self.growth.instar()
    }

    fn instar_to_evaluate_cells(&self) -> Instar {
        // A breeding animal judges cells on behalf of its offspring.
        if self.life_stage == LifeStage::Reproducing {
            Instar::FIRST
        } else {
            self.growth.instar()
        }
    }

    fn position(&self) -> Point {
        self.position
    }

    fn dry_mass(&self) -> DryMass {
        self.growth.dry_mass()
    }

    fn pdf_dry_mass(&self) -> DryMass {
        if self.instar_to_evaluate_cells() == self.growth.instar() {
            self.growth.dry_mass()
        } else {
            self.activity.egg_dry_mass
        }
    }

    fn speed(&self) -> f64 {
        self.activity.speed
    }

    fn mass_load(&self) -> f64 {
        self.activity.mass_load
    }

    fn voracity(&self) -> f64 {
        self.activity.voracity
    }

    fn interaction_radius(&self) -> f64 {
        self.activity.interaction_radius
    }

    fn scope_radius(&self) -> f64 {
        self.activity.scope_radius
    }

    fn genetics(&self) -> &Genetics {
        &self.genetics
    }

    fn preference(&self, class: PreyClass) -> f64 {
        self.memory.preference(class)
    }

    fn assimilated_mass(&self, mass: DryMass, _class: PreyClass) -> DryMass {
        mass.scaled(self.genetics.phenotypic(BaseTrait::Assim))
    }

    fn is_mobile(&self) -> bool {
        self.mobile
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::tick::SimulationState;

    const SPIDER: SpeciesId = SpeciesId(0);
    const SPRINGTAIL: SpeciesId = SpeciesId(1);

    fn empty_state() -> SimulationState {
        let mut config = fixtures::config();
        for species in &mut config.species {
            species.initial_population.clear();
        }
        SimulationState::from_config(&config).unwrap()
    }

    fn tuned(state: &mut SimulationState, id: AnimalId) -> Animal {
        state.tune_animal(id).unwrap();
        state.animals.get(&id).unwrap().clone()
    }

    #[test]
    fn tune_derives_radii_from_allometry() {
        let mut state = empty_state();
        let id = state
            .spawn(SPIDER, Instar::new(3), Point::new(4.0, 4.0))
            .unwrap();
        let spider = tuned(&mut state, id);
        let activity = spider.activity();
        assert!((activity.scope_radius - 5.0).abs() < 1e-9);
        assert!((activity.interaction_radius - 2.0).abs() < 1e-9);
        assert!((activity.search_radius - 3.0).abs() < 1e-9);
        assert!((activity.speed - 1.0).abs() < 1e-9);
        assert!(!activity.exhausted);
        assert_eq!(spider.life_stage(), LifeStage::Active);
    }

    #[test]
    fn eggs_hatch_after_development_time() {
        let mut state = empty_state();
        let id = state
            .spawn(SPRINGTAIL, Instar::FIRST, Point::new(2.0, 2.0))
            .unwrap();
        let species = state.species.get(SPRINGTAIL).unwrap().clone();
        let animal = state.animals.get_mut(&id).unwrap();
        animal
            .set_life_stage(&mut state.tree, LifeStage::Unborn)
            .unwrap();

        animal.advance_life(&species, &mut state.tree, 1.0).unwrap();
        assert_eq!(animal.life_stage(), LifeStage::Unborn);
        animal.advance_life(&species, &mut state.tree, 1.0).unwrap();
        assert_eq!(animal.life_stage(), LifeStage::Active);
        assert_eq!(state.tree.total_active(), 1);
    }

    #[test]
    fn starving_hunter_dies_but_grazer_survives() {
        let mut state = empty_state();
        let spider = state
            .spawn(SPIDER, Instar::new(3), Point::new(1.0, 1.0))
            .unwrap();
        let springtail = state
            .spawn(SPRINGTAIL, Instar::FIRST, Point::new(6.0, 6.0))
            .unwrap();
        for id in [spider, springtail] {
            let animal = state.animals.get_mut(&id).unwrap();
            let species = state.species.get(animal.species).unwrap();
            let tank = animal.growth.energy_tank();
            animal
                .growth
                .modify_energy_tank(DryMass::ZERO.minus(tank));
            let died = animal
                .check_energy_tank(species, &mut state.tree)
                .unwrap();
            assert_eq!(died, id == spider);
        }
        let spider = state.animals.get(&spider).unwrap();
        assert_eq!(spider.life_stage(), LifeStage::Starved);
        let springtail = state.animals.get(&springtail).unwrap();
        assert_eq!(springtail.life_stage(), LifeStage::Active);
        assert_eq!(springtail.growth().energy_tank(), STARVATION_RESERVE);
    }

    #[test]
    fn meals_fill_the_tank_and_sate() {
        let mut state = empty_state();
        let id = state
            .spawn(SPIDER, Instar::new(3), Point::new(4.0, 4.0))
            .unwrap();
        state.tune_animal(id).unwrap();
        let animal = state.animals.get_mut(&id).unwrap();
        let wanted = animal.remaining_voracity();
        assert!(wanted.value() > 0.0);
        let tank = animal.growth().energy_tank();
        let class = PreyClass::animal(SPRINGTAIL, Instar::FIRST);
        animal.ingest(class, wanted);
        assert!(animal.is_sated());
        animal.digest();
        let gained = animal.growth().energy_tank().minus(tank).value();
        assert!((gained - wanted.value() * 0.8).abs() < 1e-9);
    }

    #[test]
    fn voracity_stays_total_after_a_meal() {
        let mut state = empty_state();
        let id = state
            .spawn(SPIDER, Instar::new(3), Point::new(4.0, 4.0))
            .unwrap();
        state.tune_animal(id).unwrap();
        let animal = state.animals.get_mut(&id).unwrap();
        let total = animal.activity().voracity;
        let meal = animal.remaining_voracity().scaled(0.5);
        animal.ingest(PreyClass::animal(SPRINGTAIL, Instar::FIRST), meal);

        assert!((AnimalView::voracity(&*animal) - total).abs() < 1e-12);
        let remaining = animal.remaining_voracity().value();
        assert!(remaining < total);
        assert!((remaining - (total - meal.value())).abs() < 1e-9);
    }

    #[test]
    fn breeding_animal_judges_cells_as_its_offspring() {
        let mut state = empty_state();
        let id = state
            .spawn(SPIDER, Instar::new(3), Point::new(4.0, 4.0))
            .unwrap();
        let active = tuned(&mut state, id);
        assert_eq!(active.instar_to_evaluate_cells(), Instar::new(3));
        assert_eq!(active.pdf_dry_mass(), active.growth().dry_mass());

        let egg = state.species.get(SPIDER).unwrap().growth.egg_dry_mass();
        let animal = state.animals.get_mut(&id).unwrap();
        animal
            .set_life_stage(&mut state.tree, LifeStage::Reproducing)
            .unwrap();
        assert_eq!(animal.instar_to_evaluate_cells(), Instar::FIRST);
        assert_eq!(animal.pdf_dry_mass(), animal.activity().egg_dry_mass);
        assert!((animal.pdf_dry_mass().value() - egg.value()).abs() < 1e-12);
        assert!(animal.pdf_dry_mass() != animal.growth().dry_mass());
    }

    #[test]
    fn only_mated_or_clonal_females_breed() {
        let mut state = empty_state();
        let spider = state
            .spawn(SPIDER, Instar::new(3), Point::new(1.0, 1.0))
            .unwrap();
        let springtail = state
            .spawn(SPRINGTAIL, Instar::FIRST, Point::new(6.0, 6.0))
            .unwrap();
        let spiders = state.species.get(SPIDER).unwrap();
        let springtails = state.species.get(SPRINGTAIL).unwrap();

        let springtail = state.animals.get(&springtail).unwrap();
        assert!(springtail.can_breed(springtails));
        assert!(!springtail.wants_partner(springtails));

        let spider = state.animals.get(&spider).unwrap();
        assert!(spider.mate_id().is_none());
        assert!(!spider.can_breed(spiders));
    }
}
