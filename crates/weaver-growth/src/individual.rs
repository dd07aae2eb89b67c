//! Per-animal growth state: mass budget, moulting and reproduction targets.
//!
//! Between moults the body mass is fixed and everything an animal eats or
//! burns goes through its energy tank. A moult (or a clutch) re-partitions
//! the total dry mass between body and tank.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use weaver_genetics::{BaseTrait, Genetics, SpeciesGenetics};
use weaver_types::{Day, DryMass, Gender, Instar, Length, Temperature, TimeStep};

use crate::error::GrowthError;
use crate::model::GrowthCurve;
use crate::species::SpeciesGrowth;

/// Growth-relevant trait values of one animal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthTraits {
    /// Growth-curve rate coefficient.
    pub growth: f64,
    /// Length reached at the last instar.
    pub length_at_maturation: f64,
    /// Realised development time in days.
    pub dev_time: f64,
    /// Development time before temperature tuning.
    pub base_dev_time: f64,
    /// Whether the development time follows temperature.
    pub dev_time_is_thermal: bool,
    /// Reserve fraction of the dry mass.
    pub energy_tank: f64,
    /// Relative deviation of the egg mass.
    pub factor_egg_mass: f64,
    /// Pupa duration in days.
    pub pupa_period_time: f64,
    /// Longevity as a multiple of the age at first maturation.
    pub longevity_since_maturation: f64,
}

impl GrowthTraits {
    /// Reads the traits from an animal's genetics.
    pub fn from_genetics(genetics: &Genetics, species: &SpeciesGenetics) -> Self {
        Self {
            growth: genetics.phenotypic(BaseTrait::Growth),
            length_at_maturation: genetics.phenotypic(BaseTrait::LengthAtMaturation),
            dev_time: genetics.phenotypic(BaseTrait::DevTime),
            base_dev_time: genetics.constitutive(BaseTrait::DevTime),
            dev_time_is_thermal: species.is_thermally_dependent(BaseTrait::DevTime),
            energy_tank: genetics.phenotypic(BaseTrait::EnergyTank),
            factor_egg_mass: genetics.phenotypic(BaseTrait::FactorEggMass),
            pupa_period_time: genetics.phenotypic(BaseTrait::PupaPeriodTime),
            longevity_since_maturation: genetics.phenotypic(BaseTrait::LongevitySinceMaturation),
        }
    }
}

/// Result of one call to [`IndividualGrowth::grow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthOutcome {
    /// No target met.
    Unchanged,
    /// The animal moulted into the next instar.
    Molted {
        /// Whether this moult made the animal mature (it now pupates).
        matured: bool,
    },
    /// A reproduction target was met; the caller lays the clutch.
    ReadyToReproduce,
}

/// What a diapausing animal does this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiapauseStep {
    /// Humidity is still too low.
    Remain,
    /// Humidity recovered.
    Resume {
        /// Whether the animal goes back to its interrupted pupa.
        into_pupa: bool,
    },
}

/// Growth state of one animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualGrowth {
    gender: Gender,
    instar: Instar,
    age: TimeStep,
    mature: bool,
    body: DryMass,
    tank: DryMass,
    egg_mass_at_birth: DryMass,
    length_at_birth: Length,
    curve: GrowthCurve,
    /// Start age of every instar, scaled to this individual.
    instar_ages: Vec<TimeStep>,
    /// Expected mass at the start of every instar.
    instar_masses: Vec<DryMass>,
    /// Days per unit of the individual time axis.
    dev_time_scale: f64,
    age_first_maturation: TimeStep,
    longevity: TimeStep,
    pupa_timer: u32,
    diapause_time_steps: u32,
    next_mass_predicted: DryMass,
    previous_next_mass_predicted: DryMass,
    previous_molting_target: DryMass,
    previous_reproduction_target: DryMass,
    mass_for_next_reproduction: DryMass,
    age_for_next_reproduction: TimeStep,
    clutch_dry_mass: DryMass,
    mass_at_maturation: Option<DryMass>,
    capital_breeding_active: bool,
    reproduction_events: u32,
    time_steps_per_day: f64,
}

impl IndividualGrowth {
    /// Growth state of a freshly laid egg.
    ///
    /// # Errors
    ///
    /// Returns a [`GrowthError`] if the individual curve cannot be fitted.
    pub fn new(
        species: &SpeciesGrowth,
        traits: &GrowthTraits,
        gender: Gender,
        temperature: Temperature,
        time_steps_per_day: f64,
    ) -> Result<Self, GrowthError> {
        let egg = species.egg_dry_mass();
        let mut egg_mass_at_birth = egg.plus(egg.scaled(traits.factor_egg_mass));
        if gender == Gender::Female {
            egg_mass_at_birth = egg_mass_at_birth
                .min(egg.plus(egg.scaled(species.max_plasticity())))
                .max(egg.minus(egg.scaled(species.min_plasticity())));
        }
        let length_at_birth = species.allometry(false).length(egg_mass_at_birth);
        let mut growth = Self {
            gender,
            instar: Instar::FIRST,
            age: TimeStep::ZERO,
            mature: false,
            body: DryMass::ZERO,
            tank: DryMass::ZERO,
            egg_mass_at_birth,
            length_at_birth,
            curve: GrowthCurve::Linear {
                l0: length_at_birth.value(),
                slope: 0.0,
            },
            instar_ages: Vec::new(),
            instar_masses: Vec::new(),
            dev_time_scale: 1.0,
            age_first_maturation: TimeStep::ZERO,
            longevity: TimeStep::ZERO,
            pupa_timer: 0,
            diapause_time_steps: 0,
            next_mass_predicted: egg_mass_at_birth,
            previous_next_mass_predicted: egg_mass_at_birth,
            previous_molting_target: egg_mass_at_birth,
            previous_reproduction_target: DryMass::ZERO,
            mass_for_next_reproduction: DryMass::ZERO,
            age_for_next_reproduction: TimeStep::ZERO,
            clutch_dry_mass: DryMass::ZERO,
            mass_at_maturation: None,
            capital_breeding_active: false,
            reproduction_events: 0,
            time_steps_per_day,
        };
        growth.fit_curves(species, traits, temperature)?;
        growth.set_dry_mass(
            species,
            egg_mass_at_birth,
            egg_mass_at_birth,
            traits.energy_tank,
            false,
        );
        Ok(growth)
    }

    fn steps(&self, days: f64) -> TimeStep {
        TimeStep::from_days(Day::new(days), self.time_steps_per_day)
    }

    fn days(&self, steps: TimeStep) -> Day {
        Day::from_time_steps(steps, self.time_steps_per_day)
    }

    /// Refits the individual curve and the instar targets.
    fn fit_curves(
        &mut self,
        species: &SpeciesGrowth,
        traits: &GrowthTraits,
        temperature: Temperature,
    ) -> Result<(), GrowthError> {
        let reference = species.development_time().value();
        let base_proportion = traits.base_dev_time / reference;
        let final_proportion = if traits.dev_time_is_thermal && traits.base_dev_time > 0.0 {
            traits.dev_time / traits.base_dev_time
        } else {
            1.0
        };
        self.dev_time_scale = base_proportion * final_proportion;

        self.curve = GrowthCurve::fit(
            species.model_at(temperature),
            traits.growth,
            self.length_at_birth,
            Length::new(traits.length_at_maturation),
            Day::new(reference * self.dev_time_scale),
        )?;

        let maturation = species.instar_first_maturation();
        self.instar_ages = species
            .age_vector()
            .iter()
            .map(|age| self.steps(age * self.dev_time_scale))
            .collect();
        self.instar_masses = species
            .age_vector()
            .iter()
            .enumerate()
            .map(|(index, age)| {
                let length = self.curve.length_at(Day::new(age * self.dev_time_scale));
                let mature = Instar::from_index(index) >= maturation;
                species.allometry(mature).mass(length)
            })
            .collect();
        if let Some(first) = self.instar_masses.first_mut() {
            *first = self.egg_mass_at_birth;
        }

        self.age_first_maturation = self
            .instar_age(maturation)
            .plus(self.steps(traits.pupa_period_time));
        self.longevity = self
            .age_first_maturation
            .scaled(traits.longevity_since_maturation);
        Ok(())
    }

    /// Re-tunes the curve after the animal's traits responded to temperature.
    ///
    /// # Errors
    ///
    /// Returns a [`GrowthError`] if the curve cannot be fitted.
    pub fn tune(
        &mut self,
        species: &SpeciesGrowth,
        traits: &GrowthTraits,
        temperature: Temperature,
    ) -> Result<(), GrowthError> {
        self.fit_curves(species, traits, temperature)
    }

    /// Re-partitions a new total mass between body and tank.
    ///
    /// `investment` above `mass` is surplus split by `excessInvestInSize`;
    /// the body never shrinks.
    fn set_dry_mass(
        &mut self,
        species: &SpeciesGrowth,
        mass: DryMass,
        investment: DryMass,
        energy_tank_trait: f64,
        molting: bool,
    ) {
        let factor = if molting {
            species.assigned_for_molt()
        } else {
            1.0
        };
        let mass = mass.scaled(factor);
        let investment = investment.scaled(factor);
        let excess = investment.minus(mass);

        let reserved = match species.capital_breeding() {
            Some(capital) if self.capital_breeding_active => self
                .egg_mass_at_birth
                .scaled(species.eggs_per_batch(mass) * f64::from(capital.breeds))
                .min(mass),
            _ => DryMass::ZERO,
        };
        let (tank, mut body) = species.decompose(mass.minus(reserved), energy_tank_trait);
        let mut tank = tank.plus(reserved);
        if excess.value() > 0.0 {
            let in_size = species.excess_invest_in_size();
            tank = tank.plus(excess.scaled(1.0 - in_size));
            body = body.plus(excess.scaled(in_size));
        }
        if body < self.body {
            let total = tank.plus(body);
            body = self.body;
            tank = total.minus(body);
        }
        self.body = body;
        self.tank = tank.max(DryMass::ZERO);
    }

    /// Adds (or with a negative value, burns) reserve mass.
    pub fn modify_energy_tank(&mut self, delta: DryMass) {
        self.tank = self.tank.plus(delta).max(DryMass::ZERO);
    }

    /// Replaces the reserve, for species that survive without food.
    pub const fn reset_energy_tank(&mut self, tank: DryMass) {
        self.tank = tank;
    }

    /// Body plus reserve.
    pub const fn dry_mass(&self) -> DryMass {
        self.body.plus(self.tank)
    }

    /// Structural mass.
    pub const fn body_mass(&self) -> DryMass {
        self.body
    }

    /// Reserve mass.
    pub const fn energy_tank(&self) -> DryMass {
        self.tank
    }

    /// Length implied by the current mass.
    pub fn length(&self, species: &SpeciesGrowth) -> Length {
        species.allometry(self.mature).length(self.dry_mass())
    }

    /// Current instar.
    pub const fn instar(&self) -> Instar {
        self.instar
    }

    /// Age in time steps.
    pub const fn age(&self) -> TimeStep {
        self.age
    }

    /// Ages the animal by one time step.
    pub const fn advance_age(&mut self) {
        self.age = self.age.next();
    }

    /// Whether the animal reached its maturation instar.
    pub const fn is_mature(&self) -> bool {
        self.mature
    }

    /// Sex the state was built for.
    pub const fn gender(&self) -> Gender {
        self.gender
    }

    /// Egg mass at birth.
    pub const fn egg_mass_at_birth(&self) -> DryMass {
        self.egg_mass_at_birth
    }

    /// The fitted curve.
    pub const fn curve(&self) -> &GrowthCurve {
        &self.curve
    }

    /// Start age of an instar (zero for unknown instars).
    pub fn instar_age(&self, instar: Instar) -> TimeStep {
        self.instar_ages
            .get(instar.index())
            .copied()
            .unwrap_or_default()
    }

    /// Expected mass at the start of an instar (zero for unknown instars).
    pub fn instar_mass(&self, instar: Instar) -> DryMass {
        self.instar_masses
            .get(instar.index())
            .copied()
            .unwrap_or_default()
    }

    /// Expected masses of every instar.
    pub fn instar_masses(&self) -> &[DryMass] {
        &self.instar_masses
    }

    /// Age at which the animal first becomes an active adult.
    pub const fn age_first_maturation(&self) -> TimeStep {
        self.age_first_maturation
    }

    /// Age beyond which the animal dies of senescence.
    pub const fn longevity(&self) -> TimeStep {
        self.longevity
    }

    /// Whether the animal outlived its longevity.
    pub fn is_senescent(&self) -> bool {
        self.longevity > TimeStep::ZERO && self.age > self.longevity
    }

    /// Clutches laid so far.
    pub const fn reproduction_events(&self) -> u32 {
        self.reproduction_events
    }

    /// Whether the animal laid every clutch it can lay.
    pub const fn has_exhausted_reproduction(&self, species: &SpeciesGrowth) -> bool {
        self.reproduction_events >= species.female_max_reproduction_events()
    }

    /// Whether the next clutch is funded from stored reserves.
    pub const fn is_capital_breeding(&self) -> bool {
        self.capital_breeding_active
    }

    /// Mass the next clutch will cost.
    pub const fn clutch_dry_mass(&self) -> DryMass {
        self.clutch_dry_mass
    }

    /// Mass target of the next clutch.
    pub const fn mass_for_next_reproduction(&self) -> DryMass {
        self.mass_for_next_reproduction
    }

    /// Age target of the next clutch.
    pub const fn age_for_next_reproduction(&self) -> TimeStep {
        self.age_for_next_reproduction
    }

    /// Mass the animal expects to reach by the next step.
    pub const fn next_mass_predicted(&self) -> DryMass {
        self.next_mass_predicted
    }

    /// Remaining pupa time steps.
    pub const fn pupa_timer(&self) -> u32 {
        self.pupa_timer
    }

    /// Consecutive steps spent in diapause.
    pub const fn diapause_time_steps(&self) -> u32 {
        self.diapause_time_steps
    }

    fn is_reproducer(&self) -> bool {
        self.gender != Gender::Male
    }

    fn meets_molting_targets(&self, species: &SpeciesGrowth) -> bool {
        if self.instar >= species.last_instar() {
            return false;
        }
        let next = self.instar.next();
        let target_age = self.instar_age(next);
        (self.dry_mass() >= self.instar_mass(next) && self.age >= target_age)
            || self.age >= target_age.scaled(1.0 + species.molting_age_threshold())
    }

    fn meets_reproduction_targets(&self, species: &SpeciesGrowth) -> bool {
        if self.has_exhausted_reproduction(species) {
            return false;
        }
        if self.capital_breeding_active {
            return self.age >= self.age_for_next_reproduction;
        }
        (self.dry_mass() >= self.mass_for_next_reproduction
            && self.age >= self.age_for_next_reproduction)
            || self.age
                >= self
                    .age_for_next_reproduction
                    .scaled(1.0 + species.molting_age_threshold())
    }

    /// Advances the moult and reproduction state machine by one step.
    ///
    /// Mature animals check their reproduction target first; an animal
    /// that can both breed and moult breeds and keeps its instar.
    /// `can_breed` is false for males and for unmated females of species
    /// that need a mate.
    ///
    /// # Errors
    ///
    /// Returns [`GrowthError::NoReproductionWindow`] if the animal matures
    /// without time left to reproduce.
    pub fn grow(
        &mut self,
        species: &SpeciesGrowth,
        traits: &GrowthTraits,
        can_breed: bool,
    ) -> Result<GrowthOutcome, GrowthError> {
        if self.mature {
            if can_breed && self.is_reproducer() && self.meets_reproduction_targets(species) {
                return Ok(GrowthOutcome::ReadyToReproduce);
            }
            if species.has_indeterminate_growth() && self.meets_molting_targets(species) {
                self.molt(species, traits);
                if self.is_reproducer() && !self.has_exhausted_reproduction(species) {
                    self.compute_reproduction_targets(species, false)?;
                }
                return Ok(GrowthOutcome::Molted { matured: false });
            }
            return Ok(GrowthOutcome::Unchanged);
        }

        if !self.meets_molting_targets(species) {
            return Ok(GrowthOutcome::Unchanged);
        }
        self.molt(species, traits);
        if self.instar < species.instar_first_maturation() {
            return Ok(GrowthOutcome::Molted { matured: false });
        }

        self.mature = true;
        self.pupa_timer = self.steps(traits.pupa_period_time).value();
        self.capital_breeding_active =
            self.is_reproducer() && species.capital_breeding().is_some();
        if self.is_reproducer() {
            self.compute_reproduction_targets(species, true)?;
        }
        debug!(
            instar = self.instar.value(),
            mass = self.dry_mass().value(),
            pupa_steps = self.pupa_timer,
            "animal matured"
        );
        Ok(GrowthOutcome::Molted { matured: true })
    }

    fn molt(&mut self, species: &SpeciesGrowth, traits: &GrowthTraits) {
        let next = self.instar.next();
        let current = self.dry_mass();
        self.set_dry_mass(
            species,
            current.min(self.instar_mass(next)),
            current,
            traits.energy_tank,
            true,
        );
        if !self.mature {
            self.previous_molting_target = self.dry_mass();
        }
        self.instar = next;
    }

    /// Time steps between two income clutches.
    fn reproduction_interval(&self, species: &SpeciesGrowth) -> Result<f64, GrowthError> {
        let events = species.female_max_reproduction_events();
        let longevity = f64::from(self.longevity.value());
        let maturation = f64::from(self.age_first_maturation.value());
        let interval = match species.capital_breeding() {
            Some(capital) if capital.breeds == events => 0.0,
            Some(capital) => {
                let capital_span = f64::from(self.steps(capital.interval.value()).value())
                    * f64::from(capital.breeds.saturating_sub(1));
                (longevity - capital_span - maturation - 2.0 * f64::from(events))
                    / f64::from(events.saturating_sub(capital.breeds))
            }
            None => (longevity - maturation - 2.0 * f64::from(events)) / f64::from(events),
        };
        if interval < 0.0 || !interval.is_finite() {
            return Err(GrowthError::NoReproductionWindow {
                events,
                longevity: self.longevity.value(),
                maturation: self.age_first_maturation.value(),
            });
        }
        Ok(interval)
    }

    /// Mass the curve predicts at `age` (capped at the last instar's mass).
    fn curve_mass(&self, species: &SpeciesGrowth, age: TimeStep) -> DryMass {
        let last = species.last_instar();
        if age >= self.instar_age(last) {
            return self.instar_mass(last);
        }
        species
            .allometry(self.mature)
            .mass(self.curve.length_at(self.days(age)))
    }

    fn compute_reproduction_targets(
        &mut self,
        species: &SpeciesGrowth,
        update_previous: bool,
    ) -> Result<(), GrowthError> {
        if update_previous {
            self.previous_reproduction_target = self.dry_mass();
        }
        let egg = self.egg_mass_at_birth;
        if self.capital_breeding_active {
            let capital_interval = species
                .capital_breeding()
                .map_or(TimeStep::ZERO, |capital| self.steps(capital.interval.value()));
            self.age_for_next_reproduction = if self.reproduction_events == 0 {
                self.age.max(self.age_first_maturation)
            } else {
                self.age.plus(capital_interval)
            };
            self.mass_for_next_reproduction = self.dry_mass();
            self.clutch_dry_mass = egg.scaled(species.eggs_per_batch(self.dry_mass()));
            return Ok(());
        }

        let interval = TimeStep::from_real(self.reproduction_interval(species)?);
        self.age_for_next_reproduction = if self.reproduction_events == 0 {
            self.age.max(self.age_first_maturation).plus(interval)
        } else {
            self.age.plus(interval)
        };
        let base = if species.has_indeterminate_growth() && self.instar < species.last_instar() {
            self.curve_mass(species, self.age_for_next_reproduction)
        } else {
            *self.mass_at_maturation.get_or_insert(self.dry_mass())
        };
        self.clutch_dry_mass = egg.scaled(species.eggs_per_batch(base));
        self.mass_for_next_reproduction = base.plus(self.clutch_dry_mass);
        Ok(())
    }

    /// Number of eggs the current clutch mass pays for.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn eggs_in_clutch(&self, species: &SpeciesGrowth, factor_egg_mass: f64) -> u32 {
        let egg = species.egg_dry_mass();
        let per_egg = egg.plus(egg.scaled(factor_egg_mass)).value();
        if per_egg <= 0.0 {
            return 0;
        }
        let eggs = (self.clutch_dry_mass.value() / per_egg).floor();
        if eggs.is_nan() || eggs <= 0.0 {
            0
        } else if eggs >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            eggs as u32
        }
    }

    /// Books a laid clutch and sets the next reproduction targets.
    ///
    /// # Errors
    ///
    /// Returns [`GrowthError::NoReproductionWindow`] when the next interval
    /// is negative.
    pub fn after_reproduction(
        &mut self,
        species: &SpeciesGrowth,
        offspring_cost: DryMass,
    ) -> Result<(), GrowthError> {
        self.modify_energy_tank(DryMass::ZERO.minus(offspring_cost));
        self.reproduction_events = self.reproduction_events.saturating_add(1);
        if species
            .capital_breeding()
            .is_some_and(|capital| self.reproduction_events >= capital.breeds)
        {
            self.capital_breeding_active = false;
        }
        if !self.has_exhausted_reproduction(species) {
            self.compute_reproduction_targets(species, true)?;
        }
        Ok(())
    }

    /// Updates the mass expected at the next step.
    pub fn predict_next_mass(&mut self, species: &SpeciesGrowth) {
        self.previous_next_mass_predicted = self.next_mass_predicted;
        let current = self.dry_mass();
        self.next_mass_predicted = if !self.mature {
            self.curve_mass(species, self.age.next()).max(current)
        } else if self.is_reproducer() {
            let target = self.mass_for_next_reproduction;
            if self.has_exhausted_reproduction(species) || self.capital_breeding_active {
                current
            } else if target > current && self.age_for_next_reproduction > self.age {
                let remaining = f64::from(self.age_for_next_reproduction.minus(self.age).value());
                current.plus(target.minus(current).scaled(1.0 / remaining))
            } else {
                current
            }
        } else if species.has_indeterminate_growth() && self.instar < species.last_instar() {
            self.curve_mass(species, self.age.next()).max(current)
        } else {
            self.previous_next_mass_predicted.max(current)
        };
    }

    /// Food the animal would need this step, before the voracity proportion.
    ///
    /// `(nextPredicted - mass + basalLoss + deficit) / assim`, where the
    /// deficit is what the previous prediction missed. Mature capital
    /// breeders do not feed.
    pub fn predicted_voracity(
        &self,
        basal_loss: DryMass,
        assimilation: f64,
        previous_mass_reached: Option<DryMass>,
    ) -> DryMass {
        if (self.mature && self.capital_breeding_active) || assimilation <= 0.0 {
            return DryMass::ZERO;
        }
        let deficit = previous_mass_reached.map_or(DryMass::ZERO, |reached| {
            self.previous_next_mass_predicted
                .minus(reached)
                .max(DryMass::ZERO)
        });
        self.next_mass_predicted
            .minus(self.dry_mass())
            .plus(basal_loss)
            .plus(deficit)
            .scaled(1.0 / assimilation)
            .max(DryMass::ZERO)
    }

    /// Position of the current mass between the previous and next targets.
    pub fn mass_load(&self, species: &SpeciesGrowth) -> f64 {
        let previous = if self.mature && self.is_reproducer() && self.reproduction_events > 0 {
            self.previous_reproduction_target
        } else {
            self.previous_molting_target
        };
        let next = if !self.mature {
            self.instar_mass(self.instar.next())
        } else if self.is_reproducer() {
            self.mass_for_next_reproduction
        } else if species.has_indeterminate_growth() && self.instar < species.last_instar() {
            self.instar_mass(self.instar.next())
        } else {
            self.previous_molting_target
        };
        let span = next.minus(previous).value();
        if span.abs() < f64::EPSILON {
            0.0
        } else {
            (self.dry_mass().minus(previous).value() / span).clamp(0.0, 1.0)
        }
    }

    /// Counts down the pupa; returns `true` once it is over.
    pub const fn tick_pupa(&mut self) -> bool {
        self.pupa_timer = self.pupa_timer.saturating_sub(1);
        self.pupa_timer == 0
    }

    /// Whether humidity is low enough to send the animal into diapause.
    pub const fn should_enter_diapause(relative_humidity: f64, threshold: f64) -> bool {
        relative_humidity < threshold
    }

    /// One diapause step at the given humidity.
    pub const fn diapause_step(&mut self, relative_humidity: f64, threshold: f64) -> DiapauseStep {
        if relative_humidity >= threshold {
            DiapauseStep::Resume {
                into_pupa: self.pupa_timer > 0,
            }
        } else {
            self.diapause_time_steps = self.diapause_time_steps.saturating_add(1);
            DiapauseStep::Remain
        }
    }

    /// Places an initial animal directly in `instar`.
    ///
    /// The age is drawn inside the instar, the mass follows the individual
    /// curve, and mature animals younger than their first maturation age
    /// start in the pupa. Returns whether the animal is pupating.
    ///
    /// # Errors
    ///
    /// Returns [`GrowthError::UnknownInstar`] for an instar the species
    /// lacks, or [`GrowthError::NoReproductionWindow`].
    pub fn initialise_at_instar(
        &mut self,
        species: &SpeciesGrowth,
        traits: &GrowthTraits,
        instar: Instar,
        rng: &mut impl Rng,
    ) -> Result<bool, GrowthError> {
        if instar.index() >= species.instars() {
            return Err(GrowthError::UnknownInstar {
                instar: instar.value(),
                instars: species.instars(),
            });
        }
        if instar == Instar::FIRST {
            return Ok(false);
        }
        let lower = self.instar_age(instar);
        let upper = if instar < species.last_instar() {
            self.instar_age(instar.next())
        } else {
            self.age_first_maturation.max(lower.next())
        };
        self.age = if upper > lower {
            TimeStep::new(rng.random_range(lower.value()..upper.value()))
        } else {
            lower
        };
        self.previous_molting_target =
            self.instar_mass(Instar::from_index(instar.index().saturating_sub(1)));
        self.instar = instar;
        self.mature = instar >= species.instar_first_maturation();
        let expected = self.instar_mass(instar);
        self.set_dry_mass(species, expected, expected, traits.energy_tank, false);

        let mut pupating = false;
        if self.mature {
            if self.age < self.age_first_maturation {
                self.pupa_timer = self.age_first_maturation.minus(self.age).value();
                pupating = self.pupa_timer > 0;
            }
            self.capital_breeding_active =
                self.is_reproducer() && species.capital_breeding().is_some();
            if self.is_reproducer() {
                self.compute_reproduction_targets(species, true)?;
            }
        }
        self.next_mass_predicted = self.dry_mass();
        self.predict_next_mass(species);
        Ok(pupating)
    }
}
