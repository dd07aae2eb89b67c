//! Animal species assembled from configuration.
//!
//! A species bundles the genetics, decisions and growth blocks of the lower
//! crates with the trophic tables the orchestration needs at every step:
//! innate preferences per instar, the tree search filters for prey,
//! resources, predators and mates, and the habitat and breeding domains.
//!
//! Links name their prey, so the table is built in two passes: every
//! species is assembled first, then links are resolved against the full
//! list of animal and resource species.

use rand::Rng;
use tracing::{debug, info};
use weaver_decisions::{DecisionsLookup, PreyClass, SpeciesDecisions};
use weaver_genetics::SpeciesGenetics;
use weaver_growth::SpeciesGrowth;
use weaver_landscape::{
    AnimalClass, AnimalSearchParams, CellId, ResourceSearchParams, ResourceSpecies, SpatialTree,
};
use weaver_types::{
    AnimalId, Gender, HuntingMode, Instar, LifeStage, ResourceSpeciesId, SexualType, SpeciesId,
    Temperature,
};

use crate::config::{AnimalSpeciesConfig, ConfigError, FeedingLinkConfig, MetabolismConfig};

/// Life stages in which an animal can be found by predators and mates.
pub const SEARCHABLE_STAGES: [LifeStage; 2] = [LifeStage::Active, LifeStage::Reproducing];

/// Trophic tables of one instar.
#[derive(Debug, Clone, Default)]
pub struct InstarTables {
    /// Innate preference for every feeding class.
    pub links: Vec<(PreyClass, f64)>,
    /// Animals this instar eats.
    pub prey: AnimalSearchParams,
    /// Resources this instar eats.
    pub resources: ResourceSearchParams,
    /// Animals that eat this instar.
    pub predators: AnimalSearchParams,
}

impl InstarTables {
    fn link(&mut self, class: PreyClass, preference: f64) {
        match self.links.iter_mut().find(|(known, _)| *known == class) {
            Some(entry) => entry.1 = preference,
            None => self.links.push((class, preference)),
        }
    }
}

/// A fully assembled animal species.
#[derive(Debug, Clone)]
pub struct AnimalSpecies {
    /// Dense id, the position in the configuration.
    pub id: SpeciesId,
    /// Scientific name.
    pub name: String,
    /// How offspring genomes are formed.
    pub sexual_type: SexualType,
    /// Foraging strategy.
    pub hunting_mode: HuntingMode,
    /// Whether the species moves.
    pub mobile: bool,
    /// Share of females among sexually produced offspring.
    pub female_proportion: f64,
    /// Trait definitions and chromosome layout.
    pub genetics: SpeciesGenetics,
    /// Decision rules and running maxima.
    pub decisions: SpeciesDecisions,
    /// Growth curve and reproduction parameters.
    pub growth: SpeciesGrowth,
    /// Metabolic parameters.
    pub metabolism: MetabolismConfig,
    /// Starving animals reset their reserve instead of dying.
    pub survive_without_food: bool,
    initial_population: Vec<u32>,
    background_mortality: Vec<f64>,
    diapause_relative_humidity: Vec<f64>,
    habitat_domain: ResourceSearchParams,
    breeding_domain: ResourceSearchParams,
    instars: Vec<InstarTables>,
    mates_of_females: AnimalSearchParams,
    mates_of_males: AnimalSearchParams,
}

fn invalid(species: &str, reason: impl core::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        reason: format!("species {species}: {reason}"),
    }
}

fn check_per_instar(
    species: &str,
    field: &str,
    values: &[f64],
    instars: usize,
    range: core::ops::RangeInclusive<f64>,
) -> Result<(), ConfigError> {
    if !values.is_empty() && values.len() != instars {
        return Err(invalid(
            species,
            format!("{field} holds {} values for {instars} instars", values.len()),
        ));
    }
    if let Some(value) = values.iter().find(|value| !range.contains(value)) {
        return Err(invalid(species, format!("{field} value {value} out of range")));
    }
    Ok(())
}

fn resolve_domain(
    species: &str,
    names: &[String],
    resources: &[ResourceSpecies],
) -> Result<ResourceSearchParams, ConfigError> {
    let mut domain = ResourceSearchParams::new();
    for name in names {
        let resource = resources
            .iter()
            .find(|resource| resource.name == *name)
            .ok_or_else(|| invalid(species, format!("unknown resource species {name}")))?;
        domain.add(resource.id);
    }
    Ok(domain)
}

impl AnimalSpecies {
    /// Assemble one species without its trophic links.
    fn assemble(
        id: SpeciesId,
        config: &AnimalSpeciesConfig,
        resources: &[ResourceSpecies],
        lab_temperature: Temperature,
        rng: &mut impl Rng,
    ) -> Result<Self, ConfigError> {
        let name = config.name.as_str();
        let genetics = SpeciesGenetics::from_config(&config.genetics, rng)?;
        let growth = SpeciesGrowth::from_config(config.growth.clone(), lab_temperature)?;
        let instars = growth.instars();
        let decisions = SpeciesDecisions::new(config.decisions.clone(), &genetics, instars)?;

        if !(0.0..=1.0).contains(&config.female_proportion) {
            return Err(invalid(name, "female_proportion must lie in [0, 1]"));
        }
        if config.initial_population.len() > instars {
            return Err(invalid(
                name,
                format!(
                    "initial_population holds {} values for {instars} instars",
                    config.initial_population.len()
                ),
            ));
        }
        check_per_instar(
            name,
            "background_mortality",
            &config.background_mortality,
            instars,
            0.0..=1.0,
        )?;
        check_per_instar(
            name,
            "diapause_relative_humidity",
            &config.diapause_relative_humidity,
            instars,
            0.0..=100.0,
        )?;
        let metabolism = &config.metabolism;
        if metabolism.fmr_multiplier <= 0.0 || !metabolism.fmr_multiplier.is_finite() {
            return Err(invalid(name, "fmr_multiplier must be positive"));
        }
        if !(0.0..=1.0).contains(&metabolism.percentage_downregulation) {
            return Err(invalid(name, "percentage_downregulation must lie in [0, 1]"));
        }

        let mut mates_of_females = AnimalSearchParams::new();
        let mut mates_of_males = AnimalSearchParams::new();
        if config.sexual_type != SexualType::Asexual {
            let last = growth.last_instar();
            let first_mature = growth.instar_first_maturation();
            for instar in Instar::up_to(last).filter(|instar| *instar >= first_mature) {
                for life_stage in SEARCHABLE_STAGES {
                    let class = |gender| AnimalClass {
                        life_stage,
                        species: id,
                        instar,
                        gender,
                    };
                    mates_of_females.add(class(Gender::Male));
                    mates_of_males.add(class(Gender::Female));
                }
            }
        }

        Ok(Self {
            id,
            name: config.name.clone(),
            sexual_type: config.sexual_type,
            hunting_mode: config.hunting_mode,
            mobile: config.mobile,
            female_proportion: config.female_proportion,
            genetics,
            decisions,
            growth,
            metabolism: config.metabolism.clone(),
            survive_without_food: config.survive_without_food,
            initial_population: config.initial_population.clone(),
            background_mortality: config.background_mortality.clone(),
            diapause_relative_humidity: config.diapause_relative_humidity.clone(),
            habitat_domain: resolve_domain(name, &config.habitat_domain, resources)?,
            breeding_domain: resolve_domain(name, &config.breeding_domain, resources)?,
            instars: vec![InstarTables::default(); instars],
            mates_of_females,
            mates_of_males,
        })
    }

    /// Number of instars.
    pub fn instar_count(&self) -> usize {
        self.instars.len()
    }

    /// Trophic tables of an instar; empty tables for unknown instars.
    pub fn tables(&self, instar: Instar) -> &InstarTables {
        static EMPTY: std::sync::OnceLock<InstarTables> = std::sync::OnceLock::new();
        self.instars
            .get(instar.index())
            .unwrap_or_else(|| EMPTY.get_or_init(InstarTables::default))
    }

    /// Innate preferences of an instar.
    pub fn links(&self, instar: Instar) -> &[(PreyClass, f64)] {
        &self.tables(instar).links
    }

    /// Search filter for partners of an animal of `gender`.
    pub const fn mate_params(&self, gender: Gender) -> &AnimalSearchParams {
        match gender {
            Gender::Female | Gender::Hermaphrodite => &self.mates_of_females,
            Gender::Male => &self.mates_of_males,
        }
    }

    /// Whether females need a partner before laying.
    pub const fn needs_mate(&self) -> bool {
        matches!(self.sexual_type, SexualType::Diploid)
    }

    /// Whether the species hunts at all.
    pub fn hunts(&self) -> bool {
        self.hunting_mode != HuntingMode::DoesNotHunt
    }

    /// Initial individuals per instar.
    pub fn initial_population(&self) -> impl Iterator<Item = (Instar, u32)> + '_ {
        self.initial_population
            .iter()
            .enumerate()
            .map(|(index, count)| (Instar::from_index(index), *count))
    }

    /// Background death probability of one time step.
    ///
    /// `1 - (1 - p_day)^(1 / tspd)`, so that a full day compounds to the
    /// configured daily probability.
    pub fn background_mortality_per_step(&self, instar: Instar, time_steps_per_day: f64) -> f64 {
        let daily = self
            .background_mortality
            .get(instar.index())
            .copied()
            .unwrap_or(0.0);
        if daily <= 0.0 || time_steps_per_day <= 0.0 {
            return 0.0;
        }
        1.0 - (1.0 - daily).powf(1.0 / time_steps_per_day)
    }

    /// Humidity below which an instar enters diapause, if it ever does.
    pub fn diapause_threshold(&self, instar: Instar) -> Option<f64> {
        self.diapause_relative_humidity.get(instar.index()).copied()
    }

    /// Whether the leaf `cell` belongs to the species' habitat.
    ///
    /// An empty domain accepts every cell.
    pub fn is_habitat(&self, tree: &SpatialTree<AnimalId>, cell: CellId, breeding: bool) -> bool {
        let domain = if breeding {
            &self.breeding_domain
        } else {
            &self.habitat_domain
        };
        if domain.is_empty() {
            return true;
        }
        tree.cell(cell).is_ok_and(|cell| {
            cell.resources()
                .iter()
                .any(|resource| domain.accepts(resource.species()) && resource.biomass().value() > 0.0)
        })
    }
}

/// Every animal species of a run, indexed by [`SpeciesId`].
#[derive(Debug, Clone, Default)]
pub struct SpeciesTable {
    species: Vec<AnimalSpecies>,
}

enum LinkTarget {
    Animal(SpeciesId),
    Resource(ResourceSpeciesId),
}

fn instars_of(
    species: &str,
    field: &str,
    requested: Option<u16>,
    instars: usize,
) -> Result<Vec<Instar>, ConfigError> {
    let last = Instar::from_index(instars.saturating_sub(1));
    match requested {
        None => Ok(Instar::up_to(last).collect()),
        Some(value) if value >= 1 && usize::from(value) <= instars => Ok(vec![Instar::new(value)]),
        Some(value) => Err(invalid(
            species,
            format!("{field} {value} outside 1..={instars}"),
        )),
    }
}

impl SpeciesTable {
    /// Assemble and cross-link every configured species.
    ///
    /// Species are built in configuration order with `rng`, so the same
    /// seed always yields the same chromosome layouts.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an invalid species block, a duplicate
    /// name, or a link naming an unknown prey or instar.
    pub fn from_config(
        configs: &[AnimalSpeciesConfig],
        resources: &[ResourceSpecies],
        lab_temperature: Temperature,
        rng: &mut impl Rng,
    ) -> Result<Self, ConfigError> {
        let mut species = Vec::with_capacity(configs.len());
        for (index, config) in configs.iter().enumerate() {
            if configs
                .iter()
                .take(index)
                .any(|earlier| earlier.name == config.name)
            {
                return Err(invalid(&config.name, "duplicate species name"));
            }
            let id = SpeciesId(u16::try_from(index).map_err(|source| ConfigError::Invalid {
                reason: format!("too many animal species: {source}"),
            })?);
            species.push(AnimalSpecies::assemble(
                id,
                config,
                resources,
                lab_temperature,
                rng,
            )?);
        }
        let mut table = Self { species };
        for (config, index) in configs.iter().zip(0_usize..) {
            for link in &config.links {
                table.add_link(index, &config.name, link, resources)?;
            }
        }
        table.link_predators();
        for species in &table.species {
            info!(
                species = %species.name,
                instars = species.instar_count(),
                sexual_type = ?species.sexual_type,
                "Animal species assembled"
            );
        }
        Ok(table)
    }

    fn add_link(
        &mut self,
        predator: usize,
        name: &str,
        link: &FeedingLinkConfig,
        resources: &[ResourceSpecies],
    ) -> Result<(), ConfigError> {
        if link.preference < 0.0 || !link.preference.is_finite() {
            return Err(invalid(name, "link preference must be non-negative"));
        }
        let target = if let Some(prey) = self.species.iter().find(|s| s.name == link.prey) {
            LinkTarget::Animal(prey.id)
        } else if let Some(resource) = resources.iter().find(|r| r.name == link.prey) {
            LinkTarget::Resource(resource.id)
        } else {
            return Err(invalid(name, format!("unknown prey {}", link.prey)));
        };
        let prey_classes = match target {
            LinkTarget::Animal(prey) => {
                let prey_instars = self
                    .species
                    .get(prey.index())
                    .map_or(0, AnimalSpecies::instar_count);
                instars_of(name, "prey_instar", link.prey_instar, prey_instars)?
                    .into_iter()
                    .map(|instar| PreyClass::animal(prey, instar))
                    .collect()
            }
            LinkTarget::Resource(resource) => vec![PreyClass::resource(resource)],
        };
        let species = self
            .species
            .get_mut(predator)
            .ok_or_else(|| invalid(name, "unknown predator"))?;
        let predator_instars = instars_of(
            name,
            "predator_instar",
            link.predator_instar,
            species.instar_count(),
        )?;
        for instar in predator_instars {
            let Some(tables) = species.instars.get_mut(instar.index()) else {
                continue;
            };
            for class in &prey_classes {
                tables.link(*class, link.preference);
                match target {
                    LinkTarget::Animal(prey) => {
                        for life_stage in SEARCHABLE_STAGES {
                            tables.prey.add_all_genders(life_stage, prey, class.instar);
                        }
                    }
                    LinkTarget::Resource(resource) => tables.resources.add(resource),
                }
            }
        }
        Ok(())
    }

    /// Fill every instar's predator filter from the other species' links.
    fn link_predators(&mut self) {
        let mut edges = Vec::new();
        for predator in &self.species {
            for (index, tables) in predator.instars.iter().enumerate() {
                for (class, _) in &tables.links {
                    if let weaver_decisions::SpeciesKey::Animal(prey) = class.species {
                        edges.push((prey, class.instar, predator.id, Instar::from_index(index)));
                    }
                }
            }
        }
        for (prey, prey_instar, predator, predator_instar) in edges {
            let Some(tables) = self
                .species
                .get_mut(prey.index())
                .and_then(|species| species.instars.get_mut(prey_instar.index()))
            else {
                continue;
            };
            for life_stage in SEARCHABLE_STAGES {
                tables
                    .predators
                    .add_all_genders(life_stage, predator, predator_instar);
            }
        }
        debug!(species = self.species.len(), "Predator filters linked");
    }

    /// A species by id.
    pub fn get(&self, id: SpeciesId) -> Option<&AnimalSpecies> {
        self.species.get(id.index())
    }

    /// Mutable access, used when restoring running maxima.
    pub fn get_mut(&mut self, id: SpeciesId) -> Option<&mut AnimalSpecies> {
        self.species.get_mut(id.index())
    }

    /// Every species in id order.
    pub fn iter(&self) -> impl Iterator<Item = &AnimalSpecies> {
        self.species.iter()
    }

    /// Number of species.
    pub fn len(&self) -> usize {
        self.species.len()
    }

    /// Whether the table holds no species.
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }
}

impl DecisionsLookup for SpeciesTable {
    fn species_decisions(&self, species: SpeciesId) -> Option<&SpeciesDecisions> {
        self.get(species).map(|species| &species.decisions)
    }
}
