//! Resource biomass held by leaf cells.
//!
//! Each [`CellResource`] grows logistically toward its carrying capacity
//! while the cell's relative humidity lies inside the species' window.
//! Animals only see the biomass above the minimum edible floor, converted
//! to dry mass.

use serde::{Deserialize, Serialize};
use weaver_types::{DryMass, ResourceSpeciesId, WetMass};

use crate::config::ResourceSpeciesConfig;
use crate::error::LandscapeError;

/// Validated parameters of a resource species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpecies {
    /// Dense id.
    pub id: ResourceSpeciesId,
    /// Scientific name.
    pub name: String,
    /// Wet mass per unit of dry mass.
    pub conversion_to_wet_mass: f64,
    /// Logistic growth rate per day.
    pub rate_of_increase: f64,
    /// Lowest relative humidity at which the resource grows.
    pub min_relative_humidity: f64,
    /// Highest relative humidity at which the resource grows.
    pub max_relative_humidity: f64,
}

impl ResourceSpecies {
    /// Validate a resource species configuration.
    ///
    /// # Errors
    ///
    /// [`LandscapeError::InvalidConfig`] for a non-positive conversion
    /// factor, a non-finite rate, an inverted humidity window or a patch
    /// with negative densities or an edible fraction outside `[0, 1]`.
    pub fn from_config(
        id: ResourceSpeciesId,
        config: &ResourceSpeciesConfig,
    ) -> Result<Self, LandscapeError> {
        let invalid = |reason: &str| LandscapeError::InvalidConfig {
            reason: format!("resource species {}: {reason}", config.name),
        };
        if config.conversion_to_wet_mass <= 0.0 || !config.conversion_to_wet_mass.is_finite() {
            return Err(invalid("conversion_to_wet_mass must be positive"));
        }
        if !config.rate_of_increase.is_finite() {
            return Err(invalid("rate_of_increase must be finite"));
        }
        if config.min_relative_humidity > config.max_relative_humidity {
            return Err(invalid("min_relative_humidity exceeds max_relative_humidity"));
        }
        for patch in &config.patches {
            if patch.initial_biomass_density < 0.0 || patch.resource_maximum_capacity_density < 0.0
            {
                return Err(invalid("patch densities must be non-negative"));
            }
            if !(0.0..=1.0).contains(&patch.edible_fraction_of_max_carrying_capacity) {
                return Err(invalid("edible fraction must lie in [0, 1]"));
            }
        }
        Ok(Self {
            id,
            name: config.name.clone(),
            conversion_to_wet_mass: config.conversion_to_wet_mass,
            rate_of_increase: config.rate_of_increase,
            min_relative_humidity: config.min_relative_humidity,
            max_relative_humidity: config.max_relative_humidity,
        })
    }

    /// Whether the resource grows at `relative_humidity`.
    pub fn grows_at(&self, relative_humidity: f64) -> bool {
        (self.min_relative_humidity..=self.max_relative_humidity).contains(&relative_humidity)
    }
}

/// Biomass of one resource species in one leaf cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellResource {
    species: ResourceSpeciesId,
    biomass: WetMass,
    capacity: WetMass,
    minimum_edible: WetMass,
}

impl CellResource {
    /// Resource with `biomass`, carrying `capacity` and an inedible floor.
    pub const fn new(
        species: ResourceSpeciesId,
        biomass: WetMass,
        capacity: WetMass,
        minimum_edible: WetMass,
    ) -> Self {
        Self {
            species,
            biomass: WetMass::new(biomass.value().max(0.0)),
            capacity,
            minimum_edible,
        }
    }

    /// Resource species.
    pub const fn species(&self) -> ResourceSpeciesId {
        self.species
    }

    /// Current wet biomass.
    pub const fn biomass(&self) -> WetMass {
        self.biomass
    }

    /// Carrying capacity.
    pub const fn capacity(&self) -> WetMass {
        self.capacity
    }

    /// Biomass that can never be eaten.
    pub const fn minimum_edible(&self) -> WetMass {
        self.minimum_edible
    }

    /// Overwrite the biomass, used when restoring a snapshot.
    pub const fn set_biomass(&mut self, biomass: WetMass) {
        self.biomass = WetMass::new(biomass.value().max(0.0));
    }

    /// Wet biomass above the inedible floor.
    pub const fn edible_wet_mass(&self) -> WetMass {
        WetMass::new((self.biomass.value() - self.minimum_edible.value()).max(0.0))
    }

    /// Dry mass an animal reaching `fraction` of the cell can eat.
    pub fn available_dry_mass(&self, conversion_to_wet_mass: f64, fraction: f64) -> DryMass {
        DryMass::from_wet(self.edible_wet_mass(), conversion_to_wet_mass)
            .scaled(fraction.clamp(0.0, 1.0))
    }

    /// One step of logistic growth, `N + r/tspd * N * (1 - N/K)`.
    ///
    /// Nothing happens outside the species' humidity window. Returns the
    /// change in wet biomass, which is negative above capacity.
    pub fn grow(
        &mut self,
        species: &ResourceSpecies,
        relative_humidity: f64,
        time_steps_per_day: f64,
    ) -> f64 {
        if !species.grows_at(relative_humidity) || time_steps_per_day <= 0.0 {
            return 0.0;
        }
        let n = self.biomass.value();
        let k = self.capacity.value();
        if k <= 0.0 {
            return 0.0;
        }
        let rate = species.rate_of_increase / time_steps_per_day;
        let next = (n + rate * n * (1.0 - n / k)).max(0.0);
        self.biomass = WetMass::new(next);
        next - n
    }

    /// Remove up to `dry` dry mass of edible biomass.
    ///
    /// Returns the dry mass actually removed, never eating into the floor.
    pub fn subtract(&mut self, dry: DryMass, conversion_to_wet_mass: f64) -> DryMass {
        let edible = DryMass::from_wet(self.edible_wet_mass(), conversion_to_wet_mass);
        let eaten = dry.max(DryMass::ZERO).min(edible);
        let wet = WetMass::from_dry(eaten, conversion_to_wet_mass);
        self.biomass = WetMass::new((self.biomass.value() - wet.value()).max(0.0));
        eaten
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{PatchShape, ResourcePatchConfig};

    fn species() -> ResourceSpecies {
        ResourceSpecies::from_config(
            ResourceSpeciesId(0),
            &ResourceSpeciesConfig {
                name: "Mould".to_owned(),
                conversion_to_wet_mass: 2.0,
                rate_of_increase: 0.5,
                min_relative_humidity: 40.0,
                max_relative_humidity: 90.0,
                patches: vec![ResourcePatchConfig {
                    shape: PatchShape::Homogeneous,
                    initial_biomass_density: 1.0,
                    resource_maximum_capacity_density: 10.0,
                    edible_fraction_of_max_carrying_capacity: 0.9,
                }],
            },
        )
        .unwrap()
    }

    fn resource() -> CellResource {
        CellResource::new(
            ResourceSpeciesId(0),
            WetMass::new(4.0),
            WetMass::new(10.0),
            WetMass::new(1.0),
        )
    }

    #[test]
    fn logistic_growth_inside_humidity_window() {
        let species = species();
        let mut cell = resource();
        let gained = cell.grow(&species, 60.0, 2.0);
        // 4 + 0.25 * 4 * 0.6
        assert!((gained - 0.6).abs() < 1e-12);
        assert!((cell.biomass().value() - 4.6).abs() < 1e-12);

        let before = cell.biomass();
        assert!(cell.grow(&species, 95.0, 2.0).abs() < f64::EPSILON);
        assert_eq!(cell.biomass(), before);
    }

    #[test]
    fn growth_never_passes_capacity_from_below() {
        let species = species();
        let mut cell = resource();
        for _ in 0..500 {
            cell.grow(&species, 60.0, 2.0);
            assert!(cell.biomass().value() <= cell.capacity().value() + 1e-9);
        }
        assert!((cell.biomass().value() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn animals_only_eat_above_the_floor() {
        let mut cell = resource();
        // (4 - 1) wet / 2 = 1.5 dry
        assert!((cell.available_dry_mass(2.0, 1.0).value() - 1.5).abs() < 1e-12);
        assert!((cell.available_dry_mass(2.0, 0.5).value() - 0.75).abs() < 1e-12);
        let eaten = cell.subtract(DryMass::new(5.0), 2.0);
        assert!((eaten.value() - 1.5).abs() < 1e-12);
        assert!((cell.biomass().value() - 1.0).abs() < 1e-12);
        assert!(cell.available_dry_mass(2.0, 1.0).value().abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_inverted_humidity_window() {
        let config = ResourceSpeciesConfig {
            name: "Dry".to_owned(),
            conversion_to_wet_mass: 1.0,
            rate_of_increase: 0.1,
            min_relative_humidity: 80.0,
            max_relative_humidity: 20.0,
            patches: Vec::new(),
        };
        assert!(matches!(
            ResourceSpecies::from_config(ResourceSpeciesId(0), &config),
            Err(LandscapeError::InvalidConfig { .. })
        ));
    }
}
