//! Landscape configuration.
//!
//! The map is a square of `number_of_cells_per_axis` leaf cells per side,
//! each `min_cell_size` wide. Moisture and resources are laid out with
//! patches: a leaf takes its values from the last patch whose shape contains
//! the leaf centre, falling back to the base moisture.

use serde::Deserialize;
use weaver_types::Point;

/// Top-level landscape configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LandscapeConfig {
    /// Leaf cells along one side of the map. Must be a power of two.
    #[serde(default = "default_cells_per_axis")]
    pub number_of_cells_per_axis: u32,
    /// Side length of a leaf cell.
    #[serde(default = "default_min_cell_size")]
    pub min_cell_size: f64,
    /// Moisture applied where no moisture patch matches.
    #[serde(default)]
    pub base_moisture: MoistureConfig,
    /// Moisture patches, later entries winning over earlier ones.
    #[serde(default)]
    pub moisture_patches: Vec<MoisturePatchConfig>,
    /// Resource species and their patches.
    #[serde(default)]
    pub resource_species: Vec<ResourceSpeciesConfig>,
}

fn default_cells_per_axis() -> u32 {
    16
}

fn default_min_cell_size() -> f64 {
    1.0
}

impl Default for LandscapeConfig {
    fn default() -> Self {
        Self {
            number_of_cells_per_axis: default_cells_per_axis(),
            min_cell_size: default_min_cell_size(),
            base_moisture: MoistureConfig::default(),
            moisture_patches: Vec::new(),
            resource_species: Vec::new(),
        }
    }
}

/// Daily temperature and relative humidity cycles of a moisture source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MoistureConfig {
    /// Temperature in Celsius for each day; the cycle repeats.
    #[serde(default = "default_temperature_cycle")]
    pub temperature_cycle: Vec<f64>,
    /// Relative humidity (percent) for each day; the cycle repeats.
    #[serde(default = "default_relative_humidity_cycle")]
    pub relative_humidity_cycle: Vec<f64>,
    /// Predators cannot capture prey inside cells of this source.
    #[serde(default)]
    pub in_enemy_free_space: bool,
    /// Conspecifics are ignored when valuing cells of this source.
    #[serde(default)]
    pub in_competitor_free_space: bool,
}

fn default_temperature_cycle() -> Vec<f64> {
    vec![20.0]
}

fn default_relative_humidity_cycle() -> Vec<f64> {
    vec![70.0]
}

impl Default for MoistureConfig {
    fn default() -> Self {
        Self {
            temperature_cycle: default_temperature_cycle(),
            relative_humidity_cycle: default_relative_humidity_cycle(),
            in_enemy_free_space: false,
            in_competitor_free_space: false,
        }
    }
}

/// A moisture source restricted to a region of the map.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MoisturePatchConfig {
    /// Region covered by the patch.
    pub shape: PatchShape,
    /// Moisture inside the region.
    #[serde(flatten)]
    pub moisture: MoistureConfig,
}

/// Region of the map covered by a patch.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatchShape {
    /// The whole map.
    Homogeneous,
    /// An axis-aligned rectangle, edges included.
    Rectangle {
        /// Lower horizontal bound.
        min_x: f64,
        /// Lower vertical bound.
        min_y: f64,
        /// Upper horizontal bound.
        max_x: f64,
        /// Upper vertical bound.
        max_y: f64,
    },
    /// A disk.
    Disk {
        /// Horizontal centre.
        center_x: f64,
        /// Vertical centre.
        center_y: f64,
        /// Radius.
        radius: f64,
    },
}

impl PatchShape {
    /// Whether the patch covers `point`.
    pub fn contains(self, point: Point) -> bool {
        match self {
            Self::Homogeneous => true,
            Self::Rectangle {
                min_x,
                min_y,
                max_x,
                max_y,
            } => point.x >= min_x && point.x <= max_x && point.y >= min_y && point.y <= max_y,
            Self::Disk {
                center_x,
                center_y,
                radius,
            } => point.distance_to(Point::new(center_x, center_y)) <= radius,
        }
    }
}

/// A resource species (fungus, detritus, plant matter).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResourceSpeciesConfig {
    /// Scientific name, used in logs.
    pub name: String,
    /// Wet mass per unit of dry mass.
    #[serde(default = "default_conversion_to_wet_mass")]
    pub conversion_to_wet_mass: f64,
    /// Intrinsic logistic growth rate per day.
    #[serde(default)]
    pub rate_of_increase: f64,
    /// Lowest relative humidity at which the resource grows.
    #[serde(default)]
    pub min_relative_humidity: f64,
    /// Highest relative humidity at which the resource grows.
    #[serde(default = "default_max_relative_humidity")]
    pub max_relative_humidity: f64,
    /// Where the resource lives.
    #[serde(default)]
    pub patches: Vec<ResourcePatchConfig>,
}

fn default_conversion_to_wet_mass() -> f64 {
    1.0
}

fn default_max_relative_humidity() -> f64 {
    100.0
}

/// Initial and maximum biomass of a resource inside a region.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResourcePatchConfig {
    /// Region covered by the patch.
    pub shape: PatchShape,
    /// Initial wet biomass per unit area.
    pub initial_biomass_density: f64,
    /// Carrying capacity (wet biomass) per unit area.
    pub resource_maximum_capacity_density: f64,
    /// Share of the carrying capacity animals can eat; the rest is a floor
    /// that keeps the resource from being grazed to extinction.
    #[serde(default = "default_edible_fraction")]
    pub edible_fraction_of_max_carrying_capacity: f64,
}

fn default_edible_fraction() -> f64 {
    1.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_patches_from_yaml() {
        let yaml = "
number_of_cells_per_axis: 8
min_cell_size: 0.5
base_moisture:
  temperature_cycle: [18.0, 22.0]
  relative_humidity_cycle: [60.0]
moisture_patches:
  - shape: { type: disk, center_x: 2.0, center_y: 2.0, radius: 1.0 }
    relative_humidity_cycle: [90.0]
    in_enemy_free_space: true
resource_species:
  - name: Mould
    conversion_to_wet_mass: 3.0
    rate_of_increase: 0.4
    patches:
      - shape: { type: homogeneous }
        initial_biomass_density: 1.0
        resource_maximum_capacity_density: 2.0
";
        let config: LandscapeConfig = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.number_of_cells_per_axis, 8);
        assert_eq!(config.base_moisture.temperature_cycle, vec![18.0, 22.0]);
        let patch = config.moisture_patches.first().unwrap();
        assert!(patch.moisture.in_enemy_free_space);
        assert!(patch.shape.contains(Point::new(2.5, 2.0)));
        assert!(!patch.shape.contains(Point::new(4.0, 4.0)));
        let mould = config.resource_species.first().unwrap();
        assert!((mould.max_relative_humidity - 100.0).abs() < f64::EPSILON);
        let resource_patch = mould.patches.first().unwrap();
        assert!(
            (resource_patch.edible_fraction_of_max_carrying_capacity - 1.0).abs() < f64::EPSILON
        );
    }
}
