//! Landscape for Weaver: the spatial tree of terrain cells.
//!
//! The map is a square quadtree whose leaves hold animals (bucketed by
//! [`AnimalClass`]), resource biomass and a moisture source. Radius queries
//! return candidate cells, animals and resources; ranking and exact
//! distance filtering belong to the caller.
//!
//! # Modules
//!
//! - [`config`] -- Deserializable map, moisture and resource configuration
//! - [`error`] -- Landscape error types
//! - [`moisture`] -- Daily temperature and humidity cycles
//! - [`resource`] -- Resource species and logistic biomass growth
//! - [`search`] -- Animal and resource search filters
//! - [`tree`] -- Arena quadtree with incremental population counters

pub mod config;
pub mod error;
pub mod moisture;
pub mod resource;
pub mod search;
pub mod tree;

pub use config::{
    LandscapeConfig, MoistureConfig, MoisturePatchConfig, PatchShape, ResourcePatchConfig,
    ResourceSpeciesConfig,
};
pub use error::LandscapeError;
pub use moisture::{MoistureSource, MoistureState};
pub use resource::{CellResource, ResourceSpecies};
pub use search::{AnimalClass, AnimalSearchParams, ResourceSearchParams};
pub use tree::{AnimalHit, CellHit, CellId, ResourceBiomass, ResourceHit, SpatialTree, TerrainCell};
