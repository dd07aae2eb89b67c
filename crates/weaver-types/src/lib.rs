//! Shared type definitions for the Weaver ecosystem simulator.
//!
//! This crate is the single source of truth for the identifiers, physical
//! units, enumerations and planar geometry used across the Weaver workspace.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifiers for animals, species and instars
//! - [`units`] -- Physical quantities (masses, lengths, temperatures, time)
//! - [`enums`] -- Life stages, genders, reproduction and hunting strategies
//! - [`geometry`] -- Points, rectangles and disk coverage tests

pub mod enums;
pub mod geometry;
pub mod ids;
pub mod units;

// Re-export all public types at crate root for convenience.
pub use enums::{ExecutionOrder, Gender, HuntingMode, LifeStage, SexualType};
pub use geometry::{Coverage, Point, Rect};
pub use ids::{AnimalId, Instar, ResourceSpeciesId, SpeciesId};
pub use units::{Day, DryMass, Length, Temperature, TimeStep, WetMass};
