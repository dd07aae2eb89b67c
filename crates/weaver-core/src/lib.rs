//! Species assembly, animal behaviour and the tick cycle of Weaver.
//!
//! This crate ties the genetics, decisions, growth and landscape crates
//! together into a running ecosystem: it assembles species from YAML,
//! seeds the initial populations, and drives every animal through the
//! per-step cycle of activation, foraging, metabolism, breeding and death.
//!
//! # Modules
//!
//! - [`animal`] -- One animal: traits, growth state, decision memory and
//!   its per-step life cycle.
//! - [`clock`] -- Simulation clock with time step counter and day conversion.
//! - [`config`] -- Configuration loading from YAML into strongly-typed structs.
//! - [`foraging`] -- Prey, resource and mate search, patch choice and
//!   movement.
//! - [`metabolism`] -- Allometric metabolic mass loss.
//! - [`operator`] -- Run bounds and the cooperative stop flag.
//! - [`output`] -- Movement and predation log buffers.
//! - [`runner`] -- Loop that runs ticks until a stop condition.
//! - [`snapshot`] -- Versioned JSON checkpoints of a run.
//! - [`species`] -- Animal species and their trophic tables.
//! - [`tick`] -- Simulation state and the phases of one time step.
//! - [`view`] -- Progress and error reporting sink.

pub mod animal;
pub mod clock;
pub mod config;
pub mod foraging;
pub mod metabolism;
pub mod operator;
pub mod output;
pub mod runner;
pub mod snapshot;
pub mod species;
pub mod tick;
pub mod view;
