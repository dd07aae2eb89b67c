//! Error types for the weaver-growth crate.

use crate::model::GrowthModelKind;

/// Errors raised while building or advancing growth state.
#[derive(Debug, thiserror::Error)]
pub enum GrowthError {
    /// The growth configuration of a species is inconsistent.
    #[error("invalid growth configuration: {reason}")]
    InvalidConfig {
        /// Description of the inconsistency.
        reason: String,
    },

    /// A growth curve cannot pass through its birth and maturation lengths.
    #[error("{model:?} growth curve cannot be fitted: {reason}")]
    DegenerateModel {
        /// The model being fitted.
        model: GrowthModelKind,
        /// Why the fit failed.
        reason: String,
    },

    /// The time left for reproduction after maturation is negative.
    #[error(
        "no time left for {events} reproduction events: longevity {longevity} steps, first maturation at {maturation} steps"
    )]
    NoReproductionWindow {
        /// Maximum number of reproduction events.
        events: u32,
        /// Individual longevity in time steps.
        longevity: u32,
        /// Age at first maturation in time steps.
        maturation: u32,
    },

    /// An instar outside the species' instar range was requested.
    #[error("instar {instar} outside 1..={instars}")]
    UnknownInstar {
        /// Requested instar.
        instar: u16,
        /// Number of instars of the species.
        instars: usize,
    },
}
