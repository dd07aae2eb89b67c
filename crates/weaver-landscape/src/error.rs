//! Error types for the `weaver-landscape` crate.

use weaver_types::ResourceSpeciesId;

use crate::tree::CellId;

/// Errors raised while building or querying the landscape.
#[derive(Debug, thiserror::Error)]
pub enum LandscapeError {
    /// The landscape configuration is inconsistent.
    #[error("invalid landscape configuration: {reason}")]
    InvalidConfig {
        /// Description of the inconsistency.
        reason: String,
    },

    /// A position lies outside the map.
    #[error("point ({x}, {y}) lies outside the map")]
    OutsideMap {
        /// Horizontal coordinate.
        x: f64,
        /// Vertical coordinate.
        y: f64,
    },

    /// A cell handle does not belong to the tree.
    #[error("unknown terrain cell {0:?}")]
    UnknownCell(CellId),

    /// An operation that needs a leaf was given a branch.
    #[error("terrain cell {0:?} is not a leaf")]
    NotALeaf(CellId),

    /// The animal is not stored in the given cell.
    #[error("animal not found in terrain cell {0:?}")]
    AnimalNotInCell(CellId),

    /// The resource species is not present in the given cell.
    #[error("resource species {species:?} not present in terrain cell {cell:?}")]
    ResourceNotInCell {
        /// The cell.
        cell: CellId,
        /// The missing resource species.
        species: ResourceSpeciesId,
    },
}
