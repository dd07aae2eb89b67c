//! Per-species running maxima.
//!
//! Every individual of a species normalises its probabilities against the
//! largest value observed so far for its instar. Updates go through `&self`
//! and are atomic, so a species block can be shared while animals are
//! processed. Values only grow; each effective update bumps a version
//! counter, which lets callers detect whether a maximum moved between two
//! reads.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use weaver_types::Instar;

use crate::error::{NotComputable, ratio};

/// Number of tracked maxima per instar.
const KINDS: usize = 7;

/// Statistic tracked by [`RunningMaxima`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaximumKind {
    /// Voracity of the species' own individuals.
    Voracity,
    /// Interaction area of predators that attacked the species.
    PredatorInteractionArea,
    /// Voracity of the prey the species has met.
    PreyVoracity,
    /// Size-matching density.
    Pdf,
    /// Edible biomass value of a patch.
    PatchEdibility,
    /// Predation risk of a patch.
    PatchPredationRisk,
    /// Conspecific biomass of a patch.
    PatchConspecificBiomass,
}

impl MaximumKind {
    /// All kinds in storage order.
    pub const ALL: [Self; KINDS] = [
        Self::Voracity,
        Self::PredatorInteractionArea,
        Self::PreyVoracity,
        Self::Pdf,
        Self::PatchEdibility,
        Self::PatchPredationRisk,
        Self::PatchConspecificBiomass,
    ];

    /// Storage index of the kind.
    pub const fn index(self) -> usize {
        match self {
            Self::Voracity => 0,
            Self::PredatorInteractionArea => 1,
            Self::PreyVoracity => 2,
            Self::Pdf => 3,
            Self::PatchEdibility => 4,
            Self::PatchPredationRisk => 5,
            Self::PatchConspecificBiomass => 6,
        }
    }
}

/// Atomic per-instar maxima of one species.
#[derive(Debug)]
pub struct RunningMaxima {
    values: Vec<[AtomicU64; KINDS]>,
    version: AtomicU64,
}

/// Plain copy of [`RunningMaxima`] for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningMaximaSnapshot {
    /// Maxima per instar, indexed by [`MaximumKind::index`].
    pub values: Vec<[f64; KINDS]>,
    /// Number of effective updates so far.
    pub version: u64,
}

fn zeroed() -> [AtomicU64; KINDS] {
    std::array::from_fn(|_| AtomicU64::new(0.0_f64.to_bits()))
}

impl RunningMaxima {
    /// All maxima at zero for `instars` instars.
    pub fn new(instars: usize) -> Self {
        Self {
            values: (0..instars).map(|_| zeroed()).collect(),
            version: AtomicU64::new(0),
        }
    }

    /// Number of instars covered.
    pub fn instars(&self) -> usize {
        self.values.len()
    }

    fn cell(&self, kind: MaximumKind, instar: Instar) -> Option<&AtomicU64> {
        self.values.get(instar.index())?.get(kind.index())
    }

    /// Current maximum; zero when nothing was observed or the instar is unknown.
    pub fn get(&self, kind: MaximumKind, instar: Instar) -> f64 {
        self.cell(kind, instar)
            .map_or(0.0, |cell| f64::from_bits(cell.load(Ordering::Acquire)))
    }

    /// Raises the maximum to `value` if it is larger.
    ///
    /// Returns whether the stored maximum changed.
    pub fn update(&self, kind: MaximumKind, instar: Instar, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        let Some(cell) = self.cell(kind, instar) else {
            return false;
        };
        let changed = cell
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (value > f64::from_bits(bits)).then(|| value.to_bits())
            })
            .is_ok();
        if changed {
            self.version.fetch_add(1, Ordering::AcqRel);
        }
        changed
    }

    /// `value` divided by the current maximum, clamped to `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`NotComputable::ZeroRunningMaximum`] before the first
    /// positive observation.
    pub fn normalized(
        &self,
        kind: MaximumKind,
        instar: Instar,
        value: f64,
    ) -> Result<f64, NotComputable> {
        let maximum = self.get(kind, instar);
        if maximum <= 0.0 {
            return Err(NotComputable::ZeroRunningMaximum);
        }
        ratio(value, maximum)
    }

    /// Number of effective updates so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Copies the current values.
    pub fn snapshot(&self) -> RunningMaximaSnapshot {
        RunningMaximaSnapshot {
            values: self
                .values
                .iter()
                .map(|row| std::array::from_fn(|k| row.get(k).map_or(0.0, |c| f64::from_bits(c.load(Ordering::Acquire)))))
                .collect(),
            version: self.version(),
        }
    }

    /// Rebuilds the maxima from a snapshot.
    pub fn from_snapshot(snapshot: &RunningMaximaSnapshot) -> Self {
        Self {
            values: snapshot
                .values
                .iter()
                .map(|row| row.map(|v| AtomicU64::new(v.to_bits())))
                .collect(),
            version: AtomicU64::new(snapshot.version),
        }
    }
}

impl Clone for RunningMaxima {
    fn clone(&self) -> Self {
        Self::from_snapshot(&self.snapshot())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn maxima_only_grow_and_bump_the_version() {
        let maxima = RunningMaxima::new(3);
        let instar = Instar::new(1);
        assert!(maxima.update(MaximumKind::Voracity, instar, 2.0));
        assert!(!maxima.update(MaximumKind::Voracity, instar, 1.0));
        assert!(maxima.update(MaximumKind::Voracity, instar, 3.0));
        assert!((maxima.get(MaximumKind::Voracity, instar) - 3.0).abs() < f64::EPSILON);
        assert_eq!(maxima.version(), 2);
        assert!(maxima.get(MaximumKind::Pdf, instar).abs() < f64::EPSILON);
    }

    #[test]
    fn normalising_against_an_unobserved_maximum_is_not_computable() {
        let maxima = RunningMaxima::new(2);
        let instar = Instar::FIRST;
        assert_eq!(
            maxima.normalized(MaximumKind::Pdf, instar, 1.0),
            Err(NotComputable::ZeroRunningMaximum)
        );
        maxima.update(MaximumKind::Pdf, instar, 4.0);
        assert_eq!(maxima.normalized(MaximumKind::Pdf, instar, 1.0), Ok(0.25));
    }

    #[test]
    fn unknown_instars_and_non_finite_values_are_ignored() {
        let maxima = RunningMaxima::new(1);
        assert!(!maxima.update(MaximumKind::Voracity, Instar::new(5), 1.0));
        assert!(!maxima.update(MaximumKind::Voracity, Instar::FIRST, f64::NAN));
        assert_eq!(maxima.version(), 0);
    }

    #[test]
    fn snapshot_restores_values_and_version() {
        let maxima = RunningMaxima::new(2);
        maxima.update(MaximumKind::PatchEdibility, Instar::new(1), 0.7);
        let restored = RunningMaxima::from_snapshot(&maxima.snapshot());
        assert_eq!(restored.snapshot(), maxima.snapshot());
        assert_eq!(restored.version(), 1);
    }
}
