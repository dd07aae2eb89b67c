//! Enumeration types shared by every Weaver crate.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Life stages
// ---------------------------------------------------------------------------

/// The life-stage state of an individual animal.
///
/// `Unborn -> Active <-> {Diapause, Pupa} -> Active -> Reproducing -> Active`,
/// with every living stage able to move into one of the terminal stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeStage {
    /// Egg still developing.
    Unborn,
    /// Moving, feeding and growing.
    Active,
    /// Metamorphosing into the adult form.
    Pupa,
    /// Dormant because of unfavourable humidity.
    Diapause,
    /// Laying its current clutch this time step.
    Reproducing,
    /// Eaten by a predator.
    Predated,
    /// Killed by background mortality.
    Background,
    /// Energy tank exhausted.
    Starved,
    /// Exceeded its longevity or its reproduction events.
    Senesced,
    /// Exposed to a temperature above its critical maximum.
    Shocked,
}

impl LifeStage {
    /// Every life stage, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Unborn,
        Self::Active,
        Self::Pupa,
        Self::Diapause,
        Self::Reproducing,
        Self::Predated,
        Self::Background,
        Self::Starved,
        Self::Senesced,
        Self::Shocked,
    ];

    /// Whether the animal is still part of the living population.
    pub const fn is_alive(self) -> bool {
        matches!(
            self,
            Self::Unborn | Self::Active | Self::Pupa | Self::Diapause | Self::Reproducing
        )
    }

    /// Whether the stage is terminal.
    pub const fn is_dead(self) -> bool {
        !self.is_alive()
    }

    /// Dense position for per-stage lookup tables.
    pub const fn index(self) -> usize {
        match self {
            Self::Unborn => 0,
            Self::Active => 1,
            Self::Pupa => 2,
            Self::Diapause => 3,
            Self::Reproducing => 4,
            Self::Predated => 5,
            Self::Background => 6,
            Self::Starved => 7,
            Self::Senesced => 8,
            Self::Shocked => 9,
        }
    }
}

impl core::fmt::Display for LifeStage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            Self::Unborn => "unborn",
            Self::Active => "active",
            Self::Pupa => "pupa",
            Self::Diapause => "diapause",
            Self::Reproducing => "reproducing",
            Self::Predated => "predated",
            Self::Background => "background",
            Self::Starved => "starved",
            Self::Senesced => "senesced",
            Self::Shocked => "shocked",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Sex and reproduction
// ---------------------------------------------------------------------------

/// Sex of an individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    /// Produces sperm; searches for mates once mature.
    Male,
    /// Produces eggs.
    Female,
    /// Both; only valid for asexual species.
    Hermaphrodite,
}

impl Gender {
    /// Every gender, in declaration order.
    pub const ALL: [Self; 3] = [Self::Male, Self::Female, Self::Hermaphrodite];

    /// Dense position for per-gender lookup tables.
    pub const fn index(self) -> usize {
        match self {
            Self::Male => 0,
            Self::Female => 1,
            Self::Hermaphrodite => 2,
        }
    }
}

/// How offspring genomes are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SexualType {
    /// Clonal reproduction; every offspring is female.
    Asexual,
    /// Both parents contribute a meiotic gamete.
    Diploid,
    /// Fertilised eggs become females, unfertilised eggs become males.
    Haplodiploid,
}

// ---------------------------------------------------------------------------
// Foraging
// ---------------------------------------------------------------------------

/// Foraging strategy of a species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HuntingMode {
    /// Feeds only on resources.
    DoesNotHunt,
    /// Waits for prey to enter its interaction area.
    SitAndWait,
    /// Actively pursues prey.
    ActiveHunting,
}

// ---------------------------------------------------------------------------
// Trait execution order
// ---------------------------------------------------------------------------

/// Category of a genetic trait, in the order the categories are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOrder {
    /// Physiological traits (growth, metabolism, allometry).
    Base,
    /// Weights of the escape probability.
    EscapeProbabilityWeight,
    /// Weights of the predation probability.
    PredationProbabilityWeight,
    /// Weights of the edibility value.
    EdibilityValueWeight,
    /// Parameters of the predator/prey size-matching PDF.
    ProbabilityDensityFunction,
    /// Weights of the patch value.
    CellValue,
    /// Experience-versus-innate preference balance.
    Preferences,
}

impl ExecutionOrder {
    /// Every category, in evaluation order.
    pub const ALL: [Self; 7] = [
        Self::Base,
        Self::EscapeProbabilityWeight,
        Self::PredationProbabilityWeight,
        Self::EdibilityValueWeight,
        Self::ProbabilityDensityFunction,
        Self::CellValue,
        Self::Preferences,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn life_stage_indices_are_dense() {
        for (position, stage) in LifeStage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), position);
        }
    }

    #[test]
    fn only_living_stages_are_alive() {
        assert!(LifeStage::Pupa.is_alive());
        assert!(LifeStage::Reproducing.is_alive());
        assert!(LifeStage::Starved.is_dead());
        assert!(LifeStage::Shocked.is_dead());
    }
}
