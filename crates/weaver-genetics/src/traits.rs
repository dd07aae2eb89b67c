//! Trait type enumerations.
//!
//! Every trait belongs to exactly one [`ExecutionOrder`] category. Inside a
//! category, traits are addressed by a dense index so that per-animal trait
//! values live in plain vectors.

use serde::{Deserialize, Serialize};
use weaver_types::ExecutionOrder;

/// Common behaviour of the per-category trait enumerations.
pub trait TraitSlot: Copy + Ord + core::fmt::Debug + 'static {
    /// The category this enumeration belongs to.
    const ORDER: ExecutionOrder;

    /// Every trait of the category, in slot order.
    const ALL: &'static [Self];

    /// Dense slot index inside the category.
    fn index(self) -> usize;

    /// Name used in configuration files and log lines.
    fn name(self) -> &'static str;

    /// Whether the trait is a duration or energy whose thermal response is inverted.
    fn is_inverse(self) -> bool {
        false
    }

    /// Whether the trait may take negative values.
    fn can_be_negative(self) -> bool {
        false
    }
}

/// Generates a trait enumeration with serde names and a [`TraitSlot`] impl.
macro_rules! define_traits {
    (
        $(#[$meta:meta])*
        $name:ident : $order:expr => {
            $( $(#[$vmeta:meta])* $variant:ident = $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            const VARIANTS: &'static [Self] = &[$(Self::$variant),+];
        }

        impl TraitSlot for $name {
            const ORDER: ExecutionOrder = $order;
            const ALL: &'static [Self] = Self::VARIANTS;

            fn index(self) -> usize {
                Self::VARIANTS.iter().position(|v| *v == self).unwrap_or_default()
            }

            fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }

            fn is_inverse(self) -> bool {
                inverse_trait(self.name())
            }

            fn can_be_negative(self) -> bool {
                negative_trait(self.name())
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

/// Durations and activation energies respond inversely to temperature.
fn inverse_trait(name: &str) -> bool {
    matches!(name, "eggDevTime" | "actE_met" | "devTime" | "pupaPeriodTime")
}

/// Traits whose realised value may be negative.
fn negative_trait(name: &str) -> bool {
    matches!(name, "factorEggMass" | "muForPDF")
}

define_traits! {
    /// Physiological traits.
    BaseTrait: ExecutionOrder::Base => {
        /// Fraction of dry mass stored as reserve.
        EnergyTank = "energy_tank",
        /// Growth-curve rate coefficient.
        Growth = "growth",
        /// Relative deviation of the egg mass from the species egg mass.
        FactorEggMass = "factorEggMass",
        /// Days from laying to hatching.
        EggDevTime = "eggDevTime",
        /// Length reached at the last instar.
        LengthAtMaturation = "lengthAtMaturation",
        /// Days spent as a pupa.
        PupaPeriodTime = "pupaPeriodTime",
        /// Longevity as a multiple of the age at first maturation.
        LongevitySinceMaturation = "longevitySinceMaturation",
        /// Days of development until the last instar.
        DevTime = "devTime",
        /// Fraction of the predicted voracity actually pursued.
        VoracityProportion = "voracityProportion",
        /// Assimilation efficiency.
        Assim = "assim",
        /// Mass exponent of the metabolic rate.
        MetRate = "met_rate",
        /// Activation energy of the metabolic rate.
        ActEMet = "actE_met",
        /// Days of feeding experience remembered.
        MemoryDepth = "memoryDepth",
        /// Probability that a laid egg is fertile.
        EggFertility = "eggFertility",
        /// Critical thermal maximum in Kelvin.
        ShockResistance = "shock_resistance",
        /// Allometric coefficient of the search radius.
        CoeffMassForSearchRadius = "coeffMassForSearchRadius",
        /// Allometric exponent of the search radius.
        ScaleMassForSearchRadius = "scaleMassForSearchRadius",
        /// Allometric coefficient of the scope radius.
        CoeffMassForScopeRadius = "coeffMassForScopeRadius",
        /// Allometric exponent of the scope radius.
        ScaleMassForScopeRadius = "scaleMassForScopeRadius",
        /// Allometric coefficient of the interaction radius.
        CoeffMassForInteractionRadius = "coeffMassForInteractionRadius",
        /// Allometric exponent of the interaction radius.
        ScaleMassForInteractionRadius = "scaleMassForInteractionRadius",
        /// Allometric coefficient of the speed.
        CoeffMassForSpeed = "coeffMassForSpeed",
        /// Allometric exponent of the speed.
        ScaleMassForSpeed = "scaleMassForSpeed",
    }
}

define_traits! {
    /// Weights of the escape probability terms.
    EscapeWeight: ExecutionOrder::EscapeProbabilityWeight => {
        /// Weight of the velocity-ratio term.
        Pvelocity = "Pvelocity",
        /// Weight of the attack-distance term.
        PattackDistance = "PattackDistance",
    }
}

define_traits! {
    /// Weights of the predation probability terms.
    PredationWeight: ExecutionOrder::PredationProbabilityWeight => {
        /// Weight of the reach (one minus escape) term.
        Preach = "Preach",
        /// Weight of the size-matching term.
        Ppdf = "Ppdf",
        /// Weight of the predator voracity term.
        PvorPred = "PvorPred",
    }
}

define_traits! {
    /// Weights of the edibility value terms.
    EdibilityWeight: ExecutionOrder::EdibilityValueWeight => {
        /// Weight of the predation probability term.
        Pp = "Pp",
    }
}

define_traits! {
    /// Parameters of the lognormal size-matching density.
    PdfParameter: ExecutionOrder::ProbabilityDensityFunction => {
        /// Preferred log ratio of predator to prey mass.
        MuForPdf = "muForPDF",
        /// Spread of the log mass ratio.
        SigmaForPdf = "sigmaForPDF",
    }
}

define_traits! {
    /// Weights of the patch value.
    CellValueTrait: ExecutionOrder::CellValue => {
        /// Balance between food and predation risk.
        CellEvaluationBiomass = "cellEvaluationBiomass",
        /// Attraction towards conspecific biomass.
        CellEvaluationProConspecific = "cellEvaluationProConspecific",
        /// Weight of the conspecific component.
        ConspecificWeight = "conspecificWeight",
    }
}

define_traits! {
    /// Feeding preference traits.
    PreferenceTrait: ExecutionOrder::Preferences => {
        /// Weight of remembered experience against innate preference.
        ExperienceInfluenceWithEdibles = "experienceInfluenceWithEdibles",
    }
}

/// Number of trait slots in a category.
pub const fn slots_in(order: ExecutionOrder) -> usize {
    match order {
        ExecutionOrder::Base => BaseTrait::VARIANTS.len(),
        ExecutionOrder::EscapeProbabilityWeight => EscapeWeight::VARIANTS.len(),
        ExecutionOrder::PredationProbabilityWeight => PredationWeight::VARIANTS.len(),
        ExecutionOrder::EdibilityValueWeight => EdibilityWeight::VARIANTS.len(),
        ExecutionOrder::ProbabilityDensityFunction => PdfParameter::VARIANTS.len(),
        ExecutionOrder::CellValue => CellValueTrait::VARIANTS.len(),
        ExecutionOrder::Preferences => PreferenceTrait::VARIANTS.len(),
    }
}

/// Name of the trait in `slot` of `order`, used for diagnostics.
pub fn slot_name(order: ExecutionOrder, slot: usize) -> &'static str {
    fn lookup<T: TraitSlot>(slot: usize) -> &'static str {
        T::ALL.get(slot).map_or("unknown", |t| t.name())
    }
    match order {
        ExecutionOrder::Base => lookup::<BaseTrait>(slot),
        ExecutionOrder::EscapeProbabilityWeight => lookup::<EscapeWeight>(slot),
        ExecutionOrder::PredationProbabilityWeight => lookup::<PredationWeight>(slot),
        ExecutionOrder::EdibilityValueWeight => lookup::<EdibilityWeight>(slot),
        ExecutionOrder::ProbabilityDensityFunction => lookup::<PdfParameter>(slot),
        ExecutionOrder::CellValue => lookup::<CellValueTrait>(slot),
        ExecutionOrder::Preferences => lookup::<PreferenceTrait>(slot),
    }
}

/// Whether the trait in `slot` of `order` is inverse.
pub fn slot_is_inverse(order: ExecutionOrder, slot: usize) -> bool {
    inverse_trait(slot_name(order, slot))
}

/// Whether the trait in `slot` of `order` may be negative.
pub fn slot_can_be_negative(order: ExecutionOrder, slot: usize) -> bool {
    negative_trait(slot_name(order, slot))
}

/// Dense position of a category, used to index per-category vectors.
pub const fn order_index(order: ExecutionOrder) -> usize {
    match order {
        ExecutionOrder::Base => 0,
        ExecutionOrder::EscapeProbabilityWeight => 1,
        ExecutionOrder::PredationProbabilityWeight => 2,
        ExecutionOrder::EdibilityValueWeight => 3,
        ExecutionOrder::ProbabilityDensityFunction => 4,
        ExecutionOrder::CellValue => 5,
        ExecutionOrder::Preferences => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_indices_follow_declaration_order() {
        assert_eq!(BaseTrait::EnergyTank.index(), 0);
        assert_eq!(BaseTrait::ScaleMassForSpeed.index(), slots_in(ExecutionOrder::Base) - 1);
        assert_eq!(PredationWeight::PvorPred.index(), 2);
    }

    #[test]
    fn inverse_and_negative_flags() {
        assert!(BaseTrait::DevTime.is_inverse());
        assert!(BaseTrait::ActEMet.is_inverse());
        assert!(!BaseTrait::Growth.is_inverse());
        assert!(BaseTrait::FactorEggMass.can_be_negative());
        assert!(PdfParameter::MuForPdf.can_be_negative());
        assert!(!PdfParameter::SigmaForPdf.can_be_negative());
    }

    #[test]
    fn slot_names_round_trip() {
        assert_eq!(slot_name(ExecutionOrder::CellValue, 2), "conspecificWeight");
        assert_eq!(slot_name(ExecutionOrder::Preferences, 9), "unknown");
    }
}
