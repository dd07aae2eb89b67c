//! Type-safe identifiers.
//!
//! Animals carry a UUID so that offspring created during a run never collide
//! with founders. Seeded runs derive the UUID bytes from the simulation RNG
//! ([`AnimalId::from_rng`]) so that two runs with the same seed produce the
//! same identifiers. Species are small dense indices into the species table.

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Create an identifier from random bytes drawn from `rng`.
            pub fn from_rng(rng: &mut impl Rng) -> Self {
                Self(uuid::Builder::from_random_bytes(rng.random::<[u8; 16]>()).into_uuid())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an individual animal.
    AnimalId
}

/// Dense index of an animal species in the species table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpeciesId(pub u16);

impl SpeciesId {
    /// Position of the species in the species table.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl core::fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "species-{}", self.0)
    }
}

/// Dense index of a resource species (fungus, plant matter) in the resource table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceSpeciesId(pub u16);

impl ResourceSpeciesId {
    /// Position of the resource species in the resource table.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// A developmental stage between molts. Instars are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Instar(u16);

impl Instar {
    /// The first instar (the newly hatched individual).
    pub const FIRST: Self = Self(1);

    /// Build an instar from its 1-based number. Zero is promoted to the first instar.
    pub const fn new(value: u16) -> Self {
        if value == 0 { Self::FIRST } else { Self(value) }
    }

    /// The 1-based instar number.
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Zero-based position for per-instar vectors.
    pub fn index(self) -> usize {
        usize::from(self.0.saturating_sub(1))
    }

    /// Build an instar from a zero-based per-instar vector position.
    pub fn from_index(index: usize) -> Self {
        Self(u16::try_from(index).unwrap_or(u16::MAX - 1).saturating_add(1))
    }

    /// The instar reached after the next molt.
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// The instar before the last molt, never below the first.
    pub const fn previous(self) -> Self {
        Self::new(self.0.saturating_sub(1))
    }

    /// Iterate over every instar from the first up to `last` inclusive.
    pub fn up_to(last: Self) -> impl Iterator<Item = Self> {
        (1..=last.0).map(Self)
    }
}

impl TryFrom<u16> for Instar {
    type Error = &'static str;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value == 0 {
            Err("instars are numbered from 1")
        } else {
            Ok(Self(value))
        }
    }
}

impl From<Instar> for u16 {
    fn from(instar: Instar) -> Self {
        instar.0
    }
}

impl core::fmt::Display for Instar {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn seeded_ids_are_reproducible() {
        let mut a = SmallRng::seed_from_u64(42);
        let mut b = SmallRng::seed_from_u64(42);
        assert_eq!(AnimalId::from_rng(&mut a), AnimalId::from_rng(&mut b));
        assert_ne!(AnimalId::from_rng(&mut a), AnimalId::from_rng(&mut a));
    }

    #[test]
    fn instar_indexing_is_one_based() {
        let third = Instar::new(3);
        assert_eq!(third.index(), 2);
        assert_eq!(third.next().value(), 4);
        assert_eq!(Instar::FIRST.previous(), Instar::FIRST);
        assert_eq!(Instar::from_index(0), Instar::FIRST);
        assert_eq!(Instar::up_to(third).count(), 3);
    }

    #[test]
    fn instar_rejects_zero_on_deserialize() {
        let parsed: Result<Instar, _> = serde_json::from_str("0");
        assert!(parsed.is_err());
        let parsed: Instar = serde_json::from_str("2").unwrap();
        assert_eq!(parsed.value(), 2);
    }
}
