//! Error types for the weaver-genetics crate.

use weaver_types::TimeStep;

/// Errors that can occur while building or tuning genetics.
#[derive(Debug, thiserror::Error)]
pub enum GeneticsError {
    /// The genetics configuration is inconsistent.
    #[error("invalid genetics configuration: {reason}")]
    InvalidConfig {
        /// Description of the inconsistency.
        reason: String,
    },

    /// A trait that must be non-negative received a negative phenotype.
    #[error("trait {trait_name} cannot take the negative value {value}")]
    NegativePhenotype {
        /// Name of the offending trait.
        trait_name: String,
        /// The rejected value.
        value: f64,
    },

    /// A phenotype was overwritten with a different value within one time step.
    #[error("trait {trait_name} was already tuned at time step {}", time_step.value())]
    PhenotypeAlreadySet {
        /// Name of the offending trait.
        trait_name: String,
        /// The time step of both writes.
        time_step: TimeStep,
    },

    /// No genome inside the restricted trait ranges was found.
    #[error("no genome inside the restricted ranges after {attempts} attempts")]
    GenomeAttemptsExhausted {
        /// Number of genomes generated and discarded.
        attempts: usize,
    },

    /// Two gametes of different shape were combined.
    #[error("gamete mismatch: expected {expected} chromosomes of {loci} loci")]
    GameteMismatch {
        /// Expected number of chromosomes.
        expected: usize,
        /// Expected loci per chromosome.
        loci: usize,
    },
}
