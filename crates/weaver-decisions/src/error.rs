//! Error types for the weaver-decisions crate.

/// Reasons a sub-probability cannot be evaluated for a given pair.
///
/// These are expected outcomes, not failures: the public scores map them to
/// a default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NotComputable {
    /// The size-matching density is below the species threshold.
    #[error("size-matching density below threshold")]
    BelowPdfThreshold,

    /// A running maximum used for normalisation is still zero.
    #[error("running maximum not yet observed")]
    ZeroRunningMaximum,

    /// The predation probability on this prey is zero.
    #[error("prey is inedible")]
    Inedible,

    /// A ratio has a zero, negative or non-finite denominator.
    #[error("degenerate ratio")]
    DegenerateRatio,
}

/// Errors raised while building a species decision block.
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    /// The decision configuration is inconsistent.
    #[error("invalid decision configuration: {reason}")]
    InvalidConfig {
        /// Description of the inconsistency.
        reason: String,
    },
}

/// `numerator / denominator`, clamped to `[0, 1]`.
///
/// # Errors
///
/// Returns [`NotComputable::DegenerateRatio`] when the denominator is not
/// strictly positive or the result is not finite.
pub fn ratio(numerator: f64, denominator: f64) -> Result<f64, NotComputable> {
    if denominator <= 0.0 || !denominator.is_finite() {
        return Err(NotComputable::DegenerateRatio);
    }
    let value = numerator / denominator;
    if value.is_finite() {
        Ok(value.clamp(0.0, 1.0))
    } else {
        Err(NotComputable::DegenerateRatio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_guards_the_denominator() {
        assert_eq!(ratio(1.0, 0.0), Err(NotComputable::DegenerateRatio));
        assert_eq!(ratio(1.0, f64::NAN), Err(NotComputable::DegenerateRatio));
        assert_eq!(ratio(3.0, 2.0), Ok(1.0));
        assert_eq!(ratio(-1.0, 2.0), Ok(0.0));
        assert_eq!(ratio(1.0, 4.0), Ok(0.25));
    }
}
