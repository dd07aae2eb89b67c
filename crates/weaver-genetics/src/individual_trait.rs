//! Realised value of one trait for one individual.

use serde::{Deserialize, Serialize};
use weaver_types::TimeStep;

use crate::error::GeneticsError;

/// Constitutive (genome-derived) and phenotypic (temperature-tuned) value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualTrait {
    constitutive: f64,
    phenotypic: f64,
    last_tuned: Option<TimeStep>,
}

impl IndividualTrait {
    /// Creates a trait whose phenotype starts equal to its constitutive value.
    ///
    /// # Errors
    ///
    /// Returns [`GeneticsError::NegativePhenotype`] if `value` is negative
    /// and the trait cannot be negative.
    pub fn new(name: &str, value: f64, can_be_negative: bool) -> Result<Self, GeneticsError> {
        check_sign(name, value, can_be_negative)?;
        Ok(Self {
            constitutive: value,
            phenotypic: value,
            last_tuned: None,
        })
    }

    /// Genome-derived value at the optimal temperature.
    #[must_use]
    pub const fn constitutive(&self) -> f64 {
        self.constitutive
    }

    /// Value currently expressed.
    #[must_use]
    pub const fn phenotypic(&self) -> f64 {
        self.phenotypic
    }

    /// Time step of the last phenotype update.
    #[must_use]
    pub const fn last_tuned(&self) -> Option<TimeStep> {
        self.last_tuned
    }

    /// Sets the phenotype for `time_step`.
    ///
    /// Setting the same value twice in one step is accepted. In debug
    /// builds, a different value in the same step is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`GeneticsError::NegativePhenotype`] for a forbidden negative
    /// value and, in debug builds, [`GeneticsError::PhenotypeAlreadySet`].
    pub fn set_phenotypic(
        &mut self,
        name: &str,
        value: f64,
        can_be_negative: bool,
        time_step: TimeStep,
    ) -> Result<(), GeneticsError> {
        check_sign(name, value, can_be_negative)?;

        #[cfg(debug_assertions)]
        if self.last_tuned == Some(time_step) && (self.phenotypic - value).abs() > f64::EPSILON {
            return Err(GeneticsError::PhenotypeAlreadySet {
                trait_name: name.to_owned(),
                time_step,
            });
        }

        self.phenotypic = value;
        self.last_tuned = Some(time_step);
        Ok(())
    }
}

fn check_sign(name: &str, value: f64, can_be_negative: bool) -> Result<(), GeneticsError> {
    if value < 0.0 && !can_be_negative {
        return Err(GeneticsError::NegativePhenotype {
            trait_name: name.to_owned(),
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn negative_values_need_permission() {
        assert!(IndividualTrait::new("growth", -0.1, false).is_err());
        assert!(IndividualTrait::new("factorEggMass", -0.1, true).is_ok());
    }

    #[test]
    fn same_step_same_value_is_idempotent() {
        let mut value = IndividualTrait::new("growth", 0.2, false).unwrap();
        value.set_phenotypic("growth", 0.25, false, TimeStep::new(3)).unwrap();
        value.set_phenotypic("growth", 0.25, false, TimeStep::new(3)).unwrap();
        assert!((value.phenotypic() - 0.25).abs() < f64::EPSILON);
        assert!((value.constitutive() - 0.2).abs() < f64::EPSILON);
        assert_eq!(value.last_tuned(), Some(TimeStep::new(3)));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn same_step_different_value_is_rejected_in_debug() {
        let mut value = IndividualTrait::new("growth", 0.2, false).unwrap();
        value.set_phenotypic("growth", 0.25, false, TimeStep::new(3)).unwrap();
        let err = value.set_phenotypic("growth", 0.3, false, TimeStep::new(3));
        assert!(matches!(err, Err(GeneticsError::PhenotypeAlreadySet { .. })));
        value.set_phenotypic("growth", 0.3, false, TimeStep::new(4)).unwrap();
    }
}
