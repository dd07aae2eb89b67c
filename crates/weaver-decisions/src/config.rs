//! Species decision configuration.
//!
//! Loaded as part of each animal species definition. Every field has a
//! default so species files only override what they need.

use serde::Deserialize;

/// Decision parameters of one animal species.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DecisionsConfig {
    /// Shape of the distance decay of detection.
    #[serde(default)]
    pub sensory_model: SensoryModelConfig,

    /// Predation probability combination.
    #[serde(default)]
    pub predation_probability: PredationProbabilityConfig,

    /// Edibility value combination.
    #[serde(default)]
    pub edibility_value: EdibilityValueConfig,

    /// Probability that a successful encounter ends in a kill.
    #[serde(default = "default_kill_probability")]
    pub kill_probability: f64,

    /// Weight of the individual's own patch maxima against the species
    /// maxima when normalising patch assessments.
    #[serde(default = "default_weight_individual_to_global")]
    pub weight_individual_to_global_assessment: f64,

    /// Size-matching densities below this value make a prey unreachable.
    #[serde(default = "default_pdf_threshold")]
    pub pdf_threshold: f64,
}

/// Sensory model shape.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SensoryModelConfig {
    /// Shape exponent of `exp(-(decay * d)^beta)`.
    #[serde(default = "default_beta")]
    pub beta: f64,
}

/// Escape probability combination.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EscapeProbabilityConfig {
    /// Sum weighted terms instead of multiplying them.
    #[serde(default = "default_true")]
    pub additive_mechanism: bool,
    /// Skip the fleeing term carried by the remaining weight.
    #[serde(default)]
    pub is_remaining_weight_null: bool,
    /// Speed penalty per unit of carried mass load.
    #[serde(default)]
    pub c_velocity: f64,
}

/// Predation probability combination.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredationProbabilityConfig {
    /// Sum weighted terms instead of multiplying them.
    #[serde(default = "default_true")]
    pub additive_mechanism: bool,
    /// Skip the prey voracity term carried by the remaining weight.
    #[serde(default)]
    pub is_remaining_weight_null: bool,
    /// Normalise prey voracity by the predator species' maximum prey
    /// voracity instead of the prey species' maximum voracity.
    #[serde(default)]
    pub use_global_maximum_prey_voracity: bool,
    /// Escape probability used by the reach term.
    #[serde(default)]
    pub escape_probability: EscapeProbabilityConfig,
}

/// Edibility value combination.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EdibilityValueConfig {
    /// Sum weighted terms instead of multiplying them.
    #[serde(default = "default_true")]
    pub additive_mechanism: bool,
    /// Skip the relative resource value carried by the remaining weight.
    #[serde(default)]
    pub is_remaining_weight_null: bool,
    /// Value food by its assimilable mass rather than its dry mass.
    #[serde(default)]
    pub quality_resource_assessment: bool,
}

const fn default_true() -> bool {
    true
}

const fn default_beta() -> f64 {
    2.0
}

const fn default_kill_probability() -> f64 {
    1.0
}

const fn default_weight_individual_to_global() -> f64 {
    0.5
}

const fn default_pdf_threshold() -> f64 {
    1e-4
}

impl Default for SensoryModelConfig {
    fn default() -> Self {
        Self {
            beta: default_beta(),
        }
    }
}

impl Default for EscapeProbabilityConfig {
    fn default() -> Self {
        Self {
            additive_mechanism: true,
            is_remaining_weight_null: false,
            c_velocity: 0.0,
        }
    }
}

impl Default for PredationProbabilityConfig {
    fn default() -> Self {
        Self {
            additive_mechanism: true,
            is_remaining_weight_null: false,
            use_global_maximum_prey_voracity: false,
            escape_probability: EscapeProbabilityConfig::default(),
        }
    }
}

impl Default for EdibilityValueConfig {
    fn default() -> Self {
        Self {
            additive_mechanism: true,
            is_remaining_weight_null: false,
            quality_resource_assessment: false,
        }
    }
}

impl Default for DecisionsConfig {
    fn default() -> Self {
        Self {
            sensory_model: SensoryModelConfig::default(),
            predation_probability: PredationProbabilityConfig::default(),
            edibility_value: EdibilityValueConfig::default(),
            kill_probability: default_kill_probability(),
            weight_individual_to_global_assessment: default_weight_individual_to_global(),
            pdf_threshold: default_pdf_threshold(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: DecisionsConfig = serde_yml::from_str("{}").unwrap();
        assert_eq!(config, DecisionsConfig::default());
    }

    #[test]
    fn nested_escape_configuration() {
        let yaml = "
kill_probability: 0.8
predation_probability:
  use_global_maximum_prey_voracity: true
  escape_probability:
    additive_mechanism: false
    c_velocity: 0.3
edibility_value:
  quality_resource_assessment: true
";
        let config: DecisionsConfig = serde_yml::from_str(yaml).unwrap();
        assert!((config.kill_probability - 0.8).abs() < f64::EPSILON);
        assert!(config.predation_probability.use_global_maximum_prey_voracity);
        assert!(!config.predation_probability.escape_probability.additive_mechanism);
        assert!(config.edibility_value.quality_resource_assessment);
        assert!(config.predation_probability.additive_mechanism);
    }
}
