//! Sensory detection model.

use serde::{Deserialize, Serialize};

/// Detection probability at the maximum detection distance.
pub const EPSILON: f64 = 1e-5;

/// Stretched-exponential decay of detection probability with distance.
///
/// The decay rate is solved per query so that the probability reaches
/// [`EPSILON`] at the maximum distance. `beta` controls the shape: values
/// above one keep detection high until close to the limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensoryModel {
    beta: f64,
}

impl SensoryModel {
    /// Creates a model with shape parameter `beta`.
    #[must_use]
    pub const fn new(beta: f64) -> Self {
        Self { beta }
    }

    /// Shape parameter.
    #[must_use]
    pub const fn beta(self) -> f64 {
        self.beta
    }

    /// Probability of detecting something at `distance` when detection is
    /// impossible from `max_distance` onwards.
    #[must_use]
    pub fn probability(self, distance: f64, max_distance: f64) -> f64 {
        if max_distance <= 0.0 || max_distance.is_nan() || distance >= max_distance {
            return 0.0;
        }
        let distance = distance.max(0.0);
        let decay = (-EPSILON.ln()).powf(self.beta.recip()) / max_distance;
        (-(decay * distance).powf(self.beta)).exp()
    }
}
