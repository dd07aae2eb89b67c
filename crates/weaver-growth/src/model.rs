//! Individual length-at-age curves.
//!
//! Every curve is fitted so that it starts at the length at birth and
//! reaches the length at maturation at the age of the last instar. The rate
//! coefficient comes from the animal's `growth` trait.

use serde::{Deserialize, Serialize};
use weaver_types::{Day, Length};

use crate::error::GrowthError;

/// Family of growth curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthModelKind {
    /// `L(t) = Linf - (Linf - L0) e^(-kt)`.
    VonBertalanffy,
    /// Three-parameter logistic (lower asymptote at zero).
    Logistic,
    /// Four-parameter logistic with lower asymptote `A`.
    #[serde(rename = "logistic_4p")]
    Logistic4P,
    /// `L(t) = Linf exp(-b e^(-kt))`.
    Gompertz,
    /// Accelerating exponential growth.
    Exponential,
    /// Constant growth rate.
    Linear,
}

/// A model family together with its extra shape parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelChoice {
    /// Curve family.
    pub model: GrowthModelKind,
    /// Lower asymptote of the four-parameter logistic; ignored otherwise.
    #[serde(default)]
    pub a: f64,
}

impl ModelChoice {
    /// A model without a shape parameter.
    pub const fn new(model: GrowthModelKind) -> Self {
        Self { model, a: 0.0 }
    }
}

/// A growth curve fitted to one individual.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum GrowthCurve {
    /// Von Bertalanffy curve.
    VonBertalanffy {
        /// Rate coefficient.
        k: f64,
        /// Length at age zero.
        l0: f64,
        /// Asymptotic length.
        l_inf: f64,
    },
    /// Logistic curve; the three-parameter form has `a == 0`.
    Logistic {
        /// Whether this is the four-parameter form.
        four_parameters: bool,
        /// Rate coefficient.
        k: f64,
        /// Lower asymptote.
        a: f64,
        /// Upper asymptote.
        b: f64,
        /// Age of the inflection point.
        xmid: f64,
    },
    /// Gompertz curve.
    Gompertz {
        /// Rate coefficient.
        k: f64,
        /// Displacement.
        b: f64,
        /// Asymptotic length.
        l_inf: f64,
    },
    /// Exponential curve rescaled to pass through both end points.
    Exponential {
        /// Rate coefficient.
        k: f64,
        /// Length at age zero.
        l0: f64,
        /// `(Lmax - L0) / (e^(k Tmax) - 1)`.
        amplitude: f64,
    },
    /// Straight line.
    Linear {
        /// Length at age zero.
        l0: f64,
        /// Length gained per day.
        slope: f64,
    },
}

fn degenerate(model: GrowthModelKind, reason: impl Into<String>) -> GrowthError {
    GrowthError::DegenerateModel {
        model,
        reason: reason.into(),
    }
}

impl GrowthCurve {
    /// Fits a curve through `(0, l0)` and `(t_max, l_max)`.
    ///
    /// # Errors
    ///
    /// Returns [`GrowthError::DegenerateModel`] if the end points or the
    /// rate make the fit impossible.
    pub fn fit(
        choice: ModelChoice,
        k: f64,
        l0: Length,
        l_max: Length,
        t_max: Day,
    ) -> Result<Self, GrowthError> {
        let model = choice.model;
        let (l0, l_max, t_max) = (l0.value(), l_max.value(), t_max.value());
        if l0 <= 0.0 || !l0.is_finite() {
            return Err(degenerate(model, format!("length at birth {l0}")));
        }
        if l_max < l0 || !l_max.is_finite() {
            return Err(degenerate(
                model,
                format!("length at maturation {l_max} below length at birth {l0}"),
            ));
        }
        if t_max <= 0.0 || !t_max.is_finite() {
            return Err(degenerate(model, format!("development time {t_max}")));
        }
        if model != GrowthModelKind::Linear && (k <= 0.0 || !k.is_finite()) {
            return Err(degenerate(model, format!("growth rate {k}")));
        }

        let curve = match model {
            GrowthModelKind::VonBertalanffy => {
                let decay = (-k * t_max).exp();
                Self::VonBertalanffy {
                    k,
                    l0,
                    l_inf: (l_max - l0 * decay) / (1.0 - decay),
                }
            }
            GrowthModelKind::Logistic | GrowthModelKind::Logistic4P => {
                let four_parameters = model == GrowthModelKind::Logistic4P;
                let a = if four_parameters { choice.a } else { 0.0 };
                if a >= l0 {
                    return Err(degenerate(model, format!("lower asymptote {a} above birth")));
                }
                let denominator = (l0 - a) - (l_max - a) * (-t_max * k).exp();
                let argument = (l_max - l0) / denominator;
                if denominator <= 0.0 || argument <= 0.0 {
                    return Err(degenerate(model, "growth rate too slow for the curve"));
                }
                let xmid = argument.ln() / k;
                Self::Logistic {
                    four_parameters,
                    k,
                    a,
                    b: (l0 - a) * (1.0 + (xmid * k).exp()) + a,
                    xmid,
                }
            }
            GrowthModelKind::Gompertz => {
                let b = (l_max / l0).ln() / (1.0 - (-k * t_max).exp());
                Self::Gompertz {
                    k,
                    b,
                    l_inf: l0 * b.exp(),
                }
            }
            GrowthModelKind::Exponential => Self::Exponential {
                k,
                l0,
                amplitude: (l_max - l0) / (k * t_max).exp_m1(),
            },
            GrowthModelKind::Linear => Self::Linear {
                l0,
                slope: (l_max - l0) / t_max,
            },
        };
        if curve.parameters_are_finite() {
            Ok(curve)
        } else {
            Err(degenerate(model, "non-finite parameters"))
        }
    }

    fn parameters_are_finite(&self) -> bool {
        match *self {
            Self::VonBertalanffy { l_inf, .. } => l_inf.is_finite(),
            Self::Logistic { b, xmid, .. } => b.is_finite() && xmid.is_finite(),
            Self::Gompertz { b, l_inf, .. } => b.is_finite() && l_inf.is_finite(),
            Self::Exponential { amplitude, .. } => amplitude.is_finite(),
            Self::Linear { slope, .. } => slope.is_finite(),
        }
    }

    /// Family of the fitted curve.
    pub const fn kind(&self) -> GrowthModelKind {
        match self {
            Self::VonBertalanffy { .. } => GrowthModelKind::VonBertalanffy,
            Self::Logistic {
                four_parameters: true,
                ..
            } => GrowthModelKind::Logistic4P,
            Self::Logistic { .. } => GrowthModelKind::Logistic,
            Self::Gompertz { .. } => GrowthModelKind::Gompertz,
            Self::Exponential { .. } => GrowthModelKind::Exponential,
            Self::Linear { .. } => GrowthModelKind::Linear,
        }
    }

    /// Length at `age`; negative ages are treated as zero.
    pub fn length_at(&self, age: Day) -> Length {
        let t = age.value().max(0.0);
        let length = match *self {
            Self::VonBertalanffy { k, l0, l_inf } => l_inf - (l_inf - l0) * (-k * t).exp(),
            Self::Logistic { k, a, b, xmid, .. } => a + (b - a) / (1.0 + ((xmid - t) * k).exp()),
            Self::Gompertz { k, b, l_inf } => l_inf * (-b * (-k * t).exp()).exp(),
            Self::Exponential { k, l0, amplitude } => l0 + amplitude * (k * t).exp_m1(),
            Self::Linear { l0, slope } => slope.mul_add(t, l0),
        };
        Length::new(length)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const KINDS: [GrowthModelKind; 6] = [
        GrowthModelKind::VonBertalanffy,
        GrowthModelKind::Logistic,
        GrowthModelKind::Logistic4P,
        GrowthModelKind::Gompertz,
        GrowthModelKind::Exponential,
        GrowthModelKind::Linear,
    ];

    fn fit(kind: GrowthModelKind) -> GrowthCurve {
        let choice = ModelChoice {
            model: kind,
            a: 0.2,
        };
        GrowthCurve::fit(
            choice,
            0.08,
            Length::new(1.0),
            Length::new(10.0),
            Day::new(50.0),
        )
        .unwrap()
    }

    #[test]
    fn every_curve_passes_through_birth_and_maturation() {
        for kind in KINDS {
            let curve = fit(kind);
            assert_eq!(curve.kind(), kind);
            let birth = curve.length_at(Day::new(0.0)).value();
            let mature = curve.length_at(Day::new(50.0)).value();
            assert!((birth - 1.0).abs() < 1e-9, "{kind:?} birth {birth}");
            assert!((mature - 10.0).abs() < 1e-9, "{kind:?} maturation {mature}");
        }
    }

    #[test]
    fn curves_with_positive_rate_never_shrink() {
        for kind in KINDS {
            let curve = fit(kind);
            let mut previous = 0.0;
            for day in 0..=60 {
                let length = curve.length_at(Day::new(f64::from(day))).value();
                assert!(length >= previous, "{kind:?} shrinks at day {day}");
                previous = length;
            }
        }
    }

    #[test]
    fn impossible_fits_are_rejected() {
        let vb = ModelChoice::new(GrowthModelKind::VonBertalanffy);
        let shrinking = GrowthCurve::fit(vb, 0.1, Length::new(5.0), Length::new(1.0), Day::new(10.0));
        assert!(matches!(shrinking, Err(GrowthError::DegenerateModel { .. })));
        let no_rate = GrowthCurve::fit(vb, 0.0, Length::new(1.0), Length::new(2.0), Day::new(10.0));
        assert!(no_rate.is_err());
        let slow = GrowthCurve::fit(
            ModelChoice::new(GrowthModelKind::Logistic),
            0.001,
            Length::new(1.0),
            Length::new(10.0),
            Day::new(10.0),
        );
        assert!(slow.is_err());
    }

    #[test]
    fn model_names_deserialize_in_snake_case() {
        let choice: ModelChoice = serde_yml::from_str("model: logistic_4p\na: 0.5\n").unwrap();
        assert_eq!(choice.model, GrowthModelKind::Logistic4P);
        let plain: ModelChoice = serde_yml::from_str("model: von_bertalanffy\n").unwrap();
        assert!(plain.a.abs() < f64::EPSILON);
    }
}
