//! Two-sample hypothesis tests and effect size.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::instrument;

use super::errors::{AnalyzerError, AnalyzerResult};
use super::identify::VariableRoles;
use super::split_numeric_by_arm;
use super::stats;
use crate::dataset::Dataset;

/// Two-sample t-test summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TTestResult {
    pub t_statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: u64,
}

/// Mann-Whitney U test summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MannWhitneyResult {
    pub u_statistic: f64,
    pub p_value: f64,
}

/// Magnitude bands for Cohen's d.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectMagnitude {
    Negligible,
    Small,
    Medium,
    Large,
}

impl EffectMagnitude {
    /// Conventional interpretation bands at 0.2 / 0.5 / 0.8.
    pub fn from_cohens_d(d: f64) -> Self {
        let abs_d = d.abs();
        if abs_d < 0.2 {
            Self::Negligible
        } else if abs_d < 0.5 {
            Self::Small
        } else if abs_d < 0.8 {
            Self::Medium
        } else {
            Self::Large
        }
    }
}

impl fmt::Display for EffectMagnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Negligible => "negligible",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        };
        write!(f, "{label}")
    }
}

/// Standardized effect size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSize {
    pub cohens_d: f64,
    pub interpretation: EffectMagnitude,
}

/// Combined hypothesis-testing output for one outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisTests {
    pub t_test: TTestResult,
    pub mann_whitney_u_test: MannWhitneyResult,
    pub effect_size: EffectSize,
    /// Primary significance signal, taken from the t-test.
    pub p_value: f64,
    pub statistically_significant: bool,
}

/// Runs the parametric and non-parametric group comparisons.
#[derive(Debug, Clone)]
pub struct HypothesisTester {
    alpha: f64,
}

impl HypothesisTester {
    /// Creates a tester with the given significance level.
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    /// Tests the treatment/control outcome difference.
    ///
    /// The t-test uses pooled variance with `n1 + n2 - 2` degrees of
    /// freedom; the Mann-Whitney U test is the two-sided non-parametric
    /// alternative. Cohen's d falls back to 0 when the pooled standard
    /// deviation is 0.
    #[instrument(skip(self, dataset, roles), fields(alpha = self.alpha))]
    pub fn test(&self, dataset: &Dataset, roles: &VariableRoles) -> AnalyzerResult<HypothesisTests> {
        let treatment = roles
            .treatment
            .as_ref()
            .ok_or_else(|| AnalyzerError::MissingRoles("no treatment column".into()))?;
        let outcome = roles
            .outcome
            .as_ref()
            .ok_or_else(|| AnalyzerError::MissingRoles("no outcome column".into()))?;

        let split = split_numeric_by_arm(dataset, treatment, &outcome.column)?;
        let (control, treated) = (&split.control, &split.treatment);
        if control.len() < 2 || treated.len() < 2 {
            return Err(AnalyzerError::insufficient_data(format!(
                "hypothesis tests require at least 2 observations per group (got {} and {})",
                control.len(),
                treated.len()
            )));
        }

        let t = stats::pooled_t_test(treated, control)?;
        let mw = stats::mann_whitney_u(treated, control)?;
        let cohens_d = cohens_d(treated, control);

        Ok(HypothesisTests {
            t_test: TTestResult {
                t_statistic: t.t_statistic,
                p_value: t.p_value,
                degrees_of_freedom: t.degrees_of_freedom,
            },
            mann_whitney_u_test: MannWhitneyResult {
                u_statistic: mw.u_statistic,
                p_value: mw.p_value,
            },
            effect_size: EffectSize {
                cohens_d,
                interpretation: EffectMagnitude::from_cohens_d(cohens_d),
            },
            p_value: t.p_value,
            statistically_significant: t.p_value < self.alpha,
        })
    }
}

/// Cohen's d with the (n-1)-weighted pooled standard deviation.
fn cohens_d(treated: &[f64], control: &[f64]) -> f64 {
    let (n1, n2) = (treated.len() as f64, control.len() as f64);
    let pooled_variance = ((n1 - 1.0) * stats::sample_variance(treated)
        + (n2 - 1.0) * stats::sample_variance(control))
        / (n1 + n2 - 2.0);
    let pooled_std = pooled_variance.sqrt();
    if pooled_std > 0.0 {
        (stats::mean(treated) - stats::mean(control)) / pooled_std
    } else {
        0.0
    }
}
