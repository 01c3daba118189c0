//! Average treatment effect estimation.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::errors::{AnalyzerError, AnalyzerResult};
use super::identify::VariableRoles;
use super::stats;
use super::split_numeric_by_arm;
use crate::dataset::Dataset;

/// Fixed multiplier for the 95% interval.
///
/// This is the normal-approximation critical value regardless of sample
/// size; downstream report consumers depend on the resulting interval
/// widths, so it is not replaced by a t critical value.
const Z_95: f64 = 1.96;

/// A two-sided confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

/// Treatment effect estimate with group summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentEffect {
    pub control_mean: f64,
    pub treatment_mean: f64,
    pub average_treatment_effect: f64,
    pub ate_standard_error: f64,
    pub ate_ci_95: ConfidenceInterval,
    pub control_std: f64,
    pub treatment_std: f64,
    pub control_n: u64,
    pub treatment_n: u64,
}

/// Computes group means, the average treatment effect, its standard
/// error, and the 95% confidence interval.
#[derive(Debug, Clone, Default)]
pub struct TreatmentEffectEstimator;

impl TreatmentEffectEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Estimates the treatment effect on the identified outcome.
    ///
    /// Each group needs at least 2 non-null observations for its standard
    /// error to be defined; anything less is surfaced as an error instead
    /// of propagating NaN into the result.
    #[instrument(skip(self, dataset, roles))]
    pub fn estimate(&self, dataset: &Dataset, roles: &VariableRoles) -> AnalyzerResult<TreatmentEffect> {
        let treatment = roles
            .treatment
            .as_ref()
            .ok_or_else(|| AnalyzerError::MissingRoles("no treatment column".into()))?;
        let outcome = roles
            .outcome
            .as_ref()
            .ok_or_else(|| AnalyzerError::MissingRoles("no outcome column".into()))?;

        let split = split_numeric_by_arm(dataset, treatment, &outcome.column)?;
        if split.control.is_empty() {
            return Err(AnalyzerError::EmptyGroup {
                arm: "control",
                column: outcome.column.clone(),
            });
        }
        if split.treatment.is_empty() {
            return Err(AnalyzerError::EmptyGroup {
                arm: "treatment",
                column: outcome.column.clone(),
            });
        }
        if split.control.len() < 2 || split.treatment.len() < 2 {
            return Err(AnalyzerError::insufficient_data(format!(
                "standard error undefined with group sizes {} and {}",
                split.control.len(),
                split.treatment.len()
            )));
        }

        let control_mean = stats::mean(&split.control);
        let treatment_mean = stats::mean(&split.treatment);
        let ate = treatment_mean - control_mean;

        let se_control = stats::standard_error(&split.control);
        let se_treatment = stats::standard_error(&split.treatment);
        let se_ate = (se_control * se_control + se_treatment * se_treatment).sqrt();

        Ok(TreatmentEffect {
            control_mean,
            treatment_mean,
            average_treatment_effect: ate,
            ate_standard_error: se_ate,
            ate_ci_95: ConfidenceInterval {
                lower: ate - Z_95 * se_ate,
                upper: ate + Z_95 * se_ate,
            },
            control_std: stats::sample_std(&split.control),
            treatment_std: stats::sample_std(&split.treatment),
            control_n: split.control.len() as u64,
            treatment_n: split.treatment.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::identify::VariableIdentifier;
    use crate::dataset::dataset_from_columns;
    use approx::assert_relative_eq;
    use arrow::array::{ArrayRef, Float64Array, Int64Array};
    use std::sync::Arc;

    fn dataset_with_outcomes(control: Vec<f64>, treated: Vec<f64>) -> (Dataset, VariableRoles) {
        let mut assignment = vec![0i64; control.len()];
        assignment.extend(vec![1i64; treated.len()]);
        let mut outcome = control;
        outcome.extend(treated);

        let dataset = dataset_from_columns(vec![
            (
                "treatment",
                Arc::new(Int64Array::from(assignment)) as ArrayRef,
            ),
            ("outcome", Arc::new(Float64Array::from(outcome)) as ArrayRef),
        ])
        .unwrap();
        let roles = VariableIdentifier::new().identify(&dataset, "");
        (dataset, roles)
    }

    #[test]
    fn test_ate_is_difference_of_means() {
        let (dataset, roles) =
            dataset_with_outcomes(vec![1.0, 2.0, 3.0], vec![3.0, 4.0, 5.0]);
        let effect = TreatmentEffectEstimator::new()
            .estimate(&dataset, &roles)
            .unwrap();

        assert_relative_eq!(effect.control_mean, 2.0);
        assert_relative_eq!(effect.treatment_mean, 4.0);
        assert_relative_eq!(effect.average_treatment_effect, 2.0);
        assert_eq!(effect.control_n, 3);
        assert_eq!(effect.treatment_n, 3);
    }

    #[test]
    fn test_ci_brackets_the_estimate() {
        let (dataset, roles) = dataset_with_outcomes(
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            vec![2.0, 3.0, 4.0, 5.0, 6.0],
        );
        let effect = TreatmentEffectEstimator::new()
            .estimate(&dataset, &roles)
            .unwrap();

        assert!(effect.ate_standard_error > 0.0);
        assert!(effect.ate_ci_95.lower < effect.average_treatment_effect);
        assert!(effect.average_treatment_effect < effect.ate_ci_95.upper);
        // Fixed 1.96 half-width.
        assert_relative_eq!(
            effect.ate_ci_95.upper - effect.average_treatment_effect,
            1.96 * effect.ate_standard_error,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_null_outcomes_dropped_per_group() {
        let dataset = dataset_from_columns(vec![
            (
                "treatment",
                Arc::new(Int64Array::from(vec![0, 0, 0, 1, 1, 1])) as ArrayRef,
            ),
            (
                "outcome",
                Arc::new(Float64Array::from(vec![
                    Some(1.0),
                    None,
                    Some(3.0),
                    Some(4.0),
                    Some(6.0),
                    None,
                ])) as ArrayRef,
            ),
        ])
        .unwrap();
        let roles = VariableIdentifier::new().identify(&dataset, "");
        let effect = TreatmentEffectEstimator::new()
            .estimate(&dataset, &roles)
            .unwrap();

        assert_eq!(effect.control_n, 2);
        assert_eq!(effect.treatment_n, 2);
        assert_relative_eq!(effect.average_treatment_effect, 3.0);
    }

    #[test]
    fn test_single_observation_group_is_an_error() {
        let (dataset, roles) = dataset_with_outcomes(vec![1.0, 2.0, 3.0], vec![9.0]);
        let err = TreatmentEffectEstimator::new()
            .estimate(&dataset, &roles)
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::InsufficientData(_)));
    }
}
