//! Covariate balance diagnostics between trial arms.
//!
//! Randomization should leave pre-treatment covariates with the same
//! distribution in both arms. Each covariate is tested with the method
//! matching its value type: a pooled t-test for continuous measurements,
//! a chi-squared independence test over the arm-by-category table for
//! categorical ones. A large p-value means no detectable imbalance.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::errors::{AnalyzerError, AnalyzerResult};
use super::identify::{ValueType, VariableRoles};
use super::split_numeric_by_arm;
use super::stats;
use crate::dataset::Dataset;

/// Balance test for one continuous covariate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousBalance {
    pub variable: String,
    pub control_mean: f64,
    pub treatment_mean: f64,
    pub difference: f64,
    pub p_value: f64,
    pub balanced: bool,
}

/// Balance test for one categorical covariate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalBalance {
    pub variable: String,
    /// Most frequent category in the control arm.
    pub control_mode: String,
    /// Share of control-arm rows in that category.
    pub control_mode_share: f64,
    pub treatment_mode: String,
    pub treatment_mode_share: f64,
    pub chi2_statistic: f64,
    pub p_value: f64,
    pub balanced: bool,
}

/// Per-covariate balance result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CovariateBalance {
    Continuous(ContinuousBalance),
    Categorical(CategoricalBalance),
}

impl CovariateBalance {
    pub fn variable(&self) -> &str {
        match self {
            Self::Continuous(b) => &b.variable,
            Self::Categorical(b) => &b.variable,
        }
    }

    pub fn balanced(&self) -> bool {
        match self {
            Self::Continuous(b) => b.balanced,
            Self::Categorical(b) => b.balanced,
        }
    }
}

/// Aggregate over all tested covariates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub n_covariates_checked: u64,
    pub n_balanced: u64,
    /// Fraction balanced; 0 when nothing could be checked.
    pub balance_rate: f64,
}

/// Full balance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub covariate_balance: Vec<CovariateBalance>,
    pub summary: BalanceSummary,
}

/// Conventional threshold for the balance verdict; a covariate with
/// `p > 0.05` counts as balanced regardless of the significance level
/// chosen for the treatment-effect tests.
const BALANCE_ALPHA: f64 = 0.05;

/// Runs the per-covariate balance tests.
#[derive(Debug, Clone, Default)]
pub struct BalanceChecker;

impl BalanceChecker {
    pub fn new() -> Self {
        Self
    }

    /// Tests every identified covariate. Covariates that cannot be
    /// tested (an empty arm, a single category) are skipped rather than
    /// failing the report.
    #[instrument(skip(self, dataset, roles), fields(covariates = roles.covariates.len()))]
    pub fn check(&self, dataset: &Dataset, roles: &VariableRoles) -> AnalyzerResult<BalanceReport> {
        let treatment = roles
            .treatment
            .as_ref()
            .ok_or_else(|| AnalyzerError::MissingRoles("no treatment column".into()))?;

        let mut tests = Vec::new();
        for covariate in &roles.covariates {
            let split = split_numeric_by_arm(dataset, treatment, &covariate.column)?;
            if split.control.is_empty() || split.treatment.is_empty() {
                debug!(covariate = %covariate.column, "Skipping balance test: empty arm");
                continue;
            }

            let result = match covariate.value_type {
                ValueType::Categorical => self.check_categorical(&covariate.column, &split),
                _ => self.check_continuous(&covariate.column, &split),
            };
            match result {
                Ok(test) => tests.push(test),
                Err(error) => {
                    debug!(covariate = %covariate.column, %error, "Skipping balance test");
                }
            }
        }

        let n_checked = tests.len() as u64;
        let n_balanced = tests.iter().filter(|t| t.balanced()).count() as u64;
        let balance_rate = if n_checked > 0 {
            n_balanced as f64 / n_checked as f64
        } else {
            0.0
        };

        Ok(BalanceReport {
            covariate_balance: tests,
            summary: BalanceSummary {
                n_covariates_checked: n_checked,
                n_balanced,
                balance_rate,
            },
        })
    }

    fn check_continuous(
        &self,
        variable: &str,
        split: &super::GroupSplit,
    ) -> AnalyzerResult<CovariateBalance> {
        let t = stats::pooled_t_test(&split.treatment, &split.control)?;
        let control_mean = stats::mean(&split.control);
        let treatment_mean = stats::mean(&split.treatment);
        Ok(CovariateBalance::Continuous(ContinuousBalance {
            variable: variable.to_string(),
            control_mean,
            treatment_mean,
            difference: treatment_mean - control_mean,
            p_value: t.p_value,
            balanced: t.p_value > BALANCE_ALPHA,
        }))
    }

    fn check_categorical(
        &self,
        variable: &str,
        split: &super::GroupSplit,
    ) -> AnalyzerResult<CovariateBalance> {
        // Category levels in first-seen order across both arms.
        let mut levels: Vec<f64> = Vec::new();
        for &v in split.control.iter().chain(split.treatment.iter()) {
            if !levels.contains(&v) {
                levels.push(v);
            }
        }

        let count_levels = |values: &[f64]| -> Vec<u64> {
            levels
                .iter()
                .map(|&level| values.iter().filter(|&&v| v == level).count() as u64)
                .collect()
        };
        let control_counts = count_levels(&split.control);
        let treatment_counts = count_levels(&split.treatment);

        let chi2 = stats::chi_square_independence(&[
            control_counts.clone(),
            treatment_counts.clone(),
        ])?;

        let mode_of = |counts: &[u64], total: usize| {
            let (index, &count) = counts
                .iter()
                .enumerate()
                .max_by_key(|(_, &count)| count)
                .unwrap_or((0, &0));
            (format!("{}", levels[index]), count as f64 / total as f64)
        };
        let (control_mode, control_mode_share) =
            mode_of(&control_counts, split.control.len());
        let (treatment_mode, treatment_mode_share) =
            mode_of(&treatment_counts, split.treatment.len());

        Ok(CovariateBalance::Categorical(CategoricalBalance {
            variable: variable.to_string(),
            control_mode,
            control_mode_share,
            treatment_mode,
            treatment_mode_share,
            chi2_statistic: chi2.statistic,
            p_value: chi2.p_value,
            balanced: chi2.p_value > BALANCE_ALPHA,
        }))
    }
}
