//! Linear regression of the outcome on treatment and covariates.
//!
//! Both models are ordinary least squares solved through the normal
//! equations with `nalgebra`. The simple model regresses the outcome on
//! the encoded treatment indicator alone; the multiple model adds every
//! identified covariate on complete-case rows.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::errors::{AnalyzerError, AnalyzerResult};
use super::identify::{TreatmentVariable, ValueType, VariableRoles};
use crate::dataset::Dataset;

/// Outcome regressed on the treatment indicator alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleRegression {
    pub treatment_coefficient: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Outcome regressed on treatment plus covariates, complete cases only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipleRegression {
    /// Coefficient per predictor; the treatment indicator appears under
    /// its column name, dummy-encoded levels as `{column}_{level}`.
    pub coefficients: BTreeMap<String, f64>,
    pub intercept: f64,
    pub r_squared: f64,
    pub n_observations: u64,
    /// Covariate columns that entered the model.
    pub covariates: Vec<String>,
}

/// Regression output for one analysis pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionAnalysis {
    pub simple_regression: SimpleRegression,
    /// Absent when there are no covariates or too few complete cases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_regression: Option<MultipleRegression>,
}

/// A named predictor column aligned with the retained rows.
struct Predictor {
    name: String,
    values: Vec<f64>,
}

/// OLS engine for the simple and covariate-adjusted models.
#[derive(Debug, Clone, Default)]
pub struct RegressionEngine;

impl RegressionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Fits the simple model, and the multiple model when covariates
    /// exist and enough complete-case rows remain.
    #[instrument(skip(self, dataset, roles))]
    pub fn analyze(
        &self,
        dataset: &Dataset,
        roles: &VariableRoles,
    ) -> AnalyzerResult<RegressionAnalysis> {
        let treatment = roles
            .treatment
            .as_ref()
            .ok_or_else(|| AnalyzerError::MissingRoles("no treatment column".into()))?;
        let outcome = roles
            .outcome
            .as_ref()
            .ok_or_else(|| AnalyzerError::MissingRoles("no outcome column".into()))?;

        let simple = self.fit_simple(dataset, treatment, &outcome.column)?;
        let multiple = if roles.covariates.is_empty() {
            None
        } else {
            self.fit_multiple(dataset, treatment, &outcome.column, roles)?
        };

        Ok(RegressionAnalysis {
            simple_regression: simple,
            multiple_regression: multiple,
        })
    }

    fn fit_simple(
        &self,
        dataset: &Dataset,
        treatment: &TreatmentVariable,
        outcome_column: &str,
    ) -> AnalyzerResult<SimpleRegression> {
        let indicator = encode_treatment(dataset, treatment)?;
        let outcomes = dataset
            .numeric_values(outcome_column)
            .ok_or_else(|| AnalyzerError::NotNumeric(outcome_column.to_string()))?;

        let mut x = Vec::new();
        let mut y = Vec::new();
        for (assignment, value) in indicator.iter().zip(outcomes.iter()) {
            if let (Some(assignment), Some(value)) = (assignment, value) {
                x.push(*assignment);
                y.push(*value);
            }
        }
        // Same rule as the multiple model: rows must exceed predictors
        // (one here, plus the intercept).
        if x.len() <= 1 {
            return Err(AnalyzerError::insufficient_data(format!(
                "simple regression needs at least 2 usable rows (got {})",
                x.len()
            )));
        }

        let fit = ols(
            &[Predictor {
                name: treatment.column.clone(),
                values: x,
            }],
            &y,
        )?;
        Ok(SimpleRegression {
            treatment_coefficient: fit.coefficients[&treatment.column],
            intercept: fit.intercept,
            r_squared: fit.r_squared,
        })
    }

    fn fit_multiple(
        &self,
        dataset: &Dataset,
        treatment: &TreatmentVariable,
        outcome_column: &str,
        roles: &VariableRoles,
    ) -> AnalyzerResult<Option<MultipleRegression>> {
        let indicator = encode_treatment(dataset, treatment)?;
        let outcomes = dataset
            .numeric_values(outcome_column)
            .ok_or_else(|| AnalyzerError::NotNumeric(outcome_column.to_string()))?;

        let mut covariate_values = Vec::new();
        for covariate in &roles.covariates {
            let values = dataset
                .numeric_values(&covariate.column)
                .ok_or_else(|| AnalyzerError::NotNumeric(covariate.column.clone()))?;
            covariate_values.push((covariate, values));
        }

        // Complete cases: both arms, non-null outcome and covariates.
        let mut treatment_values = Vec::new();
        let mut y = Vec::new();
        let mut retained: Vec<Vec<f64>> = vec![Vec::new(); covariate_values.len()];
        for row in 0..dataset.num_rows() {
            let (Some(assignment), Some(outcome)) = (indicator[row], outcomes[row]) else {
                continue;
            };
            let covariate_row: Option<Vec<f64>> =
                covariate_values.iter().map(|(_, v)| v[row]).collect();
            let Some(covariate_row) = covariate_row else {
                continue;
            };
            treatment_values.push(assignment);
            y.push(outcome);
            for (column, value) in retained.iter_mut().zip(covariate_row) {
                column.push(value);
            }
        }

        let n_rows = y.len();
        let mut predictors = vec![Predictor {
            name: treatment.column.clone(),
            values: treatment_values,
        }];
        for ((covariate, _), values) in covariate_values.iter().zip(&retained) {
            predictors.extend(encode_covariate(
                &covariate.column,
                covariate.value_type,
                values,
            ));
        }

        if n_rows <= predictors.len() {
            debug!(
                rows = n_rows,
                predictors = predictors.len(),
                "Skipping multiple regression: not enough complete cases"
            );
            return Ok(None);
        }
        let fit = ols(&predictors, &y)?;
        Ok(Some(MultipleRegression {
            coefficients: fit.coefficients,
            intercept: fit.intercept,
            r_squared: fit.r_squared,
            n_observations: n_rows as u64,
            covariates: roles.covariates.iter().map(|c| c.column.clone()).collect(),
        }))
    }
}

/// Encodes the treatment column as 0 (control) / 1 (treatment); rows in
/// neither arm become `None`.
fn encode_treatment(
    dataset: &Dataset,
    treatment: &TreatmentVariable,
) -> AnalyzerResult<Vec<Option<f64>>> {
    let assignments = dataset
        .cell_values(&treatment.column)
        .map_err(|_| AnalyzerError::ColumnNotFound(treatment.column.clone()))?;
    let control_key = treatment.control_value.key();
    let treatment_key = treatment.treatment_value.key();

    Ok(assignments
        .iter()
        .map(|cell| {
            let cell = cell.as_ref()?;
            let key = cell.key();
            if key == control_key {
                Some(0.0)
            } else if key == treatment_key {
                Some(1.0)
            } else {
                None
            }
        })
        .collect())
}

/// Expands one covariate column into predictor columns.
///
/// Continuous and count covariates enter as-is. A two-level categorical
/// covariate becomes a single 0/1 column under its own name; more levels
/// are one-hot encoded with the first-seen level dropped as baseline.
fn encode_covariate(column: &str, value_type: ValueType, values: &[f64]) -> Vec<Predictor> {
    if value_type != ValueType::Categorical {
        return vec![Predictor {
            name: column.to_string(),
            values: values.to_vec(),
        }];
    }

    let mut levels: Vec<f64> = Vec::new();
    for &v in values {
        if !levels.contains(&v) {
            levels.push(v);
        }
    }

    if levels.len() <= 2 {
        let baseline = levels[0];
        return vec![Predictor {
            name: column.to_string(),
            values: values
                .iter()
                .map(|&v| if v != baseline { 1.0 } else { 0.0 })
                .collect(),
        }];
    }

    levels[1..]
        .iter()
        .map(|&level| Predictor {
            name: format!("{column}_{level}"),
            values: values
                .iter()
                .map(|&v| if v == level { 1.0 } else { 0.0 })
                .collect(),
        })
        .collect()
}

struct OlsFit {
    intercept: f64,
    coefficients: BTreeMap<String, f64>,
    r_squared: f64,
}

/// Ordinary least squares through the normal equations, with an explicit
/// intercept column prepended to the design matrix.
fn ols(predictors: &[Predictor], y: &[f64]) -> AnalyzerResult<OlsFit> {
    let n = y.len();
    let p = predictors.len() + 1;

    let mut design = DMatrix::zeros(n, p);
    for row in 0..n {
        design[(row, 0)] = 1.0;
        for (col, predictor) in predictors.iter().enumerate() {
            design[(row, col + 1)] = predictor.values[row];
        }
    }
    let response = DVector::from_column_slice(y);

    let xtx = design.transpose() * &design;
    let xty = design.transpose() * &response;
    let beta = xtx
        .lu()
        .solve(&xty)
        .ok_or_else(|| AnalyzerError::degenerate("singular design matrix"))?;

    let fitted = &design * &beta;
    let residuals = &response - &fitted;
    let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
    let y_mean = y.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = y.iter().map(|v| (v - y_mean) * (v - y_mean)).sum();
    let r_squared = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    };

    let coefficients = predictors
        .iter()
        .enumerate()
        .map(|(i, predictor)| (predictor.name.clone(), beta[i + 1]))
        .collect();

    Ok(OlsFit {
        intercept: beta[0],
        coefficients,
        r_squared,
    })
}
