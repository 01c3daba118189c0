//! Analysis stages for trial data.
//!
//! Each stage is a small, deterministic component consuming the dataset
//! and the variable roles produced by identification:
//!
//! - [`identify`]: treatment/outcome/covariate classification
//! - [`effect`]: average treatment effect estimation
//! - [`hypothesis`]: parametric and non-parametric group comparison
//! - [`regression`]: simple and covariate-adjusted linear decomposition
//! - [`balance`]: per-covariate randomization diagnostics
//! - [`runner`]: stage sequencing and partial-failure policy

pub mod balance;
pub mod effect;
pub mod errors;
pub mod hypothesis;
pub mod identify;
pub mod regression;
pub mod runner;
pub(crate) mod stats;

pub use errors::{AnalyzerError, AnalyzerResult};

use crate::dataset::Dataset;
use identify::TreatmentVariable;

/// Outcome (or covariate) values split by trial arm, nulls dropped per
/// group independently.
///
/// The two row sets are disjoint; rows whose treatment cell matches
/// neither arm value are excluded entirely.
#[derive(Debug, Clone)]
pub(crate) struct GroupSplit {
    pub control: Vec<f64>,
    pub treatment: Vec<f64>,
}

/// Splits a numeric column's values into control and treatment groups by
/// matching the treatment column against the identified arm values.
pub(crate) fn split_numeric_by_arm(
    dataset: &Dataset,
    treatment: &TreatmentVariable,
    value_column: &str,
) -> AnalyzerResult<GroupSplit> {
    let assignments = dataset
        .cell_values(&treatment.column)
        .map_err(|_| AnalyzerError::ColumnNotFound(treatment.column.clone()))?;
    let values = dataset
        .numeric_values(value_column)
        .ok_or_else(|| AnalyzerError::NotNumeric(value_column.to_string()))?;

    let control_key = treatment.control_value.key();
    let treatment_key = treatment.treatment_value.key();

    let mut control = Vec::new();
    let mut treated = Vec::new();
    for (assignment, value) in assignments.iter().zip(values.iter()) {
        let (Some(assignment), Some(value)) = (assignment, value) else {
            continue;
        };
        let key = assignment.key();
        if key == control_key {
            control.push(*value);
        } else if key == treatment_key {
            treated.push(*value);
        }
    }

    Ok(GroupSplit {
        control,
        treatment: treated,
    })
}
