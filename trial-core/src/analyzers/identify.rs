//! Variable identification: classifying dataset columns into treatment,
//! outcome, and covariate roles.
//!
//! The identifier is a deterministic ordered rule list: each role is
//! resolved by trying candidate rules in priority order and taking the
//! first match. It never fails; when no suitable column exists the role
//! stays `None` and the runner turns that into a failed-analysis result.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::dataset::{CellValue, Dataset};

/// Column names containing one of these fragments are treatment candidates.
const TREATMENT_KEYWORDS: &[&str] = &[
    "treat",
    "treatment",
    "group",
    "condition",
    "arm",
    "assign",
    "intervention",
];

/// Column names containing one of these fragments are outcome candidates.
const OUTCOME_KEYWORDS: &[&str] = &[
    "outcome", "result", "response", "score", "time", "rate", "count",
];

/// Matches explicit outcome declarations in the context text, e.g.
/// "the primary outcome is revenue" or "outcome measure: test_score".
static OUTCOME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:primary\s+)?outcome(?:\s+measure)?\s*(?:is|was|:|=)\s*["']?([A-Za-z0-9_]+)"#)
        .expect("outcome pattern is valid")
});

/// Statistical kind of a column's values, assigned once during
/// identification and consumed by every downstream stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Exactly two distinct values.
    Binary,
    /// A small set of discrete levels.
    Categorical,
    /// Real-valued measurements.
    Continuous,
    /// Non-negative integer counts.
    Count,
}

/// The treatment indicator column with its two arm values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentVariable {
    /// Column holding the assignment indicator.
    pub column: String,
    /// Value marking the treatment arm.
    pub treatment_value: CellValue,
    /// Value marking the control arm.
    pub control_value: CellValue,
}

/// The primary outcome column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeVariable {
    /// Column holding the measured outcome.
    pub column: String,
    /// Statistical kind of the outcome values.
    pub value_type: ValueType,
}

/// A covariate column used for adjustment and balance checking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Covariate {
    /// Column name.
    pub column: String,
    /// Statistical kind, deciding the balance test to apply.
    pub value_type: ValueType,
}

/// Classification of every usable dataset column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VariableRoles {
    /// Treatment indicator, when one could be found.
    pub treatment: Option<TreatmentVariable>,
    /// Primary outcome, when one could be found.
    pub outcome: Option<OutcomeVariable>,
    /// Remaining numeric columns.
    pub covariates: Vec<Covariate>,
    /// Every column name of the dataset, in schema order.
    #[serde(default)]
    pub all_columns: Vec<String>,
}

impl VariableRoles {
    /// Whether both a treatment and an outcome column were identified.
    pub fn is_complete(&self) -> bool {
        self.treatment.is_some() && self.outcome.is_some()
    }
}

/// Heuristic variable identifier.
///
/// # Example
///
/// ```rust,ignore
/// use trial_core::analyzers::identify::VariableIdentifier;
///
/// let roles = VariableIdentifier::new().identify(&dataset, "A/B test of onboarding flow");
/// if let Some(treatment) = &roles.treatment {
///     println!("treatment column: {}", treatment.column);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct VariableIdentifier {
    /// Distinct-value count above which a covariate is continuous.
    continuous_threshold: usize,
}

impl VariableIdentifier {
    /// Creates an identifier with default thresholds.
    pub fn new() -> Self {
        Self {
            continuous_threshold: 10,
        }
    }

    /// Classifies the dataset's columns. Never fails; missing roles are
    /// left as `None`.
    #[instrument(skip(self, dataset, context), fields(columns = dataset.num_columns(), rows = dataset.num_rows()))]
    pub fn identify(&self, dataset: &Dataset, context: &str) -> VariableRoles {
        let treatment = self.find_treatment(dataset);
        let outcome = self.find_outcome(dataset, context, treatment.as_ref());
        let covariates = self.find_covariates(dataset, treatment.as_ref(), outcome.as_ref());

        debug!(
            treatment = treatment.as_ref().map(|t| t.column.as_str()),
            outcome = outcome.as_ref().map(|o| o.column.as_str()),
            covariates = covariates.len(),
            "Variable identification complete"
        );

        VariableRoles {
            treatment,
            outcome,
            covariates,
            all_columns: dataset
                .column_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    /// Treatment selection: keyword-named binary column first, then any
    /// strictly 0/1/true/false column, then any two-valued column.
    fn find_treatment(&self, dataset: &Dataset) -> Option<TreatmentVariable> {
        let names = dataset.column_names();

        // Rule 1: keyword in the name plus exactly two distinct values.
        for name in &names {
            let lowered = name.to_lowercase();
            if TREATMENT_KEYWORDS.iter().any(|k| lowered.contains(k)) {
                let distinct = dataset.distinct_non_null(name);
                if distinct.len() == 2 {
                    return Some(build_treatment(name, &distinct));
                }
            }
        }

        // Rule 2: two distinct values drawn from the strict indicator set.
        for name in &names {
            let distinct = dataset.distinct_non_null(name);
            if distinct.len() == 2 && distinct.iter().all(is_indicator_value) {
                return Some(build_treatment(name, &distinct));
            }
        }

        // Rule 3: any two-valued column.
        for name in &names {
            let distinct = dataset.distinct_non_null(name);
            if distinct.len() == 2 {
                return Some(build_treatment(name, &distinct));
            }
        }

        None
    }

    /// Outcome selection among numeric columns that are not the treatment
    /// and have more than two distinct values.
    fn find_outcome(
        &self,
        dataset: &Dataset,
        context: &str,
        treatment: Option<&TreatmentVariable>,
    ) -> Option<OutcomeVariable> {
        let treatment_col = treatment.map(|t| t.column.as_str());
        let candidates: Vec<&str> = dataset
            .column_names()
            .into_iter()
            .filter(|name| Some(*name) != treatment_col)
            .filter(|name| dataset.is_numeric(name))
            .filter(|name| dataset.distinct_non_null(name).len() > 2)
            .collect();

        // Rule 1: column named explicitly in the context text.
        if let Some(caps) = OUTCOME_PATTERN.captures(context) {
            let declared = caps[1].to_lowercase();
            if let Some(name) = candidates
                .iter()
                .find(|name| name.to_lowercase() == declared)
            {
                return Some(self.outcome_for(dataset, name));
            }
        }

        // Rule 2: column mentioned most often in the context.
        let context_lc = context.to_lowercase();
        let mut best: Option<(&str, usize)> = None;
        for name in &candidates {
            let mentions = context_lc.matches(&name.to_lowercase()).count();
            if mentions > 0 && best.map(|(_, count)| mentions > count).unwrap_or(true) {
                best = Some((name, mentions));
            }
        }
        if let Some((name, _)) = best {
            return Some(self.outcome_for(dataset, name));
        }

        // Rule 3: keyword in the column name.
        for name in &candidates {
            let lowered = name.to_lowercase();
            if OUTCOME_KEYWORDS.iter().any(|k| lowered.contains(k)) {
                return Some(self.outcome_for(dataset, name));
            }
        }

        // Rule 4: first remaining candidate.
        candidates
            .first()
            .map(|name| self.outcome_for(dataset, name))
    }

    fn outcome_for(&self, dataset: &Dataset, name: &str) -> OutcomeVariable {
        let value_type = if dataset.is_integer(name) {
            ValueType::Count
        } else {
            ValueType::Continuous
        };
        OutcomeVariable {
            column: name.to_string(),
            value_type,
        }
    }

    /// Every remaining numeric column becomes a covariate.
    fn find_covariates(
        &self,
        dataset: &Dataset,
        treatment: Option<&TreatmentVariable>,
        outcome: Option<&OutcomeVariable>,
    ) -> Vec<Covariate> {
        let treatment_col = treatment.map(|t| t.column.as_str());
        let outcome_col = outcome.map(|o| o.column.as_str());

        dataset
            .column_names()
            .into_iter()
            .filter(|name| Some(*name) != treatment_col && Some(*name) != outcome_col)
            .filter(|name| dataset.is_numeric(name))
            .map(|name| {
                let distinct = dataset.distinct_non_null(name).len();
                let value_type = if distinct > self.continuous_threshold {
                    ValueType::Continuous
                } else {
                    ValueType::Categorical
                };
                Covariate {
                    column: name.to_string(),
                    value_type,
                }
            })
            .collect()
    }
}

/// Whether a value belongs to the strict 0/1/true/false indicator set.
fn is_indicator_value(value: &CellValue) -> bool {
    matches!(
        value.key().to_lowercase().as_str(),
        "0" | "1" | "true" | "false"
    )
}

fn build_treatment(column: &str, distinct: &[CellValue]) -> TreatmentVariable {
    let (control_value, treatment_value) = assign_arms(&distinct[0], &distinct[1]);
    TreatmentVariable {
        column: column.to_string(),
        treatment_value,
        control_value,
    }
}

/// Decides which of two values marks the control arm and which the
/// treatment arm, preferring token matches over ordering.
fn assign_arms(a: &CellValue, b: &CellValue) -> (CellValue, CellValue) {
    let key_a = a.key().to_lowercase();
    let key_b = b.key().to_lowercase();

    let control_like = |key: &str| {
        key == "0" || key == "false" || key == "no" || key == "placebo" || key.contains("control")
    };
    let treatment_like = |key: &str| {
        key == "1" || key == "true" || key == "yes" || key.contains("treat") || key.contains("interven")
    };

    if control_like(&key_a) && !control_like(&key_b) {
        return (a.clone(), b.clone());
    }
    if control_like(&key_b) && !control_like(&key_a) {
        return (b.clone(), a.clone());
    }
    if treatment_like(&key_a) && !treatment_like(&key_b) {
        return (b.clone(), a.clone());
    }
    if treatment_like(&key_b) && !treatment_like(&key_a) {
        return (a.clone(), b.clone());
    }

    // No token matched: the smaller value becomes control.
    let ordered = match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x <= y,
        _ => key_a <= key_b,
    };
    if ordered {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::dataset_from_columns;
    use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
    use std::sync::Arc;

    fn int_col(values: Vec<i64>) -> ArrayRef {
        Arc::new(Int64Array::from(values))
    }

    fn float_col(values: Vec<f64>) -> ArrayRef {
        Arc::new(Float64Array::from(values))
    }

    #[test]
    fn test_keyword_treatment_beats_earlier_binary_column() {
        let dataset = dataset_from_columns(vec![
            ("enrolled", int_col(vec![1, 0, 1, 0])),
            ("treatment_arm", int_col(vec![0, 1, 0, 1])),
            ("outcome", float_col(vec![1.0, 2.0, 3.0, 4.0])),
        ])
        .unwrap();

        let roles = VariableIdentifier::new().identify(&dataset, "");
        assert_eq!(roles.treatment.unwrap().column, "treatment_arm");
    }

    #[test]
    fn test_first_strict_binary_column_without_keyword() {
        let dataset = dataset_from_columns(vec![
            ("flag", int_col(vec![0, 1, 1, 0])),
            ("outcome", float_col(vec![1.0, 2.0, 3.0, 4.0])),
        ])
        .unwrap();

        let roles = VariableIdentifier::new().identify(&dataset, "");
        let treatment = roles.treatment.unwrap();
        assert_eq!(treatment.column, "flag");
        assert_eq!(treatment.control_value.key(), "0");
        assert_eq!(treatment.treatment_value.key(), "1");
    }

    #[test]
    fn test_text_arms_assigned_by_token() {
        let dataset = dataset_from_columns(vec![
            (
                "arm",
                Arc::new(StringArray::from(vec![
                    "Control", "Drug", "Control", "Drug",
                ])) as ArrayRef,
            ),
            ("bp", float_col(vec![120.0, 118.0, 121.0, 115.0])),
        ])
        .unwrap();

        let roles = VariableIdentifier::new().identify(&dataset, "");
        let treatment = roles.treatment.unwrap();
        assert_eq!(treatment.control_value.key(), "Control");
        assert_eq!(treatment.treatment_value.key(), "Drug");
    }

    #[test]
    fn test_explicit_outcome_declaration_in_context() {
        let dataset = dataset_from_columns(vec![
            ("treatment", int_col(vec![0, 1, 0, 1])),
            ("revenue", float_col(vec![5.0, 6.0, 7.0, 8.0])),
            ("sessions", float_col(vec![1.0, 2.0, 3.0, 4.0])),
        ])
        .unwrap();

        let roles = VariableIdentifier::new()
            .identify(&dataset, "The primary outcome is sessions per user.");
        assert_eq!(roles.outcome.unwrap().column, "sessions");
    }

    #[test]
    fn test_most_mentioned_column_wins() {
        let dataset = dataset_from_columns(vec![
            ("treatment", int_col(vec![0, 1, 0, 1])),
            ("weight", float_col(vec![70.0, 71.0, 69.0, 72.0])),
            ("glucose", float_col(vec![90.0, 95.0, 85.0, 100.0])),
        ])
        .unwrap();

        let context = "We measured glucose before and after; glucose is the endpoint.";
        let roles = VariableIdentifier::new().identify(&dataset, context);
        assert_eq!(roles.outcome.unwrap().column, "glucose");
    }

    #[test]
    fn test_outcome_keyword_fallback() {
        let dataset = dataset_from_columns(vec![
            ("treatment", int_col(vec![0, 1, 0, 1])),
            ("age", int_col(vec![30, 40, 50, 60])),
            ("test_score", float_col(vec![1.0, 2.0, 3.0, 4.0])),
        ])
        .unwrap();

        let roles = VariableIdentifier::new().identify(&dataset, "");
        // "age" has no outcome keyword but "test_score" does.
        assert_eq!(roles.outcome.unwrap().column, "test_score");
    }

    #[test]
    fn test_text_column_never_wins_outcome_selection() {
        // "result_notes" carries an outcome keyword but is free text; the
        // numeric measurement must be chosen instead.
        let dataset = dataset_from_columns(vec![
            ("treatment", int_col(vec![0, 1, 0, 1, 0, 1, 0, 1])),
            (
                "result_notes",
                Arc::new(StringArray::from(vec![
                    "mild", "improved", "stable", "worse", "improved fast", "relapsed",
                    "discharged", "readmitted",
                ])) as ArrayRef,
            ),
            (
                "bp",
                float_col(vec![120.0, 118.0, 121.0, 115.0, 119.0, 114.0, 122.0, 116.0]),
            ),
        ])
        .unwrap();

        let roles = VariableIdentifier::new().identify(&dataset, "");
        assert_eq!(roles.outcome.unwrap().column, "bp");
    }

    #[test]
    fn test_roles_record_all_column_names() {
        let dataset = dataset_from_columns(vec![
            ("treatment", int_col(vec![0, 1, 0, 1])),
            ("outcome", float_col(vec![1.0, 2.0, 3.0, 4.0])),
            (
                "notes",
                Arc::new(StringArray::from(vec!["a", "b", "c", "d"])) as ArrayRef,
            ),
        ])
        .unwrap();

        let roles = VariableIdentifier::new().identify(&dataset, "");
        assert_eq!(roles.all_columns, vec!["treatment", "outcome", "notes"]);
    }

    #[test]
    fn test_single_valued_treatment_column_is_rejected() {
        let dataset = dataset_from_columns(vec![
            ("treatment", int_col(vec![1, 1, 1, 1])),
            ("outcome", float_col(vec![1.0, 2.0, 3.0, 4.0])),
        ])
        .unwrap();

        let roles = VariableIdentifier::new().identify(&dataset, "");
        assert!(roles.treatment.is_none());
    }

    #[test]
    fn test_covariate_value_types() {
        let many: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let dataset = dataset_from_columns(vec![
            ("treatment", int_col(vec![0, 1].repeat(10))),
            ("outcome", float_col(many.clone())),
            ("age", float_col(many)),
            ("site", int_col(vec![1, 2, 3, 4].repeat(5))),
        ])
        .unwrap();

        let roles = VariableIdentifier::new().identify(&dataset, "");
        let covariates = roles.covariates;
        assert_eq!(covariates.len(), 2);
        assert_eq!(covariates[0].column, "age");
        assert_eq!(covariates[0].value_type, ValueType::Continuous);
        assert_eq!(covariates[1].column, "site");
        assert_eq!(covariates[1].value_type, ValueType::Categorical);
    }

    #[test]
    fn test_identification_never_panics_on_degenerate_data() {
        let dataset =
            dataset_from_columns(vec![("only", float_col(vec![1.0]))]).unwrap();
        let roles = VariableIdentifier::new().identify(&dataset, "tiny");
        assert!(roles.treatment.is_none());
        assert!(roles.outcome.is_none());
        assert!(!roles.is_complete());
    }
}
