//! The analysis result envelope.
//!
//! `AnalysisResult` is the single machine-readable artifact of a run.
//! Stage sections are `Option`s flattened into the top level of the JSON
//! object: a stage that failed contributes no keys at all, it is never
//! serialized as `null`. Consumers can therefore detect a degraded run
//! by key absence alone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analyzers::balance::BalanceReport;
use crate::analyzers::effect::TreatmentEffect;
use crate::analyzers::hypothesis::HypothesisTests;
use crate::analyzers::identify::VariableRoles;
use crate::analyzers::regression::RegressionAnalysis;

/// Basic shape of the analyzed dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleInfo {
    pub total_sample_size: u64,
    pub n_variables: u64,
    /// Row count per treatment-column value, present once a treatment
    /// column is known. Keyed by the value's canonical string form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment_distribution: Option<BTreeMap<String, u64>>,
}

/// Complete output of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Column role classification used by every stage.
    pub variables: VariableRoles,
    pub sample_info: SampleInfo,

    #[serde(flatten)]
    pub treatment_effect: Option<TreatmentEffect>,
    #[serde(flatten)]
    pub hypothesis_tests: Option<HypothesisTests>,
    #[serde(flatten)]
    pub regression: Option<RegressionAnalysis>,
    #[serde(flatten)]
    pub balance: Option<BalanceReport>,

    /// Significance level the run was configured with.
    pub alpha: f64,
    /// True when both an effect estimate and a p-value were produced.
    pub analysis_successful: bool,
    /// Explanation when the run could not get past identification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-text reading of the results, assisted mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,
}

impl AnalysisResult {
    /// An empty result shell for the given dataset shape; stages fill in
    /// their sections as they complete.
    pub(crate) fn shell(sample_info: SampleInfo, alpha: f64) -> Self {
        Self {
            variables: VariableRoles::default(),
            sample_info,
            treatment_effect: None,
            hypothesis_tests: None,
            regression: None,
            balance: None,
            alpha,
            analysis_successful: false,
            error: None,
            interpretation: None,
        }
    }

    /// Serializes to a JSON value for reporting.
    pub fn to_json(&self) -> crate::error::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
