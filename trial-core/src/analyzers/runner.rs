//! Analysis orchestration: stage sequencing and the partial-failure
//! policy.
//!
//! The runner drives the fixed stage sequence (identify, estimate, test,
//! regress, balance) and turns stage failures into degraded results
//! instead of errors. A stage that returns an [`AnalyzerError`] is logged
//! and its section stays absent from the result; the remaining stages
//! still run. Only an unusable dataset (zero columns, rejected at
//! construction) ever reaches the caller as an `Err`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::balance::BalanceChecker;
use super::effect::TreatmentEffectEstimator;
use super::errors::AnalyzerError;
use super::hypothesis::HypothesisTester;
use super::identify::{VariableIdentifier, VariableRoles};
use super::regression::RegressionEngine;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::llm::{AssistedIdentifier, TextGenerator};
use crate::result::{AnalysisResult, SampleInfo};

/// Default significance level.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Analysis stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Estimating,
    Testing,
    Regressing,
    Balancing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Estimating => "treatment_effect",
            Self::Testing => "hypothesis_tests",
            Self::Regressing => "regression",
            Self::Balancing => "balance_check",
        };
        write!(f, "{name}")
    }
}

/// Configuration for one analysis run.
#[derive(Clone, Default)]
pub struct AnalysisOptions {
    alpha: Option<f64>,
    assisted: bool,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl AnalysisOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the significance level (default 0.05).
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = Some(alpha);
        self
    }

    /// Enables generator-assisted identification and interpretation.
    /// Has no effect unless a generator is also supplied.
    pub fn with_assisted(mut self, assisted: bool) -> Self {
        self.assisted = assisted;
        self
    }

    /// Supplies the text-generation capability for assisted mode.
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn alpha(&self) -> f64 {
        self.alpha.unwrap_or(DEFAULT_ALPHA)
    }

    fn active_generator(&self) -> Option<&dyn TextGenerator> {
        if self.assisted {
            self.generator.as_deref()
        } else {
            None
        }
    }
}

impl fmt::Debug for AnalysisOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisOptions")
            .field("alpha", &self.alpha())
            .field("assisted", &self.assisted)
            .field("generator", &self.generator.is_some())
            .finish()
    }
}

/// Drives the full analysis pipeline over one dataset.
#[derive(Debug)]
pub struct AnalysisRunner {
    options: AnalysisOptions,
}

impl AnalysisRunner {
    pub fn new(options: AnalysisOptions) -> Self {
        Self { options }
    }

    /// Runs every stage and assembles the result envelope.
    ///
    /// Identification failure (no treatment or no outcome) produces an
    /// unsuccessful result with an explanatory `error` field; stage
    /// failures after identification degrade to absent sections.
    #[instrument(skip(self, dataset, context), fields(rows = dataset.num_rows(), columns = dataset.num_columns()))]
    pub async fn run(&self, dataset: &Dataset, context: &str) -> Result<AnalysisResult> {
        info!("Starting trial analysis");
        let alpha = self.options.alpha();

        let roles = self.identify(dataset, context).await;
        let sample_info = sample_info(dataset, &roles);
        let mut result = AnalysisResult::shell(sample_info, alpha);
        result.variables = roles.clone();

        if !roles.is_complete() {
            warn!("Could not identify treatment and outcome variables");
            result.error = Some("Could not identify treatment and outcome variables".to_string());
            return Ok(result);
        }

        result.treatment_effect = guard(
            Stage::Estimating,
            TreatmentEffectEstimator::new().estimate(dataset, &roles),
        );
        result.hypothesis_tests = guard(
            Stage::Testing,
            HypothesisTester::new(alpha).test(dataset, &roles),
        );
        result.regression = guard(
            Stage::Regressing,
            RegressionEngine::new().analyze(dataset, &roles),
        );
        result.balance = guard(
            Stage::Balancing,
            BalanceChecker::new().check(dataset, &roles),
        );

        result.analysis_successful =
            result.treatment_effect.is_some() && result.hypothesis_tests.is_some();

        if let Some(generator) = self.options.active_generator() {
            match AssistedIdentifier::new(generator)
                .interpret(context, &result)
                .await
            {
                Ok(text) => result.interpretation = Some(text),
                Err(error) => {
                    warn!(%error, "Interpretation unavailable");
                }
            }
        }

        info!(
            analysis_successful = result.analysis_successful,
            "Trial analysis complete"
        );
        Ok(result)
    }

    /// Resolves variable roles, consulting the generator first in
    /// assisted mode and falling back to the heuristics on any failure.
    async fn identify(&self, dataset: &Dataset, context: &str) -> VariableRoles {
        if let Some(generator) = self.options.active_generator() {
            match AssistedIdentifier::new(generator)
                .identify(dataset, context)
                .await
            {
                Ok(roles) if roles.is_complete() => {
                    info!("Using generator-assisted variable identification");
                    return roles;
                }
                Ok(_) => {
                    warn!("Assisted identification incomplete; using heuristics");
                }
                Err(error) => {
                    warn!(%error, "Assisted identification failed; using heuristics");
                }
            }
        }
        VariableIdentifier::new().identify(dataset, context)
    }
}

/// Logs and discards a stage failure, keeping the success value.
fn guard<T>(stage: Stage, result: std::result::Result<T, AnalyzerError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(stage = %stage, %error, "Analysis stage failed; omitting its section");
            None
        }
    }
}

/// Dataset shape plus the per-value row counts of the treatment column.
fn sample_info(dataset: &Dataset, roles: &VariableRoles) -> SampleInfo {
    let treatment_distribution = roles.treatment.as_ref().and_then(|treatment| {
        let values = dataset.cell_values(&treatment.column).ok()?;
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for value in values.into_iter().flatten() {
            *counts.entry(value.key()).or_insert(0) += 1;
        }
        Some(counts)
    });

    SampleInfo {
        total_sample_size: dataset.num_rows() as u64,
        n_variables: dataset.num_columns() as u64,
        treatment_distribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::dataset_from_columns;
    use crate::llm::GeneratorError;
    use arrow::array::{ArrayRef, Float64Array, Int64Array};
    use async_trait::async_trait;
    use std::sync::Arc;

    fn trial_dataset() -> Dataset {
        let treatment: Vec<i64> = (0..40).map(|i| i % 2).collect();
        let outcome: Vec<f64> = (0..40)
            .map(|i| 10.0 + 0.3 * (i % 7) as f64 + if i % 2 == 1 { 5.0 } else { 0.0 })
            .collect();
        dataset_from_columns(vec![
            (
                "treatment",
                Arc::new(Int64Array::from(treatment)) as ArrayRef,
            ),
            ("outcome", Arc::new(Float64Array::from(outcome)) as ArrayRef),
        ])
        .unwrap()
    }

    struct BrokenGenerator;

    #[async_trait]
    impl crate::llm::TextGenerator for BrokenGenerator {
        async fn generate(&self, _prompt: &str) -> std::result::Result<String, GeneratorError> {
            Err(GeneratorError::Transport("connection refused".into()))
        }
    }

    struct GarbageGenerator;

    #[async_trait]
    impl crate::llm::TextGenerator for GarbageGenerator {
        async fn generate(&self, _prompt: &str) -> std::result::Result<String, GeneratorError> {
            Ok("not json at all".into())
        }
    }

    #[tokio::test]
    async fn test_full_run_on_clean_data() {
        let runner = AnalysisRunner::new(AnalysisOptions::new());
        let result = runner.run(&trial_dataset(), "").await.unwrap();

        assert!(result.analysis_successful);
        assert!(result.treatment_effect.is_some());
        assert!(result.hypothesis_tests.is_some());
        assert!(result.regression.is_some());
        assert!(result.balance.is_some());
        assert!(result.error.is_none());
        assert_eq!(result.sample_info.total_sample_size, 40);
        let distribution = result.sample_info.treatment_distribution.unwrap();
        assert_eq!(distribution["0"], 20);
        assert_eq!(distribution["1"], 20);
        assert_eq!(result.variables.all_columns, vec!["treatment", "outcome"]);
    }

    #[tokio::test]
    async fn test_identification_failure_degrades_gracefully() {
        // A single constant column gives neither treatment nor outcome.
        let dataset = dataset_from_columns(vec![(
            "value",
            Arc::new(Float64Array::from(vec![1.0, 1.0, 1.0])) as ArrayRef,
        )])
        .unwrap();

        let runner = AnalysisRunner::new(AnalysisOptions::new());
        let result = runner.run(&dataset, "").await.unwrap();

        assert!(!result.analysis_successful);
        assert!(result.error.is_some());
        assert!(result.treatment_effect.is_none());
        assert_eq!(result.sample_info.total_sample_size, 3);
    }

    #[tokio::test]
    async fn test_assisted_mode_falls_back_to_heuristics() {
        let options = AnalysisOptions::new()
            .with_assisted(true)
            .with_generator(Arc::new(BrokenGenerator));
        let runner = AnalysisRunner::new(options);
        let result = runner.run(&trial_dataset(), "").await.unwrap();

        // The generator is unreachable; heuristics still succeed.
        assert!(result.analysis_successful);
        assert_eq!(
            result.variables.treatment.as_ref().unwrap().column,
            "treatment"
        );
        assert!(result.interpretation.is_none());
    }

    #[tokio::test]
    async fn test_malformed_plan_discarded_but_interpretation_kept() {
        let options = AnalysisOptions::new()
            .with_assisted(true)
            .with_generator(Arc::new(GarbageGenerator));
        let runner = AnalysisRunner::new(options);
        let result = runner.run(&trial_dataset(), "").await.unwrap();

        // The unparseable plan falls back to heuristics; the free-text
        // interpretation has no structure requirement and is kept as-is.
        assert!(result.analysis_successful);
        assert_eq!(result.interpretation.as_deref(), Some("not json at all"));
    }

    #[tokio::test]
    async fn test_generator_ignored_without_assisted_flag() {
        let options = AnalysisOptions::new().with_generator(Arc::new(BrokenGenerator));
        let runner = AnalysisRunner::new(options);
        let result = runner.run(&trial_dataset(), "").await.unwrap();
        assert!(result.analysis_successful);
        assert!(result.interpretation.is_none());
    }

    #[tokio::test]
    async fn test_runs_are_idempotent() {
        let runner = AnalysisRunner::new(AnalysisOptions::new());
        let dataset = trial_dataset();
        let first = runner.run(&dataset, "context").await.unwrap();
        let second = runner.run(&dataset, "context").await.unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
