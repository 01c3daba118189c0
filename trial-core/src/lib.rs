//! # trial-core - Automated RCT Analysis for Rust
//!
//! trial-core takes a tabular dataset from a randomized controlled trial
//! (or A/B test), figures out which columns hold the treatment
//! assignment, the outcome, and the covariates, and produces a complete
//! statistical report: treatment effect with confidence interval,
//! parametric and non-parametric hypothesis tests, simple and
//! covariate-adjusted regression, and randomization balance diagnostics.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use arrow::array::{ArrayRef, Float64Array, Int64Array};
//! use trial_core::dataset::dataset_from_columns;
//! use trial_core::{analyze, AnalysisOptions};
//!
//! # async fn example() -> trial_core::Result<()> {
//! let dataset = dataset_from_columns(vec![
//!     (
//!         "treatment",
//!         Arc::new(Int64Array::from(vec![0, 1, 0, 1, 0, 1])) as ArrayRef,
//!     ),
//!     (
//!         "outcome",
//!         Arc::new(Float64Array::from(vec![1.0, 3.5, 1.5, 4.0, 0.5, 3.0])) as ArrayRef,
//!     ),
//! ])?;
//!
//! let result = analyze(&dataset, "A/B test of the new onboarding flow", &AnalysisOptions::new()).await?;
//!
//! if result.analysis_successful {
//!     let effect = result.treatment_effect.as_ref().unwrap();
//!     println!("ATE: {:.2}", effect.average_treatment_effect);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Degradation policy
//!
//! The pipeline never panics on bad data and almost never returns an
//! error. A dataset where no treatment or outcome can be identified
//! yields a result with `analysis_successful = false` and an `error`
//! message; a stage that cannot compute (an empty arm, too few rows, a
//! singular design matrix) is logged and its keys are simply absent from
//! the result. The only hard error is a structurally unusable dataset
//! (zero columns), rejected at [`Dataset`](dataset::Dataset)
//! construction.
//!
//! ## Assisted mode
//!
//! When a [`TextGenerator`](llm::TextGenerator) implementation is
//! supplied and assisted mode is enabled, variable identification is
//! first delegated to the generator and a free-text interpretation of
//! the finished report is requested. Every numeric result is still
//! computed locally, and any generator failure falls back to the
//! deterministic heuristics.
//!
//! ## Architecture
//!
//! - **`dataset`**: Arrow-backed immutable dataset with canonical cell
//!   values
//! - **`analyzers`**: the analysis stages and their orchestration
//! - **`llm`**: the text-generation capability seam
//! - **`result`**: the flat JSON result envelope
//! - **`logging`**: `tracing` subscriber configuration

pub mod analyzers;
pub mod dataset;
pub mod error;
pub mod llm;
pub mod logging;
pub mod prelude;
pub mod result;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use analyzers::runner::{AnalysisOptions, AnalysisRunner, DEFAULT_ALPHA};
pub use dataset::Dataset;
pub use error::{Result, TrialError};
pub use result::AnalysisResult;

/// Runs the full analysis pipeline over a dataset.
///
/// `context` is a free-text description of the experiment; it guides
/// outcome identification and, in assisted mode, the generator prompts.
/// See the crate docs for the degradation policy.
pub async fn analyze(
    dataset: &Dataset,
    context: &str,
    options: &AnalysisOptions,
) -> Result<AnalysisResult> {
    AnalysisRunner::new(options.clone()).run(dataset, context).await
}
