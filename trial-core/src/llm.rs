//! Text-generation capability for assisted variable identification and
//! result interpretation.
//!
//! The crate never talks to a model service itself; callers supply an
//! implementation of [`TextGenerator`] (an HTTP client, a local model, a
//! test stub). Everything the generator returns is treated as untrusted:
//! any transport failure, malformed payload, or reference to a column the
//! dataset does not have is surfaced as an [`AnalyzerError`] and the
//! runner falls back to the heuristic identifier. The numeric stages are
//! always computed locally.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Write as _;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::analyzers::errors::{AnalyzerError, AnalyzerResult};
use crate::analyzers::identify::{
    Covariate, OutcomeVariable, TreatmentVariable, ValueType, VariableRoles,
};
use crate::dataset::{CellValue, Dataset};
use crate::result::AnalysisResult;

/// Number of data rows included in the identification prompt.
const PROMPT_SAMPLE_ROWS: usize = 20;

/// Errors produced by a [`TextGenerator`] implementation.
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// The underlying transport failed (network, timeout, auth).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered but the response was unusable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// A capability that turns a prompt into generated text.
///
/// Implementations are expected to be cheap to clone behind an `Arc` and
/// safe to call concurrently.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates a completion for the given prompt.
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError>;
}

/// Variable identification backed by a text generator.
///
/// Builds a prompt describing the dataset (schema, summary statistics,
/// a row sample, the experiment context) and parses the structured JSON
/// answer into [`VariableRoles`].
pub struct AssistedIdentifier<'a> {
    generator: &'a dyn TextGenerator,
}

/// JSON shape the generator is asked to produce.
#[derive(Debug, Deserialize)]
struct IdentificationPlan {
    treatment_variable: PlanTreatment,
    outcome_variable: PlanOutcome,
    #[serde(default)]
    covariates: Vec<PlanCovariate>,
}

#[derive(Debug, Deserialize)]
struct PlanTreatment {
    column_name: String,
    treatment_value: Option<serde_json::Value>,
    control_value: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PlanOutcome {
    column_name: String,
    #[serde(rename = "type")]
    value_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlanCovariate {
    column_name: String,
    #[serde(rename = "type")]
    value_type: Option<String>,
}

impl<'a> AssistedIdentifier<'a> {
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Self { generator }
    }

    /// Asks the generator to classify the dataset's columns.
    #[instrument(skip(self, dataset, context), fields(columns = dataset.num_columns()))]
    pub async fn identify(
        &self,
        dataset: &Dataset,
        context: &str,
    ) -> AnalyzerResult<VariableRoles> {
        let prompt = identification_prompt(dataset, context);
        let response = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|e| AnalyzerError::assisted(e.to_string()))?;

        let payload = strip_code_fences(&response);
        let plan: IdentificationPlan = serde_json::from_str(payload)?;
        debug!(
            treatment = %plan.treatment_variable.column_name,
            outcome = %plan.outcome_variable.column_name,
            "Parsed identification plan"
        );
        plan_to_roles(plan, dataset)
    }

    /// Asks the generator for a free-text reading of the finished
    /// analysis.
    #[instrument(skip(self, context, result))]
    pub async fn interpret(
        &self,
        context: &str,
        result: &AnalysisResult,
    ) -> AnalyzerResult<String> {
        let results_json = serde_json::to_string_pretty(result)?;
        let prompt = interpretation_prompt(context, &results_json);
        let text = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|e| AnalyzerError::assisted(e.to_string()))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(AnalyzerError::assisted("empty interpretation"));
        }
        Ok(text.to_string())
    }
}

/// Validates the plan against the dataset and converts it into roles.
fn plan_to_roles(plan: IdentificationPlan, dataset: &Dataset) -> AnalyzerResult<VariableRoles> {
    let columns = dataset.column_names();
    let require_column = |name: &str| -> AnalyzerResult<()> {
        if columns.contains(&name) {
            Ok(())
        } else {
            Err(AnalyzerError::assisted(format!(
                "plan references unknown column '{name}'"
            )))
        }
    };

    require_column(&plan.treatment_variable.column_name)?;
    require_column(&plan.outcome_variable.column_name)?;
    for covariate in &plan.covariates {
        require_column(&covariate.column_name)?;
    }

    let treatment_value = plan
        .treatment_variable
        .treatment_value
        .as_ref()
        .and_then(json_to_cell)
        .ok_or_else(|| AnalyzerError::assisted("plan is missing a usable treatment_value"))?;
    let control_value = plan
        .treatment_variable
        .control_value
        .as_ref()
        .and_then(json_to_cell)
        .ok_or_else(|| AnalyzerError::assisted("plan is missing a usable control_value"))?;
    if treatment_value.key() == control_value.key() {
        return Err(AnalyzerError::assisted(
            "treatment and control values are identical",
        ));
    }

    let outcome_type = parse_value_type(plan.outcome_variable.value_type.as_deref())
        .unwrap_or(ValueType::Continuous);
    let covariates = plan
        .covariates
        .into_iter()
        .filter(|c| {
            c.column_name != plan.treatment_variable.column_name
                && c.column_name != plan.outcome_variable.column_name
        })
        .map(|c| Covariate {
            value_type: parse_value_type(c.value_type.as_deref()).unwrap_or(ValueType::Continuous),
            column: c.column_name,
        })
        .collect();

    Ok(VariableRoles {
        treatment: Some(TreatmentVariable {
            column: plan.treatment_variable.column_name,
            treatment_value,
            control_value,
        }),
        outcome: Some(OutcomeVariable {
            column: plan.outcome_variable.column_name,
            value_type: outcome_type,
        }),
        covariates,
        all_columns: columns.iter().map(|s| s.to_string()).collect(),
    })
}

fn parse_value_type(label: Option<&str>) -> Option<ValueType> {
    match label?.to_lowercase().as_str() {
        "binary" => Some(ValueType::Binary),
        "categorical" => Some(ValueType::Categorical),
        "continuous" => Some(ValueType::Continuous),
        "count" => Some(ValueType::Count),
        _ => None,
    }
}

fn json_to_cell(value: &serde_json::Value) -> Option<CellValue> {
    match value {
        serde_json::Value::Bool(b) => Some(CellValue::Bool(*b)),
        serde_json::Value::Number(n) => n.as_f64().map(CellValue::Number),
        serde_json::Value::String(s) => Some(CellValue::Text(s.clone())),
        _ => None,
    }
}

/// Removes a surrounding markdown code fence, if any.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the fence line.
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

fn identification_prompt(dataset: &Dataset, context: &str) -> String {
    let columns = dataset.column_names();
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "You are an expert statistician analyzing experimental data. \
         Identify the variables needed for a treatment-effect analysis."
    );
    let _ = writeln!(prompt, "\n# EXPERIMENT CONTEXT\n{context}");

    let _ = writeln!(prompt, "\n# DATA STRUCTURE");
    let _ = writeln!(prompt, "Total rows: {}", dataset.num_rows());
    for name in &columns {
        let dtype = dataset
            .data_type(name)
            .map(|t| t.to_string())
            .unwrap_or_default();
        let distinct = dataset.distinct_non_null(name).len();
        let nulls = dataset.null_count(name);
        let _ = write!(prompt, "  {name}: {dtype}, {distinct} unique values");
        if nulls > 0 {
            let _ = write!(prompt, ", {nulls} missing");
        }
        let _ = writeln!(prompt);
    }

    let sample_rows = dataset.num_rows().min(PROMPT_SAMPLE_ROWS);
    let _ = writeln!(prompt, "\n# DATA SAMPLE (first {sample_rows} rows)");
    let _ = writeln!(prompt, "{}", columns.join("\t"));
    for row in 0..sample_rows {
        let line: Vec<String> = columns
            .iter()
            .map(|name| {
                dataset
                    .cell(name, row)
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "null".to_string())
            })
            .collect();
        let _ = writeln!(prompt, "{}", line.join("\t"));
    }

    let _ = writeln!(
        prompt,
        r#"
# YOUR TASK
Return a JSON object with this structure:

{{
  "treatment_variable": {{
    "column_name": "exact column name in data",
    "type": "binary" | "categorical",
    "treatment_value": <value marking the treatment arm>,
    "control_value": <value marking the control arm>
  }},
  "outcome_variable": {{
    "column_name": "exact column name in data",
    "type": "continuous" | "binary" | "categorical" | "count"
  }},
  "covariates": [
    {{
      "column_name": "exact column name",
      "type": "continuous" | "categorical" | "binary" | "count"
    }}
  ]
}}

IMPORTANT:
- Column names must exactly match the data.
- Consider the context when identifying variables.
- Return ONLY the JSON object, no additional text."#
    );

    prompt
}

fn interpretation_prompt(context: &str, results_json: &str) -> String {
    format!(
        r#"You are an expert statistician providing interpretation of experimental results.

# EXPERIMENT CONTEXT
{context}

# STATISTICAL RESULTS
{results_json}

# YOUR TASK
Provide a clear, concise interpretation of these results. Address:

1. What does the treatment effect mean in practical terms?
2. Is the effect statistically significant and practically meaningful?
3. How confident can we be in these results?
4. What are the key limitations or caveats?

Write in clear, accessible language suitable for both technical and
non-technical stakeholders. Keep it concise (3-5 paragraphs)."#
    )
}
