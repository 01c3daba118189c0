//! Prelude for commonly used types in trial-core.

pub use crate::analyzers::identify::{VariableIdentifier, VariableRoles};
pub use crate::analyzers::runner::{AnalysisOptions, AnalysisRunner};
pub use crate::dataset::{CellValue, Dataset};
pub use crate::error::{Result, TrialError};
pub use crate::llm::{GeneratorError, TextGenerator};
pub use crate::logging::LoggingConfig;
pub use crate::result::AnalysisResult;
pub use crate::analyze;
