use std::time::Duration;
use thiserror::Error;

/// Boundary errors for the navigation engine. Every fallible operation in
/// the core surfaces one of these kinds; nothing else escapes the crate.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error in {file}: {message}")]
    Config { file: String, message: String },

    #[error("Validation error on '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Contract not yet published: {0}")]
    ContractMissing(&'static str),

    #[error("Tier thresholds missing for module '{0}'")]
    ThresholdMissing(String),

    #[error("LLM request timed out after {0:?}")]
    LlmTimeout(Duration),

    #[error("LLM response failed validation: {0}")]
    LlmInvalid(String),
}

impl EngineError {
    pub fn config(file: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Config {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// LLM failures are absorbed by callers and replaced with deterministic
    /// output; this distinguishes them from errors that must propagate.
    pub fn is_llm_failure(&self) -> bool {
        matches!(self, EngineError::LlmTimeout(_) | EngineError::LlmInvalid(_))
    }
}
