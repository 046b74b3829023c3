use crate::validation::ValidationError;
use eventflow_core::CoreError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All possible errors raised while turning a YAML document into a flow
#[derive(Error, Debug)]
pub enum DslError {
    /// Errors that occur during YAML parsing
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A flow file or directory could not be read
    #[error("Unable to read {path}: {source}")]
    IoError {
        /// File or directory
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// A single validation error
    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),

    /// Multiple validation errors
    #[error("{}", MultipleErrorsFormat(.0))]
    MultipleValidationErrors(Vec<ValidationError>),

    /// The document is well formed but the flow graph is not
    #[error(transparent)]
    FlowLoad(#[from] CoreError),
}

// Helper struct to format multiple errors
struct MultipleErrorsFormat<'a>(&'a [ValidationError]);

impl fmt::Display for MultipleErrorsFormat<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multiple validation errors ({} issues):", self.0.len())?;
        for (i, err) in self.0.iter().enumerate() {
            write!(f, "\n  {}. {}", i + 1, err)?;
        }
        Ok(())
    }
}

impl DslError {
    /// Wrap collected validation errors; `None` when there are none
    pub fn from_validation_errors(mut errors: Vec<ValidationError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop().map(DslError::ValidationError),
            _ => Some(DslError::MultipleValidationErrors(errors)),
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            DslError::YamlError(_) => "ERR_DSL_YAML_PARSE",
            DslError::IoError { .. } => "ERR_DSL_IO",
            DslError::ValidationError(err) => err.code,
            DslError::MultipleValidationErrors(_) => "ERR_DSL_VALIDATION_MULTIPLE",
            DslError::FlowLoad(_) => "ERR_DSL_FLOW_LOAD",
        }
    }

    /// Every validation error code carried by this error
    pub fn validation_codes(&self) -> Vec<&'static str> {
        match self {
            DslError::ValidationError(err) => vec![err.code],
            DslError::MultipleValidationErrors(errors) => errors.iter().map(|e| e.code).collect(),
            _ => Vec::new(),
        }
    }
}
