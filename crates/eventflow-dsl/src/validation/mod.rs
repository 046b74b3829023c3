use crate::error::DslError;
use crate::flow::FlowDocument;
use std::error::Error;
use std::fmt;

mod required;
mod values;

/// Represents a validation error found in a flow document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Error code (one of [`error_codes`])
    pub code: &'static str,

    /// Human-readable error message
    pub message: String,

    /// Optional path to the offending field (e.g., "tasks[1].execution")
    pub path: Option<String>,
}

impl ValidationError {
    /// Error at `path`
    pub fn at(code: &'static str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: Some(path.into()),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{}: {} (at {})", self.code, self.message, path)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl Error for ValidationError {}

/// Validation error codes
pub mod error_codes {
    /// Missing required field
    pub const MISSING_REQUIRED_FIELD: &str = "ERR_DSL_VALIDATION_MISSING_REQUIRED_FIELD";

    /// Execution type is not one of the supported values
    pub const INVALID_EXECUTION_TYPE: &str = "ERR_DSL_VALIDATION_INVALID_EXECUTION_TYPE";

    /// Duration text could not be parsed
    pub const INVALID_DURATION: &str = "ERR_DSL_VALIDATION_INVALID_DURATION";
}

/// A check over one aspect of a flow document
pub trait Validator {
    /// Validate the document and return a list of validation errors (if any)
    fn validate(&self, document: &FlowDocument) -> Vec<ValidationError>;
}

/// Run every validator and collect all errors
pub fn validate_document(document: &FlowDocument) -> Result<(), DslError> {
    let validators: [&dyn Validator; 2] = [
        &required::RequiredFieldsValidator,
        &values::ValueValidator,
    ];

    let errors: Vec<ValidationError> = validators
        .iter()
        .flat_map(|validator| validator.validate(document))
        .collect();

    match DslError::from_validation_errors(errors) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
