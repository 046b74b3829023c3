use crate::flow::FlowDocument;
use crate::validation::{error_codes, ValidationError, Validator};

/// Checks that fields without a sensible default are present and non-empty
pub struct RequiredFieldsValidator;

fn missing(path: String, what: &str) -> ValidationError {
    ValidationError::at(
        error_codes::MISSING_REQUIRED_FIELD,
        path,
        format!("{what} is required"),
    )
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

impl Validator for RequiredFieldsValidator {
    fn validate(&self, document: &FlowDocument) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        match &document.flow {
            None => errors.push(missing("flow".to_string(), "Flow section")),
            Some(header) if is_blank(header.id.as_deref()) => {
                errors.push(missing("flow.id".to_string(), "Flow id"))
            }
            Some(_) => {}
        }
        if is_blank(document.first_task.as_deref()) {
            errors.push(missing("first.task".to_string(), "Start task"));
        }
        if document.tasks.is_empty() {
            errors.push(missing("tasks".to_string(), "At least one task"));
        }

        for (i, task) in document.tasks.iter().enumerate() {
            if is_blank(task.process.as_deref()) {
                errors.push(missing(format!("tasks[{i}].process"), "Function route"));
            }
            if task.execution.is_none() {
                errors.push(missing(format!("tasks[{i}].execution"), "Execution type"));
            }
        }
        errors
    }
}
