use crate::flow::FlowDocument;
use crate::parser::parse_duration;
use crate::validation::{error_codes, ValidationError, Validator};
use eventflow_core::ExecutionType;

/// Checks execution types and duration values
pub struct ValueValidator;

fn describe(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(text) => format!("'{text}'"),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "value".to_string()),
    }
}

impl Validator for ValueValidator {
    fn validate(&self, document: &FlowDocument) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let Some(ttl) = document.flow.as_ref().and_then(|f| f.ttl.as_ref()) {
            if parse_duration(ttl).is_none() {
                errors.push(ValidationError::at(
                    error_codes::INVALID_DURATION,
                    "flow.ttl",
                    format!("Invalid duration {}", describe(ttl)),
                ));
            }
        }

        for (i, task) in document.tasks.iter().enumerate() {
            if let Some(execution) = &task.execution {
                if execution.parse::<ExecutionType>().is_err() {
                    errors.push(ValidationError::at(
                        error_codes::INVALID_EXECUTION_TYPE,
                        format!("tasks[{i}].execution"),
                        format!(
                            "Execution type '{execution}' must be one of sequential, decision, end or sink"
                        ),
                    ));
                }
            }
            if let Some(timeout) = &task.timeout {
                if parse_duration(timeout).is_none() {
                    errors.push(ValidationError::at(
                        error_codes::INVALID_DURATION,
                        format!("tasks[{i}].timeout"),
                        format!("Invalid duration {}", describe(timeout)),
                    ));
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_flow_document;

    #[test]
    fn test_bad_execution_type_and_durations() {
        let document = parse_flow_document(
            r#"
flow: { id: f, ttl: forever }
first.task: a
tasks:
  - { process: v1.a, execution: parallel, timeout: 0s }
  - { process: v1.b, execution: end, timeout: 2s }
"#,
        )
        .unwrap();

        let errors = ValueValidator.validate(&document);
        let found: Vec<(&str, Option<&str>)> =
            errors.iter().map(|e| (e.code, e.path.as_deref())).collect();
        assert_eq!(
            found,
            vec![
                (error_codes::INVALID_DURATION, Some("flow.ttl")),
                (error_codes::INVALID_EXECUTION_TYPE, Some("tasks[0].execution")),
                (error_codes::INVALID_DURATION, Some("tasks[0].timeout")),
            ]
        );
        assert!(errors[0].message.contains("'forever'"));
    }
}
