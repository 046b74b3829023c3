use crate::error::DslError;
use crate::flow::FlowDocument;
use eventflow_core::{ExecutionType, FlowDefinition, TaskDefinition};
use std::time::Duration;

/// Parse a YAML string into a FlowDocument.
///
/// Only the YAML syntax and the document shape are checked here; field level problems are
/// reported by the validation module.
pub fn parse_flow_document(yaml_str: &str) -> Result<FlowDocument, DslError> {
    let document: FlowDocument = serde_yaml::from_str(yaml_str)?;
    Ok(document)
}

/// Parse a duration such as `500ms`, `30s`, `5m` or `1h`. A bare number means seconds.
///
/// Zero, negative and unparsable values are rejected.
pub fn parse_duration(value: &serde_yaml::Value) -> Option<Duration> {
    match value {
        serde_yaml::Value::Number(n) => n
            .as_u64()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
        serde_yaml::Value::String(text) => parse_duration_text(text),
        _ => None,
    }
}

fn parse_duration_text(text: &str) -> Option<Duration> {
    let text = text.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let amount: u64 = text[..split].parse().ok()?;
    let millis = match text[split..].trim() {
        "ms" => Some(amount),
        "" | "s" => amount.checked_mul(1_000),
        "m" => amount.checked_mul(60_000),
        "h" => amount.checked_mul(3_600_000),
        _ => None,
    }?;
    (millis > 0).then(|| Duration::from_millis(millis))
}

/// Convert a validated document into a flow definition.
///
/// Call [`crate::validation::validate_document`] first; anything it would reject is reported
/// here again as a plain flow load error.
pub fn to_definition(document: &FlowDocument) -> Result<FlowDefinition, DslError> {
    let header = document.flow.clone().unwrap_or_default();
    let mut definition = FlowDefinition {
        id: header.id.unwrap_or_default(),
        description: header.description.unwrap_or_default(),
        ttl_ms: header
            .ttl
            .as_ref()
            .and_then(parse_duration)
            .map(|ttl| ttl.as_millis() as u64),
        first_task: document.first_task.clone().unwrap_or_default(),
        tasks: Vec::with_capacity(document.tasks.len()),
    };

    for task in &document.tasks {
        let execution = match task.execution.as_deref() {
            Some(text) => text.parse::<ExecutionType>()?,
            None => ExecutionType::default(),
        };
        let monitor = task.monitor.clone().unwrap_or_default();
        definition.tasks.push(TaskDefinition {
            name: task.effective_name().unwrap_or_default().to_string(),
            process: task.process.clone().unwrap_or_default(),
            description: task.description.clone().unwrap_or_default(),
            execution,
            input: task.input.clone(),
            output: task.output.clone(),
            next: task.next.clone(),
            timeout_ms: task
                .timeout
                .as_ref()
                .and_then(parse_duration)
                .map(|t| t.as_millis() as u64),
            monitor_before: monitor.before,
            monitor_after: monitor.after,
        });
    }
    Ok(definition)
}
