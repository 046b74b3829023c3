//! Applies parsed mapping lines to a state store.

use crate::domain::flow_definition::Task;
use crate::domain::mapping::{Conversion, MappingLine, Source, Target};
use crate::domain::plugin::{PluginRegistry, PluginValue};
use crate::domain::state_store::StateStore;
use crate::domain::substitution::substitute;
use crate::CoreError;
use serde_json::{Number, Value};
use std::collections::HashMap;
use tracing::{trace, warn};
use uuid::Uuid;

/// Request body and headers built by an input mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedRequest {
    /// Request body, an object when any body path was mapped
    pub body: Value,
    /// Request headers
    pub headers: HashMap<String, String>,
}

/// Run the input mapping of `task`.
///
/// `model.*` targets are written straight into `state`; everything else goes into the request.
pub fn map_input(
    task: &Task,
    state: &mut StateStore,
    plugins: &PluginRegistry,
) -> Result<MappedRequest, CoreError> {
    let mut body = StateStore::new();
    let mut headers = HashMap::new();

    for raw in task.input() {
        let line = substitute(raw, state);
        let mapping = MappingLine::parse_input(&line)?;
        let value = evaluate(&mapping.source, state, plugins)?;
        trace!(task = %task.name(), line = %line, "Input mapping");

        match (mapping.target, value) {
            (Target::Model(path), Some(value)) if !value.is_null() => {
                state.set_element(&path, value)?
            }
            (Target::Model(path), _) => {
                state.remove_element(&path);
            }
            (Target::RequestHeader(name), Some(value)) if !value.is_null() => {
                headers.insert(name, value_to_text(&value));
            }
            (Target::RequestBody(path), Some(value)) => body.set_element(&path, value)?,
            _ => {}
        }
    }

    Ok(MappedRequest {
        body: body.into_value(),
        headers,
    })
}

/// Run the output mapping of `task` and return the value written to `decision`, if any.
///
/// Call after `result`, `status` and `header` of the latest response are in `state`.
pub fn map_output(
    task: &Task,
    state: &mut StateStore,
    plugins: &PluginRegistry,
    allow_decision: bool,
) -> Result<Option<Value>, CoreError> {
    let mut decision = None;

    for raw in task.output() {
        let line = substitute(raw, state);
        let mapping = MappingLine::parse_output(&line, allow_decision)?;
        let value = evaluate(&mapping.source, state, plugins)?;
        trace!(task = %task.name(), line = %line, "Output mapping");

        match mapping.target {
            Target::Model(path) => match value {
                Some(value) if !value.is_null() => state.set_element(&path, value)?,
                _ => {
                    state.remove_element(&path);
                }
            },
            Target::Output(path) => {
                if let Some(value) = value {
                    state.set_element(&path, value)?;
                }
            }
            Target::Decision => decision = Some(value.unwrap_or(Value::Null)),
            Target::RequestBody(_) | Target::RequestHeader(_) => {
                return Err(CoreError::MappingError(format!(
                    "Invalid mapping '{line}': not an output target"
                )))
            }
        }
    }
    Ok(decision)
}

/// Evaluate the left-hand side of a mapping line. Missing elements are `None`.
pub fn evaluate(
    source: &Source,
    state: &StateStore,
    plugins: &PluginRegistry,
) -> Result<Option<Value>, CoreError> {
    match source {
        Source::Constant(value) => Ok(Some(value.clone())),
        Source::Path(path) => Ok(state.get_element(path).cloned()),
        Source::Typed { path, conversion } => {
            Ok(convert(path, state.get_element(path), conversion))
        }
        Source::Plugin { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                let value = evaluate(arg, state, plugins)?;
                values.push(value.as_ref().map_or(PluginValue::Null, PluginValue::from));
            }
            let result = plugins.invoke(name, &values)?;
            Ok(Some(Value::from(result)))
        }
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Apply a type suffix. A value that cannot be converted is kept as it is.
fn convert(path: &str, value: Option<&Value>, conversion: &Conversion) -> Option<Value> {
    if let Conversion::Uuid = conversion {
        return Some(Value::String(Uuid::new_v4().to_string()));
    }
    if let Conversion::Length = conversion {
        let length = match value {
            None | Some(Value::Null) => 0,
            Some(Value::String(text)) => text.chars().count(),
            Some(Value::Array(items)) => items.len(),
            Some(Value::Object(map)) => map.len(),
            Some(other) => other.to_string().chars().count(),
        };
        return Some(Value::from(length));
    }

    let value = value?;
    let text = value_to_text(value);
    let converted = match conversion {
        Conversion::Text => Some(Value::String(text)),
        Conversion::Int | Conversion::Long => whole_number(value, &text).map(Value::from),
        Conversion::Float | Conversion::Double => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        Conversion::Boolean => Some(Value::Bool(text.trim().eq_ignore_ascii_case("true"))),
        Conversion::Negate => Some(Value::Bool(!text.trim().eq_ignore_ascii_case("true"))),
        Conversion::Substring { start, end } => substring(&text, *start, *end).map(Value::String),
        Conversion::Uuid | Conversion::Length => None,
    };

    match converted {
        Some(converted) => Some(converted),
        None => {
            warn!(path, ?conversion, "Unable to convert value, kept as is");
            Some(value.clone())
        }
    }
}

fn whole_number(value: &Value, text: &str) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => {
            let trimmed = text.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f.trunc() as i64))
        }
    }
}

fn substring(text: &str, start: usize, end: Option<usize>) -> Option<String> {
    let length = text.chars().count();
    let end = end.unwrap_or(length);
    if end <= start || end > length {
        return None;
    }
    Some(text.chars().skip(start).take(end - start).collect())
}
