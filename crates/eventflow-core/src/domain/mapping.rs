//! Grammar of the `lhs -> rhs` lines used by task input and output mappings.

use crate::domain::state_store::is_valid_path;
use crate::CoreError;
use serde_json::{Number, Value};

const MAP_TO: &str = "->";
const PLUGIN_PREFIX: &str = "f:";
const DECISION: &str = "decision";

/// Which side of a dispatch a mapping line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Builds the request from the state store
    Input,
    /// Writes the response back into the state store
    Output,
}

/// Type conversion suffix on a `model.` source, e.g. `model.count:int`
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Conversion {
    Text,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Negate,
    Length,
    Uuid,
    Substring { start: usize, end: Option<usize> },
}

/// Left-hand side of a mapping line
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Literal from `text(..)`, `int(..)`, `long(..)`, `float(..)`, `double(..)` or `boolean(..)`
    Constant(Value),
    /// Element of the state store
    Path(String),
    /// `model.` element with a type conversion applied
    Typed {
        /// Path without the suffix
        path: String,
        /// Conversion to apply
        conversion: Conversion,
    },
    /// `f:name(arg, ...)` plugin call
    Plugin {
        /// Plugin name
        name: String,
        /// Arguments, each a constant or a path
        args: Vec<Source>,
    },
}

/// Right-hand side of a mapping line
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Path inside the request body
    RequestBody(String),
    /// Request header
    RequestHeader(String),
    /// `model.` element of the state store
    Model(String),
    /// `output.` element of the state store
    Output(String),
    /// Selector for the next task of a decision task
    Decision,
}

/// One parsed mapping line
#[derive(Debug, Clone, PartialEq)]
pub struct MappingLine {
    /// Value source
    pub source: Source,
    /// Write target
    pub target: Target,
}

fn invalid(line: &str, reason: impl std::fmt::Display) -> CoreError {
    CoreError::MappingError(format!("Invalid mapping '{line}': {reason}"))
}

fn split_line(line: &str) -> Result<(&str, &str), CoreError> {
    let sep = line
        .rfind(MAP_TO)
        .ok_or_else(|| invalid(line, "missing '->'"))?;
    let lhs = line[..sep].trim();
    let rhs = line[sep + MAP_TO.len()..].trim();
    if lhs.is_empty() || rhs.is_empty() {
        return Err(invalid(line, "both sides of '->' are required"));
    }
    if lhs == rhs {
        return Err(invalid(line, "source and target are the same"));
    }
    Ok((lhs, rhs))
}

impl MappingLine {
    /// Parse an input mapping line
    pub fn parse_input(line: &str) -> Result<Self, CoreError> {
        let (lhs, rhs) = split_line(line)?;
        Ok(Self {
            source: parse_source(line, lhs, Direction::Input)?,
            target: parse_input_target(line, rhs)?,
        })
    }

    /// Parse an output mapping line; `decision` is only accepted when `allow_decision` is set
    pub fn parse_output(line: &str, allow_decision: bool) -> Result<Self, CoreError> {
        let (lhs, rhs) = split_line(line)?;
        Ok(Self {
            source: parse_source(line, lhs, Direction::Output)?,
            target: parse_output_target(line, rhs, allow_decision)?,
        })
    }
}

/// Split on commas that are not nested inside parentheses
fn split_args(text: &str) -> Vec<&str> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(text[start..].trim());
    args
}

/// Parse `text(..)`, `int(..)` and friends. `None` when `expr` is not a constant at all.
pub fn parse_constant(expr: &str) -> Option<Result<Value, String>> {
    if !expr.ends_with(')') {
        return None;
    }
    let open = expr.find('(')?;
    let kind = &expr[..open];
    let inner = &expr[open + 1..expr.len() - 1];
    let parsed = match kind {
        "text" => Ok(Value::String(inner.to_string())),
        "int" | "long" => inner
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("'{inner}' is not a whole number")),
        "float" | "double" => inner
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("'{inner}' is not a number")),
        "boolean" => Ok(Value::Bool(inner.trim().eq_ignore_ascii_case("true"))),
        _ => return None,
    };
    Some(parsed)
}

fn parse_source(line: &str, lhs: &str, direction: Direction) -> Result<Source, CoreError> {
    if let Some(call) = lhs.strip_prefix(PLUGIN_PREFIX) {
        return parse_plugin_call(line, call);
    }
    if let Some(constant) = parse_constant(lhs) {
        return constant.map(Source::Constant).map_err(|e| invalid(line, e));
    }

    if lhs == "model" {
        return Err(invalid(line, "the model namespace cannot be mapped as a whole"));
    }
    if lhs.starts_with("model.") {
        return match lhs.split_once(':') {
            Some((path, suffix)) => {
                let path = path.trim();
                ensure_path(line, path)?;
                Ok(Source::Typed {
                    path: path.to_string(),
                    conversion: parse_conversion(line, suffix.trim())?,
                })
            }
            None => {
                ensure_path(line, lhs)?;
                Ok(Source::Path(lhs.to_string()))
            }
        };
    }

    let readable = match direction {
        Direction::Input => is_namespace(lhs, "input"),
        Direction::Output => {
            is_namespace(lhs, "input")
                || is_namespace(lhs, "result")
                || is_namespace(lhs, "header")
                || lhs == "status"
        }
    };
    if !readable {
        return Err(invalid(line, format!("'{lhs}' is not a readable source")));
    }
    ensure_path(line, lhs)?;
    Ok(Source::Path(lhs.to_string()))
}

fn is_namespace(path: &str, namespace: &str) -> bool {
    path == namespace
        || path
            .strip_prefix(namespace)
            .map_or(false, |rest| rest.starts_with('.'))
}

fn ensure_path(line: &str, path: &str) -> Result<(), CoreError> {
    if is_valid_path(path) {
        Ok(())
    } else {
        Err(invalid(line, format!("'{path}' is not a valid path")))
    }
}

fn parse_plugin_call(line: &str, call: &str) -> Result<Source, CoreError> {
    let open = call
        .find('(')
        .filter(|_| call.ends_with(')'))
        .ok_or_else(|| invalid(line, "plugin call must look like f:name(args)"))?;
    let name = call[..open].trim();
    if name.is_empty() {
        return Err(invalid(line, "plugin name is missing"));
    }
    let inner = &call[open + 1..call.len() - 1];
    let mut args = Vec::new();
    if !inner.trim().is_empty() {
        for arg in split_args(inner) {
            let source = match parse_constant(arg) {
                Some(constant) => Source::Constant(constant.map_err(|e| invalid(line, e))?),
                None => {
                    ensure_path(line, arg)?;
                    Source::Path(arg.to_string())
                }
            };
            args.push(source);
        }
    }
    Ok(Source::Plugin {
        name: name.to_string(),
        args,
    })
}

fn parse_conversion(line: &str, suffix: &str) -> Result<Conversion, CoreError> {
    let conversion = match suffix {
        "text" => Conversion::Text,
        "int" => Conversion::Int,
        "long" => Conversion::Long,
        "float" => Conversion::Float,
        "double" => Conversion::Double,
        "boolean" => Conversion::Boolean,
        "!" => Conversion::Negate,
        "length" => Conversion::Length,
        "uuid" => Conversion::Uuid,
        _ => {
            let bounds = suffix
                .strip_prefix("substring(")
                .and_then(|rest| rest.strip_suffix(')'))
                .ok_or_else(|| invalid(line, format!("unknown type '{suffix}'")))?;
            let parts: Vec<&str> = bounds.split(',').map(str::trim).collect();
            let index = |text: &str| {
                text.parse::<usize>()
                    .map_err(|_| invalid(line, format!("'{text}' is not a substring index")))
            };
            match parts.as_slice() {
                [start] => Conversion::Substring { start: index(*start)?, end: None },
                [start, end] => {
                    let (start, end) = (index(*start)?, index(*end)?);
                    if end <= start {
                        return Err(invalid(line, "substring end must be greater than start"));
                    }
                    Conversion::Substring { start, end: Some(end) }
                }
                _ => return Err(invalid(line, "substring takes one or two indexes")),
            }
        }
    };
    Ok(conversion)
}

fn parse_input_target(line: &str, rhs: &str) -> Result<Target, CoreError> {
    if let Some(header) = rhs.strip_prefix("header.") {
        if header.is_empty() {
            return Err(invalid(line, "header name is missing"));
        }
        return Ok(Target::RequestHeader(header.to_string()));
    }
    if rhs == "model" {
        return Err(invalid(line, "the model namespace cannot be replaced as a whole"));
    }
    ensure_path(line, rhs)?;
    if rhs.starts_with("model.") {
        Ok(Target::Model(rhs.to_string()))
    } else {
        Ok(Target::RequestBody(rhs.to_string()))
    }
}

fn parse_output_target(line: &str, rhs: &str, allow_decision: bool) -> Result<Target, CoreError> {
    if rhs == DECISION {
        return if allow_decision {
            Ok(Target::Decision)
        } else {
            Err(invalid(line, "'decision' is only valid in a decision task"))
        };
    }
    if rhs.starts_with("model.") {
        ensure_path(line, rhs)?;
        return Ok(Target::Model(rhs.to_string()));
    }
    if rhs.starts_with("output.") {
        ensure_path(line, rhs)?;
        return Ok(Target::Output(rhs.to_string()));
    }
    Err(invalid(line, "target must be model.*, output.* or decision"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_input_lines() {
        let line = MappingLine::parse_input("input.name -> name").unwrap();
        assert_eq!(line.source, Source::Path("input.name".to_string()));
        assert_eq!(line.target, Target::RequestBody("name".to_string()));

        let line = MappingLine::parse_input("text(hello world) -> header.greeting").unwrap();
        assert_eq!(line.source, Source::Constant(json!("hello world")));
        assert_eq!(line.target, Target::RequestHeader("greeting".to_string()));

        let line = MappingLine::parse_input("input.a -> model.a").unwrap();
        assert_eq!(line.target, Target::Model("model.a".to_string()));

        let line = MappingLine::parse_input("model.count:int -> count").unwrap();
        assert_eq!(
            line.source,
            Source::Typed { path: "model.count".to_string(), conversion: Conversion::Int }
        );
    }

    #[test]
    fn test_parse_plugin_call() {
        let line = MappingLine::parse_input("f:add(model.a, int(3), model.b) -> sum").unwrap();
        assert_eq!(
            line.source,
            Source::Plugin {
                name: "add".to_string(),
                args: vec![
                    Source::Path("model.a".to_string()),
                    Source::Constant(json!(3)),
                    Source::Path("model.b".to_string()),
                ],
            }
        );

        let line = MappingLine::parse_input("f:uuid() -> id").unwrap();
        assert_eq!(line.source, Source::Plugin { name: "uuid".to_string(), args: vec![] });

        let line = MappingLine::parse_input("f:concat(text(a,b), model.x) -> joined").unwrap();
        match line.source {
            Source::Plugin { args, .. } => assert_eq!(args[0], Source::Constant(json!("a,b"))),
            other => panic!("Expected plugin source, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_output_lines() {
        let line = MappingLine::parse_output("result.total -> model.total", false).unwrap();
        assert_eq!(line.source, Source::Path("result.total".to_string()));
        assert_eq!(line.target, Target::Model("model.total".to_string()));

        let line = MappingLine::parse_output("status -> output.status", false).unwrap();
        assert_eq!(line.target, Target::Output("output.status".to_string()));

        assert_eq!(
            MappingLine::parse_output("result.ok -> decision", true).unwrap().target,
            Target::Decision
        );
        assert!(MappingLine::parse_output("result.ok -> decision", false).is_err());
    }

    #[test]
    fn test_rejects_invalid_lines() {
        for line in [
            "input.a",
            " -> a",
            "a -> a",
            "model -> x",
            "model. -> x",
            "result.a -> x",
            "model.a:weird -> x",
            "model.a:substring(3,1) -> x",
            "int(abc) -> x",
            "f:(model.a) -> x",
            "f:add(model.a -> x",
            "input.a -> header.",
        ] {
            assert!(MappingLine::parse_input(line).is_err(), "{line} should be rejected");
        }

        for line in ["result -> body", "result -> model", "result -> decision"] {
            assert!(MappingLine::parse_output(line, false).is_err(), "{line} should be rejected");
        }
    }

    #[test]
    fn test_runtime_templates_are_accepted() {
        assert!(MappingLine::parse_input("model.{model.key} -> value").is_ok());
        assert!(MappingLine::parse_output("result -> model.{model.key}", false).is_ok());
    }
}
