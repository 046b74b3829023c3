//! Built-in plugin functions, grouped by concern.

pub mod arithmetic;
pub mod collection;
pub mod conversion;
pub mod datetime;
pub mod logic;
pub mod text;
pub mod uuid;

use eventflow_core::{PluginError, PluginValue};

/// Fail with `Arity` unless at least `min` arguments are given
pub(crate) fn at_least(
    plugin: &str,
    args: &[PluginValue],
    min: usize,
    expected: &'static str,
) -> Result<(), PluginError> {
    if args.len() < min {
        return Err(arity(plugin, expected, args.len()));
    }
    Ok(())
}

/// Fail with `Arity` unless exactly `count` arguments are given
pub(crate) fn exactly(
    plugin: &str,
    args: &[PluginValue],
    count: usize,
    expected: &'static str,
) -> Result<(), PluginError> {
    if args.len() != count {
        return Err(arity(plugin, expected, args.len()));
    }
    Ok(())
}

pub(crate) fn arity(plugin: &str, expected: &'static str, actual: usize) -> PluginError {
    PluginError::Arity {
        plugin: plugin.to_string(),
        expected,
        actual,
    }
}

pub(crate) fn evaluation(plugin: &str, message: impl Into<String>) -> PluginError {
    PluginError::Evaluation {
        plugin: plugin.to_string(),
        message: message.into(),
    }
}

pub(crate) fn overflow(plugin: &str) -> PluginError {
    evaluation(plugin, "numeric overflow")
}

/// Apply `f` to every argument. One argument yields a single value, more yield a sequence.
pub(crate) fn map_each<F>(
    plugin: &str,
    args: &[PluginValue],
    f: F,
) -> Result<PluginValue, PluginError>
where
    F: Fn(&PluginValue) -> Result<PluginValue, PluginError>,
{
    match args {
        [] => Err(arity(plugin, "at least 1", 0)),
        [single] => f(single),
        many => Ok(PluginValue::Sequence(
            many.iter().map(f).collect::<Result<Vec<_>, _>>()?,
        )),
    }
}
