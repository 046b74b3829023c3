//! Comparison and boolean logic.
//!
//! Truthiness follows [`PluginValue::is_truthy`]: `true`, the text `"true"` and non-zero
//! integers are true, everything else is false.

use super::{at_least, exactly, map_each};
use eventflow_core::{FnPlugin, PluginError, PluginValue, SimplePlugin};
use std::cmp::Ordering;
use std::sync::Arc;

fn eq(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    at_least("eq", args, 2, "at least 2")?;
    let first = &args[0];
    Ok(PluginValue::Boolean(args[1..].iter().all(|v| v == first)))
}

fn compare(
    plugin: &str,
    args: &[PluginValue],
    wanted: Ordering,
) -> Result<PluginValue, PluginError> {
    at_least(plugin, args, 2, "at least 2")?;
    let first = args[0].promote_integer()?;
    for other in &args[1..] {
        if first.cmp(&other.promote_integer()?) != wanted {
            return Ok(PluginValue::Boolean(false));
        }
    }
    Ok(PluginValue::Boolean(true))
}

fn and(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    at_least("and", args, 1, "at least 1")?;
    Ok(PluginValue::Boolean(args.iter().all(PluginValue::is_truthy)))
}

fn or(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    at_least("or", args, 1, "at least 1")?;
    Ok(PluginValue::Boolean(args.iter().any(PluginValue::is_truthy)))
}

fn not(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    map_each("not", args, |v| Ok(PluginValue::Boolean(!v.is_truthy())))
}

fn is_null(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    exactly("isNull", args, 1, "exactly 1")?;
    Ok(PluginValue::Boolean(args[0].is_null()))
}

fn not_null(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    exactly("notNull", args, 1, "exactly 1")?;
    Ok(PluginValue::Boolean(!args[0].is_null()))
}

fn ternary(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    exactly("ternary", args, 3, "exactly 3")?;
    let chosen = if args[0].is_truthy() { &args[1] } else { &args[2] };
    Ok(chosen.clone())
}

pub(crate) fn plugins() -> Vec<Arc<dyn SimplePlugin>> {
    vec![
        Arc::new(FnPlugin::new("eq", eq)),
        Arc::new(FnPlugin::new("gt", |args: &[PluginValue]| {
            compare("gt", args, Ordering::Greater)
        })),
        Arc::new(FnPlugin::new("lt", |args: &[PluginValue]| {
            compare("lt", args, Ordering::Less)
        })),
        Arc::new(FnPlugin::new("and", and)),
        Arc::new(FnPlugin::new("or", or)),
        Arc::new(FnPlugin::new("not", not)),
        Arc::new(FnPlugin::new("isNull", is_null)),
        Arc::new(FnPlugin::new("notNull", not_null)),
        Arc::new(FnPlugin::new("ternary", ternary)),
    ]
}
