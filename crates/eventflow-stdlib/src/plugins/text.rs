use super::{at_least, evaluation, exactly};
use eventflow_core::{FnPlugin, PluginError, PluginValue, SimplePlugin};
use std::sync::Arc;

/// Join the text form of every argument
fn concat(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    at_least("concat", args, 2, "at least 2")?;
    Ok(PluginValue::Text(
        args.iter().map(PluginValue::to_text).collect::<String>(),
    ))
}

/// Characters of text, entries of a sequence or map; null is 0
fn length(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    exactly("length", args, 1, "exactly 1")?;
    let len = match &args[0] {
        PluginValue::Null => 0,
        PluginValue::Sequence(items) => items.len(),
        PluginValue::Map(map) => map.len(),
        other => other.to_text().chars().count(),
    };
    Ok(PluginValue::Integer(len as i64))
}

/// `substring(text, start[, end])` by character index
fn substring(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    if !(2..=3).contains(&args.len()) {
        return Err(super::arity("substring", "2 or 3", args.len()));
    }
    let chars: Vec<char> = args[0].to_text().chars().collect();
    let start = index("substring", &args[1])?;
    let end = match args.get(2) {
        Some(end) => index("substring", end)?,
        None => chars.len(),
    };
    if start > end || end > chars.len() {
        return Err(evaluation(
            "substring",
            format!("indexes are out of bounds: [{start}, {end}]"),
        ));
    }
    Ok(PluginValue::Text(chars[start..end].iter().collect()))
}

fn index(plugin: &str, value: &PluginValue) -> Result<usize, PluginError> {
    let n = value.promote_integer()?;
    usize::try_from(n).map_err(|_| evaluation(plugin, format!("negative index {n}")))
}

pub(crate) fn plugins() -> Vec<Arc<dyn SimplePlugin>> {
    vec![
        Arc::new(FnPlugin::new("concat", concat)),
        Arc::new(FnPlugin::new("length", length)),
        Arc::new(FnPlugin::new("substring", substring)),
    ]
}
