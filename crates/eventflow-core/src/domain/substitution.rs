use crate::domain::state_store::{is_valid_path, StateStore};
use serde_json::Value;
use std::borrow::Cow;
use tracing::warn;

const MODEL_NAMESPACE: &str = "model.";

/// Replace `{model.<path>}` references in `text` with values from `store`.
///
/// Only the `model` namespace is expanded. A reference with no closing brace, a malformed path
/// or a path that does not resolve is kept verbatim. Inserted values are never re-scanned.
pub fn substitute<'a>(text: &'a str, store: &StateStore) -> Cow<'a, str> {
    if !text.contains('{') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 16);
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            break;
        };
        let reference = &after[..close];

        // `{a{model.x}` - restart from the innermost opening brace
        if let Some(nested) = reference.rfind('{') {
            let restart = open + 1 + nested;
            out.push_str(&rest[..restart]);
            rest = &rest[restart..];
            continue;
        }

        out.push_str(&rest[..open]);
        match resolve(reference, store) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn resolve(reference: &str, store: &StateStore) -> Option<String> {
    if !reference.starts_with(MODEL_NAMESPACE) {
        return None;
    }
    if !is_valid_path(reference) {
        warn!(reference, "Malformed runtime variable ignored");
        return None;
    }
    match store.get_element(reference) {
        None | Some(Value::Null) => {
            warn!(reference, "Runtime variable does not resolve, ignored");
            None
        }
        Some(Value::String(text)) => Some(text.clone()),
        Some(other) => Some(other.to_string()),
    }
}
