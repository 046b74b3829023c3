//! Type conversions. Each accepts one or more arguments; several arguments produce a sequence
//! with every argument converted.

use super::{at_least, evaluation, map_each};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use eventflow_core::{FnPlugin, PluginError, PluginValue, SimplePlugin};
use std::sync::Arc;
use tracing::debug;

fn to_long(plugin: &str, value: &PluginValue) -> Result<i64, PluginError> {
    match value {
        PluginValue::Float(f) if f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 => {
            Ok(f.trunc() as i64)
        }
        PluginValue::Boolean(b) => Ok(i64::from(*b)),
        PluginValue::Text(text) => match text.trim().parse::<i64>() {
            Ok(n) => Ok(n),
            Err(_) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| evaluation(plugin, format!("cannot convert '{text}' to a number")))
                .and_then(|f| to_long(plugin, &PluginValue::Float(f))),
        },
        other => other.promote_integer(),
    }
}

fn to_double(plugin: &str, value: &PluginValue) -> Result<f64, PluginError> {
    match value {
        PluginValue::Integer(n) => Ok(*n as f64),
        PluginValue::Float(f) => Ok(*f),
        PluginValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        PluginValue::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| evaluation(plugin, format!("cannot convert '{text}' to a number"))),
        other => Err(evaluation(
            plugin,
            format!("cannot convert {} to a number", other.type_name()),
        )),
    }
}

/// Round to single precision, keeping the shortest decimal form (`1.1` stays `1.1`)
fn to_float(value: &PluginValue) -> Result<f64, PluginError> {
    let narrowed = to_double("float", value)? as f32;
    if !narrowed.is_finite() {
        return Err(evaluation("float", format!("{value} is out of range")));
    }
    narrowed
        .to_string()
        .parse::<f64>()
        .map_err(|_| evaluation("float", format!("cannot convert {value} to a number")))
}

fn text(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    map_each("text", args, |v| Ok(PluginValue::Text(v.to_text())))
}

fn int(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    map_each("int", args, |v| {
        let n = to_long("int", v)?;
        i32::try_from(n)
            .map(|n| PluginValue::Integer(i64::from(n)))
            .map_err(|_| evaluation("int", format!("{n} does not fit in 32 bits")))
    })
}

fn long(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    map_each("long", args, |v| to_long("long", v).map(PluginValue::Integer))
}

fn double(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    map_each("double", args, |v| to_double("double", v).map(PluginValue::Float))
}

fn float(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    map_each("float", args, |v| to_float(v).map(PluginValue::Float))
}

fn boolean(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    map_each("boolean", args, |v| Ok(PluginValue::Boolean(v.is_truthy())))
}

/// Standard base64 of the text form
fn b64(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    map_each("b64", args, |v| Ok(PluginValue::Text(STANDARD.encode(v.to_text()))))
}

/// UTF-8 bytes of the text form, as a sequence of integers
fn binary(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    map_each("binary", args, |v| {
        Ok(PluginValue::Sequence(
            v.to_text()
                .into_bytes()
                .into_iter()
                .map(|b| PluginValue::Integer(i64::from(b)))
                .collect(),
        ))
    })
}

/// `removeKey(map, key, ...)`: a copy of `map` without the keys.
///
/// A sequence of maps has the keys removed from every map; other entries are kept as they are.
/// Anything else yields null.
fn remove_key(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    at_least("removeKey", args, 2, "at least 2")?;
    let keys: Vec<String> = args[1..].iter().map(PluginValue::to_text).collect();
    let drop_keys = |value: &PluginValue| match value {
        PluginValue::Map(map) => PluginValue::Map(
            map.iter()
                .filter(|(k, _)| !keys.contains(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    };
    match &args[0] {
        map @ PluginValue::Map(_) => Ok(drop_keys(map)),
        PluginValue::Sequence(items) => Ok(PluginValue::Sequence(items.iter().map(drop_keys).collect())),
        other => {
            debug!(found = other.type_name(), "removeKey needs a map or a list of maps");
            Ok(PluginValue::Null)
        }
    }
}

pub(crate) fn plugins() -> Vec<Arc<dyn SimplePlugin>> {
    vec![
        Arc::new(FnPlugin::new("text", text)),
        Arc::new(FnPlugin::new("int", int)),
        Arc::new(FnPlugin::new("long", long)),
        Arc::new(FnPlugin::new("float", float)),
        Arc::new(FnPlugin::new("double", double)),
        Arc::new(FnPlugin::new("boolean", boolean)),
        Arc::new(FnPlugin::new("b64", b64)),
        Arc::new(FnPlugin::new("binary", binary)),
        Arc::new(FnPlugin::new("removeKey", remove_key)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use eventflow_core::PluginValue::{Boolean, Float, Integer, Map, Null, Sequence, Text};
    use std::collections::BTreeMap;

    fn s(value: &str) -> PluginValue {
        Text(value.to_string())
    }

    #[test]
    fn test_numbers() {
        assert_eq!(long(&[s("42")]).unwrap(), Integer(42));
        assert_eq!(long(&[s("42.9")]).unwrap(), Integer(42));
        assert_eq!(long(&[Float(-3.7)]).unwrap(), Integer(-3));
        assert_eq!(int(&[Boolean(true)]).unwrap(), Integer(1));
        assert!(int(&[Integer(i64::from(i32::MAX) + 1)]).is_err());
        assert!(long(&[s("many")]).is_err());
        assert!(long(&[Float(f64::NAN)]).is_err());

        assert_eq!(double(&[s("1.5"), Integer(2)]).unwrap(),
            PluginValue::Sequence(vec![Float(1.5), Float(2.0)]));
        assert!(double(&[Null]).is_err());
    }

    #[test]
    fn test_text_boolean_and_b64() {
        assert_eq!(text(&[Integer(7)]).unwrap(), s("7"));
        assert_eq!(boolean(&[s("True")]).unwrap(), Boolean(true));
        assert_eq!(boolean(&[s("yes")]).unwrap(), Boolean(false));
        assert_eq!(b64(&[s("hello")]).unwrap(), s("aGVsbG8="));
        assert!(matches!(b64(&[]), Err(PluginError::Arity { .. })));
    }

    fn map(entries: &[(&str, PluginValue)]) -> PluginValue {
        Map(entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>())
    }

    #[test]
    fn test_float() {
        assert_eq!(float(&[s("1.1")]).unwrap(), Float(1.1));
        assert_eq!(float(&[Integer(3)]).unwrap(), Float(3.0));
        assert_eq!(float(&[Float(0.1), s("2.5")]).unwrap(), Sequence(vec![Float(0.1), Float(2.5)]));
        assert!(matches!(float(&[s("1e300")]), Err(PluginError::Evaluation { .. })));
        assert!(matches!(float(&[s("abc")]), Err(PluginError::Evaluation { .. })));
        assert!(matches!(float(&[]), Err(PluginError::Arity { .. })));
    }

    #[test]
    fn test_binary() {
        assert_eq!(binary(&[s("Hi")]).unwrap(), Sequence(vec![Integer(72), Integer(105)]));
        assert_eq!(binary(&[s("é")]).unwrap(), Sequence(vec![Integer(195), Integer(169)]));
        assert_eq!(binary(&[Null]).unwrap(), Sequence(vec![]));
    }

    #[test]
    fn test_remove_key() {
        let user = map(&[("name", s("ann")), ("age", Integer(3)), ("secret", s("x"))]);
        assert_eq!(
            remove_key(&[user.clone(), s("secret"), s("age")]).unwrap(),
            map(&[("name", s("ann"))])
        );
        assert_eq!(remove_key(&[user.clone(), s("missing")]).unwrap(), user);

        let rows = Sequence(vec![map(&[("a", Integer(1)), ("b", Integer(2))]), Integer(7)]);
        assert_eq!(
            remove_key(&[rows, s("b")]).unwrap(),
            Sequence(vec![map(&[("a", Integer(1))]), Integer(7)])
        );

        assert_eq!(remove_key(&[s("text"), s("a")]).unwrap(), Null);
        assert!(matches!(remove_key(&[user]), Err(PluginError::Arity { .. })));
    }
}
