//! Reshaping between maps of lists and lists of maps.
//!
//! `listOfMap({"a": [1, 2], "b": ["x", "y"]})` is `[{"a": 1, "b": "x"}, {"a": 2, "b": "y"}]`.
//! Further maps of lists are merged column by column when every list has the same length as
//! the first result; otherwise the result is an empty list.

use eventflow_core::{FnPlugin, PluginError, PluginValue, SimplePlugin};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

type Row = BTreeMap<String, PluginValue>;

/// First map, depth first, that directly holds a list
fn find_map_of_lists(map: &Row) -> Option<&Row> {
    for value in map.values() {
        match value {
            PluginValue::Sequence(_) => return Some(map),
            PluginValue::Map(inner) => return find_map_of_lists(inner),
            _ => {}
        }
    }
    None
}

/// Turn every list entry of `columns` into one row per index
fn normalize(columns: &Row) -> Vec<Row> {
    let mut rows: Vec<Row> = Vec::new();
    for (key, value) in columns {
        let PluginValue::Sequence(items) = value else {
            continue;
        };
        if rows.len() < items.len() {
            rows.resize_with(items.len(), Row::new);
        }
        for (row, item) in rows.iter_mut().zip(items) {
            row.insert(key.clone(), item.clone());
        }
    }
    rows
}

/// Maps of lists from `args` that can be merged into `size` rows.
///
/// `None` when any of them holds a non-list entry or a list of another length.
fn columns_to_merge(args: &[PluginValue], size: usize) -> Option<Vec<&Row>> {
    let mut merged = Vec::new();
    for arg in args {
        let PluginValue::Map(data) = arg else {
            continue;
        };
        let Some(columns) = find_map_of_lists(data) else {
            continue;
        };
        let aligned = columns
            .values()
            .all(|v| matches!(v, PluginValue::Sequence(items) if items.len() == size));
        if !aligned {
            debug!(size, "List lengths do not match, nothing merged");
            return None;
        }
        merged.push(columns);
    }
    Some(merged)
}

fn merge(rows: &[Row], additional: &[&Row]) -> PluginValue {
    let mut rows = rows.to_vec();
    for (i, row) in rows.iter_mut().enumerate() {
        for columns in additional {
            for (key, value) in columns.iter() {
                if let PluginValue::Sequence(items) = value {
                    if let Some(item) = items.get(i) {
                        row.insert(key.clone(), item.clone());
                    }
                }
            }
        }
    }
    to_value(rows)
}

fn to_value(rows: Vec<Row>) -> PluginValue {
    PluginValue::Sequence(rows.into_iter().map(PluginValue::Map).collect())
}

fn empty() -> PluginValue {
    PluginValue::Sequence(Vec::new())
}

fn list_of_map(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    let Some(PluginValue::Map(data)) = args.first() else {
        return Ok(empty());
    };
    let Some(columns) = find_map_of_lists(data) else {
        return Ok(empty());
    };
    let rows = normalize(columns);
    if args.len() == 1 || rows.is_empty() {
        return Ok(to_value(rows));
    }
    match columns_to_merge(&args[1..], rows.len()) {
        Some(additional) if !additional.is_empty() => Ok(merge(&rows, &additional)),
        _ => Ok(empty()),
    }
}

/// `updateListOfMap(rows, mapOfLists, ...)`: merge more columns into an earlier `listOfMap` result
fn update_list_of_map(args: &[PluginValue]) -> Result<PluginValue, PluginError> {
    let Some(PluginValue::Sequence(items)) = args.first() else {
        return Ok(empty());
    };
    if args.len() < 2 || items.is_empty() {
        return Ok(empty());
    }
    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        match item {
            PluginValue::Map(row) => rows.push(row.clone()),
            _ => return Ok(empty()),
        }
    }
    match columns_to_merge(&args[1..], rows.len()) {
        Some(additional) if !additional.is_empty() => Ok(merge(&rows, &additional)),
        _ => Ok(empty()),
    }
}

pub(crate) fn plugins() -> Vec<Arc<dyn SimplePlugin>> {
    vec![
        Arc::new(FnPlugin::new("listOfMap", list_of_map)),
        Arc::new(FnPlugin::new("updateListOfMap", update_list_of_map)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn value(json: Value) -> PluginValue {
        PluginValue::from(&json)
    }

    #[test]
    fn test_list_of_map_from_nested_columns() {
        let data = value(json!({"hello": {"world": [1, 2, 3], "test": ["a", "b", "c"]}}));
        assert_eq!(
            list_of_map(&[data]).unwrap(),
            value(json!([
                {"world": 1, "test": "a"},
                {"world": 2, "test": "b"},
                {"world": 3, "test": "c"}
            ]))
        );
    }

    #[test]
    fn test_list_of_map_merges_more_columns() {
        let data = value(json!({"world": [1, 2], "test": ["a", "b"]}));
        let more = value(json!({"extra": {"more": ["X", "Y"]}}));
        assert_eq!(
            list_of_map(&[data.clone(), more]).unwrap(),
            value(json!([
                {"world": 1, "test": "a", "more": "X"},
                {"world": 2, "test": "b", "more": "Y"}
            ]))
        );

        let misaligned = value(json!({"more": ["X"]}));
        assert_eq!(list_of_map(&[data, misaligned]).unwrap(), empty());
        assert_eq!(list_of_map(&[value(json!({"a": 1}))]).unwrap(), empty());
        assert_eq!(list_of_map(&[]).unwrap(), empty());
    }

    #[test]
    fn test_update_list_of_map() {
        let rows = value(json!([{"world": 1}, {"world": 2}]));
        let more = value(json!({"more": ["X", "Y"]}));
        assert_eq!(
            update_list_of_map(&[rows.clone(), more]).unwrap(),
            value(json!([{"world": 1, "more": "X"}, {"world": 2, "more": "Y"}]))
        );

        assert_eq!(update_list_of_map(&[rows.clone()]).unwrap(), empty());
        assert_eq!(
            update_list_of_map(&[value(json!([1, 2])), value(json!({"more": ["X", "Y"]}))]).unwrap(),
            empty()
        );
        assert_eq!(
            update_list_of_map(&[rows, value(json!({"more": ["X"]}))]).unwrap(),
            empty()
        );
    }
}
