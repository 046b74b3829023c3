use crate::CoreError;
use serde_json::{Map, Value};

/// Most null slots a single write may append to a list
pub const MAX_LIST_PADDING: usize = 1024;

/// One step in a dot-separated path: `orders[2].id` is `Key("orders"), Index(2), Key("id")`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

fn parse_path(path: &str) -> Option<Vec<Segment<'_>>> {
    let mut segments = Vec::with_capacity(4);
    for part in path.split('.') {
        let key_end = part.find('[').unwrap_or(part.len());
        let key = &part[..key_end];
        if key.is_empty() {
            return None;
        }
        segments.push(Segment::Key(key));

        let mut rest = &part[key_end..];
        while !rest.is_empty() {
            let close = rest.find(']')?;
            if !rest.starts_with('[') {
                return None;
            }
            let index = rest[1..close].trim().parse::<usize>().ok()?;
            segments.push(Segment::Index(index));
            rest = &rest[close + 1..];
        }
    }
    Some(segments)
}

/// Returns true when `path` is a well formed dot path with no empty segments.
pub fn is_valid_path(path: &str) -> bool {
    parse_path(path).is_some()
}

fn empty_container(next: Segment<'_>) -> Value {
    match next {
        Segment::Key(_) => Value::Object(Map::new()),
        Segment::Index(_) => Value::Array(Vec::new()),
    }
}

fn collision(path: &str, at: Segment<'_>) -> CoreError {
    let at = match at {
        Segment::Key(key) => key.to_string(),
        Segment::Index(index) => format!("[{index}]"),
    };
    CoreError::StateStoreError(format!(
        "Cannot set '{path}': '{at}' collides with a non-container value"
    ))
}

/// Slot `index` of `items`, padding with null up to it.
///
/// Padding is bounded so an index taken from request data cannot size the list.
fn slot<'v>(items: &'v mut Vec<Value>, index: usize, path: &str) -> Result<&'v mut Value, CoreError> {
    if index >= items.len() {
        if index - items.len() > MAX_LIST_PADDING {
            return Err(CoreError::StateStoreError(format!(
                "Cannot set '{path}': index {index} is too far past the end of a list of {}",
                items.len()
            )));
        }
        items.resize(index + 1, Value::Null);
    }
    Ok(&mut items[index])
}

/// Move one segment down, creating the child container when it is absent.
fn descend<'v>(
    current: &'v mut Value,
    segment: Segment<'_>,
    next: Segment<'_>,
    path: &str,
) -> Result<&'v mut Value, CoreError> {
    if current.is_null() {
        *current = empty_container(segment);
    }
    let child = match (segment, current) {
        (Segment::Key(key), Value::Object(map)) => map.entry(key.to_string()).or_insert(Value::Null),
        (Segment::Index(index), Value::Array(items)) => slot(items, index, path)?,
        _ => return Err(collision(path, segment)),
    };
    if child.is_null() {
        *child = empty_container(next);
    }
    Ok(child)
}

fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                let both_objects =
                    value.is_object() && target_map.get(&key).map_or(false, Value::is_object);
                if both_objects {
                    if let Some(existing) = target_map.get_mut(&key) {
                        deep_merge(existing, value);
                    }
                } else {
                    target_map.insert(key, value);
                }
            }
        }
        (target, source) => *target = source,
    }
}

/// Hierarchical, dot-addressed working state of one flow instance.
///
/// The store is owned by exactly one running instance, so all operations mutate in place.
#[derive(Debug, Clone, PartialEq)]
pub struct StateStore {
    root: Value,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Read the element at `path`. Invalid paths and missing elements are both absent.
    pub fn get_element(&self, path: &str) -> Option<&Value> {
        let segments = parse_path(path)?;
        let mut current = &self.root;
        for segment in segments {
            current = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get(key)?,
                (Segment::Index(index), Value::Array(items)) => items.get(index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    fn get_element_mut(&mut self, path: &str) -> Option<&mut Value> {
        let segments = parse_path(path)?;
        let mut current = &mut self.root;
        for segment in segments {
            current = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get_mut(key)?,
                (Segment::Index(index), Value::Array(items)) => items.get_mut(index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Returns true when an element exists at `path`
    pub fn contains(&self, path: &str) -> bool {
        self.get_element(path).is_some()
    }

    /// Write `value` at `path`, creating intermediate containers as needed.
    ///
    /// Fails when the path is malformed or an intermediate segment already holds a scalar.
    pub fn set_element(&mut self, path: &str, value: Value) -> Result<(), CoreError> {
        let segments = parse_path(path)
            .ok_or_else(|| CoreError::StateStoreError(format!("Invalid path '{path}'")))?;

        let mut current = &mut self.root;
        for pair in segments.windows(2) {
            current = descend(current, pair[0], pair[1], path)?;
        }

        // parse_path never yields an empty list
        let Some(&last) = segments.last() else {
            return Err(CoreError::StateStoreError(format!("Invalid path '{path}'")));
        };
        if current.is_null() {
            *current = empty_container(last);
        }
        match (last, current) {
            (Segment::Key(key), Value::Object(map)) => {
                map.insert(key.to_string(), value);
            }
            (Segment::Index(index), Value::Array(items)) => {
                *slot(items, index, path)? = value;
            }
            _ => return Err(collision(path, last)),
        }
        Ok(())
    }

    /// Remove and return the element at `path`. Array slots are reset to null.
    pub fn remove_element(&mut self, path: &str) -> Option<Value> {
        let (parent, last) = match path.rsplit_once('.') {
            Some((parent, last)) => (Some(parent), last),
            None => (None, path),
        };
        let last_segments = parse_path(last)?;
        let target = match parent {
            Some(parent) => self.get_element_mut(parent)?,
            None => &mut self.root,
        };

        let (&leaf, prefix) = last_segments.split_last()?;
        let mut current = target;
        for segment in prefix {
            current = match (*segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get_mut(key)?,
                (Segment::Index(index), Value::Array(items)) => items.get_mut(index)?,
                _ => return None,
            };
        }
        match (leaf, current) {
            (Segment::Key(key), Value::Object(map)) => map.remove(key),
            (Segment::Index(index), Value::Array(items)) => {
                items.get_mut(index).map(std::mem::take)
            }
            _ => None,
        }
    }

    /// Merge `subtree` into the element at `at_path`.
    ///
    /// Objects merge recursively; any other combination replaces the existing element.
    pub fn merge(&mut self, subtree: Value, at_path: &str) -> Result<(), CoreError> {
        let mergeable =
            subtree.is_object() && matches!(self.get_element(at_path), Some(Value::Object(_)));
        if mergeable {
            if let Some(existing) = self.get_element_mut(at_path) {
                deep_merge(existing, subtree);
            }
            Ok(())
        } else {
            self.set_element(at_path, subtree)
        }
    }

    /// Deep copy of the whole store
    pub fn snapshot(&self) -> Value {
        self.root.clone()
    }

    /// Borrow the whole store as a JSON value
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Consume the store
    pub fn into_value(self) -> Value {
        self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get_nested() {
        let mut store = StateStore::new();
        store.set_element("model.a.b.c", json!(1)).unwrap();
        store.set_element("model.a.d", json!("x")).unwrap();

        assert_eq!(store.get_element("model.a.b.c"), Some(&json!(1)));
        assert_eq!(store.get_element("model.a"), Some(&json!({"b": {"c": 1}, "d": "x"})));
        assert_eq!(store.get_element("model.missing"), None);
    }

    #[test]
    fn test_array_index_paths() {
        let mut store = StateStore::new();
        store.set_element("model.items[1].name", json!("second")).unwrap();

        assert_eq!(store.get_element("model.items[0]"), Some(&Value::Null));
        assert_eq!(store.get_element("model.items[1].name"), Some(&json!("second")));
        assert_eq!(store.get_element("model.items[5]"), None);
    }

    #[test]
    fn test_far_index_is_rejected() {
        let mut store = StateStore::new();
        store.set_element("model.items", json!([1, 2])).unwrap();

        let err = store
            .set_element("model.items[999999999999999999]", json!(1))
            .unwrap_err();
        assert!(matches!(err, CoreError::StateStoreError(_)));
        let err = store
            .set_element("model.rows[1000000000].name", json!("x"))
            .unwrap_err();
        assert!(matches!(err, CoreError::StateStoreError(_)));
        assert_eq!(store.get_element("model.items"), Some(&json!([1, 2])));

        // padding up to the limit is still allowed
        let edge = format!("model.items[{}]", 2 + MAX_LIST_PADDING);
        store.set_element(&edge, json!("last")).unwrap();
        assert_eq!(store.get_element(&edge), Some(&json!("last")));
    }

    #[test]
    fn test_collision_with_scalar() {
        let mut store = StateStore::new();
        store.set_element("model.a", json!("text")).unwrap();

        let err = store.set_element("model.a.b", json!(1)).unwrap_err();
        match err {
            CoreError::StateStoreError(msg) => assert!(msg.contains("non-container")),
            other => panic!("Expected StateStoreError, got {other:?}"),
        }
        // nothing was overwritten
        assert_eq!(store.get_element("model.a"), Some(&json!("text")));
    }

    #[test]
    fn test_invalid_paths() {
        let mut store = StateStore::new();
        assert!(store.set_element("model.", json!(1)).is_err());
        assert!(store.set_element("model..a", json!(1)).is_err());
        assert!(store.set_element("", json!(1)).is_err());
        assert!(store.set_element("model.a[x]", json!(1)).is_err());
        assert_eq!(store.get_element("model."), None);
        assert!(!is_valid_path("a.b."));
        assert!(is_valid_path("a.b[3].c"));
    }

    #[test]
    fn test_merge_objects_recursively() {
        let mut store = StateStore::new();
        store.set_element("model.user", json!({"name": "ann", "address": {"city": "x"}})).unwrap();
        store
            .merge(json!({"age": 3, "address": {"zip": "123"}}), "model.user")
            .unwrap();

        assert_eq!(
            store.get_element("model.user"),
            Some(&json!({"name": "ann", "age": 3, "address": {"city": "x", "zip": "123"}}))
        );

        // non-object replaces
        store.merge(json!([1, 2]), "model.user.address").unwrap();
        assert_eq!(store.get_element("model.user.address"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_remove_element() {
        let mut store = StateStore::new();
        store.set_element("model.a.b", json!(1)).unwrap();
        store.set_element("model.list", json!([1, 2])).unwrap();

        assert_eq!(store.remove_element("model.a.b"), Some(json!(1)));
        assert_eq!(store.get_element("model.a"), Some(&json!({})));
        assert_eq!(store.remove_element("model.list[0]"), Some(json!(1)));
        assert_eq!(store.get_element("model.list"), Some(&json!([null, 2])));
        assert_eq!(store.remove_element("model.nothing"), None);
    }
}
