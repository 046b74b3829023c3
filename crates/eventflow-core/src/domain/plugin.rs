use crate::error::PluginError;
use once_cell::sync::OnceCell;
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Argument and result type of plugin functions
#[derive(Debug, Clone, PartialEq)]
pub enum PluginValue {
    /// Absent or null value
    Null,
    /// Boolean
    Boolean(bool),
    /// Whole number
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// Text
    Text(String),
    /// Ordered list of values
    Sequence(Vec<PluginValue>),
    /// Key/value map
    Map(BTreeMap<String, PluginValue>),
}

impl PluginValue {
    /// Name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            PluginValue::Null => "null",
            PluginValue::Boolean(_) => "boolean",
            PluginValue::Integer(_) => "integer",
            PluginValue::Float(_) => "float",
            PluginValue::Text(_) => "text",
            PluginValue::Sequence(_) => "sequence",
            PluginValue::Map(_) => "map",
        }
    }

    /// Promote to a 64-bit integer.
    ///
    /// Integers promote to themselves and text promotes when its trimmed content is a whole
    /// number. Every other value fails with `TypePromotion`.
    #[inline]
    pub fn promote_integer(&self) -> Result<i64, PluginError> {
        match self {
            PluginValue::Integer(n) => Ok(*n),
            PluginValue::Text(text) => {
                text.trim()
                    .parse::<i64>()
                    .map_err(|_| PluginError::TypePromotion {
                        found: format!("text '{text}'"),
                    })
            }
            other => Err(PluginError::TypePromotion {
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Returns true for `Null`
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, PluginValue::Null)
    }

    /// Truthiness: `true`, the text "true" (any case) and non-zero integers
    pub fn is_truthy(&self) -> bool {
        match self {
            PluginValue::Boolean(b) => *b,
            PluginValue::Text(text) => text.trim().eq_ignore_ascii_case("true"),
            PluginValue::Integer(n) => *n != 0,
            _ => false,
        }
    }

    /// Text form of scalars; containers render as compact JSON
    pub fn to_text(&self) -> String {
        match self {
            PluginValue::Null => String::new(),
            PluginValue::Text(text) => text.clone(),
            PluginValue::Boolean(b) => b.to_string(),
            PluginValue::Integer(n) => n.to_string(),
            PluginValue::Float(f) => f.to_string(),
            other => Value::from(other.clone()).to_string(),
        }
    }
}

impl fmt::Display for PluginValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&Value> for PluginValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => PluginValue::Null,
            Value::Bool(b) => PluginValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PluginValue::Integer(i),
                None => PluginValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => PluginValue::Text(s.clone()),
            Value::Array(items) => PluginValue::Sequence(items.iter().map(PluginValue::from).collect()),
            Value::Object(map) => PluginValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), PluginValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<PluginValue> for Value {
    fn from(value: PluginValue) -> Self {
        match value {
            PluginValue::Null => Value::Null,
            PluginValue::Boolean(b) => Value::Bool(b),
            PluginValue::Integer(i) => Value::Number(i.into()),
            PluginValue::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
            PluginValue::Text(s) => Value::String(s),
            PluginValue::Sequence(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            PluginValue::Map(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

impl From<i64> for PluginValue {
    fn from(value: i64) -> Self {
        PluginValue::Integer(value)
    }
}

impl From<&str> for PluginValue {
    fn from(value: &str) -> Self {
        PluginValue::Text(value.to_string())
    }
}

impl From<bool> for PluginValue {
    fn from(value: bool) -> Self {
        PluginValue::Boolean(value)
    }
}

/// A named, stateless calculation usable as `f:<name>(...)` in mapping expressions
pub trait SimplePlugin: Send + Sync {
    /// Registry name
    fn name(&self) -> &str;

    /// Evaluate the plugin
    fn calculate(&self, args: &[PluginValue]) -> Result<PluginValue, PluginError>;
}

/// Adapter turning a closure into a [`SimplePlugin`]
pub struct FnPlugin<F> {
    name: String,
    func: F,
}

impl<F> FnPlugin<F>
where
    F: Fn(&[PluginValue]) -> Result<PluginValue, PluginError> + Send + Sync,
{
    /// Wrap `func` under `name`
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> SimplePlugin for FnPlugin<F>
where
    F: Fn(&[PluginValue]) -> Result<PluginValue, PluginError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn calculate(&self, args: &[PluginValue]) -> Result<PluginValue, PluginError> {
        (self.func)(args)
    }
}

/// Discovery hook supplying plugin implementations at startup
pub trait PluginProvider {
    /// All plugins this provider contributes
    fn plugins(&self) -> Vec<Arc<dyn SimplePlugin>>;
}

/// Name to plugin mapping.
///
/// Registration needs `&mut self`, so a registry can only change while it is privately owned
/// during startup. Once shared behind an `Arc` it is read-only and lock free.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn SimplePlugin>>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.plugins.keys().collect();
        names.sort();
        f.debug_struct("PluginRegistry").field("plugins", &names).finish()
    }
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from discovery providers
    pub fn discover(providers: &[&dyn PluginProvider]) -> Result<Self, PluginError> {
        let mut registry = Self::new();
        for provider in providers {
            for plugin in provider.plugins() {
                registry.register(plugin)?;
            }
        }
        info!("Total {} plugins registered", registry.len());
        Ok(registry)
    }

    /// Register a plugin under its own name
    pub fn register(&mut self, plugin: Arc<dyn SimplePlugin>) -> Result<(), PluginError> {
        let name = plugin.name().to_string();
        if self.plugins.contains_key(&name) {
            return Err(PluginError::DuplicateName(name));
        }
        self.plugins.insert(name, plugin);
        Ok(())
    }

    /// Register a closure under `name`
    pub fn register_fn<F>(&mut self, name: &str, func: F) -> Result<(), PluginError>
    where
        F: Fn(&[PluginValue]) -> Result<PluginValue, PluginError> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnPlugin::new(name, func)))
    }

    /// Find a plugin by name
    #[inline]
    pub fn lookup(&self, name: &str) -> Result<&Arc<dyn SimplePlugin>, PluginError> {
        self.plugins
            .get(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))
    }

    /// Returns true when `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Look up and evaluate a plugin
    #[inline]
    pub fn invoke(&self, name: &str, args: &[PluginValue]) -> Result<PluginValue, PluginError> {
        self.lookup(name)?.calculate(args)
    }

    /// Number of registered plugins
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns true when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Sorted plugin names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

static GLOBAL_REGISTRY: OnceCell<Arc<PluginRegistry>> = OnceCell::new();

/// Install the process-wide registry. Only the first call succeeds.
pub fn install_global(registry: PluginRegistry) -> Result<Arc<PluginRegistry>, PluginError> {
    let registry = Arc::new(registry);
    GLOBAL_REGISTRY
        .set(registry.clone())
        .map_err(|_| PluginError::AlreadyInstalled)?;
    Ok(registry)
}

/// The process-wide registry, if installed
pub fn global_registry() -> Option<Arc<PluginRegistry>> {
    GLOBAL_REGISTRY.get().cloned()
}
