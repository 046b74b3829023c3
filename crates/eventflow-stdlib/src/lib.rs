//!
//! Standard library of plugin functions for EventFlow mapping expressions
//!
//! Plugins are called from mapping lines as `f:<name>(arg, ...)`:
//!
//! ```
//! use eventflow_core::PluginValue;
//! use eventflow_stdlib::registry_with_builtins;
//!
//! let registry = registry_with_builtins().unwrap();
//! let sum = registry
//!     .invoke("add", &[PluginValue::from("2"), PluginValue::from(2i64)])
//!     .unwrap();
//! assert_eq!(sum, PluginValue::Integer(4));
//! ```

use eventflow_core::{PluginError, PluginProvider, PluginRegistry, SimplePlugin};
use std::sync::Arc;

pub mod plugins;

/// Provider for every built-in plugin
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinPlugins;

impl PluginProvider for BuiltinPlugins {
    fn plugins(&self) -> Vec<Arc<dyn SimplePlugin>> {
        let mut all = plugins::arithmetic::plugins();
        all.push(Arc::new(plugins::datetime::DateTimeNow));
        all.push(Arc::new(plugins::uuid::UuidGenerator));
        all.extend(plugins::logic::plugins());
        all.extend(plugins::conversion::plugins());
        all.extend(plugins::text::plugins());
        all.extend(plugins::collection::plugins());
        all
    }
}

/// A registry holding every built-in plugin
pub fn registry_with_builtins() -> Result<PluginRegistry, PluginError> {
    PluginRegistry::discover(&[&BuiltinPlugins])
}
