/// Flow and task model
pub mod flow_definition;

/// Flow instance state machine
pub mod flow_instance;

/// Mapping line grammar
pub mod mapping;

/// Plugin value type and registry
pub mod plugin;

/// Loaded flows
pub mod repository;

/// Route and monitor name grammar
pub mod service_name;

/// Hierarchical state store
pub mod state_store;

/// Runtime variable substitution
pub mod substitution;
