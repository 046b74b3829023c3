//!
//! EventFlow Core - orchestration engine for declarative task flows
//!
//! This crate holds the flow model, the per-instance state store, runtime variable
//! substitution, the plugin registry, the mapping grammar and the executor that drives an
//! instance from its start task to a terminal task through a [`Dispatcher`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - flow model, state store and plugins
pub mod domain;

/// Application services - mapping, dispatch and execution
pub mod application;

/// Engine configuration
pub mod config;

/// Error types
pub mod error;

/// Request and response types
pub mod types;

pub use config::EngineConfig;
pub use error::{CoreError, ErrorKind, FlowError, PluginError};
pub use types::{TaskRequest, TaskResponse};

pub use domain::flow_definition::{
    load_flow, ExecutionType, Flow, FlowDefinition, Task, TaskDefinition,
};
pub use domain::flow_instance::{FlowInstance, InstanceStatus};
pub use domain::plugin::{
    global_registry, install_global, FnPlugin, PluginProvider, PluginRegistry, PluginValue,
    SimplePlugin,
};
pub use domain::repository::FlowRegistry;
pub use domain::service_name::{is_valid_service_name, validate_service_name};
pub use domain::state_store::StateStore;
pub use domain::substitution::substitute;

pub use application::dispatcher::{Dispatcher, LocalDispatcher, TaskFunction};
pub use application::flow_executor::{FlowExecutor, FlowHandle, FlowOutcome};
pub use application::overrides::{FlowMock, MonitorPosition};
