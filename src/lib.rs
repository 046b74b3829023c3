//! # EventFlow
//!
//! Declarative task graphs over dynamically routed functions.
//!
//! Flows are loaded from YAML ([`dsl`]), their mapping expressions may call the built-in
//! plugins ([`stdlib`]), and instances are driven by a [`FlowExecutor`] that dispatches every
//! task to a route through a [`Dispatcher`].

pub use eventflow_core::*;
pub use eventflow_dsl as dsl;
pub use eventflow_monitoring as monitoring;
pub use eventflow_stdlib as stdlib;

use std::sync::Arc;

/// Route of the echo function every [`local_dispatcher`] starts with
pub const NO_OP_ROUTE: &str = "no.op";

/// A [`LocalDispatcher`] with [`NO_OP_ROUTE`] registered. The echo returns the request body
/// and headers unchanged.
pub fn local_dispatcher() -> Result<LocalDispatcher, CoreError> {
    let dispatcher = LocalDispatcher::new();
    dispatcher.register_fn(NO_OP_ROUTE, |request: TaskRequest| async move {
        let mut response = TaskResponse::ok(request.body);
        for (name, value) in request.headers {
            response = response.with_header(name, value);
        }
        Ok::<_, CoreError>(response)
    })?;
    Ok(dispatcher)
}

/// An executor over `flows` with every built-in plugin available
pub fn executor_with_builtins(
    flows: FlowRegistry,
    dispatcher: Arc<dyn Dispatcher>,
    config: EngineConfig,
) -> Result<FlowExecutor, PluginError> {
    let plugins = stdlib::registry_with_builtins()?;
    Ok(FlowExecutor::new(Arc::new(flows), Arc::new(plugins), dispatcher).with_config(config))
}
