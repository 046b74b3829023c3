//! In-memory store of loaded flows.

use super::flow_definition::{Flow, Task};
use crate::CoreError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Loaded flows keyed by id.
///
/// Filled during startup and then shared read-only behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct FlowRegistry {
    flows: HashMap<String, Arc<Flow>>,
}

impl FlowRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a loaded flow. A second flow with the same id is rejected.
    pub fn add(&mut self, flow: Flow) -> Result<Arc<Flow>, CoreError> {
        if self.flows.contains_key(flow.id()) {
            return Err(CoreError::FlowLoadError(format!(
                "flow '{}' is already loaded",
                flow.id()
            )));
        }
        let flow = Arc::new(flow);
        info!(flow_id = %flow.id(), tasks = flow.tasks().count(), "Flow loaded");
        self.flows.insert(flow.id().to_string(), flow.clone());
        Ok(flow)
    }

    /// Get a flow by id
    pub fn get_flow(&self, flow_id: &str) -> Result<Arc<Flow>, CoreError> {
        self.flows
            .get(flow_id)
            .cloned()
            .ok_or_else(|| CoreError::FlowNotFound(flow_id.to_string()))
    }

    /// Get a task of a flow
    pub fn get_task(&self, flow_id: &str, task_name: &str) -> Result<&Task, CoreError> {
        self.flows
            .get(flow_id)
            .ok_or_else(|| CoreError::FlowNotFound(flow_id.to_string()))?
            .task(task_name)
    }

    /// Returns true when a flow with `flow_id` is loaded
    pub fn contains(&self, flow_id: &str) -> bool {
        self.flows.contains_key(flow_id)
    }

    /// Sorted flow ids
    pub fn flow_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.flows.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of loaded flows
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    /// Returns true when no flow is loaded
    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}
