//! Test-time route and monitor overrides that shadow a loaded flow.

use crate::domain::flow_definition::{Flow, Task};
use crate::domain::repository::FlowRegistry;
use crate::domain::service_name::validate_service_name;
use crate::CoreError;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Where a monitor runs relative to the task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorPosition {
    /// Before input mapping
    Before,
    /// After output mapping
    After,
}

impl fmt::Display for MonitorPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorPosition::Before => f.write_str("before"),
            MonitorPosition::After => f.write_str("after"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MonitorOverride {
    Set(String),
    Cleared,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TaskOverride {
    route: Option<String>,
    before: Option<MonitorOverride>,
    after: Option<MonitorOverride>,
}

impl TaskOverride {
    fn monitor_mut(&mut self, position: MonitorPosition) -> &mut Option<MonitorOverride> {
        match position {
            MonitorPosition::Before => &mut self.before,
            MonitorPosition::After => &mut self.after,
        }
    }
}

type OverrideKey = (String, String);

/// Shadow records keyed by (flow id, task name).
///
/// Readers see either the override or the loaded definition; the flow itself is never touched.
#[derive(Debug, Default)]
pub struct OverrideLayer {
    entries: DashMap<OverrideKey, TaskOverride>,
}

fn key(flow_id: &str, task: &str) -> OverrideKey {
    (flow_id.to_string(), task.to_string())
}

impl OverrideLayer {
    /// Create an empty layer
    pub fn new() -> Self {
        Self::default()
    }

    /// Route the executor dispatches to for `task`
    pub fn effective_route(&self, flow_id: &str, task: &Task) -> String {
        self.entries
            .get(&key(flow_id, task.name()))
            .and_then(|entry| entry.route.clone())
            .unwrap_or_else(|| task.route().to_string())
    }

    /// Monitor the executor calls for `task` at `position`
    pub fn effective_monitor(
        &self,
        flow_id: &str,
        task: &Task,
        position: MonitorPosition,
    ) -> Option<String> {
        let declared = match position {
            MonitorPosition::Before => task.monitor_before(),
            MonitorPosition::After => task.monitor_after(),
        };
        let shadow = self.entries.get(&key(flow_id, task.name())).and_then(|entry| {
            match position {
                MonitorPosition::Before => entry.before.clone(),
                MonitorPosition::After => entry.after.clone(),
            }
        });
        match shadow {
            Some(MonitorOverride::Set(route)) => Some(route),
            Some(MonitorOverride::Cleared) => None,
            None => declared.map(str::to_string),
        }
    }

    /// Returns true when no override is recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn update<R>(&self, flow_id: &str, task: &str, f: impl FnOnce(&mut TaskOverride) -> R) -> R {
        let mut entry = self.entries.entry(key(flow_id, task)).or_default();
        f(entry.value_mut())
    }

    /// Bind `task` to `route` and return the route it replaced, under one entry lock
    fn swap_route(&self, flow_id: &str, task: &Task, route: &str) -> String {
        self.update(flow_id, task.name(), |entry| {
            entry
                .route
                .replace(route.to_string())
                .unwrap_or_else(|| task.route().to_string())
        })
    }

    fn remove_task(&self, flow_id: &str, task: &str) {
        self.entries.remove(&key(flow_id, task));
    }

    fn remove_flow(&self, flow_id: &str) {
        self.entries.retain(|(flow, _), _| flow != flow_id);
    }
}

/// Override handle for one loaded flow
#[derive(Debug, Clone)]
pub struct FlowMock {
    flow: Arc<Flow>,
    layer: Arc<OverrideLayer>,
}

impl FlowMock {
    /// Handle for `flow_id`; fails with `FlowNotFound` when the flow is not loaded
    pub fn new(
        flows: &FlowRegistry,
        layer: Arc<OverrideLayer>,
        flow_id: &str,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            flow: flows.get_flow(flow_id)?,
            layer,
        })
    }

    /// Flow this handle overrides
    pub fn flow_id(&self) -> &str {
        self.flow.id()
    }

    /// Route currently bound to `task_name`, taking overrides into account
    pub fn get_function_route(&self, task_name: &str) -> Result<String, CoreError> {
        let task = self.flow.task(task_name)?;
        Ok(self.layer.effective_route(self.flow.id(), task))
    }

    /// Bind `task_name` to `new_route` and return the route it replaced
    pub fn reassign_function_route(
        &self,
        task_name: &str,
        new_route: &str,
    ) -> Result<String, CoreError> {
        let task = self.flow.task(task_name)?;
        validate_service_name(new_route)?;

        let previous = self.layer.swap_route(self.flow.id(), task, new_route);
        info!(
            "Reassigned '{}' to task({}) of flow({}), previous function '{}'",
            new_route,
            task_name,
            self.flow.id(),
            previous
        );
        Ok(previous)
    }

    /// Attach a monitor route before or after `task_name`
    pub fn set_monitor(
        &self,
        task_name: &str,
        monitor_route: &str,
        position: MonitorPosition,
    ) -> Result<(), CoreError> {
        self.flow.task(task_name)?;
        validate_service_name(monitor_route)?;

        self.layer.update(self.flow.id(), task_name, |entry| {
            *entry.monitor_mut(position) = Some(MonitorOverride::Set(monitor_route.to_string()));
        });
        info!(
            flow_id = %self.flow.id(),
            task = task_name,
            route = monitor_route,
            %position,
            "Monitor attached"
        );
        Ok(())
    }

    /// Remove both monitors of `task_name`, including any declared in the flow
    pub fn clear_monitors(&self, task_name: &str) -> Result<(), CoreError> {
        let task = self.flow.task(task_name)?;
        let released: Vec<String> = [MonitorPosition::Before, MonitorPosition::After]
            .into_iter()
            .filter_map(|position| self.layer.effective_monitor(self.flow.id(), task, position))
            .collect();

        self.layer.update(self.flow.id(), task_name, |entry| {
            entry.before = Some(MonitorOverride::Cleared);
            entry.after = Some(MonitorOverride::Cleared);
        });
        info!(
            flow_id = %self.flow.id(),
            task = task_name,
            "Released monitors {:?}",
            released
        );
        Ok(())
    }

    /// Drop every override of `task_name`
    pub fn reset_task(&self, task_name: &str) -> Result<(), CoreError> {
        self.flow.task(task_name)?;
        self.layer.remove_task(self.flow.id(), task_name);
        Ok(())
    }

    /// Drop every override of this flow
    pub fn reset(&self) {
        self.layer.remove_flow(self.flow.id());
    }
}
