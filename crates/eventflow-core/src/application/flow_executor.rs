//! Drives flow instances from their start task to a terminal task.

use crate::application::dispatcher::Dispatcher;
use crate::application::mapper::{map_input, map_output};
use crate::application::overrides::{FlowMock, MonitorPosition, OverrideLayer};
use crate::config::EngineConfig;
use crate::domain::flow_definition::{ExecutionType, Flow, Task};
use crate::domain::flow_instance::FlowInstance;
use crate::domain::plugin::PluginRegistry;
use crate::domain::repository::FlowRegistry;
use crate::error::FlowError;
use crate::types::{TaskRequest, TaskResponse};
use crate::CoreError;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Result of a completed flow instance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowOutcome {
    /// Instance id
    pub instance_id: String,
    /// Flow id
    pub flow_id: String,
    /// Correlation id
    pub correlation_id: String,
    /// The `output` slice of the final state, null when nothing was written
    pub output: Value,
    /// Final state store
    pub state: Value,
    /// Tasks in the order they ran
    pub executed: Vec<String>,
    /// Wall time from start to completion
    pub elapsed: Duration,
}

/// Handle to an instance running on its own tokio task
#[derive(Debug)]
pub struct FlowHandle {
    flow_id: String,
    correlation_id: String,
    cancel: CancellationToken,
    join: JoinHandle<Result<FlowOutcome, FlowError>>,
}

impl FlowHandle {
    /// Correlation id of the instance
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Request cancellation. Takes effect before the next task starts.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token shared with the running instance
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the instance to finish
    pub async fn join(self) -> Result<FlowOutcome, FlowError> {
        match self.join.await {
            Ok(result) => result,
            Err(e) => Err(FlowError::new(
                self.flow_id,
                CoreError::Other(format!("Flow task aborted: {e}")),
            )),
        }
    }
}

/// Runs loaded flows against a [`Dispatcher`]
#[derive(Clone)]
pub struct FlowExecutor {
    flows: Arc<FlowRegistry>,
    plugins: Arc<PluginRegistry>,
    dispatcher: Arc<dyn Dispatcher>,
    overrides: Arc<OverrideLayer>,
    config: EngineConfig,
}

impl FlowExecutor {
    /// Create an executor with default configuration
    pub fn new(
        flows: Arc<FlowRegistry>,
        plugins: Arc<PluginRegistry>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            flows,
            plugins,
            dispatcher,
            overrides: Arc::new(OverrideLayer::new()),
            config: EngineConfig::default(),
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Loaded flows
    pub fn flows(&self) -> &FlowRegistry {
        &self.flows
    }

    /// Configuration in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Override handle for `flow_id`
    pub fn mock(&self, flow_id: &str) -> Result<FlowMock, CoreError> {
        FlowMock::new(&self.flows, self.overrides.clone(), flow_id)
    }

    /// Run an instance of `flow_id` to completion on the caller's task
    pub async fn run_flow(
        &self,
        flow_id: &str,
        payload: Value,
        correlation_id: Option<String>,
    ) -> Result<FlowOutcome, FlowError> {
        self.run_flow_with_cancel(flow_id, payload, correlation_id, CancellationToken::new())
            .await
    }

    /// Spawn an instance of `flow_id` on its own tokio task
    pub fn start_flow(
        &self,
        flow_id: &str,
        payload: Value,
        correlation_id: Option<String>,
    ) -> FlowHandle {
        let correlation_id = correlation_id.unwrap_or_else(new_correlation_id);
        let cancel = CancellationToken::new();
        let executor = self.clone();
        let flow = flow_id.to_string();
        let cid = correlation_id.clone();
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            executor
                .run_flow_with_cancel(&flow, payload, Some(cid), token)
                .await
        });

        FlowHandle {
            flow_id: flow_id.to_string(),
            correlation_id,
            cancel,
            join,
        }
    }

    /// Run an instance, checking `cancel` before every task
    #[instrument(name = "flow_run", skip_all, fields(flow_id = %flow_id))]
    pub async fn run_flow_with_cancel(
        &self,
        flow_id: &str,
        payload: Value,
        correlation_id: Option<String>,
        cancel: CancellationToken,
    ) -> Result<FlowOutcome, FlowError> {
        let started = Instant::now();
        let flow = self
            .flows
            .get_flow(flow_id)
            .map_err(|e| FlowError::new(flow_id, e))?;
        let correlation_id = correlation_id.unwrap_or_else(new_correlation_id);
        let mut instance = FlowInstance::new(flow.id(), correlation_id, payload)
            .map_err(|e| FlowError::new(flow_id, e))?;

        let ttl = flow.ttl().unwrap_or_else(|| self.config.flow_ttl());
        let deadline = started + ttl;
        info!(
            flow_id = %flow.id(),
            instance_id = %instance.id,
            correlation_id = %instance.correlation_id,
            "Flow started"
        );

        let mut current = flow.first_task().to_string();
        loop {
            match self
                .run_step(&flow, &mut instance, &current, deadline, ttl, &cancel)
                .await
            {
                Ok(Some(next)) => current = next,
                Ok(None) => break,
                Err(cause) => {
                    // a state error here would hide the real failure
                    let _ = instance.fail(cause.to_string());
                    let err = FlowError::at_task(flow.id(), current.as_str(), cause);
                    error!(
                        flow_id = %flow.id(),
                        instance_id = %instance.id,
                        correlation_id = %instance.correlation_id,
                        task = %current,
                        kind = %err.kind,
                        "Flow failed: {}",
                        err.message
                    );
                    return Err(err);
                }
            }
        }

        instance
            .complete()
            .map_err(|e| FlowError::at_task(flow.id(), current.as_str(), e))?;
        let elapsed = started.elapsed();
        info!(
            flow_id = %flow.id(),
            instance_id = %instance.id,
            correlation_id = %instance.correlation_id,
            elapsed_ms = elapsed.as_millis() as u64,
            tasks = instance.executed.len(),
            "Flow completed"
        );

        let output = instance
            .state
            .get_element("output")
            .cloned()
            .unwrap_or(Value::Null);
        Ok(FlowOutcome {
            instance_id: instance.id,
            flow_id: instance.flow_id,
            correlation_id: instance.correlation_id,
            output,
            state: instance.state.into_value(),
            executed: instance.executed,
            elapsed,
        })
    }

    /// Run one task and return the next one, or `None` when the flow is finished
    async fn run_step(
        &self,
        flow: &Flow,
        instance: &mut FlowInstance,
        task_name: &str,
        deadline: Instant,
        ttl: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, CoreError> {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled(format!(
                "instance {} cancelled before task '{task_name}'",
                instance.id
            )));
        }
        let task = flow.task(task_name)?;
        instance.begin_task(task_name)?;

        self.call_monitor(flow, instance, task, MonitorPosition::Before)
            .await;

        let mapped = map_input(task, &mut instance.state, &self.plugins)?;
        let route = self.overrides.effective_route(flow.id(), task);

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(CoreError::Timeout {
                route,
                timeout_ms: ttl.as_millis() as u64,
            });
        }
        let budget = task
            .timeout()
            .unwrap_or_else(|| self.config.dispatch_timeout())
            .min(remaining);

        let request = TaskRequest {
            body: mapped.body,
            headers: mapped.headers,
            correlation_id: instance.correlation_id.clone(),
            flow_id: flow.id().to_string(),
            task_name: task_name.to_string(),
            instance_id: instance.id.clone(),
        };

        instance.suspend()?;
        debug!(flow_id = %flow.id(), task = %task_name, route = %route, "Dispatching");
        let response = match timeout(budget, self.dispatcher.dispatch(&route, request, budget)).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(CoreError::Timeout {
                    route,
                    timeout_ms: budget.as_millis() as u64,
                })
            }
        };
        instance.resume()?;

        if response.is_error() {
            return Err(CoreError::TaskFailure {
                status: response.status,
                message: failure_message(&response),
            });
        }
        store_response(instance, response)?;

        let decision = map_output(
            task,
            &mut instance.state,
            &self.plugins,
            task.execution() == ExecutionType::Decision,
        )?;

        self.call_monitor(flow, instance, task, MonitorPosition::After)
            .await;

        match task.execution() {
            ExecutionType::Sequential => task.next().first().cloned().map(Some).ok_or_else(|| {
                CoreError::InvalidState(format!("task '{task_name}' has no next task"))
            }),
            ExecutionType::Decision => select_next(task, decision).map(Some),
            ExecutionType::End | ExecutionType::Sink => Ok(None),
        }
    }

    /// Send a state snapshot to a monitor. Failures are only logged.
    async fn call_monitor(
        &self,
        flow: &Flow,
        instance: &FlowInstance,
        task: &Task,
        position: MonitorPosition,
    ) {
        let Some(route) = self.overrides.effective_monitor(flow.id(), task, position) else {
            return;
        };
        let request = TaskRequest {
            body: json!({
                "flow_id": flow.id(),
                "task": task.name(),
                "position": position.to_string(),
                "state": instance.state.snapshot(),
            }),
            headers: Default::default(),
            correlation_id: instance.correlation_id.clone(),
            flow_id: flow.id().to_string(),
            task_name: task.name().to_string(),
            instance_id: instance.id.clone(),
        };

        let limit = self.config.monitor_timeout();
        match timeout(limit, self.dispatcher.dispatch(&route, request, limit)).await {
            Ok(Ok(_)) => debug!(task = %task.name(), route = %route, %position, "Monitor notified"),
            Ok(Err(e)) => warn!(
                task = %task.name(),
                route = %route,
                %position,
                "Monitor call failed: {}",
                e
            ),
            Err(_) => warn!(task = %task.name(), route = %route, %position, "Monitor call timed out"),
        }
    }
}

fn new_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn store_response(instance: &mut FlowInstance, response: TaskResponse) -> Result<(), CoreError> {
    let headers: Map<String, Value> = response
        .headers
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    instance.state.set_element("result", response.body)?;
    instance
        .state
        .set_element("status", Value::from(response.status))?;
    instance.state.set_element("header", Value::Object(headers))?;
    Ok(())
}

fn failure_message(response: &TaskResponse) -> String {
    match &response.body {
        Value::String(text) => text.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| response.body.to_string()),
        Value::Null => format!("status {}", response.status),
        other => other.to_string(),
    }
}

/// `true` picks the first next task and `false` the second; an integer `n` picks the n-th.
fn select_next(task: &Task, decision: Option<Value>) -> Result<String, CoreError> {
    let next = task.next();
    let index = match &decision {
        Some(Value::Bool(true)) => Some(0),
        Some(Value::Bool(false)) => Some(1),
        Some(Value::Number(n)) => n
            .as_u64()
            .filter(|n| *n >= 1 && *n as usize <= next.len())
            .map(|n| n as usize - 1),
        _ => None,
    };
    index
        .and_then(|i| next.get(i).cloned())
        .ok_or_else(|| {
            let found = decision.map_or_else(|| "nothing".to_string(), |v| v.to_string());
            CoreError::MappingError(format!(
                "decision of task '{}' selected {found}, expected a boolean or 1..={}",
                task.name(),
                next.len()
            ))
        })
}
