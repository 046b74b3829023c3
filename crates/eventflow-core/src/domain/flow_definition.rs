use crate::domain::mapping::MappingLine;
use crate::domain::service_name::is_valid_service_name;
use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Smallest time-to-live accepted for a flow
pub const MIN_FLOW_TTL: Duration = Duration::from_secs(1);

/// How a task hands over to the next one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionType {
    /// Exactly one next task
    #[default]
    Sequential,
    /// Next task selected by the `decision` output
    Decision,
    /// Terminal task that completes the flow
    End,
    /// Terminal task used for side effects
    Sink,
}

impl ExecutionType {
    /// True for task types that finish the flow
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionType::End | ExecutionType::Sink)
    }
}

impl fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionType::Sequential => "sequential",
            ExecutionType::Decision => "decision",
            ExecutionType::End => "end",
            ExecutionType::Sink => "sink",
        };
        f.write_str(name)
    }
}

impl FromStr for ExecutionType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(ExecutionType::Sequential),
            "decision" => Ok(ExecutionType::Decision),
            "end" => Ok(ExecutionType::End),
            "sink" => Ok(ExecutionType::Sink),
            other => Err(CoreError::FlowLoadError(format!(
                "Unknown execution type '{other}'"
            ))),
        }
    }
}

/// Unvalidated description of a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Unique name within the flow
    pub name: String,
    /// Function route
    pub process: String,
    /// Free text description
    #[serde(default)]
    pub description: String,
    /// Execution type
    #[serde(default)]
    pub execution: ExecutionType,
    /// Input mapping lines
    #[serde(default)]
    pub input: Vec<String>,
    /// Output mapping lines
    #[serde(default)]
    pub output: Vec<String>,
    /// Candidate next tasks
    #[serde(default)]
    pub next: Vec<String>,
    /// Per-dispatch timeout in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Monitor route invoked before input mapping
    #[serde(default)]
    pub monitor_before: Option<String>,
    /// Monitor route invoked after output mapping
    #[serde(default)]
    pub monitor_after: Option<String>,
}

impl TaskDefinition {
    /// Task named `name` bound to `process`
    pub fn new(name: impl Into<String>, process: impl Into<String>, execution: ExecutionType) -> Self {
        Self {
            name: name.into(),
            process: process.into(),
            execution,
            ..Default::default()
        }
    }

    /// Add an input mapping line
    pub fn with_input(mut self, line: impl Into<String>) -> Self {
        self.input.push(line.into());
        self
    }

    /// Add an output mapping line
    pub fn with_output(mut self, line: impl Into<String>) -> Self {
        self.output.push(line.into());
        self
    }

    /// Add a next task
    pub fn with_next(mut self, task: impl Into<String>) -> Self {
        self.next.push(task.into());
        self
    }

    /// Set the per-dispatch timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }
}

/// Unvalidated description of a flow, as produced by a loader
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    /// Unique flow id
    pub id: String,
    /// Free text description
    #[serde(default)]
    pub description: String,
    /// Time-to-live of one instance in milliseconds
    #[serde(default)]
    pub ttl_ms: Option<u64>,
    /// Name of the start task
    pub first_task: String,
    /// Tasks in declaration order
    pub tasks: Vec<TaskDefinition>,
}

impl FlowDefinition {
    /// Flow `id` starting at `first_task`
    pub fn new(id: impl Into<String>, first_task: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            first_task: first_task.into(),
            ..Default::default()
        }
    }

    /// Add a task
    pub fn with_task(mut self, task: TaskDefinition) -> Self {
        self.tasks.push(task);
        self
    }
}

/// A validated task. Immutable once its flow is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    name: String,
    route: String,
    description: String,
    execution: ExecutionType,
    input: Vec<String>,
    output: Vec<String>,
    next: Vec<String>,
    timeout: Option<Duration>,
    monitor_before: Option<String>,
    monitor_after: Option<String>,
}

impl Task {
    /// Task name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Function route bound in the definition
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Execution type
    pub fn execution(&self) -> ExecutionType {
        self.execution
    }

    /// Raw input mapping lines
    pub fn input(&self) -> &[String] {
        &self.input
    }

    /// Raw output mapping lines
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Candidate next tasks
    pub fn next(&self) -> &[String] {
        &self.next
    }

    /// Per-dispatch timeout, if set
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Monitor invoked before input mapping
    pub fn monitor_before(&self) -> Option<&str> {
        self.monitor_before.as_deref()
    }

    /// Monitor invoked after output mapping
    pub fn monitor_after(&self) -> Option<&str> {
        self.monitor_after.as_deref()
    }
}

/// A validated, immutable flow
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    id: String,
    description: String,
    ttl: Option<Duration>,
    first_task: String,
    tasks: HashMap<String, Task>,
    order: Vec<String>,
}

/// Validate `definition` and build a [`Flow`]
pub fn load_flow(definition: FlowDefinition) -> Result<Flow, CoreError> {
    Flow::load(definition)
}

impl Flow {
    /// Validate `definition` and build a flow.
    ///
    /// All problems are reported together in one `FlowLoadError`; no partially valid flow is
    /// ever returned.
    pub fn load(definition: FlowDefinition) -> Result<Self, CoreError> {
        let mut problems = Vec::new();

        if definition.id.trim().is_empty() {
            problems.push("flow id is required".to_string());
        }
        if definition.tasks.is_empty() {
            problems.push("flow must have at least one task".to_string());
        }

        let mut names = HashSet::with_capacity(definition.tasks.len());
        for task in &definition.tasks {
            if task.name.is_empty() {
                problems.push(format!("task bound to '{}' has no name", task.process));
            } else if !names.insert(task.name.as_str()) {
                problems.push(format!("duplicate task name '{}'", task.name));
            }
        }

        for task in &definition.tasks {
            validate_task(task, &names, &mut problems);
        }

        if definition.first_task.is_empty() {
            problems.push("a start task is required".to_string());
        } else if !names.contains(definition.first_task.as_str()) {
            problems.push(format!("start task '{}' does not exist", definition.first_task));
        }
        if !definition
            .tasks
            .iter()
            .any(|t| t.execution == ExecutionType::End)
        {
            problems.push("flow must have at least one end task".to_string());
        }

        if !problems.is_empty() {
            return Err(CoreError::FlowLoadError(format!(
                "flow '{}': {}",
                definition.id,
                problems.join("; ")
            )));
        }

        let order = definition.tasks.iter().map(|t| t.name.clone()).collect();
        let tasks = definition
            .tasks
            .into_iter()
            .map(|t| {
                let task = Task {
                    name: t.name.clone(),
                    route: t.process,
                    description: t.description,
                    execution: t.execution,
                    input: t.input,
                    output: t.output,
                    next: t.next,
                    timeout: t.timeout_ms.map(Duration::from_millis),
                    monitor_before: t.monitor_before,
                    monitor_after: t.monitor_after,
                };
                (t.name, task)
            })
            .collect();

        Ok(Self {
            id: definition.id,
            description: definition.description,
            ttl: definition
                .ttl_ms
                .map(|ms| Duration::from_millis(ms).max(MIN_FLOW_TTL)),
            first_task: definition.first_task,
            tasks,
            order,
        })
    }

    /// Flow id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Time-to-live of one instance, if declared
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Name of the start task
    pub fn first_task(&self) -> &str {
        &self.first_task
    }

    /// Look up a task by name
    pub fn task(&self, name: &str) -> Result<&Task, CoreError> {
        self.tasks.get(name).ok_or_else(|| CoreError::TaskNotFound {
            flow_id: self.id.clone(),
            task: name.to_string(),
        })
    }

    /// Tasks in declaration order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|name| self.tasks.get(name))
    }
}

fn validate_task(task: &TaskDefinition, names: &HashSet<&str>, problems: &mut Vec<String>) {
    let name = &task.name;

    if !is_valid_service_name(&task.process) {
        problems.push(format!("task '{name}' has invalid route '{}'", task.process));
    }
    for monitor in [&task.monitor_before, &task.monitor_after].into_iter().flatten() {
        if !is_valid_service_name(monitor) {
            problems.push(format!("task '{name}' has invalid monitor route '{monitor}'"));
        }
    }

    let next_count = task.next.len();
    match task.execution {
        ExecutionType::Sequential if next_count != 1 => problems.push(format!(
            "sequential task '{name}' must have exactly one next task, found {next_count}"
        )),
        ExecutionType::Decision if next_count < 2 => problems.push(format!(
            "decision task '{name}' must have at least two next tasks, found {next_count}"
        )),
        ExecutionType::End | ExecutionType::Sink if next_count > 0 => problems.push(format!(
            "{} task '{name}' must not have next tasks",
            task.execution
        )),
        _ => {}
    }
    for next in &task.next {
        if !names.contains(next.as_str()) {
            problems.push(format!("task '{name}' transitions to unknown task '{next}'"));
        }
    }

    if task.timeout_ms == Some(0) {
        problems.push(format!("task '{name}' has a zero timeout"));
    }

    for line in &task.input {
        if let Err(e) = MappingLine::parse_input(line) {
            problems.push(format!("task '{name}': {e}"));
        }
    }
    let decision = task.execution == ExecutionType::Decision;
    for line in &task.output {
        if let Err(e) = MappingLine::parse_output(line, decision) {
            problems.push(format!("task '{name}': {e}"));
        }
    }
}
