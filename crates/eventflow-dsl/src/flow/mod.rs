use serde::{Deserialize, Serialize};

/// A flow document as written in YAML.
///
/// Every field is optional at this level so that missing values are reported by the validators
/// with a path, instead of as an opaque deserialization error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDocument {
    /// Flow header
    #[serde(default)]
    pub flow: Option<FlowHeader>,

    /// Name of the start task
    #[serde(rename = "first.task", default)]
    pub first_task: Option<String>,

    /// Tasks in declaration order
    #[serde(default)]
    pub tasks: Vec<TaskDocument>,
}

/// The `flow:` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowHeader {
    /// Unique flow id
    #[serde(default)]
    pub id: Option<String>,

    /// Optional human-readable description
    #[serde(default)]
    pub description: Option<String>,

    /// Instance time-to-live, e.g. `30s`
    #[serde(default)]
    pub ttl: Option<serde_yaml::Value>,
}

/// One entry of `tasks:`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDocument {
    /// Task name, defaults to the process route
    #[serde(default)]
    pub name: Option<String>,

    /// Function route
    #[serde(default)]
    pub process: Option<String>,

    /// Optional human-readable description
    #[serde(default)]
    pub description: Option<String>,

    /// `sequential`, `decision`, `end` or `sink`
    #[serde(default)]
    pub execution: Option<String>,

    /// Per-dispatch timeout, e.g. `500ms`
    #[serde(default)]
    pub timeout: Option<serde_yaml::Value>,

    /// Input mapping lines
    #[serde(default)]
    pub input: Vec<String>,

    /// Output mapping lines
    #[serde(default)]
    pub output: Vec<String>,

    /// Candidate next tasks
    #[serde(default)]
    pub next: Vec<String>,

    /// Monitor routes
    #[serde(default)]
    pub monitor: Option<MonitorDocument>,
}

impl TaskDocument {
    /// Name the task is known by: `name`, or the process route when absent
    pub fn effective_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.process.as_deref())
    }
}

/// The `monitor:` section of a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorDocument {
    /// Route called before input mapping
    #[serde(default)]
    pub before: Option<String>,

    /// Route called after output mapping
    #[serde(default)]
    pub after: Option<String>,
}
