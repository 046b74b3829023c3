use crate::domain::state_store::StateStore;
use crate::CoreError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle of one flow instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum InstanceStatus {
    /// Created, no task started yet
    Ready,

    /// Running the named task
    Executing(String),

    /// Waiting for the dispatch of the named task to return
    Suspended(String),

    /// Reached a terminal task
    Completed,

    /// Stopped by an error
    Failed {
        /// Task that was running, if any
        task: Option<String>,
        /// Failure description
        reason: String,
    },
}

impl InstanceStatus {
    /// Returns true for `Completed` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstanceStatus::Completed | InstanceStatus::Failed { .. })
    }
}

/// One execution of a flow, owning its isolated state store
#[derive(Debug, Clone)]
pub struct FlowInstance {
    /// Unique instance id
    pub id: String,

    /// Flow being executed
    pub flow_id: String,

    /// Correlation id of the triggering event
    pub correlation_id: String,

    /// Working state
    pub state: StateStore,

    /// Tasks in the order they were started
    pub executed: Vec<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last status change
    pub updated_at: DateTime<Utc>,

    status: InstanceStatus,
}

impl FlowInstance {
    /// Create an instance seeded from `payload`.
    ///
    /// The payload lands verbatim under `input`; `model.instance`, `model.cid` and `model.flow`
    /// are filled in for mapping expressions.
    pub fn new(
        flow_id: impl Into<String>,
        correlation_id: impl Into<String>,
        payload: Value,
    ) -> Result<Self, CoreError> {
        let id = Uuid::new_v4().to_string();
        let flow_id = flow_id.into();
        let correlation_id = correlation_id.into();
        let now = Utc::now();

        let mut state = StateStore::new();
        state.set_element("input", payload)?;
        state.set_element("model.instance", Value::String(id.clone()))?;
        state.set_element("model.cid", Value::String(correlation_id.clone()))?;
        state.set_element("model.flow", Value::String(flow_id.clone()))?;

        Ok(Self {
            id,
            flow_id,
            correlation_id,
            state,
            executed: Vec::with_capacity(8),
            created_at: now,
            updated_at: now,
            status: InstanceStatus::Ready,
        })
    }

    /// Current status
    #[inline]
    pub fn status(&self) -> &InstanceStatus {
        &self.status
    }

    /// Task currently executing or suspended
    pub fn current_task(&self) -> Option<&str> {
        match &self.status {
            InstanceStatus::Executing(task) | InstanceStatus::Suspended(task) => Some(task),
            _ => None,
        }
    }

    /// Start `task`. Allowed from `Ready` and after the previous task finished.
    pub fn begin_task(&mut self, task: &str) -> Result<(), CoreError> {
        match self.status {
            InstanceStatus::Ready | InstanceStatus::Executing(_) => {
                self.executed.push(task.to_string());
                self.set_status(InstanceStatus::Executing(task.to_string()));
                Ok(())
            }
            _ => Err(self.illegal("start a task")),
        }
    }

    /// Park the instance while its dispatch is in flight
    pub fn suspend(&mut self) -> Result<(), CoreError> {
        match &self.status {
            InstanceStatus::Executing(task) => {
                let task = task.clone();
                self.set_status(InstanceStatus::Suspended(task));
                Ok(())
            }
            _ => Err(self.illegal("suspend")),
        }
    }

    /// Continue after the dispatch returned
    pub fn resume(&mut self) -> Result<(), CoreError> {
        match &self.status {
            InstanceStatus::Suspended(task) => {
                let task = task.clone();
                self.set_status(InstanceStatus::Executing(task));
                Ok(())
            }
            _ => Err(self.illegal("resume")),
        }
    }

    /// Finish successfully at a terminal task
    pub fn complete(&mut self) -> Result<(), CoreError> {
        match self.status {
            InstanceStatus::Executing(_) => {
                self.set_status(InstanceStatus::Completed);
                Ok(())
            }
            _ => Err(self.illegal("complete")),
        }
    }

    /// Stop with an error, remembering the running task
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(self.illegal("fail"));
        }
        let task = self.current_task().map(str::to_string);
        self.set_status(InstanceStatus::Failed {
            task,
            reason: reason.into(),
        });
        Ok(())
    }

    fn set_status(&mut self, status: InstanceStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    fn illegal(&self, action: &str) -> CoreError {
        CoreError::InvalidState(format!(
            "Cannot {action} instance {} in state {:?}",
            self.id, self.status
        ))
    }
}
