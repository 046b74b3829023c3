use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors raised while evaluating a plugin function
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    /// A plugin with the same name is already registered
    #[error("Plugin '{0}' is already registered")]
    DuplicateName(String),

    /// No plugin is registered under the name
    #[error("Plugin '{0}' not found")]
    NotFound(String),

    /// Wrong number of arguments
    #[error("Plugin '{plugin}' expects {expected} argument(s), got {actual}")]
    Arity {
        /// Plugin name
        plugin: String,
        /// Human readable arity, e.g. "exactly 2"
        expected: &'static str,
        /// Number of arguments received
        actual: usize,
    },

    /// A divisor was zero
    #[error("Plugin '{0}' cannot divide by zero")]
    DivisionByZero(String),

    /// A value could not be promoted to a 64-bit integer
    #[error("Unable to promote {found} to a whole number")]
    TypePromotion {
        /// Description of the offending value
        found: String,
    },

    /// Any other evaluation failure
    #[error("Plugin '{plugin}' failed: {message}")]
    Evaluation {
        /// Plugin name
        plugin: String,
        /// Failure detail
        message: String,
    },

    /// The process-wide registry has already been installed
    #[error("Plugin registry is already installed")]
    AlreadyInstalled,
}

/// Core error type for the EventFlow engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Flow definition is malformed and can never run
    #[error("Flow load error: {0}")]
    FlowLoadError(String),

    /// Flow is not registered
    #[error("Flow not found: {0}")]
    FlowNotFound(String),

    /// Task is not part of the flow
    #[error("Task '{task}' not found in flow '{flow_id}'")]
    TaskNotFound {
        /// Flow id
        flow_id: String,
        /// Task name
        task: String,
    },

    /// No function is registered for the route
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    /// Route or monitor name violates the service-name grammar
    #[error("Invalid service name: '{0}'")]
    InvalidRoute(String),

    /// Plugin evaluation error
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// Mapping line could not be parsed or applied
    #[error("Mapping error: {0}")]
    MappingError(String),

    /// State store error
    #[error("State store error: {0}")]
    StateStoreError(String),

    /// Transport failed to deliver the request
    #[error("Dispatch to '{route}' failed: {message}")]
    DispatchError {
        /// Route that was dispatched to
        route: String,
        /// Failure detail
        message: String,
    },

    /// Function returned an error status
    #[error("Task failed with status {status}: {message}")]
    TaskFailure {
        /// Status code returned by the function
        status: u16,
        /// Failure detail
        message: String,
    },

    /// Dispatch or flow exceeded its time budget
    #[error("Timeout after {timeout_ms} ms waiting for '{route}'")]
    Timeout {
        /// Route or flow that timed out
        route: String,
        /// Budget in milliseconds
        timeout_ms: u64,
    },

    /// Instance was cancelled at a step boundary
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Illegal instance state transition
    #[error("Invalid state transition: {0}")]
    InvalidState(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of engine errors, reported to flow callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[allow(missing_docs)]
pub enum ErrorKind {
    FlowLoad,
    FlowNotFound,
    TaskNotFound,
    RouteNotFound,
    DuplicateName,
    Arity,
    TypePromotion,
    DivisionByZero,
    Evaluation,
    Mapping,
    StateStore,
    Dispatch,
    TaskFailure,
    Timeout,
    Cancelled,
    InvalidState,
    Configuration,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl CoreError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::FlowLoadError(_) => ErrorKind::FlowLoad,
            CoreError::FlowNotFound(_) => ErrorKind::FlowNotFound,
            CoreError::TaskNotFound { .. } => ErrorKind::TaskNotFound,
            CoreError::RouteNotFound(_) => ErrorKind::RouteNotFound,
            CoreError::InvalidRoute(_) => ErrorKind::Configuration,
            CoreError::Plugin(err) => match err {
                PluginError::DuplicateName(_) | PluginError::AlreadyInstalled => {
                    ErrorKind::DuplicateName
                }
                PluginError::Arity { .. } => ErrorKind::Arity,
                PluginError::TypePromotion { .. } => ErrorKind::TypePromotion,
                PluginError::DivisionByZero(_) => ErrorKind::DivisionByZero,
                PluginError::NotFound(_) | PluginError::Evaluation { .. } => ErrorKind::Evaluation,
            },
            CoreError::MappingError(_) => ErrorKind::Mapping,
            CoreError::StateStoreError(_) => ErrorKind::StateStore,
            CoreError::DispatchError { .. } => ErrorKind::Dispatch,
            CoreError::TaskFailure { .. } => ErrorKind::TaskFailure,
            CoreError::Timeout { .. } => ErrorKind::Timeout,
            CoreError::Cancelled(_) => ErrorKind::Cancelled,
            CoreError::InvalidState(_) => ErrorKind::InvalidState,
            CoreError::SerializationError(_) | CoreError::Other(_) => ErrorKind::Other,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}

/// Structured error returned to the caller of a failed flow instance
#[derive(Debug, Clone, PartialEq)]
pub struct FlowError {
    /// Flow id
    pub flow_id: String,
    /// Task that failed, if the failure happened inside a step
    pub task_name: Option<String>,
    /// Error classification
    pub kind: ErrorKind,
    /// Human readable message
    pub message: String,
    /// Originating engine error
    pub cause: CoreError,
}

impl FlowError {
    /// Failure that is not attributable to a task, e.g. an unknown flow
    pub fn new(flow_id: impl Into<String>, cause: CoreError) -> Self {
        Self {
            flow_id: flow_id.into(),
            task_name: None,
            kind: cause.kind(),
            message: cause.to_string(),
            cause,
        }
    }

    /// Failure raised while running `task_name`
    pub fn at_task(flow_id: impl Into<String>, task_name: impl Into<String>, cause: CoreError) -> Self {
        Self {
            task_name: Some(task_name.into()),
            ..Self::new(flow_id, cause)
        }
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.task_name {
            Some(task) => write!(
                f,
                "Flow '{}' failed at task '{}' ({}): {}",
                self.flow_id, task, self.kind, self.message
            ),
            None => write!(f, "Flow '{}' failed ({}): {}", self.flow_id, self.kind, self.message),
        }
    }
}

impl std::error::Error for FlowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (CoreError::FlowLoadError("no end task".to_string()), "Flow load error: no end task"),
            (CoreError::FlowNotFound("f1".to_string()), "Flow not found: f1"),
            (
                CoreError::TaskNotFound { flow_id: "f1".to_string(), task: "t1".to_string() },
                "Task 't1' not found in flow 'f1'",
            ),
            (CoreError::RouteNotFound("v1.x".to_string()), "Route not found: v1.x"),
            (CoreError::InvalidRoute("Bad".to_string()), "Invalid service name: 'Bad'"),
            (
                CoreError::Timeout { route: "v1.slow".to_string(), timeout_ms: 50 },
                "Timeout after 50 ms waiting for 'v1.slow'",
            ),
            (CoreError::Cancelled("by caller".to_string()), "Cancelled: by caller"),
            (
                CoreError::Plugin(PluginError::DivisionByZero("div".to_string())),
                "Plugin 'div' cannot divide by zero",
            ),
            (CoreError::Other("other_err".to_string()), "other_err"),
        ];

        for (error, expected_msg) in errors {
            assert_eq!(error.to_string(), expected_msg);
        }
    }

    #[test]
    fn test_error_kind() {
        let arity = CoreError::from(PluginError::Arity {
            plugin: "mod".to_string(),
            expected: "exactly 2",
            actual: 1,
        });
        assert_eq!(arity.kind(), ErrorKind::Arity);
        assert_eq!(
            CoreError::Timeout { route: "a.b".to_string(), timeout_ms: 1 }.kind(),
            ErrorKind::Timeout
        );
        assert_eq!(CoreError::Cancelled(String::new()).kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error: CoreError = json_error.into();

        match error {
            CoreError::SerializationError(msg) => {
                assert!(msg.contains("expected value"));
            }
            _ => panic!("Expected SerializationError variant"),
        }
    }

    #[test]
    fn test_flow_error_carries_task() {
        let err = FlowError::at_task(
            "f1",
            "calc",
            CoreError::Timeout { route: "v1.calc".to_string(), timeout_ms: 10 },
        );
        assert_eq!(err.task_name.as_deref(), Some("calc"));
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(err.to_string().starts_with("Flow 'f1' failed at task 'calc' (Timeout)"));

        let err = FlowError::new("missing", CoreError::FlowNotFound("missing".to_string()));
        assert_eq!(err.task_name, None);
        assert_eq!(err.kind, ErrorKind::FlowNotFound);
    }
}
