use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Status code of a successful response
pub const STATUS_OK: u16 = 200;

/// Request handed to a function route
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Body built by the input mapping
    pub body: Value,

    /// Headers built by the input mapping
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Correlation id of the flow instance
    pub correlation_id: String,

    /// Flow id
    pub flow_id: String,

    /// Task name
    pub task_name: String,

    /// Flow instance id
    pub instance_id: String,
}

impl TaskRequest {
    /// Header value by name
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Response returned by a function route
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    /// Status code, 200 for success
    pub status: u16,

    /// Response body
    pub body: Value,

    /// Response headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl TaskResponse {
    /// Successful response carrying `body`
    #[inline]
    pub fn ok(body: Value) -> Self {
        Self {
            status: STATUS_OK,
            body,
            headers: HashMap::new(),
        }
    }

    /// Response with an explicit status
    pub fn with_status(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            headers: HashMap::new(),
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Status 400 and above are failures
    #[inline]
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}
