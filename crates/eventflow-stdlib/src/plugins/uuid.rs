use eventflow_core::{PluginError, PluginValue, SimplePlugin};
use uuid::Uuid;

/// `uuid()`: a fresh random v4 identifier on every call. Arguments are ignored.
pub struct UuidGenerator;

impl SimplePlugin for UuidGenerator {
    fn name(&self) -> &str {
        "uuid"
    }

    fn calculate(&self, _args: &[PluginValue]) -> Result<PluginValue, PluginError> {
        Ok(PluginValue::Text(Uuid::new_v4().to_string()))
    }
}
