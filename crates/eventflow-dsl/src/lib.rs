//! # EventFlow DSL
//!
//! Flows are written as YAML documents. This crate parses them, reports field level problems
//! with a code and a path, and turns valid documents into [`Flow`]s ready for the executor.
//!
//! ## Example
//!
//! ```
//! use eventflow_dsl::parse_flow;
//!
//! let yaml = r#"
//! flow:
//!   id: greetings
//!   ttl: 10s
//! first.task: greet
//! tasks:
//!   - name: greet
//!     process: v1.greet
//!     execution: end
//!     input:
//!       - 'input.name -> name'
//!     output:
//!       - 'result -> output.body'
//! "#;
//!
//! let flow = parse_flow(yaml).unwrap();
//! assert_eq!(flow.id(), "greetings");
//! assert_eq!(flow.first_task(), "greet");
//! ```

mod error;
mod parser;

pub mod flow;
pub mod validation;

pub use error::DslError;
pub use flow::{FlowDocument, FlowHeader, MonitorDocument, TaskDocument};
pub use parser::parse_duration;
pub use validation::ValidationError;

use eventflow_core::{Flow, FlowDefinition, FlowRegistry};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Parse and validate a flow document, returning its definition.
///
/// # Errors
///
/// * `YamlError` for invalid YAML or a document of the wrong shape
/// * `ValidationError` / `MultipleValidationErrors` for missing or malformed fields
/// * `FlowLoad` when the definition cannot be built
pub fn parse_flow_definition(yaml_str: &str) -> Result<FlowDefinition, DslError> {
    let document = parser::parse_flow_document(yaml_str)?;
    validation::validate_document(&document)?;
    parser::to_definition(&document)
}

/// Parse, validate and load a flow document.
///
/// Graph level problems (unknown next tasks, wrong number of transitions, bad mapping lines)
/// surface as [`DslError::FlowLoad`].
///
/// ```
/// use eventflow_dsl::{parse_flow, DslError};
///
/// let yaml = r#"
/// flow: { id: broken }
/// first.task: a
/// tasks:
///   - { name: a, process: v1.a, execution: sequential, next: [missing] }
/// "#;
///
/// let err = parse_flow(yaml).unwrap_err();
/// assert!(matches!(err, DslError::FlowLoad(_)));
/// assert_eq!(err.error_code(), "ERR_DSL_FLOW_LOAD");
/// ```
pub fn parse_flow(yaml_str: &str) -> Result<Flow, DslError> {
    let definition = parse_flow_definition(yaml_str)?;
    Ok(Flow::load(definition)?)
}

/// Load every `.yml` / `.yaml` file of a directory into a registry.
///
/// Files are read in name order. A file that cannot be read, parsed or loaded is logged and
/// skipped, as is a flow whose id is already taken. Only a missing or unreadable directory
/// is an error.
pub fn load_flows_from_dir(dir: impl AsRef<Path>) -> Result<FlowRegistry, DslError> {
    let dir = dir.as_ref();
    let io_error = |source| DslError::IoError {
        path: dir.to_path_buf(),
        source,
    };

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(io_error)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("yml") | Some("yaml")
                )
        })
        .collect();
    files.sort();

    let mut registry = FlowRegistry::new();
    let mut skipped = 0usize;
    for path in &files {
        match load_flow_file(path).and_then(|flow| Ok(registry.add(flow)?)) {
            Ok(flow) => debug!(flow_id = %flow.id(), path = %path.display(), "Flow file loaded"),
            Err(err) => {
                skipped += 1;
                error!(path = %path.display(), code = err.error_code(), "Unable to load flow: {}", err);
            }
        }
    }

    info!(
        directory = %dir.display(),
        loaded = registry.len(),
        skipped,
        "Flow directory scanned"
    );
    Ok(registry)
}

/// Read and load a single flow file
pub fn load_flow_file(path: impl AsRef<Path>) -> Result<Flow, DslError> {
    let path = path.as_ref();
    let yaml = std::fs::read_to_string(path).map_err(|source| DslError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    parse_flow(&yaml)
}

/// Returns a version string for the EventFlow DSL crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventflow_core::ExecutionType;
    use pretty_assertions::assert_eq;

    const DECISION_FLOW: &str = r#"
flow:
  id: approval
  description: Approve or reject a request
  ttl: 30s
first.task: check
tasks:
  - name: check
    process: v1.check.amount
    execution: decision
    input:
      - 'input.amount -> amount'
    output:
      - 'result.approved -> decision'
    next: [approve, reject]
  - name: approve
    process: v1.approve
    execution: end
    timeout: 500ms
    monitor:
      after: v1.audit
  - name: reject
    process: v1.reject
    execution: end
"#;

    #[test]
    fn test_parse_valid_flow() {
        let flow = parse_flow(DECISION_FLOW).unwrap();
        assert_eq!(flow.id(), "approval");
        assert_eq!(flow.ttl(), Some(std::time::Duration::from_secs(30)));

        let check = flow.task("check").unwrap();
        assert_eq!(check.execution(), ExecutionType::Decision);
        assert_eq!(check.next().to_vec(), vec!["approve".to_string(), "reject".to_string()]);

        let approve = flow.task("approve").unwrap();
        assert_eq!(approve.timeout(), Some(std::time::Duration::from_millis(500)));
        assert_eq!(approve.monitor_after(), Some("v1.audit"));
    }

    #[test]
    fn test_missing_fields_are_collected() {
        let yaml = r#"
flow: { description: nameless }
tasks:
  - { process: v1.a }
"#;
        let err = parse_flow_definition(yaml).unwrap_err();
        assert_eq!(err.error_code(), "ERR_DSL_VALIDATION_MULTIPLE");
        assert_eq!(
            err.validation_codes(),
            vec![validation::error_codes::MISSING_REQUIRED_FIELD; 3]
        );
        let text = err.to_string();
        assert!(text.contains("(at flow.id)"), "{text}");
        assert!(text.contains("(at tasks[0].execution)"), "{text}");
    }

    #[test]
    fn test_single_validation_error_keeps_its_code() {
        let yaml = r#"
flow: { id: f }
first.task: a
tasks:
  - { name: a, process: v1.a, execution: fork }
"#;
        let err = parse_flow(yaml).unwrap_err();
        assert_eq!(
            err.error_code(),
            validation::error_codes::INVALID_EXECUTION_TYPE
        );
    }

    #[test]
    fn test_version_function() {
        assert!(version().contains('.'));
    }
}
