use eventflow_dsl::{load_flow_file, load_flows_from_dir, parse_flow, DslError};
use std::fs;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) {
    fs::write(dir.path().join(name), contents).unwrap();
}

fn simple_flow(id: &str) -> String {
    format!(
        r#"
flow:
  id: {id}
first.task: only
tasks:
  - name: only
    process: v1.only
    execution: end
    output:
      - 'result -> output.body'
"#
    )
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("eventflow_dsl=debug")
        .with_test_writer()
        .try_init();
}

#[test]
fn test_load_directory_skips_bad_files() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write(&dir, "a.yml", &simple_flow("alpha"));
    write(&dir, "b.yaml", &simple_flow("beta"));
    // same id as a.yml, loaded later and skipped
    write(&dir, "c.yml", &simple_flow("alpha"));
    write(&dir, "d.yml", "flow: [not closed");
    write(&dir, "e.yml", "flow: { id: gamma }\ntasks: []\n");
    write(&dir, "notes.txt", &simple_flow("ignored"));

    let registry = load_flows_from_dir(dir.path()).unwrap();
    assert_eq!(registry.flow_ids(), vec!["alpha", "beta"]);
    assert!(!registry.contains("ignored"));
}

#[test]
fn test_missing_directory_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = load_flows_from_dir(dir.path().join("nope")).unwrap_err();
    assert!(matches!(err, DslError::IoError { .. }));
    assert_eq!(err.error_code(), "ERR_DSL_IO");
}

#[test]
fn test_load_single_file() {
    let dir = TempDir::new().unwrap();
    write(&dir, "flow.yml", &simple_flow("single"));
    let flow = load_flow_file(dir.path().join("flow.yml")).unwrap();
    assert_eq!(flow.id(), "single");
    assert_eq!(flow.tasks().count(), 1);
}

#[test]
fn test_bad_mapping_line_is_a_flow_load_error() {
    let yaml = r#"
flow: { id: mapping }
first.task: a
tasks:
  - name: a
    process: v1.a
    execution: end
    input:
      - 'no arrow here'
"#;
    let err = parse_flow(yaml).unwrap_err();
    assert_eq!(err.error_code(), "ERR_DSL_FLOW_LOAD");
    assert!(err.to_string().contains("task 'a'"), "{err}");
}

#[test]
fn test_invalid_route_is_reported() {
    let yaml = r#"
flow: { id: routes }
first.task: a
tasks:
  - name: a
    process: NotAService
    execution: end
"#;
    let err = parse_flow(yaml).unwrap_err();
    assert!(err.to_string().contains("invalid route 'NotAService'"), "{err}");
}

#[test]
fn test_duration_errors_carry_paths() {
    let yaml = r#"
flow: { id: durations, ttl: soon }
first.task: a
tasks:
  - { name: a, process: v1.a, execution: end, timeout: 10 parsecs }
"#;
    let err = parse_flow(yaml).unwrap_err();
    assert_eq!(
        err.validation_codes(),
        vec![
            "ERR_DSL_VALIDATION_INVALID_DURATION",
            "ERR_DSL_VALIDATION_INVALID_DURATION"
        ]
    );
    let text = err.to_string();
    assert!(text.contains("flow.ttl"));
    assert!(text.contains("tasks[0].timeout"));
}
