use eventflow_core::{
    CoreError, EngineConfig, ErrorKind, ExecutionType, Flow, FlowDefinition, FlowExecutor,
    FlowRegistry, LocalDispatcher, MonitorPosition, PluginRegistry, PluginValue, TaskDefinition,
    TaskRequest, TaskResponse,
};
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("eventflow_core=debug")
        .with_test_writer()
        .try_init();
}

fn pipeline() -> Flow {
    Flow::load(
        FlowDefinition::new("pipeline", "first")
            .with_task(
                TaskDefinition::new("first", "v1.first", ExecutionType::Sequential)
                    .with_input("input.value -> value")
                    .with_output("result.value -> model.value")
                    .with_next("second"),
            )
            .with_task(
                TaskDefinition::new("second", "v1.second", ExecutionType::Sequential)
                    .with_input("f:double(model.value) -> value")
                    .with_output("result.value -> model.value")
                    .with_next("last"),
            )
            .with_task(
                TaskDefinition::new("last", "v1.last", ExecutionType::End)
                    .with_input("model.value -> value")
                    .with_output("result.value -> output.value")
                    .with_output("model.cid -> output.cid"),
            ),
    )
    .unwrap()
}

fn plugins() -> Arc<PluginRegistry> {
    let mut registry = PluginRegistry::new();
    registry
        .register_fn("double", |args: &[PluginValue]| {
            let n = args.first().map_or(Ok(0), PluginValue::promote_integer)?;
            Ok(PluginValue::Integer(n * 2))
        })
        .unwrap();
    Arc::new(registry)
}

fn echo(dispatcher: &LocalDispatcher, route: &str) {
    dispatcher
        .register_fn(route, |request: TaskRequest| async move {
            Ok(TaskResponse::ok(request.body))
        })
        .unwrap();
}

fn executor(dispatcher: LocalDispatcher) -> FlowExecutor {
    let mut flows = FlowRegistry::new();
    flows.add(pipeline()).unwrap();
    FlowExecutor::new(Arc::new(flows), plugins(), Arc::new(dispatcher))
}

fn echo_all() -> LocalDispatcher {
    let dispatcher = LocalDispatcher::new();
    for route in ["v1.first", "v1.second", "v1.last"] {
        echo(&dispatcher, route);
    }
    dispatcher
}

#[tokio::test]
async fn test_pipeline_completes() {
    init_tracing();
    let executor = executor(echo_all());

    let outcome = executor
        .run_flow("pipeline", json!({"value": 21}), Some("cid-42".to_string()))
        .await
        .unwrap();

    assert_eq!(outcome.output, json!({"value": 42, "cid": "cid-42"}));
    assert_eq!(outcome.executed, vec!["first", "second", "last"]);
    assert_eq!(outcome.state["input"], json!({"value": 21}));
}

#[tokio::test]
async fn test_concurrent_instances_are_isolated() {
    let executor = executor(echo_all());

    let runs = (0..16).map(|i| {
        let executor = executor.clone();
        async move { executor.run_flow("pipeline", json!({ "value": i }), None).await }
    });
    let outcomes = join_all(runs).await;

    for (i, outcome) in outcomes.into_iter().enumerate() {
        let outcome = assert_ok!(outcome);
        assert_eq!(outcome.output["value"], json!(i * 2));
    }
}

#[tokio::test]
async fn test_timeout_stops_the_flow() {
    init_tracing();
    let dispatcher = echo_all();
    let reached_last = Arc::new(AtomicUsize::new(0));
    dispatcher
        .register_fn("v1.second", |request: TaskRequest| async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(TaskResponse::ok(request.body))
        })
        .unwrap();
    let counter = reached_last.clone();
    dispatcher
        .register_fn("v1.last", move |request: TaskRequest| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(TaskResponse::ok(request.body)) }
        })
        .unwrap();

    let config = EngineConfig {
        default_dispatch_timeout_ms: 50,
        ..EngineConfig::default()
    };
    let executor = executor(dispatcher).with_config(config);

    let err = assert_err!(executor.run_flow("pipeline", json!({"value": 1}), None).await);
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(err.task_name.as_deref(), Some("second"));
    assert_eq!(
        err.cause,
        CoreError::Timeout {
            route: "v1.second".to_string(),
            timeout_ms: 50
        }
    );
    assert_eq!(reached_last.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reassigned_route_is_dispatched() {
    let dispatcher = echo_all();
    dispatcher
        .register_fn("v1.fake", |_request: TaskRequest| async {
            Ok(TaskResponse::ok(json!({"value": 1000})))
        })
        .unwrap();
    let executor = executor(dispatcher);

    let mock = executor.mock("pipeline").unwrap();
    let previous = mock.reassign_function_route("second", "v1.fake").unwrap();
    assert_eq!(previous, "v1.second");

    let outcome = executor
        .run_flow("pipeline", json!({"value": 1}), None)
        .await
        .unwrap();
    assert_eq!(outcome.output["value"], json!(1000));

    mock.reset();
    let outcome = executor
        .run_flow("pipeline", json!({"value": 1}), None)
        .await
        .unwrap();
    assert_eq!(outcome.output["value"], json!(2));
}

#[tokio::test]
async fn test_monitors_see_snapshots_and_can_be_cleared() {
    let dispatcher = echo_all();
    let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    dispatcher
        .register_fn("v1.watch", move |request: TaskRequest| {
            if let Ok(mut seen) = sink.lock() {
                seen.push(request.body);
            }
            async { Ok(TaskResponse::ok(Value::Null)) }
        })
        .unwrap();
    let executor = executor(dispatcher);

    let mock = executor.mock("pipeline").unwrap();
    mock.set_monitor("second", "v1.watch", MonitorPosition::Before)
        .unwrap();
    mock.set_monitor("second", "v1.watch", MonitorPosition::After)
        .unwrap();

    executor
        .run_flow("pipeline", json!({"value": 5}), None)
        .await
        .unwrap();
    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0]["position"], json!("before"));
        assert_eq!(seen[0]["state"]["model"]["value"], json!(5));
        assert_eq!(seen[1]["position"], json!("after"));
        assert_eq!(seen[1]["state"]["model"]["value"], json!(10));
    }

    mock.clear_monitors("second").unwrap();
    executor
        .run_flow("pipeline", json!({"value": 5}), None)
        .await
        .unwrap();
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_failing_monitor_does_not_fail_the_flow() {
    let executor = executor(echo_all());
    let mock = executor.mock("pipeline").unwrap();
    // nothing serves this route
    mock.set_monitor("first", "v1.missing", MonitorPosition::After)
        .unwrap();

    let outcome = executor
        .run_flow("pipeline", json!({"value": 3}), None)
        .await;
    assert_ok!(outcome);
}

#[tokio::test]
async fn test_cancel_takes_effect_at_the_next_step() {
    let dispatcher = echo_all();
    let release = Arc::new(Notify::new());
    let started = Arc::new(Notify::new());
    let (gate, entered) = (release.clone(), started.clone());
    dispatcher
        .register_fn("v1.first", move |request: TaskRequest| {
            let (gate, entered) = (gate.clone(), entered.clone());
            async move {
                entered.notify_one();
                gate.notified().await;
                Ok(TaskResponse::ok(request.body))
            }
        })
        .unwrap();
    let executor = executor(dispatcher);

    let handle = executor.start_flow("pipeline", json!({"value": 1}), Some("c-1".to_string()));
    assert_eq!(handle.correlation_id(), "c-1");
    started.notified().await;
    handle.cancel();
    release.notify_one();

    let err = handle.join().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cancelled);
    assert_eq!(err.task_name.as_deref(), Some("second"));
}

#[tokio::test]
async fn test_unknown_route_fails_with_task_name() {
    let dispatcher = LocalDispatcher::new();
    echo(&dispatcher, "v1.first");
    let executor = executor(dispatcher);

    let err = executor
        .run_flow("pipeline", json!({"value": 1}), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::RouteNotFound);
    assert_eq!(err.task_name.as_deref(), Some("second"));
    assert!(err.to_string().contains("v1.second"));
}

#[tokio::test]
async fn test_list_index_from_payload_fails_the_task() {
    let flow = Flow::load(
        FlowDefinition::new("keyed", "store").with_task(
            TaskDefinition::new("store", "v1.store", ExecutionType::End)
                .with_input("input.key -> model.key")
                .with_input("input.key -> key")
                .with_output("result -> model.{model.key}"),
        ),
    )
    .unwrap();
    let mut flows = FlowRegistry::new();
    flows.add(flow).unwrap();
    let dispatcher = LocalDispatcher::new();
    echo(&dispatcher, "v1.store");
    let executor = FlowExecutor::new(Arc::new(flows), plugins(), Arc::new(dispatcher));

    let outcome = executor
        .run_flow("keyed", json!({"key": "slots[1]"}), None)
        .await
        .unwrap();
    assert_eq!(outcome.state["model"]["slots"], json!([null, {"key": "slots[1]"}]));

    for key in ["slots[999999999999999999]", "slots[1000000000]"] {
        let err = executor
            .run_flow("keyed", json!({ "key": key }), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::StateStore);
        assert_eq!(err.task_name.as_deref(), Some("store"));
    }
}
