use eventflow_core::{global_registry, install_global, PluginError, PluginValue};
use eventflow_stdlib::registry_with_builtins;

#[test]
fn test_global_registry_installs_once() {
    assert!(global_registry().is_none());

    let installed = install_global(registry_with_builtins().unwrap()).unwrap();
    let shared = global_registry().unwrap();
    assert_eq!(shared.len(), installed.len());
    assert_eq!(
        shared
            .invoke("concat", &[PluginValue::from("a"), PluginValue::from("b")])
            .unwrap(),
        PluginValue::from("ab")
    );

    let second = install_global(registry_with_builtins().unwrap());
    assert!(matches!(second, Err(PluginError::AlreadyInstalled)));
}

#[test]
fn test_registry_is_shared_across_threads() {
    let registry = std::sync::Arc::new(registry_with_builtins().unwrap());
    let handles: Vec<_> = (0..8i64)
        .map(|i| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                registry
                    .invoke("multiply", &[PluginValue::Integer(i), PluginValue::Integer(3)])
                    .unwrap()
            })
        })
        .collect();

    let results: Vec<PluginValue> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let expected: Vec<PluginValue> = (0..8i64).map(|i| PluginValue::Integer(i * 3)).collect();
    assert_eq!(results, expected);
}
