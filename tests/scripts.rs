//! End-to-end behaviour of the script host through the public API

use std::fs;
use std::path::Path;
use std::rc::Rc;

use luna::host::DirectoryBundles;
use luna::{LunaError, ScriptRegistry, TickRunner};
use mlua::{Table, Value};

fn registry() -> (ScriptRegistry, Rc<TickRunner>) {
    let runner = Rc::new(TickRunner::new());
    let registry = ScriptRegistry::builder().build(runner.clone()).unwrap();
    (registry, runner)
}

fn bundle(root: &Path, name: &str, files: &[(&str, &str)]) {
    let folder = root.join(name);
    fs::create_dir_all(&folder).unwrap();
    for (file, body) in files {
        fs::write(folder.join(file), body).unwrap();
    }
}

fn integer(value: Option<Value>) -> Option<i64> {
    match value {
        Some(Value::Integer(i)) => Some(i),
        _ => None,
    }
}

#[test]
fn reload_reruns_load_hooks_in_fresh_environment() {
    let dir = tempfile::tempdir().unwrap();
    bundle(
        dir.path(),
        "greet",
        &[(
            "main.lua",
            r#"
            loads = (loads or 0) + 1
            script:on_load(function() state = 1 end)
            "#,
        )],
    );

    let runner = Rc::new(TickRunner::new());
    let mut registry = ScriptRegistry::builder()
        .bundles(DirectoryBundles::new(dir.path(), "main.lua"))
        .build(runner)
        .unwrap();

    registry.load_bundle("greet").unwrap();
    assert_eq!(integer(registry.get_variable("greet", "state")), Some(1));

    registry.reload("greet").unwrap();
    assert_eq!(integer(registry.get_variable("greet", "state")), Some(1));
    assert_eq!(integer(registry.get_variable("greet", "loads")), Some(1));
}

#[test]
fn immediate_task_bumps_shared_counter_once() {
    let (mut registry, runner) = registry();
    let counter = registry.lua().create_table().unwrap();
    counter.set("value", 0).unwrap();
    registry.share("counter", counter.clone()).unwrap();

    registry
        .load(
            "scheduler:run(function() counter.value = counter.value + 1 end)",
            "ping",
        )
        .unwrap();
    assert_eq!(counter.get::<i64>("value").unwrap(), 0);

    runner.tick();
    assert_eq!(counter.get::<i64>("value").unwrap(), 1);
    assert!(registry.scheduler().handles("ping").is_empty());
    assert_eq!(registry.scheduler().pinned(), 0);

    runner.tick();
    assert_eq!(counter.get::<i64>("value").unwrap(), 1);
}

#[test]
fn unloading_cancels_every_pending_task() {
    let (mut registry, runner) = registry();
    registry
        .load(
            r#"
            for i = 1, 4 do
                scheduler:run_later(100, function() end)
            end
            for i = 1, 3 do
                scheduler:run_repeating(50, 10, function() end)
            end
            "#,
            "busy",
        )
        .unwrap();

    let handles = registry.scheduler().handles("busy");
    assert_eq!(handles.len(), 7);
    assert!(handles.iter().all(|h| h.pin.is_some()));
    assert_eq!(registry.scheduler().pinned(), 7);
    assert_eq!(runner.pending(), 7);

    registry.unload("busy").unwrap();
    assert!(registry.scheduler().handles("busy").is_empty());
    assert_eq!(registry.scheduler().pinned(), 0);
    assert_eq!(runner.pending(), 0);
}

#[test]
fn cancel_all_reports_each_task_once() {
    let (mut registry, _) = registry();
    registry
        .load(
            r#"
            scheduler:run_later(100, function() end)
            scheduler:run_repeating(50, 10, function() end)
            "#,
            "busy",
        )
        .unwrap();

    let summary = registry.scheduler().cancel_all("busy");
    assert_eq!((summary.cancelled, summary.released), (2, 2));
    let again = registry.scheduler().cancel_all("busy");
    assert_eq!((again.cancelled, again.released), (0, 0));
}

#[test]
fn failed_load_leaves_registry_untouched() {
    let (mut registry, runner) = registry();
    registry.load("x = 1", "steady").unwrap();

    let err = registry
        .load(
            r#"
            scheduler:run_later(5, function() end)
            script:share("leak", {})
            error("boom")
            "#,
            "doomed",
        )
        .unwrap_err();
    assert!(matches!(err, LunaError::ExecutionError { .. }));

    assert!(!registry.is_loaded("doomed"));
    assert_eq!(registry.loaded_scripts(), vec!["steady"]);
    assert!(registry.objects().owner("leak").is_none());
    assert_eq!(registry.scheduler().outstanding("doomed"), 0);
    assert_eq!(runner.pending(), 0);
}

#[test]
fn frozen_environment_rejects_writes() {
    let (mut registry, _) = registry();
    let err = registry.load("string.upper = nil", "vandal").unwrap_err();
    assert!(matches!(err, LunaError::ProtectionViolation { .. }));

    registry
        .load(
            r#"
            ok = pcall(function() math.pi = 3 end)
            pi = math.pi
            "#,
            "reader",
        )
        .unwrap();
    assert!(matches!(registry.get_variable("reader", "ok"), Some(Value::Boolean(false))));
    match registry.get_variable("reader", "pi") {
        Some(Value::Number(n)) => assert!((n - std::f64::consts::PI).abs() < 1e-12),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn missing_path_segments_are_undefined() {
    let (mut registry, _) = registry();
    registry.load("a = { b = { c = 3 } }", "nested").unwrap();

    assert_eq!(integer(registry.get_variable("nested", "a.b.c")), Some(3));
    for path in ["x.b.c", "a.x.c", "a.b.x", "a.b.c.d", ""] {
        assert!(registry.get_variable("nested", path).is_none(), "path {}", path);
    }
    assert!(registry.get_variable("ghost", "a").is_none());
}

#[test]
fn unload_makes_script_unreachable() {
    let (mut registry, _) = registry();
    registry.load("value = 42", "gone").unwrap();
    registry.unload("gone").unwrap();

    assert!(!registry.is_loaded("gone"));
    assert!(registry.get_variable("gone", "value").is_none());
    assert!(matches!(registry.unload("gone"), Err(LunaError::NotFound(_))));
}

#[test]
fn scripts_share_objects_without_sharing_globals() {
    let (mut registry, runner) = registry();
    registry
        .load(
            r#"
            inbox = {}
            script:share("mailbox", inbox)
            "#,
            "owner",
        )
        .unwrap();
    registry
        .load(
            r#"
            inbox = "mine"
            scheduler:run(function() table.insert(mailbox, "hello") end)
            "#,
            "sender",
        )
        .unwrap();
    runner.tick();

    let inbox: Table = match registry.get_variable("owner", "inbox") {
        Some(Value::Table(t)) => t,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(inbox.raw_len(), 1);
    assert!(matches!(registry.get_variable("sender", "inbox"), Some(Value::String(_))));

    registry.unload("owner").unwrap();
    assert!(registry.objects().owner("mailbox").is_none());
}

#[test]
fn bundle_entry_imports_sibling_module() {
    let dir = tempfile::tempdir().unwrap();
    bundle(
        dir.path(),
        "math2",
        &[
            ("main.lua", "local util = import('util') doubled = util.double(21)"),
            ("util.lua", "return { double = function(n) return n * 2 end }"),
        ],
    );

    let runner = Rc::new(TickRunner::new());
    let mut registry = ScriptRegistry::builder()
        .bundles(DirectoryBundles::new(dir.path(), "main.lua"))
        .build(runner)
        .unwrap();

    let outcomes = registry.load_all().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].success);
    assert_eq!(integer(registry.get_variable("math2", "doubled")), Some(42));
}

#[test]
fn load_all_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    bundle(dir.path(), "good", &[("main.lua", "ok = true")]);
    bundle(dir.path(), "bad", &[("main.lua", "this is not lua")]);

    let runner = Rc::new(TickRunner::new());
    let mut registry = ScriptRegistry::builder()
        .bundles(DirectoryBundles::new(dir.path(), "main.lua"))
        .build(runner)
        .unwrap();

    let outcomes = registry.load_all().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].script, "bad");
    assert!(!outcomes[0].success);
    assert!(outcomes[1].success);
    assert_eq!(registry.loaded_scripts(), vec!["good"]);
}
