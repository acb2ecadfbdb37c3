// tests/config_loading.rs

use std::fs;

use serialq::QueueError;
use serialq::config::{QueueConfig, default_config_path, load_and_validate, parse_str};
use serialq_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn config_error(err: QueueError) -> String {
    match err {
        QueueError::Config(msg) => msg,
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn loads_and_validates_a_task_file() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("Serialq.toml");
    fs::write(
        &path,
        r#"
[queue]
concurrency_limit = 2
name = "build"

[task.fetch]
cmd = "echo fetch"
priority = 5

[task.unpack]
cmd = "echo unpack"
after = ["fetch"]

[task.index]
cmd = "echo index"
after = ["unpack", "fetch"]
"#,
    )?;

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.queue.concurrency_limit, 2);
    assert_eq!(cfg.queue.name.as_deref(), Some("build"));
    assert!(!cfg.queue.skip_dependents_on_failure);
    assert_eq!(cfg.task["fetch"].priority, 5);
    assert_eq!(cfg.task["unpack"].priority, 0);
    assert_eq!(cfg.submission_order(), ["fetch", "unpack", "index"]);
    Ok(())
}

#[test]
fn queue_section_is_optional() -> TestResult {
    let raw = parse_str("[task.only]\ncmd = \"true\"\n")?;
    assert_eq!(raw.queue.concurrency_limit, 1);
    assert_eq!(raw.queue.name, None);

    let defaults = QueueConfig::default();
    assert_eq!(defaults.concurrency_limit, 1);
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let err = load_and_validate(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, QueueError::Io(_)), "got: {err:?}");
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let err = parse_str("[task.a\ncmd = ").unwrap_err();
    assert!(matches!(err, QueueError::Toml(_)), "got: {err:?}");
}

#[test]
fn rejects_empty_task_table() {
    let err = ConfigFileBuilder::new().try_build().unwrap_err();
    assert!(config_error(err).contains("at least one"));
}

#[test]
fn rejects_zero_concurrency() {
    let err = ConfigFileBuilder::new()
        .concurrency_limit(0)
        .with_task("a", TaskConfigBuilder::new("echo a").build())
        .try_build()
        .unwrap_err();
    assert!(config_error(err).contains("concurrency_limit"));
}

#[test]
fn rejects_empty_command() {
    let err = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new("   ").build())
        .try_build()
        .unwrap_err();
    assert!(config_error(err).contains("empty `cmd`"));
}

#[test]
fn rejects_unknown_dependency() {
    let err = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new("echo a").after("ghost").build())
        .try_build()
        .unwrap_err();
    let msg = config_error(err);
    assert!(msg.contains("unknown dependency 'ghost'"), "got: {msg}");
}

#[test]
fn rejects_self_dependency() {
    let err = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new("echo a").after("a").build())
        .try_build()
        .unwrap_err();
    assert!(config_error(err).contains("itself"));
}

#[test]
fn rejects_dependency_cycle() {
    let err = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::new("echo a").after("c").build())
        .with_task("b", TaskConfigBuilder::new("echo b").after("a").build())
        .with_task("c", TaskConfigBuilder::new("echo c").after("b").build())
        .with_task("d", TaskConfigBuilder::new("echo d").build())
        .try_build()
        .unwrap_err();
    assert!(config_error(err).contains("cycle detected"));
}

#[test]
fn submission_order_puts_dependencies_first() {
    let cfg = ConfigFileBuilder::new()
        .with_task("z", TaskConfigBuilder::new("echo z").build())
        .with_task("a", TaskConfigBuilder::new("echo a").after("z").build())
        .with_task("m", TaskConfigBuilder::new("echo m").after("a").after("z").priority(3).build())
        .build();

    let order = cfg.submission_order();
    let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
    assert!(pos("z") < pos("a"));
    assert!(pos("a") < pos("m"));
}

#[test]
fn default_path_is_in_working_directory() {
    assert_eq!(default_config_path().to_str(), Some("Serialq.toml"));
}

#[test]
fn submission_order_is_by_level_then_name() {
    let cfg = ConfigFileBuilder::new()
        .with_task("zeta", TaskConfigBuilder::new("echo zeta").build())
        .with_task("alpha", TaskConfigBuilder::new("echo alpha").build())
        .with_task("omega", TaskConfigBuilder::new("echo omega").after("alpha").build())
        .with_task("beta", TaskConfigBuilder::new("echo beta").after("zeta").build())
        .with_task("gamma", TaskConfigBuilder::new("echo gamma").after("beta").build())
        .with_task("delta", TaskConfigBuilder::new("echo delta").after("alpha").build())
        .build();

    assert_eq!(
        cfg.submission_order(),
        ["alpha", "zeta", "beta", "delta", "omega", "gamma"]
    );
}
