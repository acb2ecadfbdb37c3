// tests/command_tasks.rs
//
// End-to-end runs of the binary's entry point against real shell commands.

#![cfg(unix)]

use std::fs;
use std::path::Path;

use serialq::cli::CliArgs;
use serialq::config::load_and_validate;
use serialq::exec::{CommandSpec, command_body};
use serialq::{TaskOptions, TaskQueue};
use serialq_test_utils::{init_tracing, wait_idle_async};
use tempfile::tempdir;
use tokio::runtime::Handle;

fn args_for(path: &Path) -> CliArgs {
    CliArgs {
        config: path.display().to_string(),
        concurrency: None,
        log_level: None,
        dry_run: false,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_executes_commands_in_dependency_order() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempdir()?;
    let out = dir.path().join("order.txt");
    let cfg_path = dir.path().join("Serialq.toml");
    fs::write(
        &cfg_path,
        format!(
            r#"
[queue]
concurrency_limit = 1

[task.first]
cmd = "sleep 0.05; echo first >> {out}"

[task.second]
cmd = "echo second >> {out}"
after = ["first"]

[task.third]
cmd = "echo third >> {out}"
after = ["second"]
"#,
            out = out.display()
        ),
    )?;

    serialq::run(args_for(&cfg_path)).await?;

    let lines: Vec<String> = fs::read_to_string(&out)?.lines().map(str::to_string).collect();
    assert_eq!(lines, ["first", "second", "third"]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_reports_failed_commands() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempdir()?;
    let cfg_path = dir.path().join("Serialq.toml");
    fs::write(
        &cfg_path,
        r#"
[task.broken]
cmd = "exit 3"

[task.after_broken]
cmd = "true"
after = ["broken"]
"#,
    )?;

    let err = serialq::run(args_for(&cfg_path)).await.unwrap_err();
    assert!(err.to_string().contains("1 task(s) failed"), "got: {err:#}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dependents_skip_when_configured() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempdir()?;
    let marker = dir.path().join("should-not-exist");
    let cfg_path = dir.path().join("Serialq.toml");
    fs::write(
        &cfg_path,
        format!(
            r#"
[queue]
skip_dependents_on_failure = true

[task.broken]
cmd = "false"

[task.dependent]
cmd = "touch {marker}"
after = ["broken"]
"#,
            marker = marker.display()
        ),
    )?;

    assert!(serialq::run(args_for(&cfg_path)).await.is_err());
    assert!(!marker.exists());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dry_run_and_concurrency_override() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempdir()?;
    let marker = dir.path().join("ran");
    let cfg_path = dir.path().join("Serialq.toml");
    fs::write(
        &cfg_path,
        format!("[task.touch]\ncmd = \"touch {}\"\n", marker.display()),
    )?;

    let mut args = args_for(&cfg_path);
    args.dry_run = true;
    serialq::run(args).await?;
    assert!(!marker.exists(), "dry run must not execute commands");

    let mut args = args_for(&cfg_path);
    args.concurrency = Some(0);
    assert!(serialq::run(args).await.is_err());

    assert!(load_and_validate(&cfg_path).is_ok());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn command_task_holds_slot_until_process_exits() -> anyhow::Result<()> {
    init_tracing();
    let queue = TaskQueue::new(1)?;
    let spec = CommandSpec {
        name: "sleepy".into(),
        cmd: "sleep 0.1".into(),
        skip_on_failed_dependency: false,
    };

    let sleepy = queue.submit_with(TaskOptions::new(), command_body(spec, Handle::current()))?;
    let next = queue.submit_sync(TaskOptions::new().after(&sleepy), |_| Ok(()))?;

    // The body returned right after spawning the process.
    assert!(sleepy.is_executing());
    assert!(next.is_pending());

    wait_idle_async(&queue).await;
    assert!(sleepy.error().is_none());
    assert!(next.is_finished());
    Ok(())
}
