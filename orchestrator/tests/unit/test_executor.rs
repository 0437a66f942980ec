//! Executor unit tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use launchpad::deploy::command::{CommandOutput, CommandRunner, CommandSpec};
use launchpad::deploy::executor::{Executor, RetryPolicy, WaitOutcome};
use launchpad::errors::LaunchError;
use launchpad::logs::RunLog;

use crate::support::{fail, ok, Buffer, RecordingSleeper, ScriptedRunner};

fn executor(runner: Arc<dyn CommandRunner>, max_retries: u32) -> (Executor, Arc<RecordingSleeper>, Buffer) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let buffer = Buffer::default();
    let executor = Executor::new(
        runner,
        sleeper.clone(),
        Arc::new(RunLog::with_sink(buffer.clone())),
        RetryPolicy {
            max_retries,
            backoff_base: Duration::from_secs(5),
        },
    );
    (executor, sleeper, buffer)
}

#[tokio::test]
async fn test_retry_budget_and_linear_sleeps() {
    let runner = Arc::new(ScriptedRunner::default());
    runner.on("netlify deploy", fail(1, "Error: deploy failed\nunauthorized"));
    let (executor, sleeper, buffer) = executor(runner.clone(), 4);

    let command = CommandSpec::new("netlify").args(["deploy", "--prod"]);
    let err = executor
        .run_with_retry("Publish to Netlify", &command)
        .await
        .unwrap_err();

    assert!(matches!(err, LaunchError::ExecutionExhausted { attempts: 4, .. }));
    assert_eq!(runner.count("netlify deploy"), 4);
    assert_eq!(
        sleeper.slept(),
        vec![
            Duration::from_secs(5),
            Duration::from_secs(10),
            Duration::from_secs(15)
        ]
    );

    let log = buffer.contents();
    for attempt in 1..=4 {
        assert!(log.contains(&format!("[WARN] Attempt {}/4 of `netlify deploy --prod` failed (exit 1", attempt)));
    }
    assert!(log.contains("unauthorized"));
    assert_eq!(log.matches("[ERROR]").count(), 1);
}

#[tokio::test]
async fn test_success_after_failure() {
    let runner = Arc::new(ScriptedRunner::default());
    runner.on_sequence("npm run build", vec![fail(1, "ENOENT"), ok("built")]);
    let (executor, sleeper, buffer) = executor(runner.clone(), 3);

    let output = executor
        .run_with_retry("Build site", &CommandSpec::new("npm").args(["run", "build"]))
        .await
        .unwrap();

    assert_eq!(output.stdout, "built");
    assert_eq!(runner.count("npm run build"), 2);
    assert_eq!(sleeper.slept(), vec![Duration::from_secs(5)]);
    assert!(!buffer.contents().contains("[ERROR]"));
}

#[tokio::test]
async fn test_accepting_output_stops_retries() {
    let runner = Arc::new(ScriptedRunner::default());
    runner.on(
        "kubectl create namespace",
        fail(1, "Error from server (AlreadyExists): namespaces \"kafka\" already exists"),
    );
    let (executor, sleeper, _) = executor(runner.clone(), 3);

    let command = CommandSpec::new("kubectl").args(["create", "namespace", "kafka"]);
    let output = executor
        .run_with_retry_accepting("Ensure namespace", &command, |out| out.mentions("AlreadyExists"))
        .await
        .unwrap();

    assert!(!output.success());
    assert_eq!(runner.count("kubectl create namespace"), 1);
    assert!(sleeper.slept().is_empty());
}

#[tokio::test]
async fn test_run_once_never_retries() {
    let runner = Arc::new(ScriptedRunner::default());
    runner.on("git push", fail(128, "fatal: could not read from remote"));
    let (executor, sleeper, _) = executor(runner.clone(), 3);

    let err = executor
        .run_once("Push pages branch", &CommandSpec::new("git").args(["push", "--force", "origin", "gh-pages"]))
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert_eq!(runner.count("git push"), 1);
    assert!(sleeper.slept().is_empty());
}

struct SpawnFailure;

#[async_trait]
impl CommandRunner for SpawnFailure {
    async fn run(&self, _command: &CommandSpec) -> std::io::Result<CommandOutput> {
        Err(std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"))
    }
}

#[tokio::test]
async fn test_spawn_failure_counts_as_attempt() {
    let (executor, sleeper, buffer) = executor(Arc::new(SpawnFailure), 2);

    let err = executor
        .run_with_retry("Publish to Vercel", &CommandSpec::new("vercel").arg("deploy"))
        .await
        .unwrap_err();

    assert!(matches!(err, LaunchError::ExecutionExhausted { attempts: 2, .. }));
    assert_eq!(sleeper.slept().len(), 1);
    assert!(buffer.contents().contains("(exit -,"));
}

struct Hangs;

#[async_trait]
impl CommandRunner for Hangs {
    async fn run(&self, _command: &CommandSpec) -> std::io::Result<CommandOutput> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(CommandOutput::default())
    }
}

#[tokio::test]
async fn test_wait_for_times_out_with_warning() {
    let (executor, _, buffer) = executor(Arc::new(Hangs), 3);

    let outcome = executor
        .wait_for(
            "Wait for workload readiness",
            &CommandSpec::new("kubectl").args(["rollout", "status", "deployment/docs"]),
            Duration::from_millis(20),
        )
        .await;

    assert_eq!(outcome, WaitOutcome::TimedOut);
    let log = buffer.contents();
    assert!(log.contains("[WARN] Wait for workload readiness timed out"));
    assert!(!log.contains("[ERROR]"));
}
