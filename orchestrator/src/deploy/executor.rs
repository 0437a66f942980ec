//! Command executor with bounded retries and linear backoff

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::deploy::command::{CommandOutput, CommandRunner, CommandSpec, ExecutionAttempt};
use crate::errors::LaunchError;
use crate::logs::RunLog;

/// Pauses between retry attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry budget for fallible commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_retries: u32,

    /// Unit of the linear backoff
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt `attempt` (1-based): `base * attempt`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }
}

/// Result of a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    TimedOut,
    Failed,
}

/// Runs external commands on behalf of the target adapters
#[derive(Clone)]
pub struct Executor {
    runner: Arc<dyn CommandRunner>,
    sleeper: Arc<dyn Sleeper>,
    log: Arc<RunLog>,
    policy: RetryPolicy,
}

impl Executor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        sleeper: Arc<dyn Sleeper>,
        log: Arc<RunLog>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            runner,
            sleeper,
            log,
            policy,
        }
    }

    pub fn log(&self) -> &Arc<RunLog> {
        &self.log
    }

    /// Run `command` until it exits 0 or the retry budget is spent
    pub async fn run_with_retry(
        &self,
        description: &str,
        command: &CommandSpec,
    ) -> Result<CommandOutput, LaunchError> {
        self.run_with_retry_accepting(description, command, |_| false).await
    }

    /// Like [`Executor::run_with_retry`], but outputs matched by `accept`
    /// also count as success
    pub async fn run_with_retry_accepting<F>(
        &self,
        description: &str,
        command: &CommandSpec,
        accept: F,
    ) -> Result<CommandOutput, LaunchError>
    where
        F: Fn(&CommandOutput) -> bool + Send + Sync,
    {
        let max_retries = self.policy.max_retries.max(1);
        self.log.info(format!("{}: {}", description, command));

        for attempt in 1..=max_retries {
            let started_at = Utc::now();
            let output = self.attempt(command).await;

            if output.success() || accept(&output) {
                if !output.success() {
                    self.log.info(format!(
                        "{}: accepted exit {} as success",
                        description,
                        output.exit_code.unwrap_or(-1)
                    ));
                }
                return Ok(output);
            }

            let record = ExecutionAttempt::from_output(attempt, command, started_at, &output);
            self.log.attempt(&record, max_retries);

            if attempt < max_retries {
                let delay = self.policy.delay_after(attempt);
                self.log
                    .info(format!("{}: retrying in {}s", description, delay.as_secs()));
                self.sleeper.sleep(delay).await;
            }
        }

        self.log.error(format!(
            "{} failed after {} attempt(s)",
            description, max_retries
        ));
        Err(LaunchError::ExecutionExhausted {
            description: description.to_string(),
            attempts: max_retries,
        })
    }

    /// Exactly one attempt, for fallback paths
    pub async fn run_once(
        &self,
        description: &str,
        command: &CommandSpec,
    ) -> Result<CommandOutput, LaunchError> {
        self.log.info(format!("{}: {}", description, command));
        let started_at = Utc::now();
        let output = self.attempt(command).await;
        if output.success() {
            return Ok(output);
        }

        let record = ExecutionAttempt::from_output(1, command, started_at, &output);
        self.log.attempt(&record, 1);
        self.log.error(format!("{} failed", description));
        Err(LaunchError::ExecutionExhausted {
            description: description.to_string(),
            attempts: 1,
        })
    }

    /// One attempt whose output is returned as-is, for read-only queries
    pub async fn query(&self, command: &CommandSpec) -> CommandOutput {
        self.attempt(command).await
    }

    /// Block on `command` for at most `timeout`; never fails the run
    pub async fn wait_for(
        &self,
        description: &str,
        command: &CommandSpec,
        timeout: Duration,
    ) -> WaitOutcome {
        self.log.info(format!(
            "{} (timeout {}s): {}",
            description,
            timeout.as_secs(),
            command
        ));

        match tokio::time::timeout(timeout, self.runner.run(command)).await {
            Ok(Ok(output)) if output.success() => {
                self.log.info(format!("{}: ready", description));
                WaitOutcome::Ready
            }
            Ok(Ok(output)) => {
                let record = ExecutionAttempt::from_output(1, command, Utc::now(), &output);
                self.log.attempt(&record, 1);
                self.log.warn(format!(
                    "{} did not report ready; the cluster may still converge",
                    description
                ));
                WaitOutcome::Failed
            }
            Ok(Err(e)) => {
                self.log
                    .warn(format!("{}: could not run `{}`: {}", description, command, e));
                WaitOutcome::Failed
            }
            Err(_) => {
                self.log.warn(format!(
                    "{} timed out after {}s; the cluster may still converge",
                    description,
                    timeout.as_secs()
                ));
                WaitOutcome::TimedOut
            }
        }
    }

    async fn attempt(&self, command: &CommandSpec) -> CommandOutput {
        debug!("Running `{}`", command);
        match self.runner.run(command).await {
            Ok(output) => {
                debug!("`{}` exited with {:?}", command.program(), output.exit_code);
                output
            }
            Err(e) => CommandOutput {
                exit_code: None,
                stdout: String::new(),
                stderr: format!("failed to spawn {}: {}", command.program(), e),
            },
        }
    }
}
