//! Operation dispatch

use std::sync::Arc;

use crate::app::options::Operation;
use crate::app::state::RunContext;
use crate::deploy::prereq::Prerequisites;
use crate::errors::LaunchError;
use crate::logs::RunLog;
use crate::targets::adapter_for;

/// How an operation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Cancelled,
    Failed { code: i32, message: String },
}

/// Logs the final ERROR line on every exit path, unwinding included
///
/// It records; it never undoes work.
pub struct ExitGuard {
    log: Arc<RunLog>,
    label: String,
    outcome: Option<Outcome>,
}

impl ExitGuard {
    pub fn new(log: Arc<RunLog>, label: impl Into<String>) -> Self {
        Self {
            log,
            label: label.into(),
            outcome: None,
        }
    }

    pub fn finish(&mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        match &self.outcome {
            Some(Outcome::Success) | Some(Outcome::Cancelled) => {}
            Some(Outcome::Failed { code, message }) => {
                self.log
                    .error(format!("{} failed with exit code {}: {}", self.label, code, message));
            }
            None => {
                self.log
                    .error(format!("{} ended without an outcome (internal error)", self.label));
            }
        }
    }
}

/// Run `operation` for the configured target
pub async fn dispatch(operation: Operation, ctx: &RunContext) -> Result<(), LaunchError> {
    let target = ctx.config.target;
    let mut guard = ExitGuard::new(ctx.log.clone(), format!("{} {}", operation, target));

    let result = execute(operation, ctx).await;
    match &result {
        Ok(()) => {
            ctx.log.info(format!("{} {} completed", operation, target));
            guard.finish(Outcome::Success);
        }
        Err(e) if e.is_cancelled() => {
            ctx.log.info(format!("{} {} cancelled by operator", operation, target));
            guard.finish(Outcome::Cancelled);
        }
        Err(e) => guard.finish(Outcome::Failed {
            code: e.exit_code(),
            message: e.to_string(),
        }),
    }
    result
}

async fn execute(operation: Operation, ctx: &RunContext) -> Result<(), LaunchError> {
    let config = &ctx.config;
    ctx.log.info(format!(
        "Starting {} for {} in {}",
        operation,
        config.target,
        config.project_dir().display()
    ));

    Prerequisites::for_operation(config.target, operation, config)
        .check(&ctx.executor)
        .await?;

    let adapter = adapter_for(config.target);
    match operation {
        Operation::Deploy => adapter.deploy(ctx).await,
        Operation::Cleanup => adapter.cleanup(ctx).await,
        Operation::Rollback => adapter.rollback(ctx).await.map(|_| ()),
        Operation::Verify => {
            let report = adapter.verify(ctx).await?;
            report.conclude(&ctx.log)
        }
    }
}
