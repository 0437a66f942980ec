//! Per-invocation state shared by the dispatcher and the target adapters

use std::sync::Arc;

use crate::app::options::RunConfig;
use crate::artifacts::{ArtifactGenerator, TemplateParams};
use crate::deploy::command::{CommandRunner, ProcessRunner};
use crate::deploy::executor::{Executor, Sleeper, TokioSleeper};
use crate::logs::RunLog;
use crate::prompt::{ConfirmationGate, Prompter, StdinPrompter};

/// Side-effecting collaborators, injected so tests can substitute fakes
#[derive(Clone)]
pub struct Services {
    pub runner: Arc<dyn CommandRunner>,
    pub sleeper: Arc<dyn Sleeper>,
    pub prompter: Arc<dyn Prompter>,
    pub log: Arc<RunLog>,
}

impl Services {
    /// Real processes, real sleeps, stdin prompts
    pub fn system(log: Arc<RunLog>) -> Self {
        Self {
            runner: Arc::new(ProcessRunner),
            sleeper: Arc::new(TokioSleeper),
            prompter: Arc::new(StdinPrompter),
            log,
        }
    }
}

/// Everything one operation needs
pub struct RunContext {
    pub config: RunConfig,
    pub log: Arc<RunLog>,
    pub executor: Executor,
    pub gate: ConfirmationGate,
    pub artifacts: ArtifactGenerator,
}

impl RunContext {
    pub fn new(config: RunConfig, services: Services) -> Self {
        let executor = Executor::new(
            services.runner,
            services.sleeper,
            services.log.clone(),
            config.retry,
        );
        let gate = ConfirmationGate::new(services.prompter, services.log.clone());
        let artifacts = ArtifactGenerator::new(services.log.clone());

        Self {
            config,
            log: services.log,
            executor,
            gate,
            artifacts,
        }
    }

    pub fn template_params(&self) -> TemplateParams {
        TemplateParams::from_config(&self.config)
    }

    pub fn force(&self) -> bool {
        self.config.flags.force
    }
}
