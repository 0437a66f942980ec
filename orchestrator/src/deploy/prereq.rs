//! Required external tooling per target and operation

use crate::app::options::{Operation, RunConfig};
use crate::deploy::command::CommandSpec;
use crate::deploy::executor::Executor;
use crate::errors::LaunchError;
use crate::targets::DeploymentTarget;

/// An external CLI and the arguments that prove it is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tool {
    pub name: &'static str,
    pub probe: &'static [&'static str],
}

impl Tool {
    pub const GIT: Tool = Tool { name: "git", probe: &["--version"] };
    pub const NPM: Tool = Tool { name: "npm", probe: &["--version"] };
    pub const NETLIFY: Tool = Tool { name: "netlify", probe: &["--version"] };
    pub const VERCEL: Tool = Tool { name: "vercel", probe: &["--version"] };
    pub const DOCKER: Tool = Tool { name: "docker", probe: &["--version"] };
    pub const KUBECTL: Tool = Tool { name: "kubectl", probe: &["version", "--client"] };
    pub const HELM: Tool = Tool { name: "helm", probe: &["version", "--short"] };

    fn probe_command(&self) -> CommandSpec {
        CommandSpec::new(self.name).args(self.probe.iter().copied())
    }
}

/// The tools one operation needs, checked once before any side effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prerequisites {
    target: DeploymentTarget,
    tools: Vec<Tool>,
}

impl Prerequisites {
    pub fn for_operation(target: DeploymentTarget, operation: Operation, config: &RunConfig) -> Self {
        let chart_mode = config.cluster.chart.is_some();
        let tools = match (target, operation) {
            (DeploymentTarget::GithubPages, Operation::Deploy) => vec![Tool::GIT, Tool::NPM],
            (DeploymentTarget::GithubPages, Operation::Cleanup) => vec![Tool::GIT],
            (DeploymentTarget::Netlify, Operation::Deploy) => vec![Tool::NPM, Tool::NETLIFY],
            (DeploymentTarget::Vercel, Operation::Deploy) => vec![Tool::NPM, Tool::VERCEL],
            (DeploymentTarget::Cluster, Operation::Deploy) if chart_mode => {
                vec![Tool::KUBECTL, Tool::HELM]
            }
            (DeploymentTarget::Cluster, Operation::Deploy) => vec![Tool::KUBECTL, Tool::DOCKER],
            (DeploymentTarget::Cluster, _) if chart_mode => vec![Tool::KUBECTL, Tool::HELM],
            (DeploymentTarget::Cluster, _) => vec![Tool::KUBECTL],
            _ => Vec::new(),
        };
        Self { target, tools }
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Probe every tool once; no retries
    pub async fn check(&self, executor: &Executor) -> Result<(), LaunchError> {
        let mut missing = Vec::new();
        for tool in &self.tools {
            let output = executor.query(&tool.probe_command()).await;
            if output.success() {
                executor.log().info(format!("Found prerequisite: {}", tool.name));
            } else {
                missing.push(tool.name.to_string());
            }
        }

        if missing.is_empty() {
            return Ok(());
        }
        Err(LaunchError::PrerequisiteMissing {
            target: self.target.to_string(),
            tools: missing,
        })
    }
}
