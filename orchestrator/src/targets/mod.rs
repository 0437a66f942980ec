//! Deployment targets
//!
//! Each target implements [`TargetAdapter`]; the dispatcher picks one with
//! [`adapter_for`] and never branches on the target itself.

pub mod checks;
pub mod cluster;
pub mod deletion;
pub mod github_pages;
pub mod hosting;
pub mod netlify;
pub mod vercel;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::app::state::RunContext;
use crate::errors::LaunchError;
use crate::rollback::RollbackReport;

pub use checks::{CheckResult, VerifyReport};

/// Where a run deploys to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeploymentTarget {
    GithubPages,
    Netlify,
    Vercel,
    Cluster,
}

impl FromStr for DeploymentTarget {
    type Err = LaunchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "github-pages" | "gh-pages" | "github" => Ok(DeploymentTarget::GithubPages),
            "netlify" => Ok(DeploymentTarget::Netlify),
            "vercel" => Ok(DeploymentTarget::Vercel),
            "cluster" | "k8s" | "kubernetes" => Ok(DeploymentTarget::Cluster),
            other => Err(LaunchError::Config(format!(
                "Unknown deployment target '{}' (expected github-pages, netlify, vercel or cluster)",
                other
            ))),
        }
    }
}

impl fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentTarget::GithubPages => "github-pages",
            DeploymentTarget::Netlify => "netlify",
            DeploymentTarget::Vercel => "vercel",
            DeploymentTarget::Cluster => "cluster",
        };
        f.write_str(name)
    }
}

/// Lifecycle operations of one target
#[async_trait]
pub trait TargetAdapter: Send + Sync {
    fn target(&self) -> DeploymentTarget;

    /// Generate missing artifacts, build and publish
    async fn deploy(&self, ctx: &RunContext) -> Result<(), LaunchError>;

    /// Remove what `deploy` created, behind the confirmation gate
    async fn cleanup(&self, ctx: &RunContext) -> Result<(), LaunchError>;

    /// Post-deploy health checks
    async fn verify(&self, ctx: &RunContext) -> Result<VerifyReport, LaunchError>;

    async fn rollback(&self, _ctx: &RunContext) -> Result<RollbackReport, LaunchError> {
        Err(LaunchError::Config(format!(
            "rollback is only supported for the cluster target, not {}",
            self.target()
        )))
    }
}

/// Create the adapter for `target`
pub fn adapter_for(target: DeploymentTarget) -> Arc<dyn TargetAdapter> {
    match target {
        DeploymentTarget::GithubPages => Arc::new(github_pages::GithubPages),
        DeploymentTarget::Netlify => Arc::new(netlify::Netlify),
        DeploymentTarget::Vercel => Arc::new(vercel::Vercel),
        DeploymentTarget::Cluster => Arc::new(cluster::Cluster),
    }
}
