//! GitHub Pages target

use async_trait::async_trait;

use crate::app::state::RunContext;
use crate::artifacts::TemplateId;
use crate::deploy::command::CommandOutput;
use crate::errors::LaunchError;
use crate::targets::hosting::{
    build_dir_arg, build_site, ensure_config, project_command, remove_content, verify_site,
};
use crate::targets::{DeploymentTarget, TargetAdapter, VerifyReport};

pub struct GithubPages;

/// `git branch -D` on a branch that does not exist
fn is_missing_branch(output: &CommandOutput) -> bool {
    output.exit_code.is_some() && output.mentions("error: branch") && output.mentions("not found")
}

impl GithubPages {
    /// `git subtree` publish, tried exactly once when `gh-pages` gives up
    async fn publish_with_subtree(&self, ctx: &RunContext) -> Result<(), LaunchError> {
        let branch = &ctx.config.hosting.branch;
        ctx.log.warn(format!(
            "gh-pages publish failed, falling back to git subtree on {}",
            branch
        ));

        let split = project_command(ctx, "git").args([
            "subtree",
            "split",
            "--prefix",
            build_dir_arg(ctx).as_str(),
        ]);
        let output = ctx.executor.run_once("Split build output", &split).await?;
        let commit = output.stdout.trim();
        if commit.is_empty() {
            ctx.log.error("git subtree split printed no commit");
            return Err(LaunchError::ExecutionExhausted {
                description: "Split build output".to_string(),
                attempts: 1,
            });
        }

        let refspec = format!("{}:refs/heads/{}", commit, branch);
        let push = project_command(ctx, "git").args(["push", "--force", "origin", refspec.as_str()]);
        ctx.executor.run_once("Push pages branch", &push).await?;
        Ok(())
    }
}

#[async_trait]
impl TargetAdapter for GithubPages {
    fn target(&self) -> DeploymentTarget {
        DeploymentTarget::GithubPages
    }

    async fn deploy(&self, ctx: &RunContext) -> Result<(), LaunchError> {
        ensure_config(ctx, &ctx.config.layout.pages_workflow(), TemplateId::PagesWorkflow).await?;
        build_site(ctx).await?;

        let publish = project_command(ctx, "npx").args([
            "gh-pages",
            "--dist",
            build_dir_arg(ctx).as_str(),
            "--branch",
            ctx.config.hosting.branch.as_str(),
        ]);
        match ctx.executor.run_with_retry("Publish to GitHub Pages", &publish).await {
            Ok(_) => {}
            Err(LaunchError::ExecutionExhausted { .. }) => self.publish_with_subtree(ctx).await?,
            Err(e) => return Err(e),
        }

        ctx.log.info(format!(
            "Published {} to branch {}",
            build_dir_arg(ctx),
            ctx.config.hosting.branch
        ));
        Ok(())
    }

    async fn cleanup(&self, ctx: &RunContext) -> Result<(), LaunchError> {
        let workflow = ctx.config.layout.pages_workflow();
        remove_content(ctx, self.target(), &workflow).await?;

        ctx.artifacts.remove(&workflow).await?;
        let delete_branch =
            project_command(ctx, "git").args(["branch", "-D", ctx.config.hosting.branch.as_str()]);
        ctx.executor
            .run_with_retry_accepting("Delete local pages branch", &delete_branch, is_missing_branch)
            .await?;
        Ok(())
    }

    async fn verify(&self, ctx: &RunContext) -> Result<VerifyReport, LaunchError> {
        Ok(verify_site(ctx).await)
    }
}
