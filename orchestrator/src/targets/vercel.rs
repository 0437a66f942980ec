//! Vercel target

use async_trait::async_trait;

use crate::app::state::RunContext;
use crate::artifacts::TemplateId;
use crate::errors::LaunchError;
use crate::targets::hosting::{
    build_site, ensure_config, project_command, remove_content, verify_site,
};
use crate::targets::{DeploymentTarget, TargetAdapter, VerifyReport};

pub struct Vercel;

#[async_trait]
impl TargetAdapter for Vercel {
    fn target(&self) -> DeploymentTarget {
        DeploymentTarget::Vercel
    }

    async fn deploy(&self, ctx: &RunContext) -> Result<(), LaunchError> {
        ensure_config(ctx, &ctx.config.layout.vercel_config(), TemplateId::VercelConfig).await?;
        build_site(ctx).await?;

        let mut publish = project_command(ctx, "vercel").args(["deploy", "--prod", "--yes"]);
        match &ctx.config.hosting.vercel_token {
            Some(token) => publish = publish.secret_env("VERCEL_TOKEN", token),
            None => ctx
                .log
                .warn("VERCEL_TOKEN is not set; relying on the vercel CLI login"),
        }

        ctx.executor.run_with_retry("Publish to Vercel", &publish).await?;
        ctx.log.info("Published to Vercel");
        Ok(())
    }

    async fn cleanup(&self, ctx: &RunContext) -> Result<(), LaunchError> {
        remove_content(ctx, self.target(), &ctx.config.layout.vercel_config()).await?;

        let state = ctx.config.layout.vercel_state();
        if state.delete().await? {
            ctx.log.info(format!("Removed {}", state.path().display()));
        }
        Ok(())
    }

    async fn verify(&self, ctx: &RunContext) -> Result<VerifyReport, LaunchError> {
        Ok(verify_site(ctx).await)
    }
}
