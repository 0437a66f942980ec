//! Netlify target

use async_trait::async_trait;

use crate::app::state::RunContext;
use crate::artifacts::TemplateId;
use crate::errors::LaunchError;
use crate::targets::hosting::{
    build_dir_arg, build_site, ensure_config, project_command, remove_content, verify_site,
};
use crate::targets::{DeploymentTarget, TargetAdapter, VerifyReport};

pub struct Netlify;

#[async_trait]
impl TargetAdapter for Netlify {
    fn target(&self) -> DeploymentTarget {
        DeploymentTarget::Netlify
    }

    async fn deploy(&self, ctx: &RunContext) -> Result<(), LaunchError> {
        ensure_config(ctx, &ctx.config.layout.netlify_config(), TemplateId::NetlifyConfig).await?;
        build_site(ctx).await?;

        let hosting = &ctx.config.hosting;
        let mut publish = project_command(ctx, "netlify").args([
            "deploy".to_string(),
            "--prod".to_string(),
            "--dir".to_string(),
            build_dir_arg(ctx),
        ]);
        if let Some(site_id) = &hosting.netlify_site_id {
            publish = publish.args(["--site", site_id.as_str()]);
        }
        match &hosting.netlify_token {
            Some(token) => publish = publish.secret_env("NETLIFY_AUTH_TOKEN", token),
            None => ctx
                .log
                .warn("NETLIFY_AUTH_TOKEN is not set; relying on the netlify CLI login"),
        }

        ctx.executor.run_with_retry("Publish to Netlify", &publish).await?;
        ctx.log.info("Published to Netlify");
        Ok(())
    }

    async fn cleanup(&self, ctx: &RunContext) -> Result<(), LaunchError> {
        remove_content(ctx, self.target(), &ctx.config.layout.netlify_config()).await?;

        let state = ctx.config.layout.netlify_state();
        if state.delete().await? {
            ctx.log.info(format!("Removed {}", state.path().display()));
        }
        Ok(())
    }

    async fn verify(&self, ctx: &RunContext) -> Result<VerifyReport, LaunchError> {
        Ok(verify_site(ctx).await)
    }
}
