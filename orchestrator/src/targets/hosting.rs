//! Steps shared by the static hosting targets

use crate::app::options::is_project_subpath;
use crate::app::state::RunContext;
use crate::artifacts::{GeneratedArtifact, TemplateId};
use crate::deploy::command::CommandSpec;
use crate::errors::LaunchError;
use crate::filesys::file::File;
use crate::targets::checks::{check_build_output, check_site, VerifyReport};
use crate::targets::DeploymentTarget;

/// Build directory as passed to publishing tools, relative to the project
pub fn build_dir_arg(ctx: &RunContext) -> String {
    ctx.config
        .layout
        .build_dir
        .to_string_lossy()
        .replace('\\', "/")
}

/// A command rooted in the project directory
pub fn project_command(ctx: &RunContext, program: &str) -> CommandSpec {
    CommandSpec::new(program).current_dir(&ctx.config.layout.project_dir)
}

/// Generate the target's config file unless present
pub async fn ensure_config(
    ctx: &RunContext,
    file: &File,
    template: TemplateId,
) -> Result<GeneratedArtifact, LaunchError> {
    ctx.artifacts
        .ensure(file, template, &ctx.template_params())
        .await
}

/// `npm run build` when the project has a `package.json`
pub async fn build_site(ctx: &RunContext) -> Result<(), LaunchError> {
    let package_json = ctx.config.layout.package_json();
    if !package_json.exists().await {
        ctx.log.info(format!(
            "No package.json in {}, skipping build",
            ctx.config.layout.project_dir.display()
        ));
        return Ok(());
    }

    let command = project_command(ctx, "npm").args(["run", "build"]);
    ctx.executor.run_with_retry("Build site", &command).await?;
    Ok(())
}

/// Confirm, then remove the config file and build output unless
/// `keep_content` is set
///
/// Refuses outright when the build directory is not strictly below the
/// project root.
pub async fn remove_content(
    ctx: &RunContext,
    target: DeploymentTarget,
    config_file: &File,
) -> Result<(), LaunchError> {
    let layout = &ctx.config.layout;
    if !is_project_subpath(&layout.build_dir) {
        return Err(LaunchError::Config(format!(
            "refusing to remove build output '{}': not below {}",
            layout.build_dir.display(),
            layout.project_dir.display()
        )));
    }

    let prompt = format!(
        "Remove {} deployment files from {}?",
        target,
        ctx.config.layout.project_dir.display()
    );
    ctx.gate.require(&prompt, ctx.force())?;

    if ctx.config.flags.keep_content {
        ctx.log.info(format!(
            "Keeping {} and build output (keep content)",
            config_file.path().display()
        ));
        return Ok(());
    }

    ctx.artifacts.remove(config_file).await?;
    let build = ctx.config.layout.build_output();
    if build.delete().await? {
        ctx.log
            .info(format!("Removed build output {}", build.path().display()));
    }
    Ok(())
}

/// Build output check, plus the public site when a URL is configured
pub async fn verify_site(ctx: &RunContext) -> VerifyReport {
    let mut report = VerifyReport::new();
    check_build_output(&mut report, &ctx.config.layout.build_output()).await;
    match &ctx.config.hosting.site_url {
        Some(url) => check_site(&mut report, url).await,
        None => ctx.log.info("No site URL configured, skipping the site check"),
    }
    report
}
