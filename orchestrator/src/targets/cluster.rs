//! Kubernetes cluster target
//!
//! Manifest mode builds an nginx image locally and applies generated
//! manifests. Chart mode installs a Helm chart, which is how brokers and
//! databases are deployed.

use async_trait::async_trait;

use crate::app::state::RunContext;
use crate::artifacts::TemplateId;
use crate::deploy::command::{CommandOutput, CommandSpec};
use crate::deploy::executor::WaitOutcome;
use crate::errors::LaunchError;
use crate::rollback::{self, RollbackReport};
use crate::targets::deletion::{is_not_found, select_strategy};
use crate::targets::{DeploymentTarget, TargetAdapter, VerifyReport};

/// Namespaces that are never deleted
pub const PROTECTED_NAMESPACES: &[&str] =
    &["default", "kube-system", "kube-public", "kube-node-lease"];

pub fn is_protected_namespace(namespace: &str) -> bool {
    PROTECTED_NAMESPACES.contains(&namespace)
}

fn already_exists(output: &CommandOutput) -> bool {
    output.exit_code.is_some()
        && (output.mentions("alreadyexists") || output.mentions("already exists"))
}

pub fn kubectl<I, S>(args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandSpec::new("kubectl").args(args)
}

/// Create the namespace, or do nothing when it exists
pub async fn ensure_namespace(ctx: &RunContext) -> Result<(), LaunchError> {
    let namespace = ctx.config.cluster.namespace.as_str();
    let command = kubectl(["create", "namespace", namespace]);
    let output = ctx
        .executor
        .run_with_retry_accepting(&format!("Ensure namespace {}", namespace), &command, already_exists)
        .await?;
    if !output.success() {
        ctx.log
            .info(format!("Namespace {} already exists", namespace));
    }
    Ok(())
}

/// Delete the namespace unless it is protected
pub async fn delete_namespace(ctx: &RunContext) -> Result<bool, LaunchError> {
    let namespace = ctx.config.cluster.namespace.as_str();
    if is_protected_namespace(namespace) {
        ctx.log
            .warn(format!("Refusing to delete protected namespace {}", namespace));
        return Ok(false);
    }

    let command = kubectl(["delete", "namespace", namespace, "--ignore-not-found"]);
    ctx.executor
        .run_with_retry_accepting(&format!("Delete namespace {}", namespace), &command, is_not_found)
        .await?;
    Ok(true)
}

/// Repository alias for a `repo/chart` reference
fn chart_repo_name(chart: &str, release: &str) -> String {
    match chart.split_once('/') {
        Some((repo, _)) if !repo.is_empty() => repo.to_string(),
        _ => release.to_string(),
    }
}

pub struct Cluster;

impl Cluster {
    async fn build_image(&self, ctx: &RunContext) -> Result<(), LaunchError> {
        let layout = &ctx.config.layout;
        ctx.artifacts
            .ensure(&layout.dockerfile(), TemplateId::Dockerfile, &ctx.template_params())
            .await?;

        let command = CommandSpec::new("docker")
            .args(["build", "-t"])
            .arg(ctx.config.cluster.image_ref())
            .arg(layout.project_dir.to_string_lossy())
            .current_dir(&layout.project_dir);
        ctx.executor.run_with_retry("Build image", &command).await?;
        Ok(())
    }

    async fn add_chart_repo(&self, ctx: &RunContext, chart: &str) -> Result<(), LaunchError> {
        let Some(repo_url) = &ctx.config.cluster.chart_repo else {
            return Ok(());
        };

        let repo_name = chart_repo_name(chart, &ctx.config.cluster.release);
        let add = CommandSpec::new("helm").args([
            "repo",
            "add",
            repo_name.as_str(),
            repo_url.as_str(),
        ]);
        ctx.executor
            .run_with_retry_accepting("Add chart repository", &add, already_exists)
            .await?;

        let update = CommandSpec::new("helm").args(["repo", "update"]);
        ctx.executor
            .run_with_retry("Update chart repositories", &update)
            .await?;
        Ok(())
    }

    async fn apply_manifests(&self, ctx: &RunContext) -> Result<(), LaunchError> {
        let layout = &ctx.config.layout;
        let params = ctx.template_params();
        for (file, template) in [
            (layout.configmap_manifest(), TemplateId::ConfigMap),
            (layout.deployment_manifest(), TemplateId::Deployment),
            (layout.service_manifest(), TemplateId::Service),
        ] {
            ctx.artifacts.ensure(&file, template, &params).await?;
        }

        let command = kubectl(["apply", "-f"])
            .arg(layout.manifests().path().to_string_lossy())
            .args(["-n", ctx.config.cluster.namespace.as_str()]);
        ctx.executor.run_with_retry("Apply manifests", &command).await?;
        Ok(())
    }

    async fn install_chart(&self, ctx: &RunContext, chart: &str) -> Result<(), LaunchError> {
        let cluster = &ctx.config.cluster;
        let command = CommandSpec::new("helm").args([
            "upgrade",
            "--install",
            cluster.release.as_str(),
            chart,
            "-n",
            cluster.namespace.as_str(),
        ]);
        ctx.executor.run_with_retry("Install chart", &command).await?;
        Ok(())
    }

    async fn wait_ready(&self, ctx: &RunContext) -> WaitOutcome {
        let cluster = &ctx.config.cluster;
        let timeout = ctx.config.rollout_timeout;
        let timeout_arg = format!("--timeout={}s", timeout.as_secs());

        let command = if cluster.chart.is_some() {
            kubectl([
                "wait".to_string(),
                "--for=condition=ready".to_string(),
                "pod".to_string(),
                "-l".to_string(),
                cluster.selector(),
                "-n".to_string(),
                cluster.namespace.clone(),
                timeout_arg,
            ])
        } else {
            kubectl([
                "rollout".to_string(),
                "status".to_string(),
                format!("deployment/{}", ctx.config.name),
                "-n".to_string(),
                cluster.namespace.clone(),
                timeout_arg,
            ])
        };
        ctx.executor
            .wait_for("Wait for workload readiness", &command, timeout)
            .await
    }

    async fn remove_generated(&self, ctx: &RunContext) -> Result<(), LaunchError> {
        let layout = &ctx.config.layout;
        for file in [
            layout.dockerfile(),
            layout.deployment_manifest(),
            layout.service_manifest(),
            layout.configmap_manifest(),
        ] {
            ctx.artifacts.remove(&file).await?;
        }

        let manifests = layout.manifests();
        if manifests.remove_if_empty().await? {
            ctx.log
                .info(format!("Removed empty {}", manifests.path().display()));
        }
        Ok(())
    }

    async fn check_pods(&self, ctx: &RunContext, report: &mut VerifyReport) {
        let cluster = &ctx.config.cluster;
        let command = kubectl([
            "get".to_string(),
            "pods".to_string(),
            "-n".to_string(),
            cluster.namespace.clone(),
            "-l".to_string(),
            cluster.selector(),
            "-o".to_string(),
            "jsonpath={.items[*].status.phase}".to_string(),
        ]);
        let output = ctx.executor.query(&command).await;
        if !output.success() {
            report.record(
                "pods running",
                false,
                crate::deploy::command::tail(&output.stderr, 1),
            );
            return;
        }

        let phases: Vec<&str> = output.stdout.split_whitespace().collect();
        let running = phases.iter().filter(|p| **p == "Running").count();
        report.record(
            "pods running",
            running > 0,
            format!("{} of {} running", running, phases.len()),
        );
    }

    async fn check_service(&self, ctx: &RunContext, report: &mut VerifyReport) {
        let command = kubectl([
            "get",
            "service",
            ctx.config.name.as_str(),
            "-n",
            ctx.config.cluster.namespace.as_str(),
            "-o",
            "name",
        ]);
        let output = ctx.executor.query(&command).await;
        let detail = if output.success() {
            output.stdout.trim().to_string()
        } else {
            crate::deploy::command::tail(&output.stderr, 1)
        };
        report.record(format!("service {}", ctx.config.name), output.success(), detail);
    }
}

#[async_trait]
impl TargetAdapter for Cluster {
    fn target(&self) -> DeploymentTarget {
        DeploymentTarget::Cluster
    }

    async fn deploy(&self, ctx: &RunContext) -> Result<(), LaunchError> {
        let chart = ctx.config.cluster.chart.clone();

        match &chart {
            Some(chart) => self.add_chart_repo(ctx, chart).await?,
            None => self.build_image(ctx).await?,
        }

        ensure_namespace(ctx).await?;

        match &chart {
            Some(chart) => self.install_chart(ctx, chart).await?,
            None => self.apply_manifests(ctx).await?,
        }

        if self.wait_ready(ctx).await == WaitOutcome::Ready {
            ctx.log.info(format!(
                "Release {} is ready in namespace {}",
                ctx.config.cluster.release, ctx.config.cluster.namespace
            ));
        }
        Ok(())
    }

    async fn cleanup(&self, ctx: &RunContext) -> Result<(), LaunchError> {
        let cluster = &ctx.config.cluster;
        let strategy = select_strategy(&ctx.config).await;
        let prompt = format!(
            "Delete {} from namespace {}?",
            strategy.describe(),
            cluster.namespace
        );
        ctx.gate.require(&prompt, ctx.force())?;

        strategy.delete(ctx).await?;

        if ctx.config.flags.keep_content {
            ctx.log
                .info("Keeping generated Dockerfile and manifests (keep content)");
        } else {
            self.remove_generated(ctx).await?;
        }

        if ctx.config.flags.delete_namespace {
            if is_protected_namespace(&cluster.namespace) {
                ctx.log.warn(format!(
                    "Refusing to delete protected namespace {}",
                    cluster.namespace
                ));
                return Ok(());
            }
            let prompt = format!(
                "Delete namespace {} and everything left in it?",
                cluster.namespace
            );
            ctx.gate.require(&prompt, ctx.force())?;
            delete_namespace(ctx).await?;
        }
        Ok(())
    }

    async fn verify(&self, ctx: &RunContext) -> Result<VerifyReport, LaunchError> {
        let mut report = VerifyReport::new();
        self.check_pods(ctx, &mut report).await;
        if ctx.config.cluster.chart.is_none() {
            self.check_service(ctx, &mut report).await;
        }
        Ok(report)
    }

    async fn rollback(&self, ctx: &RunContext) -> Result<RollbackReport, LaunchError> {
        rollback::run(ctx).await
    }
}
