//! How a cluster release is torn down
//!
//! Every strategy treats an already-absent resource as deleted.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::app::options::RunConfig;
use crate::app::state::RunContext;
use crate::deploy::command::{CommandOutput, CommandSpec};
use crate::errors::LaunchError;
use crate::filesys::dir::Dir;

/// A namespaced cluster object; always re-queried, never cached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

impl Resource {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Parse one `kind/name` line of `kubectl get -o name`
    pub fn from_name_line(line: &str, namespace: &str) -> Option<Self> {
        let (kind, name) = line.trim().split_once('/')?;
        if kind.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(kind, name, namespace))
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} in {}", self.kind, self.name, self.namespace)
    }
}

/// kubectl `(NotFound)` or helm `release: not found` from a tool that actually ran
pub fn is_not_found(output: &CommandOutput) -> bool {
    output.exit_code.is_some()
        && (output.mentions("(notfound)") || output.mentions("release: not found"))
}

#[async_trait]
pub trait ResourceDeletionStrategy: Send + Sync {
    fn describe(&self) -> String;

    async fn delete(&self, ctx: &RunContext) -> Result<(), LaunchError>;
}

/// `kubectl delete -f <dir>`
pub struct ManifestDeletion {
    pub dir: PathBuf,
    pub namespace: String,
}

#[async_trait]
impl ResourceDeletionStrategy for ManifestDeletion {
    fn describe(&self) -> String {
        format!("manifests in {}", self.dir.display())
    }

    async fn delete(&self, ctx: &RunContext) -> Result<(), LaunchError> {
        let command = CommandSpec::new("kubectl")
            .arg("delete")
            .arg("-f")
            .arg(self.dir.to_string_lossy())
            .args(["-n", self.namespace.as_str(), "--ignore-not-found"]);
        ctx.executor
            .run_with_retry_accepting("Delete manifest resources", &command, is_not_found)
            .await?;
        Ok(())
    }
}

/// Delete each resource by name
pub struct NamedDeletion {
    pub resources: Vec<Resource>,
}

#[async_trait]
impl ResourceDeletionStrategy for NamedDeletion {
    fn describe(&self) -> String {
        let names: Vec<String> = self
            .resources
            .iter()
            .map(|r| format!("{}/{}", r.kind, r.name))
            .collect();
        names.join(", ")
    }

    async fn delete(&self, ctx: &RunContext) -> Result<(), LaunchError> {
        for resource in &self.resources {
            let command = CommandSpec::new("kubectl").args([
                "delete",
                resource.kind.as_str(),
                resource.name.as_str(),
                "-n",
                resource.namespace.as_str(),
                "--ignore-not-found",
            ]);
            ctx.executor
                .run_with_retry_accepting(
                    &format!("Delete {}/{}", resource.kind, resource.name),
                    &command,
                    is_not_found,
                )
                .await?;
        }
        Ok(())
    }
}

/// `helm uninstall <release>`
pub struct HelmReleaseDeletion {
    pub release: String,
    pub namespace: String,
}

#[async_trait]
impl ResourceDeletionStrategy for HelmReleaseDeletion {
    fn describe(&self) -> String {
        format!("helm release {}", self.release)
    }

    async fn delete(&self, ctx: &RunContext) -> Result<(), LaunchError> {
        let command = CommandSpec::new("helm").args([
            "uninstall",
            self.release.as_str(),
            "-n",
            self.namespace.as_str(),
        ]);
        ctx.executor
            .run_with_retry_accepting("Uninstall helm release", &command, is_not_found)
            .await?;
        Ok(())
    }
}

/// Resources the manifest templates create
pub fn generated_resources(config: &RunConfig) -> Vec<Resource> {
    let namespace = &config.cluster.namespace;
    vec![
        Resource::new("deployment", &config.name, namespace),
        Resource::new("service", &config.name, namespace),
        Resource::new("configmap", format!("{}-nginx", config.name), namespace),
    ]
}

const MANIFEST_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Whether `dir` holds anything `kubectl delete -f` would accept
async fn has_manifests(dir: &Dir) -> bool {
    if !dir.exists().await {
        return false;
    }
    dir.list_files().await.unwrap_or_default().iter().any(|path| {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    })
}

/// Chart release, then manifest files, then named resources
pub async fn select_strategy(config: &RunConfig) -> Box<dyn ResourceDeletionStrategy> {
    let namespace = config.cluster.namespace.clone();
    if config.cluster.chart.is_some() {
        return Box::new(HelmReleaseDeletion {
            release: config.cluster.release.clone(),
            namespace,
        });
    }

    let manifests = config.layout.manifests();
    if has_manifests(&manifests).await {
        return Box::new(ManifestDeletion {
            dir: manifests.path().to_path_buf(),
            namespace,
        });
    }

    Box::new(NamedDeletion {
        resources: generated_resources(config),
    })
}
