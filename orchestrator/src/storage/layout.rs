//! Where each target keeps its files inside the project

use std::path::{Path, PathBuf};

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// File layout of one project
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    /// Project root; every relative path resolves against it
    pub project_dir: PathBuf,

    /// Site build output, relative to the project
    pub build_dir: PathBuf,

    /// Cluster manifest directory
    pub manifest_dir: PathBuf,

    /// Rollback backup directory
    pub backup_dir: PathBuf,
}

impl ProjectLayout {
    /// Create a layout with the default manifest and backup locations
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        Self {
            manifest_dir: project_dir.join("k8s"),
            backup_dir: project_dir.join("backups"),
            build_dir: PathBuf::from("build"),
            project_dir,
        }
    }

    /// Resolve `path` against the project root unless already absolute
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }

    pub fn package_json(&self) -> File {
        File::new(self.project_dir.join("package.json"))
    }

    pub fn build_output(&self) -> Dir {
        Dir::new(self.resolve(&self.build_dir))
    }

    /// GitHub Pages workflow
    pub fn pages_workflow(&self) -> File {
        File::new(
            self.project_dir
                .join(".github")
                .join("workflows")
                .join("deploy-docs.yml"),
        )
    }

    pub fn netlify_config(&self) -> File {
        File::new(self.project_dir.join("netlify.toml"))
    }

    /// Local site link written by the netlify CLI
    pub fn netlify_state(&self) -> Dir {
        Dir::new(self.project_dir.join(".netlify"))
    }

    pub fn vercel_config(&self) -> File {
        File::new(self.project_dir.join("vercel.json"))
    }

    /// Local project link written by the vercel CLI
    pub fn vercel_state(&self) -> Dir {
        Dir::new(self.project_dir.join(".vercel"))
    }

    pub fn dockerfile(&self) -> File {
        File::new(self.project_dir.join("Dockerfile"))
    }

    pub fn manifests(&self) -> Dir {
        Dir::new(self.resolve(&self.manifest_dir))
    }

    pub fn deployment_manifest(&self) -> File {
        self.manifests().file("deployment.yaml")
    }

    pub fn service_manifest(&self) -> File {
        self.manifests().file("service.yaml")
    }

    pub fn configmap_manifest(&self) -> File {
        self.manifests().file("configmap.yaml")
    }

    pub fn backups(&self) -> Dir {
        Dir::new(self.resolve(&self.backup_dir))
    }
}

impl Default for ProjectLayout {
    fn default() -> Self {
        Self::new(".")
    }
}
