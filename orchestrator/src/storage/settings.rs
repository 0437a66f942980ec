//! Optional JSON settings file
//!
//! Sits between the built-in defaults and the environment. Every field is
//! optional; absent fields fall through to the next layer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::LaunchError;
use crate::filesys::file::File;

/// Settings file contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub target: Option<String>,
    pub project_dir: Option<PathBuf>,
    pub build_dir: Option<PathBuf>,
    pub name: Option<String>,
    pub log_file: Option<PathBuf>,
    pub verbose: Option<bool>,

    /// Retry and wait behaviour
    pub retry: RetrySettings,

    /// Static hosting targets
    pub hosting: HostingSettings,

    /// Cluster target
    pub cluster: ClusterSettings,

    /// Rollback backups
    pub backup: BackupSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: Option<u32>,
    pub backoff_base_secs: Option<u64>,
    pub rollout_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostingSettings {
    pub branch: Option<String>,
    pub site_url: Option<String>,
    pub netlify_site_id: Option<String>,
    pub node_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    pub namespace: Option<String>,
    pub release: Option<String>,
    pub image: Option<String>,
    pub image_tag: Option<String>,
    pub port: Option<u16>,
    pub replicas: Option<u32>,
    pub chart: Option<String>,
    pub chart_repo: Option<String>,
    pub dump_command: Option<String>,
    pub manifest_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    pub dir: Option<PathBuf>,
    pub keep: Option<u32>,
}

impl Settings {
    /// Read a settings file; a missing file is a configuration error
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, LaunchError> {
        let file = File::new(path);
        if !file.exists().await {
            return Err(LaunchError::Config(format!(
                "Settings file not found: {}",
                file.path().display()
            )));
        }
        file.read_json::<Settings>().await.map_err(|e| {
            LaunchError::Config(format!(
                "Invalid settings file {}: {}",
                file.path().display(),
                e
            ))
        })
    }
}
