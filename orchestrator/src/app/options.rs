//! Run configuration
//!
//! Resolved once at startup from, lowest precedence first: built-in defaults,
//! the optional settings file, the environment, and command line flags.

use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::app::args::CliArgs;
use crate::deploy::executor::RetryPolicy;
use crate::errors::LaunchError;
use crate::storage::layout::ProjectLayout;
use crate::storage::settings::Settings;
use crate::targets::DeploymentTarget;

/// Default log file name, inside the project directory
pub const DEFAULT_LOG_FILE: &str = ".launchpad-deploy.log";

/// Lifecycle operation requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Deploy,
    Cleanup,
    Rollback,
    Verify,
}

impl FromStr for Operation {
    type Err = LaunchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deploy" => Ok(Operation::Deploy),
            "cleanup" | "destroy" => Ok(Operation::Cleanup),
            "rollback" => Ok(Operation::Rollback),
            "verify" => Ok(Operation::Verify),
            other => Err(LaunchError::Config(format!(
                "Unknown operation '{}' (expected deploy, cleanup, rollback or verify)",
                other
            ))),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Deploy => "deploy",
            Operation::Cleanup => "cleanup",
            Operation::Rollback => "rollback",
            Operation::Verify => "verify",
        };
        f.write_str(name)
    }
}

/// Operator switches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    /// Skip every confirmation prompt
    pub force: bool,

    /// Keep generated artifacts and build output on cleanup
    pub keep_content: bool,

    /// Delete the namespace on cleanup
    pub delete_namespace: bool,

    /// Delete persistent volume claims on rollback
    pub delete_data: bool,

    /// Skip the pre-rollback backup
    pub skip_backup: bool,

    /// Dump release data before a rollback even when it is kept
    pub dump_data: bool,

    /// Mirror every log entry to stderr
    pub verbose: bool,
}

/// Static hosting options
#[derive(Debug, Clone)]
pub struct HostingOptions {
    /// Branch published to GitHub Pages
    pub branch: String,

    /// Public site URL checked by `verify`
    pub site_url: Option<Url>,

    pub netlify_site_id: Option<String>,
    pub netlify_token: Option<SecretString>,
    pub vercel_token: Option<SecretString>,

    /// Node.js major version used by generated build files
    pub node_version: String,
}

impl Default for HostingOptions {
    fn default() -> Self {
        Self {
            branch: "gh-pages".to_string(),
            site_url: None,
            netlify_site_id: None,
            netlify_token: None,
            vercel_token: None,
            node_version: "20".to_string(),
        }
    }
}

/// Cluster target options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterOptions {
    pub namespace: String,

    /// Release name; also the `app.kubernetes.io/instance` label value
    pub release: String,

    pub image: String,
    pub image_tag: String,

    /// Port the workload container listens on
    pub port: u16,

    pub replicas: u32,

    /// Helm chart; when set the target runs in chart mode
    pub chart: Option<String>,

    /// Helm repository URL added before installing the chart
    pub chart_repo: Option<String>,

    /// Shell command run in the release's first pod whose stdout is the
    /// data backup, e.g. `pg_dump -U app -d app --no-owner`
    pub dump_command: Option<String>,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            release: "docs-site".to_string(),
            image: "docs-site".to_string(),
            image_tag: "latest".to_string(),
            port: 8080,
            replicas: 1,
            chart: None,
            chart_repo: None,
            dump_command: None,
        }
    }
}

impl ClusterOptions {
    /// Label selector matching everything this release owns
    pub fn selector(&self) -> String {
        format!("app.kubernetes.io/instance={}", self.release)
    }

    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.image_tag)
    }
}

/// Fully resolved, validated configuration for one invocation
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub target: DeploymentTarget,

    /// Resource name used by every target
    pub name: String,

    pub layout: ProjectLayout,
    pub retry: RetryPolicy,

    /// Bound on waiting for workload readiness
    pub rollout_timeout: Duration,

    pub flags: Flags,
    pub hosting: HostingOptions,
    pub cluster: ClusterOptions,

    /// Backups kept in the backup directory
    pub backup_keep: u32,

    pub log_file: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        let layout = ProjectLayout::default();
        Self {
            target: DeploymentTarget::GithubPages,
            name: "docs-site".to_string(),
            log_file: layout.project_dir.join(DEFAULT_LOG_FILE),
            layout,
            retry: RetryPolicy::default(),
            rollout_timeout: Duration::from_secs(300),
            flags: Flags::default(),
            hosting: HostingOptions::default(),
            cluster: ClusterOptions::default(),
            backup_keep: 10,
        }
    }
}

/// The layers a [`RunConfig`] is resolved from
pub struct ConfigSources<'a> {
    pub cli: &'a CliArgs,
    pub env: &'a HashMap<String, String>,
    pub settings: &'a Settings,
}

impl<'a> ConfigSources<'a> {
    pub fn new(cli: &'a CliArgs, env: &'a HashMap<String, String>, settings: &'a Settings) -> Self {
        Self { cli, env, settings }
    }

    /// Settings file path named on the command line or in the environment
    pub fn settings_path(cli: &CliArgs, env: &HashMap<String, String>) -> Option<PathBuf> {
        cli.get("config")
            .map(PathBuf::from)
            .or_else(|| env.get("LAUNCHPAD_CONFIG").map(PathBuf::from))
    }

    /// CLI flag, then environment variable; empty values count as unset
    fn raw(&self, flag: &str, env: &str) -> Option<String> {
        self.cli
            .get(flag)
            .map(str::to_string)
            .or_else(|| self.env.get(env).cloned())
            .filter(|v| !v.trim().is_empty())
    }

    fn string(&self, flag: &str, env: &str, settings: Option<&String>) -> Option<String> {
        self.raw(flag, env).or_else(|| settings.cloned())
    }

    fn path(&self, flag: &str, env: &str, settings: Option<&PathBuf>) -> Option<PathBuf> {
        self.raw(flag, env).map(PathBuf::from).or_else(|| settings.cloned())
    }

    fn number<T>(&self, flag: &str, env: &str, settings: Option<T>, default: T) -> Result<T, LaunchError>
    where
        T: FromStr + PartialOrd + Default + Copy + fmt::Display,
    {
        let value = match self.raw(flag, env) {
            Some(raw) => raw.trim().parse::<T>().map_err(|_| {
                LaunchError::Config(format!("--{} / {} must be a positive integer, got '{}'", flag, env, raw))
            })?,
            None => settings.unwrap_or(default),
        };
        if value <= T::default() {
            return Err(LaunchError::Config(format!(
                "--{} / {} must be a positive integer, got {}",
                flag, env, value
            )));
        }
        Ok(value)
    }

    fn switch(&self, flag: &str, env: &str, settings: Option<bool>) -> Result<bool, LaunchError> {
        match self.raw(flag, env) {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                LaunchError::Config(format!("--{} / {} must be a boolean, got '{}'", flag, env, raw))
            }),
            None => Ok(settings.unwrap_or(false)),
        }
    }

    fn project_dir(&self) -> PathBuf {
        self.path("project-dir", "PROJECT_DIR", self.settings.project_dir.as_ref())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Log file path, resolvable before the rest of the configuration so that
    /// configuration errors can be logged
    pub fn log_file(&self) -> PathBuf {
        let project_dir = self.project_dir();
        match self.path("log-file", "LOG_FILE", self.settings.log_file.as_ref()) {
            Some(path) if path.is_absolute() => path,
            Some(path) => project_dir.join(path),
            None => project_dir.join(DEFAULT_LOG_FILE),
        }
    }

    /// Lenient verbose lookup for logger setup
    pub fn verbose(&self) -> bool {
        self.switch("verbose", "VERBOSE", self.settings.verbose)
            .unwrap_or(false)
    }

    /// Lenient JSON log format lookup for logger setup
    pub fn json_logs(&self) -> bool {
        self.switch("json-logs", "LOG_JSON", None).unwrap_or(false)
    }

    /// Resolve and validate every option
    pub fn resolve(&self) -> Result<RunConfig, LaunchError> {
        let settings = self.settings;

        let target: DeploymentTarget = self
            .string("target", "DEPLOY_TARGET", settings.target.as_ref())
            .unwrap_or_else(|| "github-pages".to_string())
            .parse()?;

        let name = self
            .string("name", "APP_NAME", settings.name.as_ref())
            .unwrap_or_else(|| "docs-site".to_string());

        let mut layout = ProjectLayout::new(self.project_dir());
        if let Some(build_dir) = self.path("build-dir", "BUILD_DIR", settings.build_dir.as_ref()) {
            layout.build_dir = build_dir;
        }
        if let Some(manifest_dir) =
            self.path("manifest-dir", "MANIFEST_DIR", settings.cluster.manifest_dir.as_ref())
        {
            layout.manifest_dir = layout.resolve(&manifest_dir);
        }
        if let Some(backup_dir) = self.path("backup-dir", "BACKUP_DIR", settings.backup.dir.as_ref()) {
            layout.backup_dir = layout.resolve(&backup_dir);
        }

        let retry = RetryPolicy {
            max_retries: self.number("retries", "MAX_RETRIES", settings.retry.max_retries, 3u32)?,
            backoff_base: Duration::from_secs(self.number(
                "backoff",
                "BACKOFF_BASE",
                settings.retry.backoff_base_secs,
                5u64,
            )?),
        };
        let rollout_timeout = Duration::from_secs(self.number(
            "timeout",
            "ROLLOUT_TIMEOUT",
            settings.retry.rollout_timeout_secs,
            300u64,
        )?);

        let flags = Flags {
            force: self.switch("force", "FORCE", None)?,
            keep_content: self.switch("keep-content", "KEEP_CONTENT", None)?,
            delete_namespace: self.switch("delete-namespace", "DELETE_NAMESPACE", None)?,
            delete_data: self.switch("delete-pvc", "DELETE_PVC", None)?,
            skip_backup: self.switch("no-backup", "NO_BACKUP", None)?,
            dump_data: self.switch("dump-data", "DUMP_DATA", None)?,
            verbose: self.switch("verbose", "VERBOSE", settings.verbose)?,
        };

        let site_url = self
            .string("site-url", "SITE_URL", settings.hosting.site_url.as_ref())
            .map(|raw| parse_site_url(&raw))
            .transpose()?;

        let hosting = HostingOptions {
            branch: self
                .string("branch", "DEPLOY_BRANCH", settings.hosting.branch.as_ref())
                .unwrap_or_else(|| "gh-pages".to_string()),
            site_url,
            netlify_site_id: self.string("site-id", "NETLIFY_SITE_ID", settings.hosting.netlify_site_id.as_ref()),
            netlify_token: self.env_secret("NETLIFY_AUTH_TOKEN"),
            vercel_token: self.env_secret("VERCEL_TOKEN"),
            node_version: self
                .string("node-version", "NODE_VERSION", settings.hosting.node_version.as_ref())
                .unwrap_or_else(|| "20".to_string()),
        };

        let release = self
            .string("release", "RELEASE_NAME", settings.cluster.release.as_ref())
            .unwrap_or_else(|| name.clone());
        let cluster = ClusterOptions {
            namespace: self
                .string("namespace", "NAMESPACE", settings.cluster.namespace.as_ref())
                .unwrap_or_else(|| "default".to_string()),
            image: self
                .string("image", "IMAGE_NAME", settings.cluster.image.as_ref())
                .unwrap_or_else(|| name.clone()),
            image_tag: self
                .string("tag", "IMAGE_TAG", settings.cluster.image_tag.as_ref())
                .unwrap_or_else(|| "latest".to_string()),
            port: self.number("port", "PORT", settings.cluster.port, 8080u16)?,
            replicas: self.number("replicas", "REPLICAS", settings.cluster.replicas, 1u32)?,
            chart: self.string("chart", "HELM_CHART", settings.cluster.chart.as_ref()),
            chart_repo: self.string("chart-repo", "HELM_REPO_URL", settings.cluster.chart_repo.as_ref()),
            dump_command: self.string("dump-command", "DUMP_COMMAND", settings.cluster.dump_command.as_ref()),
            release,
        };

        let backup_keep = self.number("keep-backups", "BACKUP_KEEP", settings.backup.keep, 10u32)?;

        let config = RunConfig {
            target,
            name,
            log_file: self.log_file(),
            layout,
            retry,
            rollout_timeout,
            flags,
            hosting,
            cluster,
            backup_keep,
        };
        config.validate()?;
        Ok(config)
    }

    fn env_secret(&self, key: &str) -> Option<SecretString> {
        self.env
            .get(key)
            .filter(|v| !v.is_empty())
            .map(|v| SecretString::from(v.clone()))
    }
}

impl RunConfig {
    /// Cross-field checks that need the whole configuration
    pub fn validate(&self) -> Result<(), LaunchError> {
        if self.name.trim().is_empty() {
            return Err(LaunchError::Config("name must not be empty".to_string()));
        }

        if self.target == DeploymentTarget::Cluster {
            for (field, value) in [
                ("name", &self.name),
                ("namespace", &self.cluster.namespace),
                ("release", &self.cluster.release),
            ] {
                if !is_dns_label(value) {
                    return Err(LaunchError::Config(format!(
                        "{} '{}' is not a valid Kubernetes name (lowercase letters, digits and '-', at most 63 characters)",
                        field, value
                    )));
                }
            }
            if self.cluster.chart_repo.is_some() && self.cluster.chart.is_none() {
                return Err(LaunchError::Config(
                    "--chart-repo requires --chart".to_string(),
                ));
            }
            if self.flags.dump_data && self.cluster.dump_command.is_none() {
                return Err(LaunchError::Config(
                    "--dump-data requires --dump-command".to_string(),
                ));
            }
        }

        if !is_project_subpath(&self.layout.build_dir) {
            return Err(LaunchError::Config(format!(
                "build dir must be a directory below the project root: '{}'",
                self.layout.build_dir.display()
            )));
        }

        Ok(())
    }

    pub fn project_dir(&self) -> &Path {
        &self.layout.project_dir
    }
}

/// `1/true/yes/on` or `0/false/no/off`, case-insensitive
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_site_url(raw: &str) -> Result<Url, LaunchError> {
    let url = Url::parse(raw)
        .map_err(|e| LaunchError::Config(format!("Invalid site URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(LaunchError::Config(format!(
            "Site URL must use http or https, got '{}'",
            scheme
        ))),
    }
}

/// Relative, names at least one directory and never climbs out of its base
pub fn is_project_subpath(path: &Path) -> bool {
    let mut named = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => named = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    named
}

fn is_dns_label(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 63
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !value.starts_with('-')
        && !value.ends_with('-')
}
