//! Backups taken before a rollback tears anything down
//!
//! Every backup has a manifest snapshot of the release's objects. Chart
//! releases with a dump command also get a compressed data dump taken from
//! the release's first pod.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::app::state::RunContext;
use crate::deploy::command::tail;
use crate::errors::LaunchError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::targets::cluster::kubectl;

/// Kinds captured in a snapshot; secrets never leave the cluster
const SNAPSHOT_KINDS: &str = "deployment,statefulset,service,configmap,pvc";

const SNAPSHOT_SUFFIX: &str = ".yaml";
const DUMP_SUFFIX: &str = ".sql.zst";

/// zstd level for data dumps
const DUMP_LEVEL: i32 = 3;

/// Outcome of a backup attempt; advisory only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub attempted_at: DateTime<Utc>,
    pub succeeded: bool,
    pub path: Option<PathBuf>,

    /// Compressed data dump, when one was taken
    pub data_path: Option<PathBuf>,
}

fn stamped_name(release: &str, at: DateTime<Utc>, suffix: &str) -> String {
    format!("{}_backup_{}{}", release, at.format("%Y%m%d_%H%M%S"), suffix)
}

pub fn backup_file_name(release: &str, at: DateTime<Utc>) -> String {
    stamped_name(release, at, SNAPSHOT_SUFFIX)
}

pub fn dump_file_name(release: &str, at: DateTime<Utc>) -> String {
    stamped_name(release, at, DUMP_SUFFIX)
}

fn is_backup_of(path: &Path, release: &str, suffix: &str) -> bool {
    let prefix = format!("{}_backup_", release);
    path.file_name()
        .map(|n| n.to_string_lossy())
        .map(|n| n.starts_with(&prefix) && n.ends_with(suffix))
        .unwrap_or(false)
}

/// Write `contents` readable by the owner only
async fn write_private(file: &File, contents: &[u8]) -> Result<(), LaunchError> {
    file.write_atomic(contents).await?;
    file.restrict_to_owner().await
}

/// The dump command to run, when this rollback calls for a data dump
fn dump_command(ctx: &RunContext) -> Option<&str> {
    let config = &ctx.config;
    let flags = &config.flags;
    if !flags.delete_data && !flags.dump_data {
        return None;
    }
    if config.cluster.chart.is_none() {
        ctx.log
            .info("Data dumps are taken for chart releases only, skipping");
        return None;
    }
    match config.cluster.dump_command.as_deref() {
        Some(command) => Some(command),
        None => {
            ctx.log.warn(format!(
                "No dump command configured, data of release {} is not backed up",
                config.cluster.release
            ));
            None
        }
    }
}

/// Manifest snapshot, then a data dump when one is called for
///
/// One attempt per step, no retry. A failure is logged and reported in the
/// record.
pub async fn create(ctx: &RunContext) -> BackupRecord {
    let mut record = snapshot(ctx).await;
    if !record.succeeded {
        return record;
    }

    if let Some(command) = dump_command(ctx) {
        match dump_data(ctx, command, record.attempted_at).await {
            Ok(path) => record.data_path = Some(path),
            Err(reason) => {
                ctx.log.warn(format!("Backup failed: {}", reason));
                record.succeeded = false;
            }
        }
    }
    record
}

/// Dump the release's objects as YAML into the backup directory
pub async fn snapshot(ctx: &RunContext) -> BackupRecord {
    let cluster = &ctx.config.cluster;
    let attempted_at = Utc::now();
    let command = kubectl([
        "get".to_string(),
        SNAPSHOT_KINDS.to_string(),
        "-n".to_string(),
        cluster.namespace.clone(),
        "-l".to_string(),
        cluster.selector(),
        "-o".to_string(),
        "yaml".to_string(),
    ]);
    ctx.log
        .info(format!("Backing up release {}: {}", cluster.release, command));

    let failed = |reason: String| {
        ctx.log.warn(format!("Backup failed: {}", reason));
        BackupRecord {
            attempted_at,
            succeeded: false,
            path: None,
            data_path: None,
        }
    };

    let output = ctx.executor.query(&command).await;
    if !output.success() {
        return failed(tail(&output.stderr, 2));
    }

    let file = ctx
        .config
        .layout
        .backups()
        .file(&backup_file_name(&cluster.release, attempted_at));
    if let Err(e) = write_private(&file, output.stdout.as_bytes()).await {
        return failed(e.to_string());
    }

    ctx.log
        .info(format!("Backup written to {}", file.path().display()));
    BackupRecord {
        attempted_at,
        succeeded: true,
        path: Some(file.path().to_path_buf()),
        data_path: None,
    }
}

/// Run `command` in the release's first pod and store its stdout zstd
/// compressed next to the snapshot
async fn dump_data(ctx: &RunContext, command: &str, at: DateTime<Utc>) -> Result<PathBuf, String> {
    let cluster = &ctx.config.cluster;
    let lookup = kubectl([
        "get".to_string(),
        "pods".to_string(),
        "-n".to_string(),
        cluster.namespace.clone(),
        "-l".to_string(),
        cluster.selector(),
        "-o".to_string(),
        "jsonpath={.items[0].metadata.name}".to_string(),
    ]);
    let output = ctx.executor.query(&lookup).await;
    if !output.success() {
        return Err(tail(&output.stderr, 2));
    }
    let pod = output.stdout.trim().to_string();
    if pod.is_empty() {
        return Err(format!("no pod found for release {}", cluster.release));
    }

    let exec = kubectl([
        "exec".to_string(),
        "-n".to_string(),
        cluster.namespace.clone(),
        pod.clone(),
        "--".to_string(),
        "sh".to_string(),
        "-c".to_string(),
        command.to_string(),
    ]);
    ctx.log
        .info(format!("Dumping data of release {} from {}", cluster.release, pod));
    let output = ctx.executor.query(&exec).await;
    if !output.success() {
        return Err(tail(&output.stderr, 2));
    }
    if output.stdout.trim().is_empty() {
        return Err(format!("dump command in {} printed nothing", pod));
    }

    let compressed = zstd::stream::encode_all(output.stdout.as_bytes(), DUMP_LEVEL)
        .map_err(|e| format!("compressing dump: {}", e))?;
    let file = ctx
        .config
        .layout
        .backups()
        .file(&dump_file_name(&cluster.release, at));
    write_private(&file, &compressed)
        .await
        .map_err(|e| e.to_string())?;

    ctx.log.info(format!(
        "Data dump written to {} ({} bytes compressed)",
        file.path().display(),
        compressed.len()
    ));
    Ok(file.path().to_path_buf())
}

/// Delete all but the newest `keep` snapshots and, separately, the newest
/// `keep` data dumps of `release`
pub async fn prune(dir: &Dir, release: &str, keep: usize) -> Result<Vec<PathBuf>, LaunchError> {
    if !dir.exists().await {
        return Ok(Vec::new());
    }

    let files = dir.list_files().await?;
    let mut removed = Vec::new();
    for suffix in [SNAPSHOT_SUFFIX, DUMP_SUFFIX] {
        // Names embed a sortable UTC timestamp
        let mut backups: Vec<&PathBuf> = files
            .iter()
            .filter(|p| is_backup_of(p, release, suffix))
            .collect();
        backups.sort();
        backups.reverse();

        for path in backups.into_iter().skip(keep) {
            if File::new(path).delete().await? {
                removed.push(path.clone());
            }
        }
    }
    Ok(removed)
}
