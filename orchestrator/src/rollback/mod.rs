//! Rollback pipeline for cluster releases
//!
//! confirm, back up, tear down the release, optionally delete its data,
//! offer to remove an emptied namespace, then report what is left. The
//! [`fsm::RollbackFsm`] guards the order of these steps.

pub mod backup;
pub mod fsm;
pub mod verify;

use crate::app::state::RunContext;
use crate::deploy::command::tail;
use crate::errors::LaunchError;
use crate::prompt::Confirmation;
use crate::targets::cluster::{delete_namespace, is_protected_namespace, kubectl};
use crate::targets::deletion::{is_not_found, select_strategy, Resource};

use backup::BackupRecord;
use fsm::{RollbackEvent, RollbackFsm, RollbackState};

/// What a rollback did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// `None` when the backup was skipped
    pub backup: Option<BackupRecord>,
    pub pvcs_deleted: usize,
    pub namespace_deleted: bool,
    pub remaining: Vec<Resource>,
}

fn intent_prompt(ctx: &RunContext) -> String {
    let cluster = &ctx.config.cluster;
    let mut prompt = format!(
        "Roll back release {} in namespace {}?",
        cluster.release, cluster.namespace
    );
    if ctx.config.flags.delete_data {
        prompt.push_str(" Persistent volume claims will be PERMANENTLY deleted.");
    }
    prompt
}

/// Run the full pipeline
pub async fn run(ctx: &RunContext) -> Result<RollbackReport, LaunchError> {
    let flags = &ctx.config.flags;
    let mut fsm = RollbackFsm::new();
    let mut report = RollbackReport::default();

    fsm.process(RollbackEvent::Begin)?;
    let prompt = intent_prompt(ctx);
    if ctx.gate.confirm(&prompt, ctx.force()) == Confirmation::Cancelled {
        fsm.process(RollbackEvent::Declined)?;
        return Err(LaunchError::Cancelled(prompt));
    }
    fsm.process(RollbackEvent::Confirmed {
        backup: !flags.skip_backup,
    })?;

    if fsm.state() == RollbackState::BackupAttempt {
        let record = take_backup(ctx).await;
        let succeeded = record.succeeded;
        report.backup = Some(record);

        if !succeeded {
            let prompt = "Backup failed. Proceed with the rollback without a backup?";
            if ctx.gate.confirm(prompt, ctx.force()) == Confirmation::Cancelled {
                fsm.process(RollbackEvent::Declined)?;
                return Err(LaunchError::Cancelled(prompt.to_string()));
            }
        }
        fsm.process(RollbackEvent::BackupDone)?;
    } else {
        ctx.log.info("Skipping backup (no backup)");
    }

    let strategy = select_strategy(&ctx.config).await;
    ctx.log
        .info(format!("Tearing down {}", strategy.describe()));
    if let Err(e) = strategy.delete(ctx).await {
        fsm.process(RollbackEvent::Error(e.to_string()))?;
        return Err(e);
    }
    fsm.process(RollbackEvent::TeardownDone {
        delete_data: flags.delete_data,
    })?;

    if fsm.state() == RollbackState::DataDelete {
        match delete_pvcs(ctx).await {
            Ok(deleted) => report.pvcs_deleted = deleted,
            Err(e) => {
                fsm.process(RollbackEvent::Error(e.to_string()))?;
                return Err(e);
            }
        }
        fsm.process(RollbackEvent::DataDeleted)?;
    }

    report.namespace_deleted = cleanup_namespace(ctx).await;
    fsm.process(RollbackEvent::NamespaceHandled)?;

    report.remaining = verify::remaining_resources(ctx).await;
    fsm.process(RollbackEvent::Verified)?;

    ctx.log.info(format!(
        "Rollback of {} finished: {} PVC(s) deleted, namespace {}, {} object(s) remaining",
        ctx.config.cluster.release,
        report.pvcs_deleted,
        if report.namespace_deleted { "deleted" } else { "kept" },
        report.remaining.len()
    ));
    Ok(report)
}

async fn take_backup(ctx: &RunContext) -> BackupRecord {
    let record = backup::create(ctx).await;
    if record.succeeded {
        let keep = ctx.config.backup_keep as usize;
        match backup::prune(&ctx.config.layout.backups(), &ctx.config.cluster.release, keep).await {
            Ok(removed) => {
                for path in removed {
                    ctx.log
                        .info(format!("Removed old backup {}", path.display()));
                }
            }
            Err(e) => ctx.log.warn(format!("Could not prune old backups: {}", e)),
        }
    }
    record
}

/// Delete the release's PVCs one at a time; none found is not an error
async fn delete_pvcs(ctx: &RunContext) -> Result<usize, LaunchError> {
    let cluster = &ctx.config.cluster;
    let list = kubectl([
        "get".to_string(),
        "pvc".to_string(),
        "-n".to_string(),
        cluster.namespace.clone(),
        "-l".to_string(),
        cluster.selector(),
        "-o".to_string(),
        "name".to_string(),
    ]);
    let output = ctx.executor.run_with_retry("List PVCs", &list).await?;

    let pvcs: Vec<Resource> = output
        .stdout_lines()
        .into_iter()
        .filter_map(|line| Resource::from_name_line(line, &cluster.namespace))
        .collect();

    let mut deleted = 0;
    for pvc in &pvcs {
        let command = kubectl([
            "delete",
            "pvc",
            pvc.name.as_str(),
            "-n",
            pvc.namespace.as_str(),
            "--ignore-not-found",
        ]);
        ctx.executor
            .run_with_retry_accepting(&format!("Delete PVC {}", pvc.name), &command, is_not_found)
            .await?;
        deleted += 1;
    }

    ctx.log.info(format!(
        "{} PVC(s) deleted for release {}",
        deleted, cluster.release
    ));
    Ok(deleted)
}

/// Offer to delete the namespace once nothing is left in it
async fn cleanup_namespace(ctx: &RunContext) -> bool {
    let namespace = ctx.config.cluster.namespace.as_str();
    let command = kubectl(["get", "all", "-n", namespace, "-o", "name"]);
    let output = ctx.executor.query(&command).await;

    if !output.success() {
        ctx.log.warn(format!(
            "Could not list objects in namespace {}: {}",
            namespace,
            tail(&output.stderr, 1)
        ));
        return false;
    }

    let count = output.stdout_lines().len();
    if count > 0 {
        ctx.log.info(format!(
            "Namespace {} still holds {} object(s), keeping it",
            namespace, count
        ));
        return false;
    }

    if is_protected_namespace(namespace) {
        ctx.log
            .info(format!("Namespace {} is empty but protected, keeping it", namespace));
        return false;
    }

    let prompt = format!("Namespace {} is empty. Delete it?", namespace);
    let skip_prompt = ctx.force() || ctx.config.flags.delete_namespace;
    if ctx.gate.confirm(&prompt, skip_prompt) == Confirmation::Cancelled {
        return false;
    }

    match delete_namespace(ctx).await {
        Ok(deleted) => deleted,
        Err(e) => {
            ctx.log
                .warn(format!("Namespace {} was not deleted: {}", namespace, e));
            false
        }
    }
}
