//! Rollback pipeline tests against a scripted cluster

use launchpad::app::options::Operation;
use launchpad::app::run::dispatch;
use launchpad::rollback::RollbackReport;
use launchpad::targets::{adapter_for, DeploymentTarget};

use crate::support::{fail, ok, Harness};

async fn rollback(harness: &Harness, ctx: &launchpad::app::state::RunContext) -> RollbackReport {
    let report = adapter_for(DeploymentTarget::Cluster)
        .rollback(ctx)
        .await
        .unwrap();
    assert!(!harness.log().contains("[ERROR]"));
    report
}

#[tokio::test]
async fn test_rollback_without_backup_deleting_data() {
    let harness = Harness::new();
    harness.runner.on("kubectl get pvc", ok(""));
    harness.runner.on("kubectl get all", ok("pod/kafka-0\n"));
    harness
        .runner
        .on("kubectl get pods,services,secrets,pvc", ok("pod/kafka-0\n"));
    harness.prompter.answer("yes\n");
    let mut config = harness.cluster_config();
    config.flags.skip_backup = true;
    config.flags.delete_data = true;
    let ctx = harness.context(config);

    let report = rollback(&harness, &ctx).await;

    assert_eq!(report.backup, None);
    assert_eq!(report.pvcs_deleted, 0);
    assert!(!report.namespace_deleted);
    assert_eq!(report.remaining.len(), 1);
    assert_eq!(report.remaining[0].name, "kafka-0");

    assert_eq!(harness.runner.count("helm uninstall kafka -n kafka"), 1);
    assert_eq!(harness.runner.count("kubectl delete pvc"), 0);
    assert_eq!(harness.runner.count("kubectl delete namespace"), 0);

    let prompts = harness.prompter.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("PERMANENTLY deleted"));

    let log = harness.log();
    assert!(log.contains("Skipping backup"));
    assert!(log.contains("0 PVC(s) deleted for release kafka"));
    assert!(log.contains("[WARN] Still present: pod/kafka-0 in kafka"));
}

#[tokio::test]
async fn test_declined_rollback_touches_nothing() {
    let harness = Harness::new();
    harness.prompter.answer("no\n");
    let ctx = harness.context(harness.cluster_config());

    let err = dispatch(Operation::Rollback, &ctx).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.exit_code(), 4);
    assert_eq!(harness.runner.count("kubectl get deployment"), 0);
    assert_eq!(harness.runner.count("helm uninstall"), 0);
    assert!(!harness.log().contains("[ERROR]"));
}

#[tokio::test]
async fn test_backup_written_and_pruned() {
    let harness = Harness::new();
    harness.write("backups/kafka_backup_20200101_000000.yaml", "items: []\n");
    harness.write("backups/kafka_backup_20200102_000000.yaml", "items: []\n");
    harness.write("backups/kafka_backup_20200103_000000.yaml", "items: []\n");
    harness.runner.on(
        "kubectl get deployment,statefulset,service,configmap,pvc -n kafka",
        ok("apiVersion: v1\nkind: List\nitems: []\n"),
    );
    harness.runner.on("kubectl get all", ok("service/kafka-headless\n"));
    let mut config = harness.cluster_config();
    config.flags.force = true;
    config.backup_keep = 2;
    let ctx = harness.context(config);

    let report = rollback(&harness, &ctx).await;

    let backup = report.backup.unwrap();
    assert!(backup.succeeded);
    assert!(backup.data_path.is_none());
    assert!(harness.runner.calls().iter().all(|c| !c.contains("secret,")));
    let path = backup.path.unwrap();
    assert!(path.starts_with(harness.project().join("backups")));
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "apiVersion: v1\nkind: List\nitems: []\n"
    );

    let mut left: Vec<String> = std::fs::read_dir(harness.project().join("backups"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    left.sort();
    assert_eq!(left.len(), 2);
    assert_eq!(left[0], "kafka_backup_20200103_000000.yaml");
    assert_eq!(left[1], path.file_name().unwrap().to_string_lossy());
}

fn dumping_config(harness: &Harness) -> launchpad::app::options::RunConfig {
    let mut config = harness.cluster_config();
    config.cluster.dump_command = Some("pg_dump -U app -d app --no-owner".to_string());
    config.flags.force = true;
    config.flags.delete_data = true;
    config
}

#[tokio::test]
async fn test_data_dump_taken_before_teardown() {
    let harness = Harness::new();
    harness
        .runner
        .on("kubectl get pods -n kafka -l", ok("kafka-0"));
    harness
        .runner
        .on("kubectl exec -n kafka kafka-0", ok("CREATE TABLE events ();\n"));
    let ctx = harness.context(dumping_config(&harness));

    let report = rollback(&harness, &ctx).await;

    let backup = report.backup.unwrap();
    assert!(backup.succeeded);
    let dump = backup.data_path.unwrap();
    assert!(dump.to_string_lossy().ends_with(".sql.zst"));
    assert!(dump.starts_with(harness.project().join("backups")));
    let restored = zstd::stream::decode_all(std::fs::File::open(&dump).unwrap()).unwrap();
    assert_eq!(restored, b"CREATE TABLE events ();\n");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&dump).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    let calls = harness.runner.calls();
    let exec = calls
        .iter()
        .position(|c| c == "kubectl exec -n kafka kafka-0 -- sh -c 'pg_dump -U app -d app --no-owner'")
        .unwrap();
    let uninstall = calls.iter().position(|c| c.starts_with("helm uninstall")).unwrap();
    assert!(exec < uninstall);
}

#[tokio::test]
async fn test_dump_on_request_without_deleting_data() {
    let harness = Harness::new();
    harness
        .runner
        .on("kubectl get pods -n kafka -l", ok("kafka-0"));
    harness.runner.on("kubectl exec", ok("COPY events FROM stdin;\n"));
    let mut config = dumping_config(&harness);
    config.flags.delete_data = false;
    config.flags.dump_data = true;
    let ctx = harness.context(config);

    let report = rollback(&harness, &ctx).await;

    assert!(report.backup.unwrap().data_path.is_some());
    assert_eq!(harness.runner.count("kubectl delete pvc"), 0);
}

#[tokio::test]
async fn test_failed_dump_then_decline_cancels() {
    let harness = Harness::new();
    harness
        .runner
        .on("kubectl get pods -n kafka -l", ok("kafka-0"));
    harness.runner.on(
        "kubectl exec",
        fail(1, "pg_dump: error: connection to server failed"),
    );
    harness.prompter.answer("yes\n");
    harness.prompter.answer("n\n");
    let mut config = dumping_config(&harness);
    config.flags.force = false;
    let ctx = harness.context(config);

    let err = adapter_for(DeploymentTarget::Cluster)
        .rollback(&ctx)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(harness.runner.count("helm uninstall"), 0);
    assert!(harness
        .log()
        .contains("[WARN] Backup failed: pg_dump: error: connection to server failed"));
}

#[tokio::test]
async fn test_missing_pod_fails_the_dump() {
    let harness = Harness::new();
    let ctx = harness.context(dumping_config(&harness));

    let report = rollback(&harness, &ctx).await;

    let backup = report.backup.unwrap();
    assert!(!backup.succeeded);
    assert!(backup.data_path.is_none());
    assert_eq!(harness.runner.count("kubectl exec"), 0);
    assert!(harness.log().contains("no pod found for release kafka"));
}

#[tokio::test]
async fn test_delete_data_without_dump_command_warns() {
    let harness = Harness::new();
    let mut config = dumping_config(&harness);
    config.cluster.dump_command = None;
    let ctx = harness.context(config);

    let report = rollback(&harness, &ctx).await;

    assert!(report.backup.unwrap().succeeded);
    assert_eq!(harness.runner.count("kubectl exec"), 0);
    assert!(harness
        .log()
        .contains("[WARN] No dump command configured, data of release kafka is not backed up"));
}

#[tokio::test]
async fn test_failed_backup_then_decline_cancels() {
    let harness = Harness::new();
    harness.runner.on(
        "kubectl get deployment,statefulset",
        fail(1, "Error from server (Forbidden): deployments.apps is forbidden"),
    );
    harness.prompter.answer("yes\n");
    harness.prompter.answer("n\n");
    let ctx = harness.context(harness.cluster_config());

    let err = adapter_for(DeploymentTarget::Cluster)
        .rollback(&ctx)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(harness.runner.count("helm uninstall"), 0);
    assert_eq!(harness.prompter.prompts().len(), 2);
    assert!(harness.log().contains("[WARN] Backup failed"));
    assert!(!harness.exists("backups"));
}

#[tokio::test]
async fn test_failed_backup_with_force_proceeds() {
    let harness = Harness::new();
    harness
        .runner
        .on("kubectl get deployment,statefulset", fail(1, "Unable to connect"));
    harness.runner.on("kubectl get all", ok("pod/kafka-0\n"));
    let mut config = harness.cluster_config();
    config.flags.force = true;
    let ctx = harness.context(config);

    let report = rollback(&harness, &ctx).await;

    let backup = report.backup.unwrap();
    assert!(!backup.succeeded);
    assert!(backup.path.is_none());
    assert_eq!(harness.runner.count("kubectl get deployment,statefulset"), 1);
    assert_eq!(harness.runner.count("helm uninstall"), 1);
}

#[tokio::test]
async fn test_teardown_failure_exits_3() {
    let harness = Harness::new();
    harness
        .runner
        .on("helm uninstall", fail(1, "Error: Kubernetes cluster unreachable"));
    let mut config = harness.cluster_config();
    config.flags.force = true;
    config.flags.skip_backup = true;
    config.flags.delete_data = true;
    let ctx = harness.context(config);

    let err = dispatch(Operation::Rollback, &ctx).await.unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert_eq!(harness.runner.count("helm uninstall"), 3);
    assert_eq!(harness.runner.count("kubectl get pvc"), 0);
    assert!(harness
        .log()
        .contains("[ERROR] rollback cluster failed with exit code 3"));
}

#[tokio::test]
async fn test_pvcs_deleted_one_by_one() {
    let harness = Harness::new();
    harness.runner.on(
        "kubectl get pvc",
        ok("persistentvolumeclaim/data-kafka-0\npersistentvolumeclaim/data-kafka-1\n"),
    );
    harness.runner.on("kubectl get all", ok("pod/kafka-0\n"));
    let mut config = harness.cluster_config();
    config.flags.force = true;
    config.flags.skip_backup = true;
    config.flags.delete_data = true;
    let ctx = harness.context(config);

    let report = rollback(&harness, &ctx).await;

    assert_eq!(report.pvcs_deleted, 2);
    assert_eq!(
        harness
            .runner
            .count("kubectl delete pvc data-kafka-0 -n kafka --ignore-not-found"),
        1
    );
    assert_eq!(
        harness
            .runner
            .count("kubectl delete pvc data-kafka-1 -n kafka --ignore-not-found"),
        1
    );
    assert!(harness.log().contains("2 PVC(s) deleted for release kafka"));
}

#[tokio::test]
async fn test_pvcs_kept_without_delete_data() {
    let harness = Harness::new();
    harness.runner.on("kubectl get all", ok("pod/kafka-0\n"));
    let mut config = harness.cluster_config();
    config.flags.force = true;
    config.flags.skip_backup = true;
    let ctx = harness.context(config);

    let report = rollback(&harness, &ctx).await;

    assert_eq!(report.pvcs_deleted, 0);
    assert_eq!(harness.runner.count("kubectl get pvc"), 0);
    assert_eq!(harness.runner.count("kubectl get pods,services,secrets -n"), 1);
}

#[tokio::test]
async fn test_empty_namespace_deleted_when_requested() {
    let harness = Harness::new();
    harness.prompter.answer("yes\n");
    let mut config = harness.cluster_config();
    config.flags.skip_backup = true;
    config.flags.delete_namespace = true;
    let ctx = harness.context(config);

    let report = rollback(&harness, &ctx).await;

    assert!(report.namespace_deleted);
    assert_eq!(harness.prompter.prompts().len(), 1);
    assert_eq!(
        harness
            .runner
            .count("kubectl delete namespace kafka --ignore-not-found"),
        1
    );
}

#[tokio::test]
async fn test_empty_namespace_kept_when_declined() {
    let harness = Harness::new();
    harness.prompter.answer("yes\n");
    harness.prompter.answer("n\n");
    let mut config = harness.cluster_config();
    config.flags.skip_backup = true;
    let ctx = harness.context(config);

    let report = rollback(&harness, &ctx).await;

    assert!(!report.namespace_deleted);
    let prompts = harness.prompter.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[1], "Namespace kafka is empty. Delete it?");
    assert_eq!(harness.runner.count("kubectl delete namespace"), 0);
}

#[tokio::test]
async fn test_empty_protected_namespace_is_kept() {
    let harness = Harness::new();
    let mut config = harness.cluster_config();
    config.cluster.namespace = "default".to_string();
    config.flags.force = true;
    config.flags.skip_backup = true;
    config.flags.delete_namespace = true;
    let ctx = harness.context(config);

    let report = rollback(&harness, &ctx).await;

    assert!(!report.namespace_deleted);
    assert_eq!(harness.runner.count("kubectl delete namespace"), 0);
    assert!(harness
        .log()
        .contains("Namespace default is empty but protected, keeping it"));
}
