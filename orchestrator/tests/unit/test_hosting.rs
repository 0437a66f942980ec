//! Static hosting target tests

use std::time::Duration;

use secrecy::SecretString;

use launchpad::app::options::Operation;
use launchpad::app::run::dispatch;
use launchpad::errors::LaunchError;
use launchpad::targets::DeploymentTarget;

use crate::support::{fail, ok, Harness};

#[tokio::test]
async fn test_publish_exhaustion_exits_3() {
    let harness = Harness::new();
    harness.runner.on("netlify deploy", fail(1, "Error: Unauthorized"));
    let ctx = harness.context(harness.config(DeploymentTarget::Netlify));

    let err = dispatch(Operation::Deploy, &ctx).await.unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert!(harness.exists("netlify.toml"));
    assert_eq!(harness.runner.count("netlify deploy --prod --dir build"), 3);
    assert_eq!(
        harness.sleeper.slept(),
        vec![Duration::from_secs(5), Duration::from_secs(10)]
    );
    assert!(harness
        .log()
        .contains("[ERROR] deploy netlify failed with exit code 3"));
}

#[tokio::test]
async fn test_cleanup_declined_keeps_everything() {
    let harness = Harness::new();
    harness.write("netlify.toml", "[build]\n");
    harness.write("build/index.html", "<html></html>");
    harness.write(".netlify/state.json", "{}");
    harness.prompter.answer("n\n");
    let ctx = harness.context(harness.config(DeploymentTarget::Netlify));

    let err = dispatch(Operation::Cleanup, &ctx).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.exit_code(), 4);
    assert!(harness.exists("netlify.toml"));
    assert!(harness.exists("build/index.html"));
    assert!(harness.exists(".netlify/state.json"));
    assert_eq!(harness.prompter.prompts().len(), 1);

    let log = harness.log();
    assert!(!log.contains("[ERROR]"));
    assert!(log.contains("[INFO] Declined"));
}

#[tokio::test]
async fn test_cleanup_confirmed_removes_content_and_state() {
    let harness = Harness::new();
    harness.write("netlify.toml", "[build]\n");
    harness.write("build/index.html", "<html></html>");
    harness.write(".netlify/state.json", "{}");
    harness.prompter.answer("yes\n");
    let ctx = harness.context(harness.config(DeploymentTarget::Netlify));

    dispatch(Operation::Cleanup, &ctx).await.unwrap();

    assert!(!harness.exists("netlify.toml"));
    assert!(!harness.exists("build"));
    assert!(!harness.exists(".netlify"));
}

#[tokio::test]
async fn test_cleanup_refuses_build_dir_at_project_root() {
    let harness = Harness::new();
    harness.write("netlify.toml", "[build]\n");
    harness.write("docs/intro.md", "# Intro\n");
    let mut config = harness.config(DeploymentTarget::Netlify);
    config.layout.build_dir = ".".into();
    config.flags.force = true;
    let ctx = harness.context(config);

    let err = dispatch(Operation::Cleanup, &ctx).await.unwrap_err();

    assert!(matches!(err, LaunchError::Config(_)));
    assert_eq!(err.exit_code(), 4);
    assert!(harness.exists("netlify.toml"));
    assert!(harness.exists("docs/intro.md"));
    assert!(harness.project().exists());
}

#[tokio::test]
async fn test_cleanup_keep_content() {
    let harness = Harness::new();
    harness.write("vercel.json", "{}");
    harness.write("build/index.html", "<html></html>");
    harness.write(".vercel/project.json", "{}");
    let mut config = harness.config(DeploymentTarget::Vercel);
    config.flags.force = true;
    config.flags.keep_content = true;
    let ctx = harness.context(config);

    dispatch(Operation::Cleanup, &ctx).await.unwrap();

    assert!(harness.exists("vercel.json"));
    assert!(harness.exists("build/index.html"));
    assert!(!harness.exists(".vercel"));
    assert!(harness.prompter.prompts().is_empty());
}

#[tokio::test]
async fn test_cleanup_of_nothing_succeeds() {
    let harness = Harness::new();
    let mut config = harness.config(DeploymentTarget::Netlify);
    config.flags.force = true;
    let ctx = harness.context(config);

    dispatch(Operation::Cleanup, &ctx).await.unwrap();
    assert!(!harness.log().contains("[ERROR]"));
}

#[tokio::test]
async fn test_existing_config_is_never_overwritten() {
    let harness = Harness::new();
    harness.write("netlify.toml", "# hand edited\n");
    let ctx = harness.context(harness.config(DeploymentTarget::Netlify));

    dispatch(Operation::Deploy, &ctx).await.unwrap();
    dispatch(Operation::Deploy, &ctx).await.unwrap();

    let contents = std::fs::read_to_string(harness.project().join("netlify.toml")).unwrap();
    assert_eq!(contents, "# hand edited\n");
    assert_eq!(harness.log().matches("Keeping existing netlify-config").count(), 2);
}

#[tokio::test]
async fn test_build_runs_only_with_package_json() {
    let harness = Harness::new();
    let ctx = harness.context(harness.config(DeploymentTarget::Vercel));
    dispatch(Operation::Deploy, &ctx).await.unwrap();
    assert_eq!(harness.runner.count("npm run build"), 0);

    harness.write("package.json", "{\"scripts\": {\"build\": \"docusaurus build\"}}");
    dispatch(Operation::Deploy, &ctx).await.unwrap();
    assert_eq!(harness.runner.count("npm run build"), 1);
    assert_eq!(harness.runner.count("vercel deploy --prod --yes"), 2);
}

#[tokio::test]
async fn test_tokens_never_reach_the_log() {
    let harness = Harness::new();
    let mut config = harness.config(DeploymentTarget::Vercel);
    config.hosting.vercel_token = Some(SecretString::from("tok-s3cret".to_string()));
    let ctx = harness.context(config);

    dispatch(Operation::Deploy, &ctx).await.unwrap();

    let log = harness.log();
    assert!(log.contains("vercel deploy --prod --yes"));
    assert!(!log.contains("tok-s3cret"));
}

#[tokio::test]
async fn test_missing_prerequisites_exit_2_before_side_effects() {
    let harness = Harness::new();
    harness.runner.on("npm --version", fail(127, "npm: command not found"));
    harness.runner.on("netlify --version", fail(127, "netlify: command not found"));
    let ctx = harness.context(harness.config(DeploymentTarget::Netlify));

    let err = dispatch(Operation::Deploy, &ctx).await.unwrap_err();

    assert_eq!(err.exit_code(), 2);
    assert_eq!(err.to_string(), "Prerequisites missing for netlify: npm, netlify");
    assert!(!harness.exists("netlify.toml"));
    assert_eq!(harness.runner.count("netlify deploy"), 0);
}

#[tokio::test]
async fn test_pages_fallback_runs_once() {
    let harness = Harness::new();
    harness.runner.on("npx gh-pages", fail(1, "fatal: a branch named 'gh-pages' already exists"));
    harness
        .runner
        .on("git subtree split", ok("4f2a9c1e0b7d\n"));
    let ctx = harness.context(harness.config(DeploymentTarget::GithubPages));

    dispatch(Operation::Deploy, &ctx).await.unwrap();

    assert!(harness.exists(".github/workflows/deploy-docs.yml"));
    assert_eq!(harness.runner.count("npx gh-pages --dist build --branch gh-pages"), 3);
    assert_eq!(harness.runner.count("git subtree split --prefix build"), 1);
    assert_eq!(harness.runner.count("git subtree split --prefix build -b"), 0);
    assert_eq!(
        harness
            .runner
            .count("git push --force origin 4f2a9c1e0b7d:refs/heads/gh-pages"),
        1
    );
}

#[tokio::test]
async fn test_pages_fallback_reruns_with_existing_branch() {
    let harness = Harness::new();
    harness.runner.on("npx gh-pages", fail(1, "gh-pages failed"));
    harness.runner.on("git subtree split", ok("4f2a9c1e0b7d\n"));
    let ctx = harness.context(harness.config(DeploymentTarget::GithubPages));

    dispatch(Operation::Deploy, &ctx).await.unwrap();
    dispatch(Operation::Deploy, &ctx).await.unwrap();

    assert_eq!(harness.runner.count("git subtree split"), 2);
    assert!(harness.runner.calls().iter().all(|c| !c.contains(" -b ")));
    assert_eq!(
        harness
            .runner
            .count("git push --force origin 4f2a9c1e0b7d:refs/heads/gh-pages"),
        2
    );
    assert!(!harness.log().contains("[ERROR] deploy"));
}

#[tokio::test]
async fn test_pages_fallback_without_commit_exits_3() {
    let harness = Harness::new();
    harness.runner.on("npx gh-pages", fail(1, "gh-pages failed"));
    let ctx = harness.context(harness.config(DeploymentTarget::GithubPages));

    let err = dispatch(Operation::Deploy, &ctx).await.unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert_eq!(harness.runner.count("git push"), 0);
}

#[tokio::test]
async fn test_pages_fallback_failure_exits_3() {
    let harness = Harness::new();
    harness.runner.on("npx gh-pages", fail(1, "gh-pages failed"));
    harness.runner.on("git subtree split", fail(1, "fatal: no such prefix"));
    let ctx = harness.context(harness.config(DeploymentTarget::GithubPages));

    let err = dispatch(Operation::Deploy, &ctx).await.unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert_eq!(harness.runner.count("git subtree split"), 1);
    assert_eq!(harness.runner.count("git push"), 0);
}

#[tokio::test]
async fn test_pages_cleanup_tolerates_missing_branch() {
    let harness = Harness::new();
    harness.write(".github/workflows/deploy-docs.yml", "name: docs\n");
    harness
        .runner
        .on("git branch -D", fail(1, "error: branch 'gh-pages' not found."));
    let mut config = harness.config(DeploymentTarget::GithubPages);
    config.flags.force = true;
    config.flags.keep_content = true;
    let ctx = harness.context(config);

    dispatch(Operation::Cleanup, &ctx).await.unwrap();

    assert!(!harness.exists(".github/workflows/deploy-docs.yml"));
    assert_eq!(harness.runner.count("git branch -D gh-pages"), 1);
    assert!(harness.sleeper.slept().is_empty());
}

#[tokio::test]
async fn test_pages_cleanup_retries_other_git_errors() {
    let harness = Harness::new();
    harness.runner.on(
        "git branch -D",
        fail(128, "fatal: not a git repository (or any of the parent directories): .git"),
    );
    let mut config = harness.config(DeploymentTarget::GithubPages);
    config.flags.force = true;
    config.flags.keep_content = true;
    let ctx = harness.context(config);

    let err = dispatch(Operation::Cleanup, &ctx).await.unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert_eq!(harness.runner.count("git branch -D gh-pages"), 3);
}

#[tokio::test]
async fn test_rollback_is_cluster_only() {
    let harness = Harness::new();
    let ctx = harness.context(harness.config(DeploymentTarget::Netlify));

    let err = dispatch(Operation::Rollback, &ctx).await.unwrap_err();

    assert!(matches!(err, LaunchError::Config(_)));
    assert_eq!(err.exit_code(), 4);
    assert!(err.to_string().contains("only supported for the cluster target"));
}

#[tokio::test]
async fn test_verify_build_output() {
    let harness = Harness::new();
    let ctx = harness.context(harness.config(DeploymentTarget::GithubPages));

    let err = dispatch(Operation::Verify, &ctx).await.unwrap_err();
    assert!(matches!(err, LaunchError::VerificationFailed(_)));
    assert_eq!(err.exit_code(), 1);

    harness.write("build/index.html", "<html></html>");
    dispatch(Operation::Verify, &ctx).await.unwrap();
    assert!(harness.log().contains("Check passed: build output"));
}
