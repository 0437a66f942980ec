//! Launchpad - Entry Point
//!
//! Deploys documentation sites and cluster workloads, and tears them down
//! again.

use std::collections::HashMap;
use std::env;
use std::process;
use std::sync::Arc;

use colored::Colorize;

use launchpad::app::args::CliArgs;
use launchpad::app::options::{ConfigSources, Operation};
use launchpad::app::run::dispatch;
use launchpad::app::state::{RunContext, Services};
use launchpad::errors::{LaunchError, EXIT_FATAL, EXIT_SUCCESS};
use launchpad::logs::{init_logging, LogOptions, RunLog};
use launchpad::storage::settings::Settings;
use launchpad::utils::version_info;

const USAGE: &str = "\
Usage: launchpad <deploy|cleanup|rollback|verify> [--flag[=value]]...

Targets (--target, DEPLOY_TARGET):
  github-pages, netlify, vercel, cluster

Common flags:
  --project-dir <dir>     project root (default .)
  --build-dir <dir>       site build output, relative to the project (default build)
  --name <name>           resource name (default docs-site)
  --retries <n>           attempts per external command (default 3)
  --backoff <secs>        linear backoff base (default 5)
  --log-file <path>       run log (default <project>/.launchpad-deploy.log)
  --config <path>         JSON settings file
  --force                 skip confirmation prompts
  --keep-content          keep generated files and build output on cleanup
  --verbose               mirror every log entry to stderr
  --json-logs             JSON formatted diagnostics on stderr

Cluster flags:
  --namespace, --release, --image, --tag, --port, --replicas,
  --chart, --chart-repo, --manifest-dir, --timeout,
  --delete-namespace, --delete-pvc, --no-backup,
  --backup-dir, --keep-backups, --dump-command, --dump-data

Hosting flags:
  --branch, --site-url, --site-id, --node-version

Exit codes: 0 success, 1 fatal, 2 prerequisites missing,
            3 retries exhausted, 4 configuration error or cancelled
";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = match CliArgs::parse(env::args().skip(1)) {
        Ok(cli) => cli,
        Err(e) => exit_unconfigured(&CliArgs::default(), &e),
    };

    if cli.has("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(json) => println!("{}", json),
            Err(e) => exit_with(&e.into()),
        }
        return;
    }
    if cli.has("help") || cli.operation.is_none() {
        print!("{}", USAGE);
        if cli.operation.is_none() && !cli.has("help") {
            exit_unconfigured(&cli, &LaunchError::Config("missing operation".to_string()));
        }
        return;
    }

    let env: HashMap<String, String> = env::vars().collect();

    // Retrieve the settings file; a bad one is reported once the log is open
    let (settings, settings_error) = match ConfigSources::settings_path(&cli, &env) {
        Some(path) => match Settings::load(path).await {
            Ok(settings) => (settings, None),
            Err(e) => (Settings::default(), Some(e)),
        },
        None => (Settings::default(), None),
    };
    let sources = ConfigSources::new(&cli, &env, &settings);

    let log = match RunLog::open(sources.log_file()) {
        Ok(log) => Arc::new(log),
        Err(e) => exit_with(&e),
    };

    // Initialize logging
    let log_options = LogOptions {
        verbose: sources.verbose(),
        json_format: sources.json_logs(),
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    for flag in &cli.unknown {
        log.warn(format!("Ignoring unknown argument {}", flag));
    }

    let prepared = match settings_error {
        Some(e) => Err(e),
        None => prepare(&cli, &sources),
    };
    let (operation, config) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            log.error(e.to_string());
            exit_with(&e);
        }
    };

    let ctx = RunContext::new(config, Services::system(log));
    match dispatch(operation, &ctx).await {
        Ok(()) => process::exit(EXIT_SUCCESS),
        Err(e) => exit_with(&e),
    }
}

fn prepare(
    cli: &CliArgs,
    sources: &ConfigSources<'_>,
) -> Result<(Operation, launchpad::app::options::RunConfig), LaunchError> {
    let operation: Operation = cli
        .operation
        .as_deref()
        .ok_or_else(|| LaunchError::Config("missing operation".to_string()))?
        .parse()?;
    let config = sources.resolve()?;
    Ok((operation, config))
}

/// Record `error` in the run log found from `cli` and the environment alone,
/// then exit
fn exit_unconfigured(cli: &CliArgs, error: &LaunchError) -> ! {
    let env: HashMap<String, String> = env::vars().collect();
    let settings = Settings::default();
    let sources = ConfigSources::new(cli, &env, &settings);
    if let Ok(log) = RunLog::open(sources.log_file()) {
        log.error(error.to_string());
    }
    exit_with(error)
}

fn exit_with(error: &LaunchError) -> ! {
    if error.is_cancelled() {
        eprintln!("{} {}", "[CANCELLED]".yellow().bold(), error);
    } else {
        eprintln!("{} {}", "[ERROR]".red().bold(), error);
    }
    let code = error.exit_code();
    process::exit(if code == EXIT_SUCCESS { EXIT_FATAL } else { code })
}
