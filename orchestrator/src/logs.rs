//! Logging: the append-only run log and the operator-facing stderr mirror
//!
//! Every component writes through a shared [`RunLog`]. Each entry is appended
//! to the run log sink as `[timestamp][LEVEL] message` and re-emitted as a
//! `tracing` event. The subscriber installed by [`init_logging`] prints those
//! events on stderr: errors always, everything when verbose.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing_subscriber::{fmt as fmt_layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::deploy::command::ExecutionAttempt;
use crate::errors::LaunchError;

/// Severity of a run log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// One line of the run log
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}][{}] {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.level.as_str(),
            self.message
        )
    }
}

/// Process-wide append-only run log
pub struct RunLog {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl RunLog {
    /// Open (or create) the log file in append mode
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LaunchError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| LaunchError::LogUnavailable {
                path: path.clone(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LaunchError::LogUnavailable {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            sink: Mutex::new(Box::new(file)),
        })
    }

    /// Log into an arbitrary writer, e.g. an in-memory buffer
    pub fn with_sink(sink: impl Write + Send + 'static) -> Self {
        Self {
            sink: Mutex::new(Box::new(sink)),
        }
    }

    /// Append one entry; durable once this returns
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        };

        match level {
            LogLevel::Info => tracing::info!("{}", entry.message),
            LogLevel::Warn => tracing::warn!("{}", entry.message),
            LogLevel::Error => tracing::error!("{}", entry.message),
        }

        let mut sink = match self.sink.lock() {
            Ok(sink) => sink,
            Err(poisoned) => poisoned.into_inner(),
        };
        let written = writeln!(sink, "{}", entry).and_then(|_| sink.flush());
        if let Err(e) = written {
            tracing::error!("Failed to append to run log: {}", e);
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Record a failed command attempt
    pub fn attempt(&self, attempt: &ExecutionAttempt, max_attempts: u32) {
        let exit = attempt
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let mut message = format!(
            "Attempt {}/{} of `{}` failed (exit {}, started {})",
            attempt.attempt_index,
            max_attempts,
            attempt.command,
            exit,
            attempt.started_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        if !attempt.stderr_tail.is_empty() {
            message.push_str(&format!(": {}", attempt.stderr_tail.replace('\n', " | ")));
        } else if !attempt.stdout_tail.is_empty() {
            message.push_str(&format!(": {}", attempt.stdout_tail.replace('\n', " | ")));
        }
        self.warn(message);
    }
}

/// Operator-facing logging options
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Mirror every entry instead of errors only
    pub verbose: bool,

    /// Emit JSON lines on stderr
    pub json_format: bool,
}

/// Install the stderr subscriber
pub fn init_logging(options: LogOptions) -> Result<(), LaunchError> {
    let default_filter = if options.verbose { "info" } else { "error" };
    let filter = EnvFilter::try_from_env("LAUNCHPAD_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = tracing_subscriber::registry().with(filter);

    if options.json_format {
        subscriber
            .with(fmt_layer::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| LaunchError::Internal(e.to_string()))?;
    } else {
        subscriber
            .with(
                fmt_layer::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .without_time(),
            )
            .try_init()
            .map_err(|e| LaunchError::Internal(e.to_string()))?;
    }

    Ok(())
}
