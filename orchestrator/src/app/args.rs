//! Command line parsing
//!
//! Flags are `--key=value` or `--key value` for value flags and bare `--key`
//! for switches. Anything unrecognized is collected and reported as a warning
//! once the run log is open.

use std::collections::HashMap;

use crate::errors::LaunchError;

/// Flags that take a value
pub const VALUE_FLAGS: &[&str] = &[
    "target",
    "project-dir",
    "build-dir",
    "name",
    "namespace",
    "release",
    "image",
    "tag",
    "port",
    "replicas",
    "node-version",
    "chart",
    "chart-repo",
    "dump-command",
    "manifest-dir",
    "branch",
    "site-url",
    "site-id",
    "retries",
    "backoff",
    "timeout",
    "backup-dir",
    "keep-backups",
    "log-file",
    "config",
];

/// Boolean switches
pub const SWITCH_FLAGS: &[&str] = &[
    "force",
    "keep-content",
    "delete-namespace",
    "delete-pvc",
    "dump-data",
    "no-backup",
    "verbose",
    "json-logs",
    "version",
    "help",
];

/// Parsed command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// First positional argument, the lifecycle operation
    pub operation: Option<String>,

    /// Recognized flags and their values
    pub values: HashMap<String, String>,

    /// Unrecognized flags and extra positionals, ignored
    pub unknown: Vec<String>,
}

impl CliArgs {
    /// Parse arguments, excluding the program name
    pub fn parse<I, S>(args: I) -> Result<Self, LaunchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parsed = CliArgs::default();
        let mut args = args.into_iter().map(Into::into).peekable();

        while let Some(arg) = args.next() {
            let Some(flag) = arg.strip_prefix("--") else {
                if parsed.operation.is_none() && !arg.starts_with('-') {
                    parsed.operation = Some(arg);
                } else {
                    parsed.unknown.push(arg);
                }
                continue;
            };

            let (key, inline_value) = match flag.split_once('=') {
                Some((key, value)) => (key.to_string(), Some(value.to_string())),
                None => (flag.to_string(), None),
            };

            if VALUE_FLAGS.contains(&key.as_str()) {
                let value = match inline_value {
                    Some(value) => value,
                    None => match args.peek() {
                        Some(next) if !next.starts_with("--") => args.next().unwrap_or_default(),
                        _ => {
                            return Err(LaunchError::Config(format!(
                                "--{} requires a value",
                                key
                            )))
                        }
                    },
                };
                parsed.values.insert(key, value);
            } else if SWITCH_FLAGS.contains(&key.as_str()) {
                parsed
                    .values
                    .insert(key, inline_value.unwrap_or_else(|| "true".to_string()));
            } else {
                parsed.unknown.push(arg);
            }
        }

        Ok(parsed)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}
