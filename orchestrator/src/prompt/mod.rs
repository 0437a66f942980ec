//! Confirmation gate in front of destructive actions

use std::io::{BufRead, Write};
use std::sync::Arc;

use colored::Colorize;

use crate::errors::LaunchError;
use crate::logs::RunLog;

/// Answers accepted as consent
const AFFIRMATIVE: &[&str] = &["y", "Y", "yes", "YES", "Yes"];

/// Outcome of a confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Allowed,
    Cancelled,
}

/// Source of operator answers
pub trait Prompter: Send + Sync {
    /// Show `prompt` and read one line; `Ok(None)` on end of input
    fn ask(&self, prompt: &str) -> std::io::Result<Option<String>>;
}

/// Prompts on stderr and reads stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&self, prompt: &str) -> std::io::Result<Option<String>> {
        let mut stderr = std::io::stderr();
        write!(stderr, "{} {} ", prompt.yellow().bold(), "[y/N]".dimmed())?;
        stderr.flush()?;

        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

/// Whether `answer` grants consent; only the line terminator is stripped
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer
        .strip_suffix('\n')
        .map(|a| a.strip_suffix('\r').unwrap_or(a))
        .unwrap_or(answer);
    AFFIRMATIVE.contains(&answer)
}

/// Interactive or forced yes/no gate
#[derive(Clone)]
pub struct ConfirmationGate {
    prompter: Arc<dyn Prompter>,
    log: Arc<RunLog>,
}

impl ConfirmationGate {
    pub fn new(prompter: Arc<dyn Prompter>, log: Arc<RunLog>) -> Self {
        Self { prompter, log }
    }

    /// Ask for consent unless `force` is set
    pub fn confirm(&self, prompt: &str, force: bool) -> Confirmation {
        if force {
            self.log.info(format!("Confirmation skipped (force): {}", prompt));
            return Confirmation::Allowed;
        }

        let answer = match self.prompter.ask(prompt) {
            Ok(answer) => answer,
            Err(e) => {
                self.log.warn(format!("Could not read confirmation: {}", e));
                None
            }
        };

        match answer {
            Some(answer) if is_affirmative(&answer) => {
                self.log.info(format!("Confirmed: {}", prompt));
                Confirmation::Allowed
            }
            _ => {
                self.log.info(format!("Declined: {}", prompt));
                Confirmation::Cancelled
            }
        }
    }

    /// [`ConfirmationGate::confirm`], with a decline turned into
    /// [`LaunchError::Cancelled`]
    pub fn require(&self, prompt: &str, force: bool) -> Result<(), LaunchError> {
        match self.confirm(prompt, force) {
            Confirmation::Allowed => Ok(()),
            Confirmation::Cancelled => Err(LaunchError::Cancelled(prompt.to_string())),
        }
    }
}
