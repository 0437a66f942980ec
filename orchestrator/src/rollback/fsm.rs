//! Finite state machine for the rollback pipeline

use std::fmt;

use crate::errors::LaunchError;

/// Rollback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackState {
    Start,
    ConfirmDestructiveIntent,
    BackupAttempt,
    ReleaseTeardown,
    DataDelete,
    NamespaceCleanup,
    VerifyCleanState,
    Done,
    Cancelled,
    Failed,
}

impl RollbackState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RollbackState::Done | RollbackState::Cancelled | RollbackState::Failed
        )
    }
}

impl fmt::Display for RollbackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Rollback event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackEvent {
    /// Pipeline started
    Begin,

    /// Operator agreed; `backup` is false with `--no-backup`
    Confirmed { backup: bool },

    /// Operator declined a prompt
    Declined,

    /// Backup written, or its failure accepted by the operator
    BackupDone,

    /// Release removed; `delete_data` selects the PVC step
    TeardownDone { delete_data: bool },

    DataDeleted,

    /// Namespace deleted, kept, or left for the operator
    NamespaceHandled,

    Verified,

    /// A step failed
    Error(String),
}

/// Rollback FSM
#[derive(Debug, Clone)]
pub struct RollbackFsm {
    state: RollbackState,
    error: Option<String>,
}

impl RollbackFsm {
    pub fn new() -> Self {
        Self {
            state: RollbackState::Start,
            error: None,
        }
    }

    pub fn state(&self) -> RollbackState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: RollbackEvent) -> Result<RollbackState, LaunchError> {
        use RollbackEvent as E;
        use RollbackState as S;

        let new_state = match (self.state, &event) {
            (S::Start, E::Begin) => S::ConfirmDestructiveIntent,

            (S::ConfirmDestructiveIntent, E::Confirmed { backup: true }) => S::BackupAttempt,
            (S::ConfirmDestructiveIntent, E::Confirmed { backup: false }) => S::ReleaseTeardown,
            (S::ConfirmDestructiveIntent, E::Declined) => S::Cancelled,

            (S::BackupAttempt, E::BackupDone) => S::ReleaseTeardown,
            (S::BackupAttempt, E::Declined) => S::Cancelled,

            (S::ReleaseTeardown, E::TeardownDone { delete_data: true }) => S::DataDelete,
            (S::ReleaseTeardown, E::TeardownDone { delete_data: false }) => S::NamespaceCleanup,

            (S::DataDelete, E::DataDeleted) => S::NamespaceCleanup,

            // Declining the namespace prompt only keeps the namespace
            (S::NamespaceCleanup, E::NamespaceHandled) => S::VerifyCleanState,

            (S::VerifyCleanState, E::Verified) => S::Done,

            (state, E::Error(err)) if !state.is_terminal() => {
                self.error = Some(err.clone());
                S::Failed
            }

            (state, event) => {
                return Err(LaunchError::Internal(format!(
                    "Invalid rollback transition: {:?} -> {:?}",
                    state, event
                )));
            }
        };

        self.state = new_state;
        Ok(new_state)
    }
}

impl Default for RollbackFsm {
    fn default() -> Self {
        Self::new()
    }
}
