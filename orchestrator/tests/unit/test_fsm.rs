//! Rollback FSM unit tests

use launchpad::rollback::fsm::{RollbackEvent, RollbackFsm, RollbackState};

fn confirmed(backup: bool) -> RollbackFsm {
    let mut fsm = RollbackFsm::new();
    fsm.process(RollbackEvent::Begin).unwrap();
    fsm.process(RollbackEvent::Confirmed { backup }).unwrap();
    fsm
}

#[test]
fn test_fsm_initial_state() {
    let fsm = RollbackFsm::new();
    assert_eq!(fsm.state(), RollbackState::Start);
    assert!(fsm.error().is_none());
    assert!(!fsm.state().is_terminal());
}

#[test]
fn test_fsm_backup_declined() {
    let mut fsm = confirmed(true);
    assert_eq!(fsm.state(), RollbackState::BackupAttempt);

    fsm.process(RollbackEvent::Declined).unwrap();
    assert_eq!(fsm.state(), RollbackState::Cancelled);
}

#[test]
fn test_fsm_data_failure() {
    let mut fsm = confirmed(false);
    fsm.process(RollbackEvent::TeardownDone { delete_data: true })
        .unwrap();
    fsm.process(RollbackEvent::Error("pvc delete failed".to_string()))
        .unwrap();

    assert_eq!(fsm.state(), RollbackState::Failed);
    assert_eq!(fsm.error(), Some("pvc delete failed"));
}

#[test]
fn test_fsm_cannot_skip_teardown() {
    let mut fsm = confirmed(false);
    assert!(fsm.process(RollbackEvent::NamespaceHandled).is_err());
    assert!(fsm.process(RollbackEvent::DataDeleted).is_err());
    assert_eq!(fsm.state(), RollbackState::ReleaseTeardown);
}

#[test]
fn test_fsm_terminal_states_are_final() {
    let mut fsm = confirmed(false);
    fsm.process(RollbackEvent::TeardownDone { delete_data: false })
        .unwrap();
    fsm.process(RollbackEvent::NamespaceHandled).unwrap();
    fsm.process(RollbackEvent::Verified).unwrap();
    assert_eq!(fsm.state(), RollbackState::Done);

    for event in [
        RollbackEvent::Begin,
        RollbackEvent::Declined,
        RollbackEvent::Verified,
        RollbackEvent::Error("late".to_string()),
    ] {
        assert!(fsm.process(event).is_err());
        assert_eq!(fsm.state(), RollbackState::Done);
    }
}
