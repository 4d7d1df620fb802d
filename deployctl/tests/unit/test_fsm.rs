//! Status state machine tests

use deploy_api::{ApiErrorBody, ChecksState};
use deployctl::deploy::events::{DeploymentEvent, FileCountEvent, PendingUpload};
use deployctl::deploy::fsm::{transition, DeploymentPhase, StatusFsm, StatusState};
use deployctl::upload::{ProgressSample, UploadedFile};

use crate::mock_api::deployment;

fn uploaded(remaining: usize) -> DeploymentEvent {
    DeploymentEvent::FileUploaded(UploadedFile {
        hash: format!("h{}", remaining),
        size: 10,
        names: vec!["a.txt".to_string()],
        remaining,
    })
}

fn file_count() -> DeploymentEvent {
    DeploymentEvent::FileCount(FileCountEvent {
        total: 2,
        total_size: 20,
        missing: vec!["h0".to_string(), "h1".to_string()],
        uploads: vec![
            PendingUpload {
                hash: "h0".to_string(),
                size: 10,
                names: vec!["a.txt".to_string()],
            },
            PendingUpload {
                hash: "h1".to_string(),
                size: 10,
                names: vec!["b.txt".to_string()],
            },
        ],
    })
}

#[test]
fn test_fsm_initial_state() {
    let fsm = StatusFsm::new();
    assert_eq!(fsm.phase(), DeploymentPhase::SettingUp);
    assert!(!fsm.state().ready_seen);
    assert!(!fsm.state().checks_pending);
}

#[test]
fn test_fsm_full_walk_is_monotonic() {
    let events = vec![
        file_count(),
        DeploymentEvent::UploadProgress(ProgressSample { uploaded: 0, total: 20 }),
        uploaded(1),
        DeploymentEvent::UploadProgress(ProgressSample { uploaded: 20, total: 20 }),
        uploaded(0),
        DeploymentEvent::Created(deployment("QUEUED")),
        DeploymentEvent::Building(deployment("BUILDING")),
        DeploymentEvent::Building(deployment("BUILDING")),
        DeploymentEvent::ChecksRunning(deployment("BUILDING")),
        DeploymentEvent::Ready(deployment("READY")),
        DeploymentEvent::ChecksCompleted(deployment("READY")),
        DeploymentEvent::AliasAssigned(deployment("READY")),
    ];

    let mut fsm = StatusFsm::new();
    let mut phases = vec![fsm.phase()];
    for event in &events {
        fsm.process(event);
        phases.push(fsm.phase());
    }

    for pair in phases.windows(2) {
        assert!(pair[0].rank() <= pair[1].rank(), "{:?} -> {:?}", pair[0], pair[1]);
    }
    assert!(phases.contains(&DeploymentPhase::Uploading));
    assert!(phases.contains(&DeploymentPhase::Creating));
    assert!(phases.contains(&DeploymentPhase::RunningChecks));
    assert!(phases.contains(&DeploymentPhase::Completing));
    assert_eq!(fsm.phase(), DeploymentPhase::Ready);
}

#[test]
fn test_fsm_creating_after_last_upload() {
    let mut fsm = StatusFsm::new();
    fsm.process(&file_count());
    assert!(fsm.process(&uploaded(1)).is_none());
    assert_eq!(fsm.phase(), DeploymentPhase::Uploading);

    assert_eq!(fsm.process(&uploaded(0)).as_deref(), Some("Creating deployment"));
    assert_eq!(fsm.phase(), DeploymentPhase::Creating);
}

#[test]
fn test_fsm_checks_absent_and_completed_both_complete() {
    let mut without_checks = deployment("READY");
    without_checks.checks_state = None;
    let mut completed = deployment("READY");
    completed.checks_state = Some(ChecksState::Completed);

    for ready in [without_checks, completed] {
        let mut fsm = StatusFsm::new();
        fsm.process(&DeploymentEvent::Created(deployment("QUEUED")));
        fsm.process(&DeploymentEvent::Ready(ready));
        assert_eq!(fsm.phase(), DeploymentPhase::Completing);
    }
}

#[test]
fn test_fsm_registered_checks_wait() {
    let mut ready = deployment("READY");
    ready.checks_state = Some(ChecksState::Registered);

    let mut fsm = StatusFsm::new();
    fsm.process(&DeploymentEvent::Created(deployment("QUEUED")));
    fsm.process(&DeploymentEvent::Ready(ready));
    assert_eq!(fsm.phase(), DeploymentPhase::RunningChecks);
    assert!(fsm.state().checks_pending);
}

#[test]
fn test_fsm_never_regresses() {
    let state = StatusState {
        phase: DeploymentPhase::Completing,
        ready_seen: true,
        checks_pending: false,
    };
    let (next, text) = transition(&state, &DeploymentEvent::Building(deployment("BUILDING")));
    assert_eq!(next.phase, DeploymentPhase::Completing);
    assert!(text.is_none());
}

#[test]
fn test_fsm_error_and_checks_failure() {
    let mut fsm = StatusFsm::new();
    fsm.process(&DeploymentEvent::Created(deployment("QUEUED")));
    let text = fsm.process(&DeploymentEvent::ChecksConclusionFailed(deployment("READY")));
    assert_eq!(fsm.phase(), DeploymentPhase::Error);
    assert_eq!(text.as_deref(), Some("Checks failed"));

    let mut fsm = StatusFsm::new();
    let text = fsm.process(&DeploymentEvent::Error(ApiErrorBody {
        code: "internal".to_string(),
        message: "boom".to_string(),
        link: None,
        action: None,
        framework: None,
    }));
    assert_eq!(fsm.phase(), DeploymentPhase::Error);
    assert_eq!(text.as_deref(), Some("Error: boom"));
}
