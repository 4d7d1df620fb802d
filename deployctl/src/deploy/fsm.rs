//! Status state machine of a deployment attempt.
//!
//! Phases only move forward. [`transition`] is pure: the caller owns the
//! state and decides what to do with the display text.

use serde::{Deserialize, Serialize};

use deploy_api::ReadyState;

use crate::deploy::events::DeploymentEvent;
use crate::upload::progress::ProgressSample;
use crate::utils::format_bytes;

const PROGRESS_BAR_WIDTH: usize = 20;

/// User visible phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentPhase {
    /// Request sent, nothing reported yet
    SettingUp,

    /// Missing contents are being uploaded
    Uploading,

    /// Every upload finished, waiting for `created`
    Creating,

    Building,

    /// Ready, but checks have not reported yet
    RunningChecks,

    /// Ready, waiting for aliases
    Completing,

    Ready,
    Error,
    Canceled,
}

impl DeploymentPhase {
    /// Ordering of phases; terminal phases share the top rank
    pub fn rank(&self) -> u8 {
        match self {
            DeploymentPhase::SettingUp => 0,
            DeploymentPhase::Uploading => 1,
            DeploymentPhase::Creating => 2,
            DeploymentPhase::Building => 3,
            DeploymentPhase::RunningChecks => 4,
            DeploymentPhase::Completing => 5,
            DeploymentPhase::Ready | DeploymentPhase::Error | DeploymentPhase::Canceled => 6,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 6
    }

    /// Status line shown when the phase is entered
    pub fn label(&self) -> &'static str {
        match self {
            DeploymentPhase::SettingUp => "Setting up",
            DeploymentPhase::Uploading => "Uploading",
            DeploymentPhase::Creating => "Creating deployment",
            DeploymentPhase::Building => "Building",
            DeploymentPhase::RunningChecks => "Running checks",
            DeploymentPhase::Completing => "Completing",
            DeploymentPhase::Ready => "Ready",
            DeploymentPhase::Error => "Error",
            DeploymentPhase::Canceled => "Canceled",
        }
    }
}

/// State carried between transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusState {
    pub phase: DeploymentPhase,

    /// A `ready` (or an already ready `created`) was seen
    pub ready_seen: bool,

    /// Checks are registered or running and have not completed
    pub checks_pending: bool,
}

impl Default for StatusState {
    fn default() -> Self {
        Self {
            phase: DeploymentPhase::SettingUp,
            ready_seen: false,
            checks_pending: false,
        }
    }
}

/// Apply `event` to `state`.
///
/// Returns the next state and the status text to show, if it changed.
/// Events that would move the phase backwards, and anything after a terminal
/// phase, leave the phase untouched and produce no text.
pub fn transition(state: &StatusState, event: &DeploymentEvent) -> (StatusState, Option<String>) {
    if state.phase.is_terminal() {
        return (state.clone(), None);
    }
    let mut next = state.clone();

    let text = match event {
        DeploymentEvent::FileCount(count) => advance(&mut next, DeploymentPhase::Uploading).map(|_| {
            format!(
                "Uploading {} files ({})",
                count.uploads.len(),
                format_bytes(count.missing_size())
            )
        }),
        DeploymentEvent::UploadProgress(sample) => {
            (next.phase == DeploymentPhase::Uploading).then(|| progress_text(sample))
        }
        DeploymentEvent::FileUploaded(file) if file.remaining == 0 => {
            advance(&mut next, DeploymentPhase::Creating)
        }
        DeploymentEvent::FileUploaded(_) => None,
        DeploymentEvent::Created(d) => {
            next.checks_pending = d.checks_pending();
            if d.ready_state == ReadyState::Ready {
                next.ready_seen = true;
                let target = after_ready(&next);
                advance(&mut next, target)
            } else {
                advance(&mut next, DeploymentPhase::Building)
            }
        }
        DeploymentEvent::Building(_) => advance(&mut next, DeploymentPhase::Building),
        DeploymentEvent::ChecksRunning(_) => {
            next.checks_pending = true;
            advance(&mut next, DeploymentPhase::RunningChecks)
        }
        DeploymentEvent::Ready(d) => {
            next.ready_seen = true;
            if d.checks_state.is_some() {
                next.checks_pending = d.checks_pending();
            }
            let target = after_ready(&next);
            advance(&mut next, target)
        }
        DeploymentEvent::ChecksCompleted(_) => {
            next.checks_pending = false;
            if next.ready_seen {
                advance(&mut next, DeploymentPhase::Completing)
            } else {
                None
            }
        }
        DeploymentEvent::AliasAssigned(_) => advance(&mut next, DeploymentPhase::Ready),
        DeploymentEvent::ChecksConclusionFailed(_) => {
            advance(&mut next, DeploymentPhase::Error).map(|_| "Checks failed".to_string())
        }
        DeploymentEvent::Error(body) => {
            advance(&mut next, DeploymentPhase::Error).map(|_| format!("Error: {}", body.message))
        }
        DeploymentEvent::Canceled(_) => advance(&mut next, DeploymentPhase::Canceled),
        DeploymentEvent::Tip(_) | DeploymentEvent::Notice(_) | DeploymentEvent::Warning(_) => None,
    };

    (next, text)
}

fn after_ready(state: &StatusState) -> DeploymentPhase {
    if state.checks_pending {
        DeploymentPhase::RunningChecks
    } else {
        DeploymentPhase::Completing
    }
}

fn advance(state: &mut StatusState, target: DeploymentPhase) -> Option<String> {
    if target.rank() <= state.phase.rank() {
        return None;
    }
    state.phase = target;
    Some(target.label().to_string())
}

fn progress_text(sample: &ProgressSample) -> String {
    let filled = (sample.fraction() * PROGRESS_BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(PROGRESS_BAR_WIDTH);
    format!(
        "Uploading [{}{}] ({}/{})",
        "=".repeat(filled),
        " ".repeat(PROGRESS_BAR_WIDTH - filled),
        format_bytes(sample.uploaded),
        format_bytes(sample.total)
    )
}

/// Stateful wrapper around [`transition`]
#[derive(Debug, Clone, Default)]
pub struct StatusFsm {
    state: StatusState,
}

impl StatusFsm {
    /// Create a new FSM in the setting-up phase
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &StatusState {
        &self.state
    }

    pub fn phase(&self) -> DeploymentPhase {
        self.state.phase
    }

    /// Process an event; returns the new status text, if any
    pub fn process(&mut self, event: &DeploymentEvent) -> Option<String> {
        let (next, text) = transition(&self.state, event);
        self.state = next;
        text
    }
}
