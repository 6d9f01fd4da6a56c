use serde::{Deserialize, Serialize};
use std::fmt;

/// A liveness challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessCheckId {
    Blink,
    Smile,
    HeadTurn,
}

impl LivenessCheckId {
    /// Every check, in the order a session visits them
    pub const ALL: [LivenessCheckId; 3] = [
        LivenessCheckId::Blink,
        LivenessCheckId::Smile,
        LivenessCheckId::HeadTurn,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            LivenessCheckId::Blink => "Blink Detection",
            LivenessCheckId::Smile => "Smile Detection",
            LivenessCheckId::HeadTurn => "Head Movement",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            LivenessCheckId::Blink => "Please blink your eyes naturally",
            LivenessCheckId::Smile => "Please smile naturally",
            LivenessCheckId::HeadTurn => "Please turn your head slowly left, then right",
        }
    }
}

impl fmt::Display for LivenessCheckId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LivenessCheckId::Blink => write!(f, "blink"),
            LivenessCheckId::Smile => write!(f, "smile"),
            LivenessCheckId::HeadTurn => write!(f, "head_turn"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "remaining", rename_all = "snake_case")]
pub enum CheckStatus {
    Idle,
    ReadyCountdown(u8),
    Detecting,
    Success,
    Failed,
}

/// Progress of one check within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessCheckState {
    pub id: LivenessCheckId,
    pub status: CheckStatus,
    pub attempts: u32,
    pub completed: bool,
    /// Completed by skipping rather than passing
    pub skipped: bool,
}

impl LivenessCheckState {
    pub fn new(id: LivenessCheckId) -> Self {
        Self {
            id,
            status: CheckStatus::Idle,
            attempts: 0,
            completed: false,
            skipped: false,
        }
    }
}

/// Verdict for one detection window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    Failed,
}

impl Verdict {
    pub fn from_passed(passed: bool) -> Self {
        if passed {
            Verdict::Success
        } else {
            Verdict::Failed
        }
    }
}
