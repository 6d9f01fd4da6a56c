//! Liveness session state machine
//!
//! Checks are visited strictly in blink, smile, head-turn order. Each goes
//! `Idle -> ReadyCountdown(n) -> Detecting -> {Success | Failed}`; a failed
//! check is retried or, when the policy allows it, skipped. The aggregate
//! [`LivenessResult`] can be taken exactly once, after every check completed.

use super::check::{CheckStatus, LivenessCheckId, LivenessCheckState, Verdict};
use crate::config::LivenessConfig;
use crate::errors::LivenessError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final state of one check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub id: LivenessCheckId,
    pub attempts: u32,
    pub passed: bool,
    pub skipped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessResult {
    /// In visiting order
    pub checks: Vec<CheckOutcome>,
    pub total_attempts: u32,
    pub completed_at: DateTime<Utc>,
}

impl LivenessResult {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
    }
}

pub struct LivenessSession {
    checks: Vec<LivenessCheckState>,
    cursor: usize,
    countdown_secs: u8,
    allow_skip: bool,
    result_taken: bool,
}

impl LivenessSession {
    pub fn new(config: &LivenessConfig) -> Self {
        // Fixed order regardless of how the configuration lists them
        let checks = LivenessCheckId::ALL
            .into_iter()
            .filter(|id| config.checks.contains(id))
            .map(LivenessCheckState::new)
            .collect();

        Self {
            checks,
            cursor: 0,
            countdown_secs: config.countdown_secs.max(1),
            allow_skip: config.allow_skip,
            result_taken: false,
        }
    }

    pub fn checks(&self) -> &[LivenessCheckState] {
        &self.checks
    }

    pub fn current(&self) -> Option<&LivenessCheckState> {
        self.checks.get(self.cursor)
    }

    pub fn current_id(&self) -> Option<LivenessCheckId> {
        self.current().map(|check| check.id)
    }

    pub fn allow_skip(&self) -> bool {
        self.allow_skip
    }

    pub fn is_complete(&self) -> bool {
        self.checks.iter().all(|check| check.completed)
    }

    pub fn total_attempts(&self) -> u32 {
        self.checks.iter().map(|check| check.attempts).sum()
    }

    /// Completed checks as a rounded percentage
    pub fn progress_percent(&self) -> u8 {
        if self.checks.is_empty() {
            return 100;
        }
        let completed = self.checks.iter().filter(|check| check.completed).count();
        ((completed as f32 / self.checks.len() as f32) * 100.0).round() as u8
    }

    fn current_mut(&mut self) -> Result<&mut LivenessCheckState, LivenessError> {
        self.checks
            .get_mut(self.cursor)
            .ok_or(LivenessError::SessionComplete)
    }

    fn invalid(check: &LivenessCheckState, action: &str) -> LivenessError {
        LivenessError::InvalidState(format!(
            "cannot {} {} while {:?}",
            action, check.id, check.status
        ))
    }

    /// Start the countdown for the current check.
    pub fn begin_check(&mut self) -> Result<(LivenessCheckId, u8), LivenessError> {
        let countdown = self.countdown_secs;
        let check = self.current_mut()?;
        if check.status != CheckStatus::Idle {
            return Err(Self::invalid(check, "begin"));
        }
        check.status = CheckStatus::ReadyCountdown(countdown);
        log::info!("Liveness check {} starting", check.id);
        Ok((check.id, countdown))
    }

    /// One countdown second. Returns the new status.
    ///
    /// The countdown shows `ReadyCountdown(3)`, `(2)` and `(1)`. The tick that
    /// reaches zero is the move to `Detecting`, so `ReadyCountdown(0)` is never
    /// observed and the countdown lasts exactly `countdown_secs` seconds.
    pub fn countdown_tick(&mut self) -> Result<CheckStatus, LivenessError> {
        let check = self.current_mut()?;
        check.status = match check.status {
            CheckStatus::ReadyCountdown(n) if n > 1 => CheckStatus::ReadyCountdown(n - 1),
            CheckStatus::ReadyCountdown(_) => CheckStatus::Detecting,
            _ => return Err(Self::invalid(check, "count down")),
        };
        Ok(check.status)
    }

    /// Record the verdict of the detection window.
    pub fn finish_detection(&mut self, verdict: Verdict) -> Result<CheckStatus, LivenessError> {
        let check = self.current_mut()?;
        if check.status != CheckStatus::Detecting {
            return Err(Self::invalid(check, "finish"));
        }

        check.attempts += 1;
        check.status = match verdict {
            Verdict::Success => {
                check.completed = true;
                CheckStatus::Success
            }
            Verdict::Failed => CheckStatus::Failed,
        };
        log::info!(
            "Liveness check {} attempt {}: {:?}",
            check.id,
            check.attempts,
            verdict
        );
        Ok(check.status)
    }

    /// Move past a successful check. Returns the next check, `None` once the
    /// session is complete.
    pub fn advance(&mut self) -> Result<Option<LivenessCheckId>, LivenessError> {
        let check = self.current_mut()?;
        if check.status != CheckStatus::Success {
            return Err(Self::invalid(check, "advance past"));
        }
        self.cursor += 1;
        Ok(self.current_id())
    }

    /// Restart a failed check from its countdown.
    pub fn retry(&mut self) -> Result<(LivenessCheckId, u8), LivenessError> {
        let countdown = self.countdown_secs;
        let check = self.current_mut()?;
        if check.status != CheckStatus::Failed {
            return Err(Self::invalid(check, "retry"));
        }
        check.status = CheckStatus::ReadyCountdown(countdown);
        log::info!("Retrying liveness check {}", check.id);
        Ok((check.id, countdown))
    }

    /// Mark a failed check completed without passing it and move on.
    ///
    /// Counts as an attempt. Only permitted when the configuration allows it.
    pub fn skip(&mut self) -> Result<Option<LivenessCheckId>, LivenessError> {
        if !self.allow_skip {
            return Err(LivenessError::SkipDisabled);
        }
        let check = self.current_mut()?;
        if check.status != CheckStatus::Failed {
            return Err(Self::invalid(check, "skip"));
        }
        check.attempts += 1;
        check.completed = true;
        check.skipped = true;
        log::warn!("Liveness check {} skipped after {} attempts", check.id, check.attempts);
        self.cursor += 1;
        Ok(self.current_id())
    }

    /// Return an in-progress countdown or detection to `Idle` without counting it.
    pub fn abort_attempt(&mut self) {
        if let Some(check) = self.checks.get_mut(self.cursor) {
            if matches!(
                check.status,
                CheckStatus::ReadyCountdown(_) | CheckStatus::Detecting
            ) {
                check.status = if check.attempts > 0 {
                    CheckStatus::Failed
                } else {
                    CheckStatus::Idle
                };
            }
        }
    }

    /// The aggregate result. `Some` exactly once, after every check completed.
    pub fn take_result(&mut self) -> Option<LivenessResult> {
        if self.result_taken || !self.is_complete() {
            return None;
        }
        self.result_taken = true;

        let result = LivenessResult {
            checks: self
                .checks
                .iter()
                .map(|check| CheckOutcome {
                    id: check.id,
                    attempts: check.attempts,
                    passed: check.completed && !check.skipped,
                    skipped: check.skipped,
                })
                .collect(),
            total_attempts: self.total_attempts(),
            completed_at: Utc::now(),
        };
        log::info!(
            "Liveness session complete: {} attempts, all passed: {}",
            result.total_attempts,
            result.all_passed()
        );
        Some(result)
    }
}
