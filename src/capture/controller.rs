//! Capture state machine
//!
//! `Idle -> ReadyCountdown(n) -> Capturing -> Captured`, with `is_capturing`
//! set from the moment a countdown starts or auto-capture fires until the
//! snapshot is encoded or rolled back. All transitions are synchronous; timers
//! live in [`super::CaptureSession`].

use super::encode::FrameEncoder;
use crate::config::CaptureConfig;
use crate::errors::CaptureError;
use crate::types::{CapturedImage, Frame, QualityMetrics};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "remaining", rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    ReadyCountdown(u8),
    Capturing,
    Captured,
}

/// Result of one countdown second
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStep {
    /// Seconds left, always at least 1
    Remaining(u8),
    /// Countdown reached zero; the controller is now `Capturing`
    Fire,
}

/// Outcome of evaluating one quality sample for auto-capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoCaptureDecision {
    Disabled,
    /// A capture is in flight or already taken
    Suppressed,
    BelowThreshold,
    /// First sample above threshold; waiting for the grace delay
    Armed,
    Waiting,
    /// Quality held through the grace delay; the controller is now `Capturing`
    Fire,
}

pub struct CaptureController {
    config: CaptureConfig,
    state: CaptureState,
    capturing: bool,
    armed_at: Option<Instant>,
    captured: Option<CapturedImage>,
    confirmed: bool,
    attempts: u32,
    best_quality: Option<QualityMetrics>,
}

impl CaptureController {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            state: CaptureState::Idle,
            capturing: false,
            armed_at: None,
            captured: None,
            confirmed: false,
            attempts: 0,
            best_quality: None,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn auto_capture_enabled(&self) -> bool {
        self.config.auto_capture
    }

    /// The pending image, until retake releases it
    pub fn captured(&self) -> Option<&CapturedImage> {
        self.captured.as_ref()
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Successful captures in this session, including retaken ones
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Best quality snapshot among all captures so far
    pub fn best_quality(&self) -> Option<QualityMetrics> {
        self.best_quality
    }

    /// Start a manual capture countdown.
    pub fn begin_countdown(&mut self) -> Result<u8, CaptureError> {
        if self.capturing {
            return Err(CaptureError::Busy);
        }
        if self.state != CaptureState::Idle {
            return Err(CaptureError::InvalidState(format!(
                "cannot start a countdown while {:?}",
                self.state
            )));
        }

        let start = self.config.countdown_secs.max(1);
        self.state = CaptureState::ReadyCountdown(start);
        self.capturing = true;
        self.armed_at = None;
        log::info!("Manual capture countdown started at {}", start);
        Ok(start)
    }

    /// Advance the countdown by one second.
    ///
    /// Yields `Remaining(2)` and `Remaining(1)` from a start of 3. The tick that
    /// reaches zero is `Fire`, which leaves the controller `Capturing`, so
    /// `ReadyCountdown(0)` is never a resting state.
    pub fn countdown_tick(&mut self) -> Result<CountdownStep, CaptureError> {
        match self.state {
            CaptureState::ReadyCountdown(n) if n > 1 => {
                self.state = CaptureState::ReadyCountdown(n - 1);
                Ok(CountdownStep::Remaining(n - 1))
            }
            CaptureState::ReadyCountdown(_) => {
                self.state = CaptureState::Capturing;
                Ok(CountdownStep::Fire)
            }
            other => Err(CaptureError::InvalidState(format!(
                "no countdown running ({:?})",
                other
            ))),
        }
    }

    /// Feed one quality sample to the auto-capture rule.
    ///
    /// Fires when `overall` exceeds the threshold and still does on a sample at
    /// least the grace delay after it was first seen above it. Any sample at or
    /// below the threshold disarms.
    pub fn evaluate_auto(&mut self, metrics: &QualityMetrics, now: Instant) -> AutoCaptureDecision {
        if !self.config.auto_capture {
            return AutoCaptureDecision::Disabled;
        }
        if self.capturing || self.state != CaptureState::Idle {
            return AutoCaptureDecision::Suppressed;
        }
        if metrics.overall() <= self.config.auto_capture_threshold {
            self.armed_at = None;
            return AutoCaptureDecision::BelowThreshold;
        }

        match self.armed_at {
            None => {
                self.armed_at = Some(now);
                log::debug!(
                    "Auto-capture armed at overall {:.1}",
                    metrics.overall()
                );
                AutoCaptureDecision::Armed
            }
            Some(armed) if now.saturating_duration_since(armed) >= self.config.grace_delay() => {
                self.armed_at = None;
                self.state = CaptureState::Capturing;
                self.capturing = true;
                log::info!("Auto-capture triggered at overall {:.1}", metrics.overall());
                AutoCaptureDecision::Fire
            }
            Some(_) => AutoCaptureDecision::Waiting,
        }
    }

    /// Snapshot `frame` while `Capturing`. On failure the controller rolls back
    /// to `Idle` with `is_capturing` cleared.
    pub fn complete_capture(
        &mut self,
        frame: &Frame,
        quality: QualityMetrics,
        encoder: &dyn FrameEncoder,
    ) -> Result<CapturedImage, CaptureError> {
        if self.state != CaptureState::Capturing {
            return Err(CaptureError::InvalidState(format!(
                "cannot snapshot while {:?}",
                self.state
            )));
        }

        match encoder.encode(frame, quality) {
            Ok(image) => {
                self.state = CaptureState::Captured;
                self.capturing = false;
                self.confirmed = false;
                self.attempts += 1;
                let better = self
                    .best_quality
                    .map_or(true, |best| quality.overall() > best.overall());
                if better {
                    self.best_quality = Some(quality);
                }
                self.captured = Some(image.clone());
                log::info!(
                    "Captured {}x{} image {} (overall {:.1})",
                    image.width(),
                    image.height(),
                    image.id(),
                    quality.overall()
                );
                Ok(image)
            }
            Err(e) => {
                log::error!("Capture failed, returning to idle: {}", e);
                self.abort();
                Err(e)
            }
        }
    }

    /// Abandon a countdown or an in-flight capture. No-op otherwise.
    pub fn abort(&mut self) {
        if matches!(
            self.state,
            CaptureState::ReadyCountdown(_) | CaptureState::Capturing
        ) {
            self.state = CaptureState::Idle;
        }
        self.capturing = false;
    }

    /// Hand the captured image over. Only once per capture.
    pub fn confirm(&mut self) -> Result<CapturedImage, CaptureError> {
        if self.state != CaptureState::Captured || self.confirmed {
            return Err(CaptureError::NothingToConfirm);
        }
        let image = self
            .captured
            .clone()
            .ok_or(CaptureError::NothingToConfirm)?;
        self.confirmed = true;
        Ok(image)
    }

    /// Release the previous image and return to `Idle`.
    ///
    /// Returns whether the quality loop should be restarted.
    pub fn retake(&mut self) -> Result<bool, CaptureError> {
        if self.capturing {
            return Err(CaptureError::Busy);
        }
        if let Some(previous) = self.captured.take() {
            log::info!("Releasing captured image {} for retake", previous.id());
        }
        self.state = CaptureState::Idle;
        self.confirmed = false;
        self.armed_at = None;
        Ok(self.config.auto_capture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::JpegFrameEncoder;
    use crate::testing::{synthetic_face_frame, FaceParams};
    use crate::types::QualitySignals;
    use std::time::Duration;

    fn quality(overall: f32) -> QualityMetrics {
        QualityMetrics::from_signals(QualitySignals {
            lighting: overall,
            sharpness: overall,
            positioning: overall,
            face_detected: true,
            eyes_open: true,
            frontal_pose: true,
        })
    }

    struct BrokenEncoder;

    impl FrameEncoder for BrokenEncoder {
        fn encode(&self, _: &Frame, _: QualityMetrics) -> Result<CapturedImage, CaptureError> {
            Err(CaptureError::Encoding("disk full".to_string()))
        }
    }

    #[test]
    fn test_manual_countdown_runs_three_to_zero() {
        let mut controller = CaptureController::new(CaptureConfig::default());
        assert_eq!(controller.begin_countdown().unwrap(), 3);
        assert!(controller.is_capturing());

        assert_eq!(controller.countdown_tick().unwrap(), CountdownStep::Remaining(2));
        assert_eq!(controller.countdown_tick().unwrap(), CountdownStep::Remaining(1));
        assert_eq!(controller.countdown_tick().unwrap(), CountdownStep::Fire);
        assert_eq!(controller.state(), CaptureState::Capturing);

        let frame = synthetic_face_frame(64, 48, FaceParams::default());
        let image = controller
            .complete_capture(&frame, quality(90.0), &JpegFrameEncoder::default())
            .unwrap();
        assert_eq!(controller.state(), CaptureState::Captured);
        assert!(!controller.is_capturing());
        assert_eq!(image.width(), 64);
        assert_eq!(controller.attempts(), 1);
    }

    #[test]
    fn test_countdown_never_rests_at_zero() {
        let config = CaptureConfig {
            countdown_secs: 1,
            ..CaptureConfig::default()
        };
        let mut controller = CaptureController::new(config);
        assert_eq!(controller.begin_countdown().unwrap(), 1);
        assert_eq!(controller.state(), CaptureState::ReadyCountdown(1));

        assert_eq!(controller.countdown_tick().unwrap(), CountdownStep::Fire);
        assert_eq!(controller.state(), CaptureState::Capturing);
        assert!(controller.countdown_tick().is_err());
    }

    #[test]
    fn test_second_trigger_is_busy() {
        let mut controller = CaptureController::new(CaptureConfig::default());
        controller.begin_countdown().unwrap();
        assert!(matches!(controller.begin_countdown(), Err(CaptureError::Busy)));
        assert_eq!(
            controller.evaluate_auto(&quality(99.0), Instant::now()),
            AutoCaptureDecision::Suppressed
        );
    }

    #[test]
    fn test_auto_capture_needs_grace_delay() {
        let mut controller = CaptureController::new(CaptureConfig::default());
        let t0 = Instant::now();

        assert_eq!(controller.evaluate_auto(&quality(90.0), t0), AutoCaptureDecision::Armed);
        assert_eq!(
            controller.evaluate_auto(&quality(90.0), t0 + Duration::from_millis(500)),
            AutoCaptureDecision::Waiting
        );
        assert_eq!(
            controller.evaluate_auto(&quality(90.0), t0 + Duration::from_millis(1000)),
            AutoCaptureDecision::Fire
        );
        assert!(controller.is_capturing());
        assert!(matches!(controller.begin_countdown(), Err(CaptureError::Busy)));
    }

    #[test]
    fn test_transient_spike_disarms() {
        let mut controller = CaptureController::new(CaptureConfig::default());
        let t0 = Instant::now();

        controller.evaluate_auto(&quality(90.0), t0);
        assert_eq!(
            controller.evaluate_auto(&quality(60.0), t0 + Duration::from_millis(500)),
            AutoCaptureDecision::BelowThreshold
        );
        assert_eq!(
            controller.evaluate_auto(&quality(90.0), t0 + Duration::from_millis(1000)),
            AutoCaptureDecision::Armed
        );
        // exactly at the threshold does not count
        assert_eq!(
            controller.evaluate_auto(&quality(85.0), t0 + Duration::from_millis(1500)),
            AutoCaptureDecision::BelowThreshold
        );
    }

    #[test]
    fn test_auto_disabled() {
        let config = CaptureConfig {
            auto_capture: false,
            ..CaptureConfig::default()
        };
        let mut controller = CaptureController::new(config);
        assert_eq!(
            controller.evaluate_auto(&quality(99.0), Instant::now()),
            AutoCaptureDecision::Disabled
        );
    }

    #[test]
    fn test_encoding_failure_rolls_back() {
        let mut controller = CaptureController::new(CaptureConfig::default());
        controller.begin_countdown().unwrap();
        while controller.countdown_tick().unwrap() != CountdownStep::Fire {}

        let frame = synthetic_face_frame(32, 24, FaceParams::default());
        let result = controller.complete_capture(&frame, quality(90.0), &BrokenEncoder);
        assert!(matches!(result, Err(CaptureError::Encoding(_))));
        assert_eq!(controller.state(), CaptureState::Idle);
        assert!(!controller.is_capturing());
        assert!(controller.captured().is_none());
        assert_eq!(controller.attempts(), 0);
    }

    #[test]
    fn test_confirm_once_and_retake() {
        let mut controller = CaptureController::new(CaptureConfig::default());
        assert!(matches!(controller.confirm(), Err(CaptureError::NothingToConfirm)));

        let t0 = Instant::now();
        controller.evaluate_auto(&quality(88.0), t0);
        controller.evaluate_auto(&quality(88.0), t0 + Duration::from_secs(1));
        let frame = synthetic_face_frame(32, 24, FaceParams::default());
        let first = controller
            .complete_capture(&frame, quality(88.0), &JpegFrameEncoder::default())
            .unwrap();

        assert_eq!(controller.confirm().unwrap().id(), first.id());
        assert!(matches!(controller.confirm(), Err(CaptureError::NothingToConfirm)));

        assert!(controller.retake().unwrap());
        assert_eq!(controller.state(), CaptureState::Idle);
        assert!(controller.captured().is_none());
        assert!(matches!(controller.confirm(), Err(CaptureError::NothingToConfirm)));
    }

    #[test]
    fn test_best_quality_tracks_highest() {
        let mut controller = CaptureController::new(CaptureConfig::default());
        let frame = synthetic_face_frame(32, 24, FaceParams::default());
        for overall in [88.0, 95.0, 90.0] {
            controller.begin_countdown().unwrap();
            while controller.countdown_tick().unwrap() != CountdownStep::Fire {}
            controller
                .complete_capture(&frame, quality(overall), &JpegFrameEncoder::default())
                .unwrap();
            controller.retake().unwrap();
        }
        assert_eq!(controller.attempts(), 3);
        assert!((controller.best_quality().unwrap().overall() - 95.0).abs() < 1e-4);
    }
}
