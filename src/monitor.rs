//! Session diagnostics: processing statistics, spoofing observations and
//! verification readiness.
//!
//! Spoofing observations are advisory. They are recorded for the exam flow to
//! weigh and never block capture or liveness.

use crate::types::QualityMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Signal mean below which a face looks like a poor reproduction
pub const POOR_QUALITY_BELOW: f32 = 50.0;
/// Signal mean above which a face looks suspiciously perfect
pub const STATIC_IMAGE_ABOVE: f32 = 95.0;
/// Face quality needed for verification readiness
pub const READY_FACE_QUALITY: u8 = 70;
/// Liveness progress needed for verification readiness (two of three checks)
pub const READY_LIVENESS_PROGRESS: u8 = 67;

const MAX_OBSERVATIONS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpoofingIndicator {
    PoorQuality,
    StaticImage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpoofingObservation {
    pub indicator: SpoofingIndicator,
    /// 0-100
    pub confidence: f32,
    pub observed_at: DateTime<Utc>,
}

/// Classify a frame's quality. Frames without a face are never flagged.
pub fn assess_spoofing(metrics: &QualityMetrics) -> Option<SpoofingObservation> {
    if !metrics.face_detected() {
        return None;
    }

    let mean = metrics.signal_mean();
    let (indicator, confidence) = if mean < POOR_QUALITY_BELOW {
        (SpoofingIndicator::PoorQuality, 100.0 - mean)
    } else if mean > STATIC_IMAGE_ABOVE {
        (SpoofingIndicator::StaticImage, mean - 80.0)
    } else {
        return None;
    };

    Some(SpoofingObservation {
        indicator,
        confidence,
        observed_at: Utc::now(),
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub frames_processed: u64,
    pub average_processing_ms: f64,
    pub fps: f64,
}

/// Accumulates per-frame timing and spoofing observations.
#[derive(Debug, Default)]
pub struct FrameMonitor {
    stats: ProcessingStats,
    last_frame_at: Option<Instant>,
    observations: Vec<SpoofingObservation>,
    spoofing_total: u64,
}

impl FrameMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one processed frame.
    pub fn record(
        &mut self,
        processing: Duration,
        metrics: &QualityMetrics,
        now: Instant,
    ) -> Option<SpoofingIndicator> {
        let count = self.stats.frames_processed + 1;
        let ms = processing.as_secs_f64() * 1000.0;
        self.stats.average_processing_ms =
            (self.stats.average_processing_ms * (count - 1) as f64 + ms) / count as f64;
        self.stats.frames_processed = count;

        if let Some(last) = self.last_frame_at {
            let gap = now.saturating_duration_since(last).as_secs_f64();
            if gap > 0.0 {
                self.stats.fps = 1.0 / gap;
            }
        }
        self.last_frame_at = Some(now);

        let observation = assess_spoofing(metrics)?;
        let indicator = observation.indicator;
        log::debug!(
            "Spoofing indicator {:?} (confidence {:.0})",
            indicator,
            observation.confidence
        );
        self.spoofing_total += 1;
        if self.observations.len() == MAX_OBSERVATIONS {
            self.observations.remove(0);
        }
        self.observations.push(observation);
        Some(indicator)
    }

    pub fn stats(&self) -> ProcessingStats {
        self.stats
    }

    /// Most recent observations, oldest first
    pub fn observations(&self) -> &[SpoofingObservation] {
        &self.observations
    }

    /// Observations ever recorded, including those no longer retained
    pub fn spoofing_total(&self) -> u64 {
        self.spoofing_total
    }
}

/// Whether enough evidence has accumulated to submit a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReadiness {
    pub ready: bool,
    /// Rounded signal mean of the current face, 0 without one
    pub face_quality: u8,
    /// Share of completed liveness checks, percent
    pub liveness_progress: u8,
    pub spoofing_observations: u64,
}

impl VerificationReadiness {
    pub fn evaluate(
        current: Option<&QualityMetrics>,
        liveness_progress: u8,
        spoofing_observations: u64,
    ) -> Self {
        let face_quality = match current {
            Some(metrics) if metrics.face_detected() => metrics.signal_mean().round() as u8,
            _ => 0,
        };
        Self {
            ready: face_quality >= READY_FACE_QUALITY
                && liveness_progress >= READY_LIVENESS_PROGRESS,
            face_quality,
            liveness_progress,
            spoofing_observations,
        }
    }
}
