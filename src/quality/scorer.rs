use super::region::LumaPlane;
use super::signals::{eye_contrast, is_frontal, lighting_score, positioning_score, sharpness_score};
use crate::config::QualityConfig;
use crate::types::{DetectionResult, Frame, QualityMetrics, QualitySignals};

/// Scores how suitable a frame is for an identity photo.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    config: QualityConfig,
}

impl QualityScorer {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Score a frame against its best detection.
    ///
    /// Without a detection, or for a malformed frame, every signal is zero and
    /// every gate is closed.
    pub fn score(&self, frame: &Frame, detection: Option<&DetectionResult>) -> QualityMetrics {
        let Some(detection) = detection else {
            return QualityMetrics::empty();
        };
        let Some(plane) = LumaPlane::from_frame(frame) else {
            log::debug!("Skipping quality scoring for malformed frame {}", frame.id);
            return QualityMetrics::empty();
        };

        let face = plane.region(&detection.bounding_box);
        if face.is_empty() {
            return QualityMetrics::empty();
        }

        let metrics = QualityMetrics::from_signals(QualitySignals {
            lighting: lighting_score(&plane, &face),
            sharpness: sharpness_score(&plane, &face),
            positioning: positioning_score(&detection.bounding_box, frame.width, frame.height),
            face_detected: detection.confidence_score >= self.config.min_face_confidence,
            eyes_open: eye_contrast(&plane, &face) >= self.config.eyes_open_contrast,
            frontal_pose: is_frontal(&plane, &face, self.config.frontal_symmetry_tolerance),
        });

        log::trace!(
            "Frame {} quality: lighting={:.1} sharpness={:.1} positioning={:.1} overall={:.1}",
            frame.sequence,
            metrics.lighting(),
            metrics.sharpness(),
            metrics.positioning(),
            metrics.overall()
        );
        metrics
    }
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new(QualityConfig::default())
    }
}
