//! Face detection
//!
//! [`DetectorEngine`] picks its strategy once, at construction: the SeetaFace
//! model when its assets load, otherwise the skin-tone heuristic for the rest of
//! the session. Per-frame failures of the model fall back to the heuristic for
//! that frame only and are never surfaced to the caller.

pub mod heuristic;
pub mod manifest;
pub mod model;

pub use heuristic::HeuristicDetector;
pub use manifest::AssetManifest;
pub use model::ModelDetector;

use crate::config::DetectorConfig;
use crate::errors::DetectorError;
use crate::types::{DetectionResult, Frame};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// A face detection strategy.
pub trait FaceDetector: Send + Sync {
    fn name(&self) -> &str;

    /// Detect faces, best candidate first.
    fn detect(&self, frame: &Frame) -> Result<Vec<DetectionResult>, DetectorError>;
}

/// Strategy the engine settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorMode {
    Model,
    Heuristic,
}

/// Running counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorStats {
    pub frames: u64,
    pub faces: u64,
    /// Frames answered by the heuristic
    pub fallbacks: u64,
    /// Primary strategy failures
    pub errors: u64,
}

pub struct DetectorEngine {
    primary: Option<Box<dyn FaceDetector>>,
    fallback: HeuristicDetector,
    frames: AtomicU64,
    faces: AtomicU64,
    fallbacks: AtomicU64,
    errors: AtomicU64,
}

impl DetectorEngine {
    /// Heuristic-only engine
    pub fn heuristic() -> Self {
        Self {
            primary: None,
            fallback: HeuristicDetector::new(),
            frames: AtomicU64::new(0),
            faces: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Engine with a custom primary strategy
    pub fn with_primary(primary: Box<dyn FaceDetector>) -> Self {
        Self {
            primary: Some(primary),
            ..Self::heuristic()
        }
    }

    /// Load model assets from `asset_path`.
    ///
    /// Missing path, missing or malformed manifest, and unreadable weights all
    /// resolve to the heuristic strategy. This never fails.
    pub fn from_assets(asset_path: Option<&Path>, manifest_name: &str) -> Self {
        let Some(base) = asset_path else {
            log::info!("No detector assets configured, using skin-tone heuristic");
            return Self::heuristic();
        };

        match ModelDetector::from_assets(base, manifest_name) {
            Ok(detector) => {
                log::info!("Loaded face detection model from {:?}", base);
                Self::with_primary(Box::new(detector))
            }
            Err(e) => {
                log::warn!("Face model unavailable, falling back to heuristic: {}", e);
                Self::heuristic()
            }
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::from_assets(config.asset_path.as_deref(), &config.manifest_name)
    }

    pub fn mode(&self) -> DetectorMode {
        if self.primary.is_some() {
            DetectorMode::Model
        } else {
            DetectorMode::Heuristic
        }
    }

    pub fn strategy_name(&self) -> &str {
        match &self.primary {
            Some(primary) => primary.name(),
            None => self.fallback.name(),
        }
    }

    /// Detect faces in a frame. Infallible: an empty list means no face.
    pub fn detect(&self, frame: &Frame) -> Vec<DetectionResult> {
        self.frames.fetch_add(1, Ordering::Relaxed);

        let results = match &self.primary {
            Some(primary) => match primary.detect(frame) {
                Ok(results) => results,
                Err(e) => {
                    log::debug!(
                        "{} failed on frame {}, using heuristic: {}",
                        primary.name(),
                        frame.sequence,
                        e
                    );
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    self.fallbacks.fetch_add(1, Ordering::Relaxed);
                    self.fallback.detect_frame(frame)
                }
            },
            None => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                self.fallback.detect_frame(frame)
            }
        };

        if !results.is_empty() {
            self.faces.fetch_add(1, Ordering::Relaxed);
        }
        results
    }

    /// Highest-confidence face, if any
    pub fn detect_best(&self, frame: &Frame) -> Option<DetectionResult> {
        self.detect(frame)
            .into_iter()
            .max_by(|a, b| a.confidence_score.total_cmp(&b.confidence_score))
    }

    pub fn stats(&self) -> DetectorStats {
        DetectorStats {
            frames: self.frames.load(Ordering::Relaxed),
            faces: self.faces.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl Default for DetectorEngine {
    fn default() -> Self {
        Self::heuristic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{synthetic_face_frame, FaceParams};
    use crate::types::BoundingBox;

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn name(&self) -> &str {
            "failing"
        }

        fn detect(&self, _frame: &Frame) -> Result<Vec<DetectionResult>, DetectorError> {
            Err(DetectorError::Inference("boom".to_string()))
        }
    }

    struct FixedDetector;

    impl FaceDetector for FixedDetector {
        fn name(&self) -> &str {
            "fixed"
        }

        fn detect(&self, _frame: &Frame) -> Result<Vec<DetectionResult>, DetectorError> {
            Ok(vec![
                DetectionResult::new(0.4, BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
                DetectionResult::new(0.95, BoundingBox::new(5.0, 5.0, 20.0, 20.0)),
            ])
        }
    }

    #[test]
    fn test_no_assets_means_heuristic() {
        let engine = DetectorEngine::from_assets(None, "manifest.json");
        assert_eq!(engine.mode(), DetectorMode::Heuristic);
        assert_eq!(engine.strategy_name(), "skin-heuristic");
    }

    #[test]
    fn test_broken_assets_fall_back_permanently() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DetectorEngine::from_assets(Some(dir.path()), "manifest.json");
        assert_eq!(engine.mode(), DetectorMode::Heuristic);

        let frame = synthetic_face_frame(120, 90, FaceParams::default());
        assert_eq!(engine.detect(&frame).len(), 1);
    }

    #[test]
    fn test_primary_error_uses_heuristic_for_that_frame() {
        let engine = DetectorEngine::with_primary(Box::new(FailingDetector));
        assert_eq!(engine.mode(), DetectorMode::Model);

        let frame = synthetic_face_frame(120, 90, FaceParams::default());
        let results = engine.detect(&frame);
        assert_eq!(results.len(), 1);

        let stats = engine.stats();
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.fallbacks, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.faces, 1);
    }

    #[test]
    fn test_detect_best_picks_highest_confidence() {
        let engine = DetectorEngine::with_primary(Box::new(FixedDetector));
        let frame = synthetic_face_frame(60, 40, FaceParams::default());
        let best = engine.detect_best(&frame).unwrap();
        assert!((best.confidence_score - 0.95).abs() < 1e-6);
    }
}
