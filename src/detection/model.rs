use super::manifest::AssetManifest;
use super::FaceDetector;
use crate::errors::DetectorError;
use crate::types::{BoundingBox, DetectionResult, Frame};
use std::fs;
use std::path::Path;

/// Raw SeetaFace score at which confidence reaches 0.5
const SCORE_HALF_POINT: f64 = 5.0;

/// Map an unbounded detector score onto 0..1.
fn score_to_confidence(score: f64) -> f32 {
    if score <= 0.0 {
        return 0.0;
    }
    (score / (score + SCORE_HALF_POINT)) as f32
}

/// Face detector backed by the SeetaFace frontal model.
pub struct ModelDetector {
    model: rustface::Model,
    min_face_size: u32,
    score_threshold: f64,
}

impl ModelDetector {
    /// Load weights named by the manifest in `base`.
    pub fn from_assets(base: &Path, manifest_name: &str) -> Result<Self, DetectorError> {
        let manifest = AssetManifest::load(base, manifest_name)?;
        let weights_path = manifest.detector_path(base);
        let weights = fs::read(&weights_path).map_err(|e| {
            DetectorError::AssetLoad(format!("cannot read weights {:?}: {}", weights_path, e))
        })?;

        let detector = Self::from_bytes(&weights)?;
        Ok(Self {
            min_face_size: manifest.detector.min_face_size,
            score_threshold: manifest.detector.score_threshold,
            ..detector
        })
    }

    pub fn from_bytes(weights: &[u8]) -> Result<Self, DetectorError> {
        let model = rustface::read_model(std::io::Cursor::new(weights))
            .map_err(|e| DetectorError::AssetLoad(format!("invalid model weights: {}", e)))?;
        Ok(Self {
            model,
            min_face_size: 40,
            score_threshold: 2.0,
        })
    }
}

impl FaceDetector for ModelDetector {
    fn name(&self) -> &str {
        "seetaface"
    }

    fn detect(&self, frame: &Frame) -> Result<Vec<DetectionResult>, DetectorError> {
        let rgb = frame.as_rgb_view().ok_or_else(|| {
            DetectorError::InvalidFrame(format!(
                "{} bytes for {}x{}",
                frame.data.len(),
                frame.width,
                frame.height
            ))
        })?;
        let gray = image::imageops::grayscale(&rgb);

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.min_face_size);
        detector.set_score_thresh(self.score_threshold);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let faces = detector.detect(&rustface::ImageData::new(
            gray.as_raw(),
            frame.width,
            frame.height,
        ));

        let mut results: Vec<DetectionResult> = faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                DetectionResult::new(
                    score_to_confidence(face.score()),
                    BoundingBox::new(
                        bbox.x() as f32,
                        bbox.y() as f32,
                        bbox.width() as f32,
                        bbox.height() as f32,
                    ),
                )
            })
            .collect();

        results.sort_by(|a, b| b.confidence_score.total_cmp(&a.confidence_score));
        Ok(results)
    }
}
