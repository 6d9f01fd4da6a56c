use super::FaceDetector;
use crate::errors::DetectorError;
use crate::types::{BoundingBox, DetectionResult, Frame};

/// Fraction of skin-toned pixels above which a face is assumed present
pub const SKIN_RATIO_THRESHOLD: f32 = 0.15;
/// Confidence ceiling for heuristic detections
pub const MAX_HEURISTIC_CONFIDENCE: f32 = 0.9;

/// Classic RGB skin-tone rule.
pub fn is_skin_tone(r: u8, g: u8, b: u8) -> bool {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    r > 95
        && g > 40
        && b > 20
        && (max - min) > 15
        && (r as i16 - g as i16).abs() > 15
        && r > g
        && r > b
}

/// Share of pixels in an RGB8 buffer classified as skin.
pub fn skin_ratio(data: &[u8]) -> f32 {
    let total = data.len() / 3;
    if total == 0 {
        return 0.0;
    }
    let skin = data
        .chunks_exact(3)
        .filter(|px| is_skin_tone(px[0], px[1], px[2]))
        .count();
    skin as f32 / total as f32
}

/// Pixel-statistics detector used when no model is available.
///
/// Reports at most one face, always boxed in the centre half of the frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicDetector;

impl HeuristicDetector {
    pub fn new() -> Self {
        Self
    }

    /// Never fails; malformed frames simply yield no face.
    pub fn detect_frame(&self, frame: &Frame) -> Vec<DetectionResult> {
        if !frame.is_valid() {
            return Vec::new();
        }

        let ratio = skin_ratio(&frame.data);
        if ratio > SKIN_RATIO_THRESHOLD {
            vec![DetectionResult::new(
                (ratio * 3.0).min(MAX_HEURISTIC_CONFIDENCE),
                BoundingBox::centered(frame.width, frame.height, 0.5),
            )]
        } else {
            Vec::new()
        }
    }
}

impl FaceDetector for HeuristicDetector {
    fn name(&self) -> &str {
        "skin-heuristic"
    }

    fn detect(&self, frame: &Frame) -> Result<Vec<DetectionResult>, DetectorError> {
        Ok(self.detect_frame(frame))
    }
}
