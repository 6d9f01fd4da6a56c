//! Individual quality signals, each computed over the detected face.

use super::region::{LumaPlane, Region};
use crate::types::BoundingBox;

/// Luminance range considered evenly lit
pub const WELL_LIT_RANGE: (f32, f32) = (100.0, 180.0);

/// Laplacian variance at which sharpness reaches ~63
const SHARPNESS_SCALE: f32 = 300.0;

/// Face area, as a share of the frame, that scores full marks for size
const IDEAL_FACE_SHARE: (f32, f32) = (0.15, 0.5);

/// Eye band inside the face box: rows 25-45%, columns 20-80%
const EYE_BAND: (f32, f32, f32, f32) = (0.2, 0.25, 0.8, 0.45);

/// Acceptable face box height/width ratio for a frontal face
const FRONTAL_ASPECT: (f32, f32) = (0.5, 2.5);

/// Lighting score from the mean face luminance, penalised by clipped pixels.
pub fn lighting_score(plane: &LumaPlane, face: &Region) -> f32 {
    if face.is_empty() {
        return 0.0;
    }
    let mean = plane.mean(face);
    let (low, high) = WELL_LIT_RANGE;

    let base = if mean < low {
        mean / low * 100.0
    } else if mean > high {
        (255.0 - mean) / (255.0 - high) * 100.0
    } else {
        100.0
    };

    (base - plane.clipped_fraction(face) * 100.0).clamp(0.0, 100.0)
}

/// Sharpness score from the Laplacian variance of the face.
pub fn sharpness_score(plane: &LumaPlane, face: &Region) -> f32 {
    let variance = plane.laplacian_variance(face);
    (100.0 * (1.0 - (-variance / SHARPNESS_SCALE).exp())).clamp(0.0, 100.0)
}

/// Positioning score: 60% centring, 40% face size.
pub fn positioning_score(bbox: &BoundingBox, frame_width: u32, frame_height: u32) -> f32 {
    let fw = frame_width as f32;
    let fh = frame_height as f32;
    if fw <= 0.0 || fh <= 0.0 {
        return 0.0;
    }

    let center = bbox.center();
    let dx = (center.x - fw / 2.0) / (fw / 2.0);
    let dy = (center.y - fh / 2.0) / (fh / 2.0);
    let offset = (dx * dx + dy * dy).sqrt();
    let centring = (1.0 - offset).clamp(0.0, 1.0) * 100.0;

    let share = bbox.area() / (fw * fh);
    let (min_share, max_share) = IDEAL_FACE_SHARE;
    let size = if share < min_share {
        share / min_share * 100.0
    } else if share > max_share {
        ((1.0 - share) / (1.0 - max_share) * 100.0).max(0.0)
    } else {
        100.0
    };

    0.6 * centring + 0.4 * size
}

/// The eye band of a face region.
pub fn eye_band(face: &Region) -> Region {
    let (x0, y0, x1, y1) = EYE_BAND;
    face.band(x0, y0, x1, y1)
}

/// Contrast in the eye band. Open eyes show bright sclera and dark pupils.
pub fn eye_contrast(plane: &LumaPlane, face: &Region) -> f32 {
    plane.std_dev(&eye_band(face))
}

/// Relative luminance difference between the face halves.
pub fn half_asymmetry(plane: &LumaPlane, face: &Region) -> f32 {
    let left = plane.mean(&face.left_half());
    let right = plane.mean(&face.right_half());
    (left - right).abs() / left.max(right).max(1.0)
}

/// Frontal when both halves are similarly lit and the box has face proportions.
pub fn is_frontal(plane: &LumaPlane, face: &Region, tolerance: f32) -> bool {
    if face.is_empty() {
        return false;
    }
    let aspect = face.height() as f32 / face.width() as f32;
    let (min_aspect, max_aspect) = FRONTAL_ASPECT;
    (min_aspect..=max_aspect).contains(&aspect) && half_asymmetry(plane, face) <= tolerance
}
