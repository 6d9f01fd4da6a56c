//! Challenge verdicts from frame samples
//!
//! Each detection window is reduced to a series of [`ChallengeSample`]s. The
//! default [`SignalEvaluator`] looks for the physical trace of each challenge:
//! a brief collapse of eye-band contrast for a blink, a jump in mouth-band edge
//! energy for a smile, and horizontal travel of the face for a head turn.

use super::check::{LivenessCheckId, Verdict};
use crate::quality::region::{skin_centroid_x, LumaPlane};
use crate::quality::signals::eye_contrast;
use crate::types::{DetectionResult, Frame};
use serde::{Deserialize, Serialize};

/// Mouth band inside the face box: rows 62-86%, columns 30-70%
const MOUTH_BAND: (f32, f32, f32, f32) = (0.3, 0.62, 0.7, 0.86);

/// Measurements taken from one frame during a detection window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChallengeSample {
    pub face_present: bool,
    pub eye_contrast: f32,
    pub mouth_edge_energy: f32,
    /// Horizontal face position as a fraction of frame width
    pub face_center_x: Option<f32>,
}

impl ChallengeSample {
    pub fn absent() -> Self {
        Self {
            face_present: false,
            eye_contrast: 0.0,
            mouth_edge_energy: 0.0,
            face_center_x: None,
        }
    }

    pub fn measure(frame: &Frame, detection: Option<&DetectionResult>) -> Self {
        let (Some(detection), Some(plane)) = (detection, LumaPlane::from_frame(frame)) else {
            return Self::absent();
        };
        let face = plane.region(&detection.bounding_box);
        if face.is_empty() {
            return Self::absent();
        }

        let (x0, y0, x1, y1) = MOUTH_BAND;
        let mouth = face.band(x0, y0, x1, y1);
        let face_center_x = skin_centroid_x(frame)
            .or_else(|| Some(detection.bounding_box.center().x / frame.width as f32));

        Self {
            face_present: true,
            eye_contrast: eye_contrast(&plane, &face),
            mouth_edge_energy: plane.horizontal_edge_energy(&mouth),
            face_center_x,
        }
    }
}

/// Decides whether a detection window shows the requested challenge.
pub trait ChallengeEvaluator: Send + Sync {
    fn evaluate(&self, check: LivenessCheckId, samples: &[ChallengeSample]) -> Verdict;
}

/// Thresholds for [`SignalEvaluator`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorThresholds {
    /// Share of samples that must contain a face
    pub min_presence: f32,
    /// Median eye contrast needed to trust that eyes are visible at all
    pub min_open_contrast: f32,
    /// A blink drops eye contrast below this fraction of the window median
    pub blink_dip_ratio: f32,
    /// A smile raises mouth edge energy to at least this multiple of the baseline
    pub smile_rise_ratio: f32,
    /// Minimum absolute rise in mouth edge energy
    pub smile_min_rise: f32,
    /// Horizontal travel of the face, as a fraction of frame width
    pub head_turn_travel: f32,
}

impl Default for EvaluatorThresholds {
    fn default() -> Self {
        Self {
            min_presence: 0.6,
            min_open_contrast: 10.0,
            blink_dip_ratio: 0.5,
            smile_rise_ratio: 1.3,
            smile_min_rise: 2.0,
            head_turn_travel: 0.08,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignalEvaluator {
    thresholds: EvaluatorThresholds,
}

fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

impl SignalEvaluator {
    pub fn new(thresholds: EvaluatorThresholds) -> Self {
        Self { thresholds }
    }

    fn blink(&self, present: &[&ChallengeSample]) -> bool {
        let mut contrast: Vec<f32> = present.iter().map(|s| s.eye_contrast).collect();
        let lowest = contrast.iter().copied().fold(f32::INFINITY, f32::min);
        let Some(median) = median(&mut contrast) else {
            return false;
        };
        median >= self.thresholds.min_open_contrast
            && lowest < median * self.thresholds.blink_dip_ratio
    }

    fn smile(&self, present: &[&ChallengeSample]) -> bool {
        let energy = present.iter().map(|s| s.mouth_edge_energy);
        let baseline = energy.clone().fold(f32::INFINITY, f32::min);
        let peak = energy.fold(0.0, f32::max);
        peak - baseline >= self.thresholds.smile_min_rise
            && peak >= baseline * self.thresholds.smile_rise_ratio
    }

    fn head_turn(&self, present: &[&ChallengeSample]) -> bool {
        let positions: Vec<f32> = present.iter().filter_map(|s| s.face_center_x).collect();
        if positions.len() < 2 {
            return false;
        }
        let left = positions.iter().copied().fold(f32::INFINITY, f32::min);
        let right = positions.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        right - left >= self.thresholds.head_turn_travel
    }
}

impl ChallengeEvaluator for SignalEvaluator {
    fn evaluate(&self, check: LivenessCheckId, samples: &[ChallengeSample]) -> Verdict {
        let present: Vec<&ChallengeSample> = samples.iter().filter(|s| s.face_present).collect();
        if present.is_empty()
            || (present.len() as f32) < samples.len() as f32 * self.thresholds.min_presence
        {
            log::debug!(
                "{}: face present in {} of {} samples",
                check,
                present.len(),
                samples.len()
            );
            return Verdict::Failed;
        }

        let passed = match check {
            LivenessCheckId::Blink => self.blink(&present),
            LivenessCheckId::Smile => self.smile(&present),
            LivenessCheckId::HeadTurn => self.head_turn(&present),
        };
        Verdict::from_passed(passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::HeuristicDetector;
    use crate::testing::{synthetic_face_frame, FaceParams};

    fn sample(params: FaceParams) -> ChallengeSample {
        let frame = synthetic_face_frame(320, 240, params);
        let detection = HeuristicDetector::new().detect_frame(&frame);
        ChallengeSample::measure(&frame, detection.first())
    }

    fn window(len: usize, special: impl Fn(usize) -> Option<FaceParams>) -> Vec<ChallengeSample> {
        (0..len)
            .map(|i| sample(special(i).unwrap_or_default()))
            .collect()
    }

    #[test]
    fn test_synthetic_signals() {
        let open = sample(FaceParams::default());
        let closed = sample(FaceParams::blinking());
        let smiling = sample(FaceParams::smiling());
        println!("open={:?}\nclosed={:?}\nsmiling={:?}", open, closed, smiling);

        assert!(open.face_present);
        assert!(open.eye_contrast > 2.0 * closed.eye_contrast);
        assert!(smiling.mouth_edge_energy > 1.3 * open.mouth_edge_energy);
    }

    #[test]
    fn test_blink_detected_only_with_dip() {
        let evaluator = SignalEvaluator::default();
        let blinking = window(12, |i| (i == 5).then(FaceParams::blinking));
        let steady = window(12, |_| None);
        let closed = window(12, |_| Some(FaceParams::blinking()));

        assert_eq!(evaluator.evaluate(LivenessCheckId::Blink, &blinking), Verdict::Success);
        assert_eq!(evaluator.evaluate(LivenessCheckId::Blink, &steady), Verdict::Failed);
        assert_eq!(evaluator.evaluate(LivenessCheckId::Blink, &closed), Verdict::Failed);
    }

    #[test]
    fn test_smile_needs_a_rise() {
        let evaluator = SignalEvaluator::default();
        let smile = window(10, |i| (i >= 4).then(FaceParams::smiling));
        let neutral = window(10, |_| None);

        assert_eq!(evaluator.evaluate(LivenessCheckId::Smile, &smile), Verdict::Success);
        assert_eq!(evaluator.evaluate(LivenessCheckId::Smile, &neutral), Verdict::Failed);
    }

    #[test]
    fn test_head_turn_needs_travel() {
        let evaluator = SignalEvaluator::default();
        let turning = window(10, |i| Some(FaceParams::turned(if i < 5 { -0.06 } else { 0.06 })));
        let still = window(10, |_| None);

        assert_eq!(evaluator.evaluate(LivenessCheckId::HeadTurn, &turning), Verdict::Success);
        assert_eq!(evaluator.evaluate(LivenessCheckId::HeadTurn, &still), Verdict::Failed);
    }

    #[test]
    fn test_absent_face_fails_every_check() {
        let evaluator = SignalEvaluator::default();
        let mut samples = window(4, |_| Some(FaceParams::blinking()));
        samples.extend(std::iter::repeat(ChallengeSample::absent()).take(6));

        for check in LivenessCheckId::ALL {
            assert_eq!(evaluator.evaluate(check, &samples), Verdict::Failed);
        }
        assert_eq!(evaluator.evaluate(LivenessCheckId::Blink, &[]), Verdict::Failed);
    }

    #[test]
    fn test_faceless_window_fails_without_presence_floor() {
        let evaluator = SignalEvaluator::new(EvaluatorThresholds {
            min_presence: 0.0,
            ..EvaluatorThresholds::default()
        });
        let samples = vec![ChallengeSample::absent(); 5];

        for check in LivenessCheckId::ALL {
            assert_eq!(evaluator.evaluate(check, &samples), Verdict::Failed);
        }
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [3.0, 1.0, 2.0, 4.0]), Some(2.5));
    }
}
