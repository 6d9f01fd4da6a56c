//! Core data types shared across the pipeline.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Camera facing hint. Desktop backends usually ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    User,
    Environment,
}

/// Constraints used when acquiring a camera stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing_mode: FacingMode,
    /// Specific device to open; `None` picks the first available camera
    pub device_id: Option<String>,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 640,
            ideal_height: 480,
            facing_mode: FacingMode::User,
            device_id: None,
        }
    }
}

impl CaptureConstraints {
    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }
}

/// A camera that can be opened by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
}

/// One RGB8 video frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: String,
    pub sequence: u64,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
}

impl Frame {
    /// Create a frame from packed RGB8 data
    pub fn new(data: Vec<u8>, width: u32, height: u32, device_id: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sequence: 0,
            data,
            width,
            height,
            timestamp: Utc::now(),
            device_id,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// True when the buffer holds exactly `width * height` RGB pixels
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.pixel_count() * 3
    }

    /// Borrow the buffer as an `image` view without copying.
    pub fn as_rgb_view(&self) -> Option<image::ImageBuffer<image::Rgb<u8>, &[u8]>> {
        image::ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Axis-aligned box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Box centred on the frame covering `fraction` of each dimension
    pub fn centered(frame_width: u32, frame_height: u32, fraction: f32) -> Self {
        let width = frame_width as f32 * fraction;
        let height = frame_height as f32 * fraction;
        Self {
            x: (frame_width as f32 - width) / 2.0,
            y: (frame_height as f32 - height) / 2.0,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// Per-frame detection output. Lives only for the current tick unless captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub confidence_score: f32,
    pub bounding_box: BoundingBox,
    pub landmarks: Option<Vec<Point>>,
}

impl DetectionResult {
    pub fn new(confidence_score: f32, bounding_box: BoundingBox) -> Self {
        Self {
            confidence_score: confidence_score.clamp(0.0, 1.0),
            bounding_box,
            landmarks: None,
        }
    }
}

/// Raw quality signals before the overall score is derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualitySignals {
    pub lighting: f32,
    pub sharpness: f32,
    pub positioning: f32,
    pub face_detected: bool,
    pub eyes_open: bool,
    pub frontal_pose: bool,
}

/// Frame quality with its gated overall score.
///
/// `overall` is always 0 when any of the three gates is false, otherwise the mean
/// of lighting, sharpness and positioning. The fields are private so the only way
/// to build one is through [`QualityMetrics::from_signals`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "QualitySignals")]
pub struct QualityMetrics {
    lighting: f32,
    sharpness: f32,
    positioning: f32,
    face_detected: bool,
    eyes_open: bool,
    frontal_pose: bool,
    overall: f32,
}

impl From<QualitySignals> for QualityMetrics {
    fn from(signals: QualitySignals) -> Self {
        Self::from_signals(signals)
    }
}

impl QualityMetrics {
    pub fn from_signals(signals: QualitySignals) -> Self {
        let lighting = signals.lighting.clamp(0.0, 100.0);
        let sharpness = signals.sharpness.clamp(0.0, 100.0);
        let positioning = signals.positioning.clamp(0.0, 100.0);
        let gates_pass = signals.face_detected && signals.eyes_open && signals.frontal_pose;
        let overall = if gates_pass {
            (lighting + sharpness + positioning) / 3.0
        } else {
            0.0
        };

        Self {
            lighting,
            sharpness,
            positioning,
            face_detected: signals.face_detected,
            eyes_open: signals.eyes_open,
            frontal_pose: signals.frontal_pose,
            overall,
        }
    }

    /// Metrics for a frame with no usable face
    pub fn empty() -> Self {
        Self::from_signals(QualitySignals {
            lighting: 0.0,
            sharpness: 0.0,
            positioning: 0.0,
            face_detected: false,
            eyes_open: false,
            frontal_pose: false,
        })
    }

    pub fn lighting(&self) -> f32 {
        self.lighting
    }

    pub fn sharpness(&self) -> f32 {
        self.sharpness
    }

    pub fn positioning(&self) -> f32 {
        self.positioning
    }

    pub fn face_detected(&self) -> bool {
        self.face_detected
    }

    pub fn eyes_open(&self) -> bool {
        self.eyes_open
    }

    pub fn frontal_pose(&self) -> bool {
        self.frontal_pose
    }

    pub fn overall(&self) -> f32 {
        self.overall
    }

    /// Ungated mean of the three continuous signals
    pub fn signal_mean(&self) -> f32 {
        (self.lighting + self.sharpness + self.positioning) / 3.0
    }
}

/// Encoded photo handed to the exam flow after confirmation.
///
/// Immutable once created. The encoded bytes are reference counted, so clones
/// share the buffer and dropping the last one releases it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedImage {
    id: String,
    encoded: Bytes,
    mime_type: String,
    width: u32,
    height: u32,
    created_at: DateTime<Utc>,
    quality: QualityMetrics,
}

impl CapturedImage {
    pub(crate) fn new(
        encoded: Bytes,
        mime_type: &str,
        width: u32,
        height: u32,
        quality: QualityMetrics,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            encoded,
            mime_type: mime_type.to_string(),
            width,
            height,
            created_at: Utc::now(),
            quality,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn encoded_bytes(&self) -> &Bytes {
        &self.encoded
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn quality(&self) -> &QualityMetrics {
        &self.quality
    }
}
