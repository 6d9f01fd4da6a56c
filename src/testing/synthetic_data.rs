//! Synthetic faces and a scripted camera
//!
//! The generated faces are drawn so the skin heuristic, the quality gates and
//! the challenge signals respond to them the way they respond to a real,
//! well-lit, frontal subject: skin-toned ellipse on a neutral background, dark
//! pupils on white sclera, a mouth that widens with teeth when smiling, and a
//! fine per-pixel texture so the frame is not perfectly flat.

use crate::camera::{CameraBackend, FrameSource};
use crate::errors::CameraError;
use crate::types::{CaptureConstraints, DeviceInfo, Frame};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const SKIN: [u8; 3] = [200, 150, 120];
const BACKGROUND: [u8; 3] = [150, 160, 170];
const SCLERA: [u8; 3] = [240, 240, 240];
const PUPIL: [u8; 3] = [30, 30, 30];
const LIPS: [u8; 3] = [150, 60, 60];
const TEETH: [u8; 3] = [235, 235, 230];
const TEXTURE: i16 = 4;

/// Pose and expression of a synthetic face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceParams {
    /// Horizontal offset of the face centre as a fraction of frame width
    pub offset_x: f32,
    pub eyes_open: bool,
    pub smiling: bool,
}

impl Default for FaceParams {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            eyes_open: true,
            smiling: false,
        }
    }
}

impl FaceParams {
    pub fn blinking() -> Self {
        Self {
            eyes_open: false,
            ..Self::default()
        }
    }

    pub fn smiling() -> Self {
        Self {
            smiling: true,
            ..Self::default()
        }
    }

    pub fn turned(offset_x: f32) -> Self {
        Self {
            offset_x,
            ..Self::default()
        }
    }
}

fn put(data: &mut [u8], width: u32, x: u32, y: u32, color: [u8; 3]) {
    let idx = ((y * width + x) * 3) as usize;
    let grain = if (x + y) % 2 == 0 { TEXTURE } else { -TEXTURE };
    for (channel, value) in color.iter().enumerate() {
        data[idx + channel] = (*value as i16 + grain).clamp(0, 255) as u8;
    }
}

fn in_ellipse(x: f32, y: f32, cx: f32, cy: f32, rx: f32, ry: f32) -> bool {
    let dx = (x - cx) / rx;
    let dy = (y - cy) / ry;
    dx * dx + dy * dy <= 1.0
}

/// Draw a face frame.
pub fn synthetic_face_frame(width: u32, height: u32, params: FaceParams) -> Frame {
    let mut data = vec![0u8; (width * height * 3) as usize];
    let w = width as f32;
    let h = height as f32;

    let cx = w * (0.5 + params.offset_x);
    let cy = h * 0.5;
    let (face_rx, face_ry) = (w * 0.22, h * 0.35);

    let eye_y = h * 0.42;
    let eye_dx = w * 0.08;
    let (sclera_rx, sclera_ry) = (w * 0.035, h * 0.02);
    let pupil_r = w * 0.011;

    let mouth_y = h * 0.62;
    let (mouth_rx, mouth_ry) = if params.smiling {
        (w * 0.08, h * 0.02)
    } else {
        (w * 0.05, h * 0.004)
    };

    for y in 0..height {
        for x in 0..width {
            let (fx, fy) = (x as f32 + 0.5, y as f32 + 0.5);

            let mut color = BACKGROUND;
            if in_ellipse(fx, fy, cx, cy, face_rx, face_ry) {
                color = SKIN;

                if params.eyes_open {
                    for eye_x in [cx - eye_dx, cx + eye_dx] {
                        if in_ellipse(fx, fy, eye_x, eye_y, sclera_rx, sclera_ry) {
                            color = SCLERA;
                            if in_ellipse(fx, fy, eye_x, eye_y, pupil_r, pupil_r) {
                                color = PUPIL;
                            }
                        }
                    }
                }

                if in_ellipse(fx, fy, cx, mouth_y, mouth_rx, mouth_ry.max(1.0)) {
                    color = LIPS;
                    let inner_rx = mouth_rx * 0.85;
                    let inner_ry = mouth_ry * 0.6;
                    if params.smiling && in_ellipse(fx, fy, cx, mouth_y, inner_rx, inner_ry) {
                        // separate teeth with dark gaps every few pixels
                        color = if (x / 3) % 2 == 0 { TEETH } else { PUPIL };
                    }
                }
            }

            put(&mut data, width, x, y, color);
        }
    }

    Frame::new(data, width, height, "synthetic".to_string())
}

/// A frame with no skin-toned pixels at all.
pub fn synthetic_empty_frame(width: u32, height: u32) -> Frame {
    let mut data = vec![0u8; (width * height * 3) as usize];
    for y in 0..height {
        for x in 0..width {
            put(&mut data, width, x, y, BACKGROUND);
        }
    }
    Frame::new(data, width, height, "synthetic".to_string())
}

/// Failure the synthetic camera reports when opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticFailure {
    AccessDenied,
    Unavailable,
}

/// Maps a frame sequence number to the face shown in that frame.
pub type FaceScript = Arc<dyn Fn(u64) -> Option<FaceParams> + Send + Sync>;

/// Camera backend that renders synthetic faces.
#[derive(Clone)]
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    script: FaceScript,
    failure: Option<SyntheticFailure>,
    stops: Arc<AtomicU64>,
}

impl SyntheticCamera {
    /// A steady frontal face with eyes open
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            script: Arc::new(|_| Some(FaceParams::default())),
            failure: None,
            stops: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Frames without any face
    pub fn empty(width: u32, height: u32) -> Self {
        Self::new(width, height).with_script(Arc::new(|_| None))
    }

    pub fn with_script(mut self, script: FaceScript) -> Self {
        self.script = script;
        self
    }

    pub fn failing(mut self, failure: SyntheticFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Number of times an opened stream has been stopped
    pub fn stop_counter(&self) -> Arc<AtomicU64> {
        self.stops.clone()
    }
}

impl CameraBackend for SyntheticCamera {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>, CameraError> {
        Ok(vec![
            DeviceInfo {
                id: "synthetic-0".to_string(),
                name: "Synthetic Camera".to_string(),
            },
            DeviceInfo {
                id: "synthetic-1".to_string(),
                name: "Synthetic Camera (secondary)".to_string(),
            },
        ])
    }

    fn open(&self, constraints: &CaptureConstraints) -> Result<Box<dyn FrameSource>, CameraError> {
        match self.failure {
            Some(SyntheticFailure::AccessDenied) => {
                return Err(CameraError::AccessDenied("permission refused".to_string()))
            }
            Some(SyntheticFailure::Unavailable) => {
                return Err(CameraError::Unavailable("no camera connected".to_string()))
            }
            None => {}
        }

        log::debug!(
            "Synthetic camera ignores ideal {}x{}, rendering {}x{}",
            constraints.ideal_width,
            constraints.ideal_height,
            self.width,
            self.height
        );

        Ok(Box::new(SyntheticSource {
            camera: self.clone(),
            device_id: constraints
                .device_id
                .clone()
                .unwrap_or_else(|| "synthetic-0".to_string()),
            next: 0,
        }))
    }
}

struct SyntheticSource {
    camera: SyntheticCamera,
    device_id: String,
    next: u64,
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        let index = self.next;
        self.next += 1;

        let mut frame = match (self.camera.script)(index) {
            Some(params) => synthetic_face_frame(self.camera.width, self.camera.height, params),
            None => synthetic_empty_frame(self.camera.width, self.camera.height),
        };
        frame.device_id = self.device_id.clone();
        Ok(frame)
    }

    fn stop(&mut self) {
        self.camera.stops.fetch_add(1, Ordering::SeqCst);
    }
}
