//! Real camera access through nokhwa.

use super::{CameraBackend, FrameSource};
use crate::errors::CameraError;
use crate::types::{CaptureConstraints, DeviceInfo, Frame};
use nokhwa::{
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
        Resolution,
    },
    Camera, NokhwaError,
};

/// Backend over the platform's native capture API.
#[derive(Debug, Default)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        Self
    }
}

fn map_open_error(error: NokhwaError) -> CameraError {
    let message = error.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("permission") || lowered.contains("denied") || lowered.contains("not authorized")
    {
        CameraError::AccessDenied(message)
    } else {
        CameraError::Unavailable(message)
    }
}

impl CameraBackend for NativeBackend {
    fn name(&self) -> &str {
        "native"
    }

    fn list_devices(&self) -> Result<Vec<DeviceInfo>, CameraError> {
        let cameras = query(ApiBackend::Auto)
            .map_err(|e| CameraError::Unavailable(format!("Failed to query cameras: {}", e)))?;

        Ok(cameras
            .into_iter()
            .map(|info| DeviceInfo {
                id: info.index().to_string(),
                name: info.human_name(),
            })
            .collect())
    }

    fn open(&self, constraints: &CaptureConstraints) -> Result<Box<dyn FrameSource>, CameraError> {
        let index = match constraints.device_id.as_deref() {
            Some(id) => id
                .parse::<u32>()
                .map(CameraIndex::Index)
                .unwrap_or_else(|_| CameraIndex::String(id.to_string())),
            None => CameraIndex::Index(0),
        };

        // Desktop capture APIs have no notion of facing; the hint only matters on mobile.
        log::debug!("Facing mode {:?} ignored by native backend", constraints.facing_mode);

        let ideal = CameraFormat::new(
            Resolution::new(constraints.ideal_width, constraints.ideal_height),
            FrameFormat::MJPEG,
            30,
        );
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(ideal));

        let mut camera = Camera::new(index.clone(), requested).map_err(map_open_error)?;
        camera.open_stream().map_err(map_open_error)?;

        log::info!(
            "Opened native camera {} at {}",
            index,
            camera.resolution()
        );

        Ok(Box::new(NativeSource {
            camera,
            device_id: index.to_string(),
        }))
    }
}

struct NativeSource {
    camera: Camera,
    device_id: String,
}

// nokhwa's Camera wraps platform handles that are only touched behind the
// stream mutex in StreamHandle.
unsafe impl Send for NativeSource {}

impl FrameSource for NativeSource {
    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| CameraError::StreamError(format!("Failed to capture frame: {}", e)))?;

        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::StreamError(format!("Failed to decode frame: {}", e)))?;

        let (width, height) = decoded.dimensions();
        Ok(Frame::new(
            decoded.into_raw(),
            width,
            height,
            self.device_id.clone(),
        ))
    }

    fn stop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            log::warn!("Failed to stop native camera stream: {}", e);
        }
    }
}
