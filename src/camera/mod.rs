//! Camera resource management
//!
//! [`CameraManager`] hands out at most one live [`StreamHandle`] at a time.
//! A handle owns the underlying stream exclusively and stops it when released
//! or dropped, so every exit path turns the camera indicator off.

#[cfg(feature = "native")]
pub mod native;

#[cfg(feature = "native")]
pub use native::NativeBackend;

use crate::errors::CameraError;
use crate::types::{CaptureConstraints, DeviceInfo, Frame};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// An open camera stream producing frames.
pub trait FrameSource: Send {
    /// Grab the most recent frame
    fn next_frame(&mut self) -> Result<Frame, CameraError>;

    /// Stop every underlying track. Called once on release.
    fn stop(&mut self);
}

/// Platform camera access.
pub trait CameraBackend: Send + Sync {
    fn name(&self) -> &str;

    fn list_devices(&self) -> Result<Vec<DeviceInfo>, CameraError>;

    fn open(&self, constraints: &CaptureConstraints) -> Result<Box<dyn FrameSource>, CameraError>;
}

/// Consumer of live frames, e.g. a preview surface.
pub type PreviewSink = Box<dyn FnMut(&Frame) + Send>;

/// Acquires and releases camera streams for one verification session.
pub struct CameraManager {
    backend: Arc<dyn CameraBackend>,
    stream_live: Arc<AtomicBool>,
}

impl CameraManager {
    pub fn new(backend: Arc<dyn CameraBackend>) -> Self {
        Self {
            backend,
            stream_live: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn list_devices(&self) -> Result<Vec<DeviceInfo>, CameraError> {
        self.backend.list_devices()
    }

    /// True while a handle from this manager is live
    pub fn is_streaming(&self) -> bool {
        self.stream_live.load(Ordering::SeqCst)
    }

    /// Open a stream. Fails with `Unavailable` while another handle is live.
    ///
    /// Failures are returned as-is and never retried.
    pub fn acquire(&self, constraints: &CaptureConstraints) -> Result<StreamHandle, CameraError> {
        if self
            .stream_live
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CameraError::Unavailable(
                "a camera stream is already active for this session".to_string(),
            ));
        }

        log::info!(
            "Acquiring camera via {} ({}x{} ideal, {:?})",
            self.backend.name(),
            constraints.ideal_width,
            constraints.ideal_height,
            constraints.facing_mode
        );

        match self.backend.open(constraints) {
            Ok(source) => {
                let device_id = constraints
                    .device_id
                    .clone()
                    .unwrap_or_else(|| "default".to_string());
                Ok(StreamHandle::new(source, device_id, self.stream_live.clone()))
            }
            Err(e) => {
                self.stream_live.store(false, Ordering::SeqCst);
                log::error!("Camera acquisition failed: {}", e);
                Err(e)
            }
        }
    }

    /// Release a handle. Safe to call any number of times.
    pub fn release(&self, handle: &StreamHandle) {
        handle.release();
    }

    /// Hand the camera over to another device: release first, then reacquire.
    pub fn switch_device(
        &self,
        handle: StreamHandle,
        device_id: &str,
        constraints: &CaptureConstraints,
    ) -> Result<StreamHandle, CameraError> {
        handle.release();
        drop(handle);
        self.acquire(&constraints.clone().with_device(device_id))
    }
}

struct StreamShared {
    source: Mutex<Option<Box<dyn FrameSource>>>,
    sink: Mutex<Option<PreviewSink>>,
    released: AtomicBool,
    sequence: AtomicU64,
    stream_live: Arc<AtomicBool>,
    device_id: String,
}

impl StreamShared {
    fn read_frame(&self) -> Result<Frame, CameraError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(CameraError::StreamError("stream has been released".to_string()));
        }

        let frame = {
            let mut source = self
                .source
                .lock()
                .map_err(|_| CameraError::StreamError("stream lock poisoned".to_string()))?;
            match source.as_mut() {
                Some(source) => source.next_frame()?,
                None => {
                    return Err(CameraError::StreamError(
                        "stream has been released".to_string(),
                    ))
                }
            }
        };

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let frame = frame.with_sequence(sequence);

        if let Ok(mut sink) = self.sink.lock() {
            if let Some(sink) = sink.as_mut() {
                sink(&frame);
            }
        }

        Ok(frame)
    }

    fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }

        if let Ok(mut source) = self.source.lock() {
            if let Some(mut source) = source.take() {
                source.stop();
            }
        }
        if let Ok(mut sink) = self.sink.lock() {
            sink.take();
        }
        self.stream_live.store(false, Ordering::SeqCst);
        true
    }
}

/// Exclusive ownership of one live camera stream.
///
/// Not `Clone`: consumers that only need frames get a [`FrameReader`], which
/// stops yielding frames as soon as the handle is released.
pub struct StreamHandle {
    shared: Arc<StreamShared>,
}

impl StreamHandle {
    fn new(source: Box<dyn FrameSource>, device_id: String, stream_live: Arc<AtomicBool>) -> Self {
        Self {
            shared: Arc::new(StreamShared {
                source: Mutex::new(Some(source)),
                sink: Mutex::new(None),
                released: AtomicBool::new(false),
                sequence: AtomicU64::new(0),
                stream_live,
                device_id,
            }),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.shared.device_id
    }

    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }

    pub fn read_frame(&self) -> Result<Frame, CameraError> {
        self.shared.read_frame()
    }

    pub fn reader(&self) -> FrameReader {
        FrameReader {
            shared: self.shared.clone(),
        }
    }

    /// Attach a preview consumer that sees every frame read from the stream
    pub fn attach_sink(&self, sink: PreviewSink) {
        if let Ok(mut slot) = self.shared.sink.lock() {
            *slot = Some(sink);
        }
    }

    pub fn detach_sink(&self) {
        if let Ok(mut slot) = self.shared.sink.lock() {
            slot.take();
        }
    }

    /// Stop all tracks and detach the preview sink. Idempotent.
    pub fn release(&self) {
        if self.shared.release() {
            log::info!("Camera stream for device {} released", self.shared.device_id);
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Read-only access to a stream's frames.
#[derive(Clone)]
pub struct FrameReader {
    shared: Arc<StreamShared>,
}

impl FrameReader {
    pub fn read_frame(&self) -> Result<Frame, CameraError> {
        self.shared.read_frame()
    }

    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }
}
