//! Photo capture
//!
//! [`CaptureController`] holds the synchronous state machine; [`CaptureSession`]
//! drives it from the camera stream with quality polling and the manual
//! countdown timer.

pub mod controller;
pub mod encode;
pub mod session;

pub use controller::{AutoCaptureDecision, CaptureController, CaptureState, CountdownStep};
pub use encode::{decode_dimensions, FrameEncoder, JpegFrameEncoder};
pub use session::{CaptureSession, CaptureSink};
