//! livecheck: face presence, capture quality and liveness challenges
//!
//! The client-side half of identity verification for proctored assessments.
//! A camera stream is sampled on fixed cadences to detect faces, score frame
//! quality for a profile capture, and run a short sequence of liveness
//! challenges (blink, smile, head turn).
//!
//! # Features
//! - Single-owner camera streams, released on every exit path
//! - Model-based face detection with a skin-tone heuristic fallback
//! - Lighting, sharpness and positioning scores for every polled frame
//! - Manual countdown capture and auto-capture on sustained quality
//! - Liveness state machine with retries and an optional skip
//! - Synthetic camera for offline tests and demos
//!
//! # Usage
//! ```rust,no_run
//! use livecheck::{CameraManager, LivecheckConfig, VerificationPipeline};
//! use livecheck::testing::SyntheticCamera;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let manager = CameraManager::new(Arc::new(SyntheticCamera::new(640, 480)));
//! let pipeline = VerificationPipeline::new(LivecheckConfig::default(), manager);
//!
//! let runner = pipeline.start_liveness()?;
//! let result = runner.run_session(2).await?;
//! println!("all passed: {}", result.all_passed());
//! # Ok(())
//! # }
//! ```
//!
//! With the `tauri-plugin` feature the pipeline is exposed as Tauri commands:
//! ```rust,ignore
//! fn main() {
//!     tauri::Builder::default()
//!         .plugin(livecheck::init())
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
pub mod camera;
pub mod capture;
#[cfg(feature = "tauri-plugin")]
pub mod commands;
pub mod config;
pub mod detection;
pub mod errors;
pub mod liveness;
pub mod monitor;
pub mod pipeline;
pub mod presence;
pub mod quality;
pub mod scheduler;
pub mod types;

// Testing utilities - synthetic faces and camera for offline testing
pub mod testing;

// Re-exports for convenience
pub use camera::{CameraBackend, CameraManager, FrameSource, StreamHandle};
pub use capture::{CaptureSession, CaptureSink, CaptureState};
pub use config::LivecheckConfig;
pub use detection::{DetectorEngine, DetectorMode, FaceDetector};
pub use errors::{CameraError, CaptureError, ConfigError, DetectorError, LivenessError};
pub use liveness::{LivenessCheckId, LivenessResult, LivenessRunner};
pub use monitor::VerificationReadiness;
pub use pipeline::VerificationPipeline;
pub use presence::{PresenceStatus, PresenceTracker};
pub use scheduler::{Cadence, DetectionScheduler};
pub use types::{BoundingBox, CapturedImage, DetectionResult, DeviceInfo, Frame, QualityMetrics};

#[cfg(feature = "tauri-plugin")]
use tauri::{
    plugin::{Builder, TauriPlugin},
    Runtime,
};

/// Initialize the livecheck plugin with all commands
#[cfg(feature = "tauri-plugin")]
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("livecheck")
        .invoke_handler(tauri::generate_handler![
            // Pipeline commands
            commands::pipeline::initialize_pipeline,
            commands::pipeline::list_cameras,
            commands::pipeline::select_camera,
            commands::pipeline::get_verification_readiness,
            commands::pipeline::shutdown_pipeline,
            // Presence commands
            commands::presence::start_presence_detection,
            commands::presence::get_presence_status,
            commands::presence::get_processing_stats,
            commands::presence::stop_presence_detection,
            // Capture commands
            commands::capture::start_capture_session,
            commands::capture::trigger_capture,
            commands::capture::confirm_capture,
            commands::capture::retake_capture,
            commands::capture::get_capture_status,
            commands::capture::get_captured_image,
            commands::capture::stop_capture_session,
            // Liveness commands
            commands::liveness::start_liveness_session,
            commands::liveness::run_liveness_check,
            commands::liveness::retry_liveness_check,
            commands::liveness::skip_liveness_check,
            commands::liveness::get_liveness_snapshot,
            commands::liveness::take_liveness_result,
            commands::liveness::stop_liveness_session,
            // Configuration commands
            commands::config::get_config,
            commands::config::update_config,
            commands::config::reset_config,
        ])
        .build()
}

/// Initialize logging for the verification pipeline
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "livecheck=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        native_camera: cfg!(feature = "native"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Built with real camera support
    pub native_camera: bool,
}
