use std::fmt;
use std::path::PathBuf;

/// Camera acquisition and stream failures.
///
/// These are the only camera-level failures surfaced to callers. They are never
/// retried automatically; the user has to re-invoke the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// The platform or the user refused camera access
    AccessDenied(String),
    /// No camera present, or the camera is held by another stream
    Unavailable(String),
    /// The stream was opened but a frame could not be read
    StreamError(String),
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CameraError::AccessDenied(msg) => write!(f, "Camera access denied: {}", msg),
            CameraError::Unavailable(msg) => write!(f, "Camera unavailable: {}", msg),
            CameraError::StreamError(msg) => write!(f, "Stream error: {}", msg),
        }
    }
}

impl std::error::Error for CameraError {}

/// Failures reported at the capture controller boundary.
///
/// Whenever one of these is returned the controller has already rolled back to a
/// consistent state, so the caller can simply try again.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CaptureError {
    #[error("a capture is already in progress")]
    Busy,

    #[error("capture session has been stopped")]
    Stopped,

    #[error("no frame available to capture")]
    NoFrame,

    #[error("invalid capture state: {0}")]
    InvalidState(String),

    #[error("failed to encode captured frame: {0}")]
    Encoding(String),

    #[error("no captured image to confirm")]
    NothingToConfirm,

    #[error(transparent)]
    Camera(#[from] CameraError),
}

/// Misuse of the liveness session operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LivenessError {
    #[error("invalid liveness state: {0}")]
    InvalidState(String),

    #[error("skipping liveness checks is disabled")]
    SkipDisabled,

    #[error("liveness session already completed")]
    SessionComplete,

    #[error("liveness check {0} failed")]
    CheckFailed(String),

    #[error("liveness session has been stopped")]
    Stopped,

    #[error(transparent)]
    Camera(#[from] CameraError),
}

/// Detector failures. Internal only: the engine degrades instead of surfacing these.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("failed to load detection assets: {0}")]
    AssetLoad(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("detection failed: {0}")]
    Inference(String),
}

/// Reading or writing the TOML configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
