//! Configuration management for livecheck
//!
//! Provides configuration loading, saving, and validation for the camera,
//! detector, capture, liveness and quality-scoring stages.

use crate::errors::ConfigError;
use crate::liveness::LivenessCheckId;
use crate::types::{CaptureConstraints, FacingMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LivecheckConfig {
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
    pub scheduler: SchedulerConfig,
    pub capture: CaptureConfig,
    pub liveness: LivenessConfig,
    pub quality: QualityConfig,
}

/// Camera acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Ideal resolution [width, height]
    pub ideal_resolution: [u32; 2],
    pub facing_mode: FacingMode,
    /// Preferred device, first available when unset
    pub device_id: Option<String>,
}

/// Detector asset settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Base directory of the model assets. Heuristic detection only when unset.
    pub asset_path: Option<PathBuf>,
    /// Manifest file name inside `asset_path`
    pub manifest_name: String,
}

/// Detection loop cadences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Continuous presence detection and liveness sampling
    pub presence_interval_ms: u64,
    /// Quality polling while the capture view is open
    pub quality_interval_ms: u64,
}

/// Photo capture settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Manual capture countdown start value (seconds)
    pub countdown_secs: u8,
    /// Capture automatically once quality holds above the threshold
    pub auto_capture: bool,
    /// Overall quality (0-100) that must be exceeded for auto-capture
    pub auto_capture_threshold: f32,
    /// Re-confirmation delay filtering transient quality spikes
    pub auto_capture_grace_ms: u64,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

/// Liveness challenge settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessConfig {
    /// Checks to run. Always visited in blink, smile, head-turn order.
    pub checks: Vec<LivenessCheckId>,
    pub countdown_secs: u8,
    pub blink_duration_ms: u64,
    pub smile_duration_ms: u64,
    pub head_turn_duration_ms: u64,
    /// How long a success is displayed before moving to the next check
    pub success_display_ms: u64,
    /// Allow bypassing a failed check. Off unless explicitly enabled.
    pub allow_skip: bool,
}

/// Quality scoring gates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Minimum detector confidence for `face_detected`
    pub min_face_confidence: f32,
    /// Minimum luminance standard deviation in the eye band for `eyes_open`
    pub eyes_open_contrast: f32,
    /// Maximum relative luminance difference between face halves for `frontal_pose`
    pub frontal_symmetry_tolerance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            ideal_resolution: [640, 480],
            facing_mode: FacingMode::User,
            device_id: None,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            asset_path: None,
            manifest_name: "manifest.json".to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            presence_interval_ms: 100,
            quality_interval_ms: 500,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 3,
            auto_capture: true,
            auto_capture_threshold: 85.0,
            auto_capture_grace_ms: 1000,
            jpeg_quality: 85,
        }
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            checks: LivenessCheckId::ALL.to_vec(),
            countdown_secs: 3,
            blink_duration_ms: 5000,
            smile_duration_ms: 3000,
            head_turn_duration_ms: 6000,
            success_display_ms: 1500,
            allow_skip: false,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_face_confidence: 0.5,
            eyes_open_contrast: 18.0,
            frontal_symmetry_tolerance: 0.12,
        }
    }
}

impl CameraConfig {
    pub fn constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            ideal_width: self.ideal_resolution[0],
            ideal_height: self.ideal_resolution[1],
            facing_mode: self.facing_mode,
            device_id: self.device_id.clone(),
        }
    }
}

impl SchedulerConfig {
    pub fn presence_interval(&self) -> Duration {
        Duration::from_millis(self.presence_interval_ms)
    }

    pub fn quality_interval(&self) -> Duration {
        Duration::from_millis(self.quality_interval_ms)
    }
}

impl CaptureConfig {
    pub fn grace_delay(&self) -> Duration {
        Duration::from_millis(self.auto_capture_grace_ms)
    }
}

impl LivenessConfig {
    /// Detection window for a check
    pub fn detection_duration(&self, check: LivenessCheckId) -> Duration {
        let ms = match check {
            LivenessCheckId::Blink => self.blink_duration_ms,
            LivenessCheckId::Smile => self.smile_duration_ms,
            LivenessCheckId::HeadTurn => self.head_turn_duration_ms,
        };
        Duration::from_millis(ms)
    }

    pub fn success_display(&self) -> Duration {
        Duration::from_millis(self.success_display_ms)
    }
}

impl LivecheckConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: LivecheckConfig = toml::from_str(&contents).map_err(|source| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string).map_err(io_error)?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("livecheck.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.camera.ideal_resolution[0] == 0 || self.camera.ideal_resolution[1] == 0 {
            return Err("Invalid ideal resolution".to_string());
        }

        if self.detector.manifest_name.trim().is_empty() {
            return Err("Manifest name must not be empty".to_string());
        }

        if self.scheduler.presence_interval_ms == 0 || self.scheduler.quality_interval_ms == 0 {
            return Err("Scheduler intervals must be positive".to_string());
        }

        if self.capture.countdown_secs == 0 || self.capture.countdown_secs > 10 {
            return Err("Capture countdown must be between 1 and 10 seconds".to_string());
        }
        if !(0.0..=100.0).contains(&self.capture.auto_capture_threshold) {
            return Err("Auto-capture threshold must be between 0 and 100".to_string());
        }
        if self.capture.jpeg_quality == 0 || self.capture.jpeg_quality > 100 {
            return Err("JPEG quality must be between 1 and 100".to_string());
        }

        if self.liveness.checks.is_empty() {
            return Err("At least one liveness check must be configured".to_string());
        }
        if self.liveness.countdown_secs == 0 || self.liveness.countdown_secs > 10 {
            return Err("Liveness countdown must be between 1 and 10 seconds".to_string());
        }
        for check in LivenessCheckId::ALL {
            if self.liveness.detection_duration(check).is_zero() {
                return Err(format!("Detection duration for {} must be positive", check));
            }
        }

        if !(0.0..=1.0).contains(&self.quality.min_face_confidence) {
            return Err("Minimum face confidence must be between 0.0 and 1.0".to_string());
        }
        if self.quality.eyes_open_contrast < 0.0 {
            return Err("Eyes-open contrast must not be negative".to_string());
        }
        if !(0.0..=1.0).contains(&self.quality.frontal_symmetry_tolerance) {
            return Err("Frontal symmetry tolerance must be between 0.0 and 1.0".to_string());
        }

        Ok(())
    }
}
