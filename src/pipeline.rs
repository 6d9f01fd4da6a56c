//! Verification pipeline
//!
//! Ties one camera, one detector engine and one configuration together and
//! starts the presence, capture and liveness phases on demand. The camera is
//! exclusive: a phase must be stopped before the next one can acquire it.

use crate::camera::CameraManager;
use crate::capture::{CaptureSession, CaptureSink};
use crate::config::LivecheckConfig;
use crate::detection::{DetectorEngine, DetectorMode};
use crate::errors::{CameraError, CaptureError, LivenessError};
use crate::liveness::{ChallengeEvaluator, LivenessRunner, SignalEvaluator};
use crate::monitor::VerificationReadiness;
use crate::presence::PresenceTracker;
use crate::types::{DeviceInfo, QualityMetrics};
use std::sync::Arc;

pub struct VerificationPipeline {
    config: LivecheckConfig,
    manager: CameraManager,
    engine: Arc<DetectorEngine>,
    evaluator: Arc<dyn ChallengeEvaluator>,
}

impl VerificationPipeline {
    /// Build the pipeline, loading detector assets from the configuration.
    pub fn new(config: LivecheckConfig, manager: CameraManager) -> Self {
        let engine = Arc::new(DetectorEngine::from_config(&config.detector));
        Self::with_parts(config, manager, engine, Arc::new(SignalEvaluator::default()))
    }

    pub fn with_parts(
        config: LivecheckConfig,
        manager: CameraManager,
        engine: Arc<DetectorEngine>,
        evaluator: Arc<dyn ChallengeEvaluator>,
    ) -> Self {
        log::info!(
            "Verification pipeline ready: camera backend {}, detector {}",
            manager.backend_name(),
            engine.strategy_name()
        );
        Self {
            config,
            manager,
            engine,
            evaluator,
        }
    }

    pub fn config(&self) -> &LivecheckConfig {
        &self.config
    }

    pub fn detector(&self) -> &Arc<DetectorEngine> {
        &self.engine
    }

    pub fn detector_mode(&self) -> DetectorMode {
        self.engine.mode()
    }

    pub fn camera(&self) -> &CameraManager {
        &self.manager
    }

    pub fn list_devices(&self) -> Result<Vec<DeviceInfo>, CameraError> {
        self.manager.list_devices()
    }

    /// Use another device for every phase started from now on.
    pub fn select_device(&mut self, device_id: &str) -> Result<(), CameraError> {
        let devices = self.manager.list_devices()?;
        if !devices.iter().any(|d| d.id == device_id) {
            return Err(CameraError::Unavailable(format!(
                "no camera with id {}",
                device_id
            )));
        }
        log::info!("Selected camera {}", device_id);
        self.config.camera.device_id = Some(device_id.to_string());
        Ok(())
    }

    pub fn is_streaming(&self) -> bool {
        self.manager.is_streaming()
    }

    pub fn start_presence(&self) -> Result<PresenceTracker, CameraError> {
        PresenceTracker::start(&self.manager, &self.config, self.engine.clone())
    }

    pub fn start_capture(&self, sink: Box<dyn CaptureSink>) -> Result<CaptureSession, CaptureError> {
        CaptureSession::start(&self.manager, &self.config, self.engine.clone(), sink)
    }

    pub fn start_liveness(&self) -> Result<LivenessRunner, LivenessError> {
        LivenessRunner::start(
            &self.manager,
            &self.config,
            self.engine.clone(),
            self.evaluator.clone(),
        )
    }

    /// Combine the latest face quality with liveness progress.
    pub fn readiness(
        &self,
        quality: Option<&QualityMetrics>,
        liveness: Option<&LivenessRunner>,
        spoofing_observations: u64,
    ) -> VerificationReadiness {
        let progress = liveness.map_or(0, |runner| runner.progress_percent());
        VerificationReadiness::evaluate(quality, progress, spoofing_observations)
    }
}
