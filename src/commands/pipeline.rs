use super::config::current_config;
use crate::camera::{CameraManager, NativeBackend};
use crate::capture::CaptureSession;
use crate::liveness::LivenessRunner;
use crate::monitor::VerificationReadiness;
use crate::pipeline::VerificationPipeline;
use crate::presence::PresenceTracker;
use crate::types::DeviceInfo;
use std::sync::Arc;
use tauri::command;
use tokio::sync::Mutex;

/// The pipeline and whichever phase currently owns the camera.
#[derive(Default)]
pub(crate) struct CommandState {
    pub pipeline: Option<VerificationPipeline>,
    pub presence: Option<PresenceTracker>,
    pub capture: Option<Arc<CaptureSession>>,
    pub liveness: Option<Arc<LivenessRunner>>,
}

impl CommandState {
    pub fn pipeline(&self) -> Result<&VerificationPipeline, String> {
        self.pipeline
            .as_ref()
            .ok_or_else(|| "Verification pipeline not initialized".to_string())
    }

    /// Stop every phase so the camera is free again
    pub fn stop_phases(&mut self) {
        if let Some(presence) = self.presence.take() {
            presence.stop();
        }
        if let Some(capture) = self.capture.take() {
            capture.stop();
        }
        if let Some(liveness) = self.liveness.take() {
            liveness.stop();
        }
    }
}

lazy_static::lazy_static! {
    pub(crate) static ref COMMAND_STATE: Mutex<CommandState> = Mutex::new(CommandState::default());
}

/// Build the pipeline from the stored configuration, replacing any previous one
#[command]
pub async fn initialize_pipeline() -> Result<String, String> {
    let config = current_config()?;
    config.validate()?;

    let mut state = COMMAND_STATE.lock().await;
    state.stop_phases();

    let pipeline = VerificationPipeline::new(config, CameraManager::new(Arc::new(NativeBackend::new())));
    let strategy = pipeline.detector().strategy_name().to_string();
    state.pipeline = Some(pipeline);

    log::info!("Verification pipeline initialized with {}", strategy);
    Ok(strategy)
}

#[command]
pub async fn list_cameras() -> Result<Vec<DeviceInfo>, String> {
    let state = COMMAND_STATE.lock().await;
    state.pipeline()?.list_devices().map_err(|e| {
        log::error!("Failed to list cameras: {}", e);
        format!("Failed to list cameras: {}", e)
    })
}

/// Switch cameras. Stops the running phase, which the caller restarts.
#[command]
pub async fn select_camera(device_id: String) -> Result<(), String> {
    let mut state = COMMAND_STATE.lock().await;
    state.stop_phases();
    state
        .pipeline
        .as_mut()
        .ok_or_else(|| "Verification pipeline not initialized".to_string())?
        .select_device(&device_id)
        .map_err(|e| e.to_string())
}

#[command]
pub async fn get_verification_readiness() -> Result<VerificationReadiness, String> {
    let state = COMMAND_STATE.lock().await;
    let pipeline = state.pipeline()?;

    let (quality, spoofing) = match (&state.presence, &state.capture) {
        (Some(presence), _) => (Some(presence.status().quality), presence.spoofing_total()),
        (None, Some(capture)) => (capture.latest_quality(), capture.spoofing_observations().len() as u64),
        (None, None) => (None, 0),
    };
    Ok(pipeline.readiness(quality.as_ref(), state.liveness.as_deref(), spoofing))
}

/// Stop every phase and release the camera
#[command]
pub async fn shutdown_pipeline() -> Result<(), String> {
    let mut state = COMMAND_STATE.lock().await;
    state.stop_phases();
    state.pipeline = None;
    log::info!("Verification pipeline shut down");
    Ok(())
}
