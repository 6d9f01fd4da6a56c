use super::pipeline::COMMAND_STATE;
use crate::capture::{CaptureSession, CaptureSink, CaptureState};
use crate::types::{CapturedImage, QualityMetrics};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tauri::command;

/// Confirmed images go back to the frontend as command results.
struct CommandSink;

impl CaptureSink for CommandSink {
    fn deliver(&self, image: CapturedImage) {
        log::info!(
            "Confirmed capture {} ({}x{}, {} bytes)",
            image.id(),
            image.width(),
            image.height(),
            image.encoded_bytes().len()
        );
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureStatus {
    pub state: CaptureState,
    pub attempts: u32,
    pub polling: bool,
    pub latest_quality: Option<QualityMetrics>,
    pub best_quality: Option<QualityMetrics>,
    /// Latest capture failure, including auto-captures nobody awaited
    pub last_error: Option<String>,
}

async fn active_session() -> Result<Arc<CaptureSession>, String> {
    COMMAND_STATE
        .lock()
        .await
        .capture
        .clone()
        .ok_or_else(|| "Capture session is not running".to_string())
}

#[command]
pub async fn start_capture_session() -> Result<(), String> {
    let mut state = COMMAND_STATE.lock().await;
    if state.capture.is_some() {
        return Ok(());
    }
    let session = state
        .pipeline()?
        .start_capture(Box::new(CommandSink))
        .map_err(|e| {
            log::error!("Failed to start capture session: {}", e);
            e.to_string()
        })?;
    state.capture = Some(Arc::new(session));
    Ok(())
}

/// Run the manual countdown and capture
#[command]
pub async fn trigger_capture() -> Result<CapturedImage, String> {
    let session = active_session().await?;
    session.capture_manual().await.map_err(|e| e.to_string())
}

#[command]
pub async fn confirm_capture() -> Result<CapturedImage, String> {
    active_session().await?.confirm().map_err(|e| e.to_string())
}

#[command]
pub async fn retake_capture() -> Result<(), String> {
    active_session().await?.retake().map_err(|e| e.to_string())
}

#[command]
pub async fn get_capture_status() -> Result<CaptureStatus, String> {
    let session = active_session().await?;
    Ok(CaptureStatus {
        state: session.state(),
        attempts: session.attempts(),
        polling: session.is_polling(),
        latest_quality: session.latest_quality(),
        best_quality: session.best_quality(),
        last_error: session.last_error().map(|e| e.to_string()),
    })
}

/// The captured image awaiting confirmation, auto-captures included
#[command]
pub async fn get_captured_image() -> Result<Option<CapturedImage>, String> {
    Ok(active_session().await?.captured())
}

#[command]
pub async fn stop_capture_session() -> Result<(), String> {
    let mut state = COMMAND_STATE.lock().await;
    if let Some(session) = state.capture.take() {
        session.stop();
    }
    Ok(())
}
