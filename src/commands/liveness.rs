use super::pipeline::COMMAND_STATE;
use crate::liveness::{CheckReport, LivenessResult, LivenessRunner, LivenessSnapshot};
use std::sync::Arc;
use tauri::command;

async fn active_runner() -> Result<Arc<LivenessRunner>, String> {
    COMMAND_STATE
        .lock()
        .await
        .liveness
        .clone()
        .ok_or_else(|| "Liveness session is not running".to_string())
}

#[command]
pub async fn start_liveness_session() -> Result<LivenessSnapshot, String> {
    let mut state = COMMAND_STATE.lock().await;
    if let Some(runner) = &state.liveness {
        return Ok(runner.snapshot());
    }
    let runner = state.pipeline()?.start_liveness().map_err(|e| {
        log::error!("Failed to start liveness session: {}", e);
        e.to_string()
    })?;
    let snapshot = runner.snapshot();
    state.liveness = Some(Arc::new(runner));
    Ok(snapshot)
}

/// Countdown, detect and judge the current check
#[command]
pub async fn run_liveness_check() -> Result<CheckReport, String> {
    let runner = active_runner().await?;
    runner.run_current_check().await.map_err(|e| e.to_string())
}

#[command]
pub async fn retry_liveness_check() -> Result<CheckReport, String> {
    let runner = active_runner().await?;
    runner.retry().await.map_err(|e| e.to_string())
}

#[command]
pub async fn skip_liveness_check() -> Result<CheckReport, String> {
    active_runner().await?.skip().map_err(|e| e.to_string())
}

#[command]
pub async fn get_liveness_snapshot() -> Result<LivenessSnapshot, String> {
    Ok(active_runner().await?.snapshot())
}

/// The aggregate result; handed out once
#[command]
pub async fn take_liveness_result() -> Result<Option<LivenessResult>, String> {
    Ok(active_runner().await?.take_result())
}

#[command]
pub async fn stop_liveness_session() -> Result<(), String> {
    let mut state = COMMAND_STATE.lock().await;
    if let Some(runner) = state.liveness.take() {
        runner.stop();
    }
    Ok(())
}
