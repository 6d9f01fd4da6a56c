use super::pipeline::COMMAND_STATE;
use crate::monitor::ProcessingStats;
use crate::presence::PresenceStatus;
use tauri::command;

#[command]
pub async fn start_presence_detection() -> Result<(), String> {
    let mut state = COMMAND_STATE.lock().await;
    if state.presence.is_some() {
        return Ok(());
    }
    let tracker = state.pipeline()?.start_presence().map_err(|e| {
        log::error!("Failed to start presence detection: {}", e);
        e.to_string()
    })?;
    state.presence = Some(tracker);
    Ok(())
}

#[command]
pub async fn get_presence_status() -> Result<PresenceStatus, String> {
    let state = COMMAND_STATE.lock().await;
    state
        .presence
        .as_ref()
        .map(|p| p.status())
        .ok_or_else(|| "Presence detection is not running".to_string())
}

#[command]
pub async fn get_processing_stats() -> Result<ProcessingStats, String> {
    let state = COMMAND_STATE.lock().await;
    match (&state.presence, &state.capture) {
        (Some(presence), _) => Ok(presence.stats()),
        (None, Some(capture)) => Ok(capture.stats()),
        (None, None) => Err("No detection phase is running".to_string()),
    }
}

#[command]
pub async fn stop_presence_detection() -> Result<(), String> {
    let mut state = COMMAND_STATE.lock().await;
    if let Some(presence) = state.presence.take() {
        presence.stop();
    }
    Ok(())
}
