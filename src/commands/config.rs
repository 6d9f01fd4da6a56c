use crate::config::LivecheckConfig;
use std::sync::{Arc, RwLock};
use tauri::command;

lazy_static::lazy_static! {
    static ref GLOBAL_CONFIG: Arc<RwLock<LivecheckConfig>> = Arc::new(RwLock::new(LivecheckConfig::load_or_default()));
}

/// Configuration the next pipeline is built from
pub(crate) fn current_config() -> Result<LivecheckConfig, String> {
    let config = GLOBAL_CONFIG.read().map_err(|e| e.to_string())?;
    Ok(config.clone())
}

/// Get the current configuration
#[command]
pub async fn get_config() -> Result<LivecheckConfig, String> {
    current_config()
}

/// Update configuration. Takes effect on the next `initialize_pipeline`.
#[command]
pub async fn update_config(new_config: LivecheckConfig) -> Result<(), String> {
    new_config.validate()?;

    {
        let mut config = GLOBAL_CONFIG.write().map_err(|e| e.to_string())?;
        *config = new_config.clone();
    }

    new_config
        .save_to_file(LivecheckConfig::default_path())
        .map_err(|e| e.to_string())?;

    Ok(())
}

/// Reset configuration to defaults
#[command]
pub async fn reset_config() -> Result<LivecheckConfig, String> {
    let default_config = LivecheckConfig::default();

    {
        let mut config = GLOBAL_CONFIG
            .write()
            .map_err(|e| format!("Failed to write config: {}", e))?;
        *config = default_config.clone();
    }

    default_config
        .save_to_file(LivecheckConfig::default_path())
        .map_err(|e| e.to_string())?;

    Ok(default_config)
}
