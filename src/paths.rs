//! Path utilities and file system helpers

use std::path::PathBuf;

/// Gets the application data directory
pub fn get_app_data_dir() -> Result<PathBuf, String> {
    dirs::data_dir()
        .map(|p| p.join("com.fitlab.desktop"))
        .ok_or_else(|| "Could not find app data directory".to_string())
}

/// Clears all application data
pub fn clear_app_data() -> Result<(), String> {
    let app_dir = get_app_data_dir()?;
    if app_dir.exists() {
        std::fs::remove_dir_all(&app_dir)
            .map_err(|e| format!("Failed to clear app data: {}", e))?;
    }
    Ok(())
}

/// Gets the engine configuration file path
pub fn get_config_path() -> Result<PathBuf, String> {
    get_app_data_dir().map(|p| p.join(".config.json"))
}

/// Gets the persisted session file path
pub fn get_session_path() -> Result<PathBuf, String> {
    get_app_data_dir().map(|p| p.join(".session.json"))
}

/// Gets the persisted photo selection file path
pub fn get_selection_path() -> Result<PathBuf, String> {
    get_app_data_dir().map(|p| p.join(".selection.json"))
}

/// Gets the persisted fitting cart file path
pub fn get_cart_path() -> Result<PathBuf, String> {
    get_app_data_dir().map(|p| p.join(".cart.json"))
}

/// Gets the try-on history database file path
pub fn get_db_path() -> Result<PathBuf, String> {
    get_app_data_dir().map(|p| p.join("history.db"))
}
