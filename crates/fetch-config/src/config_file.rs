use std::{env, path::PathBuf};

const CONFIG_FILE: &str = ".fetch-middleware.toml";
const APP_NAME: &str = "fetch-middleware";

/// Load config file content
///
/// Searches for the config in:
/// 1. Current working directory as .fetch-middleware.toml
/// 2. Home directory as .fetch-middleware.toml
/// 3. Platform config directory as fetch-middleware/config.toml
///
/// Returns the file content if found, None otherwise.
pub fn load_config_file() -> Option<String> {
    if let Ok(content) = std::fs::read_to_string(CONFIG_FILE) {
        log::debug!("Loaded config from {}", CONFIG_FILE);
        return Some(content);
    }

    let candidates = [get_home_config_path(), config_dir_path()];
    for path in candidates.into_iter().flatten() {
        if let Ok(content) = std::fs::read_to_string(&path) {
            log::debug!("Loaded config from {}", path.display());
            return Some(content);
        }
    }

    None
}

/// Path of the config file inside the platform config directory
///
/// ~/.config/fetch-middleware/config.toml on Linux,
/// ~/Library/Application Support/fetch-middleware/config.toml on macOS.
/// The directory is not created.
pub fn config_dir_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.toml"))
}

fn get_home_config_path() -> Option<PathBuf> {
    env::var_os("HOME").map(|home| PathBuf::from(home).join(CONFIG_FILE))
}
