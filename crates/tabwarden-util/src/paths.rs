//! Default paths for tabwarden components
//!
//! Paths are user-writable (the service is launched by the browser as the
//! logged-in user):
//! - Config: `$XDG_CONFIG_HOME/tabwarden/config.toml` or `~/.config/tabwarden/config.toml`
//! - Data: `$XDG_DATA_HOME/tabwarden` or `~/.local/share/tabwarden`

use std::path::PathBuf;

/// Environment variable for overriding the config file
pub const TABWARDEN_CONFIG_ENV: &str = "TABWARDEN_CONFIG";

/// Application subdirectory name
const APP_DIR: &str = "tabwarden";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Database filename within the data directory
pub const DATABASE_FILENAME: &str = "tabwarden.db";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$TABWARDEN_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/tabwarden/config.toml` (if XDG_CONFIG_HOME is set)
/// 3. `~/.config/tabwarden/config.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(TABWARDEN_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Get the data directory without checking the `TABWARDEN_DATA_DIR` env var,
/// which the service command line reads itself.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}
