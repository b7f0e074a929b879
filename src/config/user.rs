//! User configuration location for edit-provenance.
//!
//! User config location: $XDG_CONFIG_HOME/edit-provenance/edit-provenance.toml
//! Fallback: the platform config directory (e.g. ~/.config on Linux)

use std::path::PathBuf;

const APP_DIR: &str = "edit-provenance";
const CONFIG_FILE: &str = "edit-provenance.toml";

/// Returns the path to the user configuration file.
///
/// The path is determined by:
/// 1. If $XDG_CONFIG_HOME is set: $XDG_CONFIG_HOME/edit-provenance/edit-provenance.toml
/// 2. Otherwise: `dirs::config_dir()`/edit-provenance/edit-provenance.toml
///
/// Returns None if no config directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join(APP_DIR).join(CONFIG_FILE));
    }

    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}
