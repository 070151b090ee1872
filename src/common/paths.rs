//! Configuration and output paths
//!
//! Config lookup order: an explicit `--config` path, `./ui-trials.toml`,
//! then the platform config directory:
//! - Linux: `~/.config/ui-trials/config.toml`
//! - macOS: `~/Library/Application Support/ui-trials/config.toml`
//! - Windows: `%APPDATA%\ui-trials\config.toml`

use std::io;
use std::path::{Path, PathBuf};

/// Name used for the project directories
const APP_NAME: &str = "ui-trials";

/// Config file name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "ui-trials.toml";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the user configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Resolve which config file to read, if any exists
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }

    config_path().filter(|p| p.exists())
}

/// Turn a test title into a directory name safe on every platform
pub fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash && !out.is_empty() {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("scenario");
    }
    out
}

/// Ensure a directory exists, returning it
pub fn ensure_dir(dir: &Path) -> io::Result<PathBuf> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(dir.to_path_buf())
}

/// Ensure the parent directory of a file path exists
pub fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent).map(|_| ()),
        _ => Ok(()),
    }
}
