//! Path resolution for settings files.
//!
//! Supports absolute paths, paths relative to the settings file, and "~"
//! home directory expansion.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{RdError, Result};

/// Directory name used under the platform config and data directories.
pub const APP_DIR: &str = "rdeck";

/// Resolve a path from a settings file.
///
/// Resolution rules:
/// 1. Paths starting with `~`: expanded to home directory
/// 2. Absolute paths: used as-is
/// 3. Relative paths: resolved relative to the settings file's directory
pub fn resolve_path(path: &Path, config_dir: &Path) -> Result<PathBuf> {
    trace!(
        path = %path.display(),
        config_dir = %config_dir.display(),
        "Resolving path"
    );

    let path_str = path.to_string_lossy();

    if path_str == "~" || path_str.starts_with("~/") {
        let home = home_dir()?;
        let rest = path_str.strip_prefix("~/").unwrap_or("");
        let resolved = if rest.is_empty() { home } else { home.join(rest) };
        debug!(
            original = %path.display(),
            resolved = %resolved.display(),
            "Expanded home directory path"
        );
        return Ok(resolved);
    }

    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    let resolved = config_dir.join(path);
    debug!(
        original = %path.display(),
        resolved = %resolved.display(),
        "Resolved relative path"
    );
    Ok(resolved)
}

/// Resolve the user's home directory (cross-platform).
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .ok_or_else(|| RdError::ConfigInvalid("Could not determine home directory".to_string()))
}

/// `<config_dir>/rdeck/config.toml`.
pub fn default_config_path() -> Result<PathBuf> {
    let base = match dirs::config_dir() {
        Some(dir) => dir,
        None => home_dir()?.join(".config"),
    };
    Ok(base.join(APP_DIR).join("config.toml"))
}

/// `<data_dir>/rdeck/rdeck.db`.
pub fn default_storage_path() -> Result<PathBuf> {
    let base = match dirs::data_dir() {
        Some(dir) => dir,
        None => home_dir()?.join(".local").join("share"),
    };
    Ok(base.join(APP_DIR).join("rdeck.db"))
}
