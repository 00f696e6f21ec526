//! Path utilities for metrilens.
//!
//! Single source of truth for where cache files, sockets and configuration
//! live on disk.
//!
//! # Layout
//!
//! | Item | Location |
//! |------|----------|
//! | Unit cache file | `<project-root>/.Metrics/<unit>.json` |
//! | Reload socket   | `$XDG_RUNTIME_DIR/metrilens_reload.sock` or data dir |
//! | Control socket  | `$XDG_RUNTIME_DIR/metrilens.sock` or data dir |
//! | Configuration   | `~/.config/metrilens` (Linux) or data dir |

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

/// Errors specific to path operations.
#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not determine data directory")]
    NoDataDirectory,

    #[error("Could not determine config directory")]
    NoConfigDirectory,

    #[error("Invalid analysis unit name: {0:?}")]
    InvalidUnitName(String),
}

/// Application identifier used in path construction.
const APP_NAME: &str = "metrilens";

/// Directory under the project root that holds unit cache files.
pub const CACHE_DIR_NAME: &str = ".Metrics";

/// Extension of a unit cache file.
pub const CACHE_FILE_EXTENSION: &str = "json";

/// Well-known socket name for reload notifications.
const RELOAD_SOCKET_NAME: &str = "metrilens_reload.sock";

/// Socket name for daemon control commands.
const CONTROL_SOCKET_NAME: &str = "metrilens.sock";

/// Get the application data directory.
///
/// Creates the directory if it doesn't exist with secure permissions (0o700).
///
/// # Errors
/// Returns an error if the directory cannot be determined or created.
pub fn get_data_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().ok_or(PathError::NoDataDirectory)?;
    let data_dir = base_dir.join(APP_NAME);

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o700);
            fs::set_permissions(&data_dir, perms)
                .with_context(|| format!("Failed to set permissions on {}", data_dir.display()))?;
        }
    }

    Ok(data_dir)
}

/// Get the directory holding the host-local sockets.
///
/// # Platform Behavior
/// - **Linux**: Prefers `$XDG_RUNTIME_DIR` (e.g., `/run/user/1000`), falls back to data dir
/// - **Other**: Uses the data directory
pub fn get_socket_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        if let Some(runtime_dir) = dirs::runtime_dir() {
            if runtime_dir.exists() {
                return Ok(runtime_dir);
            }
        }
        get_data_dir()
    }

    #[cfg(not(target_os = "linux"))]
    {
        get_data_dir()
    }
}

/// Get the path of the well-known reload socket that subscribers connect to.
pub fn get_reload_socket_path() -> Result<PathBuf> {
    Ok(get_socket_dir()?.join(RELOAD_SOCKET_NAME))
}

/// Get the path of the daemon control socket.
pub fn get_control_socket_path() -> Result<PathBuf> {
    Ok(get_socket_dir()?.join(CONTROL_SOCKET_NAME))
}

/// Get the configuration directory.
///
/// # Platform Behavior
/// - **Linux**: `~/.config/metrilens`
/// - **Other**: the data directory
pub fn get_config_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let config_base = dirs::config_dir().ok_or(PathError::NoConfigDirectory)?;
        let config_dir = config_base.join(APP_NAME);

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).with_context(|| {
                format!(
                    "Failed to create config directory: {}",
                    config_dir.display()
                )
            })?;

            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o700);
            fs::set_permissions(&config_dir, perms).ok();
        }

        Ok(config_dir)
    }

    #[cfg(not(target_os = "linux"))]
    {
        get_data_dir()
    }
}

/// Directory holding every unit cache file of a project.
///
/// Not created here; the cache writer creates it on first save.
pub fn cache_dir(project_root: &Path) -> PathBuf {
    project_root.join(CACHE_DIR_NAME)
}

/// Cache file path for one analysis unit: `<project-root>/.Metrics/<unit>.json`.
///
/// # Errors
/// Returns [`PathError::InvalidUnitName`] when the unit name is empty or would
/// escape the cache directory.
pub fn unit_cache_path(project_root: &Path, unit: &str) -> Result<PathBuf> {
    validate_unit_name(unit)?;
    Ok(cache_dir(project_root).join(format!("{unit}.{CACHE_FILE_EXTENSION}")))
}

fn validate_unit_name(unit: &str) -> std::result::Result<(), PathError> {
    let escapes = unit.contains('/') || unit.contains('\\') || unit == "." || unit == "..";
    if unit.trim().is_empty() || escapes || unit.contains('\0') {
        return Err(PathError::InvalidUnitName(unit.to_string()));
    }
    Ok(())
}

/// Set secure Unix socket permissions (0o600, owner read/write only).
#[cfg(unix)]
pub fn secure_socket_permissions(socket_path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if socket_path.exists() {
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(socket_path, perms).with_context(|| {
            format!(
                "Failed to set socket permissions: {}",
                socket_path.display()
            )
        })?;
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn secure_socket_permissions(_socket_path: &Path) -> Result<()> {
    Ok(())
}
