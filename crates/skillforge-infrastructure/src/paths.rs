//! Unified path management for skillforge storage files.
//!
//! All skillforge configuration and persisted data live under a single
//! base directory, so every storage backend resolves its files the same
//! way across platforms.

use std::path::PathBuf;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Unified path management for skillforge.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/skillforge/            # Base directory
/// ├── secret.json                  # Provider API keys
/// ├── pending_session.json         # The single pending-session slot
/// ├── local_sessions.json          # Device-local session list
/// └── users/
///     └── <user_id>/
///         └── sessions/
///             ├── <session-id>.json
///             └── ...
/// ```
pub struct ForgePaths;

impl ForgePaths {
    /// Returns the skillforge base directory (`~/.config/skillforge`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        let home = dirs::home_dir().ok_or(PathError::HomeDirNotFound)?;
        Ok(home.join(".config").join("skillforge"))
    }

    /// Returns the pending-session slot file path.
    pub fn pending_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("pending_session.json"))
    }

    /// Returns the device-local session list file path.
    pub fn local_sessions_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("local_sessions.json"))
    }

    /// Returns the sessions directory for an identity.
    pub fn identity_sessions_dir(user_id: &str) -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?
            .join("users")
            .join(user_id)
            .join("sessions"))
    }
}
