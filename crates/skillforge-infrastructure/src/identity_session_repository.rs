//! Identity-scoped session repository.
//!
//! Directory structure:
//! ```text
//! base_dir/
//! └── users/
//!     └── <user_id>/
//!         └── sessions/
//!             ├── <session-id>.json
//!             └── <session-id>.json
//! ```
//!
//! One file per session; two identities never see each other's sessions.

use anyhow::{Context, Result};
use async_trait::async_trait;
use skillforge_core::session::{Identity, IdentitySessionRepository, Session};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Identity-scoped session repository over per-session JSON files.
pub struct DirIdentitySessionRepository {
    base_dir: PathBuf,
}

impl DirIdentitySessionRepository {
    /// Creates a repository rooted at the given base directory.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Creates a repository at the default location
    /// (`~/.config/skillforge`).
    pub fn default_location() -> Result<Self> {
        let base_dir = crate::paths::ForgePaths::config_dir()
            .map_err(|e| anyhow::anyhow!("Failed to resolve config directory: {}", e))?;
        Ok(Self::new(base_dir))
    }

    fn sessions_dir(&self, identity: &Identity) -> PathBuf {
        self.base_dir
            .join("users")
            .join(&identity.user_id)
            .join("sessions")
    }

    fn session_file_path(&self, identity: &Identity, session_id: &str) -> PathBuf {
        self.sessions_dir(identity).join(format!("{}.json", session_id))
    }
}

#[async_trait]
impl IdentitySessionRepository for DirIdentitySessionRepository {
    async fn find_by_id(&self, identity: &Identity, session_id: &str) -> Result<Option<Session>> {
        let file_path = self.session_file_path(identity, session_id);
        if !fs::try_exists(&file_path).await? {
            return Ok(None);
        }

        let json = fs::read_to_string(&file_path)
            .await
            .context(format!("Failed to read session file: {:?}", file_path))?;

        let session = serde_json::from_str(&json)
            .context("Failed to deserialize session data")?;

        Ok(Some(session))
    }

    async fn save(&self, identity: &Identity, session: &Session) -> Result<()> {
        let sessions_dir = self.sessions_dir(identity);
        fs::create_dir_all(&sessions_dir)
            .await
            .context("Failed to create sessions directory")?;

        let file_path = self.session_file_path(identity, &session.id);
        let json = serde_json::to_string_pretty(session)
            .context("Failed to serialize session data")?;

        fs::write(&file_path, json)
            .await
            .context(format!("Failed to write session file: {:?}", file_path))?;

        Ok(())
    }

    async fn delete(&self, identity: &Identity, session_id: &str) -> Result<()> {
        let file_path = self.session_file_path(identity, session_id);
        if fs::try_exists(&file_path).await? {
            fs::remove_file(&file_path)
                .await
                .context(format!("Failed to delete session file: {:?}", file_path))?;
        }
        Ok(())
    }

    async fn list_all(&self, identity: &Identity) -> Result<Vec<Session>> {
        let sessions_dir = self.sessions_dir(identity);
        if !fs::try_exists(&sessions_dir).await? {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&sessions_dir)
            .await
            .context("Failed to read sessions directory")?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let json = match fs::read_to_string(&path).await {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!("Skipping unreadable session file {:?}: {}", path, e);
                    continue;
                }
            };
            match serde_json::from_str::<Session>(&json) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    tracing::warn!("Skipping corrupt session file {:?}: {}", path, e);
                }
            }
        }

        // Sort by updated_at descending (most recent first)
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(sessions)
    }
}
