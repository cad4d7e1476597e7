//! File-backed pending-session buffer.
//!
//! The buffer is a single well-known JSON file holding at most one draft.
//! `save` is read-merge-write so that streaming ticks carrying only the
//! changed fields never clobber fields written earlier.

use anyhow::{Context, Result};
use async_trait::async_trait;
use skillforge_core::pending::{PendingPatch, PendingSession, PendingSessionStore};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Pending-session store backed by one JSON file.
///
/// Writes go through a temp-file-then-rename so a process killed
/// mid-write leaves the previous draft readable.
pub struct FilePendingSessionStore {
    file_path: PathBuf,
}

impl FilePendingSessionStore {
    /// Creates a store writing to the given slot file. The parent
    /// directory is created on first save.
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
        }
    }

    /// Creates a store at the default location
    /// (`~/.config/skillforge/pending_session.json`).
    pub fn default_location() -> Result<Self> {
        let file_path = crate::paths::ForgePaths::pending_file()
            .map_err(|e| anyhow::anyhow!("Failed to resolve pending-session path: {}", e))?;
        Ok(Self::new(file_path))
    }

    async fn read_draft(&self) -> Result<Option<PendingSession>> {
        if !fs::try_exists(&self.file_path).await? {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.file_path)
            .await
            .context("Failed to read pending session file")?;

        match serde_json::from_str(&json) {
            Ok(draft) => Ok(Some(draft)),
            Err(e) => {
                // A corrupt slot must not wedge the pipeline; start over.
                tracing::warn!("Discarding unreadable pending session: {}", e);
                Ok(None)
            }
        }
    }

    async fn write_draft(&self, draft: &PendingSession) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create pending session directory")?;
        }

        let json = serde_json::to_string_pretty(draft)
            .context("Failed to serialize pending session")?;

        let tmp_path = self.file_path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .await
            .context("Failed to write pending session temp file")?;
        fs::rename(&tmp_path, &self.file_path)
            .await
            .context("Failed to move pending session into place")?;

        Ok(())
    }
}

#[async_trait]
impl PendingSessionStore for FilePendingSessionStore {
    async fn save(&self, patch: PendingPatch) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let draft = match self.read_draft().await? {
            Some(mut existing) => {
                existing.apply(patch, now);
                existing
            }
            None => PendingSession::from_patch(uuid::Uuid::new_v4().to_string(), patch, now),
        };
        self.write_draft(&draft).await
    }

    async fn load(&self) -> Result<Option<PendingSession>> {
        self.read_draft().await
    }

    async fn clear(&self) -> Result<()> {
        if fs::try_exists(&self.file_path).await? {
            fs::remove_file(&self.file_path)
                .await
                .context("Failed to delete pending session file")?;
        }
        Ok(())
    }

    async fn exists(&self) -> Result<bool> {
        Ok(fs::try_exists(&self.file_path).await?)
    }
}
