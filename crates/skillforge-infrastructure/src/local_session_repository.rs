//! Device-local session repository.
//!
//! While no identity exists, all sessions live in a single well-known
//! JSON file holding an array, sorted newest-first on load. This is the
//! slot the one-shot migration drains when the user authenticates.

use anyhow::{Context, Result};
use async_trait::async_trait;
use skillforge_core::session::{Session, SessionRepository};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Session repository backed by one JSON array file.
pub struct LocalSessionRepository {
    file_path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl LocalSessionRepository {
    /// Creates a repository writing to the given slot file.
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Creates a repository at the default location
    /// (`~/.config/skillforge/local_sessions.json`).
    pub fn default_location() -> Result<Self> {
        let file_path = crate::paths::ForgePaths::local_sessions_file()
            .map_err(|e| anyhow::anyhow!("Failed to resolve local sessions path: {}", e))?;
        Ok(Self::new(file_path))
    }

    async fn read_sessions(&self) -> Result<Vec<Session>> {
        if !fs::try_exists(&self.file_path).await? {
            return Ok(Vec::new());
        }

        let json = fs::read_to_string(&self.file_path)
            .await
            .context("Failed to read local sessions file")?;

        match serde_json::from_str::<Vec<Session>>(&json) {
            Ok(mut sessions) => {
                // Sort by updated_at descending (most recent first)
                sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
                Ok(sessions)
            }
            Err(e) => {
                tracing::warn!("Treating unreadable local sessions file as empty: {}", e);
                Ok(Vec::new())
            }
        }
    }

    async fn write_sessions(&self, sessions: &[Session]) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create local sessions directory")?;
        }

        let json = serde_json::to_string_pretty(sessions)
            .context("Failed to serialize local sessions")?;

        let tmp_path = self.file_path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .await
            .context("Failed to write local sessions temp file")?;
        fs::rename(&tmp_path, &self.file_path)
            .await
            .context("Failed to move local sessions into place")?;

        Ok(())
    }
}

#[async_trait]
impl SessionRepository for LocalSessionRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        let sessions = self.read_sessions().await?;
        Ok(sessions.into_iter().find(|s| s.id == session_id))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut sessions = self.read_sessions().await?;
        match sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session.clone(),
            None => sessions.push(session.clone()),
        }
        self.write_sessions(&sessions).await
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut sessions = self.read_sessions().await?;
        sessions.retain(|s| s.id != session_id);
        self.write_sessions(&sessions).await
    }

    async fn list_all(&self) -> Result<Vec<Session>> {
        self.read_sessions().await
    }

    async fn take_all(&self) -> Result<Vec<Session>> {
        let _guard = self.write_lock.lock().await;
        let sessions = self.read_sessions().await?;
        if !sessions.is_empty() || fs::try_exists(&self.file_path).await? {
            self.write_sessions(&[]).await?;
        }
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_session(id: &str, updated_at: &str) -> Session {
        Session {
            id: id.to_string(),
            title: format!("Test Session {}", id),
            description: "Monitor a website for changes".to_string(),
            spec: None,
            messages: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: updated_at.to_string(),
        }
    }

    fn repo_in(dir: &TempDir) -> LocalSessionRepository {
        LocalSessionRepository::new(dir.path().join("local_sessions.json"))
    }

    #[tokio::test]
    async fn test_save_and_find_by_id() {
        let temp_dir = TempDir::new().unwrap();
        let repository = repo_in(&temp_dir);

        let session = create_test_session("s1", "2025-01-01T00:00:00Z");
        repository.save(&session).await.unwrap();

        let loaded = repository.find_by_id("s1").await.unwrap().unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.title, session.title);

        assert!(repository.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_is_upsert() {
        let temp_dir = TempDir::new().unwrap();
        let repository = repo_in(&temp_dir);

        let mut session = create_test_session("s1", "2025-01-01T00:00:00Z");
        repository.save(&session).await.unwrap();

        session.title = "Renamed".to_string();
        repository.save(&session).await.unwrap();

        let sessions = repository.list_all().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "Renamed");
    }

    #[tokio::test]
    async fn test_list_all_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let repository = repo_in(&temp_dir);

        repository
            .save(&create_test_session("old", "2025-01-01T00:00:00Z"))
            .await
            .unwrap();
        repository
            .save(&create_test_session("newest", "2025-03-01T00:00:00Z"))
            .await
            .unwrap();
        repository
            .save(&create_test_session("middle", "2025-02-01T00:00:00Z"))
            .await
            .unwrap();

        let ids: Vec<String> = repository
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["newest", "middle", "old"]);
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = TempDir::new().unwrap();
        let repository = repo_in(&temp_dir);

        repository
            .save(&create_test_session("s1", "2025-01-01T00:00:00Z"))
            .await
            .unwrap();
        repository.delete("s1").await.unwrap();

        assert!(repository.find_by_id("s1").await.unwrap().is_none());

        // Deleting a missing session is not an error.
        repository.delete("s1").await.unwrap();
    }

    #[tokio::test]
    async fn test_take_all_drains_slot() {
        let temp_dir = TempDir::new().unwrap();
        let repository = repo_in(&temp_dir);

        repository
            .save(&create_test_session("s1", "2025-01-01T00:00:00Z"))
            .await
            .unwrap();
        repository
            .save(&create_test_session("s2", "2025-01-02T00:00:00Z"))
            .await
            .unwrap();

        let taken = repository.take_all().await.unwrap();
        assert_eq!(taken.len(), 2);
        assert!(repository.list_all().await.unwrap().is_empty());

        // Draining an empty slot is a no-op.
        assert!(repository.take_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_file_treated_as_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("local_sessions.json");
        std::fs::write(&path, "not json at all").unwrap();

        let repository = LocalSessionRepository::new(&path);
        assert!(repository.list_all().await.unwrap().is_empty());
    }
}
