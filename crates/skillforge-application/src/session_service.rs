//! Session store with a dual backend and local-to-identity migration.
//!
//! Sessions live in the device-local store while no identity exists and
//! in identity-scoped durable storage once one does. The backend is
//! selected per operation by checking identity presence; no ambient
//! identity state exists. On login the service performs a one-shot,
//! best-effort migration of locally-held sessions into the identity
//! store.

use skillforge_core::artifact::GenerationTurn;
use skillforge_core::error::{ForgeError, Result};
use skillforge_core::pending::{PendingSession, PendingSessionStore};
use skillforge_core::session::{
    derive_title, Identity, IdentitySessionRepository, Session, SessionRepository,
};
use skillforge_core::wire;
use std::collections::HashSet;
use std::sync::Arc;

/// A partial update to a session.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub spec: Option<String>,
    pub messages: Option<Vec<GenerationTurn>>,
}

impl SessionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spec(mut self, spec: impl Into<String>) -> Self {
        self.spec = Some(spec.into());
        self
    }

    pub fn messages(mut self, messages: Vec<GenerationTurn>) -> Self {
        self.messages = Some(messages);
        self
    }
}

/// Counts from one migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MigrationReport {
    pub migrated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Session store facade over the two repository backends.
pub struct SessionService {
    local: Arc<dyn SessionRepository>,
    durable: Arc<dyn IdentitySessionRepository>,
}

impl SessionService {
    pub fn new(
        local: Arc<dyn SessionRepository>,
        durable: Arc<dyn IdentitySessionRepository>,
    ) -> Self {
        Self { local, durable }
    }

    /// Lists sessions for the owner, newest first.
    pub async fn list(&self, identity: Option<&Identity>) -> Result<Vec<Session>> {
        let sessions = match identity {
            Some(identity) => self.durable.list_all(identity).await,
            None => self.local.list_all().await,
        }
        .map_err(|e| ForgeError::data_access(e.to_string()))?;
        Ok(sessions)
    }

    /// Creates a session for the owner, deriving the title from the
    /// description.
    ///
    /// A failed create is surfaced so the caller never marks the turn
    /// saved against a write that did not happen.
    pub async fn create(
        &self,
        identity: Option<&Identity>,
        description: impl Into<String>,
        spec: Option<String>,
        messages: Option<Vec<GenerationTurn>>,
    ) -> Result<Session> {
        let description = description.into();
        let now = chrono::Utc::now().to_rfc3339();
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            title: derive_title(&description),
            description,
            spec,
            messages,
            created_at: now.clone(),
            updated_at: now,
        };

        self.save(identity, &session).await?;
        tracing::debug!(session_id = session.id.as_str(), "Created session");
        Ok(session)
    }

    /// Fetches a session by id.
    pub async fn get(&self, identity: Option<&Identity>, session_id: &str) -> Result<Option<Session>> {
        match identity {
            Some(identity) => self.durable.find_by_id(identity, session_id).await,
            None => self.local.find_by_id(session_id).await,
        }
        .map_err(|e| ForgeError::data_access(e.to_string()))
    }

    /// Applies a partial update and bumps `updated_at`.
    ///
    /// # Errors
    ///
    /// `NotFound` when no session with the id exists for the owner; a
    /// failed write is surfaced to the caller.
    pub async fn update(
        &self,
        identity: Option<&Identity>,
        session_id: &str,
        patch: SessionPatch,
    ) -> Result<Session> {
        let mut session = self
            .get(identity, session_id)
            .await?
            .ok_or_else(|| ForgeError::not_found("session", session_id))?;

        if let Some(spec) = patch.spec {
            session.spec = Some(spec);
        }
        if let Some(messages) = patch.messages {
            session.messages = Some(messages);
        }
        session.updated_at = chrono::Utc::now().to_rfc3339();

        self.save(identity, &session).await?;
        Ok(session)
    }

    /// Deletes a session. Deleting a missing session is not an error.
    pub async fn delete(&self, identity: Option<&Identity>, session_id: &str) -> Result<()> {
        match identity {
            Some(identity) => self.durable.delete(identity, session_id).await,
            None => self.local.delete(session_id).await,
        }
        .map_err(|e| ForgeError::data_access(e.to_string()))
    }

    /// Promotes a completed pending draft into a durable session, then
    /// clears the buffer. The buffer is cleared only after the save
    /// succeeded, so a failed save leaves the draft restorable.
    pub async fn promote_pending(
        &self,
        identity: Option<&Identity>,
        pending: &PendingSession,
        buffer: &dyn PendingSessionStore,
    ) -> Result<Session> {
        if !pending.is_complete {
            return Err(ForgeError::internal(
                "Only a completed pending session can be promoted",
            ));
        }

        let parsed = wire::parse_completion(&pending.spec);
        let mut messages = vec![GenerationTurn::user(pending.description.clone())];
        if !parsed.message.is_empty() {
            messages.push(GenerationTurn::assistant(parsed.message));
        }

        let session = self
            .create(
                identity,
                pending.description.clone(),
                Some(pending.spec.clone()),
                Some(messages),
            )
            .await?;

        if let Err(e) = buffer.clear().await {
            // The durable record exists; a stale draft is only cosmetic.
            tracing::warn!("Failed to clear promoted pending session: {}", e);
        }

        Ok(session)
    }

    /// One-shot, best-effort migration of locally-held sessions into the
    /// identity store, run on the login event.
    ///
    /// - An empty local store is a no-op.
    /// - Sessions already present under the identity are skipped, so a
    ///   retried login event cannot duplicate records.
    /// - A failed copy is logged and skipped; it never blocks the
    ///   remaining sessions or the caller's load.
    /// - The local slot is cleared only when every session landed, so
    ///   nothing is lost to a partial failure; leftover local data makes
    ///   the next login retry naturally.
    pub async fn migrate_local_to_identity(&self, identity: &Identity) -> Result<MigrationReport> {
        let local_sessions = self
            .local
            .list_all()
            .await
            .map_err(|e| ForgeError::migration(e.to_string()))?;
        if local_sessions.is_empty() {
            return Ok(MigrationReport::default());
        }

        let existing: HashSet<String> = self
            .durable
            .list_all(identity)
            .await
            .map_err(|e| ForgeError::migration(e.to_string()))?
            .into_iter()
            .map(|s| s.id)
            .collect();

        let mut report = MigrationReport::default();
        for session in &local_sessions {
            if existing.contains(&session.id) {
                report.skipped += 1;
                continue;
            }
            match self.durable.save(identity, session).await {
                Ok(()) => report.migrated += 1,
                Err(e) => {
                    tracing::warn!(
                        session_id = session.id.as_str(),
                        "Failed to migrate session: {}",
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        if report.failed == 0 {
            if let Err(e) = self.local.take_all().await {
                tracing::warn!("Failed to clear local sessions after migration: {}", e);
            }
        }

        tracing::info!(
            migrated = report.migrated,
            skipped = report.skipped,
            failed = report.failed,
            "Local session migration finished"
        );
        Ok(report)
    }

    async fn save(&self, identity: Option<&Identity>, session: &Session) -> Result<()> {
        match identity {
            Some(identity) => self.durable.save(identity, session).await,
            None => self.local.save(session).await,
        }
        .map_err(|e| ForgeError::data_access(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;
    use skillforge_core::pending::PendingPatch;
    use skillforge_core::wire::encode_completion;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MockLocalRepository {
        sessions: Mutex<Vec<Session>>,
    }

    impl MockLocalRepository {
        fn new() -> Self {
            Self {
                sessions: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SessionRepository for MockLocalRepository {
        async fn find_by_id(&self, session_id: &str) -> AnyResult<Option<Session>> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .iter()
                .find(|s| s.id == session_id)
                .cloned())
        }

        async fn save(&self, session: &Session) -> AnyResult<()> {
            let mut sessions = self.sessions.lock().unwrap();
            match sessions.iter_mut().find(|s| s.id == session.id) {
                Some(existing) => *existing = session.clone(),
                None => sessions.push(session.clone()),
            }
            Ok(())
        }

        async fn delete(&self, session_id: &str) -> AnyResult<()> {
            self.sessions.lock().unwrap().retain(|s| s.id != session_id);
            Ok(())
        }

        async fn list_all(&self) -> AnyResult<Vec<Session>> {
            let mut sessions = self.sessions.lock().unwrap().clone();
            sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(sessions)
        }

        async fn take_all(&self) -> AnyResult<Vec<Session>> {
            Ok(std::mem::take(&mut *self.sessions.lock().unwrap()))
        }
    }

    struct MockDurableRepository {
        sessions: Mutex<HashMap<String, Vec<Session>>>,
        fail_saves_for: Mutex<HashSet<String>>,
    }

    impl MockDurableRepository {
        fn new() -> Self {
            Self {
                sessions: Mutex::new(HashMap::new()),
                fail_saves_for: Mutex::new(HashSet::new()),
            }
        }

        fn fail_saves_for(&self, session_id: &str) {
            self.fail_saves_for
                .lock()
                .unwrap()
                .insert(session_id.to_string());
        }
    }

    #[async_trait]
    impl IdentitySessionRepository for MockDurableRepository {
        async fn find_by_id(
            &self,
            identity: &Identity,
            session_id: &str,
        ) -> AnyResult<Option<Session>> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .get(&identity.user_id)
                .and_then(|sessions| sessions.iter().find(|s| s.id == session_id).cloned()))
        }

        async fn save(&self, identity: &Identity, session: &Session) -> AnyResult<()> {
            if self.fail_saves_for.lock().unwrap().contains(&session.id) {
                anyhow::bail!("simulated durable write failure");
            }
            let mut all = self.sessions.lock().unwrap();
            let sessions = all.entry(identity.user_id.clone()).or_default();
            match sessions.iter_mut().find(|s| s.id == session.id) {
                Some(existing) => *existing = session.clone(),
                None => sessions.push(session.clone()),
            }
            Ok(())
        }

        async fn delete(&self, identity: &Identity, session_id: &str) -> AnyResult<()> {
            if let Some(sessions) = self.sessions.lock().unwrap().get_mut(&identity.user_id) {
                sessions.retain(|s| s.id != session_id);
            }
            Ok(())
        }

        async fn list_all(&self, identity: &Identity) -> AnyResult<Vec<Session>> {
            let mut sessions = self
                .sessions
                .lock()
                .unwrap()
                .get(&identity.user_id)
                .cloned()
                .unwrap_or_default();
            sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(sessions)
        }
    }

    struct MockBuffer {
        draft: Mutex<Option<PendingSession>>,
    }

    impl MockBuffer {
        fn holding(pending: PendingSession) -> Self {
            Self {
                draft: Mutex::new(Some(pending)),
            }
        }
    }

    #[async_trait]
    impl PendingSessionStore for MockBuffer {
        async fn save(&self, _patch: PendingPatch) -> AnyResult<()> {
            Ok(())
        }

        async fn load(&self) -> AnyResult<Option<PendingSession>> {
            Ok(self.draft.lock().unwrap().clone())
        }

        async fn clear(&self) -> AnyResult<()> {
            *self.draft.lock().unwrap() = None;
            Ok(())
        }

        async fn exists(&self) -> AnyResult<bool> {
            Ok(self.draft.lock().unwrap().is_some())
        }
    }

    fn service() -> (
        SessionService,
        Arc<MockLocalRepository>,
        Arc<MockDurableRepository>,
    ) {
        let local = Arc::new(MockLocalRepository::new());
        let durable = Arc::new(MockDurableRepository::new());
        (
            SessionService::new(local.clone(), durable.clone()),
            local,
            durable,
        )
    }

    #[tokio::test]
    async fn test_create_targets_backend_by_identity() {
        let (service, local, durable) = service();
        let identity = Identity::new("alice");

        service
            .create(None, "Anonymous capability", None, None)
            .await
            .unwrap();
        service
            .create(Some(&identity), "Owned capability", None, None)
            .await
            .unwrap();

        assert_eq!(local.list_all().await.unwrap().len(), 1);
        assert_eq!(durable.list_all(&identity).await.unwrap().len(), 1);
        assert_eq!(service.list(None).await.unwrap().len(), 1);
        assert_eq!(service.list(Some(&identity)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_derives_title() {
        let (service, _, _) = service();
        let description = "Monitor a very long list of websites for changes and alert me by email";
        let session = service.create(None, description, None, None).await.unwrap();
        assert!(session.title.ends_with('…'));
        assert!(session.title.chars().count() <= 51);
        assert_eq!(session.description, description);
    }

    #[tokio::test]
    async fn test_update_bumps_timestamp_and_surfaces_not_found() {
        let (service, _, _) = service();
        let session = service.create(None, "desc", None, None).await.unwrap();

        let updated = service
            .update(None, &session.id, SessionPatch::new().spec("# SKILL"))
            .await
            .unwrap();
        assert_eq!(updated.spec.as_deref(), Some("# SKILL"));
        assert!(updated.updated_at >= session.updated_at);

        let err = service
            .update(None, "missing-id", SessionPatch::new().spec("x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_migration_moves_and_clears_local() {
        let (service, local, durable) = service();
        let identity = Identity::new("alice");

        service.create(None, "first", None, None).await.unwrap();
        service.create(None, "second", None, None).await.unwrap();

        let report = service.migrate_local_to_identity(&identity).await.unwrap();
        assert_eq!(report.migrated, 2);
        assert_eq!(report.failed, 0);

        assert!(local.list_all().await.unwrap().is_empty());
        assert_eq!(durable.list_all(&identity).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_migration_twice_does_not_duplicate() {
        // P6: a retried login event must not duplicate records.
        let (service, local, _durable) = service();
        let identity = Identity::new("alice");

        let session = service.create(None, "only one", None, None).await.unwrap();
        service.migrate_local_to_identity(&identity).await.unwrap();

        // Simulate the login event firing again with the local copy
        // still around (e.g. the clear raced a crash).
        local.save(&session).await.unwrap();
        let report = service.migrate_local_to_identity(&identity).await.unwrap();
        assert_eq!(report.migrated, 0);
        assert_eq!(report.skipped, 1);

        let sessions = service.list(Some(&identity)).await.unwrap();
        assert_eq!(sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_migration_on_empty_local_is_noop() {
        // P6: running migration against an empty local store is a no-op.
        let (service, _, _) = service();
        let report = service
            .migrate_local_to_identity(&Identity::new("alice"))
            .await
            .unwrap();
        assert_eq!(report, MigrationReport::default());
    }

    #[tokio::test]
    async fn test_partial_migration_failure_keeps_local_copies() {
        let (service, local, durable) = service();
        let identity = Identity::new("alice");

        let kept = service.create(None, "will fail", None, None).await.unwrap();
        service.create(None, "will land", None, None).await.unwrap();
        durable.fail_saves_for(&kept.id);

        let report = service.migrate_local_to_identity(&identity).await.unwrap();
        assert_eq!(report.migrated, 1);
        assert_eq!(report.failed, 1);

        // Local data survives so the next login retries; durable load
        // was never blocked.
        assert_eq!(local.list_all().await.unwrap().len(), 2);
        assert_eq!(durable.list_all(&identity).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_promote_pending_creates_session_then_clears_buffer() {
        // Scenario E: a completed draft becomes a durable session and the
        // buffer is cleared afterwards.
        let (service, _, durable) = service();
        let identity = Identity::new("alice");

        let spec = encode_completion(
            "Here is your skill.",
            &[skillforge_core::artifact::SkillFile::new("SKILL.md", "# W")],
        );
        let pending = PendingSession::from_patch(
            "draft-1",
            PendingPatch::new()
                .description("Monitor a website for changes")
                .spec(spec)
                .is_complete(true),
            "2025-01-01T00:00:00Z",
        );
        let buffer = MockBuffer::holding(pending.clone());

        let session = service
            .promote_pending(Some(&identity), &pending, &buffer)
            .await
            .unwrap();

        assert_eq!(session.description, "Monitor a website for changes");
        assert!(session.spec.as_deref().unwrap().contains("# W"));
        let messages = session.messages.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "Here is your skill.");
        assert!(!buffer.exists().await.unwrap());
        assert_eq!(durable.list_all(&identity).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_promote_incomplete_pending_rejected() {
        let (service, _, _) = service();
        let pending = PendingSession::from_patch(
            "draft-1",
            PendingPatch::new().description("d").spec("partial"),
            "2025-01-01T00:00:00Z",
        );
        let buffer = MockBuffer::holding(pending.clone());

        let err = service
            .promote_pending(None, &pending, &buffer)
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::Internal(_)));
        // The draft is untouched.
        assert!(buffer.exists().await.unwrap());
    }
}
