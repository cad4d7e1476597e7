//! Session repository traits.
//!
//! Defines the interfaces for session persistence. Two backends exist:
//! a device-local store used while no identity is present, and an
//! identity-scoped durable store. The application layer selects between
//! them per operation by checking identity presence.

use super::model::{Identity, Session};
use anyhow::Result;
use async_trait::async_trait;

/// An abstract repository for device-local session persistence.
///
/// This trait defines the contract for persisting and retrieving sessions
/// owned by the local device (no identity yet), decoupling the
/// application's core logic from the specific storage mechanism.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Finds a session by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: Session found
    /// - `Ok(None)`: Session not found
    /// - `Err(_)`: Error occurred during retrieval
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>>;

    /// Saves a session to storage (upsert by id).
    async fn save(&self, session: &Session) -> Result<()>;

    /// Deletes a session from storage. Deleting a missing session is not
    /// an error.
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Lists all stored sessions, newest first by `updated_at`.
    async fn list_all(&self) -> Result<Vec<Session>>;

    /// Removes and returns every stored session. Used by the one-shot
    /// local-to-identity migration.
    async fn take_all(&self) -> Result<Vec<Session>>;
}

/// An abstract repository for identity-scoped durable session persistence.
///
/// Every operation is scoped by the owning identity; two identities never
/// see each other's sessions.
#[async_trait]
pub trait IdentitySessionRepository: Send + Sync {
    /// Finds a session owned by `identity` by its ID.
    async fn find_by_id(&self, identity: &Identity, session_id: &str) -> Result<Option<Session>>;

    /// Saves a session under `identity` (upsert by id).
    async fn save(&self, identity: &Identity, session: &Session) -> Result<()>;

    /// Deletes a session owned by `identity`. Deleting a missing session
    /// is not an error.
    async fn delete(&self, identity: &Identity, session_id: &str) -> Result<()>;

    /// Lists all sessions owned by `identity`, newest first by
    /// `updated_at`.
    async fn list_all(&self, identity: &Identity) -> Result<Vec<Session>>;
}
