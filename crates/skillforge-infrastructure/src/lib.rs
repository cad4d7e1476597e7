//! File-backed storage implementations for skillforge: the pending-session
//! slot, the device-local session list, and identity-scoped durable
//! session storage.

pub mod identity_session_repository;
pub mod local_session_repository;
pub mod paths;
pub mod pending_store;

pub use identity_session_repository::DirIdentitySessionRepository;
pub use local_session_repository::LocalSessionRepository;
pub use paths::{ForgePaths, PathError};
pub use pending_store::FilePendingSessionStore;
