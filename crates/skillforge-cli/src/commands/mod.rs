pub mod generate;
pub mod migrate;
pub mod sessions;

use anyhow::Result;
use skillforge_application::SessionService;
use skillforge_infrastructure::{DirIdentitySessionRepository, LocalSessionRepository};
use std::sync::Arc;

/// Builds the session service over the default on-disk backends.
pub fn session_service() -> Result<SessionService> {
    let local = Arc::new(LocalSessionRepository::default_location()?);
    let durable = Arc::new(DirIdentitySessionRepository::default_location()?);
    Ok(SessionService::new(local, durable))
}
