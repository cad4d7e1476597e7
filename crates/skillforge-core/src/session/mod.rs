//! Session domain: model and repository contracts.

pub mod model;
pub mod repository;

pub use model::{derive_title, Identity, Session, MAX_TITLE_LEN};
pub use repository::{IdentitySessionRepository, SessionRepository};
