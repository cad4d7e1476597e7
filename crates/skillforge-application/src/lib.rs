//! Application services for skillforge: clarifying-question generation,
//! the streaming skill generation engine, pending-session autosave, and
//! the dual-backend session store.

pub mod autosave;
pub mod engine;
pub mod prompts;
pub mod question_service;
pub mod session_service;

pub use autosave::PendingAutosave;
pub use engine::{
    ChannelState, GenerationEngine, NullObserver, SettledArtifact, StreamObserver,
    StreamSnapshot, TurnInput, TurnResult,
};
pub use question_service::QuestionService;
pub use session_service::{MigrationReport, SessionPatch, SessionService};
