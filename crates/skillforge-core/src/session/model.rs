//! Session domain model.
//!
//! This module contains the core Session entity that represents a saved
//! generation conversation in the application's domain layer.

use crate::artifact::GenerationTurn;
use serde::{Deserialize, Serialize};

/// Maximum length of a derived session title, in characters.
pub const MAX_TITLE_LEN: usize = 50;

/// An authenticated owner of durable sessions.
///
/// Absence of an identity means the session is owned by the local device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// A saved generation conversation.
///
/// Created once per capability request, mutated on every completed
/// generation turn, never deleted automatically. Owned by exactly one
/// identity once authenticated; owned by the local device otherwise.
///
/// This is the "pure" model that the business logic layer operates on.
/// It is independent of any specific storage format or version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier (UUID format)
    pub id: String,
    /// Human-readable title, derived from the description
    pub title: String,
    /// The original capability description
    pub description: String,
    /// Raw text of the last settled skill package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    /// Conversation transcript, ordered oldest-first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<GenerationTurn>>,
    /// Timestamp when the session was created (ISO 8601 format)
    pub created_at: String,
    /// Timestamp when the session was last updated (ISO 8601 format)
    pub updated_at: String,
}

/// Derives a session title from a capability description: whitespace is
/// collapsed, and the result is truncated to [`MAX_TITLE_LEN`] characters
/// with a trailing ellipsis when truncation happened.
pub fn derive_title(description: &str) -> String {
    let collapsed = description.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_TITLE_LEN {
        return collapsed;
    }
    let truncated: String = collapsed.chars().take(MAX_TITLE_LEN).collect();
    format!("{}…", truncated.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_title_short() {
        assert_eq!(
            derive_title("Monitor a website for changes"),
            "Monitor a website for changes"
        );
    }

    #[test]
    fn test_derive_title_collapses_whitespace() {
        assert_eq!(derive_title("  Watch \n  the\tsite  "), "Watch the site");
    }

    #[test]
    fn test_derive_title_truncates_with_ellipsis() {
        let description = "Monitor a very long list of websites for changes and send notifications";
        let title = derive_title(description);
        assert!(title.ends_with('…'));
        assert!(title.chars().count() <= MAX_TITLE_LEN + 1);
    }

    #[test]
    fn test_derive_title_exactly_at_limit_not_truncated() {
        let description = "x".repeat(MAX_TITLE_LEN);
        assert_eq!(derive_title(&description), description);
    }

    #[test]
    fn test_derive_title_multibyte_boundary() {
        let description = "日".repeat(MAX_TITLE_LEN + 10);
        let title = derive_title(&description);
        assert!(title.ends_with('…'));
        assert_eq!(title.chars().count(), MAX_TITLE_LEN + 1);
    }
}
