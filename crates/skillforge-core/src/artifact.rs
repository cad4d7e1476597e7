//! Conversation turns and generated skill artifacts.

use serde::{Deserialize, Serialize};

/// The conventional instruction file every skill package carries.
pub const SKILL_FILE_NAME: &str = "SKILL.md";

/// Represents the role of a turn in a generation conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// Turn authored by the user.
    User,
    /// Turn authored by the model.
    Assistant,
}

/// One exchange in a generation conversation.
///
/// The transcript is an ordered, append-only sequence; the first user
/// turn's content is the original capability description (or a synthetic
/// placeholder when structured answers drive the first turn).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl GenerationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// One file of a generated skill package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillFile {
    /// Relative path, may include subdirectories. Unique within a package.
    pub path: String,
    /// Raw file content.
    pub content: String,
}

impl SkillFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// The parsed form of one completion: a short conversational message plus
/// the file package. Derived from the raw completion text, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ParsedResponse {
    pub message: String,
    pub files: Vec<SkillFile>,
}

impl ParsedResponse {
    /// Looks up a file by path.
    pub fn file(&self, path: &str) -> Option<&SkillFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Returns the conventional `SKILL.md` instruction file, if present.
    pub fn skill_file(&self) -> Option<&SkillFile> {
        self.file(SKILL_FILE_NAME)
    }
}
