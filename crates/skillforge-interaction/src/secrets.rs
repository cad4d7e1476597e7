//! Provider credential loading.
//!
//! Supports reading secrets from `~/.config/skillforge/secret.json`, with
//! environment variables filling in providers the file does not mention.

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Credentials for a single provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCredential {
    pub api_key: String,
    #[serde(default)]
    pub model_name: Option<String>,
}

/// Root configuration structure for secret.json
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecretConfig {
    #[serde(default)]
    pub openai: Option<ProviderCredential>,
    #[serde(default)]
    pub claude: Option<ProviderCredential>,
    #[serde(default)]
    pub gemini: Option<ProviderCredential>,
}

impl SecretConfig {
    /// Loads credentials from the default secret file, then fills in any
    /// provider missing from the file from environment variables
    /// (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `GEMINI_API_KEY`).
    ///
    /// A missing file is not an error; an unreadable or malformed one is.
    pub fn discover() -> Result<Self, String> {
        let path = default_secret_path()?;
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.fill_from_env();
        Ok(config)
    }

    /// Loads credentials from a specific secret.json file.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path).map_err(|e| {
            format!(
                "Failed to read configuration file at {}: {}",
                path.display(),
                e
            )
        })?;

        serde_json::from_str(&content).map_err(|e| {
            format!(
                "Failed to parse configuration file at {}: {}",
                path.display(),
                e
            )
        })
    }

    /// Fills providers absent from the file from environment variables.
    pub fn fill_from_env(&mut self) {
        if self.openai.is_none() {
            if let Ok(api_key) = env::var("OPENAI_API_KEY") {
                self.openai = Some(ProviderCredential {
                    api_key,
                    model_name: env::var("OPENAI_MODEL_NAME").ok(),
                });
            }
        }
        if self.claude.is_none() {
            if let Ok(api_key) = env::var("ANTHROPIC_API_KEY") {
                self.claude = Some(ProviderCredential {
                    api_key,
                    model_name: env::var("CLAUDE_MODEL_NAME").ok(),
                });
            }
        }
        if self.gemini.is_none() {
            if let Ok(api_key) = env::var("GEMINI_API_KEY") {
                self.gemini = Some(ProviderCredential {
                    api_key,
                    model_name: env::var("GEMINI_MODEL_NAME").ok(),
                });
            }
        }
    }

    /// Returns true when no provider at all is configured.
    pub fn is_empty(&self) -> bool {
        self.openai.is_none() && self.claude.is_none() && self.gemini.is_none()
    }
}

/// Returns the path to the configuration file:
/// ~/.config/skillforge/secret.json
fn default_secret_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or_else(|| "Could not determine home directory".to_string())?;
    Ok(home.join(".config").join("skillforge").join("secret.json"))
}
