//! config.rs
//!
//! Credential and chat settings resolution. Every value is looked up in
//! order: command-line flag (clap also folds in the environment variable),
//! the secrets file, and finally an interactive prompt.
//!
//! Secrets file (TOML, keys shared with the hosted chat deployment):
//! ```toml
//! azure_openai_api_key = "..."
//! azure_openai_endpoint = "https://my-resource.openai.azure.com/"
//! azure_openai_api_version = "2025-03-01-preview"
//! azure_openai_api_model = "gpt-4o-mini"
//! azure_vector_store_id = "vs_..."
//!
//! [chat]
//! welcome_message = "Welcome! How can I help you today?"
//! initial_suggestions = ["...", "...", "..."]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::terminal::Prompter;

/// Trailing characters of the API key left visible when echoing it back.
const VISIBLE_KEY_CHARS: usize = 5;

pub const DEFAULT_WELCOME_MESSAGE: &str =
    "Welcome to the document assistant! How can I help you today?";

pub const DEFAULT_SUGGESTIONS: [&str; 3] = [
    "What topics do these documents cover?",
    "How do I get started?",
    "How do I troubleshoot common issues?",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid secrets file {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("prompt failed: {0}")]
    Prompt(#[from] inquire::InquireError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Connection details required by every provider call.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub endpoint: String,
    pub api_version: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub model: String,
    pub vector_store_id: String,
    pub welcome_message: String,
    pub initial_suggestions: [String; 3],
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct CredentialOverrides {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub api_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SecretsFile {
    pub azure_openai_api_key: Option<String>,
    pub azure_openai_endpoint: Option<String>,
    pub azure_openai_api_version: Option<String>,
    pub azure_openai_api_model: Option<String>,
    pub azure_vector_store_id: Option<String>,
    #[serde(default)]
    pub chat: ChatSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatSection {
    pub welcome_message: Option<String>,
    pub initial_suggestions: Option<Vec<String>>,
}

impl SecretsFile {
    /// Load the secrets file; a missing file yields empty settings.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no secrets file");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Show only the last five characters of `key`; short keys are fully masked.
pub fn mask_api_key(key: &str) -> String {
    let len = key.chars().count();
    if len < VISIBLE_KEY_CHARS {
        return "*".repeat(len);
    }
    let visible: String = key.chars().skip(len - VISIBLE_KEY_CHARS).collect();
    format!("{}{}", "*".repeat(len - VISIBLE_KEY_CHARS), visible)
}

/// First non-blank candidate, trimmed.
fn first_present(candidates: [Option<&str>; 2]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn resolve_credentials(
    overrides: &CredentialOverrides,
    secrets: &SecretsFile,
    prompter: &mut dyn Prompter,
) -> Result<Credentials, ConfigError> {
    let api_key = match first_present([
        overrides.api_key.as_deref(),
        secrets.azure_openai_api_key.as_deref(),
    ]) {
        Some(key) => key,
        None => {
            let key = prompter.secret("Enter your Azure OpenAI API Key:")?;
            let key = key.trim().to_string();
            if key.is_empty() {
                return Err(ConfigError::Invalid("API key is required".into()));
            }
            println!("API Key entered: {}", mask_api_key(&key));
            key
        }
    };

    let endpoint = match first_present([
        overrides.endpoint.as_deref(),
        secrets.azure_openai_endpoint.as_deref(),
    ]) {
        Some(v) => v,
        None => prompter.required_text(
            "Enter your Azure OpenAI Endpoint:",
            Some("e.g. https://your-service.openai.azure.com/"),
        )?,
    };

    let api_version = match first_present([
        overrides.api_version.as_deref(),
        secrets.azure_openai_api_version.as_deref(),
    ]) {
        Some(v) => v,
        None => prompter.required_text("Enter API Version:", Some("e.g. 2025-03-01-preview"))?,
    };

    Ok(Credentials {
        api_key,
        endpoint,
        api_version,
    })
}

pub fn resolve_chat_settings(
    model: Option<&str>,
    vector_store_id: Option<&str>,
    secrets: &SecretsFile,
    prompter: &mut dyn Prompter,
) -> Result<ChatSettings, ConfigError> {
    let model = match first_present([model, secrets.azure_openai_api_model.as_deref()]) {
        Some(v) => v,
        None => prompter.required_text("Enter model deployment name:", Some("e.g. gpt-4o-mini"))?,
    };
    let vector_store_id =
        match first_present([vector_store_id, secrets.azure_vector_store_id.as_deref()]) {
            Some(v) => v,
            None => prompter.required_text(
                "Enter Vector Store ID:",
                Some("e.g. vs_8K3mX9nP2wQ7vR5tA6bC4dE1"),
            )?,
        };

    let welcome_message = secrets
        .chat
        .welcome_message
        .clone()
        .unwrap_or_else(|| DEFAULT_WELCOME_MESSAGE.to_string());

    let initial_suggestions = match &secrets.chat.initial_suggestions {
        Some(list) => <[String; 3]>::try_from(list.clone()).map_err(|v| {
            ConfigError::Invalid(format!(
                "chat.initial_suggestions must have exactly 3 entries, got {}",
                v.len()
            ))
        })?,
        None => DEFAULT_SUGGESTIONS.map(str::to_string),
    };

    Ok(ChatSettings {
        model,
        vector_store_id,
        welcome_message,
        initial_suggestions,
    })
}
