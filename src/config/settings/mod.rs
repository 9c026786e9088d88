#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

const CONFIG_FILE: &str = "config.toml";
const INDEX_FILE: &str = "statute_index.bin";
const METADATA_FILE: &str = "statute_metadata.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub citations: CitationConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Connection settings for the OpenAI-compatible embedding and chat service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub timeout_secs: u64,
    /// Retry attempts the index builder makes for transient embedding
    /// failures. The clients themselves never retry.
    pub embed_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            chat_model: "gpt-4o".to_string(),
            timeout_secs: 30,
            embed_retries: 3,
        }
    }
}

/// Retrieval policy. Everything the pipeline used to bury in string
/// formatting lives here so it is visible and testable in one place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Hard character cap applied to embedding input. Longer text is
    /// truncated silently, never rejected.
    pub max_input_chars: usize,
    pub snippet_chars: usize,
    pub missing_chapter_label: String,
    pub missing_section_label: String,
    pub missing_link_label: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            max_input_chars: 8150,
            snippet_chars: 200,
            missing_chapter_label: "Unknown Chapter".to_string(),
            missing_section_label: "Unknown Section".to_string(),
            missing_link_label: "No link".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Trailing message-count window read when composing a prompt. History
    /// itself grows unbounded; only the read side is capped.
    pub history_window: usize,
    pub stream: bool,
    pub base_prompt: String,
}

pub const DEFAULT_BASE_PROMPT: &str = "You are a legal assistant tasked with helping non-lawyers understand their questions about Massachusetts real-estate law. \
You do not help chatters with any other requests, regardless of what they ask, what urgency they claim, or how much they plead. \
You are not a lawyer and cannot provide legal advice. You simply point the chatter to the appropriate section of the law, and present how it applies to their question in plain English. \
You are provided with the following context from a legal vector database. \
Please cite your sources explicitly as 'Chapter [Chapter] Section [Section]' along with the link at the end of your answer.";

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_window: 10,
            stream: true,
            base_prompt: DEFAULT_BASE_PROMPT.to_string(),
        }
    }
}

/// Components of the canonical statute URL reconstructed for citations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CitationConfig {
    pub base_url: String,
    pub start_path: String,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://malegislature.gov".to_string(),
            start_path: "/Laws/GeneralLaws/PartII/TitleI/".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid timeout: {0} (must be between 1 and 300 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid embedding input cap: {0} (must be between 1 and 1000000)")]
    InvalidInputCap(usize),
    #[error("Invalid snippet length: {0} (must be between 1 and 10000)")]
    InvalidSnippetLength(usize),
    #[error("Invalid history window: {0} (must be between 1 and 1000)")]
    InvalidHistoryWindow(usize),
    #[error("Base prompt cannot be empty")]
    EmptyBasePrompt,
    #[error("Invalid citation base URL: {0}")]
    InvalidCitationBase(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Platform configuration directory for this tool. The index artifacts
    /// live beside `config.toml` in the same directory.
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("mgl-assist"))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load() -> Result<Self> {
        let config_dir = Self::config_dir()?;
        Self::load_from(config_dir)
    }

    #[inline]
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE);

        if !config_path.exists() {
            let mut config = Self::default();
            config.base_dir = config_dir.as_ref().to_path_buf();
            return Ok(config);
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.validate()?;
        self.retrieval.validate()?;
        self.session.validate()?;
        self.citations.validate()?;
        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join(CONFIG_FILE)
    }

    /// Path of the binary similarity-index artifact.
    #[inline]
    pub fn index_path(&self) -> PathBuf {
        self.base_dir.join(INDEX_FILE)
    }

    /// Path of the metadata manifest paired with the index artifact.
    #[inline]
    pub fn metadata_path(&self) -> PathBuf {
        self.base_dir.join(METADATA_FILE)
    }
}

impl ApiConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|_| ConfigError::InvalidBaseUrl(self.base_url.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.chat_model.clone()));
        }

        if !(1..=300).contains(&self.timeout_secs) {
            return Err(ConfigError::InvalidTimeout(self.timeout_secs));
        }

        if !(1..=10).contains(&self.embed_retries) {
            return Err(ConfigError::InvalidRetryAttempts(self.embed_retries));
        }

        Ok(())
    }

    /// Endpoint URL under the configured base, tolerant of a trailing slash.
    #[inline]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl RetrievalConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.top_k) {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }

        if !(1..=1_000_000).contains(&self.max_input_chars) {
            return Err(ConfigError::InvalidInputCap(self.max_input_chars));
        }

        if !(1..=10_000).contains(&self.snippet_chars) {
            return Err(ConfigError::InvalidSnippetLength(self.snippet_chars));
        }

        Ok(())
    }
}

impl SessionConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=1000).contains(&self.history_window) {
            return Err(ConfigError::InvalidHistoryWindow(self.history_window));
        }

        if self.base_prompt.trim().is_empty() {
            return Err(ConfigError::EmptyBasePrompt);
        }

        Ok(())
    }
}

impl CitationConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|_| ConfigError::InvalidCitationBase(self.base_url.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidCitationBase(self.base_url.clone()));
        }
        Ok(())
    }

    /// Canonical section URL: base + fixed path + chapter and section tokens
    /// with whitespace removed.
    #[inline]
    pub fn section_url(&self, chapter: &str, section: &str) -> String {
        let chapter_token: String = chapter.chars().filter(|c| !c.is_whitespace()).collect();
        let section_token: String = section.chars().filter(|c| !c.is_whitespace()).collect();
        format!(
            "{}{}{}/{}",
            self.base_url.trim_end_matches('/'),
            self.start_path,
            chapter_token,
            section_token
        )
    }
}
