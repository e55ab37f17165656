//! Configuration management for docrag.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Defaults (local-first: Ollama)
//! - Config file (.docrag/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric: uploads and vector stores live
//! under `.docrag/`, partitioned by embedding provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// Name of the per-workspace data directory.
pub const DATA_DIR: &str = ".docrag";

/// Embedding/generation backend. Each variant owns a distinct vector space
/// and storage namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local Ollama runtime
    Ollama,
    /// Hosted OpenAI API
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderKind {
    /// All supported providers.
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Ollama, ProviderKind::OpenAi];

    /// Parse provider kind from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" | "local" => Some(Self::Ollama),
            "openai" | "hosted" => Some(Self::OpenAi),
            _ => None,
        }
    }

    /// Canonical provider id, also used as the storage namespace.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| AppError::UnknownProvider(s.to_string()))
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Ollama settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaSettings {
    pub endpoint: String,
    pub model: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub timeout_secs: u64,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2:1b".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_dimensions: 768,
            timeout_secs: 120,
        }
    }
}

/// OpenAI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiSettings {
    pub endpoint: String,
    pub model: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: 1536,
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docrag/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active embedding/generation provider
    pub provider: ProviderKind,

    pub ollama: OllamaSettings,

    pub openai: OpenAiSettings,

    /// Target chunk size in characters
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,

    /// Chunks retrieved per question
    pub top_k: usize,

    /// Log level override
    pub log_level: Option<String>,

    pub log_format: LogFormat,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    provider: Option<String>,
    providers: Option<ProvidersSection>,
    ingestion: Option<IngestionSection>,
    retrieval: Option<RetrievalSection>,
    workspace: Option<WorkspaceSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ProvidersSection {
    ollama: Option<OllamaSection>,
    openai: Option<OpenAiSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OllamaSection {
    endpoint: Option<String>,
    model: Option<String>,
    embedding_model: Option<String>,
    embedding_dimensions: Option<usize>,
    timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenAiSection {
    endpoint: Option<String>,
    model: Option<String>,
    embedding_model: Option<String>,
    embedding_dimensions: Option<usize>,
    api_key_env: Option<String>,
    temperature: Option<f32>,
    timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestionSection {
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalSection {
    top_k: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WorkspaceSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    format: Option<LogFormat>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: ProviderKind::Ollama, // Local-first default
            ollama: OllamaSettings::default(),
            openai: OpenAiSettings::default(),
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 3,
            log_level: None,
            log_format: LogFormat::Text,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML config file, and
    /// environment variables.
    ///
    /// Environment variables:
    /// - `DOCRAG_WORKSPACE`: Override workspace path
    /// - `DOCRAG_CONFIG`: Path to config file
    /// - `DOCRAG_PROVIDER`: Embedding/generation provider
    /// - `OLLAMA_URL`: Ollama endpoint
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use docrag_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("DOCRAG_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("DOCRAG_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.workspace.join(DATA_DIR).join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("DOCRAG_PROVIDER") {
            config.provider = provider.parse()?;
        }

        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.ollama.endpoint = url;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
        }

        if let Some(provider) = file.provider {
            result.provider = provider.parse()?;
        }

        if let Some(providers) = file.providers {
            if let Some(ollama) = providers.ollama {
                let target = &mut result.ollama;
                if let Some(v) = ollama.endpoint {
                    target.endpoint = v;
                }
                if let Some(v) = ollama.model {
                    target.model = v;
                }
                if let Some(v) = ollama.embedding_model {
                    target.embedding_model = v;
                }
                if let Some(v) = ollama.embedding_dimensions {
                    target.embedding_dimensions = v;
                }
                if let Some(v) = ollama.timeout {
                    target.timeout_secs = v;
                }
            }

            if let Some(openai) = providers.openai {
                let target = &mut result.openai;
                if let Some(v) = openai.endpoint {
                    target.endpoint = v;
                }
                if let Some(v) = openai.model {
                    target.model = v;
                }
                if let Some(v) = openai.embedding_model {
                    target.embedding_model = v;
                }
                if let Some(v) = openai.embedding_dimensions {
                    target.embedding_dimensions = v;
                }
                if let Some(v) = openai.api_key_env {
                    target.api_key_env = v;
                }
                if let Some(v) = openai.temperature {
                    target.temperature = v;
                }
                if let Some(v) = openai.timeout {
                    target.timeout_secs = v;
                }
            }
        }

        if let Some(ingestion) = file.ingestion {
            if let Some(size) = ingestion.chunk_size {
                result.chunk_size = size;
            }
            if let Some(overlap) = ingestion.chunk_overlap {
                result.chunk_overlap = overlap;
            }
        }

        if let Some(top_k) = file.retrieval.and_then(|r| r.top_k) {
            result.top_k = top_k;
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and
    /// the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<ProviderKind>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .docrag directory.
    pub fn data_dir(&self) -> PathBuf {
        self.workspace.join(DATA_DIR)
    }

    /// Directory holding uploaded source files for a provider.
    pub fn upload_dir(&self, provider: ProviderKind) -> PathBuf {
        self.data_dir().join("uploads").join(provider.as_str())
    }

    /// Storage location of a provider's persisted vector index.
    pub fn vector_store_path(&self, provider: ProviderKind) -> PathBuf {
        self.data_dir().join("vector_store").join(provider.as_str())
    }

    /// Ensure the .docrag directory exists.
    pub fn ensure_data_dir(&self) -> AppResult<()> {
        let data_dir = self.data_dir();
        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir).map_err(|e| {
                AppError::Config(format!("Failed to create {} directory: {}", DATA_DIR, e))
            })?;
        }
        Ok(())
    }

    /// Resolve the OpenAI API key from its configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.openai.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunkSize must be greater than 0".to_string()));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunkOverlap ({}) must be smaller than chunkSize ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        if self.top_k == 0 {
            return Err(AppError::Config("topK must be greater than 0".to_string()));
        }

        match self.provider {
            ProviderKind::OpenAi => {
                if self.resolve_api_key().is_none() {
                    return Err(AppError::Config(format!(
                        "API key not found in environment variable: {}",
                        self.openai.api_key_env
                    )));
                }
            }
            ProviderKind::Ollama => {
                // Ollama doesn't require API keys
            }
        }

        Ok(())
    }
}
