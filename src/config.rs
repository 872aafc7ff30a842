//! Configuration loading.
//!
//! A [`Config`] is built once at process start and handed to every component.
//! Values come from built-in defaults, an optional TOML file, and then the
//! environment (including a `.env` file loaded by `main`), in that order.
//!
//! ```toml
//! [store]
//! backend = "qdrant"
//! qdrant_url = "http://localhost:6334"
//!
//! [llm]
//! base_url = "http://localhost:1234/v1"
//! model = "local-model"
//!
//! [chunking]
//! chunk_size = 1024
//! chunk_overlap = 200
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::embedding;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "./config/rag.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Timeout for every network call (vector store and language model), in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: f64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            ingest: IngestConfig::default(),
            request_timeout_secs: default_request_timeout(),
            log_level: default_log_level(),
        }
    }
}

fn default_request_timeout() -> f64 {
    600.0
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Which vector-store backend to use.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Embedded SQLite file.
    Local,
    /// Remote Qdrant server.
    Qdrant,
    /// In-process, nothing persisted.
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Local => "local",
            StoreBackend::Qdrant => "qdrant",
            StoreBackend::Memory => "memory",
        }
    }
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "sqlite" => Ok(StoreBackend::Local),
            "qdrant" => Ok(StoreBackend::Qdrant),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!(
                "Unknown vector store type: '{}'. Must be local, qdrant, or memory.",
                other
            ),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    /// SQLite file used by the `local` backend.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default)]
    pub qdrant_api_key: Option<String>,
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_store_path(),
            qdrant_url: default_qdrant_url(),
            qdrant_api_key: None,
            upsert_batch_size: default_upsert_batch_size(),
        }
    }
}

fn default_backend() -> StoreBackend {
    StoreBackend::Local
}
fn default_store_path() -> PathBuf {
    PathBuf::from("./rag_data/vectors.sqlite")
}
fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}
fn default_upsert_batch_size() -> usize {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_llm_model(),
            temperature: None,
        }
    }
}

fn default_llm_base_url() -> String {
    "http://localhost:1234/v1".to_string()
}
fn default_llm_model() -> String {
    "local-model".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    /// Texts per inference batch inside the embedding runtime.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Where downloaded model files are cached. Defaults to fastembed's own cache.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            text_model: default_text_model(),
            image_model: default_image_model(),
            batch_size: default_batch_size(),
            cache_dir: None,
        }
    }
}

fn default_text_model() -> String {
    "bge-large-en-v1.5".to_string()
}
fn default_image_model() -> String {
    "clip-vit-b-32".to_string()
}
fn default_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks of the same document.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1024
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Nearest neighbours fetched from each collection.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_excerpt_max_chars")]
    pub excerpt_max_chars: usize,
    /// Upper bound on the grounding context handed to the model. Unlimited when unset.
    #[serde(default)]
    pub max_context_chars: Option<usize>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            excerpt_max_chars: default_excerpt_max_chars(),
            max_context_chars: None,
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_excerpt_max_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            exclude_globs: Vec::new(),
            max_file_bytes: default_max_file_bytes(),
            follow_symlinks: false,
        }
    }
}

fn default_max_file_bytes() -> u64 {
    25 * 1024 * 1024
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_secs)
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production
    /// and a map in tests.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("VECTOR_STORE_TYPE") {
            self.store.backend = v.parse()?;
        }
        if let Some(v) = lookup("LOCAL_STORE_PATH") {
            self.store.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("QDRANT_URL") {
            self.store.qdrant_url = v;
        }
        if let Some(v) = lookup("QDRANT_API_KEY") {
            self.store.qdrant_api_key = non_empty(v);
        }
        if let Some(v) = lookup("LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = lookup("LLM_API_KEY") {
            self.llm.api_key = non_empty(v);
        }
        if let Some(v) = lookup("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = lookup("TEXT_EMBEDDING_MODEL") {
            self.embedding.text_model = v;
        }
        if let Some(v) = lookup("IMAGE_EMBEDDING_MODEL") {
            self.embedding.image_model = v;
        }
        if let Some(v) = lookup("REQUEST_TIMEOUT") {
            self.request_timeout_secs = v
                .trim()
                .parse::<f64>()
                .with_context(|| format!("REQUEST_TIMEOUT must be a number, got '{}'", v))?;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.log_level = v.to_ascii_lowercase();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be less than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be >= 1");
        }
        if self.retrieval.excerpt_max_chars == 0 {
            bail!("retrieval.excerpt_max_chars must be >= 1");
        }
        if !(self.request_timeout_secs.is_finite() && self.request_timeout_secs > 0.0) {
            bail!("request_timeout_secs must be > 0");
        }
        if self.store.upsert_batch_size == 0 {
            bail!("store.upsert_batch_size must be >= 1");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be >= 1");
        }
        embedding::text_model_spec(&self.embedding.text_model)?;
        embedding::image_model_spec(&self.embedding.image_model)?;
        Ok(())
    }
}

fn non_empty(v: String) -> Option<String> {
    if v.trim().is_empty() {
        None
    } else {
        Some(v)
    }
}

/// Load configuration from `path` (if present) and the process environment.
///
/// A missing file is only an error when `explicit` is set, i.e. the user
/// named it on the command line.
pub fn load_config(path: &Path, explicit: bool) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str::<Config>(&content).with_context(|| "Failed to parse config file")?
    } else if explicit {
        bail!("Config file not found: {}", path.display());
    } else {
        Config::default()
    };

    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}
