use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DocsiftError;

/// Top-level configuration loaded from `.docsift.toml`.
///
/// Every section and field has a default, so an empty file is valid.
///
/// # Examples
///
/// ```
/// use docsift_core::DocsiftConfig;
///
/// let config = DocsiftConfig::default();
/// assert_eq!(config.search.rrf_k, 60);
/// assert_eq!(config.chunker.chunk_overlap, 50);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocsiftConfig {
    /// Chunk sizing.
    #[serde(default)]
    pub chunker: ChunkerConfig,
    /// Query-time behaviour.
    #[serde(default)]
    pub search: SearchConfig,
    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Bulk ingestion settings.
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Local index location.
    #[serde(default)]
    pub index: IndexConfig,
}

impl DocsiftConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Io`] if the file cannot be read, or
    /// [`DocsiftError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use docsift_core::DocsiftConfig;
    /// use std::path::Path;
    ///
    /// let config = DocsiftConfig::from_file(Path::new(".docsift.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, DocsiftError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Toml`] if parsing fails, or
    /// [`DocsiftError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsift_core::DocsiftConfig;
    ///
    /// let toml = r#"
    /// [chunker]
    /// max_chunk_size = 1200
    /// "#;
    /// let config = DocsiftConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.chunker.max_chunk_size, 1200);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, DocsiftError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), DocsiftError> {
        if self.chunker.max_chunk_size == 0 {
            return Err(DocsiftError::Config(
                "chunker.max_chunk_size must be greater than zero".into(),
            ));
        }
        if self.chunker.chunk_overlap >= self.chunker.max_chunk_size {
            return Err(DocsiftError::Config(format!(
                "chunker.chunk_overlap ({}) must be smaller than chunker.max_chunk_size ({})",
                self.chunker.chunk_overlap, self.chunker.max_chunk_size
            )));
        }
        if self.search.chars_per_token == 0 {
            return Err(DocsiftError::Config(
                "search.chars_per_token must be greater than zero".into(),
            ));
        }
        if self.ingest.batch_size == 0 {
            return Err(DocsiftError::Config(
                "ingest.batch_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Chunk sizing configuration.
///
/// The defaults are tuned for few-hundred-character chunks; none of the
/// numbers is a contract.
///
/// # Examples
///
/// ```
/// use docsift_core::ChunkerConfig;
///
/// let config = ChunkerConfig::default();
/// assert_eq!(config.max_chunk_size, 800);
/// assert_eq!(config.min_context_chars, 20);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum characters of owned content before a section is split.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    /// Characters carried from the tail of one part into the next.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Minimum characters of explanatory text attached to a code block.
    #[serde(default = "default_min_context_chars")]
    pub min_context_chars: usize,
    /// Longest preceding paragraph used verbatim as code context.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

fn default_max_chunk_size() -> usize {
    800
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_min_context_chars() -> usize {
    20
}

fn default_max_context_chars() -> usize {
    300
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_context_chars: default_min_context_chars(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

/// Query-time configuration for the hybrid search engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Reciprocal Rank Fusion constant.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: usize,
    /// Each channel fetches `max_results * overfetch_factor` candidates...
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,
    /// ...but never fewer than this.
    #[serde(default = "default_min_overfetch")]
    pub min_overfetch: usize,
    /// Characters per estimated token when truncating to a budget.
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
    /// Per-channel timeout in milliseconds.
    #[serde(default = "default_channel_timeout_ms")]
    pub channel_timeout_ms: u64,
    /// Result count used when the caller gives none.
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,
    /// Token budget used when the caller gives none.
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: usize,
}

fn default_rrf_k() -> usize {
    60
}

fn default_overfetch_factor() -> usize {
    4
}

fn default_min_overfetch() -> usize {
    20
}

fn default_chars_per_token() -> usize {
    4
}

fn default_channel_timeout_ms() -> u64 {
    10_000
}

fn default_max_results() -> usize {
    5
}

fn default_max_tokens() -> usize {
    1500
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rrf_k: default_rrf_k(),
            overfetch_factor: default_overfetch_factor(),
            min_overfetch: default_min_overfetch(),
            chars_per_token: default_chars_per_token(),
            channel_timeout_ms: default_channel_timeout_ms(),
            default_max_results: default_max_results(),
            default_max_tokens: default_max_tokens(),
        }
    }
}

/// Configuration for the embedding provider.
///
/// # Examples
///
/// ```
/// use docsift_core::EmbeddingConfig;
///
/// let config = EmbeddingConfig::default();
/// assert_eq!(config.model, "text-embedding-3-small");
/// assert_eq!(config.dimensions, 1536);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// API key; falls back to `DOCSIFT_EMBEDDING_API_KEY`.
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible embeddings API.
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    /// Model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Embedding dimensions.
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

fn default_embedding_dimensions() -> usize {
    1536
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
        }
    }
}

/// Bulk ingestion configuration: batching and rate-limit backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Chunks per embed/upsert batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between consecutive batches.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Retries of one batch after a rate-limit rejection.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// Upper bound for a single backoff delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Prefix for `source_url` of discovered documents.
    #[serde(default = "default_source_base_url")]
    pub source_base_url: String,
}

fn default_batch_size() -> usize {
    64
}

fn default_batch_delay_ms() -> u64 {
    200
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_source_base_url() -> String {
    "https://vaadin.com/docs/latest".into()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            source_base_url: default_source_base_url(),
        }
    }
}

/// Location of the local SQLite index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Path of the index database.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

fn default_index_path() -> PathBuf {
    PathBuf::from(".docsift/index.db")
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}
