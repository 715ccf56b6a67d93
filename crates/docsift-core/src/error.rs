/// Errors that can occur across docsift.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate converts to `miette` diagnostics at the boundary.
///
/// Lookups of unknown chunk ids or file paths are not errors: stores return
/// `Ok(None)` for those.
///
/// # Examples
///
/// ```
/// use docsift_core::DocsiftError;
///
/// let err = DocsiftError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// assert!(!err.is_rate_limited());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum DocsiftError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A value could not be parsed (framework tag, document structure).
    #[error("parse error: {0}")]
    Parse(String),

    /// Embedding API or response error.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The external service rejected the call for quota reasons.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Index storage failure.
    #[error("database error: {0}")]
    Database(String),

    /// A retrieval channel failed or timed out.
    #[error("retrieval channel error: {0}")]
    Channel(String),

    /// The chunk graph violates its invariants.
    #[error("invalid chunk graph: {0}")]
    Graph(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl DocsiftError {
    /// Returns `true` for quota rejections that are worth retrying.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, DocsiftError::RateLimited(_))
    }
}
