//! Client for OpenAI-compatible embedding APIs.
//!
//! Posts to `{base_url}/embeddings` and returns one vector per input text.
//! HTTP 429 surfaces as [`DocsiftError::RateLimited`] so ingestion can back
//! off and retry; every other failure is [`DocsiftError::Embedding`].

use docsift_core::{DocsiftError, EmbeddingConfig, Result};
use serde::{Deserialize, Serialize};

use crate::channel::{BoxFuture, Embedder};

/// Environment variable consulted when the config carries no API key.
pub const API_KEY_ENV: &str = "DOCSIFT_EMBEDDING_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// HTTP embedding client.
///
/// # Examples
///
/// ```
/// use docsift_search::EmbeddingClient;
///
/// let client = EmbeddingClient::new("test-key");
/// assert_eq!(client.model(), "text-embedding-3-small");
/// assert!(!format!("{client:?}").contains("test-key"));
/// ```
pub struct EmbeddingClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl EmbedResponse {
    /// Vectors in input order; items carrying an `index` are placed by it.
    fn into_vectors(self, expected: usize) -> Result<Vec<Vec<f32>>> {
        if self.data.len() != expected {
            return Err(DocsiftError::Embedding(format!(
                "expected {expected} embeddings, got {}",
                self.data.len()
            )));
        }
        let mut data = self.data;
        if data.iter().all(|item| item.index.is_some()) {
            data.sort_by_key(|item| item.index);
        }
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }
}

impl EmbeddingClient {
    /// Create a client for the default endpoint and model.
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a client from an [`EmbeddingConfig`].
    ///
    /// Falls back to the `DOCSIFT_EMBEDDING_API_KEY` environment variable
    /// when the config has no key.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Config`] if no API key is available.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use docsift_core::EmbeddingConfig;
    /// use docsift_search::EmbeddingClient;
    ///
    /// let client = EmbeddingClient::with_config(&EmbeddingConfig::default()).unwrap();
    /// ```
    pub fn with_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .ok_or_else(|| {
                DocsiftError::Config(format!(
                    "embedding API key not found: set embedding.api_key in .docsift.toml or {API_KEY_ENV}"
                ))
            })?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    /// Point the client at another OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Model name sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed `texts` in one request. Returns vectors in input order.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::RateLimited`] on HTTP 429 and
    /// [`DocsiftError::Embedding`] for any other failure.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DocsiftError::Embedding(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(DocsiftError::RateLimited(format!(
                    "embedding API returned {status}: {body}"
                )));
            }
            return Err(DocsiftError::Embedding(format!(
                "embedding API returned {status}: {body}"
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| DocsiftError::Embedding(format!("failed to parse response: {e}")))?;

        tracing::debug!(texts = texts.len(), model = %self.model, "embedded batch");
        embed_response.into_vectors(texts.len())
    }

    /// Embed a single query string.
    ///
    /// # Errors
    ///
    /// Same as [`EmbeddingClient::embed_batch`].
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[query.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| DocsiftError::Embedding("empty response from embedding API".into()))
    }
}

impl Embedder for EmbeddingClient {
    fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
        Box::pin(self.embed_batch(texts))
    }
}
