//! Query-time orchestration: filter, dual retrieve, fuse, budget.

use std::sync::Arc;
use std::time::Duration;

use docsift_core::{Chunk, DocumentResult, Framework, Result, RetrievalResult, SearchConfig};
use futures::future::join_all;

use crate::budget::fit_to_budget;
use crate::channel::{ChunkStore, RetrievalChannel, SearchHit};
use crate::filter::SearchFilter;
use crate::fusion::reciprocal_rank_fusion;

/// Per-query options.
///
/// # Examples
///
/// ```
/// use docsift_search::SearchOptions;
///
/// let options = SearchOptions::default();
/// assert_eq!(options.max_results, 5);
/// assert_eq!(options.max_tokens, 1500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    /// Upper bound on returned results.
    pub max_results: usize,
    /// Token budget for the combined content of the results.
    pub max_tokens: usize,
    /// Restrict to a product variant (plus `common`).
    pub framework: Option<Framework>,
    /// Restrict to an exact product version.
    pub version: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 5,
            max_tokens: 1500,
            framework: None,
            version: None,
        }
    }
}

impl SearchOptions {
    /// Options using the result and token defaults from `config`.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            max_results: config.default_max_results,
            max_tokens: config.default_max_tokens,
            ..Self::default()
        }
    }
}

/// Hybrid search engine fusing a dense and a sparse channel with RRF.
///
/// Holds only shared handles to its collaborators, so one engine can serve
/// concurrent queries.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use docsift_core::SearchConfig;
/// use docsift_search::{ChunkIndex, HybridSearch, SearchOptions};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let index = Arc::new(ChunkIndex::in_memory().unwrap());
/// let engine = HybridSearch::new(index.clone(), index.clone(), index, SearchConfig::default());
/// let results = engine.search("grid sorting", &SearchOptions::default()).await;
/// assert!(results.is_empty());
/// # }
/// ```
pub struct HybridSearch {
    dense: Arc<dyn RetrievalChannel>,
    sparse: Arc<dyn RetrievalChannel>,
    store: Arc<dyn ChunkStore>,
    config: SearchConfig,
}

impl HybridSearch {
    /// Create an engine over the given channels and store.
    pub fn new(
        dense: Arc<dyn RetrievalChannel>,
        sparse: Arc<dyn RetrievalChannel>,
        store: Arc<dyn ChunkStore>,
        config: SearchConfig,
    ) -> Self {
        Self {
            dense,
            sparse,
            store,
            config,
        }
    }

    /// Query-time configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Answer `question` with at most `options.max_results` chunks whose
    /// combined estimated size fits `options.max_tokens`.
    ///
    /// Never fails: a channel that errors or times out contributes nothing,
    /// and an empty question or a zero limit yields no results without
    /// querying either channel.
    pub async fn search(&self, question: &str, options: &SearchOptions) -> Vec<RetrievalResult> {
        let question = question.trim();
        if question.is_empty() || options.max_results == 0 || options.max_tokens == 0 {
            tracing::debug!("empty query or zero limit, skipping retrieval");
            return Vec::new();
        }

        let filter = SearchFilter::new(options.framework, options.version.clone());
        let fetch = options
            .max_results
            .saturating_mul(self.config.overfetch_factor)
            .max(self.config.min_overfetch);
        let timeout = Duration::from_millis(self.config.channel_timeout_ms);

        let (dense, sparse) = tokio::join!(
            run_channel("dense", self.dense.as_ref(), question, fetch, &filter, timeout),
            run_channel("sparse", self.sparse.as_ref(), question, fetch, &filter, timeout),
        );

        let dense: Vec<SearchHit> = dense.into_iter().filter(|h| filter.matches(&h.chunk)).collect();
        let sparse: Vec<SearchHit> = sparse.into_iter().filter(|h| filter.matches(&h.chunk)).collect();

        let fused = reciprocal_rank_fusion(&dense, &sparse, self.config.rrf_k);
        let candidates = fused.len();
        let selected = fit_to_budget(
            fused,
            options.max_tokens,
            options.max_results,
            self.config.chars_per_token,
        );

        tracing::debug!(
            dense = dense.len(),
            sparse = sparse.len(),
            candidates,
            returned = selected.len(),
            "hybrid search complete"
        );

        selected
            .into_iter()
            .map(|hit| RetrievalResult::new(hit.chunk, hit.score))
            .collect()
    }

    /// Fetch one chunk by id. Unknown ids are `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn get_chunk(&self, chunk_id: &str) -> Result<Option<Chunk>> {
        self.store.get_chunk(chunk_id).await
    }

    /// Fetch full documents concurrently, one result per requested path.
    ///
    /// Failures are captured per path; an unknown path yields
    /// `error = "not found"`.
    pub async fn get_documents(&self, file_paths: &[String]) -> Vec<DocumentResult> {
        let lookups = file_paths.iter().map(|path| async move {
            match self.store.get_document(path).await {
                Ok(Some(doc)) => DocumentResult {
                    file_path: path.clone(),
                    content: doc.content,
                    metadata: Some(doc.meta),
                    error: None,
                },
                Ok(None) => DocumentResult::failed(path.as_str(), "not found"),
                Err(e) => {
                    tracing::warn!(file_path = %path, error = %e, "document lookup failed");
                    DocumentResult::failed(path.as_str(), e.to_string())
                }
            }
        });
        join_all(lookups).await
    }
}

async fn run_channel(
    name: &'static str,
    channel: &dyn RetrievalChannel,
    query: &str,
    k: usize,
    filter: &SearchFilter,
    timeout: Duration,
) -> Vec<SearchHit> {
    match tokio::time::timeout(timeout, channel.search(query, k, filter)).await {
        Ok(Ok(hits)) => hits,
        Ok(Err(e)) => {
            tracing::warn!(channel = name, error = %e, "retrieval channel failed");
            Vec::new()
        }
        Err(_) => {
            tracing::warn!(
                channel = name,
                timeout_ms = timeout.as_millis() as u64,
                "retrieval channel timed out"
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{BoxFuture, SearchSource};
    use docsift_core::{ChunkMetadata, Document, DocumentMeta, DocsiftError};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn chunk(id: &str, framework: Framework, content: &str) -> Chunk {
        Chunk {
            chunk_id: id.into(),
            parent_id: None,
            framework,
            content: content.into(),
            source_url: format!("https://docs.example.com/{id}"),
            file_path: format!("{id}.md"),
            metadata: ChunkMetadata::default(),
        }
    }

    enum Behaviour {
        Hits(Vec<Chunk>),
        Fail,
        Hang,
    }

    struct MockChannel {
        source: SearchSource,
        behaviour: Behaviour,
        calls: AtomicUsize,
        last_k: AtomicUsize,
    }

    impl MockChannel {
        fn new(source: SearchSource, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                source,
                behaviour,
                calls: AtomicUsize::new(0),
                last_k: AtomicUsize::new(0),
            })
        }
    }

    impl RetrievalChannel for MockChannel {
        fn search<'a>(
            &'a self,
            _query: &'a str,
            k: usize,
            _filter: &'a SearchFilter,
        ) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.last_k.store(k, Ordering::SeqCst);
            Box::pin(async move {
                match &self.behaviour {
                    Behaviour::Hits(chunks) => Ok(chunks
                        .iter()
                        .take(k)
                        .map(|c| SearchHit {
                            chunk: c.clone(),
                            score: 1.0,
                            source: self.source,
                        })
                        .collect()),
                    Behaviour::Fail => Err(DocsiftError::Channel("backend unavailable".into())),
                    Behaviour::Hang => {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok(Vec::new())
                    }
                }
            })
        }
    }

    #[derive(Default)]
    struct MockStore {
        chunks: HashMap<String, Chunk>,
        documents: HashMap<String, Document>,
    }

    impl ChunkStore for MockStore {
        fn get_chunk<'a>(&'a self, chunk_id: &'a str) -> BoxFuture<'a, Result<Option<Chunk>>> {
            Box::pin(async move { Ok(self.chunks.get(chunk_id).cloned()) })
        }

        fn get_document<'a>(&'a self, file_path: &'a str) -> BoxFuture<'a, Result<Option<Document>>> {
            Box::pin(async move {
                if file_path == "broken.md" {
                    return Err(DocsiftError::Database("disk I/O error".into()));
                }
                Ok(self.documents.get(file_path).cloned())
            })
        }
    }

    fn engine(dense: Arc<MockChannel>, sparse: Arc<MockChannel>) -> HybridSearch {
        HybridSearch::new(dense, sparse, Arc::new(MockStore::default()), SearchConfig::default())
    }

    fn ids(results: &[RetrievalResult]) -> Vec<&str> {
        results.iter().map(|r| r.chunk.chunk_id.as_str()).collect()
    }

    #[tokio::test]
    async fn fuses_both_channels() {
        let a = chunk("a", Framework::Common, "Grid basics");
        let b = chunk("b", Framework::Common, "Grid sorting");
        let c = chunk("c", Framework::Common, "Grid filtering");
        let d = chunk("d", Framework::Common, "Sorting in general");
        let dense = MockChannel::new(SearchSource::Dense, Behaviour::Hits(vec![a, b.clone(), c]));
        let sparse = MockChannel::new(SearchSource::Sparse, Behaviour::Hits(vec![b, d]));

        let results = engine(dense, sparse)
            .search("how do I sort a grid", &SearchOptions::default())
            .await;

        assert_eq!(ids(&results), vec!["b", "a", "d", "c"]);
        assert!((results[0].relevance_score - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-12);
        assert_eq!(results[0].file_path, "b.md");
    }

    #[tokio::test]
    async fn failing_channel_degrades_to_the_other() {
        let hits = (0..3).map(|i| chunk(&format!("d{i}"), Framework::Common, "x")).collect();
        let dense = MockChannel::new(SearchSource::Dense, Behaviour::Hits(hits));
        let sparse = MockChannel::new(SearchSource::Sparse, Behaviour::Fail);

        let results = engine(dense, sparse).search("grid", &SearchOptions::default()).await;
        assert_eq!(ids(&results), vec!["d0", "d1", "d2"]);
    }

    #[tokio::test]
    async fn both_channels_failing_yields_nothing() {
        let dense = MockChannel::new(SearchSource::Dense, Behaviour::Fail);
        let sparse = MockChannel::new(SearchSource::Sparse, Behaviour::Fail);
        assert!(engine(dense, sparse).search("grid", &SearchOptions::default()).await.is_empty());
    }

    #[tokio::test]
    async fn hanging_channel_times_out() {
        let dense = MockChannel::new(SearchSource::Dense, Behaviour::Hang);
        let sparse = MockChannel::new(
            SearchSource::Sparse,
            Behaviour::Hits(vec![chunk("s", Framework::Common, "sparse only")]),
        );
        let config = SearchConfig {
            channel_timeout_ms: 50,
            ..SearchConfig::default()
        };
        let search = HybridSearch::new(dense, sparse, Arc::new(MockStore::default()), config);

        let results = search.search("grid", &SearchOptions::default()).await;
        assert_eq!(ids(&results), vec!["s"]);
    }

    #[tokio::test]
    async fn zero_limits_skip_both_channels() {
        let dense = MockChannel::new(
            SearchSource::Dense,
            Behaviour::Hits(vec![chunk("a", Framework::Common, "a")]),
        );
        let sparse = MockChannel::new(SearchSource::Sparse, Behaviour::Hits(Vec::new()));
        let search = engine(dense.clone(), sparse.clone());

        let zero_results = SearchOptions {
            max_results: 0,
            ..SearchOptions::default()
        };
        let zero_tokens = SearchOptions {
            max_tokens: 0,
            ..SearchOptions::default()
        };
        assert!(search.search("grid", &zero_results).await.is_empty());
        assert!(search.search("grid", &zero_tokens).await.is_empty());
        assert!(search.search("   ", &SearchOptions::default()).await.is_empty());

        assert_eq!(dense.calls.load(Ordering::SeqCst), 0);
        assert_eq!(sparse.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn overfetches_from_each_channel() {
        let dense = MockChannel::new(SearchSource::Dense, Behaviour::Hits(Vec::new()));
        let sparse = MockChannel::new(SearchSource::Sparse, Behaviour::Hits(Vec::new()));
        let search = engine(dense.clone(), sparse.clone());

        search.search("grid", &SearchOptions::default()).await;
        assert_eq!(dense.last_k.load(Ordering::SeqCst), 20);

        let wide = SearchOptions {
            max_results: 10,
            ..SearchOptions::default()
        };
        search.search("grid", &wide).await;
        assert_eq!(sparse.last_k.load(Ordering::SeqCst), 40);
    }

    #[tokio::test]
    async fn drops_hits_outside_the_framework() {
        let dense = MockChannel::new(
            SearchSource::Dense,
            Behaviour::Hits(vec![
                chunk("flow", Framework::Flow, "flow grid"),
                chunk("hilla", Framework::Hilla, "hilla grid"),
                chunk("common", Framework::Common, "styling grid"),
            ]),
        );
        let sparse = MockChannel::new(SearchSource::Sparse, Behaviour::Hits(Vec::new()));
        let options = SearchOptions {
            framework: Some(Framework::Hilla),
            ..SearchOptions::default()
        };

        let results = engine(dense, sparse).search("grid", &options).await;
        assert_eq!(ids(&results), vec!["hilla", "common"]);
    }

    #[tokio::test]
    async fn respects_token_budget() {
        // 100 tokens each at 4 chars per token
        let hits = (0..5)
            .map(|i| chunk(&format!("c{i}"), Framework::Common, &"x".repeat(400)))
            .collect();
        let dense = MockChannel::new(SearchSource::Dense, Behaviour::Hits(hits));
        let sparse = MockChannel::new(SearchSource::Sparse, Behaviour::Hits(Vec::new()));
        let options = SearchOptions {
            max_tokens: 250,
            ..SearchOptions::default()
        };

        let results = engine(dense, sparse).search("grid", &options).await;
        assert_eq!(ids(&results), vec!["c0", "c1"]);
    }

    #[tokio::test]
    async fn oversized_first_result_is_still_returned() {
        let dense = MockChannel::new(
            SearchSource::Dense,
            Behaviour::Hits(vec![chunk("big", Framework::Common, &"x".repeat(10_000))]),
        );
        let sparse = MockChannel::new(SearchSource::Sparse, Behaviour::Hits(Vec::new()));
        let options = SearchOptions {
            max_tokens: 10,
            ..SearchOptions::default()
        };
        let results = engine(dense, sparse).search("grid", &options).await;
        assert_eq!(ids(&results), vec!["big"]);
    }

    #[tokio::test]
    async fn get_chunk_and_documents() {
        let mut store = MockStore::default();
        let grid = chunk("grid", Framework::Common, "Grid");
        store.chunks.insert("grid".into(), grid.clone());
        store.documents.insert(
            "components/grid.md".into(),
            Document {
                content: "# Grid".into(),
                meta: DocumentMeta {
                    file_path: "components/grid.md".into(),
                    title: "Grid".into(),
                    ..DocumentMeta::default()
                },
            },
        );
        let idle = MockChannel::new(SearchSource::Dense, Behaviour::Hits(Vec::new()));
        let search = HybridSearch::new(idle.clone(), idle, Arc::new(store), SearchConfig::default());

        assert_eq!(search.get_chunk("grid").await.unwrap(), Some(grid));
        assert_eq!(search.get_chunk("nope").await.unwrap(), None);

        let paths = vec![
            "components/grid.md".to_string(),
            "missing.md".to_string(),
            "broken.md".to_string(),
        ];
        let docs = search.get_documents(&paths).await;
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].content, "# Grid");
        assert_eq!(docs[0].metadata.as_ref().unwrap().title, "Grid");
        assert!(docs[0].error.is_none());
        assert_eq!(docs[1].error.as_deref(), Some("not found"));
        assert!(docs[2].error.as_deref().unwrap().contains("disk I/O error"));
    }

    #[test]
    fn options_follow_config_defaults() {
        let config = SearchConfig {
            default_max_results: 8,
            default_max_tokens: 3000,
            ..SearchConfig::default()
        };
        let options = SearchOptions::from_config(&config);
        assert_eq!(options.max_results, 8);
        assert_eq!(options.max_tokens, 3000);
        assert_eq!(options.framework, None);
    }
}
