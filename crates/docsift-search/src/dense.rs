//! Embedding-similarity retrieval channel.

use std::sync::Arc;

use docsift_core::{DocsiftError, Result};

use crate::channel::{BoxFuture, Embedder, RetrievalChannel, SearchHit};
use crate::filter::SearchFilter;
use crate::store::ChunkIndex;

/// Dense retrieval channel: embeds the query, then ranks stored chunks by
/// cosine similarity.
pub struct DenseRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<ChunkIndex>,
}

impl DenseRetriever {
    /// Retriever embedding queries with `embedder` and scanning `index`.
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<ChunkIndex>) -> Self {
        Self { embedder, index }
    }
}

impl RetrievalChannel for DenseRetriever {
    fn search<'a>(
        &'a self,
        query: &'a str,
        k: usize,
        filter: &'a SearchFilter,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
        Box::pin(async move {
            let texts = [query.to_string()];
            let vector = self
                .embedder
                .embed(&texts)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| DocsiftError::Embedding("no embedding returned for query".into()))?;
            self.index.vector_search(&vector, k, filter)
        })
    }
}
