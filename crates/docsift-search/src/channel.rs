//! Interfaces of the collaborators the search engine and ingestion consume.
//!
//! All traits return boxed futures so they stay object safe and can be held
//! as `Arc<dyn Trait>`; tests substitute in-process doubles.

use std::future::Future;
use std::pin::Pin;

use docsift_core::{Chunk, Document, Result};

use crate::filter::SearchFilter;

/// An owned, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Which retrieval channel produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSource {
    /// Embedding similarity.
    Dense,
    /// Keyword/term weighting.
    Sparse,
}

/// One ranked hit from a retrieval channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Channel-native score; only the rank order matters for fusion.
    pub score: f64,
    /// Producing channel.
    pub source: SearchSource,
}

/// A ranked retrieval channel (dense or sparse).
///
/// Implementations return at most `k` hits that pass `filter`, best first.
pub trait RetrievalChannel: Send + Sync {
    /// Run `query` against the channel.
    fn search<'a>(
        &'a self,
        query: &'a str,
        k: usize,
        filter: &'a SearchFilter,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>>>;
}

/// Resolves chunk ids and file paths to stored content.
///
/// Unknown ids and paths are `Ok(None)`, not errors.
pub trait ChunkStore: Send + Sync {
    /// Fetch one chunk by id.
    fn get_chunk<'a>(&'a self, chunk_id: &'a str) -> BoxFuture<'a, Result<Option<Chunk>>>;

    /// Fetch a full document by its file path.
    fn get_document<'a>(&'a self, file_path: &'a str) -> BoxFuture<'a, Result<Option<Document>>>;
}

/// A chunk and its embedding, as written by ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    /// The chunk with its final `parent_id`.
    pub chunk: Chunk,
    /// Position of the chunk in its document.
    pub ordinal: usize,
    /// Embedding vector; empty when none was computed.
    pub embedding: Vec<f32>,
}

/// Bulk write side of the index.
pub trait IndexWriter: Send + Sync {
    /// Insert or replace records, keyed by `chunk_id`. Returns the number written.
    fn upsert(&self, records: Vec<IndexRecord>) -> BoxFuture<'_, Result<usize>>;

    /// Delete every chunk and document whose path equals `source` or lies
    /// under it as a directory. Returns the number of chunks deleted.
    fn delete_by_source<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<usize>>;

    /// Insert or replace full-document records, keyed by file path.
    fn upsert_documents(&self, documents: Vec<Document>) -> BoxFuture<'_, Result<usize>>;

    /// Every file path that has chunks or a document row, sorted.
    fn list_sources(&self) -> BoxFuture<'_, Result<Vec<String>>>;
}

/// Computes embedding vectors for texts.
pub trait Embedder: Send + Sync {
    /// One vector per input text, in input order.
    fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}
