//! Hybrid retrieval over a chunk graph.
//!
//! Queries a dense (embedding) channel and a sparse (keyword) channel
//! concurrently, fuses their rankings with Reciprocal Rank Fusion, and trims
//! the fused list to a token budget. A local SQLite/FTS5 index provides the
//! sparse channel, the vector half of the dense channel, and the chunk and
//! document store.

pub mod budget;
pub mod channel;
pub mod dense;
pub mod embedding;
pub mod engine;
pub mod filter;
pub mod fusion;
pub mod store;

pub use channel::{
    BoxFuture, ChunkStore, Embedder, IndexRecord, IndexWriter, RetrievalChannel, SearchHit,
    SearchSource,
};
pub use dense::DenseRetriever;
pub use embedding::EmbeddingClient;
pub use engine::{HybridSearch, SearchOptions};
pub use filter::SearchFilter;
pub use store::{ChunkIndex, IndexStats};
