//! Core types, configuration, and error handling for docsift.
//!
//! This crate provides the shared foundation used by all other docsift crates:
//! - [`DocsiftError`]: unified error type using `thiserror`
//! - [`DocsiftConfig`]: configuration loaded from `.docsift.toml`
//! - Shared types: [`Chunk`], [`ChunkMetadata`], [`Framework`], [`Document`],
//!   [`RetrievalResult`], [`DocumentResult`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    ChunkerConfig, DocsiftConfig, EmbeddingConfig, IndexConfig, IngestConfig, SearchConfig,
};
pub use error::DocsiftError;
pub use types::{
    normalize_path, Chunk, ChunkMetadata, ChunkType, Document, DocumentMeta, DocumentResult,
    Framework, OutputFormat, RetrievalResult, RESERVED_METADATA_KEYS,
};

/// A convenience `Result` type for docsift operations.
pub type Result<T> = std::result::Result<T, DocsiftError>;
