//! Chunk graph construction and validation.
//!
//! Combines per-file chunk lists into one flat chunk graph: a directory
//! hierarchy derived purely from file paths links each document's root chunk
//! to an anchor chunk in its parent document, and petgraph checks that the
//! result is a forest.

pub mod hierarchy;
pub mod relationships;
pub mod validate;

pub use hierarchy::{build_hierarchy, DirectoryEntry, DirectoryStructure};
pub use relationships::{build_relationships, TOPIC_MATCH_THRESHOLD};
pub use validate::{validate_graph, GraphReport, GraphViolation};
