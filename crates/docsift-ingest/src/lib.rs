//! Bulk ingestion: discover documents, chunk them, link the chunk graph, and
//! write it to the index in rate-limited batches.

pub mod pipeline;
pub mod retry;
pub mod walker;

pub use pipeline::{BatchFailure, IngestReport, IngestionPipeline};
pub use retry::RetryPolicy;
pub use walker::{discover_documents, read_document};
