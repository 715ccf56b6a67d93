//! Structure-aware chunking of rendered documentation.
//!
//! A line scanner classifies a rendered document into blocks (headings, code
//! listings, tables, lists, paragraphs). The chunker groups blocks into
//! heading-owned sections and emits size-bounded chunks that never cut a code
//! listing, carry their heading along, and point at their enclosing section.

pub mod chunker;
pub mod scanner;
pub mod sentence;

pub use chunker::{chunk_id, Chunker};
