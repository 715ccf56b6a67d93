//! Structural validation of a chunk graph.
//!
//! Runs independently of construction and reports every violation found.

use std::collections::HashMap;
use std::fmt;

use docsift_core::{Chunk, DocsiftError};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

/// One broken invariant of a chunk graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphViolation {
    /// The same `chunk_id` appears more than once.
    DuplicateId {
        /// The repeated id.
        chunk_id: String,
        /// How many chunks carry it.
        count: usize,
    },
    /// `parent_id` names a chunk that does not exist.
    DanglingParent {
        /// The child.
        chunk_id: String,
        /// The missing parent.
        parent_id: String,
    },
    /// A chunk is its own parent.
    SelfParent {
        /// The offending chunk.
        chunk_id: String,
    },
    /// Parent pointers loop through these chunks (sorted).
    Cycle {
        /// Chunks on the cycle.
        chunk_ids: Vec<String>,
    },
}

impl fmt::Display for GraphViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphViolation::DuplicateId { chunk_id, count } => {
                write!(f, "chunk id {chunk_id} appears {count} times")
            }
            GraphViolation::DanglingParent {
                chunk_id,
                parent_id,
            } => write!(f, "chunk {chunk_id} has unknown parent {parent_id}"),
            GraphViolation::SelfParent { chunk_id } => write!(f, "chunk {chunk_id} is its own parent"),
            GraphViolation::Cycle { chunk_ids } => {
                write!(f, "parent cycle through {}", chunk_ids.join(" -> "))
            }
        }
    }
}

/// Outcome of [`validate_graph`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphReport {
    /// Number of chunks inspected.
    pub chunks: usize,
    /// Chunks without a parent.
    pub roots: usize,
    /// Every violation found.
    pub violations: Vec<GraphViolation>,
}

impl GraphReport {
    /// `true` when the graph is a forest with unique ids.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Turn an invalid report into [`DocsiftError::Graph`].
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Graph`] listing the violations.
    pub fn into_result(self) -> Result<Self, DocsiftError> {
        if self.is_valid() {
            return Ok(self);
        }
        let listed: Vec<String> = self.violations.iter().map(ToString::to_string).collect();
        Err(DocsiftError::Graph(format!(
            "{} violation(s): {}",
            listed.len(),
            listed.join("; ")
        )))
    }
}

/// Check that `chunks` forms a forest: unique ids, parents that exist, no
/// self-parents and no longer cycles.
///
/// # Examples
///
/// ```
/// use docsift_core::{Chunk, ChunkMetadata, Framework};
/// use docsift_graph::{validate_graph, GraphViolation};
///
/// let chunk = |id: &str, parent: Option<&str>| Chunk {
///     chunk_id: id.into(),
///     parent_id: parent.map(Into::into),
///     framework: Framework::Common,
///     content: String::new(),
///     source_url: String::new(),
///     file_path: "a.md".into(),
///     metadata: ChunkMetadata::default(),
/// };
///
/// let report = validate_graph(&[chunk("a", None), chunk("b", Some("a"))]);
/// assert!(report.is_valid());
/// assert_eq!(report.roots, 1);
///
/// let report = validate_graph(&[chunk("a", Some("a")), chunk("b", Some("gone"))]);
/// assert_eq!(report.violations.len(), 2);
/// assert!(matches!(report.violations[0], GraphViolation::SelfParent { .. }));
/// ```
pub fn validate_graph(chunks: &[Chunk]) -> GraphReport {
    let mut violations = Vec::new();

    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for chunk in chunks {
        let id = chunk.chunk_id.as_str();
        *counts.entry(id).or_insert(0) += 1;
        index.entry(id).or_insert_with(|| graph.add_node(id));
    }

    let mut seen_duplicates = std::collections::HashSet::new();
    for chunk in chunks {
        let id = chunk.chunk_id.as_str();
        let count = counts[id];
        if count > 1 && seen_duplicates.insert(id) {
            violations.push(GraphViolation::DuplicateId {
                chunk_id: id.to_string(),
                count,
            });
        }
    }

    let mut roots = 0;
    for chunk in chunks {
        let id = chunk.chunk_id.as_str();
        let Some(parent) = chunk.parent_id.as_deref() else {
            roots += 1;
            continue;
        };
        if parent == id {
            violations.push(GraphViolation::SelfParent {
                chunk_id: id.to_string(),
            });
            continue;
        }
        match index.get(parent) {
            Some(&to) => {
                graph.add_edge(index[id], to, ());
            }
            None => violations.push(GraphViolation::DanglingParent {
                chunk_id: id.to_string(),
                parent_id: parent.to_string(),
            }),
        }
    }

    for component in tarjan_scc(&graph) {
        if component.len() > 1 {
            let mut chunk_ids: Vec<String> = component.iter().map(|n| graph[*n].to_string()).collect();
            chunk_ids.sort();
            violations.push(GraphViolation::Cycle { chunk_ids });
        }
    }

    GraphReport {
        chunks: chunks.len(),
        roots,
        violations,
    }
}
