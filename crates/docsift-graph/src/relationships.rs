//! Cross-file linking and flattening into the persisted chunk graph.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use docsift_core::{normalize_path, Chunk};
use tracing::{debug, warn};

use crate::hierarchy::DirectoryStructure;

/// Fraction of a child's topic words that a parent chunk must contain to be
/// chosen as the child's anchor.
pub const TOPIC_MATCH_THRESHOLD: f64 = 0.6;

/// Merge per-file chunk lists and the directory hierarchy into one flat
/// chunk list with final `parent_id`s.
///
/// Each file with a parent document gets its root chunk (the first chunk
/// without an intra-file parent) attached to an anchor chunk in the parent:
/// the first chunk covering the child's topic, else the parent's first chunk
/// with a heading, else the parent's first chunk. Files come out in sorted
/// path order, chunks in document order.
///
/// A parent path that has no chunks is skipped; the child simply stays a root.
/// Keys are normalised with [`normalize_path`]; when two keys normalise to
/// the same path the later one wins and a warning is logged.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use docsift_core::{Chunk, ChunkMetadata, Framework};
/// use docsift_graph::{build_hierarchy, build_relationships};
///
/// fn chunk(id: &str, file: &str, heading: &str) -> Chunk {
///     Chunk {
///         chunk_id: id.into(),
///         parent_id: None,
///         framework: Framework::Common,
///         content: format!("# {heading}"),
///         source_url: String::new(),
///         file_path: file.into(),
///         metadata: ChunkMetadata::new("", heading, 1),
///     }
/// }
///
/// let mut by_file = BTreeMap::new();
/// by_file.insert("a.md".to_string(), vec![chunk("a0", "a.md", "Components")]);
/// by_file.insert("a/b.md".to_string(), vec![chunk("b0", "a/b.md", "Grid")]);
///
/// let tree = build_hierarchy(by_file.keys());
/// let graph = build_relationships(by_file, &tree);
/// let b = graph.iter().find(|c| c.chunk_id == "b0").unwrap();
/// assert_eq!(b.parent_id.as_deref(), Some("a0"));
/// ```
pub fn build_relationships(
    chunks_by_file: BTreeMap<String, Vec<Chunk>>,
    structure: &DirectoryStructure,
) -> Vec<Chunk> {
    let mut normalized: BTreeMap<String, Vec<Chunk>> = BTreeMap::new();
    for (path, chunks) in chunks_by_file {
        let key = normalize_path(&path);
        if normalized.insert(key.clone(), chunks).is_some() {
            warn!(file = %path, normalized = %key, "paths collide after normalisation, keeping the last one");
        }
    }
    let chunks_by_file = normalized;

    let mut cross_file: HashMap<String, String> = HashMap::new();
    for (path, chunks) in &chunks_by_file {
        let Some(parent_path) = structure.get(path).and_then(|e| e.parent_path.as_ref()) else {
            continue;
        };
        let Some(parent_chunks) = chunks_by_file.get(parent_path).filter(|c| !c.is_empty()) else {
            debug!(file = %path, parent = %parent_path, "parent document has no chunks, skipping");
            continue;
        };
        let Some(root) = chunks.iter().find(|c| c.parent_id.is_none()) else {
            continue;
        };

        let topic = child_topic(chunks);
        let anchor = find_anchor(parent_chunks, &topic);
        debug!(
            file = %path,
            parent = %parent_path,
            topic = %topic,
            anchor = %anchor.chunk_id,
            "linked document to parent"
        );
        cross_file.insert(root.chunk_id.clone(), anchor.chunk_id.clone());
    }

    chunks_by_file
        .into_values()
        .flatten()
        .map(|mut chunk| {
            if let Some(anchor) = cross_file.remove(&chunk.chunk_id) {
                chunk.parent_id = Some(anchor);
            }
            chunk
        })
        .collect()
}

/// Lower-cased alphanumeric words longer than two characters.
///
/// # Examples
///
/// ```
/// use docsift_graph::relationships::significant_words;
///
/// let words = significant_words("Grid: Column Configuration & a UI");
/// assert_eq!(words.into_iter().collect::<Vec<_>>(), vec!["column", "configuration", "grid"]);
/// ```
pub fn significant_words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of `topic` words present in `chunk`'s heading and content.
pub fn topic_coverage(topic: &BTreeSet<String>, chunk: &Chunk) -> f64 {
    if topic.is_empty() {
        return 0.0;
    }
    let mut words = significant_words(chunk.heading());
    words.extend(significant_words(&chunk.content));
    let covered = topic.iter().filter(|w| words.contains(*w)).count();
    covered as f64 / topic.len() as f64
}

/// The main topic of a document: its first level-1 heading, else the first
/// chunk's heading, else the title.
fn child_topic(chunks: &[Chunk]) -> String {
    let non_empty = |s: &str| (!s.trim().is_empty()).then(|| s.trim().to_string());
    chunks
        .iter()
        .find(|c| c.metadata.level == 1)
        .and_then(|c| non_empty(c.heading()))
        .or_else(|| chunks.first().and_then(|c| non_empty(c.heading())))
        .or_else(|| chunks.first().and_then(|c| non_empty(&c.metadata.title)))
        .unwrap_or_default()
}

/// `parent_chunks` must be non-empty.
fn find_anchor<'a>(parent_chunks: &'a [Chunk], topic: &str) -> &'a Chunk {
    let topic_words = significant_words(topic);
    parent_chunks
        .iter()
        .find(|c| topic_coverage(&topic_words, c) >= TOPIC_MATCH_THRESHOLD)
        .or_else(|| parent_chunks.iter().find(|c| !c.heading().trim().is_empty()))
        .unwrap_or(&parent_chunks[0])
}
