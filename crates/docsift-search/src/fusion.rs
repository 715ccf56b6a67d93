//! Reciprocal Rank Fusion of the dense and sparse rankings.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use docsift_core::Chunk;

use crate::channel::SearchHit;

/// Default RRF smoothing constant.
pub const RRF_K: usize = 60;

/// A chunk with its fused score.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    /// The chunk.
    pub chunk: Chunk,
    /// Sum of `1 / (k + rank)` over the lists the chunk appears in.
    pub score: f64,
}

/// Merge two ranked lists with Reciprocal Rank Fusion.
///
/// Each list contributes `1 / (k + rank)` per chunk, with 1-based rank. A
/// chunk repeated within one list counts once, at its best rank. The output
/// is sorted by fused score descending; ties keep first-seen order, scanning
/// `dense` before `sparse`.
///
/// # Examples
///
/// ```
/// use docsift_core::{Chunk, ChunkMetadata, Framework};
/// use docsift_search::fusion::{reciprocal_rank_fusion, RRF_K};
/// use docsift_search::{SearchHit, SearchSource};
///
/// let hit = |id: &str, source| SearchHit {
///     chunk: Chunk {
///         chunk_id: id.into(),
///         parent_id: None,
///         framework: Framework::Common,
///         content: String::new(),
///         source_url: String::new(),
///         file_path: "a.md".into(),
///         metadata: ChunkMetadata::default(),
///     },
///     score: 0.0,
///     source,
/// };
/// let dense = vec![hit("a", SearchSource::Dense), hit("b", SearchSource::Dense)];
/// let sparse = vec![hit("b", SearchSource::Sparse)];
///
/// let fused = reciprocal_rank_fusion(&dense, &sparse, RRF_K);
/// assert_eq!(fused[0].chunk.chunk_id, "b");
/// assert!((fused[0].score - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-12);
/// ```
pub fn reciprocal_rank_fusion(dense: &[SearchHit], sparse: &[SearchHit], k: usize) -> Vec<FusedHit> {
    let mut fused: Vec<FusedHit> = Vec::with_capacity(dense.len() + sparse.len());
    let mut position: HashMap<String, usize> = HashMap::new();

    for list in [dense, sparse] {
        let mut seen: HashSet<&str> = HashSet::new();
        for (rank, hit) in list.iter().enumerate() {
            let id = hit.chunk.chunk_id.as_str();
            if !seen.insert(id) {
                continue;
            }
            let contribution = 1.0 / (k as f64 + (rank + 1) as f64);
            match position.get(id) {
                Some(&i) => fused[i].score += contribution,
                None => {
                    position.insert(id.to_string(), fused.len());
                    fused.push(FusedHit {
                        chunk: hit.chunk.clone(),
                        score: contribution,
                    });
                }
            }
        }
    }

    // stable sort keeps first-seen order among equal scores
    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    fused
}
