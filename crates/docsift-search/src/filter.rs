//! Framework and version filtering.

use docsift_core::{Chunk, Framework};

/// Domain filter applied to both retrieval channels.
///
/// A `flow` or `hilla` filter also accepts `common` chunks; a `common` filter
/// accepts only `common`; no framework accepts everything. A version filter
/// requires an exact match.
///
/// # Examples
///
/// ```
/// use docsift_core::Framework;
/// use docsift_search::SearchFilter;
///
/// let filter = SearchFilter::new(Some(Framework::Flow), None);
/// assert!(filter.accepts(Framework::Flow, None));
/// assert!(filter.accepts(Framework::Common, None));
/// assert!(!filter.accepts(Framework::Hilla, None));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    /// Product variant, if restricted.
    pub framework: Option<Framework>,
    /// Exact product version, if restricted.
    pub version: Option<String>,
}

impl SearchFilter {
    /// Build a filter; a blank version counts as no version.
    pub fn new(framework: Option<Framework>, version: Option<String>) -> Self {
        let version = version
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Self { framework, version }
    }

    /// Frameworks a chunk may carry to pass; `None` means any.
    pub fn accepted_frameworks(&self) -> Option<Vec<Framework>> {
        self.framework.map(|fw| match fw {
            Framework::Common => vec![Framework::Common],
            other => vec![other, Framework::Common],
        })
    }

    /// Whether a chunk with this framework and version passes.
    pub fn accepts(&self, framework: Framework, version: Option<&str>) -> bool {
        let framework_ok = self
            .accepted_frameworks()
            .map_or(true, |accepted| accepted.contains(&framework));
        let version_ok = match &self.version {
            Some(wanted) => version == Some(wanted.as_str()),
            None => true,
        };
        framework_ok && version_ok
    }

    /// Whether `chunk` passes.
    pub fn matches(&self, chunk: &Chunk) -> bool {
        self.accepts(chunk.framework, chunk.metadata.version.as_deref())
    }
}
