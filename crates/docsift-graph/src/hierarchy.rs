//! Directory-derived parent/child map between documents.
//!
//! Pure path logic: no document content is read. A file's parent is the
//! index document of the nearest ancestor directory that has one, where a
//! directory's index is `index.*`, `README.*` or `_index.*` inside it, or a
//! sibling file named like the directory (`guide.md` for `guide/`).

use std::collections::{BTreeMap, BTreeSet};

use docsift_core::normalize_path;
use serde::Serialize;

/// File stems that make a document the index of its directory.
pub const INDEX_NAMES: &[&str] = &["index", "README", "_index"];

/// Extensions a parent candidate may have.
pub const DOC_EXTENSIONS: &[&str] = &["md", "mdx", "adoc", "asciidoc"];

/// Position of one document in the directory hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    /// The document that logically contains this one, if any.
    pub parent_path: Option<String>,
    /// Documents whose `parent_path` is this one, sorted.
    pub children: Vec<String>,
    /// Number of directory components in the path.
    pub level: usize,
}

/// Map from normalised file path to its [`DirectoryEntry`].
pub type DirectoryStructure = BTreeMap<String, DirectoryEntry>;

/// Build the hierarchy for a set of document paths.
///
/// Backslashes are normalised to `/` and leading `./` or `/` is dropped; the
/// keys of the returned map are the normalised paths. A file with no index
/// document at any ancestor gets `parent_path = None`.
///
/// # Examples
///
/// ```
/// use docsift_graph::build_hierarchy;
///
/// let tree = build_hierarchy(["a.md", "a/b.md", "a/c/index.md", "a/c/d.md"]);
/// assert_eq!(tree["a/b.md"].parent_path.as_deref(), Some("a.md"));
/// assert_eq!(tree["a/c/index.md"].parent_path.as_deref(), Some("a.md"));
/// assert_eq!(tree["a/c/d.md"].parent_path.as_deref(), Some("a/c/index.md"));
/// assert_eq!(tree["a.md"].parent_path, None);
/// assert_eq!(tree["a.md"].children, vec!["a/b.md", "a/c/index.md"]);
/// assert_eq!(tree["a/c/d.md"].level, 2);
/// ```
pub fn build_hierarchy<I, S>(paths: I) -> DirectoryStructure
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let files: BTreeSet<String> = paths
        .into_iter()
        .map(|p| normalize_path(p.as_ref()))
        .filter(|p| !p.is_empty())
        .collect();

    // "dir/stem" -> first documentation file with that stem
    let mut by_stem: BTreeMap<String, &str> = BTreeMap::new();
    for file in &files {
        let (stem_path, ext) = split_extension(file);
        if ext.is_some_and(|e| DOC_EXTENSIONS.contains(&e)) {
            by_stem.entry(stem_path.to_string()).or_insert(file);
        }
    }

    let mut structure: DirectoryStructure = files
        .iter()
        .map(|file| {
            let entry = DirectoryEntry {
                parent_path: find_parent(file, &by_stem),
                children: Vec::new(),
                level: file.matches('/').count(),
            };
            (file.clone(), entry)
        })
        .collect();

    let links: Vec<(String, String)> = structure
        .iter()
        .filter_map(|(file, entry)| entry.parent_path.clone().map(|p| (p, file.clone())))
        .collect();
    for (parent, child) in links {
        if let Some(entry) = structure.get_mut(&parent) {
            entry.children.push(child);
        }
    }
    structure
}

fn find_parent(file: &str, by_stem: &BTreeMap<String, &str>) -> Option<String> {
    let (dir, name) = split_dir(file);
    let (stem, _) = split_extension(name);

    let mut current = if INDEX_NAMES.contains(&stem) {
        parent_dir(dir?)
    } else {
        dir
    };

    loop {
        if let Some(found) = candidates(current)
            .iter()
            .filter_map(|stem_path| by_stem.get(stem_path))
            .find(|candidate| **candidate != file)
        {
            return Some(found.to_string());
        }
        current = parent_dir(current?);
    }
}

/// Stem paths that would index directory `dir` (`None` is the root).
fn candidates(dir: Option<&str>) -> Vec<String> {
    let mut stems: Vec<String> = INDEX_NAMES.iter().map(|name| join(dir, name)).collect();
    if let Some(d) = dir {
        let (parent, base) = split_dir(d);
        stems.push(join(parent, base));
    }
    stems
}

fn join(dir: Option<&str>, name: &str) -> String {
    match dir {
        Some(d) => format!("{d}/{name}"),
        None => name.to_string(),
    }
}

/// Split `a/b/c.md` into `(Some("a/b"), "c.md")`.
fn split_dir(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, path),
    }
}

fn parent_dir(dir: &str) -> Option<&str> {
    split_dir(dir).0
}

/// Split `a/b.md` into `("a/b", Some("md"))`. Dotfiles have no extension.
fn split_extension(path: &str) -> (&str, Option<&str>) {
    let (_, name) = split_dir(path);
    match name.rfind('.') {
        Some(0) | None => (path, None),
        Some(dot) => {
            let cut = path.len() - name.len() + dot;
            (&path[..cut], Some(&path[cut + 1..]))
        }
    }
}
