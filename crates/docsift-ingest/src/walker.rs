use std::path::{Component, Path};

use docsift_chunker::scanner::{scan, BlockKind};
use docsift_core::{Document, DocumentMeta, Framework, Result};
use docsift_graph::hierarchy::DOC_EXTENSIONS;

/// Maximum file size to process (1 MiB).
const MAX_FILE_SIZE: u64 = 1_048_576;

/// Walk a documentation tree, respecting `.gitignore`, and load every
/// documentation file as a [`Document`].
///
/// Only `md`, `mdx`, `adoc` and `asciidoc` files up to 1 MiB are read. Paths
/// are relative to `root` with `/` separators, and the result is sorted by
/// path. The title is the first level-1 heading, or the file stem; the
/// source URL is `{source_base_url}/{path without extension}`.
///
/// # Errors
///
/// Returns [`DocsiftError::Io`](docsift_core::DocsiftError::Io) if `root`
/// cannot be read. Unreadable files inside the tree are skipped.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use docsift_ingest::discover_documents;
///
/// let docs = discover_documents(Path::new("docs"), "https://docs.example.com").unwrap();
/// for doc in &docs {
///     println!("{} ({})", doc.meta.file_path, doc.meta.framework);
/// }
/// ```
pub fn discover_documents(root: &Path, source_base_url: &str) -> Result<Vec<Document>> {
    std::fs::read_dir(root)?;

    let base_url = source_base_url.trim_end_matches('/');
    let mut documents = Vec::new();

    for entry in ignore::WalkBuilder::new(root).build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.path();
        let is_doc = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| DOC_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
        if !is_doc {
            continue;
        }

        match std::fs::metadata(path) {
            Ok(m) if m.len() <= MAX_FILE_SIZE => {}
            Ok(m) => {
                tracing::warn!(path = %path.display(), size = m.len(), "skipping oversized document");
                continue;
            }
            Err(_) => continue,
        }

        match read_document(root, path, base_url) {
            Ok(document) => documents.push(document),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable document");
            }
        }
    }

    documents.sort_by(|a, b| a.meta.file_path.cmp(&b.meta.file_path));
    tracing::info!(root = %root.display(), documents = documents.len(), "discovered documents");
    Ok(documents)
}

/// Load one documentation file below `root` as a [`Document`].
///
/// Metadata is derived the same way as in [`discover_documents`]; a `path`
/// outside `root` keeps its full path.
///
/// # Errors
///
/// Returns [`DocsiftError::Io`](docsift_core::DocsiftError::Io) if the file
/// cannot be read as UTF-8.
pub fn read_document(root: &Path, path: &Path, source_base_url: &str) -> Result<Document> {
    let content = std::fs::read_to_string(path)?;

    let relative = path.strip_prefix(root).unwrap_or(path);
    let file_path = relative
        .components()
        .filter(|c| !matches!(c, Component::CurDir | Component::RootDir | Component::Prefix(_)))
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    let stem = relative
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let title = document_title(&content).unwrap_or(stem);
    let url_path = match file_path.rsplit_once('.') {
        Some((without_ext, _)) => without_ext,
        None => file_path.as_str(),
    };

    Ok(Document {
        meta: DocumentMeta {
            framework: Framework::from_path(&file_path),
            source_url: format!("{}/{url_path}", source_base_url.trim_end_matches('/')),
            title,
            version: None,
            file_path,
        },
        content,
    })
}

/// First level-1 heading, in Markdown (`# Title`) or AsciiDoc (`= Title`) form.
/// Lines inside code listings are never titles.
fn document_title(content: &str) -> Option<String> {
    scan(content).iter().find_map(|block| {
        let title = match block.kind {
            BlockKind::Heading { level: 1 } => block.heading_text()?,
            BlockKind::Paragraph => block.text.lines().next()?.strip_prefix("= ")?,
            _ => return None,
        };
        let title = title.trim();
        (!title.is_empty()).then(|| title.to_string())
    })
}
