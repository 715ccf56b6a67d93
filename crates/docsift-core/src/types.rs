use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DocsiftError;

/// Keys that may never appear in [`ChunkMetadata::extra`].
///
/// These are either top-level [`Chunk`] fields or typed metadata fields;
/// repeating them in the open bag would give the persisted shape two sources
/// of truth.
pub const RESERVED_METADATA_KEYS: &[&str] = &[
    "chunk_id",
    "parent_id",
    "framework",
    "content",
    "source_url",
    "file_path",
    "title",
    "heading",
    "level",
    "section_index",
    "chunk_type",
    "version",
    "context",
];

/// Product variant a piece of documentation applies to.
///
/// `Common` content applies to every variant.
///
/// # Examples
///
/// ```
/// use docsift_core::Framework;
///
/// let fw: Framework = "hilla".parse().unwrap();
/// assert_eq!(fw, Framework::Hilla);
/// assert_eq!(Framework::from_path("flow/components/grid.md"), Framework::Flow);
/// assert_eq!(Framework::from_path("styling/themes.md"), Framework::Common);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    /// Server-side Java variant.
    Flow,
    /// TypeScript/React variant.
    Hilla,
    /// Shared by all variants.
    #[default]
    Common,
}

impl Framework {
    /// Derive the framework from a documentation path.
    ///
    /// A path segment named `flow` or `hilla` selects that variant; everything
    /// else is [`Framework::Common`].
    pub fn from_path(path: &str) -> Self {
        for segment in path.split(['/', '\\']) {
            match segment {
                "flow" => return Framework::Flow,
                "hilla" => return Framework::Hilla,
                _ => {}
            }
        }
        Framework::Common
    }

    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Framework::Flow => "flow",
            Framework::Hilla => "hilla",
            Framework::Common => "common",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framework {
    type Err = DocsiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flow" => Ok(Framework::Flow),
            "hilla" => Ok(Framework::Hilla),
            "common" => Ok(Framework::Common),
            other => Err(DocsiftError::Parse(format!("unknown framework: {other}"))),
        }
    }
}

/// Normalise a path to forward slashes without a leading `./` or `/`.
///
/// This is the form every chunk and document path is keyed by.
///
/// # Examples
///
/// ```
/// use docsift_core::normalize_path;
///
/// assert_eq!(normalize_path(".\\flow\\grid.md"), "flow/grid.md");
/// assert_eq!(normalize_path("/docs//a.md"), "docs/a.md");
/// assert_eq!(normalize_path("./a.md"), "a.md");
/// ```
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// How a chunk was carved out of its section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    /// A whole section that fit the size budget.
    #[default]
    Section,
    /// Prose between code blocks of an oversized section.
    TextContent,
    /// A single code/listing block with its context annotation.
    CodeBlock,
    /// One overlapped part of an oversized prose-only section.
    SectionPart,
}

impl ChunkType {
    /// Wire name, as stored in metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkType::Section => "section",
            ChunkType::TextContent => "text_content",
            ChunkType::CodeBlock => "code_block",
            ChunkType::SectionPart => "section_part",
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-chunk metadata bag.
///
/// Typed fields cover what every chunk carries; the extra bag is open and
/// flattened into the JSON object. It only fills through
/// [`ChunkMetadata::insert_extra`] and deserialization, both of which drop
/// reserved keys.
///
/// # Examples
///
/// ```
/// use docsift_core::ChunkMetadata;
///
/// let mut meta = ChunkMetadata::new("Grid", "Columns", 2);
/// assert!(meta.insert_extra("anchor", "configuring-columns"));
/// assert!(!meta.insert_extra("file_path", "grid.md"));
/// assert_eq!(meta.extra().len(), 1);
///
/// let parsed: ChunkMetadata =
///     serde_json::from_str(r#"{"heading": "Columns", "chunk_id": "x", "anchor": "a"}"#).unwrap();
/// assert_eq!(parsed.extra().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Title of the owning document.
    #[serde(default)]
    pub title: String,
    /// Heading text of the owning section.
    #[serde(default)]
    pub heading: String,
    /// Heading level (1–6), 0 for a preamble before the first heading.
    #[serde(default)]
    pub level: u8,
    /// Zero-based index of the owning section within the document.
    #[serde(default)]
    pub section_index: usize,
    /// How the chunk was derived from its section.
    #[serde(default)]
    pub chunk_type: ChunkType,
    /// Product version the document belongs to, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Explanatory text prepended to a code block chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(flatten, deserialize_with = "unreserved_extra")]
    extra: BTreeMap<String, String>,
}

impl ChunkMetadata {
    /// Metadata for a section chunk; the remaining fields take their defaults.
    pub fn new(title: impl Into<String>, heading: impl Into<String>, level: u8) -> Self {
        Self {
            title: title.into(),
            heading: heading.into(),
            level,
            ..Self::default()
        }
    }

    /// The open key/value bag.
    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    /// Insert an open-bag entry. Returns `false` (and changes nothing) when
    /// `key` is reserved.
    pub fn insert_extra(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if RESERVED_METADATA_KEYS.contains(&key.as_str()) {
            return false;
        }
        self.extra.insert(key, value.into());
        true
    }
}

/// Reads the flattened bag, dropping reserved keys. Non-string values are
/// kept in their JSON text form.
fn unreserved_extra<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter(|(key, _)| !RESERVED_METADATA_KEYS.contains(&key.as_str()))
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => (key, s),
            other => (key, other.to_string()),
        })
        .collect())
}

/// A retrievable unit of a document.
///
/// This is the persisted shape shared between ingestion and serving.
///
/// # Examples
///
/// ```
/// use docsift_core::{Chunk, ChunkMetadata, Framework};
///
/// let chunk = Chunk {
///     chunk_id: "a1b2".into(),
///     parent_id: None,
///     framework: Framework::Flow,
///     content: "# Grid\n\nGrid shows tabular data.".into(),
///     source_url: "https://docs.example.com/components/grid".into(),
///     file_path: "components/grid.md".into(),
///     metadata: ChunkMetadata::default(),
/// };
/// let json = serde_json::to_value(&chunk).unwrap();
/// assert_eq!(json["framework"], "flow");
/// assert!(json["parent_id"].is_null());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Globally unique, stable id.
    pub chunk_id: String,
    /// Broader-context chunk, if any.
    pub parent_id: Option<String>,
    /// Product variant.
    pub framework: Framework,
    /// Textual payload.
    pub content: String,
    /// Canonical external reference for citation.
    pub source_url: String,
    /// Path of the owning document.
    pub file_path: String,
    /// Title, heading and friends.
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Heading text of the owning section.
    pub fn heading(&self) -> &str {
        &self.metadata.heading
    }
}

/// Per-document metadata attached to every chunk produced from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Path of the document, relative to the documentation root.
    pub file_path: String,
    /// Product variant.
    #[serde(default)]
    pub framework: Framework,
    /// Canonical external reference.
    #[serde(default)]
    pub source_url: String,
    /// Document title.
    #[serde(default)]
    pub title: String,
    /// Product version, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A rendered document: chunker input and stored full-document record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Rendered markdown text.
    pub content: String,
    /// Document-level metadata.
    pub meta: DocumentMeta,
}

/// A chunk returned for a query, with its fused relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Channel-fused score (higher is better).
    pub relevance_score: f64,
    /// Echo of `chunk.file_path` for "fetch full document" follow-ups.
    pub file_path: String,
}

impl RetrievalResult {
    /// Wrap a chunk with its score.
    pub fn new(chunk: Chunk, relevance_score: f64) -> Self {
        let file_path = chunk.file_path.clone();
        Self {
            chunk,
            relevance_score,
            file_path,
        }
    }
}

/// Outcome of fetching one document in a multi-document request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    /// The requested path.
    pub file_path: String,
    /// Full document text (empty when `error` is set).
    pub content: String,
    /// Document metadata, when found.
    pub metadata: Option<DocumentMeta>,
    /// Per-path failure, including "not found".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentResult {
    /// A failed lookup for `file_path`.
    pub fn failed(file_path: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            content: String::new(),
            metadata: None,
            error: Some(error.into()),
        }
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use docsift_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
