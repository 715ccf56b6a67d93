//! Section-based chunking with code-aware splitting.
//!
//! A heading owns every block up to the next heading of any level. Sections
//! that fit the size budget become one chunk; larger sections are split into
//! prose and code chunks (when they contain listings) or into overlapping
//! parts (when they don't). Code listings are never cut.

use std::collections::BTreeMap;

use docsift_core::{
    normalize_path, Chunk, ChunkMetadata, ChunkType, ChunkerConfig, Document, DocumentMeta,
};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::scanner::{scan, Block, BlockKind};
use crate::sentence::{split_sentences, trailing_sentences};

const UNIT_SEPARATOR: &str = "\n\n";

/// Stable chunk id: the first 16 hex characters of SHA-256 over
/// `"{file_path}#{ordinal}"`.
///
/// # Examples
///
/// ```
/// use docsift_chunker::chunk_id;
///
/// let id = chunk_id("components/grid.md", 0);
/// assert_eq!(id.len(), 16);
/// assert_eq!(id, chunk_id("components/grid.md", 0));
/// assert_ne!(id, chunk_id("components/grid.md", 1));
/// ```
pub fn chunk_id(file_path: &str, ordinal: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{file_path}#{ordinal}").as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Splits rendered documents into chunks.
///
/// # Examples
///
/// ```
/// use docsift_chunker::Chunker;
/// use docsift_core::{ChunkType, ChunkerConfig, Document, DocumentMeta};
///
/// let doc = Document {
///     content: "# Grid\n\nGrid shows tabular data.\n\n## Columns\n\nColumns are configurable.".into(),
///     meta: DocumentMeta {
///         file_path: "components/grid.md".into(),
///         title: "Grid".into(),
///         ..Default::default()
///     },
/// };
/// let chunks = Chunker::new(ChunkerConfig::default()).chunk(&doc);
/// assert_eq!(chunks.len(), 2);
/// assert_eq!(chunks[1].metadata.heading, "Columns");
/// assert_eq!(chunks[1].metadata.chunk_type, ChunkType::Section);
/// assert_eq!(chunks[1].parent_id.as_deref(), Some(chunks[0].chunk_id.as_str()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a chunker with the given sizing configuration.
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// The sizing configuration in use.
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk one document.
    ///
    /// Always returns at least one chunk. Chunks come back in document order
    /// with intra-file `parent_id`s set from heading nesting.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let meta = &document.meta;
        let sections = split_sections(scan(&document.content), &meta.title);

        let mut chunks: Vec<Chunk> = Vec::new();
        // (level, first chunk id) of the currently open sections
        let mut open: Vec<(u8, String)> = Vec::new();

        for (section_index, section) in sections.iter().enumerate() {
            while open.last().is_some_and(|(level, _)| *level >= section.level) {
                open.pop();
            }
            let enclosing = open.last().map(|(_, id)| id.clone());
            let header = section.header();

            let mut first_id: Option<String> = None;
            for piece in plan_section(section, &self.config) {
                let id = chunk_id(&meta.file_path, chunks.len());
                let parent_id = first_id.clone().or_else(|| enclosing.clone());
                chunks.push(build_chunk(
                    meta,
                    section,
                    section_index,
                    &header,
                    piece,
                    id.clone(),
                    parent_id,
                ));
                if first_id.is_none() {
                    first_id = Some(id);
                }
            }
            if let Some(id) = first_id {
                open.push((section.level, id));
            }
        }

        debug!(
            file = %meta.file_path,
            sections = sections.len(),
            chunks = chunks.len(),
            "chunked document"
        );
        chunks
    }

    /// Chunk a batch of documents, keyed by normalised file path.
    ///
    /// Paths go through [`normalize_path`] first, so keys, chunk ids and
    /// `file_path` all use the same form. A later document whose path
    /// normalises to an already-seen one replaces the earlier one.
    pub fn chunk_all(&self, documents: &[Document]) -> BTreeMap<String, Vec<Chunk>> {
        let mut by_file = BTreeMap::new();
        for document in documents {
            let path = normalize_path(&document.meta.file_path);
            let chunks = if path == document.meta.file_path {
                self.chunk(document)
            } else {
                let mut normalized = document.clone();
                normalized.meta.file_path = path.clone();
                self.chunk(&normalized)
            };
            if by_file.insert(path.clone(), chunks).is_some() {
                warn!(
                    file = %document.meta.file_path,
                    normalized = %path,
                    "duplicate document path, keeping the last one"
                );
            }
        }
        by_file
    }
}

fn build_chunk(
    meta: &DocumentMeta,
    section: &Section,
    section_index: usize,
    header: &str,
    piece: Piece,
    chunk_id: String,
    parent_id: Option<String>,
) -> Chunk {
    let content = piece.render(header);
    let mut metadata = ChunkMetadata::new(meta.title.clone(), section.heading.clone(), section.level);
    metadata.section_index = section_index;
    metadata.chunk_type = piece.chunk_type;
    metadata.version = meta.version.clone();
    metadata.context = piece.context;
    Chunk {
        chunk_id,
        parent_id,
        framework: meta.framework,
        content,
        source_url: meta.source_url.clone(),
        file_path: meta.file_path.clone(),
        metadata,
    }
}

#[derive(Debug, Clone)]
struct Section {
    heading: String,
    level: u8,
    /// Folded empty headings followed by the section's own heading line.
    heading_lines: Vec<String>,
    blocks: Vec<Block>,
}

impl Section {
    fn preamble(title: &str) -> Self {
        let heading_lines = if title.trim().is_empty() {
            Vec::new()
        } else {
            vec![format!("# {}", title.trim())]
        };
        Self {
            heading: title.trim().to_string(),
            level: 0,
            heading_lines,
            blocks: Vec::new(),
        }
    }

    fn header(&self) -> String {
        self.heading_lines.join("\n")
    }

    fn content_len(&self) -> usize {
        let blocks: usize = self.blocks.iter().map(Block::char_len).sum();
        blocks + UNIT_SEPARATOR.len() * self.blocks.len().saturating_sub(1)
    }

    fn has_code(&self) -> bool {
        self.blocks.iter().any(Block::is_code)
    }
}

fn split_sections(blocks: Vec<Block>, title: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut folded: Vec<String> = Vec::new();
    let mut current: Option<Section> = None;

    for block in blocks {
        match block.kind {
            BlockKind::Heading { level } => {
                if let Some(section) = current.take() {
                    if section.blocks.is_empty() {
                        folded.extend(section.heading_lines);
                    } else {
                        sections.push(section);
                    }
                }
                let mut heading_lines = std::mem::take(&mut folded);
                let heading = block.heading_text().unwrap_or_default().to_string();
                heading_lines.push(block.text);
                current = Some(Section {
                    heading,
                    level,
                    heading_lines,
                    blocks: Vec::new(),
                });
            }
            _ => current
                .get_or_insert_with(|| Section::preamble(title))
                .blocks
                .push(block),
        }
    }

    // a trailing empty heading still becomes a chunk
    if let Some(section) = current {
        sections.push(section);
    }
    if sections.is_empty() {
        sections.push(Section::preamble(title));
    }
    sections
}

/// One planned chunk before ids and metadata are attached.
#[derive(Debug, Clone, PartialEq)]
struct Piece {
    chunk_type: ChunkType,
    /// Text owned by this chunk; bodies of a section concatenate to it.
    body: String,
    overlap: Option<String>,
    context: Option<String>,
}

impl Piece {
    fn new(chunk_type: ChunkType, body: String) -> Self {
        Self {
            chunk_type,
            body,
            overlap: None,
            context: None,
        }
    }

    fn render(&self, header: &str) -> String {
        [
            Some(header),
            self.context.as_deref(),
            self.overlap.as_deref(),
            Some(self.body.as_str()),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(UNIT_SEPARATOR)
    }
}

fn plan_section(section: &Section, config: &ChunkerConfig) -> Vec<Piece> {
    if section.content_len() <= config.max_chunk_size {
        let body = section
            .blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join(UNIT_SEPARATOR);
        return vec![Piece::new(ChunkType::Section, body)];
    }
    if section.has_code() {
        plan_code_section(section, config)
    } else {
        plan_prose_section(section, config)
    }
}

fn plan_code_section(section: &Section, config: &ChunkerConfig) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut text_units: Vec<String> = Vec::new();
    let mut preceding: Option<&Block> = None;

    for block in &section.blocks {
        if block.is_code() {
            flush_text(&mut text_units, &mut pieces, config.max_chunk_size);
            let context = code_context(preceding, &section.heading, config);
            pieces.push(Piece {
                chunk_type: ChunkType::CodeBlock,
                body: block.text.clone(),
                overlap: None,
                context,
            });
            preceding = None;
        } else {
            text_units.extend(split_unit(block, config.max_chunk_size));
            preceding = block.is_prose().then_some(block);
        }
    }
    flush_text(&mut text_units, &mut pieces, config.max_chunk_size);
    pieces
}

fn flush_text(units: &mut Vec<String>, pieces: &mut Vec<Piece>, max: usize) {
    if units.is_empty() {
        return;
    }
    for group in pack_units(units, max) {
        pieces.push(Piece::new(ChunkType::TextContent, group.join(UNIT_SEPARATOR)));
    }
    units.clear();
}

fn plan_prose_section(section: &Section, config: &ChunkerConfig) -> Vec<Piece> {
    let units: Vec<String> = section
        .blocks
        .iter()
        .flat_map(|b| split_unit(b, config.max_chunk_size))
        .collect();
    let groups = pack_units(&units, config.max_chunk_size);

    let mut pieces = Vec::with_capacity(groups.len());
    for (i, group) in groups.iter().enumerate() {
        let overlap = i
            .checked_sub(1)
            .and_then(|prev| groups[prev].last())
            .map(|unit| overlap_tail(unit, config.chunk_overlap))
            .filter(|tail| !tail.is_empty())
            .map(str::to_string);
        pieces.push(Piece {
            chunk_type: ChunkType::SectionPart,
            body: group.join(UNIT_SEPARATOR),
            overlap,
            context: None,
        });
    }
    pieces
}

/// Explanatory text for a code block: the preceding prose block when it is
/// of reasonable size, its trailing sentences when it is long, the section
/// heading when there is too little preceding text.
fn code_context(preceding: Option<&Block>, heading: &str, config: &ChunkerConfig) -> Option<String> {
    if let Some(block) = preceding {
        let text = block.text.trim();
        let len = text.chars().count();
        if len > config.max_context_chars {
            let tail = trailing_sentences(text, config.min_context_chars);
            if tail.chars().count() >= config.min_context_chars {
                return Some(tail.to_string());
            }
        } else if len >= config.min_context_chars {
            return Some(text.to_string());
        }
    }
    let heading = heading.trim();
    if !heading.is_empty() {
        return Some(heading.to_string());
    }
    preceding
        .map(|b| b.text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Break a non-code block that exceeds `max` into pieces: prose on sentence
/// boundaries, lists and tables on line boundaries. A single over-long
/// sentence or line stays whole.
fn split_unit(block: &Block, max: usize) -> Vec<String> {
    if block.char_len() <= max {
        return vec![block.text.clone()];
    }
    match block.kind {
        BlockKind::List | BlockKind::Table => {
            group_pieces(block.text.split_inclusive('\n'), max)
        }
        _ => group_pieces(split_sentences(&block.text), max),
    }
}

fn group_pieces<'a>(pieces: impl IntoIterator<Item = &'a str>, max: usize) -> Vec<String> {
    let mut groups = Vec::new();
    let mut current = String::new();
    for piece in pieces {
        let grown = current.chars().count() + piece.trim_end().chars().count();
        if !current.trim().is_empty() && grown > max {
            groups.push(current.trim().to_string());
            current.clear();
        }
        current.push_str(piece);
    }
    if !current.trim().is_empty() {
        groups.push(current.trim().to_string());
    }
    groups
}

/// Greedily pack units into groups whose joined length stays within `max`.
fn pack_units(units: &[String], max: usize) -> Vec<Vec<String>> {
    let mut groups = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut len = 0;
    for unit in units {
        let unit_len = unit.chars().count();
        if !current.is_empty() && len + UNIT_SEPARATOR.len() + unit_len > max {
            groups.push(std::mem::take(&mut current));
            len = 0;
        }
        if !current.is_empty() {
            len += UNIT_SEPARATOR.len();
        }
        len += unit_len;
        current.push(unit.clone());
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// The last `n` characters of `text`, advanced to the next word start when
/// the cut lands inside a word.
fn overlap_tail(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let text = text.trim_end();
    let total = text.chars().count();
    if total <= n {
        return text.trim();
    }
    let Some((start, _)) = text.char_indices().nth(total - n) else {
        return "";
    };
    let tail = &text[start..];
    let cut_mid_word = text[..start]
        .chars()
        .next_back()
        .is_some_and(|c| !c.is_whitespace());
    if cut_mid_word {
        if let Some(space) = tail.find(char::is_whitespace) {
            let advanced = tail[space..].trim_start();
            if !advanced.is_empty() {
                return advanced;
            }
        }
    }
    tail.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsift_core::Framework;
    use proptest::prelude::*;

    fn doc(content: &str) -> Document {
        Document {
            content: content.into(),
            meta: DocumentMeta {
                file_path: "components/grid.md".into(),
                framework: Framework::Flow,
                source_url: "https://docs.example.com/components/grid".into(),
                title: "Grid".into(),
                version: Some("24".into()),
            },
        }
    }

    fn small(max: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkerConfig {
            max_chunk_size: max,
            chunk_overlap: overlap,
            ..ChunkerConfig::default()
        })
    }

    fn strip_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn small_sections_become_single_chunks() {
        let chunks = Chunker::default().chunk(&doc("# Grid\n\nIntro.\n\n## Columns\n\nText.\n\n## Rows\n\nMore."));
        let headings: Vec<&str> = chunks.iter().map(|c| c.heading()).collect();
        assert_eq!(headings, vec!["Grid", "Columns", "Rows"]);
        assert!(chunks.iter().all(|c| c.metadata.chunk_type == ChunkType::Section));
        assert_eq!(chunks[2].content, "## Rows\n\nMore.");
    }

    #[test]
    fn every_chunk_carries_document_metadata() {
        let chunks = Chunker::default().chunk(&doc("# A\n\nx\n\n## B\n\ny"));
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.framework, Framework::Flow);
            assert_eq!(chunk.file_path, "components/grid.md");
            assert_eq!(chunk.source_url, "https://docs.example.com/components/grid");
            assert_eq!(chunk.metadata.title, "Grid");
            assert_eq!(chunk.metadata.version.as_deref(), Some("24"));
            assert_eq!(chunk.metadata.section_index, i);
            assert_eq!(chunk.chunk_id, chunk_id("components/grid.md", i));
        }
        assert_eq!(chunks[1].metadata.level, 2);
    }

    #[test]
    fn parents_follow_heading_nesting() {
        let chunks = Chunker::default()
            .chunk(&doc("# Top\n\na\n\n## Child\n\nb\n\n### Grandchild\n\nc\n\n## Sibling\n\nd"));
        assert_eq!(chunks[0].parent_id, None);
        assert_eq!(chunks[1].parent_id.as_ref(), Some(&chunks[0].chunk_id));
        assert_eq!(chunks[2].parent_id.as_ref(), Some(&chunks[1].chunk_id));
        assert_eq!(chunks[3].parent_id.as_ref(), Some(&chunks[0].chunk_id));
    }

    #[test]
    fn preamble_is_root_of_first_heading() {
        let chunks = Chunker::default().chunk(&doc("Lead text.\n\n## Usage\n\nUse it."));
        assert_eq!(chunks[0].metadata.level, 0);
        assert_eq!(chunks[0].heading(), "Grid");
        assert!(chunks[0].content.starts_with("# Grid\n\nLead text."));
        assert_eq!(chunks[1].parent_id.as_ref(), Some(&chunks[0].chunk_id));
    }

    #[test]
    fn empty_heading_is_folded_into_next_section() {
        let chunks = Chunker::default().chunk(&doc("# Grid\n## Columns\n\nColumn text."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].heading(), "Columns");
        assert_eq!(chunks[0].content, "# Grid\n## Columns\n\nColumn text.");
    }

    #[test]
    fn trailing_heading_is_emitted() {
        let chunks = Chunker::default().chunk(&doc("# Grid\n\nText.\n\n## See also"));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].content, "## See also");
    }

    #[test]
    fn empty_input_yields_title_chunk() {
        let chunks = Chunker::default().chunk(&doc("  \n\n"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "# Grid");
        assert_eq!(chunks[0].metadata.chunk_type, ChunkType::Section);
        assert_eq!(chunks[0].parent_id, None);
    }

    #[test]
    fn oversized_code_section_alternates_text_and_code() {
        let code = format!("```java\n{}```", "grid.addColumn(Person::getName);\n".repeat(10));
        let content = format!(
            "## Columns\n\nColumns are added with addColumn and configured fluently.\n\n{code}\n\nAfter adding, set widths.\n\n{code}"
        );
        let chunks = small(120, 10).chunk(&doc(&content));
        let types: Vec<ChunkType> = chunks.iter().map(|c| c.metadata.chunk_type).collect();
        assert_eq!(
            types,
            vec![
                ChunkType::TextContent,
                ChunkType::CodeBlock,
                ChunkType::TextContent,
                ChunkType::CodeBlock,
            ]
        );
        assert_eq!(
            chunks[1].metadata.context.as_deref(),
            Some("Columns are added with addColumn and configured fluently.")
        );
        assert!(chunks[1].content.starts_with("## Columns\n\nColumns are added"));
        assert!(chunks[1].content.ends_with(&code));
        // "After adding, set widths." is 25 chars, above the 20-char minimum
        assert_eq!(chunks[3].metadata.context.as_deref(), Some("After adding, set widths."));
    }

    #[test]
    fn short_preceding_text_falls_back_to_heading() {
        let code = format!("```\n{}```", "x = 1\n".repeat(40));
        let content = format!("## Set up the theme\n\nExample:\n\n{code}");
        let chunks = small(100, 10).chunk(&doc(&content));
        let code_chunk = chunks
            .iter()
            .find(|c| c.metadata.chunk_type == ChunkType::CodeBlock)
            .unwrap();
        assert_eq!(code_chunk.metadata.context.as_deref(), Some("Set up the theme"));
    }

    #[test]
    fn long_preceding_paragraph_contributes_trailing_sentences() {
        let long = format!("{} Finally, configure the renderer like this:", "Grid has many options. ".repeat(20));
        let code = "```\nrenderer();\n```";
        let content = format!("## Rendering\n\n{long}\n\n{code}");
        let chunks = small(200, 10).chunk(&doc(&content));
        let code_chunk = chunks
            .iter()
            .find(|c| c.metadata.chunk_type == ChunkType::CodeBlock)
            .unwrap();
        assert_eq!(
            code_chunk.metadata.context.as_deref(),
            Some("Finally, configure the renderer like this:")
        );
    }

    #[test]
    fn code_block_larger_than_budget_stays_whole() {
        let code = format!("```\n{}```", "let x = 1;\n".repeat(500));
        let content = format!("## Big\n\nThe following listing is large.\n\n{code}");
        let chunks = small(100, 10).chunk(&doc(&content));
        let holders: Vec<&Chunk> = chunks.iter().filter(|c| c.content.contains(&code)).collect();
        assert_eq!(holders.len(), 1);
    }

    #[test]
    fn oversized_prose_section_gets_overlapping_parts() {
        let paragraphs: Vec<String> = (0..6)
            .map(|i| format!("Paragraph {i} talks about column sizing and flex grow settings."))
            .collect();
        let content = format!("## Sizing\n\n{}", paragraphs.join("\n\n"));
        let chunks = small(140, 20).chunk(&doc(&content));
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.metadata.chunk_type == ChunkType::SectionPart));
        assert!(chunks.iter().all(|c| c.content.starts_with("## Sizing\n\n")));
        assert_eq!(chunks[1].parent_id.as_ref(), Some(&chunks[0].chunk_id));
        assert_eq!(chunks[2].parent_id.as_ref(), Some(&chunks[0].chunk_id));
        // the overlap is the tail of the previous part, starting on a word
        let second = chunks[1].content.strip_prefix("## Sizing\n\n").unwrap();
        assert!(second.starts_with("flex grow settings."), "second part: {second}");
    }

    #[test]
    fn overlap_tail_cuts_on_word_boundary() {
        assert_eq!(overlap_tail("alpha beta gamma", 8), "gamma");
        assert_eq!(overlap_tail("alpha beta gamma", 11), "beta gamma");
        assert_eq!(overlap_tail("short", 50), "short");
        assert_eq!(overlap_tail("anything", 0), "");
        assert_eq!(overlap_tail("nospaceshere", 4), "here");
    }

    #[test]
    fn oversized_paragraph_splits_on_sentences() {
        let paragraph = "This sentence is about grids. ".repeat(10);
        let block = Block {
            kind: BlockKind::Paragraph,
            text: paragraph.trim().to_string(),
        };
        let pieces = split_unit(&block, 70);
        assert!(pieces.len() > 1);
        assert!(pieces.iter().all(|p| p.ends_with('.')));
        assert_eq!(strip_ws(&pieces.concat()), strip_ws(&paragraph));
    }

    #[test]
    fn chunk_all_keys_by_path() {
        let mut other = doc("# Other");
        other.meta.file_path = "other.md".into();
        let map = Chunker::default().chunk_all(&[doc("# Grid\n\nText"), other]);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["components/grid.md", "other.md"]);
    }

    #[test]
    fn chunk_all_normalises_paths_before_chunking() {
        let mut dotted = doc("# First\n\nOld text.");
        dotted.meta.file_path = "./a.md".into();
        let mut windows = doc("# Grid\n\nText.\n\n## Columns\n\nMore.");
        windows.meta.file_path = "guides\\grid.md".into();
        let mut plain = doc("# Second\n\nNew text.");
        plain.meta.file_path = "a.md".into();

        let map = Chunker::default().chunk_all(&[dotted, windows, plain]);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a.md", "guides/grid.md"]);

        assert_eq!(map["a.md"][0].heading(), "Second");
        for (path, chunks) in &map {
            for (ordinal, chunk) in chunks.iter().enumerate() {
                assert_eq!(&chunk.file_path, path);
                assert_eq!(chunk.chunk_id, chunk_id(path, ordinal));
            }
        }
    }

    #[derive(Debug, Clone)]
    enum GenBlock {
        Heading(u8, String),
        Paragraph(Vec<String>),
        List(Vec<String>),
        Code(Vec<String>),
    }

    fn words(range: std::ops::Range<usize>) -> impl Strategy<Value = String> {
        prop::collection::vec("[a-z]{1,8}", range).prop_map(|w| w.join(" "))
    }

    fn gen_block() -> impl Strategy<Value = GenBlock> {
        prop_oneof![
            (1u8..=4, words(1..4)).prop_map(|(l, t)| GenBlock::Heading(l, t)),
            prop::collection::vec(words(2..12), 1..6).prop_map(GenBlock::Paragraph),
            prop::collection::vec(words(1..6), 1..5).prop_map(GenBlock::List),
            prop::collection::vec(words(1..8), 1..12).prop_map(GenBlock::Code),
        ]
    }

    fn render(blocks: &[GenBlock]) -> String {
        let mut code_index = 0;
        blocks
            .iter()
            .map(|b| match b {
                GenBlock::Heading(level, text) => format!("{} {}", "#".repeat(*level as usize), text),
                GenBlock::Paragraph(sentences) => sentences
                    .iter()
                    .map(|s| {
                        let mut s = s.clone();
                        s[..1].make_ascii_uppercase();
                        format!("{s}.")
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
                GenBlock::List(items) => items.iter().map(|i| format!("- {i}")).collect::<Vec<_>>().join("\n"),
                GenBlock::Code(lines) => {
                    code_index += 1;
                    format!("```\n// listing {code_index}\n{}\n```", lines.join("\n"))
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    proptest! {
        #[test]
        fn chunking_is_lossless(
            blocks in prop::collection::vec(gen_block(), 0..16),
            max in 40usize..300,
            overlap in 0usize..30,
        ) {
            let config = ChunkerConfig { max_chunk_size: max, chunk_overlap: overlap, ..ChunkerConfig::default() };
            let content = render(&blocks);

            let scanned = scan(&content);
            let expected: String = scanned
                .iter()
                .filter(|b| !matches!(b.kind, BlockKind::Heading { .. }))
                .map(|b| strip_ws(&b.text))
                .collect();
            let sections = split_sections(scanned.clone(), "Title");
            let bodies: String = sections
                .iter()
                .flat_map(|s| plan_section(s, &config))
                .map(|p| strip_ws(&p.body))
                .collect();
            prop_assert_eq!(bodies, expected);

            let chunks = Chunker::new(config).chunk(&doc(&content));
            prop_assert!(!chunks.is_empty());
            for code in scanned.iter().filter(|b| b.is_code()) {
                let holders = chunks.iter().filter(|c| c.content.contains(&code.text)).count();
                prop_assert_eq!(holders, 1);
            }
            for heading in scanned.iter().filter(|b| matches!(b.kind, BlockKind::Heading { .. })) {
                prop_assert!(chunks.iter().any(|c| c.content.contains(&heading.text)));
            }
        }
    }
}
