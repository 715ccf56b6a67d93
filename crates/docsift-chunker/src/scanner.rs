//! Line-oriented block scanner for rendered Markdown/AsciiDoc text.
//!
//! The scanner is a small explicit state machine. It never looks for headings
//! inside a code listing, and an unterminated listing runs to the end of the
//! input as a single block.

/// Structural kind of a [`Block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// ATX heading (`#` to `######`).
    Heading {
        /// Heading level, 1 to 6.
        level: u8,
    },
    /// Fenced code (```` ``` ````, `~~~`) or an AsciiDoc `----` listing.
    Code,
    /// Consecutive `|`-prefixed rows.
    Table,
    /// List items with their indented continuation lines.
    List,
    /// Blank-line separated prose.
    Paragraph,
}

/// A run of input lines with one structural meaning.
///
/// `text` holds the original lines joined with `\n`; blank lines between
/// blocks are not part of any block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// What the lines are.
    pub kind: BlockKind,
    /// The lines themselves.
    pub text: String,
}

impl Block {
    /// Whether the block must never be split.
    pub fn is_code(&self) -> bool {
        self.kind == BlockKind::Code
    }

    /// Whether the block is running prose usable as explanatory context.
    pub fn is_prose(&self) -> bool {
        matches!(self.kind, BlockKind::Paragraph | BlockKind::List)
    }

    /// Heading text with the `#` markers stripped, for heading blocks.
    pub fn heading_text(&self) -> Option<&str> {
        match self.kind {
            BlockKind::Heading { .. } => parse_heading(&self.text).map(|(_, text)| text),
            _ => None,
        }
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Split `input` into blocks in document order.
///
/// # Examples
///
/// ```
/// use docsift_chunker::scanner::{scan, BlockKind};
///
/// let blocks = scan("# Grid\n\nGrid shows rows.\n\n```java\n# not a heading\n```\n");
/// let kinds: Vec<BlockKind> = blocks.iter().map(|b| b.kind).collect();
/// assert_eq!(
///     kinds,
///     vec![BlockKind::Heading { level: 1 }, BlockKind::Paragraph, BlockKind::Code]
/// );
/// ```
pub fn scan(input: &str) -> Vec<Block> {
    let mut scanner = Scanner::default();
    for line in input.lines() {
        scanner.feed(line);
    }
    scanner.finish()
}

/// Parse an ATX heading line into its level and text.
///
/// Up to three leading spaces are allowed, the markers must be followed by
/// whitespace or end of line, and a closing `#` run is dropped.
///
/// # Examples
///
/// ```
/// use docsift_chunker::scanner::parse_heading;
///
/// assert_eq!(parse_heading("## Column Configuration"), Some((2, "Column Configuration")));
/// assert_eq!(parse_heading("### Closed ###"), Some((3, "Closed")));
/// assert_eq!(parse_heading("#hashtag"), None);
/// assert_eq!(parse_heading("####### too deep"), None);
/// ```
pub fn parse_heading(line: &str) -> Option<(u8, &str)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let trimmed = &line[indent..];
    let level = trimmed.bytes().take_while(|b| *b == b'#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }
    let mut text = rest.trim();
    let without_closing = text.trim_end_matches('#');
    if without_closing.is_empty() || without_closing.ends_with([' ', '\t']) {
        text = without_closing.trim_end();
    }
    Some((level as u8, text))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fence {
    marker: char,
    len: usize,
}

impl Fence {
    fn open(line: &str) -> Option<Self> {
        let trimmed = line.trim_start();
        for marker in ['`', '~'] {
            let len = trimmed.chars().take_while(|c| *c == marker).count();
            if len >= 3 {
                return Some(Fence { marker, len });
            }
        }
        let trimmed = trimmed.trim_end();
        if trimmed.len() >= 4 && trimmed.chars().all(|c| c == '-') {
            return Some(Fence {
                marker: '-',
                len: trimmed.len(),
            });
        }
        None
    }

    fn closes(&self, line: &str) -> bool {
        let trimmed = line.trim();
        let run = trimmed.chars().take_while(|c| *c == self.marker).count();
        if run != trimmed.chars().count() {
            return false;
        }
        match self.marker {
            '-' => run == self.len,
            _ => run >= self.len,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum State {
    #[default]
    Idle,
    Paragraph,
    List,
    Table,
    Fence(Fence),
}

#[derive(Debug, Default)]
struct Scanner {
    state: State,
    lines: Vec<String>,
    blocks: Vec<Block>,
}

impl Scanner {
    fn feed(&mut self, line: &str) {
        if let State::Fence(fence) = self.state {
            self.lines.push(line.to_string());
            if self.lines.len() > 1 && fence.closes(line) {
                self.flush();
            }
            return;
        }

        if line.trim().is_empty() {
            self.flush();
            return;
        }

        if let Some(fence) = Fence::open(line) {
            self.flush();
            self.state = State::Fence(fence);
            self.lines.push(line.to_string());
            return;
        }

        if let Some((level, _)) = parse_heading(line) {
            self.flush();
            self.blocks.push(Block {
                kind: BlockKind::Heading { level },
                text: line.trim_end().to_string(),
            });
            return;
        }

        let next = if is_table_row(line) {
            State::Table
        } else if is_list_item(line) {
            State::List
        } else if self.state == State::List && line.starts_with([' ', '\t']) {
            State::List
        } else {
            State::Paragraph
        };

        if self.state != next {
            self.flush();
            self.state = next;
        }
        self.lines.push(line.to_string());
    }

    fn flush(&mut self) {
        if !self.lines.is_empty() {
            let kind = match self.state {
                State::Fence(_) => BlockKind::Code,
                State::Table => BlockKind::Table,
                State::List => BlockKind::List,
                State::Paragraph | State::Idle => BlockKind::Paragraph,
            };
            self.blocks.push(Block {
                kind,
                text: self.lines.join("\n"),
            });
            self.lines.clear();
        }
        self.state = State::Idle;
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }
}

fn is_table_row(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

fn is_list_item(line: &str) -> bool {
    let trimmed = line.trim_start();
    if ["- ", "* ", "+ "].iter().any(|m| trimmed.starts_with(m)) {
        return true;
    }
    let digits = trimmed.bytes().take_while(u8::is_ascii_digit).count();
    digits > 0 && (trimmed[digits..].starts_with(". ") || trimmed[digits..].starts_with(") "))
}
