//! Sentence boundary heuristics.
//!
//! A sentence ends at `.`, `!` or `?` (optionally followed by closing quotes
//! or brackets) when whitespace follows and the next word starts with an
//! uppercase letter, a digit, or an opening quote/bracket. This keeps
//! `e.g. foo` and `v1.2` together.

const TERMINATORS: [char; 3] = ['.', '!', '?'];
const CLOSERS: [char; 5] = ['"', '\'', ')', ']', '`'];
const OPENERS: [char; 5] = ['"', '\'', '(', '[', '`'];

/// Split `text` into contiguous sentence slices.
///
/// Every slice keeps its trailing whitespace, so concatenating the result
/// reproduces `text` exactly.
///
/// # Examples
///
/// ```
/// use docsift_chunker::sentence::split_sentences;
///
/// let text = "Grid shows rows. Use e.g. columns to configure it! Done";
/// let sentences = split_sentences(text);
/// assert_eq!(
///     sentences,
///     vec!["Grid shows rows. ", "Use e.g. columns to configure it! ", "Done"]
/// );
/// assert_eq!(sentences.concat(), text);
/// ```
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !TERMINATORS.contains(&c) {
            continue;
        }
        while let Some(&(_, next)) = chars.peek() {
            if CLOSERS.contains(&next) || TERMINATORS.contains(&next) {
                chars.next();
            } else {
                break;
            }
        }
        let mut saw_space = false;
        while let Some(&(_, next)) = chars.peek() {
            if next.is_whitespace() {
                saw_space = true;
                chars.next();
            } else {
                break;
            }
        }
        if !saw_space {
            continue;
        }
        match chars.peek() {
            Some(&(idx, next)) => {
                if next.is_uppercase() || next.is_ascii_digit() || OPENERS.contains(&next) {
                    sentences.push(&text[start..idx]);
                    start = idx;
                }
            }
            None => {
                sentences.push(&text[start..]);
                start = text.len();
            }
        }
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// The shortest run of trailing sentences of `text` carrying at least
/// `min_chars` non-whitespace-trimmed characters.
///
/// Returns the whole (trimmed) text when no suffix is long enough.
///
/// # Examples
///
/// ```
/// use docsift_chunker::sentence::trailing_sentences;
///
/// let text = "Grid is a component. It has many features. Configure columns as follows:";
/// assert_eq!(trailing_sentences(text, 20), "Configure columns as follows:");
/// assert_eq!(trailing_sentences(text, 40), "It has many features. Configure columns as follows:");
/// ```
pub fn trailing_sentences(text: &str, min_chars: usize) -> &str {
    let trimmed = text.trim_end();
    let sentences = split_sentences(trimmed);
    let mut start = trimmed.len();
    for sentence in sentences.iter().rev() {
        start -= sentence.len();
        if trimmed[start..].trim().chars().count() >= min_chars {
            return trimmed[start..].trim();
        }
    }
    trimmed.trim()
}
