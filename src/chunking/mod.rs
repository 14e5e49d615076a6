//! Text normalization and chunking
//!
//! Documents are normalized (the exact original formatting is not
//! preserved) and then split into overlapping passages bounded by a
//! target size. Splitting prefers semantic boundaries: paragraph breaks
//! first, then line breaks, sentence-ending punctuation, commas, spaces,
//! and only as a last resort raw character slicing.

use regex::Regex;
use std::sync::LazyLock;

/// A bounded-length slice of normalized source text, the atomic unit of
/// embedding and storage. `ordinal` is its position in the source document
/// and is used to build deterministic record ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub ordinal: usize,
}

static HORIZONTAL_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static NEWLINE_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" *\n *").unwrap());
static PARAGRAPH_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Normalize raw document text before chunking.
///
/// Collapses runs of horizontal whitespace to single spaces, strips
/// whitespace around line breaks, reduces runs of blank lines to a single
/// paragraph break, and trims the result. Chunk boundaries are computed on
/// this normalized form only.
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let collapsed = HORIZONTAL_WS.replace_all(&unified, " ");
    let trimmed_lines = NEWLINE_WS.replace_all(&collapsed, "\n");
    let paragraphs = PARAGRAPH_RUNS.replace_all(&trimmed_lines, "\n\n");
    paragraphs.trim().to_string()
}

/// Separator hierarchy, highest priority first. The final character-level
/// fallback is implicit (`hard_split`).
enum Separator {
    Str(&'static str),
    Chars(&'static [char]),
}

const SEPARATORS: &[Separator] = &[
    Separator::Str("\n\n"),
    Separator::Chars(&['\n']),
    Separator::Chars(&['.', '!', '?']),
    Separator::Chars(&[',']),
    Separator::Chars(&[' ']),
];

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split `text` into segments no longer than `target` characters, trying
/// separators in priority order and descending a level only for pieces
/// that are still too long. Separators stay attached to the preceding
/// segment so concatenating all segments reconstructs the input exactly.
fn split_segments(text: &str, target: usize, level: usize, out: &mut Vec<String>) {
    if char_len(text) <= target {
        out.push(text.to_string());
        return;
    }
    let Some(separator) = SEPARATORS.get(level) else {
        hard_split(text, target, out);
        return;
    };
    let parts: Vec<&str> = match separator {
        Separator::Str(s) => text.split_inclusive(s).collect(),
        Separator::Chars(cs) => text.split_inclusive(*cs).collect(),
    };
    if parts.len() <= 1 {
        // Separator absent at this level; try the next one.
        split_segments(text, target, level + 1, out);
        return;
    }
    for part in parts {
        if char_len(part) <= target {
            out.push(part.to_string());
        } else {
            split_segments(part, target, level + 1, out);
        }
    }
}

/// Character-level fallback: chop into `target`-sized pieces on scalar-value
/// boundaries.
fn hard_split(text: &str, target: usize, out: &mut Vec<String>) {
    let mut piece = String::new();
    let mut len = 0;
    for ch in text.chars() {
        piece.push(ch);
        len += 1;
        if len == target {
            out.push(std::mem::take(&mut piece));
            len = 0;
        }
    }
    if !piece.is_empty() {
        out.push(piece);
    }
}

/// The trailing `overlap` characters of a chunk, carried into the next one
/// so facts spanning a boundary remain retrievable from at least one side.
pub(crate) fn overlap_tail(s: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }
    let total = char_len(s);
    if total <= overlap {
        return s.to_string();
    }
    s.chars().skip(total - overlap).collect()
}

/// Split normalized text into overlapping chunks of roughly `target_size`
/// characters.
///
/// Empty or whitespace-only input yields zero chunks (the caller reports an
/// empty-document error); input shorter than `target_size` yields exactly
/// one chunk. No chunk ever exceeds `target_size + overlap` characters.
pub fn chunk(text: &str, target_size: usize, overlap: usize) -> Vec<Chunk> {
    debug_assert!(overlap < target_size, "overlap must be smaller than target size");

    let normalized = normalize(text);
    if normalized.is_empty() {
        return Vec::new();
    }
    if char_len(&normalized) <= target_size {
        return vec![Chunk {
            text: normalized,
            ordinal: 0,
        }];
    }

    let mut segments = Vec::new();
    split_segments(&normalized, target_size, 0, &mut segments);

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for segment in segments {
        let segment_len = char_len(&segment);
        if !current.is_empty() && current_len + segment_len > target_size {
            let tail = overlap_tail(&current, overlap);
            chunks.push(Chunk {
                ordinal: chunks.len(),
                text: std::mem::take(&mut current),
            });
            current_len = char_len(&tail);
            current = tail;
        }
        current.push_str(&segment);
        current_len += segment_len;
    }
    if !current.is_empty() {
        chunks.push(Chunk {
            ordinal: chunks.len(),
            text: current,
        });
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("a   b\t\tc"), "a b c");
        assert_eq!(normalize("  lead and trail  "), "lead and trail");
        assert_eq!(normalize("line one \n  line two"), "line one\nline two");
        assert_eq!(normalize("p1\n\n\n\n\np2"), "p1\n\np2");
        assert_eq!(normalize("crlf\r\nline"), "crlf\nline");
    }

    #[test]
    fn empty_input_yields_zero_chunks() {
        assert!(chunk("", 100, 20).is_empty());
        assert!(chunk("   \n\t  \n ", 100, 20).is_empty());
    }

    #[test]
    fn short_document_yields_one_chunk() {
        let chunks = chunk("just a short note", 100, 20);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "just a short note");
        assert_eq!(chunks[0].ordinal, 0);
    }

    #[test]
    fn no_chunk_exceeds_target_plus_overlap() {
        let text = "word ".repeat(500);
        let chunks = chunk(&text, 40, 10);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(
                c.text.chars().count() <= 50,
                "chunk of {} chars exceeds bound",
                c.text.chars().count()
            );
        }
    }

    #[test]
    fn concatenation_reconstructs_normalized_source() {
        let text = "First paragraph with several sentences. Some are long, some short.\n\n\
                    Second paragraph, also with content! Does it survive? It should.\n\n\
                    Third paragraph wraps things up, briefly.";
        let overlap = 15;
        let chunks = chunk(text, 60, overlap);
        assert!(chunks.len() > 1);

        let mut rebuilt = chunks[0].text.clone();
        for window in chunks.windows(2) {
            let tail = overlap_tail(&window[0].text, overlap);
            assert!(
                window[1].text.starts_with(&tail),
                "chunk {} does not start with previous overlap",
                window[1].ordinal
            );
            rebuilt.push_str(&window[1].text[tail.len()..]);
        }
        assert_eq!(rebuilt, normalize(text));
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi";
        let chunks = chunk(text, 30, 10);
        assert!(chunks.len() > 1);
        for window in chunks.windows(2) {
            let tail = overlap_tail(&window[0].text, 10);
            assert!(window[1].text.starts_with(&tail));
        }
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let text = format!("{}\n\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = chunk(&text, 40, 5);
        // The paragraph break is a higher-priority separator than raw
        // slicing, so the first chunk ends at the break.
        assert!(chunks[0].text.starts_with(&"a".repeat(30)));
        assert!(!chunks[0].text.contains('b'));
    }

    #[test]
    fn ordinals_are_sequential() {
        let text = "sentence one. sentence two. sentence three. sentence four. sentence five.";
        let chunks = chunk(text, 25, 5);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.ordinal, i);
        }
    }

    #[test]
    fn handles_multibyte_characters() {
        let text = "héllo wörld ünïcode ".repeat(20);
        let chunks = chunk(&text, 30, 8);
        for c in &chunks {
            assert!(c.text.chars().count() <= 38);
        }
    }
}
