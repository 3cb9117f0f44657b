//! Boundary-aware recursive text splitting with overlapping windows.
//!
//! Text is first cut into contiguous pieces no longer than the chunk size,
//! preferring paragraph breaks, then line breaks, then spaces, then single
//! characters. Pieces are then merged greedily into chunks; when a chunk is
//! full, a tail of whole pieces no longer than the overlap is carried into the
//! next chunk. Lengths are measured in characters, offsets in bytes.

use std::collections::VecDeque;
use std::ops::Range;

pub const DEFAULT_CHUNK_SIZE: usize = 2000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Split boundaries in order of preference. The empty separator means a hard
/// cut between characters.
const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// An exact substring of the split text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    /// Byte offset of `content` in the source text.
    pub offset: usize,
}

impl Chunk {
    /// Byte offset one past the end of the chunk.
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.content.len()
    }
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    /// Chunk size is at least one character; overlap is kept below it.
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        let chunk_size = config.chunk_size.max(1);
        let chunk_overlap = config.chunk_overlap.min(chunk_size - 1);
        Self {
            config: SplitterConfig {
                chunk_size,
                chunk_overlap,
            },
        }
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    #[must_use]
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        split_pieces(text, 0, SEPARATORS, self.config.chunk_size, &mut pieces);

        merge_pieces(text, &pieces, self.config.chunk_size, self.config.chunk_overlap)
            .into_iter()
            .map(|range| Chunk {
                content: text[range.clone()].to_owned(),
                offset: range.start,
            })
            .collect()
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Cut `text` into contiguous byte ranges (offset into the full input by
/// `base`) that each fit in `chunk_size` characters.
fn split_pieces(
    text: &str,
    base: usize,
    separators: &[&str],
    chunk_size: usize,
    out: &mut Vec<Range<usize>>,
) {
    if char_len(text) <= chunk_size {
        out.push(base..base + text.len());
        return;
    }

    let Some(pos) = separators
        .iter()
        .position(|sep| sep.is_empty() || text.contains(sep))
    else {
        // No boundary left to try; keep the oversized piece intact.
        out.push(base..base + text.len());
        return;
    };
    let separator = separators[pos];
    let finer = &separators[pos + 1..];

    if separator.is_empty() {
        out.extend(
            text.char_indices()
                .map(|(i, c)| base + i..base + i + c.len_utf8()),
        );
        return;
    }

    let mut offset = base;
    for piece in text.split_inclusive(separator) {
        if char_len(piece) <= chunk_size {
            out.push(offset..offset + piece.len());
        } else {
            split_pieces(piece, offset, finer, chunk_size, out);
        }
        offset += piece.len();
    }
}

/// Greedily pack pieces into windows of at most `chunk_size` characters,
/// carrying at most `overlap` characters of whole pieces between windows.
fn merge_pieces(
    text: &str,
    pieces: &[Range<usize>],
    chunk_size: usize,
    overlap: usize,
) -> Vec<Range<usize>> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
    let mut window_len = 0;

    for piece in pieces {
        let piece_len = char_len(&text[piece.clone()]);

        if !window.is_empty() && window_len + piece_len > chunk_size {
            if let (Some((first, _)), Some((last, _))) = (window.front(), window.back()) {
                chunks.push(first.start..last.end);
            }
            while window_len > overlap || (window_len > 0 && window_len + piece_len > chunk_size) {
                let Some((_, len)) = window.pop_front() else {
                    break;
                };
                window_len -= len;
            }
        }

        window.push_back((piece.clone(), piece_len));
        window_len += piece_len;
    }

    if let (Some((first, _)), Some((last, _))) = (window.front(), window.back()) {
        chunks.push(first.start..last.end);
    }

    chunks
}
