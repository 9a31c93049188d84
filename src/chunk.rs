//! Separator-aware sliding-window text chunker.
//!
//! Splits rulebook text on a separator (newline by default) and greedily
//! merges the pieces into windows of at most `chunk_size` characters. When a
//! window is flushed, its trailing pieces totalling at most `chunk_overlap`
//! characters are carried into the next one. Pieces that on their own exceed
//! the window are hard-split into `chunk_size` windows with a stride of
//! `chunk_size - chunk_overlap`.
//!
//! Lengths are counted in characters, not bytes. Each chunk carries a SHA-256
//! hash of its text, which the index uses as a stable record ID.

use sha2::{Digest, Sha256};
use std::collections::VecDeque;

use crate::config::ChunkingConfig;
use crate::models::Chunk;

/// Split text into chunks. Returns chunks with contiguous indices starting
/// at 0; whitespace-only input yields no chunks.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    split_text(
        text,
        &config.separator,
        config.chunk_size,
        config.chunk_overlap,
    )
    .into_iter()
    .enumerate()
    .map(|(i, t)| make_chunk(i as i64, t))
    .collect()
}

/// The window computation behind [`chunk_text`].
pub fn split_text(text: &str, separator: &str, size: usize, overlap: usize) -> Vec<String> {
    let sep_len = separator.chars().count();
    let mut out = Vec::new();
    let mut current: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for piece in text.split(separator) {
        if piece.trim().is_empty() {
            continue;
        }
        let len = piece.chars().count();

        if len > size {
            flush(&mut out, &current, separator);
            current.clear();
            total = 0;
            out.extend(hard_split(piece, size, overlap));
            continue;
        }

        let joined = |total: usize, n: usize| total + if n > 0 { sep_len } else { 0 };
        if joined(total, current.len()) + len > size && !current.is_empty() {
            flush(&mut out, &current, separator);
            // Keep a tail no longer than `overlap` that still leaves room for `piece`.
            while total > overlap
                || (total > 0 && joined(total, current.len()) + len > size)
            {
                let Some(front) = current.pop_front() else {
                    break;
                };
                total -= front.chars().count() + if current.is_empty() { 0 } else { sep_len };
            }
        }

        if !current.is_empty() {
            total += sep_len;
        }
        total += len;
        current.push_back(piece);
    }

    flush(&mut out, &current, separator);
    out
}

fn flush(out: &mut Vec<String>, current: &VecDeque<&str>, separator: &str) {
    if current.is_empty() {
        return;
    }
    let joined = current.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Fixed windows over a single oversized piece. The last window ends at the
/// end of the piece.
fn hard_split(piece: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = piece.chars().collect();
    let stride = size - overlap;
    let mut windows = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + size).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += stride;
    }
    windows
}

fn make_chunk(index: i64, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        chunk_index: index,
        text,
        hash,
    }
}
