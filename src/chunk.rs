//! Fixed-window text chunker.
//!
//! Splits coursebook text into windows of `chunk_size` characters where
//! consecutive windows share `chunk_overlap` characters. Offsets are counted
//! in `char`s, so a window never cuts through a UTF-8 code point.
//!
//! Each chunk receives a fresh UUID, a contiguous index starting at 0, and
//! a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Split text into overlapping windows.
///
/// Windows start at `0, step, 2*step, ...` with `step = chunk_size - chunk_overlap`
/// and continue while the start offset is inside the text; the last window
/// may be shorter. Empty text yields no windows.
///
/// `chunk_overlap` must be smaller than `chunk_size` (enforced at config load);
/// a zero step is clamped to one so the loop always terminates.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    // Byte offset of every char boundary, plus the end of the string.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = boundaries.len() - 1;
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);

    let mut windows = Vec::with_capacity(char_len / step + 1);
    let mut start = 0;
    while start < char_len {
        let end = (start + chunk_size).min(char_len);
        windows.push(text[boundaries[start]..boundaries[end]].to_string());
        start += step;
    }
    windows
}

/// Split a coursebook's text and wrap the windows as [`Chunk`]s.
pub fn chunk_text(pdf_id: &str, text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    split_text(text, chunk_size, chunk_overlap)
        .into_iter()
        .enumerate()
        .map(|(i, window)| make_chunk(pdf_id, i as i64, window))
        .collect()
}

fn make_chunk(pdf_id: &str, index: i64, content: String) -> Chunk {
    Chunk {
        id: Uuid::new_v4().to_string(),
        pdf_id: pdf_id.to_string(),
        chunk_index: index,
        hash: hash_text(&content),
        content,
    }
}

pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
