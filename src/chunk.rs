//! Fixed-size overlapping text chunker.
//!
//! Splits document body text into windows of at most `chunk_size` characters,
//! each window starting `chunk_size - overlap` characters after the previous
//! one. Windows operate on Unicode scalar values, never raw bytes, so
//! multi-byte text is never split mid-character.

use crate::error::ChatError;

/// Split text into overlapping fixed-size windows.
///
/// Every character of `text` appears in at least one window, windows are in
/// strictly increasing offset order, and all windows except possibly the
/// last have exactly `chunk_size` characters. Empty input yields a single
/// empty window.
///
/// # Errors
///
/// Returns [`ChatError::Config`] if `chunk_size` is zero or if
/// `overlap >= chunk_size` — a non-positive stride would never advance.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>, ChatError> {
    if chunk_size == 0 {
        return Err(ChatError::Config("chunk_size must be > 0".to_string()));
    }
    if overlap >= chunk_size {
        return Err(ChatError::Config(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }

    let chars: Vec<char> = text.chars().collect();
    let stride = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut offset = 0;

    loop {
        let end = (offset + chunk_size).min(chars.len());
        chunks.push(chars[offset..end].iter().collect());
        if offset + chunk_size >= chars.len() {
            break;
        }
        offset += stride;
    }

    Ok(chunks)
}
