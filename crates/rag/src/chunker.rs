//! Text chunking with exact source-offset tracking.
//!
//! A window of `chunk_size` characters advances across the text with stride
//! `chunk_size - overlap`. Offsets are the window positions themselves, taken
//! directly from the slicing arithmetic. They are never recomputed by
//! substring search, which could match the wrong occurrence of repeated text
//! and silently corrupt citations.

use docanchor_core::{AppError, AppResult};
use uuid::Uuid;

use crate::types::Chunk;

/// Split `text` into overlapping, offset-tagged chunks.
///
/// Offsets are character positions (not bytes), inclusive-exclusive, in the
/// text as passed in. The final chunk is truncated to the text length and is
/// kept even when it is shorter than the overlap width. Empty text yields an
/// empty result, not an error.
///
/// Chunking is deterministic and has no side effects: identical inputs always
/// produce identical boundaries, which is what makes reprocessing idempotent.
///
/// # Errors
/// `AppError::InvalidConfiguration` when `chunk_size == 0` or
/// `overlap >= chunk_size`.
pub fn chunk(
    document_id: Uuid,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> AppResult<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(AppError::InvalidConfiguration(
            "chunk_size must be greater than zero".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(AppError::InvalidConfiguration(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }

    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte position of every character, plus the end sentinel. Indexing this
    // table by character position gives the byte range to slice, so offsets
    // stay character-accurate on multibyte text.
    let byte_of_char: Vec<usize> = text
        .char_indices()
        .map(|(byte, _)| byte)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = byte_of_char.len() - 1;

    let stride = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut seq = 0u32;

    loop {
        let end = (start + chunk_size).min(total_chars);
        chunks.push(Chunk {
            id: Chunk::derive_id(&document_id, seq),
            document_id,
            text: text[byte_of_char[start]..byte_of_char[end]].to_string(),
            start_offset: start,
            end_offset: end,
            seq,
        });

        if end == total_chars {
            break;
        }
        start += stride;
        seq += 1;
    }

    tracing::debug!(
        document_id = %document_id,
        chunks = chunks.len(),
        chunk_size,
        overlap,
        "Chunked document text"
    );

    Ok(chunks)
}
