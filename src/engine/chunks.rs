//! Chunk splitting and reassembly.

use crate::error::{VfsError, VfsResult};
use crate::types::{ChunkId, ChunkRecord, ContentEncoding, Compression, FileRecord};
use std::collections::HashMap;

/// Deterministic chunk id: owning file id plus zero-padded sequence.
pub fn chunk_id(file_id: &str, sequence: u32) -> ChunkId {
    format!("{}:{:06}", file_id, sequence)
}

/// Split content into fixed-size chunks; the last one may be shorter.
///
/// Pure: the same inputs always yield the same chunk ids and payloads.
pub fn create_chunks(content: &[u8], chunk_size: u64, file_id: &str) -> Vec<ChunkRecord> {
    let chunk_size = usize::try_from(chunk_size.max(1)).unwrap_or(usize::MAX);
    content
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, piece)| {
            let sequence = i as u32;
            ChunkRecord {
                id: chunk_id(file_id, sequence),
                file_id: file_id.to_string(),
                sequence,
                content: piece.to_vec(),
                size: piece.len() as u64,
            }
        })
        .collect()
}

/// Whether stored bytes are expected to match the logical size one-to-one.
pub(crate) fn is_untransformed(file: &FileRecord) -> bool {
    file.encoding == ContentEncoding::Raw && file.compression == Compression::None
}

/// Check that a chunk batch is exactly the set the file record points at.
pub fn verify_batch(file: &FileRecord, chunks: &[ChunkRecord]) -> VfsResult<()> {
    let mismatch = |reason: String| VfsError::ChunkMismatch {
        path: file.path.clone(),
        reason,
    };

    let expected = file.chunk_ids();
    if expected.len() != chunks.len() {
        return Err(mismatch(format!(
            "record lists {} chunks, batch has {}",
            expected.len(),
            chunks.len()
        )));
    }

    let mut total = 0u64;
    for (position, (id, chunk)) in expected.iter().zip(chunks).enumerate() {
        if &chunk.id != id || chunk.sequence as usize != position {
            return Err(mismatch(format!(
                "chunk at position {} is {} (sequence {}), expected {}",
                position, chunk.id, chunk.sequence, id
            )));
        }
        if chunk.file_id != file.id {
            return Err(mismatch(format!(
                "chunk {} belongs to file {}",
                chunk.id, chunk.file_id
            )));
        }
        if chunk.size != chunk.content.len() as u64 {
            return Err(mismatch(format!("chunk {} size field is wrong", chunk.id)));
        }
        total += chunk.size;
    }

    if is_untransformed(file) && total != file.size {
        return Err(mismatch(format!(
            "chunks hold {} bytes, file size is {}",
            total, file.size
        )));
    }
    Ok(())
}

/// Rebuild a chunked file's content from its fetched chunks.
///
/// Every chunk id the record lists must be present; stray chunks that share
/// the file id but are not listed are ignored.
pub fn assemble(file: &FileRecord, mut fetched: Vec<ChunkRecord>) -> VfsResult<Vec<u8>> {
    fetched.sort_by_key(|c| c.sequence);
    let by_id: HashMap<&str, &ChunkRecord> =
        fetched.iter().map(|c| (c.id.as_str(), c)).collect();

    let mut content = Vec::with_capacity(file.size as usize);
    for id in file.chunk_ids() {
        let chunk = by_id.get(id.as_str()).ok_or_else(|| VfsError::ChunkMissing {
            path: file.path.clone(),
            chunk_id: id.clone(),
        })?;
        content.extend_from_slice(&chunk.content);
    }

    if is_untransformed(file) && content.len() as u64 != file.size {
        return Err(VfsError::ChunkMismatch {
            path: file.path.clone(),
            reason: format!(
                "assembled {} bytes, file size is {}",
                content.len(),
                file.size
            ),
        });
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileContent;
    use chrono::Utc;
    use proptest::prelude::*;

    fn chunked_file(id: &str, content: &[u8], chunk_size: u64) -> (FileRecord, Vec<ChunkRecord>) {
        let chunks = create_chunks(content, chunk_size, id);
        let now = Utc::now();
        let file = FileRecord {
            id: id.to_string(),
            project_id: "p".to_string(),
            path: "public/big.bin".to_string(),
            name: "big.bin".to_string(),
            directory: "public".to_string(),
            mime_type: "application/octet-stream".to_string(),
            size: content.len() as u64,
            content: FileContent::Chunked(chunks.iter().map(|c| c.id.clone()).collect()),
            compression: Compression::None,
            encoding: ContentEncoding::Raw,
            hash: String::new(),
            created_at: now,
            updated_at: now,
        };
        (file, chunks)
    }

    #[test]
    fn test_last_chunk_may_be_short() {
        let chunks = create_chunks(&[7u8; 10], 4, "f");
        let sizes: Vec<u64> = chunks.iter().map(|c| c.size).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(chunks[2].id, "f:000002");
        assert_eq!(chunks[2].sequence, 2);
    }

    #[test]
    fn test_two_megabytes_in_64k_chunks() {
        let content = vec![1u8; 2 * 1024 * 1024];
        assert_eq!(create_chunks(&content, 64 * 1024, "f").len(), 32);
    }

    #[test]
    fn test_assemble_detects_missing_chunk() {
        let (file, mut chunks) = chunked_file("f", &[3u8; 12], 4);
        chunks.remove(1);
        let err = assemble(&file, chunks).unwrap_err();
        assert_eq!(err.code(), "CHUNK_MISSING");
    }

    #[test]
    fn test_assemble_ignores_fetch_order() {
        let content: Vec<u8> = (0..50u8).collect();
        let (file, mut chunks) = chunked_file("f", &content, 7);
        chunks.reverse();
        assert_eq!(assemble(&file, chunks).unwrap(), content);
    }

    #[test]
    fn test_verify_batch_rejects_foreign_chunk() {
        let (file, mut chunks) = chunked_file("f", &[0u8; 8], 4);
        chunks[1].file_id = "other".to_string();
        assert_eq!(verify_batch(&file, &chunks).unwrap_err().code(), "CHUNK_MISMATCH");
    }

    proptest! {
        #[test]
        fn prop_chunks_reassemble(content in proptest::collection::vec(any::<u8>(), 1..2048), size in 1u64..300) {
            let (file, chunks) = chunked_file("f", &content, size);
            prop_assert!(verify_batch(&file, &chunks).is_ok());
            prop_assert_eq!(chunks.len() as u64, (content.len() as u64 + size - 1) / size);
            prop_assert_eq!(assemble(&file, chunks).unwrap(), content);
        }

        #[test]
        fn prop_chunking_is_deterministic(content in proptest::collection::vec(any::<u8>(), 0..512), size in 1u64..64) {
            prop_assert_eq!(create_chunks(&content, size, "x"), create_chunks(&content, size, "x"));
        }
    }
}
