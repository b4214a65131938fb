//! Document bodies: chunking, encryption and manifests
//!
//! A document is split with a content-defined chunker so that an edit only
//! changes the chunks around it. Each chunk is encrypted convergently under
//! the file key; the chunk's address is the SHA-256 of its encrypted bytes.
//! A [`DocumentManifest`] lists the chunk addresses in order.

use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use strongbox_crypto::{CryptoError, EncryptedData, SymmetricKey};

use super::newtypes::{ChunkHash, DocumentHash};

// ============================================================================
// Chunking
// ============================================================================

/// Size bounds for the content-defined chunker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    pub min_size: usize,
    pub avg_size: usize,
    pub max_size: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_size: 2 * 1024,
            avg_size: 8 * 1024,
            max_size: 64 * 1024,
        }
    }
}

const fn splitmix64(state: u64) -> u64 {
    let mut z = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

const fn gear_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = splitmix64(i as u64);
        i += 1;
    }
    table
}

static GEAR: [u64; 256] = gear_table();

/// Splits `data` into content-defined ranges
///
/// Every range except the last is at least `min_size` long and none is
/// longer than `max_size`. Empty input yields no ranges.
pub fn chunk_boundaries(data: &[u8], config: &ChunkerConfig) -> Vec<Range<usize>> {
    let min = config.min_size.max(1);
    let max = config.max_size.max(min);
    let low_mask = (config.avg_size.max(2) as u64).next_power_of_two() - 1;
    // Test the high bits, which depend on the last 64 bytes seen.
    let mask = low_mask << (64 - low_mask.count_ones());

    let mut ranges = Vec::new();
    let mut start = 0;
    while start < data.len() {
        let remaining = data.len() - start;
        if remaining <= min {
            ranges.push(start..data.len());
            break;
        }

        let limit = remaining.min(max);
        let mut hash: u64 = 0;
        let mut cut = limit;
        for (offset, byte) in data[start..start + limit].iter().enumerate() {
            hash = (hash << 1).wrapping_add(GEAR[*byte as usize]);
            if offset + 1 >= min && hash & mask == 0 {
                cut = offset + 1;
                break;
            }
        }
        ranges.push(start..start + cut);
        start += cut;
    }
    ranges
}

// ============================================================================
// Chunks and manifests
// ============================================================================

/// An encrypted chunk and its address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub hash: ChunkHash,
    pub data: EncryptedData,
}

impl Chunk {
    pub fn new(data: EncryptedData) -> Self {
        Self {
            hash: ChunkHash::of(&data.to_bytes()),
            data,
        }
    }

    /// True if the address matches the content
    pub fn is_intact(&self) -> bool {
        ChunkHash::of(&self.data.to_bytes()) == self.hash
    }

    /// Bytes this chunk occupies in storage
    pub fn stored_size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Ordered list of chunk addresses making up one document version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentManifest {
    pub chunks: Vec<ChunkHash>,
    /// Plaintext size in bytes
    pub size: u64,
}

impl DocumentManifest {
    pub fn hash(&self) -> DocumentHash {
        DocumentHash::of_chunks(&self.chunks)
    }
}

/// A document ready for storage or upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedDocument {
    pub manifest: DocumentManifest,
    /// Unique chunks, in first-use order
    pub chunks: Vec<Chunk>,
}

impl EncryptedDocument {
    pub fn hash(&self) -> DocumentHash {
        self.manifest.hash()
    }
}

/// Chunks and encrypts a document body under its file key
pub fn encrypt_document(
    key: &SymmetricKey,
    content: &[u8],
    config: &ChunkerConfig,
) -> Result<EncryptedDocument, CryptoError> {
    let mut manifest = DocumentManifest {
        chunks: Vec::new(),
        size: content.len() as u64,
    };
    let mut chunks: Vec<Chunk> = Vec::new();

    for range in chunk_boundaries(content, config) {
        let chunk = Chunk::new(key.encrypt_convergent(&content[range])?);
        manifest.chunks.push(chunk.hash.clone());
        if !chunks.iter().any(|c| c.hash == chunk.hash) {
            chunks.push(chunk);
        }
    }

    Ok(EncryptedDocument { manifest, chunks })
}

/// Reassembles a document body from its manifest
///
/// `manifest.size` is not covered by the document hash, so it is checked
/// against the reassembled length rather than trusted.
///
/// # Errors
/// [`CryptoError::Decoding`] if a chunk is missing or corrupted or the
/// length differs from `manifest.size`, or a decryption error if the key
/// is wrong.
pub fn decrypt_document(
    key: &SymmetricKey,
    manifest: &DocumentManifest,
    chunks: &HashMap<ChunkHash, Chunk>,
) -> Result<Vec<u8>, CryptoError> {
    let mut content = Vec::new();
    for hash in &manifest.chunks {
        let chunk = chunks
            .get(hash)
            .ok_or_else(|| CryptoError::Decoding(format!("missing chunk {hash}")))?;
        if !chunk.is_intact() {
            return Err(CryptoError::Decoding(format!("corrupted chunk {hash}")));
        }
        content.extend(key.decrypt(&chunk.data)?);
    }
    if content.len() as u64 != manifest.size {
        return Err(CryptoError::Decoding(format!(
            "document is {} bytes, manifest claims {}",
            content.len(),
            manifest.size
        )));
    }
    Ok(content)
}
