//! Typed records crossing component boundaries.
//!
//! `NewFile`/`NewChunk` are the not-yet-persisted forms handed to the
//! metadata store; `FileRecord`/`ChunkRecord` come back with store-assigned
//! ids. Constructors validate invariants (IV length via the array type,
//! index contiguity via [`ensure_contiguous`]) so downstream code never
//! re-checks them at point of use.

use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Per-chunk AES-GCM initialization vector length in bytes.
pub const IV_LEN: usize = 12;

/// An outbound blob sink: an opaque POST endpoint identity.
///
/// Owned by the administrative layer; read-only to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sink {
    pub url: String,
}

impl Sink {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// A file awaiting persistence. `created_at` is stamped by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFile {
    /// Externally visible, immutable identifier.
    pub uuid: String,
    pub name: String,
    /// MIME type as reported by the uploader; `None` means unknown.
    pub media_type: Option<String>,
    /// Plaintext size in bytes (not the sum of ciphertext sizes).
    pub size_bytes: u64,
    /// Per-file key wrapped under the master key, base64
    /// (`IV(12) || Tag(16) || Ciphertext(32)`).
    pub key_envelope: String,
}

/// A chunk awaiting persistence, produced by the upload orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChunk {
    /// Zero-based position within the file.
    pub index: u32,
    /// Base64 of the 12-byte per-chunk IV.
    pub iv: String,
    /// Sink-assigned link to `Ciphertext || Tag(16)`.
    pub url: String,
    /// Link validity deadline, Unix millis. 0 = already expired.
    pub url_expires_at: u64,
}

impl NewChunk {
    /// The IV arrives as a fixed-size array so a wrong-length IV is
    /// unrepresentable here; it is stored base64 like the envelope.
    pub fn new(index: u32, iv: [u8; IV_LEN], url: impl Into<String>, url_expires_at: u64) -> Self {
        Self {
            index,
            iv: base64_encode(&iv),
            url: url.into(),
            url_expires_at,
        }
    }
}

/// A persisted file row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub media_type: Option<String>,
    pub size_bytes: u64,
    pub key_envelope: String,
    /// Unix millis at finalization.
    pub created_at: u64,
}

impl FileRecord {
    /// `Content-Type` for downloads.
    pub fn media_type_or_default(&self) -> &str {
        self.media_type.as_deref().unwrap_or("application/octet-stream")
    }
}

/// A persisted chunk row. `url`/`url_expires_at` are the only fields the
/// refresher mutates in place; everything else is immutable after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: i64,
    pub file_id: i64,
    pub index: u32,
    pub iv: String,
    pub url: String,
    pub url_expires_at: u64,
}

impl ChunkRecord {
    /// Decode the stored IV, rejecting anything that is not exactly 12
    /// bytes after base64 decoding.
    pub fn iv_bytes(&self) -> VaultResult<[u8; IV_LEN]> {
        let raw = base64_decode(&self.iv)
            .map_err(|e| VaultError::Integrity(format!("chunk {} IV is not base64: {e}", self.id)))?;
        raw.as_slice().try_into().map_err(|_| {
            VaultError::Integrity(format!(
                "chunk {} IV has wrong length: {} bytes (expected {IV_LEN})",
                self.id,
                raw.len()
            ))
        })
    }
}

/// Enforce the chunk-index invariant: indices are exactly `0..n` with no
/// gaps or duplicates. Callers pass chunks in the order they will persist.
pub fn ensure_contiguous(chunks: &[NewChunk]) -> VaultResult<()> {
    for (expected, chunk) in chunks.iter().enumerate() {
        if chunk.index as usize != expected {
            return Err(VaultError::Store(format!(
                "chunk indices must be contiguous from 0: found {} at position {expected}",
                chunk.index
            )));
        }
    }
    Ok(())
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn base64_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: u32) -> NewChunk {
        NewChunk::new(index, [7u8; IV_LEN], format!("https://sink.example/{index}"), 0)
    }

    #[test]
    fn iv_roundtrips_through_base64() {
        let new = NewChunk::new(0, [0xA5; IV_LEN], "https://sink.example/0", 0);
        let record = ChunkRecord {
            id: 1,
            file_id: 1,
            index: new.index,
            iv: new.iv,
            url: new.url,
            url_expires_at: new.url_expires_at,
        };
        assert_eq!(record.iv_bytes().unwrap(), [0xA5; IV_LEN]);
    }

    #[test]
    fn wrong_length_iv_is_integrity_error() {
        let record = ChunkRecord {
            id: 1,
            file_id: 1,
            index: 0,
            iv: base64_encode(&[1u8; 11]),
            url: "https://sink.example/0".into(),
            url_expires_at: 0,
        };
        assert!(matches!(record.iv_bytes(), Err(VaultError::Integrity(_))));
    }

    #[test]
    fn contiguous_indices_pass() {
        let chunks: Vec<NewChunk> = (0..4).map(chunk).collect();
        assert!(ensure_contiguous(&chunks).is_ok());
        assert!(ensure_contiguous(&[]).is_ok());
    }

    #[test]
    fn gap_or_duplicate_is_rejected() {
        assert!(ensure_contiguous(&[chunk(0), chunk(2)]).is_err());
        assert!(ensure_contiguous(&[chunk(0), chunk(0)]).is_err());
        assert!(ensure_contiguous(&[chunk(1)]).is_err());
    }

    #[test]
    fn media_type_defaults_to_octet_stream() {
        let file = FileRecord {
            id: 1,
            uuid: "u".into(),
            name: "n".into(),
            media_type: None,
            size_bytes: 0,
            key_envelope: String::new(),
            created_at: 0,
        };
        assert_eq!(file.media_type_or_default(), "application/octet-stream");
    }
}
