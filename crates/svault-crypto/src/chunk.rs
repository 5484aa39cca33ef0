//! Per-chunk AES-256-GCM encryption/decryption
//!
//! Sink wire format: `[N bytes: ciphertext][16 bytes: GCM tag]`.
//! The 12-byte IV is returned to the caller and persisted in the chunk
//! row, not in the blob — exactly what [`decrypt_chunk`] expects back.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

use svault_core::{VaultError, VaultResult};

use crate::keys::FileKey;
use crate::{IV_SIZE, TAG_SIZE};

/// Encrypt a single chunk with a fresh random 12-byte IV.
///
/// Returns `(ciphertext || tag, iv)`.
pub fn encrypt_chunk(file_key: &FileKey, plaintext: &[u8]) -> VaultResult<(Vec<u8>, [u8; IV_SIZE])> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(file_key.as_bytes()));

    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| VaultError::Integrity("chunk encryption failed".into()))?;

    Ok((ciphertext, iv))
}

/// Decrypt a single chunk fetched from a sink.
///
/// - `ciphertext_with_tag`: `Ciphertext || Tag(16)` as stored at the sink
/// - `iv`: the 12-byte IV persisted alongside the chunk record
///
/// Fails with `Integrity` on a tag mismatch, an IV that is not exactly
/// 12 bytes, or input shorter than the tag itself.
pub fn decrypt_chunk(
    file_key: &FileKey,
    ciphertext_with_tag: &[u8],
    iv: &[u8],
) -> VaultResult<Vec<u8>> {
    if iv.len() != IV_SIZE {
        return Err(VaultError::Integrity(format!(
            "chunk IV has wrong length: {} bytes (expected {IV_SIZE})",
            iv.len()
        )));
    }
    if ciphertext_with_tag.len() < TAG_SIZE {
        return Err(VaultError::Integrity(format!(
            "chunk ciphertext too short: {} bytes (minimum {TAG_SIZE})",
            ciphertext_with_tag.len()
        )));
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(file_key.as_bytes()));

    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext_with_tag)
        .map_err(|_| {
            VaultError::Integrity("chunk decryption failed: corrupted data or wrong key".into())
        })
}
