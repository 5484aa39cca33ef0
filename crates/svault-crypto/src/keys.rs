//! Master/file key types, file key generation, key wrapping

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use rand::RngCore;
use zeroize::Zeroize;

use svault_core::{VaultError, VaultResult};

use crate::{ENVELOPE_SIZE, IV_SIZE, KEY_SIZE, TAG_SIZE};

/// The process-wide 256-bit master key. Zeroized on drop, never logged.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Parse from a 64-hex-char string (the startup configuration form).
    ///
    /// Anything other than exactly 32 decoded bytes is a `Config` error —
    /// fatal at startup, never surfaced per-request.
    pub fn from_hex(hex_str: &str) -> VaultResult<Self> {
        let raw = hex::decode(hex_str.trim())
            .map_err(|e| VaultError::Config(format!("master key is not valid hex: {e}")))?;
        let bytes: [u8; KEY_SIZE] = raw.as_slice().try_into().map_err(|_| {
            VaultError::Config(format!(
                "master key must be {KEY_SIZE} bytes, got {}",
                raw.len()
            ))
        })?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A per-upload 256-bit encryption key. Generated fresh for every file,
/// never reused. Zeroized on drop.
#[derive(Clone)]
pub struct FileKey {
    bytes: [u8; KEY_SIZE],
}

impl FileKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit file encryption key.
pub fn generate_file_key() -> FileKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    FileKey::from_bytes(bytes)
}

/// Wrap (encrypt) a file key under the master key.
///
/// AES-256-GCM with a fresh random 12-byte IV. Storage layout is
/// `IV(12) || Tag(16) || Ciphertext(32)`, base64-encoded.
pub fn wrap_key(master: &MasterKey, file_key: &FileKey) -> VaultResult<String> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(master.as_bytes()));

    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    // aes-gcm emits ciphertext with the tag appended
    let ct_and_tag = cipher
        .encrypt(Nonce::from_slice(&iv), file_key.as_bytes().as_ref())
        .map_err(|_| VaultError::Integrity("key wrapping failed".into()))?;
    let (ciphertext, tag) = ct_and_tag.split_at(ct_and_tag.len() - TAG_SIZE);

    let mut envelope = Vec::with_capacity(ENVELOPE_SIZE);
    envelope.extend_from_slice(&iv);
    envelope.extend_from_slice(tag);
    envelope.extend_from_slice(ciphertext);

    Ok(base64::engine::general_purpose::STANDARD.encode(envelope))
}

/// Unwrap (decrypt) a file key envelope produced by [`wrap_key`].
///
/// Fails with `Integrity` on a malformed envelope or a tag that does not
/// verify (tampered or corrupt, or wrong master key). Non-retryable.
pub fn unwrap_key(master: &MasterKey, envelope_b64: &str) -> VaultResult<FileKey> {
    let envelope = base64::engine::general_purpose::STANDARD
        .decode(envelope_b64)
        .map_err(|e| VaultError::Integrity(format!("key envelope is not base64: {e}")))?;

    if envelope.len() != ENVELOPE_SIZE {
        return Err(VaultError::Integrity(format!(
            "key envelope has wrong size: {} bytes (expected {ENVELOPE_SIZE})",
            envelope.len()
        )));
    }

    let iv = &envelope[..IV_SIZE];
    let tag = &envelope[IV_SIZE..IV_SIZE + TAG_SIZE];
    let ciphertext = &envelope[IV_SIZE + TAG_SIZE..];

    // Rebuild the ciphertext||tag order aes-gcm expects
    let mut ct_and_tag = Vec::with_capacity(KEY_SIZE + TAG_SIZE);
    ct_and_tag.extend_from_slice(ciphertext);
    ct_and_tag.extend_from_slice(tag);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(master.as_bytes()));
    let mut plaintext = cipher
        .decrypt(Nonce::from_slice(iv), ct_and_tag.as_ref())
        .map_err(|_| {
            VaultError::Integrity("key unwrapping failed: wrong master key or corrupt envelope".into())
        })?;

    let mut key_bytes = [0u8; KEY_SIZE];
    key_bytes.copy_from_slice(&plaintext);
    plaintext.zeroize();

    Ok(FileKey::from_bytes(key_bytes))
}
