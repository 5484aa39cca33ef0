//! svault-crypto: envelope encryption for sink-stored chunks
//!
//! Key hierarchy:
//! ```text
//! Master Key (256-bit, process-wide, loaded once at startup)
//!   └── File Key (per-upload, 256-bit random, wrapped by master key)
//!       └── Chunk AEAD: AES-256-GCM (key=file_key, IV=random 96-bit per chunk)
//! ```
//!
//! Stored formats:
//! - wrapped file key: `IV(12) || Tag(16) || Ciphertext(32)`, base64 (60 raw bytes)
//! - chunk at a sink:  `Ciphertext || Tag(16)`, IV stored separately in the chunk row
//!
//! Every failure here is a deterministic function of input — no I/O, no
//! transient conditions. Tag mismatches surface as `VaultError::Integrity`
//! and must never be retried.

pub mod chunk;
pub mod keys;

pub use chunk::{decrypt_chunk, encrypt_chunk};
pub use keys::{generate_file_key, unwrap_key, wrap_key, FileKey, MasterKey};

/// Size of master and file keys in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM initialization vector (96-bit)
pub const IV_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Decoded length of a wrapped file key: IV + tag + 32-byte key ciphertext
pub const ENVELOPE_SIZE: usize = IV_SIZE + TAG_SIZE + KEY_SIZE;
