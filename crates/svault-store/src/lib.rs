//! svault-store: the narrow read/write interface to file/chunk metadata
//!
//! The relational store itself is an external collaborator; the core only
//! ever talks through [`MetadataStore`]. Two backends ship here:
//!   - [`MemoryStore`]: ephemeral, for tests and embedding
//!   - [`JsonStore`]: single-node persistence, loaded on open and flushed
//!     atomically via temp+rename
//!
//! The store is the sole source of truth for chunk link freshness —
//! in-memory copies held by callers are scratch and must be re-read after
//! an error.

mod data;
mod json;
mod memory;

pub use json::JsonStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use svault_core::{ChunkRecord, FileRecord, NewChunk, NewFile, VaultResult};

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Look up a file by its external uuid. `None` when absent.
    async fn get_file_by_uuid(&self, uuid: &str) -> VaultResult<Option<FileRecord>>;

    /// All chunk rows for a file. No ordering guarantee — callers sort by
    /// index.
    async fn list_chunks_by_file_id(&self, file_id: i64) -> VaultResult<Vec<ChunkRecord>>;

    /// Persist a file and its chunk rows as one atomic mutation. Chunk
    /// indices must be contiguous from 0; `created_at` is stamped here.
    async fn insert_file_with_chunks(
        &self,
        file: NewFile,
        chunks: Vec<NewChunk>,
    ) -> VaultResult<FileRecord>;

    /// Rewrite a chunk's link and expiry in place (refresher only).
    async fn update_chunk_link(&self, chunk_id: i64, url: &str, expires_at: u64)
        -> VaultResult<()>;

    /// Delete a file by uuid, cascading to its chunks. `NotFound` when the
    /// uuid does not exist.
    async fn delete_file(&self, uuid: &str) -> VaultResult<()>;
}
