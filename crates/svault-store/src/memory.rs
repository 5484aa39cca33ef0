//! In-memory metadata store — the test double and embedded default.

use std::sync::Mutex;

use async_trait::async_trait;

use svault_core::{ChunkRecord, FileRecord, NewChunk, NewFile, VaultResult};

use crate::data::StoreData;
use crate::MetadataStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn get_file_by_uuid(&self, uuid: &str) -> VaultResult<Option<FileRecord>> {
        Ok(self.data.lock().unwrap().get_file_by_uuid(uuid))
    }

    async fn list_chunks_by_file_id(&self, file_id: i64) -> VaultResult<Vec<ChunkRecord>> {
        Ok(self.data.lock().unwrap().list_chunks_by_file_id(file_id))
    }

    async fn insert_file_with_chunks(
        &self,
        file: NewFile,
        chunks: Vec<NewChunk>,
    ) -> VaultResult<FileRecord> {
        self.data.lock().unwrap().insert_file_with_chunks(file, chunks)
    }

    async fn update_chunk_link(
        &self,
        chunk_id: i64,
        url: &str,
        expires_at: u64,
    ) -> VaultResult<()> {
        self.data.lock().unwrap().update_chunk_link(chunk_id, url, expires_at)
    }

    async fn delete_file(&self, uuid: &str) -> VaultResult<()> {
        self.data.lock().unwrap().delete_file(uuid)
    }
}
