//! Shared table state behind both store backends.

use serde::{Deserialize, Serialize};

use svault_core::types::ensure_contiguous;
use svault_core::{now_millis, ChunkRecord, FileRecord, NewChunk, NewFile, VaultError, VaultResult};

/// Files + chunks with auto-increment ids. Serializable so [`crate::JsonStore`]
/// can persist it verbatim.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct StoreData {
    pub files: Vec<FileRecord>,
    pub chunks: Vec<ChunkRecord>,
    pub next_file_id: i64,
    pub next_chunk_id: i64,
}

impl StoreData {
    pub fn get_file_by_uuid(&self, uuid: &str) -> Option<FileRecord> {
        self.files.iter().find(|f| f.uuid == uuid).cloned()
    }

    pub fn list_chunks_by_file_id(&self, file_id: i64) -> Vec<ChunkRecord> {
        self.chunks
            .iter()
            .filter(|c| c.file_id == file_id)
            .cloned()
            .collect()
    }

    pub fn insert_file_with_chunks(
        &mut self,
        file: NewFile,
        chunks: Vec<NewChunk>,
    ) -> VaultResult<FileRecord> {
        ensure_contiguous(&chunks)?;
        if self.files.iter().any(|f| f.uuid == file.uuid) {
            return Err(VaultError::Store(format!(
                "file uuid already exists: {}",
                file.uuid
            )));
        }

        self.next_file_id += 1;
        let record = FileRecord {
            id: self.next_file_id,
            uuid: file.uuid,
            name: file.name,
            media_type: file.media_type,
            size_bytes: file.size_bytes,
            key_envelope: file.key_envelope,
            created_at: now_millis(),
        };

        for chunk in chunks {
            self.next_chunk_id += 1;
            self.chunks.push(ChunkRecord {
                id: self.next_chunk_id,
                file_id: record.id,
                index: chunk.index,
                iv: chunk.iv,
                url: chunk.url,
                url_expires_at: chunk.url_expires_at,
            });
        }

        self.files.push(record.clone());
        Ok(record)
    }

    pub fn update_chunk_link(&mut self, chunk_id: i64, url: &str, expires_at: u64) -> VaultResult<()> {
        let chunk = self
            .chunks
            .iter_mut()
            .find(|c| c.id == chunk_id)
            .ok_or_else(|| VaultError::Store(format!("no such chunk id: {chunk_id}")))?;
        chunk.url = url.to_string();
        chunk.url_expires_at = expires_at;
        Ok(())
    }

    pub fn delete_file(&mut self, uuid: &str) -> VaultResult<()> {
        let pos = self
            .files
            .iter()
            .position(|f| f.uuid == uuid)
            .ok_or_else(|| VaultError::NotFound(format!("file {uuid}")))?;
        let file_id = self.files[pos].id;
        self.files.remove(pos);
        self.chunks.retain(|c| c.file_id != file_id);
        Ok(())
    }
}
