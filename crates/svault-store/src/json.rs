//! JSON-file-backed metadata store.
//!
//! Loads entirely into memory on open; every mutation is flushed back via
//! temp-file + rename so a crash never leaves a torn store on disk.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use tracing::debug;

use svault_core::{ChunkRecord, FileRecord, NewChunk, NewFile, VaultError, VaultResult};

use crate::data::StoreData;
use crate::MetadataStore;

pub struct JsonStore {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl JsonStore {
    /// Load or create a store at the given path. A missing file starts
    /// empty; a present but unparsable file is an error, not a reset.
    pub fn open(path: &Path) -> VaultResult<Self> {
        let data = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading store: {}", path.display()))?;
            serde_json::from_str(&content)
                .map_err(|e| VaultError::Store(format!("parsing {}: {e}", path.display())))?
        } else {
            StoreData::default()
        };

        debug!(path = %path.display(), "metadata store opened");
        Ok(Self {
            path: path.to_path_buf(),
            data: Mutex::new(data),
        })
    }

    fn flush(&self, data: &StoreData) -> VaultResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating store dir: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(data)
            .map_err(|e| VaultError::Store(format!("serializing store: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("writing: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming to: {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for JsonStore {
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
        let mut data = self.data.lock().unwrap();
        let record = data.insert_file_with_chunks(file, chunks)?;
        self.flush(&data)?;
        Ok(record)
    }

    async fn update_chunk_link(
        &self,
        chunk_id: i64,
        url: &str,
        expires_at: u64,
    ) -> VaultResult<()> {
        let mut data = self.data.lock().unwrap();
        data.update_chunk_link(chunk_id, url, expires_at)?;
        self.flush(&data)
    }

    async fn delete_file(&self, uuid: &str) -> VaultResult<()> {
        let mut data = self.data.lock().unwrap();
        data.delete_file(uuid)?;
        self.flush(&data)
    }
}
