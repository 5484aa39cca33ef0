//! The `Vault` context object.
//!
//! Everything process-wide lives here and is constructed exactly once at
//! startup: master key, metadata store, transport, and the per-sink
//! dispatch queues. Components receive it by reference — there are no
//! module-level singletons.

use std::sync::Arc;

use bytes::Bytes;
use tracing::info;

use svault_core::config::VaultConfig;
use svault_core::{FileRecord, Sink, VaultError, VaultResult};
use svault_crypto::MasterKey;
use svault_store::MetadataStore;

use crate::download::{self, DownloadStream};
use crate::queue::SinkQueue;
use crate::refresh::refresh_chunks;
use crate::transport::SinkTransport;
use crate::upload::{self, ProgressFn};

pub struct Vault {
    pub(crate) config: VaultConfig,
    pub(crate) master_key: MasterKey,
    pub(crate) store: Arc<dyn MetadataStore>,
    pub(crate) transport: Arc<dyn SinkTransport>,
    pub(crate) queues: Vec<Arc<SinkQueue>>,
}

impl Vault {
    /// Build the process context. Must run inside a tokio runtime (each
    /// sink queue spawns its drain task here). Fails fast on config that
    /// can only ever produce broken uploads.
    pub fn new(
        config: VaultConfig,
        master_key: MasterKey,
        store: Arc<dyn MetadataStore>,
        transport: Arc<dyn SinkTransport>,
    ) -> VaultResult<Self> {
        if config.upload.chunk_size == 0 {
            return Err(VaultError::Config("upload.chunk_size must be non-zero".into()));
        }
        if config.upload.window == 0 {
            return Err(VaultError::Config("upload.window must be non-zero".into()));
        }
        if config.download.window == 0 {
            return Err(VaultError::Config("download.window must be non-zero".into()));
        }

        let queues = config
            .sinks
            .iter()
            .map(|url| {
                Arc::new(SinkQueue::new(
                    Sink::new(url.clone()),
                    config.upload.max_send_attempts,
                ))
            })
            .collect::<Vec<_>>();

        info!(sinks = queues.len(), chunk_size = config.upload.chunk_size, "vault ready");
        Ok(Self {
            config,
            master_key,
            store,
            transport,
            queues,
        })
    }

    pub fn sink_count(&self) -> usize {
        self.queues.len()
    }

    /// Upload a file's bytes; returns the persisted record. All-or-nothing:
    /// on any error no metadata exists and the caller re-uploads the file.
    pub async fn upload(
        &self,
        data: Bytes,
        name: &str,
        media_type: Option<String>,
    ) -> VaultResult<FileRecord> {
        upload::upload_file(self, data, name, media_type, None).await
    }

    /// [`Vault::upload`] with a per-chunk progress callback.
    pub async fn upload_with_progress(
        &self,
        data: Bytes,
        name: &str,
        media_type: Option<String>,
        progress: &ProgressFn,
    ) -> VaultResult<FileRecord> {
        upload::upload_file(self, data, name, media_type, Some(progress)).await
    }

    /// Open a download stream for a file by uuid.
    pub async fn open(&self, uuid: &str) -> VaultResult<DownloadStream> {
        download::open(self, uuid).await
    }

    /// Refresh any expired or near-expiry links of a file's chunks,
    /// persisting the fresh links. Returns how many were refreshed.
    pub async fn refresh_file(&self, uuid: &str) -> VaultResult<usize> {
        let file = self
            .store
            .get_file_by_uuid(uuid)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("file {uuid}")))?;
        let mut chunks = self.store.list_chunks_by_file_id(file.id).await?;
        chunks.sort_by_key(|chunk| chunk.index);
        refresh_chunks(&self.transport, &self.store, &self.config.refresh, &mut chunks).await
    }

    /// Delete a file and its chunks. Sink-side blobs are orphaned.
    pub async fn delete(&self, uuid: &str) -> VaultResult<()> {
        self.store.delete_file(uuid).await?;
        info!(uuid, "deleted");
        Ok(())
    }
}
