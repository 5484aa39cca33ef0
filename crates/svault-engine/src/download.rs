//! Download reassembly pipeline.
//!
//! `open` resolves metadata, unwraps the file key, refreshes stale links,
//! then streams plaintext: chunks are fetched and decrypted in windows of
//! `download.window` with parallel I/O inside each window, and emitted
//! strictly in index order at window boundaries — the window size is the
//! whole reordering buffer.
//!
//! A fetch or decrypt failure terminates the stream with an error item
//! (never a clean end), after any earlier in-window chunks that already
//! made it out. Remaining windows are not started. The stream is finite
//! and not restartable; retry means calling `open` again.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::future::join_all;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, info};

use svault_core::{ChunkRecord, FileRecord, VaultError, VaultResult};
use svault_crypto::{decrypt_chunk, FileKey};

use crate::refresh::refresh_chunks;
use crate::transport::SinkTransport;
use crate::vault::Vault;

/// An open download: file metadata plus the ordered plaintext stream.
#[derive(Debug)]
pub struct DownloadStream {
    file: FileRecord,
    rx: ReceiverStream<VaultResult<Bytes>>,
}

impl DownloadStream {
    pub fn file(&self) -> &FileRecord {
        &self.file
    }

    /// `Content-Length` for the response: the recorded plaintext size.
    pub fn content_length(&self) -> u64 {
        self.file.size_bytes
    }

    /// `Content-Type` for the response.
    pub fn content_type(&self) -> &str {
        self.file.media_type_or_default()
    }

    /// Drain the whole stream into memory. An error mid-stream surfaces
    /// as the error of the call — bytes already received are discarded.
    pub async fn read_to_end(mut self) -> VaultResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.file.size_bytes as usize);
        while let Some(item) = self.rx.next().await {
            out.extend_from_slice(&item?);
        }
        Ok(out)
    }
}

impl Stream for DownloadStream {
    type Item = VaultResult<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

pub(crate) async fn open(vault: &Vault, uuid: &str) -> VaultResult<DownloadStream> {
    let file = vault
        .store
        .get_file_by_uuid(uuid)
        .await?
        .ok_or_else(|| VaultError::NotFound(format!("file {uuid}")))?;

    let mut chunks = vault.store.list_chunks_by_file_id(file.id).await?;
    if chunks.is_empty() {
        // An existing file with zero chunks is a data-integrity gap, not
        // an empty successful download.
        return Err(VaultError::NotFound(format!("file {uuid} has no chunks")));
    }
    chunks.sort_by_key(|chunk| chunk.index);

    // An unwrap failure aborts before any bytes are emitted.
    let file_key = svault_crypto::unwrap_key(&vault.master_key, &file.key_envelope)?;

    let refreshed = refresh_chunks(
        &vault.transport,
        &vault.store,
        &vault.config.refresh,
        &mut chunks,
    )
    .await?;
    debug!(uuid, chunks = chunks.len(), refreshed, "download ready");

    let window = vault.config.download.window.max(1);
    let (tx, rx) = mpsc::channel(window);
    tokio::spawn(stream_windows(
        vault.transport.clone(),
        file_key,
        chunks,
        window,
        tx,
    ));

    info!(uuid, name = %file.name, bytes = file.size_bytes, "download started");
    Ok(DownloadStream {
        file,
        rx: ReceiverStream::new(rx),
    })
}

async fn stream_windows(
    transport: Arc<dyn SinkTransport>,
    file_key: FileKey,
    chunks: Vec<ChunkRecord>,
    window: usize,
    tx: mpsc::Sender<VaultResult<Bytes>>,
) {
    for window_chunks in chunks.chunks(window) {
        let fetches = window_chunks.iter().map(|chunk| {
            let transport = &transport;
            let file_key = &file_key;
            async move { fetch_and_decrypt(transport.as_ref(), file_key, chunk).await }
        });

        // Fetch/decrypt completes in any order inside the window; the
        // results come back in index order and are emitted that way.
        let results = join_all(fetches).await;

        for result in results {
            match result {
                Ok(plaintext) => {
                    // Consumer gone: stop producing, let in-flight work die
                    if tx.send(Ok(plaintext)).await.is_err() {
                        return;
                    }
                }
                Err(err) => {
                    // Earlier in-window chunks already emitted stand; the
                    // error item is the terminator, remaining windows never
                    // start.
                    let _ = tx.send(Err(err)).await;
                    return;
                }
            }
        }
    }
    // Dropping tx ends the stream cleanly; errors always terminate via
    // the branch above, so a clean end means completion.
}

async fn fetch_and_decrypt(
    transport: &dyn SinkTransport,
    file_key: &FileKey,
    chunk: &ChunkRecord,
) -> VaultResult<Bytes> {
    let payload = transport.fetch_chunk(&chunk.url).await.map_err(|err| {
        VaultError::Other(
            anyhow::Error::from(err)
                .context(format!("retrieving chunk {} ({})", chunk.index, chunk.url)),
        )
    })?;

    let iv = chunk.iv_bytes()?;
    let plaintext = decrypt_chunk(file_key, &payload, &iv).map_err(|err| match err {
        VaultError::Integrity(message) => VaultError::Integrity(format!(
            "chunk {} from {}: {message}",
            chunk.index, chunk.url
        )),
        other => other,
    })?;

    Ok(Bytes::from(plaintext))
}
