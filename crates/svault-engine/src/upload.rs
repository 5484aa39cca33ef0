//! Upload orchestrator.
//!
//! One logical worker per upload, fanning out to at most
//! `upload.window` concurrently in-flight chunk sends — the gate bounds
//! both the encrypted buffers held in memory and simultaneous outbound
//! requests, independent of sink count. Chunk `i` goes to sink
//! `i mod N`; each sink's queue serializes its own sends.

use bytes::Bytes;
use futures::future::try_join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use svault_core::{NewChunk, NewFile, VaultError, VaultResult};
use svault_crypto::encrypt_chunk;

use crate::link::parse_link_expiry;
use crate::queue::SendTask;
use crate::vault::Vault;

/// Progress callback type (chunks_done, chunks_total)
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Upload a whole file: failure anywhere aborts the file (chunks already
/// at sinks are orphaned, nothing is persisted) and the caller restarts.
pub(crate) async fn upload_file(
    vault: &Vault,
    data: Bytes,
    name: &str,
    media_type: Option<String>,
    progress: Option<&ProgressFn>,
) -> VaultResult<svault_core::FileRecord> {
    if vault.queues.is_empty() {
        return Err(VaultError::NoSinksConfigured);
    }

    let file_key = svault_crypto::generate_file_key();
    let key_envelope = svault_crypto::wrap_key(&vault.master_key, &file_key)?;

    let chunk_size = vault.config.upload.chunk_size;
    let chunks = svault_chunks::split(&data, chunk_size);
    let total = chunks.len();
    debug!(name, size = data.len(), chunks = total, "starting upload");

    let gate = Semaphore::new(vault.config.upload.window.max(1));
    let done = std::sync::atomic::AtomicU64::new(0);

    let sends = chunks.iter().enumerate().map(|(index, chunk)| {
        let file_key = &file_key;
        let gate = &gate;
        let done = &done;
        async move {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| VaultError::SendFailed("upload gate closed".into()))?;

            // Encrypt inside the gate: the ciphertext buffer lives only
            // while this chunk is in flight.
            let (ciphertext, iv) = encrypt_chunk(file_key, chunk)?;
            let payload = Bytes::from(ciphertext);

            let queue = &vault.queues[index % vault.queues.len()];
            let transport = vault.transport.clone();
            let sink_url = queue.sink_url().to_string();
            let task: SendTask = Box::new(move || {
                let transport = transport.clone();
                let sink_url = sink_url.clone();
                let payload = payload.clone();
                Box::pin(async move { transport.send_chunk(&sink_url, payload).await })
            });

            let url = queue.enqueue(task).await.map_err(|e| VaultError::UploadFailed {
                chunk_index: index,
                reason: e.to_string(),
            })?;
            drop(permit);

            if let Some(callback) = progress {
                let completed = done.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                callback(completed, total as u64);
            }
            Ok::<(usize, String, [u8; 12]), VaultError>((index, url, iv))
        }
    });

    // Resolved in input order regardless of completion order, so chunk
    // rows come out with contiguous indices 0..n.
    let uploaded = try_join_all(sends).await?;

    let chunk_rows: Vec<NewChunk> = uploaded
        .into_iter()
        .map(|(index, url, iv)| {
            let expires_at = parse_link_expiry(&url).unwrap_or(0);
            NewChunk::new(index as u32, iv, url, expires_at)
        })
        .collect();

    let file = NewFile {
        uuid: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        media_type,
        size_bytes: data.len() as u64,
        key_envelope,
    };

    // Persistence failure reports the upload failed; already-sent chunks
    // stay orphaned at their sinks, no distributed rollback.
    let record = vault.store.insert_file_with_chunks(file, chunk_rows).await?;

    info!(
        uuid = %record.uuid,
        name = %record.name,
        bytes = record.size_bytes,
        chunks = total,
        sinks = vault.queues.len(),
        "uploaded"
    );

    Ok(record)
}
