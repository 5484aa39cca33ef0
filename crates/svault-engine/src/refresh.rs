//! Link-expiry refresher.
//!
//! Sink links carry provider-imposed deadlines; this pass swaps every
//! expired or near-expiry link in a batch of chunk records for a fresh
//! one and persists it before returning. Idempotent: freshness is
//! re-evaluated from expiry state on every call, so a fully fresh batch
//! makes zero provider calls.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use svault_core::config::RefreshConfig;
use svault_core::{now_millis, ChunkRecord, VaultError, VaultResult};
use svault_store::MetadataStore;

use crate::link::parse_link_expiry;
use crate::transport::SinkTransport;

/// Refresh stale links in `chunks`, mutating records in place and
/// persisting each successful refresh. Returns how many were refreshed.
///
/// A transport failure fails the whole call with `RefreshFailed`; batches
/// already persisted stay persisted, not-yet-processed records stay
/// untouched, and the caller may simply retry.
pub(crate) async fn refresh_chunks(
    transport: &Arc<dyn SinkTransport>,
    store: &Arc<dyn MetadataStore>,
    config: &RefreshConfig,
    chunks: &mut [ChunkRecord],
) -> VaultResult<usize> {
    // "About to expire" counts as expired, so a link can't lapse between
    // this check and the fetch that follows it.
    let cutoff = now_millis() + config.expiry_buffer_secs * 1000;

    let stale: Vec<usize> = chunks
        .iter()
        .enumerate()
        .filter(|(_, chunk)| chunk.url_expires_at <= cutoff)
        .map(|(position, _)| position)
        .collect();

    if stale.is_empty() {
        return Ok(0);
    }
    debug!(stale = stale.len(), total = chunks.len(), "refreshing links");

    let mut refreshed_count = 0usize;
    for batch in stale.chunks(config.batch_size.max(1)) {
        let urls: Vec<String> = batch.iter().map(|&pos| chunks[pos].url.clone()).collect();

        let refreshed = transport.refresh_links(&urls).await?;
        let by_original: HashMap<String, String> = refreshed
            .into_iter()
            .map(|link| (link.original, link.refreshed))
            .collect();

        for &position in batch {
            let chunk = &mut chunks[position];
            // Match strictly by original URL. A provider response that
            // omits a URL leaves that record stale rather than guessed.
            let Some(fresh_url) = by_original.get(&chunk.url) else {
                warn!(chunk_id = chunk.id, "provider omitted link from refresh response");
                continue;
            };

            let expires_at = parse_link_expiry(fresh_url).ok_or_else(|| {
                VaultError::RefreshFailed(format!(
                    "refreshed link for chunk {} has no parsable expiry",
                    chunk.id
                ))
            })?;

            store
                .update_chunk_link(chunk.id, fresh_url, expires_at)
                .await?;
            chunk.url = fresh_url.clone();
            chunk.url_expires_at = expires_at;
            refreshed_count += 1;
        }
    }

    debug!(refreshed = refreshed_count, "link refresh complete");
    Ok(refreshed_count)
}
