//! Shared test fixtures: an in-process sink provider and vault builders.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use svault_core::config::VaultConfig;
use svault_core::{now_millis, VaultError, VaultResult};
use svault_crypto::MasterKey;
use svault_engine::{
    RateLimit, RefreshedLink, SinkResponse, SinkTransport, TransportError, Vault,
};
use svault_store::{MemoryStore, MetadataStore};

#[derive(Debug, Clone)]
pub struct SendRecord {
    pub sink_url: String,
    pub url: String,
}

#[derive(Default)]
struct MockState {
    /// blob id → stored ciphertext
    blobs: HashMap<u64, Bytes>,
    sends: Vec<SendRecord>,
    refresh_batches: Vec<Vec<String>>,
    /// blob ids the refresh endpoint pretends not to know
    omit_from_refresh: HashSet<u64>,
    fail_all_sends: bool,
    fail_refresh: bool,
}

/// A fake sink provider: stores blobs in memory, mints links with an `ex`
/// expiry, refreshes them, and can inject failures.
pub struct MockTransport {
    state: Mutex<MockState>,
    next_id: AtomicU64,
    /// TTL applied to links minted at send time
    pub initial_link_ttl: Duration,
    /// TTL applied to links minted by the refresh endpoint
    pub refreshed_link_ttl: Duration,
    /// Stagger fetches so in-window completion order differs from index order
    pub staggered_fetches: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::default(),
            next_id: AtomicU64::new(1),
            initial_link_ttl: Duration::from_secs(24 * 3600),
            refreshed_link_ttl: Duration::from_secs(24 * 3600),
            staggered_fetches: false,
        }
    }

    fn link_for(&self, blob_id: u64, ttl: Duration) -> String {
        let expires_secs = now_millis() / 1000 + ttl.as_secs();
        format!("https://cdn.example/blob/{blob_id}?ex={expires_secs:x}")
    }

    fn blob_id(url: &str) -> Option<u64> {
        let path = url.strip_prefix("https://cdn.example/blob/")?;
        let id = path.split('?').next()?;
        id.parse().ok()
    }

    pub fn sends(&self) -> Vec<SendRecord> {
        self.state.lock().unwrap().sends.clone()
    }

    pub fn refresh_batches(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().refresh_batches.clone()
    }

    pub fn refresh_call_count(&self) -> usize {
        self.state.lock().unwrap().refresh_batches.len()
    }

    pub fn set_fail_all_sends(&self, fail: bool) {
        self.state.lock().unwrap().fail_all_sends = fail;
    }

    pub fn set_fail_refresh(&self, fail: bool) {
        self.state.lock().unwrap().fail_refresh = fail;
    }

    pub fn omit_from_refresh(&self, url: &str) {
        let id = Self::blob_id(url).expect("mock url");
        self.state.lock().unwrap().omit_from_refresh.insert(id);
    }

    /// Flip one bit of a stored blob's ciphertext.
    pub fn corrupt_blob(&self, url: &str) {
        let id = Self::blob_id(url).expect("mock url");
        let mut state = self.state.lock().unwrap();
        let blob = state.blobs.get_mut(&id).expect("blob exists");
        let mut bytes = blob.to_vec();
        bytes[0] ^= 0x01;
        *blob = Bytes::from(bytes);
    }

    /// Drop a stored blob entirely, so fetching its link fails.
    pub fn drop_blob(&self, url: &str) {
        let id = Self::blob_id(url).expect("mock url");
        self.state.lock().unwrap().blobs.remove(&id);
    }
}

#[async_trait]
impl SinkTransport for MockTransport {
    async fn send_chunk(
        &self,
        sink_url: &str,
        payload: Bytes,
    ) -> Result<SinkResponse, TransportError> {
        if self.state.lock().unwrap().fail_all_sends {
            return Err(TransportError::Failed("injected send failure".into()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let url = self.link_for(id, self.initial_link_ttl);

        let mut state = self.state.lock().unwrap();
        state.blobs.insert(id, payload);
        state.sends.push(SendRecord {
            sink_url: sink_url.to_string(),
            url: url.clone(),
        });

        Ok(SinkResponse {
            url,
            rate_limit: RateLimit::default(),
        })
    }

    async fn fetch_chunk(&self, url: &str) -> VaultResult<Bytes> {
        let id = Self::blob_id(url)
            .ok_or_else(|| VaultError::Other(anyhow::anyhow!("unknown url: {url}")))?;

        if self.staggered_fetches {
            // Later blobs finish first, so index order != completion order
            let delay = 50u64.saturating_sub((id % 8) * 6);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let blob = self.state.lock().unwrap().blobs.get(&id).cloned();
        blob.ok_or_else(|| VaultError::Other(anyhow::anyhow!("blob gone: {url}")))
    }

    async fn refresh_links(&self, urls: &[String]) -> VaultResult<Vec<RefreshedLink>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_refresh {
            return Err(VaultError::RefreshFailed("injected refresh failure".into()));
        }
        state.refresh_batches.push(urls.to_vec());

        let mut refreshed = Vec::new();
        for url in urls {
            let Some(id) = Self::blob_id(url) else { continue };
            if state.omit_from_refresh.contains(&id) {
                continue;
            }
            refreshed.push(RefreshedLink {
                original: url.clone(),
                refreshed: self.link_for(id, self.refreshed_link_ttl),
            });
        }
        Ok(refreshed)
    }
}

pub fn test_master_key() -> MasterKey {
    MasterKey::from_bytes([7u8; 32])
}

pub fn test_config(sink_count: usize, chunk_size: usize) -> VaultConfig {
    let mut config = VaultConfig::default();
    config.sinks = (0..sink_count)
        .map(|i| format!("https://sink.example/hook/{i}"))
        .collect();
    config.upload.chunk_size = chunk_size;
    config.refresh.endpoint = "https://provider.example/refresh".into();
    config
}

pub struct TestVault {
    pub vault: Vault,
    pub transport: Arc<MockTransport>,
    pub store: Arc<MemoryStore>,
}

pub fn build_vault(config: VaultConfig, transport: MockTransport) -> TestVault {
    let transport = Arc::new(transport);
    let store = Arc::new(MemoryStore::new());
    let vault = Vault::new(
        config,
        test_master_key(),
        store.clone() as Arc<dyn MetadataStore>,
        transport.clone() as Arc<dyn SinkTransport>,
    )
    .expect("vault construction");
    TestVault {
        vault,
        transport,
        store,
    }
}

pub fn deterministic_bytes(len: usize) -> Bytes {
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    Bytes::from(data)
}
