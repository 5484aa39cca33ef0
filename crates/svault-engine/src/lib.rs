//! svault-engine: the chunk distribution and reassembly core
//!
//! Write path: `Vault::upload` → fresh file key (wrapped under the master
//! key) → fixed-size split → per-chunk AES-GCM encrypt → round-robin
//! dispatch across per-sink FIFO queues, bounded by an in-flight window →
//! atomic metadata insert.
//!
//! Read path: `Vault::open` → metadata lookup → key unwrap → link refresh
//! → windowed parallel fetch+decrypt → plaintext emitted strictly in index
//! order as an async byte stream.
//!
//! Long-lived shared state is limited to the metadata store and the
//! per-sink dispatch queues; everything else is per-request.

pub mod download;
mod link;
pub mod queue;
mod refresh;
mod retry;
pub mod transport;
pub mod upload;
mod vault;

pub use download::DownloadStream;
pub use queue::{SendTask, SinkQueue};
pub use transport::{HttpTransport, RateLimit, RefreshedLink, SinkResponse, SinkTransport, TransportError};
pub use upload::ProgressFn;
pub use vault::Vault;
