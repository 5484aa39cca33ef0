use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Startup-time key/config problems. Fatal, never per-request.
    #[error("config error: {0}")]
    Config(String),

    /// Auth-tag or size-format violation. Never retried — signals
    /// tampering or corruption, not a transient condition.
    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("no sinks configured")]
    NoSinksConfigured,

    #[error("upload failed at chunk {chunk_index}: {reason}")]
    UploadFailed { chunk_index: usize, reason: String },

    #[error("link refresh failed: {0}")]
    RefreshFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A send that failed after exhausting its in-queue retries.
    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("metadata store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VaultError {
    /// Whether this error may succeed on a plain retry of the same call.
    ///
    /// Integrity and config failures are deterministic functions of their
    /// input and must abort the dependent operation instead.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VaultError::SendFailed(_) | VaultError::RefreshFailed(_) | VaultError::Io(_)
        )
    }
}
