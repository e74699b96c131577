use std::io;

use thiserror::Error;

use crate::{
    crypto::CryptoError,
    ledger::LedgerError,
    stream::record_worker::WorkerError,
};

/// Unified pipeline error covering I/O, cipher, ledger, per-record and wiring failures.
/// - `From` impls let `?` compose across layers.
/// - Messages stay stable for logs and the CLI.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Source/destination I/O (open, read, write, sync).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Cipher-level error outside a record context (key provisioning).
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Ledger parse or desynchronisation.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// A record failed its transform.
    #[error("record {index}: {source}")]
    Record { index: u64, source: WorkerError },

    /// Source record longer than the configured bound.
    #[error("record {index} exceeds {limit} bytes")]
    RecordTooLarge { index: u64, limit: usize },

    /// Decrypted record differs from the source record at the same position.
    #[error("decrypted record {index} does not match source")]
    Verification { index: u64 },

    /// Rejected configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Channel closed unexpectedly or a pipeline thread panicked.
    #[error("pipeline error: {0}")]
    Pipeline(String),
}
