use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O error: {0}")]
    Io(#[from] io::Error),

    /// Entry is not a plain decimal integer.
    #[error("malformed ledger entry {entry}: {text:?}")]
    Malformed { entry: u64, text: String },

    /// Ciphertext stream ended before the entry's bytes were read.
    #[error("ciphertext truncated at entry {entry}: expected {expected} bytes, got {got}")]
    Truncated { entry: u64, expected: usize, got: usize },

    /// Ledger exhausted but ciphertext bytes remain.
    #[error("unread ciphertext after {entries} ledger entries")]
    TrailingCiphertext { entries: u64 },

    /// Entry exceeds the configured envelope bound.
    #[error("ledger entry {entry} declares {len} bytes, limit is {limit}")]
    EntryTooLarge { entry: u64, len: usize, limit: usize },
}
