//! linecrypt-core
//!
//! Streams newline-delimited records through XChaCha20-Poly1305 with a
//! bounded worker pool, an ordered sink and a length ledger that frames the
//! binary envelope stream. Pure Rust, no async runtime, no FFI.

#![forbid(unsafe_code)]

// Shared and top level
pub mod constants;
pub mod types;

pub mod crypto;
pub mod ledger;
pub mod telemetry;

// Stream layers
pub mod stream;

// -----------------------------------------------------------------------------
// Prelude (Rust users)
// -----------------------------------------------------------------------------
pub mod prelude {
    pub use crate::crypto::{generate_key, Cipher, CryptoError, SecretKey};
    pub use crate::ledger::LedgerError;
    pub use crate::stream::{
        decrypt_records, encrypt_records, FailurePolicy, InputSource, OutputSink, ParallelismProfile,
        PipelineConfig, SharedBuffer,
    };
    pub use crate::telemetry::{LiveGauges, TelemetrySnapshot};
    pub use crate::types::StreamError;
}
