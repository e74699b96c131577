use thiserror::Error;

use crate::crypto::CryptoError;
use crate::stream::pool::BufferPool;
use crate::telemetry::{Stage, TelemetryCounters};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The transform panicked; the record is lost and the run cannot continue.
    #[error("worker panicked: {0}")]
    Panicked(String),
}

impl WorkerError {
    /// Failures confined to one record (a corrupted envelope). Anything else
    /// (entropy, panics) means the run itself is unsound.
    pub fn is_record_local(&self) -> bool {
        matches!(self, WorkerError::Crypto(CryptoError::AuthenticationFailure))
    }
}

/// One unit handed to the pool: a plaintext record or an envelope, tagged
/// with its source position.
#[derive(Debug)]
pub struct RecordInput {
    pub index: u64,
    pub bytes: Vec<u8>,
}

/// Worker result, still tagged with the source position so the sink can
/// restore order.
#[derive(Debug)]
pub struct RecordOutput {
    pub index: u64,
    pub input_len: usize,
    pub outcome: Result<Vec<u8>, WorkerError>,
}

/// The per-record transform run by the pool (and once by the dispatcher for
/// the first record). Implementations hold only shared, read-only state.
pub trait RecordTransform: Sync {
    /// Consume `input`, return the transformed bytes. Buffers come from and
    /// go back to `pool`.
    fn transform(&self, input: Vec<u8>, pool: &BufferPool) -> Result<Vec<u8>, WorkerError>;

    /// Stage the transform time is booked under.
    fn stage(&self) -> Stage;

    /// Book one successful transform.
    fn count(&self, counters: &mut TelemetryCounters, input_len: usize, output_len: usize);
}
