//! Length ledger: the side channel that frames the envelope stream.
//!
//! Envelopes are opaque bytes and may contain `\n`, so the ciphertext stream
//! cannot be split by scanning. Each envelope's byte length is appended to a
//! text file (one decimal integer per line) in exact write order; on decrypt
//! the ledger is consumed sequentially and the stream is sliced by it.
//!
//! Responsibilities:
//! - Append entries in lockstep with envelope writes
//! - Parse entries strictly
//! - Detect desynchronisation (short stream, trailing stream)

pub mod types;
pub mod writer;
pub mod reader;

pub use types::LedgerError;
pub use writer::LedgerWriter;
pub use reader::{EnvelopeReader, LedgerReader, slice_stream};
