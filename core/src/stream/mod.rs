//! stream - parallel, order-preserving record encryption/decryption.
//!
//! Layers, bottom up: record I/O, buffer pool, record workers, ordered sink,
//! pipeline wiring, public API.

pub mod io;
pub mod pool;
pub mod parallelism;
pub mod record_worker;
pub mod reclaim;
pub mod sink;
pub mod pipeline;
pub mod core;

pub use io::{InputSource, OutputSink, SharedBuffer};
pub use parallelism::ParallelismProfile;

pub use self::core::{
    decrypt_records,
    encrypt_records,
    FailurePolicy,
    PipelineConfig,
};
