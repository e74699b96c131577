/// Record delimiter of the plaintext source.
pub const RECORD_DELIMITER: u8 = b'\n';

/// Defaults when the caller leaves a knob unset.
pub const DEFAULT_WORKERS: usize = 4;
/// Bounded queues stay small (tens of entries); capacity is the backpressure.
pub const DEFAULT_QUEUE_CAP: usize = 10;
/// Rows between reclamation passes in the sink.
pub const DEFAULT_RECLAIM_EVERY_ROWS: u64 = 100_000;
/// Longest accepted record (plaintext bytes, delimiter included).
pub const DEFAULT_MAX_RECORD_LEN: usize = 16 * 1024 * 1024; // 16 MiB

/// Sanity bounds for externally supplied configuration.
pub const MAX_WORKERS: usize = 1024;
pub const MAX_QUEUE_CAP: usize = 4096;
pub const MAX_INFLIGHT: usize = 1 << 20;
/// Upper bound for `max_record_len`; envelope arithmetic stays far from overflow.
pub const MAX_RECORD_LEN: usize = 1 << 30; // 1 GiB

/// Decimal digits of `usize::MAX` on 64-bit targets; longer ledger lines are malformed.
pub const MAX_ENTRY_DIGITS: usize = 20;

/// Buffers kept by the pool between records; larger ones are dropped on release.
pub const POOL_MAX_RETAINED_BUF: usize = 1024 * 1024; // 1 MiB
/// Starting capacity of a freshly allocated pool buffer.
pub const POOL_INITIAL_BUF: usize = 4 * 1024; // 4 KiB
