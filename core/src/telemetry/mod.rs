//! telemetry/mod.rs
//! Counters, stage timers, live gauges and immutable snapshots.
//!
//! - Workers keep private counters and merge them at join (no shared atomics
//!   on the hot path).
//! - `LiveGauges` is the only shared state, for observers that poll a run in
//!   progress.

pub mod counters;
pub mod gauges;
pub mod timers;
pub mod snapshot;

pub use counters::*;
pub use gauges::*;
pub use timers::*;
pub use snapshot::*;
