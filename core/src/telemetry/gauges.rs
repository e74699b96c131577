//! telemetry/gauges.rs
//! Live, lock-free gauges for external observers (metrics endpoints, progress
//! bars). The pipeline only stores into them; it never reads them back.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct LiveGauges {
    rows_dispatched: AtomicU64,
    rows_written: AtomicU64,
    input_queue_depth: AtomicUsize,
    output_queue_depth: AtomicUsize,
}

impl LiveGauges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rows_dispatched(&self, rows: u64) {
        self.rows_dispatched.store(rows, Ordering::Relaxed);
    }

    pub fn set_rows_written(&self, rows: u64) {
        self.rows_written.store(rows, Ordering::Relaxed);
    }

    pub fn set_input_queue_depth(&self, depth: usize) {
        self.input_queue_depth.store(depth, Ordering::Relaxed);
    }

    pub fn set_output_queue_depth(&self, depth: usize) {
        self.output_queue_depth.store(depth, Ordering::Relaxed);
    }

    pub fn rows_dispatched(&self) -> u64 {
        self.rows_dispatched.load(Ordering::Relaxed)
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written.load(Ordering::Relaxed)
    }

    pub fn input_queue_depth(&self) -> usize {
        self.input_queue_depth.load(Ordering::Relaxed)
    }

    pub fn output_queue_depth(&self) -> usize {
        self.output_queue_depth.load(Ordering::Relaxed)
    }
}
