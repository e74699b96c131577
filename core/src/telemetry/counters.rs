//! telemetry/counters.rs
//! Mutable counters collected during a run.
//! Converted into an immutable `TelemetrySnapshot` at pipeline end.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

#[derive(Default, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetryCounters {
    pub records_read: u64,
    pub records_transformed: u64,
    pub records_written: u64,
    pub records_failed: u64,
    pub bytes_plaintext: u64,
    pub bytes_envelope: u64,
    pub ledger_entries: u64,
    pub reclaim_passes: u64,
    pub peak_input_queue: usize,
    pub peak_output_queue: usize,
    pub peak_reorder_depth: usize,
    pub peak_resident_bytes: u64,
}

impl TelemetryCounters {
    /// One record sealed by a worker.
    pub fn add_encrypt(&mut self, plaintext_len: usize, envelope_len: usize) {
        self.records_transformed += 1;
        self.bytes_plaintext += plaintext_len as u64;
        self.bytes_envelope += envelope_len as u64;
    }

    /// One record opened by a worker.
    pub fn add_decrypt(&mut self, envelope_len: usize, plaintext_len: usize) {
        self.records_transformed += 1;
        self.bytes_envelope += envelope_len as u64;
        self.bytes_plaintext += plaintext_len as u64;
    }

    pub fn observe_input_queue(&mut self, depth: usize) {
        self.peak_input_queue = self.peak_input_queue.max(depth);
    }

    pub fn observe_output_queue(&mut self, depth: usize) {
        self.peak_output_queue = self.peak_output_queue.max(depth);
    }

    pub fn observe_reorder_depth(&mut self, depth: usize) {
        self.peak_reorder_depth = self.peak_reorder_depth.max(depth);
    }

    pub fn observe_resident(&mut self, bytes: u64) {
        self.peak_resident_bytes = self.peak_resident_bytes.max(bytes);
    }

    // Sums for totals, max for peaks.
    pub fn merge(&mut self, other: &TelemetryCounters) {
        self.records_read += other.records_read;
        self.records_transformed += other.records_transformed;
        self.records_written += other.records_written;
        self.records_failed += other.records_failed;
        self.bytes_plaintext += other.bytes_plaintext;
        self.bytes_envelope += other.bytes_envelope;
        self.ledger_entries += other.ledger_entries;
        self.reclaim_passes += other.reclaim_passes;

        self.observe_input_queue(other.peak_input_queue);
        self.observe_output_queue(other.peak_output_queue);
        self.observe_reorder_depth(other.peak_reorder_depth);
        self.observe_resident(other.peak_resident_bytes);
    }
}

impl AddAssign for TelemetryCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_sums_totals_and_keeps_peaks() {
        let mut a = TelemetryCounters::default();
        a.add_encrypt(6, 46);
        a.observe_input_queue(3);

        let mut b = TelemetryCounters::default();
        b.add_encrypt(10, 50);
        b.observe_input_queue(2);
        b.observe_reorder_depth(5);

        a += b;
        assert_eq!(a.records_transformed, 2);
        assert_eq!(a.bytes_plaintext, 16);
        assert_eq!(a.bytes_envelope, 96);
        assert_eq!(a.peak_input_queue, 3);
        assert_eq!(a.peak_reorder_depth, 5);
    }
}
