#![allow(dead_code)]

use std::io::{self, Read};
use std::sync::{Arc, Mutex};

use linecrypt_core::prelude::*;

pub struct Encrypted {
    pub ciphertext: Vec<u8>,
    pub ledger: Vec<u8>,
    pub snapshot: TelemetrySnapshot,
}

pub fn shared() -> SharedBuffer {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn take(buf: &SharedBuffer) -> Vec<u8> {
    std::mem::take(&mut *buf.lock().unwrap())
}

pub fn config(workers: usize, queue_cap: usize) -> PipelineConfig {
    PipelineConfig::new(ParallelismProfile::new(workers, queue_cap, queue_cap))
}

pub fn encrypt_mem(data: &[u8], key: &SecretKey, config: &PipelineConfig) -> Result<Encrypted, StreamError> {
    let ct = shared();
    let lg = shared();
    let snapshot = encrypt_records(
        InputSource::Memory(data.to_vec()),
        OutputSink::Memory(ct.clone()),
        OutputSink::Memory(lg.clone()),
        key,
        config,
    )?;
    Ok(Encrypted { ciphertext: take(&ct), ledger: take(&lg), snapshot })
}

pub fn decrypt_mem(
    ciphertext: &[u8],
    ledger: &[u8],
    key: &SecretKey,
    config: &PipelineConfig,
    verify: Option<&[u8]>,
) -> Result<(Vec<u8>, TelemetrySnapshot), StreamError> {
    let out = shared();
    let snapshot = decrypt_records(
        InputSource::Memory(ciphertext.to_vec()),
        InputSource::Memory(ledger.to_vec()),
        OutputSink::Memory(out.clone()),
        key,
        config,
        verify.map(|v| InputSource::Memory(v.to_vec())),
    )?;
    Ok((take(&out), snapshot))
}

pub fn ledger_lengths(ledger: &[u8]) -> Vec<usize> {
    std::str::from_utf8(ledger)
        .unwrap()
        .lines()
        .map(|l| l.parse().unwrap())
        .collect()
}

pub fn csv_rows(n: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..n {
        out.extend_from_slice(format!("{i},name-{},{}\n", i % 97, "x".repeat(i % 13)).as_bytes());
    }
    out
}

/// Lazily generated CSV source; never holds more than one row.
pub struct RowGenerator {
    remaining: usize,
    next: usize,
    row: Vec<u8>,
    pos: usize,
}

impl RowGenerator {
    pub fn new(rows: usize) -> Self {
        Self { remaining: rows, next: 0, row: Vec::new(), pos: 0 }
    }
}

impl Read for RowGenerator {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.row.len() {
            if self.remaining == 0 {
                return Ok(0);
            }
            self.row = format!("{},{},payload-{}\n", self.next, self.next * 7, "y".repeat(self.next % 40)).into_bytes();
            self.pos = 0;
            self.next += 1;
            self.remaining -= 1;
        }
        let n = buf.len().min(self.row.len() - self.pos);
        buf[..n].copy_from_slice(&self.row[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
