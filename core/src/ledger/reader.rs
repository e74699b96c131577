use std::io::{BufRead, ErrorKind, Read};

use crate::constants::MAX_ENTRY_DIGITS;
use crate::ledger::types::LedgerError;

/// Sequential ledger consumer.
#[derive(Debug)]
pub struct LedgerReader<R: BufRead> {
    inner: R,
    line: Vec<u8>,
    entries: u64,
}

impl<R: BufRead> LedgerReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, line: Vec::with_capacity(MAX_ENTRY_DIGITS + 1), entries: 0 }
    }

    /// Next envelope length, or `None` at end of ledger.
    ///
    /// At most `MAX_ENTRY_DIGITS + 1` bytes are pulled per entry; a longer
    /// line is `Malformed` without reading the rest of it.
    pub fn read_next(&mut self) -> Result<Option<usize>, LedgerError> {
        self.line.clear();
        let limit = (MAX_ENTRY_DIGITS + 1) as u64;
        let n = (&mut self.inner).take(limit).read_until(b'\n', &mut self.line)?;
        if n == 0 {
            return Ok(None);
        }

        // A final entry without its newline is still a complete entry.
        let terminated = self.line.last() == Some(&b'\n');
        if !terminated && n as u64 == limit {
            return Err(self.malformed(format!("<entry longer than {MAX_ENTRY_DIGITS} digits>")));
        }
        let raw = self.line.strip_suffix(b"\n").unwrap_or(&self.line);
        let text = match std::str::from_utf8(raw) {
            Ok(text) => text,
            Err(_) => return Err(self.malformed("<non-utf8>".into())),
        };
        let len = match parse_entry(text) {
            Some(len) => len,
            None => return Err(self.malformed(text.to_string())),
        };

        self.entries += 1;
        Ok(Some(len))
    }

    /// Entries consumed so far.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    fn malformed(&self, text: String) -> LedgerError {
        LedgerError::Malformed { entry: self.entries, text }
    }
}

// Plain ASCII digits only: no sign, no padding, no CR.
fn parse_entry(text: &str) -> Option<usize> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Reads envelopes out of the raw ciphertext stream, one ledger entry at a time.
///
/// Invariants enforced:
/// - each entry is satisfied by exactly `len` stream bytes (short read → `Truncated`)
/// - after the last entry the stream is exhausted (`TrailingCiphertext` otherwise)
pub struct EnvelopeReader<R: Read, L: BufRead> {
    ciphertext: R,
    ledger: LedgerReader<L>,
    max_envelope_len: usize,
    bytes_consumed: u64,
}

impl<R: Read, L: BufRead> EnvelopeReader<R, L> {
    pub fn new(ciphertext: R, ledger: L, max_envelope_len: usize) -> Self {
        Self {
            ciphertext,
            ledger: LedgerReader::new(ledger),
            max_envelope_len,
            bytes_consumed: 0,
        }
    }

    /// Fill `buf` with the next envelope. Returns `false` once the ledger and
    /// the stream are both exhausted.
    pub fn next_into(&mut self, buf: &mut Vec<u8>) -> Result<bool, LedgerError> {
        let entry = self.ledger.entries();
        let len = match self.ledger.read_next()? {
            Some(len) => len,
            None => {
                let mut probe = [0u8; 1];
                if read_up_to(&mut self.ciphertext, &mut probe)? > 0 {
                    return Err(LedgerError::TrailingCiphertext { entries: entry });
                }
                return Ok(false);
            }
        };

        if len > self.max_envelope_len {
            return Err(LedgerError::EntryTooLarge { entry, len, limit: self.max_envelope_len });
        }

        buf.clear();
        buf.resize(len, 0);
        let got = read_up_to(&mut self.ciphertext, buf)?;
        if got < len {
            buf.clear();
            return Err(LedgerError::Truncated { entry, expected: len, got });
        }

        self.bytes_consumed += len as u64;
        Ok(true)
    }

    pub fn entries(&self) -> u64 {
        self.ledger.entries()
    }

    pub fn bytes_consumed(&self) -> u64 {
        self.bytes_consumed
    }
}

/// Read until `buf` is full or the stream ends; returns bytes read.
fn read_up_to<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize, LedgerError> {
    let mut off = 0;
    while off < buf.len() {
        match r.read(&mut buf[off..]) {
            Ok(0) => break,
            Ok(n) => off += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(off)
}

/// Slice an in-memory ciphertext stream by consecutive ledger lengths.
/// Every byte must be covered exactly once.
pub fn slice_stream<'a>(stream: &'a [u8], lengths: &[usize]) -> Result<Vec<&'a [u8]>, LedgerError> {
    let mut out = Vec::with_capacity(lengths.len());
    let mut rest = stream;
    for (entry, &len) in lengths.iter().enumerate() {
        if rest.len() < len {
            return Err(LedgerError::Truncated { entry: entry as u64, expected: len, got: rest.len() });
        }
        let (head, tail) = rest.split_at(len);
        out.push(head);
        rest = tail;
    }
    if !rest.is_empty() {
        return Err(LedgerError::TrailingCiphertext { entries: lengths.len() as u64 });
    }
    Ok(out)
}
