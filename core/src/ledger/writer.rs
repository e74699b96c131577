use std::io::Write;

use crate::ledger::types::LedgerError;

/// Append-only ledger writer. One entry per envelope, never rewritten.
#[derive(Debug)]
pub struct LedgerWriter<W: Write> {
    inner: W,
    entries: u64,
}

impl<W: Write> LedgerWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, entries: 0 }
    }

    /// Append the decimal length as one text line.
    pub fn append(&mut self, length: usize) -> Result<(), LedgerError> {
        writeln!(self.inner, "{}", length)?;
        self.entries += 1;
        Ok(())
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn flush(&mut self) -> Result<(), LedgerError> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
