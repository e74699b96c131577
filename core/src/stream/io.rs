//! Normalized I/O + record scanning

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Cursor, Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::constants::RECORD_DELIMITER;
use crate::types::StreamError;

/// In-memory destination shared with the caller (tests, embedding).
pub type SharedBuffer = Arc<Mutex<Vec<u8>>>;

/// Canonical input abstraction
pub enum InputSource {
    Reader(Box<dyn Read + Send>),
    File(PathBuf),
    Memory(Vec<u8>),
}

/// Canonical output abstraction
pub enum OutputSink {
    Writer(Box<dyn Write + Send>),
    File(PathBuf),
    Memory(SharedBuffer),
}

/// Normalize input source into a buffered reader
pub fn open_input(src: InputSource) -> Result<Box<dyn BufRead + Send>, StreamError> {
    let reader: Box<dyn BufRead + Send> = match src {
        InputSource::Reader(r) => Box::new(BufReader::new(r)),
        InputSource::File(p) => Box::new(BufReader::new(File::open(p)?)),
        InputSource::Memory(b) => Box::new(Cursor::new(b)),
    };
    Ok(reader)
}

/// Normalize output sink into a writer that knows how to make itself durable.
pub fn open_output(sink: OutputSink) -> Result<OutputWriter, StreamError> {
    Ok(match sink {
        OutputSink::Writer(w) => OutputWriter::Writer(BufWriter::new(w)),
        // Truncate: a run always rewrites its destinations from scratch.
        OutputSink::File(p) => OutputWriter::File(BufWriter::new(File::create(p)?)),
        OutputSink::Memory(buf) => OutputWriter::Memory(SharedBufferWriter { buf }),
    })
}

pub enum OutputWriter {
    Writer(BufWriter<Box<dyn Write + Send>>),
    File(BufWriter<File>),
    Memory(SharedBufferWriter),
}

impl OutputWriter {
    /// Flush buffers; for files also `sync_all` so the data is on disk.
    pub fn sync(&mut self) -> io::Result<()> {
        match self {
            OutputWriter::Writer(w) => w.flush(),
            OutputWriter::File(w) => {
                w.flush()?;
                w.get_ref().sync_all()
            }
            OutputWriter::Memory(w) => w.flush(),
        }
    }
}

impl Write for OutputWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self {
            OutputWriter::Writer(w) => w.write(data),
            OutputWriter::File(w) => w.write(data),
            OutputWriter::Memory(w) => w.write(data),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            OutputWriter::Writer(w) => w.write_all(data),
            OutputWriter::File(w) => w.write_all(data),
            OutputWriter::Memory(w) => w.write_all(data),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputWriter::Writer(w) => w.flush(),
            OutputWriter::File(w) => w.flush(),
            OutputWriter::Memory(w) => w.flush(),
        }
    }
}

pub struct SharedBufferWriter {
    buf: SharedBuffer,
}

impl Write for SharedBufferWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .buf
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "shared output buffer poisoned"))?;
        guard.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ================= Records =================

/// Outcome of scanning one record.
#[derive(Debug, PartialEq, Eq)]
pub enum ScanResult {
    /// `buf` holds one delimiter-terminated record.
    Record,
    /// Source exhausted.
    Eof,
    /// Record exceeds the configured bound; `buf` holds a truncated prefix.
    TooLarge,
}

/// Splits a byte source into newline-terminated records.
///
/// - Record content is opaque; only the delimiter byte is interpreted.
/// - A final record missing its delimiter is terminated with one.
/// - At most `max_record_len` bytes are buffered per record.
pub struct RecordReader<R: BufRead> {
    inner: R,
    max_record_len: usize,
    records: u64,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(inner: R, max_record_len: usize) -> Self {
        Self { inner, max_record_len, records: 0 }
    }

    pub fn read_record_into(&mut self, buf: &mut Vec<u8>) -> io::Result<ScanResult> {
        buf.clear();
        // One extra byte lets a record of exactly `max_record_len` (delimiter
        // included) be told apart from an oversized one.
        let limit = self.max_record_len as u64 + 1;
        let n = (&mut self.inner).take(limit).read_until(RECORD_DELIMITER, buf)?;
        if n == 0 {
            return Ok(ScanResult::Eof);
        }

        if buf.last() != Some(&RECORD_DELIMITER) {
            if n as u64 >= limit {
                return Ok(ScanResult::TooLarge);
            }
            buf.push(RECORD_DELIMITER);
        }
        if buf.len() > self.max_record_len {
            return Ok(ScanResult::TooLarge);
        }

        self.records += 1;
        Ok(ScanResult::Record)
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn max_record_len(&self) -> usize {
        self.max_record_len
    }
}
