//! Record-boundary scanner for delimited tables (CSV/TSV)
//!
//! The csv crate is used as the boundary oracle: records are parsed to
//! find where each one ends (quoted embedded newlines included), and the
//! exact byte span of every record is then sliced from a second file
//! handle. Concatenating the returned spans reproduces the source
//! byte-for-byte, so parts never re-quote or otherwise canonicalize
//! the data they carry.

use crate::error::{SplitError, SplitResult};
use crate::format::Unit;
use csv::ByteRecord;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Header record of a delimited table: exact bytes plus parsed columns
#[derive(Debug, Clone)]
pub struct HeaderRecord {
    /// Raw header bytes including the record terminator
    pub raw: Vec<u8>,
    /// Parsed column names in header order
    pub columns: Vec<String>,
}

/// Streaming scanner yielding one data row at a time as raw byte spans
pub struct DelimitedScanner {
    reader: csv::Reader<File>,
    raw: File,
    path: PathBuf,
    file_len: u64,
    cursor: u64,
    record: ByteRecord,
    peeked: Option<(u64, u64)>,
    peeked_fields: Option<Vec<String>>,
    eof: bool,
    next_index: u64,
}

impl DelimitedScanner {
    /// Open a scanner over `path` with the given field delimiter
    pub fn open(path: &Path, delimiter: u8) -> SplitResult<Self> {
        let reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;
        let raw = File::open(path)?;
        let file_len = raw.metadata()?.len();

        Ok(Self {
            reader,
            raw,
            path: path.to_path_buf(),
            file_len,
            cursor: 0,
            record: ByteRecord::new(),
            peeked: None,
            peeked_fields: None,
            eof: false,
            next_index: 1,
        })
    }

    /// Read the header record; must be called before the first unit
    ///
    /// For a header-only file the span absorbs any trailing bytes so the
    /// header alone reconstructs the source exactly.
    pub fn read_header(&mut self) -> SplitResult<HeaderRecord> {
        let (span, fields) = match self.next_span()? {
            Some(pair) => pair,
            None => {
                return Err(SplitError::schema_invalid(
                    &self.path,
                    "file is empty, no header record",
                ))
            }
        };

        let raw = self.slice(span)?;
        trace!("Header span: {} bytes, {} columns", raw.len(), fields.len());
        Ok(HeaderRecord { raw, columns: fields })
    }

    /// Next data row as an exact byte span, or `None` at end of stream
    pub fn next_unit(&mut self) -> SplitResult<Option<Unit>> {
        let Some((span, _fields)) = self.next_span()? else {
            return Ok(None);
        };

        let bytes = self.slice(span)?;
        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(Unit { index, bytes }))
    }

    /// Next data row parsed into fields, alongside its raw bytes
    pub fn next_record(&mut self) -> SplitResult<Option<(Unit, Vec<String>)>> {
        let Some((span, fields)) = self.next_span()? else {
            return Ok(None);
        };

        let bytes = self.slice(span)?;
        let index = self.next_index;
        self.next_index += 1;
        Ok(Some((Unit { index, bytes }, fields)))
    }

    /// Count the remaining records without materializing their bytes
    pub fn count_remaining(&mut self) -> SplitResult<u64> {
        let mut count = 0;
        while self.next_span()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Fill the one-record lookahead buffer
    fn fill(&mut self) -> SplitResult<()> {
        if self.peeked.is_none() && !self.eof {
            let start = self.cursor;
            if self.reader.read_byte_record(&mut self.record)? {
                let end = self.reader.position().byte();
                self.cursor = end;
                self.peeked = Some((start, end));
                self.peeked_fields = Some(
                    self.record
                        .iter()
                        .map(|f| String::from_utf8_lossy(f).into_owned())
                        .collect(),
                );
            } else {
                self.eof = true;
            }
        }
        Ok(())
    }

    /// Next record span; the final record absorbs any residual tail bytes
    /// (e.g. trailing blank lines the parser skips) so that spans tile the
    /// whole file
    fn next_span(&mut self) -> SplitResult<Option<((u64, u64), Vec<String>)>> {
        self.fill()?;
        let Some((start, mut end)) = self.peeked.take() else {
            return Ok(None);
        };
        let fields = self.peeked_fields.take().unwrap_or_default();

        self.fill()?;
        if self.eof && self.peeked.is_none() && end < self.file_len {
            end = self.file_len;
        }

        Ok(Some(((start, end), fields)))
    }

    /// Slice `[start, end)` from the raw file handle
    fn slice(&mut self, (start, end): (u64, u64)) -> SplitResult<Vec<u8>> {
        let len = (end - start) as usize;
        let mut bytes = vec![0u8; len];
        self.raw.seek(SeekFrom::Start(start))?;
        self.raw.read_exact(&mut bytes)?;
        Ok(bytes)
    }
}

/// Locate the header length of a written part file
///
/// Used by the merger to drop repeated headers from parts after the first.
pub fn header_span_len(path: &Path, delimiter: u8) -> SplitResult<u64> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut record = ByteRecord::new();
    if reader.read_byte_record(&mut record)? {
        Ok(reader.position().byte())
    } else {
        Ok(0)
    }
}
