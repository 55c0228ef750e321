//! Scanner for line-delimited record files (JSONL)
//!
//! Each line, including its terminator, is one atomic unit. Lines are
//! carried as raw bytes, so concatenating units reproduces the source
//! exactly, trailing-newline presence included.

use crate::error::SplitResult;
use crate::format::Unit;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Streaming scanner yielding one raw line at a time
pub struct LineScanner {
    reader: BufReader<File>,
    next_index: u64,
}

impl LineScanner {
    pub fn open(path: &Path) -> SplitResult<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            next_index: 1,
        })
    }

    /// Next line including its terminator, or `None` at end of stream
    pub fn next_unit(&mut self) -> SplitResult<Option<Unit>> {
        let mut bytes = Vec::new();
        let read = self.reader.read_until(b'\n', &mut bytes)?;
        if read == 0 {
            return Ok(None);
        }

        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(Unit { index, bytes }))
    }

    /// Count the remaining lines without keeping their bytes
    pub fn count_remaining(&mut self) -> SplitResult<u64> {
        let mut count = 0;
        while self.next_unit()?.is_some() {
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &[u8]) -> NamedTempFile {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(content).unwrap();
        temp.flush().unwrap();
        temp
    }

    #[test]
    fn test_lines_tile_the_file() {
        let content = b"{\"a\":1}\n{\"a\":2}\n{\"a\":3}\n";
        let temp = write_temp(content);

        let mut scanner = LineScanner::open(temp.path()).unwrap();
        let mut rebuilt = Vec::new();
        let mut count = 0;
        while let Some(unit) = scanner.next_unit().unwrap() {
            count += 1;
            assert_eq!(unit.index, count);
            rebuilt.extend_from_slice(&unit.bytes);
        }

        assert_eq!(count, 3);
        assert_eq!(rebuilt, content);
    }

    #[test]
    fn test_missing_trailing_newline_preserved() {
        let content = b"{\"a\":1}\n{\"a\":2}";
        let temp = write_temp(content);

        let mut scanner = LineScanner::open(temp.path()).unwrap();
        let first = scanner.next_unit().unwrap().unwrap();
        let second = scanner.next_unit().unwrap().unwrap();
        assert!(scanner.next_unit().unwrap().is_none());

        assert_eq!(first.bytes, b"{\"a\":1}\n");
        assert_eq!(second.bytes, b"{\"a\":2}");
    }

    #[test]
    fn test_empty_file_yields_no_units() {
        let temp = write_temp(b"");
        let mut scanner = LineScanner::open(temp.path()).unwrap();
        assert!(scanner.next_unit().unwrap().is_none());
    }

    #[test]
    fn test_count_remaining() {
        let temp = write_temp(b"a\nb\nc\n");
        let mut scanner = LineScanner::open(temp.path()).unwrap();
        assert_eq!(scanner.count_remaining().unwrap(), 3);
    }
}
