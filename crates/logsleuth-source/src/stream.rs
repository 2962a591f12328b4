use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::SourceError;

/// A single line of a log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// 1-based position in the stream.
    pub number: usize,
    /// Line content without the trailing newline.
    pub text: String,
    /// Raw byte length, terminator included.
    pub bytes: usize,
}

/// Lazy, forward-only view over the lines of a log source.
///
/// The stream never buffers more than one line. Reopen the file to restart it.
pub struct LineStream<R> {
    reader: R,
    path: PathBuf,
    next_number: usize,
    bytes_read: u64,
    buf: Vec<u8>,
    done: bool,
}

impl LineStream<BufReader<File>> {
    /// Open a log file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| SourceError::from_io(path, e))?;
        debug!(path = %path.display(), "Opened log file");
        Ok(Self::with_path(BufReader::new(file), path.to_path_buf()))
    }
}

impl<R: BufRead> LineStream<R> {
    /// Wrap an arbitrary reader (in-memory buffers, pipes).
    pub fn from_reader(reader: R) -> Self {
        Self::with_path(reader, PathBuf::from("<reader>"))
    }

    fn with_path(reader: R, path: PathBuf) -> Self {
        Self {
            reader,
            path,
            next_number: 1,
            bytes_read: 0,
            buf: Vec::new(),
            done: false,
        }
    }

    /// Path the stream was opened from (`<reader>` for wrapped readers).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total bytes consumed so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    fn read_next(&mut self) -> Result<Option<LogLine>, SourceError> {
        self.buf.clear();
        let n = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .map_err(|e| SourceError::from_io(&self.path, e))?;
        if n == 0 {
            return Ok(None);
        }
        self.bytes_read += n as u64;

        let mut end = self.buf.len();
        if end > 0 && self.buf[end - 1] == b'\n' {
            end -= 1;
            if end > 0 && self.buf[end - 1] == b'\r' {
                end -= 1;
            }
        }

        let line = LogLine {
            number: self.next_number,
            text: String::from_utf8_lossy(&self.buf[..end]).into_owned(),
            bytes: n,
        };
        self.next_number += 1;
        Ok(Some(line))
    }
}

impl<R: BufRead> Iterator for LineStream<R> {
    type Item = Result<LogLine, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_next() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                // A failed reader is not resumed.
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Open a log file as a [`LineStream`].
pub fn open(path: impl AsRef<Path>) -> Result<LineStream<BufReader<File>>, SourceError> {
    LineStream::open(path)
}

/// Whether `path` names an existing regular file. Never fails.
pub fn exists(path: impl AsRef<Path>) -> bool {
    std::fs::metadata(path.as_ref())
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Read a whole log file into memory.
pub fn read_to_string(path: impl AsRef<Path>) -> Result<String, SourceError> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| SourceError::from_io(path, e))?;
    let mut raw = Vec::new();
    file.read_to_end(&mut raw)
        .map_err(|e| SourceError::from_io(path, e))?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}
