use memchr::memmem::Finder;
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::trace;

use crate::errors::{SearchError, SearchResult};

/// Read buffer size; the only per-file allocation that scales with I/O
pub(crate) const BUFFER_CAPACITY: usize = 65536;

/// Incremental line matcher fed with arbitrary byte chunks.
///
/// Chunks may split lines and even the term itself anywhere. A line is
/// counted as soon as any of its bytes (or its terminating `\n`) is seen, so
/// empty lines advance the counter and a trailing newline does not open a
/// phantom last line.
pub struct LineMatcher<'t> {
    finder: Finder<'t>,
    /// Bytes kept from the current line to catch terms split across chunks
    keep: usize,
    carry: Vec<u8>,
    line: usize,
    matched: bool,
    lines: Vec<usize>,
}

impl<'t> LineMatcher<'t> {
    pub fn new(term: &'t str) -> Self {
        let keep = term.len().saturating_sub(1);
        Self {
            finder: Finder::new(term.as_bytes()),
            keep,
            carry: Vec::with_capacity(keep),
            line: 1,
            matched: false,
            lines: Vec::new(),
        }
    }

    /// Consumes the next chunk of the input.
    pub fn feed(&mut self, chunk: &[u8]) {
        let mut rest = chunk;
        while !rest.is_empty() {
            match memchr::memchr(b'\n', rest) {
                Some(pos) => {
                    self.scan_segment(&rest[..pos]);
                    self.end_line();
                    rest = &rest[pos + 1..];
                }
                None => {
                    self.scan_segment(rest);
                    rest = &[];
                }
            }
        }
    }

    /// Returns the matching line numbers, ascending and without duplicates
    pub fn finish(self) -> Vec<usize> {
        self.lines
    }

    fn scan_segment(&mut self, segment: &[u8]) {
        if self.matched {
            return;
        }

        if self.finder.find(segment).is_some() || self.spans_carry(segment) {
            self.matched = true;
            self.lines.push(self.line);
            return;
        }

        self.remember_tail(segment);
    }

    fn spans_carry(&self, segment: &[u8]) -> bool {
        if self.carry.is_empty() {
            return false;
        }
        let head = &segment[..segment.len().min(self.keep)];
        let mut joint = Vec::with_capacity(self.carry.len() + head.len());
        joint.extend_from_slice(&self.carry);
        joint.extend_from_slice(head);
        self.finder.find(&joint).is_some()
    }

    fn remember_tail(&mut self, segment: &[u8]) {
        if self.keep == 0 {
            return;
        }
        if segment.len() >= self.keep {
            self.carry.clear();
            self.carry
                .extend_from_slice(&segment[segment.len() - self.keep..]);
        } else {
            self.carry.extend_from_slice(segment);
            let excess = self.carry.len().saturating_sub(self.keep);
            self.carry.drain(..excess);
        }
    }

    fn end_line(&mut self) {
        self.line += 1;
        self.matched = false;
        self.carry.clear();
    }
}

/// Scans a buffered reader to EOF and returns the lines containing `term`.
///
/// Any read error other than an interrupted call aborts the scan.
pub async fn scan_reader<R>(mut reader: R, term: &str) -> io::Result<Vec<usize>>
where
    R: AsyncBufRead + Unpin,
{
    let mut matcher = LineMatcher::new(term);
    loop {
        let chunk = match reader.fill_buf().await {
            Ok(chunk) => chunk,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if chunk.is_empty() {
            break;
        }
        let len = chunk.len();
        matcher.feed(chunk);
        reader.consume(len);
    }
    Ok(matcher.finish())
}

/// Opens `path` and returns the 1-based numbers of the lines containing `term`.
///
/// The file handle lives inside this future: it is closed when the scan
/// returns, fails, or is dropped mid-read.
pub async fn scan_file(path: &Path, term: &str) -> SearchResult<Vec<usize>> {
    trace!("Scanning file: {}", path.display());

    let file = File::open(path)
        .await
        .map_err(|e| SearchError::from_open(path, e))?;
    let reader = BufReader::with_capacity(BUFFER_CAPACITY, file);

    Ok(scan_reader(reader, term).await?)
}
