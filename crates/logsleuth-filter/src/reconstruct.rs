//! Single-pass entry reconstruction.
//!
//! Lines are grouped into entries by the timestamp header rule. Each entry is
//! accepted when its header matches the query, or when error inclusion is on
//! and any of its lines carries the error marker. Accepted entries are
//! emitted in input order.

use std::collections::VecDeque;
use std::io::BufRead;

use serde::Serialize;
use tracing::{debug, trace};

use logsleuth_source::{LineStream, LogLine};

use crate::entry::{is_entry_start, LineKind, LogEntry};
use crate::query::{CompiledQuery, MatchQuery};
use crate::FilterError;

/// Caps that stop a scan early.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanLimits {
    pub max_lines: Option<usize>,
    pub max_bytes: Option<u64>,
}

impl ScanLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn max_lines(mut self, lines: usize) -> Self {
        self.max_lines = Some(lines);
        self
    }

    pub fn max_bytes(mut self, bytes: u64) -> Self {
        self.max_bytes = Some(bytes);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    Lines,
    Bytes,
}

/// Attached to a result when a cap was hit; the result covers only the
/// lines read before the cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Truncation {
    pub lines_read: usize,
    pub bytes_read: u64,
    pub limit: LimitKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterResult {
    pub entries: Vec<LogEntry>,
    /// Number of accepted entries.
    pub total_matches: usize,
    pub lines_scanned: usize,
    pub truncated: Option<Truncation>,
}

impl FilterResult {
    pub(crate) fn empty() -> Self {
        Self {
            entries: Vec::new(),
            total_matches: 0,
            lines_scanned: 0,
            truncated: None,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountResult {
    pub total_matches: usize,
    pub lines_scanned: usize,
    pub truncated: Option<Truncation>,
}

/// Reconstruct and return every matching entry in `source`.
pub fn filter<R: BufRead>(
    source: LineStream<R>,
    query: &MatchQuery,
) -> Result<FilterResult, FilterError> {
    filter_with_limits(source, query, ScanLimits::unlimited())
}

/// [`filter`] with line/byte caps.
pub fn filter_with_limits<R: BufRead>(
    source: LineStream<R>,
    query: &MatchQuery,
    limits: ScanLimits,
) -> Result<FilterResult, FilterError> {
    let compiled = query.compile()?;
    filter_compiled(source, &compiled, limits)
}

/// Count matching entries without retaining their lines.
pub fn count_matches<R: BufRead>(
    source: LineStream<R>,
    query: &MatchQuery,
    limits: ScanLimits,
) -> Result<CountResult, FilterError> {
    let compiled = query.compile()?;
    count_compiled(source, &compiled, limits)
}

pub(crate) fn filter_compiled<R: BufRead>(
    source: LineStream<R>,
    query: &CompiledQuery,
    limits: ScanLimits,
) -> Result<FilterResult, FilterError> {
    let outcome = scan(source, query, limits, Vec::new(), true)?;
    Ok(FilterResult {
        total_matches: outcome.accepted,
        entries: outcome.sink,
        lines_scanned: outcome.lines_read,
        truncated: outcome.truncated,
    })
}

pub(crate) fn count_compiled<R: BufRead>(
    source: LineStream<R>,
    query: &CompiledQuery,
    limits: ScanLimits,
) -> Result<CountResult, FilterError> {
    let outcome = scan(source, query, limits, Discard, false)?;
    Ok(CountResult {
        total_matches: outcome.accepted,
        lines_scanned: outcome.lines_read,
        truncated: outcome.truncated,
    })
}

trait EntrySink {
    fn accept(&mut self, entry: LogEntry);
}

impl EntrySink for Vec<LogEntry> {
    fn accept(&mut self, entry: LogEntry) {
        self.push(entry);
    }
}

struct Discard;

impl EntrySink for Discard {
    fn accept(&mut self, _entry: LogEntry) {}
}

struct ScanOutcome<S> {
    sink: S,
    accepted: usize,
    lines_read: usize,
    truncated: Option<Truncation>,
}

fn scan<R: BufRead, S: EntrySink>(
    source: LineStream<R>,
    query: &CompiledQuery,
    limits: ScanLimits,
    sink: S,
    keep_lines: bool,
) -> Result<ScanOutcome<S>, FilterError> {
    let mut rebuilder = Reconstructor::new(query, sink, keep_lines);
    let mut lines_read = 0usize;
    let mut bytes_read = 0u64;
    let mut truncated = None;

    for line in source {
        let line = line?;

        let over_lines = limits.max_lines.is_some_and(|max| lines_read >= max);
        let over_bytes = limits
            .max_bytes
            .is_some_and(|max| bytes_read + line.bytes as u64 > max);
        if over_lines || over_bytes {
            truncated = Some(Truncation {
                lines_read,
                bytes_read,
                limit: if over_lines {
                    LimitKind::Lines
                } else {
                    LimitKind::Bytes
                },
            });
            debug!(lines_read, bytes_read, "Scan cap reached, stopping early");
            break;
        }

        lines_read += 1;
        bytes_read += line.bytes as u64;
        rebuilder.push(line);
    }

    let (sink, accepted) = rebuilder.finish();
    debug!(lines_read, accepted, "Scan complete");

    Ok(ScanOutcome {
        sink,
        accepted,
        lines_read,
        truncated,
    })
}

/// The entry state machine.
struct Reconstructor<'q, S> {
    query: &'q CompiledQuery,
    sink: S,
    keep_lines: bool,
    current: Option<LogEntry>,
    current_matches: bool,
    /// Accepted entries still collecting context lines, oldest first.
    pending: VecDeque<(LogEntry, usize)>,
    accepted: usize,
}

impl<'q, S: EntrySink> Reconstructor<'q, S> {
    fn new(query: &'q CompiledQuery, sink: S, keep_lines: bool) -> Self {
        Self {
            query,
            sink,
            keep_lines,
            current: None,
            current_matches: false,
            pending: VecDeque::new(),
            accepted: 0,
        }
    }

    fn push(&mut self, line: LogLine) {
        let header = is_entry_start(&line.text);
        if header {
            self.finish_current();
        }
        self.feed_context(&line);

        if header {
            self.current_matches = self.query.header_matches(&line.text);
            self.current = Some(LogEntry::start(line));
        } else if let Some(entry) = self.current.as_mut() {
            if self.query.flags_error(&line.text) {
                self.current_matches = true;
            }
            if self.keep_lines {
                entry.push(line, LineKind::Continuation);
            }
        } else {
            trace!(line = line.number, "Dropping line before first entry");
        }
    }

    fn feed_context(&mut self, line: &LogLine) {
        if self.pending.is_empty() {
            return;
        }
        for (entry, remaining) in self.pending.iter_mut() {
            if *remaining > 0 {
                entry.push_context(line);
                *remaining -= 1;
            }
        }
        while matches!(self.pending.front(), Some((_, 0))) {
            if let Some((entry, _)) = self.pending.pop_front() {
                self.sink.accept(entry);
            }
        }
    }

    fn finish_current(&mut self) {
        let matched = std::mem::take(&mut self.current_matches);
        let Some(entry) = self.current.take() else {
            return;
        };
        if !matched {
            return;
        }

        self.accepted += 1;
        let context = self.query.context_lines_after();
        if context > 0 && self.keep_lines {
            self.pending.push_back((entry, context));
        } else {
            self.sink.accept(entry);
        }
    }

    fn finish(mut self) -> (S, usize) {
        self.finish_current();
        while let Some((entry, _)) = self.pending.pop_front() {
            self.sink.accept(entry);
        }
        (self.sink, self.accepted)
    }
}
