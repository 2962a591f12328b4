use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use logsleuth_source::LogLine;

lazy_static! {
    /// `[YYYY-MM-DDTHH:MM:SS.sssZ]` at the start of a line opens a new entry.
    static ref ENTRY_START: Regex =
        Regex::new(r"^\[\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z\]").unwrap();
}

/// Whether `line` begins a new log entry.
pub fn is_entry_start(line: &str) -> bool {
    ENTRY_START.is_match(line)
}

/// How a line relates to the entry it is reported with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    /// The timestamped first line.
    Header,
    /// Belongs to the entry by the header rule.
    Continuation,
    /// Trailing line added by context widening; not owned by the entry.
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryLine {
    pub number: usize,
    pub text: String,
    pub kind: LineKind,
}

impl EntryLine {
    fn from_line(line: LogLine, kind: LineKind) -> Self {
        Self {
            number: line.number,
            text: line.text,
            kind,
        }
    }
}

/// A reconstructed log entry: a header plus its continuation lines, followed
/// by any context lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub lines: Vec<EntryLine>,
}

impl LogEntry {
    pub(crate) fn start(header: LogLine) -> Self {
        Self {
            lines: vec![EntryLine::from_line(header, LineKind::Header)],
        }
    }

    pub(crate) fn push(&mut self, line: LogLine, kind: LineKind) {
        self.lines.push(EntryLine::from_line(line, kind));
    }

    pub(crate) fn push_context(&mut self, line: &LogLine) {
        self.lines.push(EntryLine {
            number: line.number,
            text: line.text.clone(),
            kind: LineKind::Context,
        });
    }

    pub fn header(&self) -> &EntryLine {
        &self.lines[0]
    }

    /// Header and continuation lines.
    pub fn owned_lines(&self) -> impl Iterator<Item = &EntryLine> {
        self.lines.iter().filter(|l| l.kind != LineKind::Context)
    }

    pub fn context_lines(&self) -> impl Iterator<Item = &EntryLine> {
        self.lines.iter().filter(|l| l.kind == LineKind::Context)
    }

    /// Owned lines joined with newlines.
    pub fn text(&self) -> String {
        self.owned_lines()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
