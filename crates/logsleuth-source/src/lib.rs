//! # logsleuth-source
//!
//! Read-only access to the append-only log files that logsleuth searches.
//!
//! Log files are produced by an external pipeline that appends lines of the
//! form `[TIMESTAMP] [SOURCE] [LEVEL] message`. This crate never writes to
//! them during a scan; it only hands out forward-only line streams.
//!
//! ## Key Types
//!
//! - [`LineStream`] - Lazy iterator over the lines of a log file
//! - [`LogLine`] - A single line with its 1-based ordinal
//! - [`SourceError`] - Typed I/O failures (not found, permission denied, other)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use logsleuth_source::open;
//!
//! for line in open("consolidated_logs/latest.log")? {
//!     let line = line?;
//!     println!("{}: {}", line.number, line.text);
//! }
//! ```
//!
//! [`purge_lines`] is the single exception to the read-only rule. It exists
//! for explicit `--with-logs` cleanup and rewrites the file atomically.

mod error;
mod purge;
mod stream;

pub use error::SourceError;
pub use purge::purge_lines;
pub use stream::{exists, open, read_to_string, LineStream, LogLine};
