//! # logsleuth-filter
//!
//! Prefix filtering and multi-line entry reconstruction.
//!
//! Log entries start with a bracketed timestamp
//! (`[2025-01-15T10:30:00.000Z]`). Every following line without one, such as
//! a stack trace or a pretty-printed payload, belongs to the same entry. A
//! scan groups lines into entries in a single forward pass and keeps the
//! entries whose header matches the query.
//!
//! ## Key Types
//!
//! - [`MatchQuery`] - Pattern, case and error-inclusion options
//! - [`LogEntry`] - A reconstructed entry with tagged lines
//! - [`FilterResult`] - Accepted entries, match count and truncation marker
//!
//! ## Usage
//!
//! ```rust,ignore
//! use logsleuth_filter::{filter, MatchQuery};
//!
//! let stream = logsleuth_source::open("consolidated_logs/latest.log")?;
//! let result = filter(stream, &MatchQuery::literal("[DEBUG-AUTH3F9A]"))?;
//! eprintln!("Total matches: {}", result.total_matches);
//! ```

mod entry;
mod error;
mod files;
mod query;
mod reconstruct;

pub use entry::{is_entry_start, EntryLine, LineKind, LogEntry};
pub use error::FilterError;
pub use files::{count_files, merge_results, query_for_session, search_files, FileResult, MissingFiles};
pub use query::{CompiledQuery, MatchQuery, ERROR_MARKER};
pub use reconstruct::{
    count_matches, filter, filter_with_limits, CountResult, FilterResult, LimitKind, ScanLimits,
    Truncation,
};
