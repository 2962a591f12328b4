use thiserror::Error;

use logsleuth_sessions::SessionError;
use logsleuth_source::SourceError;

/// Errors surfaced by a filter run. Lower-layer errors pass through as-is.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
