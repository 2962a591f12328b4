use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use logsleuth_sessions::SessionRegistry;
use logsleuth_source::{open, LineStream, SourceError};

use crate::query::MatchQuery;
use crate::reconstruct::{count_compiled, filter_compiled, CountResult, FilterResult, ScanLimits};
use crate::FilterError;

/// What to do when a log file in the search set does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingFiles {
    /// Propagate [`SourceError::NotFound`]. Use for explicitly named files.
    Fail,
    /// Log and continue. Use for a list of default locations.
    Skip,
}

/// Result for one file of a multi-file search.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub path: PathBuf,
    pub result: FilterResult,
}

/// Filter every file in `paths`, in order. The pattern is compiled once,
/// before any file is opened.
pub fn search_files(
    paths: &[PathBuf],
    query: &MatchQuery,
    limits: ScanLimits,
    missing: MissingFiles,
) -> Result<Vec<FileResult>, FilterError> {
    let compiled = query.compile()?;
    let mut results = Vec::with_capacity(paths.len());

    for path in paths {
        let Some(stream) = open_or_skip(path, missing)? else {
            continue;
        };
        let result = filter_compiled(stream, &compiled, limits)?;
        debug!(path = %path.display(), matches = result.total_matches, "Searched log file");
        results.push(FileResult {
            path: path.clone(),
            result,
        });
    }

    Ok(results)
}

/// Count matches across `paths` without retaining entries.
pub fn count_files(
    paths: &[PathBuf],
    query: &MatchQuery,
    limits: ScanLimits,
    missing: MissingFiles,
) -> Result<Vec<(PathBuf, CountResult)>, FilterError> {
    let compiled = query.compile()?;
    let mut results = Vec::with_capacity(paths.len());

    for path in paths {
        let Some(stream) = open_or_skip(path, missing)? else {
            continue;
        };
        results.push((path.clone(), count_compiled(stream, &compiled, limits)?));
    }

    Ok(results)
}

/// Build the query for a registered session.
pub fn query_for_session(
    registry: &SessionRegistry,
    session_id: &str,
) -> Result<MatchQuery, FilterError> {
    let session = registry.resolve(session_id)?;
    Ok(MatchQuery::for_session(&session))
}

/// Merge per-file results into one, preserving file order.
pub fn merge_results(results: Vec<FileResult>) -> FilterResult {
    results
        .into_iter()
        .fold(FilterResult::empty(), |mut acc, file| {
            acc.total_matches += file.result.total_matches;
            acc.lines_scanned += file.result.lines_scanned;
            acc.entries.extend(file.result.entries);
            if acc.truncated.is_none() {
                acc.truncated = file.result.truncated;
            }
            acc
        })
}

fn open_or_skip(
    path: &Path,
    missing: MissingFiles,
) -> Result<Option<LineStream<BufReader<File>>>, FilterError> {
    match open(path) {
        Ok(stream) => Ok(Some(stream)),
        Err(SourceError::NotFound { .. }) if missing == MissingFiles::Skip => {
            warn!(path = %path.display(), "Log file not found, skipping");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
