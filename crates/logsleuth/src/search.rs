use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::{debug, warn};

use logsleuth_filter::{
    count_files, merge_results, query_for_session, search_files, FilterResult, LimitKind,
    LineKind, MatchQuery, MissingFiles, ScanLimits, Truncation,
};

use crate::clipboard::{ClipboardSink, SystemClipboard};
use crate::AppContext;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Prefix or pattern to search for
    pattern: Option<String>,

    /// Search for a registered session's prefix instead of a pattern
    #[arg(short, long, conflicts_with = "pattern")]
    session: Option<String>,

    /// Log file to search (default: configured log set)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Trailing lines to show after each matching entry
    #[arg(short = 'A', long, default_value_t = 0)]
    context: usize,

    /// Print only the number of matching entries
    #[arg(long)]
    count: bool,

    /// Ignore case when matching
    #[arg(short = 'i', long)]
    case_insensitive: bool,

    /// Treat the pattern as a regular expression
    #[arg(short = 'E', long)]
    regex: bool,

    /// Do not include [ERROR] entries that miss the pattern
    #[arg(long)]
    no_errors: bool,

    /// Do not copy results to the clipboard
    #[arg(long)]
    no_clipboard: bool,

    /// Stop scanning each file after this many lines
    #[arg(long)]
    max_lines: Option<usize>,

    /// Stop scanning each file after this many bytes
    #[arg(long)]
    max_bytes: Option<u64>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,
}

pub fn handle_search_command(ctx: &AppContext, args: SearchArgs) -> Result<()> {
    let query = build_query(ctx, &args)?;
    let limits = build_limits(ctx, &args);

    let (paths, missing) = match &args.file {
        Some(file) => (vec![ctx.resolve(file.clone())], MissingFiles::Fail),
        None => (
            ctx.config.default_log_paths(&ctx.working_dir),
            MissingFiles::Skip,
        ),
    };
    debug!(files = paths.len(), ?limits, "Starting search");

    if args.count {
        let (total, truncations) = count_total(&paths, &query, limits, missing)?;
        println!("{}", total);
        eprintln!("Total matches: {}", total);
        for warning in &truncations {
            eprintln!("{}", warning.yellow());
        }
        return Ok(());
    }

    let per_file = search_files(&paths, &query, limits, missing)?;
    warn_if_nothing_searched(&paths, per_file.len());

    let truncations: Vec<String> = per_file
        .iter()
        .filter_map(|f| {
            f.result
                .truncated
                .as_ref()
                .map(|t| truncation_warning(&f.path, t))
        })
        .collect();

    if args.json {
        let json = serde_json::to_string_pretty(&per_file)?;
        println!("{}", json);
        print_summary(&merge_results(per_file), &truncations);
        return Ok(());
    }

    let merged = merge_results(per_file);
    let rendered = render_entries(&merged);
    if !rendered.is_empty() {
        println!("{}", rendered);
    }
    print_summary(&merged, &truncations);

    if !args.no_clipboard && ctx.config.clipboard_enabled() && !rendered.is_empty() {
        copy_to_clipboard(&SystemClipboard, &rendered);
    }

    Ok(())
}

/// Matches across `paths` plus a warning for each truncated file.
fn count_total(
    paths: &[PathBuf],
    query: &MatchQuery,
    limits: ScanLimits,
    missing: MissingFiles,
) -> Result<(usize, Vec<String>)> {
    let counts = count_files(paths, query, limits, missing)?;
    warn_if_nothing_searched(paths, counts.len());

    let total = counts.iter().map(|(_, c)| c.total_matches).sum();
    let truncations = counts
        .iter()
        .filter_map(|(path, c)| c.truncated.as_ref().map(|t| truncation_warning(path, t)))
        .collect();
    Ok((total, truncations))
}

fn build_query(ctx: &AppContext, args: &SearchArgs) -> Result<MatchQuery> {
    let query = match (&args.pattern, &args.session) {
        (_, Some(id)) => {
            let registry = ctx.registry()?;
            query_for_session(&registry, id)
                .with_context(|| format!("Failed to resolve session {}", id))?
        }
        (Some(pattern), None) if args.regex => MatchQuery::regex(pattern.clone()),
        (Some(pattern), None) => MatchQuery::literal(pattern.clone()),
        (None, None) => bail!("Either a PATTERN or --session is required"),
    };

    let include_errors = !args.no_errors && ctx.config.include_errors();
    Ok(query
        .case_insensitive(args.case_insensitive)
        .include_errors(include_errors)
        .context(args.context))
}

fn build_limits(ctx: &AppContext, args: &SearchArgs) -> ScanLimits {
    ScanLimits {
        max_lines: args.max_lines.or(ctx.config.max_lines),
        max_bytes: args.max_bytes.or(ctx.config.max_bytes),
    }
}

/// One line per entry line; context lines are marked with `+ `.
pub fn render_entries(result: &FilterResult) -> String {
    let mut out = Vec::new();
    for entry in &result.entries {
        for line in &entry.lines {
            match line.kind {
                LineKind::Context => out.push(format!("+ {}", line.text)),
                LineKind::Header | LineKind::Continuation => out.push(line.text.clone()),
            }
        }
    }
    out.join("\n")
}

fn print_summary(result: &FilterResult, truncations: &[String]) {
    eprintln!("Total matches: {}", result.total_matches);
    for warning in truncations {
        eprintln!("{}", warning.yellow());
    }
}

fn truncation_warning(path: &std::path::Path, truncation: &Truncation) -> String {
    let limit = match truncation.limit {
        LimitKind::Lines => "line",
        LimitKind::Bytes => "byte",
    };
    format!(
        "warning: {} truncated at {} lines / {} bytes ({} limit reached)",
        path.display(),
        truncation.lines_read,
        truncation.bytes_read,
        limit
    )
}

fn warn_if_nothing_searched(paths: &[PathBuf], searched: usize) {
    if searched == 0 && !paths.is_empty() {
        warn!(
            candidates = paths.len(),
            "None of the default log files exist; nothing was searched"
        );
    }
}

fn copy_to_clipboard(sink: &dyn ClipboardSink, text: &str) -> bool {
    match sink.write(text) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Could not copy results to clipboard");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::testing::MemoryClipboard;
    use crate::config::ProjectConfig;
    use clap::Parser;
    use logsleuth_filter::filter;
    use logsleuth_source::LineStream;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[derive(Parser)]
    struct SearchCli {
        #[command(flatten)]
        args: SearchArgs,
    }

    fn parse(argv: &[&str]) -> SearchArgs {
        SearchCli::try_parse_from(std::iter::once("search").chain(argv.iter().copied()))
            .unwrap()
            .args
    }

    fn context(dir: &TempDir) -> AppContext {
        AppContext {
            working_dir: dir.path().to_path_buf(),
            config: ProjectConfig::default(),
            sessions_dir: Some(dir.path().join("sessions")),
        }
    }

    const LOG: &str = "\
[2025-01-15T10:30:00.000Z] [API] [INFO] [DEBUG-AB12] start
  payload: {}
[2025-01-15T10:30:01.000Z] [API] [INFO] unrelated
[2025-01-15T10:30:02.000Z] [API] [INFO] [DEBUG-AB12] done";

    fn run(query: MatchQuery) -> FilterResult {
        let stream = LineStream::from_reader(Cursor::new(LOG.as_bytes().to_vec()));
        filter(stream, &query).unwrap()
    }

    #[test]
    fn test_render_entries() {
        let result = run(MatchQuery::literal("[DEBUG-AB12]"));
        assert_eq!(
            render_entries(&result),
            "[2025-01-15T10:30:00.000Z] [API] [INFO] [DEBUG-AB12] start\n  payload: {}\n\
             [2025-01-15T10:30:02.000Z] [API] [INFO] [DEBUG-AB12] done"
        );
    }

    #[test]
    fn test_render_marks_context_lines() {
        let result = run(MatchQuery::literal("start").context(1));
        assert_eq!(
            render_entries(&result),
            "[2025-01-15T10:30:00.000Z] [API] [INFO] [DEBUG-AB12] start\n  payload: {}\n\
             + [2025-01-15T10:30:01.000Z] [API] [INFO] unrelated"
        );
    }

    #[test]
    fn test_render_empty() {
        let result = run(MatchQuery::literal("nothing here"));
        assert_eq!(render_entries(&result), "");
    }

    #[test]
    fn test_clipboard_failure_is_not_fatal() {
        let sink = MemoryClipboard {
            fail: true,
            ..Default::default()
        };
        assert!(!copy_to_clipboard(&sink, "text"));

        let sink = MemoryClipboard::default();
        assert!(copy_to_clipboard(&sink, "text"));
        assert_eq!(*sink.contents.borrow(), vec!["text".to_string()]);
    }

    #[test]
    fn test_truncation_warning() {
        let warning = truncation_warning(
            std::path::Path::new("app.log"),
            &Truncation {
                lines_read: 10,
                bytes_read: 400,
                limit: LimitKind::Lines,
            },
        );
        assert_eq!(
            warning,
            "warning: app.log truncated at 10 lines / 400 bytes (line limit reached)"
        );
    }

    #[test]
    fn test_count_across_default_set_skips_missing_files() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("consolidated_logs/latest.log");
        fs::create_dir_all(log.parent().unwrap()).unwrap();
        fs::write(&log, LOG).unwrap();
        let ctx = context(&dir);
        let args = parse(&["[DEBUG-AB12]", "--count"]);

        let query = build_query(&ctx, &args).unwrap();
        let paths = vec![log, dir.path().join("missing.log")];
        let (total, truncations) =
            count_total(&paths, &query, build_limits(&ctx, &args), MissingFiles::Skip).unwrap();

        assert_eq!(total, 2);
        assert!(truncations.is_empty());
        handle_search_command(&ctx, args).unwrap();
    }

    #[test]
    fn test_count_reports_truncation() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("app.log");
        fs::write(&log, LOG).unwrap();
        let ctx = context(&dir);
        let args = parse(&["[DEBUG-AB12]", "--count", "--max-lines", "2"]);

        let query = build_query(&ctx, &args).unwrap();
        let (total, truncations) = count_total(
            &[log],
            &query,
            build_limits(&ctx, &args),
            MissingFiles::Fail,
        )
        .unwrap();

        assert_eq!(total, 1);
        assert_eq!(truncations.len(), 1);
        assert!(truncations[0].contains("line limit reached"));
    }

    #[test]
    fn test_count_with_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let args = parse(&["x", "--count", "--file", "nope.log"]);

        assert!(handle_search_command(&ctx, args).is_err());
    }

    #[test]
    fn test_pattern_or_session_is_required() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let args = parse(&["--count"]);

        assert!(build_query(&ctx, &args).is_err());
    }
}
