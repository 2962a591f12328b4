use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Subcommand;
use colored::Colorize;
use tracing::{info, warn};

use logsleuth_filter::MatchQuery;
use logsleuth_sessions::{
    Category, DebugSession, Module, SessionError, SessionListing, SessionStatus,
};
use logsleuth_source::{exists, purge_lines};

use crate::AppContext;

#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// Start a new debug session and print its id
    Create {
        /// Short description of what is being debugged
        label: String,
    },

    /// List sessions, most recent first
    List {
        /// Only show sessions created within this many days
        #[arg(long)]
        max_age_days: Option<u32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a session record
    Show {
        /// Session ID
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a module/category scoped prefix for a session
    Prefix {
        /// Session ID
        id: String,

        /// UI, API, DB, LAMBDA, AUTH or MISC
        module: String,

        /// STATE, FLOW, ERROR, TIMING, DATA or VALIDATE (default: FLOW)
        category: Option<String>,
    },

    /// Mark a session closed
    Close {
        /// Session ID
        id: String,
    },

    /// Delete one session, or every session older than N days
    Cleanup {
        /// Session ID
        #[arg(conflicts_with = "older_than", required_unless_present = "older_than")]
        id: Option<String>,

        /// Delete sessions created more than this many days ago
        #[arg(long)]
        older_than: Option<u32>,

        /// Also remove the sessions' lines from the log files
        #[arg(long)]
        with_logs: bool,

        /// Log file to purge (default: configured log set)
        #[arg(short, long, requires = "with_logs")]
        file: Option<PathBuf>,
    },
}

pub fn handle_session_command(ctx: &AppContext, action: SessionAction) -> Result<()> {
    let registry = ctx.registry()?;

    match action {
        SessionAction::Create { label } => {
            let session = registry
                .create_session(&label)
                .context("Failed to create session")?;

            println!("{}", session.session_id);
            eprintln!("{}  {}", "Prefix:".dimmed(), session.prefix.bright_cyan());
            eprintln!(
                "{}  {}",
                "Scoped:".dimmed(),
                session.scoped(Module::Api, Category::Flow)
            );
            eprintln!(
                "{}  logsleuth search --session {}",
                "Search:".dimmed(),
                session.session_id
            );
        }
        SessionAction::List { max_age_days, json } => {
            let listing = registry.list_report(max_age_days)?;
            report_corrupt(&listing);

            if json {
                println!("{}", serde_json::to_string_pretty(&listing.sessions)?);
            } else if listing.sessions.is_empty() {
                println!("{}", "No sessions found.".dimmed());
            } else {
                print_sessions_table(&listing.sessions);
            }
        }
        SessionAction::Show { id, json } => {
            let session = registry.resolve(&id)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&session)?);
            } else {
                print_session_detail(&session);
            }
        }
        SessionAction::Prefix {
            id,
            module,
            category,
        } => {
            let module = Module::parse(&module);
            let category = category
                .as_deref()
                .map(Category::parse)
                .unwrap_or_default();
            let prefix = registry.scoped_prefix(&id, module, category)?;
            println!("{}", prefix);
        }
        SessionAction::Close { id } => {
            let session = registry.close_session(&id)?;
            eprintln!("Closed session {}", session.session_id.bright_cyan());
        }
        SessionAction::Cleanup {
            id,
            older_than,
            with_logs,
            file,
        } => {
            let log_paths = match file {
                Some(file) => vec![ctx.resolve(file)],
                None => ctx.config.default_log_paths(&ctx.working_dir),
            };

            match (id, older_than) {
                (Some(id), _) => {
                    if with_logs {
                        match registry.resolve(&id) {
                            Ok(session) => purge_session_logs(&session, &log_paths)?,
                            Err(SessionError::NotFound(_)) => {
                                warn!(session_id = %id, "Session not found, no log lines purged")
                            }
                            Err(e) => return Err(e.into()),
                        }
                    }
                    if registry.delete_session(&id)? {
                        eprintln!("Removed session {}", id);
                    } else {
                        eprintln!("Session {} not found, nothing removed", id);
                    }
                }
                (None, Some(days)) => {
                    let now = Utc::now();
                    if with_logs {
                        for session in registry.expired_sessions_at(days, now)? {
                            purge_session_logs(&session, &log_paths)?;
                        }
                    }
                    let deleted = registry.cleanup_older_than_at(days, now)?;
                    eprintln!("Removed {} session(s)", deleted);
                }
                (None, None) => bail!("Either a session ID or --older-than is required"),
            }
        }
    }

    Ok(())
}

/// Strip every line carrying the session's prefix from each existing log file.
fn purge_session_logs(session: &DebugSession, log_paths: &[PathBuf]) -> Result<()> {
    let query = MatchQuery::for_session(session)
        .include_errors(false)
        .compile()?;

    for path in log_paths {
        if !exists(path) {
            continue;
        }
        let removed = purge_lines(path, |line| query.matches_pattern(line))
            .with_context(|| format!("Failed to purge {}", path.display()))?;
        info!(
            session_id = %session.session_id,
            path = %path.display(),
            removed,
            "Purged session lines"
        );
        eprintln!(
            "Purged {} line(s) for {} from {}",
            removed,
            session.session_id,
            path.display()
        );
    }

    Ok(())
}

fn report_corrupt(listing: &SessionListing) {
    for record in &listing.corrupt {
        eprintln!(
            "{} skipped unreadable session record {}: {}",
            "warning:".yellow(),
            record.path.display(),
            record.reason
        );
    }
}

fn print_sessions_table(sessions: &[DebugSession]) {
    println!(
        "{:<10} {:<18} {:<8} {}",
        "ID".dimmed(),
        "CREATED".dimmed(),
        "STATUS".dimmed(),
        "LABEL".dimmed(),
    );

    for s in sessions {
        let created = s.created_at.format("%Y-%m-%d %H:%M").to_string();
        let status = match s.status {
            SessionStatus::Open => "open".bright_green().to_string(),
            SessionStatus::Closed => "closed".dimmed().to_string(),
        };
        let label = if s.label.chars().count() > 50 {
            format!("{}...", s.label.chars().take(50).collect::<String>())
        } else {
            s.label.clone()
        };

        println!("{:<10} {:<18} {:<8} {}", s.session_id, created, status, label);
    }
}

fn print_session_detail(session: &DebugSession) {
    println!("{}", "=== Debug Session ===".bright_blue().bold());
    println!("{}  {}", "ID:".dimmed(), session.session_id);
    println!("{}  {}", "Label:".dimmed(), session.label);
    println!(
        "{}  {}",
        "Created:".dimmed(),
        session.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("{}  {}", "Prefix:".dimmed(), session.prefix.bright_cyan());
    match session.closed_at {
        Some(closed_at) => println!(
            "{}  {} ({})",
            "Status:".dimmed(),
            session.status,
            closed_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("{}  {}", "Status:".dimmed(), session.status),
    }

    if !session.scoped_prefixes.is_empty() {
        println!();
        println!("{}", "Scoped prefixes:".dimmed());
        for prefix in &session.scoped_prefixes {
            println!("  {}", prefix);
        }
    }
}
