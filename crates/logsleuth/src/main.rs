mod clipboard;
mod config;
mod search;
mod sessions;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing::debug;

use logsleuth_logging::{init_tracing, level_for_verbosity, LogFormat};
use logsleuth_sessions::SessionRegistry;

use config::ProjectConfig;
use search::SearchArgs;
use sessions::SessionAction;

#[derive(Parser, Debug)]
#[command(
    name = "logsleuth",
    about = "Session-scoped log search for debugging",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Working directory (default: current directory)
    #[arg(short = 'C', long = "dir", global = true)]
    working_dir: Option<PathBuf>,

    /// Session registry directory
    #[arg(long, global = true)]
    sessions_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatChoice,

    /// Increase diagnostic verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Also write diagnostics to this file as JSON
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find log entries matching a prefix, pattern or session
    Search(SearchArgs),

    /// Manage debug sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

/// Resolved invocation settings shared by every command.
pub struct AppContext {
    pub working_dir: PathBuf,
    pub config: ProjectConfig,
    sessions_dir: Option<PathBuf>,
}

impl AppContext {
    /// Session registry, honoring `--sessions-dir` then the config file.
    pub fn registry(&self) -> Result<SessionRegistry> {
        let dir = self
            .sessions_dir
            .clone()
            .map(|p| self.resolve(p))
            .or_else(|| self.config.sessions_dir(&self.working_dir));

        match dir {
            Some(dir) => Ok(SessionRegistry::with_dir(dir)),
            None => SessionRegistry::new().context("Failed to locate session registry"),
        }
    }

    pub fn resolve(&self, path: PathBuf) -> PathBuf {
        config::resolve(&self.working_dir, path)
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".bright_red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let _guard = init_tracing(
        level_for_verbosity(cli.verbose),
        cli.log_format.into(),
        cli.log_file.as_deref(),
    )
    .context("Failed to initialize logging")?;

    let working_dir = match cli.working_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let config = ProjectConfig::load(&working_dir)?.unwrap_or_default();
    debug!(working_dir = %working_dir.display(), ?config, "Loaded configuration");

    let ctx = AppContext {
        working_dir,
        config,
        sessions_dir: cli.sessions_dir,
    };

    match cli.command {
        Commands::Search(args) => search::handle_search_command(&ctx, args),
        Commands::Session { action } => sessions::handle_session_command(&ctx, action),
    }
}
