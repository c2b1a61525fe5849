//! rebanho - administrative command line for the church small-group
//! hierarchy and the ELEVE engagement scores.
//!
//! Results are printed to stdout as JSON; diagnostics go to stderr and to a
//! daily log file.

mod commands;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rebanho_core::Config;

// ============================================================================
// Constants
// ============================================================================

/// Prefix of the daily log files
const LOG_FILE_PREFIX: &str = "rebanho.log";

#[derive(Parser, Debug)]
#[command(name = "rebanho", version, about = "Small-group hierarchy and ELEVE administration")]
struct Cli {
    /// Database file (overrides config and REBANHO_DATABASE)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database and write the default config
    Init,
    /// Load a JSON snapshot into the database
    Import { file: PathBuf },
    /// Write the database to a JSON snapshot
    Export { file: PathBuf },
    /// Goals and achieved counts of an area and its sectors and groups
    Dashboard {
        #[arg(long)]
        area: i64,
        /// Reference date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Check that this member may view the area
        #[arg(long = "as")]
        as_member: Option<i64>,
        /// Plain-text table instead of JSON
        #[arg(long)]
        table: bool,
    },
    /// Rank one sector for a month and store the scores
    ScoreMonth {
        #[arg(long)]
        sector: i64,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        /// Rank without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Score every sector and every unaffiliated member for a month
    ScoreAll {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
    },
    /// Annual standings from the stored monthly scores
    Annual {
        #[arg(long)]
        year: i32,
        /// Only the first N positions
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Delete a past year's monthly scores (defaults to last year)
    CleanMonthly { year: Option<i32> },
    /// Register attendance points for a member
    Attendance {
        #[arg(long)]
        member: i64,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        worship: bool,
        #[arg(long)]
        group: bool,
        #[arg(long)]
        service: bool,
    },
    /// Split a group according to a JSON split plan
    SplitGroup {
        #[arg(long)]
        group: i64,
        #[arg(long)]
        plan: PathBuf,
        /// Split moment, e.g. 2025-05-10T19:30:00 (defaults to now)
        #[arg(long)]
        at: Option<NaiveDateTime>,
    },
    /// Close a group and detach its participants
    CloseGroup {
        #[arg(long)]
        group: i64,
    },
    /// Append a goal package to an area
    AddGoals {
        #[arg(long)]
        area: i64,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long, default_value_t = 0)]
        facilitators: u32,
        #[arg(long, default_value_t = 0)]
        hosts: u32,
        #[arg(long, default_value_t = 0)]
        course: u32,
        #[arg(long, default_value_t = 0)]
        retreat: u32,
        #[arg(long, default_value_t = 0)]
        baptisms: u32,
        #[arg(long, default_value_t = 0)]
        splits: u32,
    },
    /// Timeline of a member
    Journey {
        #[arg(long)]
        member: i64,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_dir = log_dir.filter(|dir| std::fs::create_dir_all(dir).is_ok());
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(database) = cli.database {
        config.database_path = Some(database);
    }

    let log_dir = config.log_dir().ok();
    let _guard = init_tracing(log_dir.as_deref());
    info!(command = ?cli.command, "rebanho starting");

    // SQLite calls block; keep them off the async workers.
    let output =
        tokio::task::spawn_blocking(move || commands::run(cli.command, &config)).await??;
    debug!(bytes = output.len(), "Command finished");

    println!("{}", output);
    Ok(())
}
