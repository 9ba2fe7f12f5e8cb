//! Binary entry point for querytrail.
//!
//! This binary provides the CLI interface for the query collector.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use querytrail::config::{CollectorConfig, parse_interval};
use querytrail::observability::{self, LogFormat, LoggingConfig};
use querytrail::{Collector, PgActivitySource, Poller, QueryLog};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Querytrail - capture the distinct queries a PostgreSQL user runs.
#[derive(Parser)]
#[command(name = "querytrail")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format: pretty or json.
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Database host (overrides `PG_HOST`).
    #[arg(long, global = true)]
    host: Option<String>,

    /// Database port (overrides `PG_PORT`).
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Database name (overrides `PG_DB`).
    #[arg(long, global = true)]
    dbname: Option<String>,

    /// Login role (overrides `PG_USER`).
    #[arg(long, global = true)]
    user: Option<String>,

    /// Role whose queries are captured (overrides `TARGET_USR`).
    #[arg(short, long, global = true)]
    target: Option<String>,

    /// Seconds between polls (overrides `POLL_INTERVAL`).
    #[arg(short, long, global = true)]
    interval: Option<f64>,

    /// Query log path (overrides `LOG_FILE`).
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Poll for new queries until interrupted (default).
    Watch {
        /// Run a single poll and exit.
        #[arg(long)]
        once: bool,
    },

    /// Show what the query log already holds.
    Seen {
        /// Print every distinct query, sorted.
        #[arg(long)]
        list: bool,
    },
}

/// Main entry point.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Loaded before anything reads the environment, logging included.
    let dotenv = dotenvy::dotenv();

    let mut logging = LoggingConfig::from_env(cli.verbose);
    if let Some(format) = cli.log_format.as_deref() {
        match LogFormat::parse(format) {
            Some(format) => logging = logging.with_format(format),
            None => {
                eprintln!("Unknown log format '{format}', expected 'pretty' or 'json'");
                return ExitCode::FAILURE;
            },
        }
    }
    if let Err(e) = observability::init(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {},
        Err(e) => tracing::warn!(error = %e, "Ignoring unreadable .env file"),
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let result = run_command(cli, config).await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
async fn run_command(cli: Cli, config: CollectorConfig) -> querytrail::Result<()> {
    match cli.command.unwrap_or(Commands::Watch { once: false }) {
        Commands::Watch { once } => cmd_watch(config, once).await,
        Commands::Seen { list } => cmd_seen(&config, list),
    }
}

/// Loads configuration: file, then environment, then flags.
fn load_config(cli: &Cli) -> querytrail::Result<CollectorConfig> {
    let mut config = match config_path(cli.config.as_deref()) {
        Some(path) => CollectorConfig::load_from_file(&path)?,
        None => CollectorConfig::load_default(),
    };

    config.apply_env()?;

    if let Some(host) = &cli.host {
        config = config.with_host(host);
    }
    if let Some(port) = cli.port {
        config = config.with_port(port);
    }
    if let Some(dbname) = &cli.dbname {
        config = config.with_dbname(dbname);
    }
    if let Some(user) = &cli.user {
        config = config.with_user(user);
    }
    if let Some(target) = &cli.target {
        config = config.with_target_user(target);
    }
    if let Some(secs) = cli.interval {
        config = config.with_poll_interval(parse_interval(secs)?);
    }
    if let Some(log_file) = &cli.log_file {
        config = config.with_log_file(log_file);
    }

    Ok(config)
}

/// Resolves an explicit config path, if any.
fn config_path(flag: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = flag {
        return Some(path.to_path_buf());
    }

    // Environment override for config path
    std::env::var("QUERYTRAIL_CONFIG_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
}

/// Polls until interrupted, or once with `--once`.
async fn cmd_watch(config: CollectorConfig, once: bool) -> querytrail::Result<()> {
    config.validate()?;

    let log = QueryLog::new(&config.log_file);
    let seen = log.load_seen()?;
    tracing::info!(
        "target user={} interval={}s loaded_seen={} log={}",
        config.target_user,
        config.poll_interval.as_secs_f64(),
        seen.len(),
        log.path().display()
    );

    let source = PgActivitySource::connect(&config.database, config.max_query_len).await?;
    let mut collector = Collector::new(Poller::new(source, &config.target_user), log, seen);

    let result = if once {
        collector.tick().await.map(|_| ())
    } else {
        let cancel = CancellationToken::new();
        let signal = spawn_interrupt_handler(cancel.clone());
        let result = collector.run(config.poll_interval, &cancel).await;
        signal.abort();
        result.map(|summary| {
            tracing::info!(
                ticks = summary.ticks,
                captured = summary.captured,
                total_seen = summary.total_seen,
                "stopped"
            );
        })
    };

    // Released on every path, including a failed tick.
    collector.into_source().close().await;
    result
}

/// Cancels `cancel` on the first Ctrl-C.
fn spawn_interrupt_handler(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::debug!("Interrupt received");
                cancel.cancel();
            },
            Err(e) => tracing::warn!(error = %e, "Cannot listen for Ctrl-C"),
        }
    })
}

/// Prints what the query log already holds.
fn cmd_seen(config: &CollectorConfig, list: bool) -> querytrail::Result<()> {
    let log = QueryLog::new(&config.log_file);
    let seen = log.load_seen()?;

    println!("{} distinct queries in {}", seen.len(), log.path().display());
    if list {
        let mut queries: Vec<&str> = seen.iter().map(|q| q.as_str()).collect();
        queries.sort_unstable();
        for query in queries {
            println!("{query}");
        }
    }

    Ok(())
}
