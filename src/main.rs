//! Site-Gleaner main entry point
//!
//! This is the command-line interface for discovering a site's internal pages
//! and extracting their readable text.

use anyhow::Context;
use clap::{Parser, Subcommand};
use site_gleaner::config::{load_config_with_hash, Config};
use site_gleaner::session::{spawn_reaper, SessionId, SystemClock};
use site_gleaner::Coordinator;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Site-Gleaner: internal link discovery and readable-text extraction
///
/// Site-Gleaner crawls a website within depth, page-count and rate limits,
/// collects its internal content pages and extracts clean text from them.
/// Results are printed as JSON.
#[derive(Parser, Debug)]
#[command(name = "site-gleaner")]
#[command(version = "1.0.0")]
#[command(about = "Internal link discovery and readable-text extraction", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover the internal content pages reachable from the given URLs
    Links {
        /// Seed URLs
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,

        /// Reuse a session id instead of generating one
        #[arg(long)]
        session_id: Option<String>,
    },

    /// Extract readable text from the given URLs
    Content {
        /// Page URLs
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,

        /// Also extract same-site content pages linked from these URLs
        #[arg(long)]
        follow_links: bool,

        /// Reuse a session id instead of generating one
        #[arg(long)]
        session_id: Option<String>,

        /// Truncate each text to the configured preview length
        #[arg(long)]
        preview: bool,
    },

    /// Validate the configuration and print the effective values
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load(cli.config.as_ref())?;

    match cli.command {
        Command::CheckConfig => handle_check_config(&config),
        Command::Links { urls, session_id } => {
            let coordinator = Coordinator::new(config)?;
            let services = Services::start(&coordinator);

            let result = coordinator
                .discover_links(
                    &urls,
                    session_id.map(SessionId::from),
                    Some(services.cancel.clone()),
                )
                .await;
            services.shutdown().await;

            print_json(&result?)
        }
        Command::Content {
            urls,
            follow_links,
            session_id,
            preview,
        } => {
            let preview_length = config.extraction.content_preview_length;
            let coordinator = Coordinator::new(config)?;
            let services = Services::start(&coordinator);

            let result = coordinator
                .extract_content(
                    &urls,
                    follow_links,
                    session_id.map(SessionId::from),
                    Some(services.cancel.clone()),
                )
                .await;
            services.shutdown().await;

            let mut report = result?;
            if preview {
                report = report.with_preview(preview_length);
            }
            print_json(&report)
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_gleaner=info,warn"),
            1 => EnvFilter::new("site_gleaner=debug,info"),
            2 => EnvFilter::new("site_gleaner=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Reports go to stdout, so logs stay on stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file, or the defaults when none is given
fn load(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        tracing::info!("No configuration file given, using defaults");
        return Ok(Config::default());
    };

    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);
    Ok(config)
}

/// Background services kept alive while a command runs
struct Services {
    /// Cancelled on Ctrl-C
    cancel: CancellationToken,
    shutdown: CancellationToken,
    reaper: JoinHandle<()>,
    interrupt: JoinHandle<()>,
}

impl Services {
    /// Spawns the session reaper and the Ctrl-C listener
    fn start(coordinator: &Coordinator) -> Self {
        let shutdown = CancellationToken::new();
        let reaper = spawn_reaper(
            Arc::clone(coordinator.sessions()),
            coordinator.config().session.cleanup_interval(),
            Arc::new(SystemClock),
            shutdown.clone(),
        );

        let cancel = CancellationToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, stopping crawl");
                    cancel.cancel();
                }
            })
        };

        Self {
            cancel,
            shutdown,
            reaper,
            interrupt,
        }
    }

    async fn shutdown(self) {
        self.interrupt.abort();
        self.shutdown.cancel();
        if let Err(e) = self.reaper.await {
            tracing::warn!("Session reaper ended abnormally: {}", e);
        }
    }
}

/// Handles `check-config`: prints the effective configuration
fn handle_check_config(config: &Config) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("{}", rendered);
    println!("# Configuration is valid");
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    println!("{}", json);
    Ok(())
}
