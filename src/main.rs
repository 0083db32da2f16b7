//! Review-Sweep main entry point
//!
//! This is the command-line interface for the Review-Sweep ingestion pipeline.

use clap::{Parser, Subcommand};
use review_sweep::config::{load_config_with_hash, Config, MAX_LOOKBACK_DAYS};
use review_sweep::crawler::{plan_targets, run_crawl, CrawlRequest};
use review_sweep::output::{format_run_summary, format_target_plan, load_statistics, print_statistics};
use review_sweep::storage::open_store;
use review_sweep::SweepError;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Review-Sweep: incremental game review ingestion
///
/// Review-Sweep drives a real browser through app-store review feeds, video
/// comments, forums and chat channels, and stores every comment newer than
/// the lookback cutoff in a deduplicated SQLite database.
#[derive(Parser, Debug)]
#[command(name = "review-sweep")]
#[command(version)]
#[command(about = "Incremental multi-source game review ingestion", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "sweep.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl every configured target of a game
    Crawl {
        game_id: String,

        /// Look back this many days instead of the game's configured lookback
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_LOOKBACK_DAYS)))]
        days: Option<u32>,

        /// Only crawl targets matching a source name, alias or URL substring
        #[arg(long)]
        source: Option<String>,
    },

    /// Show how a game's targets are routed without crawling
    Targets {
        game_id: String,

        #[arg(long)]
        source: Option<String>,
    },

    /// Show stored record counts and the last run
    Stats { game_id: Option<String> },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Crawl {
            game_id,
            days,
            source,
        } => {
            let request = CrawlRequest {
                game_id,
                days,
                source_filter: source,
            };
            handle_crawl(&config, &request).await?;
        }
        Command::Targets { game_id, source } => handle_targets(&config, &game_id, source.as_deref())?,
        Command::Stats { game_id } => handle_stats(&config, game_id.as_deref())?,
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("review_sweep=info,warn"),
            1 => EnvFilter::new("review_sweep=debug,info"),
            2 => EnvFilter::new("review_sweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles `targets`: shows the routing of a game's targets
fn handle_targets(
    config: &Config,
    game_id: &str,
    source: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let game = config
        .game(game_id)
        .ok_or_else(|| SweepError::UnknownGame(game_id.to_string()))?;

    println!("{} (last {} days)", game.display_name, game.lookback_days);
    print!("{}", format_target_plan(game_id, &plan_targets(game_id, game, source)));
    Ok(())
}

/// Handles `stats`: shows counts for one game, or every configured game
fn handle_stats(config: &Config, game_id: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);
    let store = open_store(Path::new(&config.output.database_path))?;

    let game_ids: Vec<&str> = match game_id {
        Some(id) => vec![id],
        None => config.games.keys().map(String::as_str).collect(),
    };
    for id in game_ids {
        let stats = load_statistics(&store, id)?;
        print_statistics(&stats);
        println!();
    }
    Ok(())
}

/// Handles the main crawl operation
///
/// Per-target failures are part of a normal run; only a run that could not
/// start is an error.
async fn handle_crawl(config: &Config, request: &CrawlRequest) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(filter) = &request.source_filter {
        tracing::info!("Only crawling sources matching '{}'", filter);
    }

    match run_crawl(config, request).await {
        Ok(summary) => {
            print!("{}", format_run_summary(&summary));
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
