use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use foursome::config::Config;
use foursome::models::{PlayerId, SeasonId, WeekId};

mod commands;

#[derive(Parser)]
#[command(
    name = "foursome",
    version,
    about = "Weekly golf foursome scheduler that keeps repeat pairings low",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (falls back to FOURSOME_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the SQLite database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true, default_value = "false")]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Import players and weeks from a JSON seed file
    Import {
        /// Seed file with "players" and "weeks" arrays
        input: PathBuf,
    },

    /// Record availability for a week, verifying every write
    Availability {
        /// Week id
        week: WeekId,

        /// Entries as PLAYER=yes|no, e.g. 3=yes 7=no
        #[arg(required = true)]
        entries: Vec<String>,
    },

    /// Generate the first schedule for a week
    Generate {
        /// Week id
        week: WeekId,

        /// Skip the minimum player check
        #[arg(long, default_value = "false")]
        skip_validation: bool,

        /// Replace an existing schedule
        #[arg(long, default_value = "false")]
        allow_existing: bool,
    },

    /// Regenerate a week's schedule with backup and rollback
    Regenerate {
        /// Week id
        week: WeekId,

        /// Discard manual edits, or generate when no schedule exists
        #[arg(long, default_value = "false")]
        force: bool,

        /// Replay manual edits onto the new schedule
        #[arg(long, default_value = "false")]
        preserve_edits: bool,

        /// Only print the impact analysis
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },

    /// Show a week's schedule
    Show {
        /// Week id
        week: WeekId,
    },

    /// Move a player into another foursome
    Move {
        /// Week id
        week: WeekId,

        /// Player id
        player: PlayerId,

        /// Destination foursome id
        to: String,
    },

    /// Remove a player from the schedule
    Remove {
        /// Week id
        week: WeekId,

        /// Player id
        player: PlayerId,
    },

    /// Cross-check a week's schedule against availability
    Check {
        /// Week id
        week: WeekId,
    },

    /// Show pairing statistics for a season
    Metrics {
        /// Season id
        season: SeasonId,

        /// Number of most frequent pairs to list
        #[arg(short, long, default_value = "10")]
        top: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(db) = cli.db.clone() {
        config.storage.sqlite_path = db;
    }
    if let Some(format) = cli.log_format.clone() {
        config.logging.format = format;
    }
    config.validate()?;

    // Initialize tracing/logging
    setup_tracing(&config.logging.format, &config.logging.level, cli.verbose)?;

    tracing::info!(db = %config.storage.sqlite_path.display(), "foursome starting");

    let manager = commands::open_manager(&config)?;
    let json = cli.json;

    match cli.command {
        Commands::Import { input } => {
            tracing::info!(input = %input.display(), "Starting import command");
            commands::import(&manager, &input).await?;
        }

        Commands::Availability { week, entries } => {
            tracing::info!(week, entries = entries.len(), "Starting availability command");
            commands::availability(&manager, week, &entries, json).await?;
        }

        Commands::Generate {
            week,
            skip_validation,
            allow_existing,
        } => {
            tracing::info!(week, skip_validation, allow_existing, "Starting generate command");
            commands::generate(&manager, week, !skip_validation, allow_existing, json).await?;
        }

        Commands::Regenerate {
            week,
            force,
            preserve_edits,
            dry_run,
        } => {
            tracing::info!(week, force, preserve_edits, dry_run, "Starting regenerate command");
            commands::regenerate(&manager, week, force, preserve_edits, dry_run, json).await?;
        }

        Commands::Show { week } => {
            commands::show(&manager, week, json).await?;
        }

        Commands::Move { week, player, to } => {
            tracing::info!(week, player, to = %to, "Starting move command");
            commands::move_player(&manager, week, player, to, json).await?;
        }

        Commands::Remove { week, player } => {
            tracing::info!(week, player, "Starting remove command");
            commands::remove_player(&manager, week, player, json).await?;
        }

        Commands::Check { week } => {
            commands::check(&manager, week, json).await?;
        }

        Commands::Metrics { season, top } => {
            commands::metrics(&manager, season, top, json).await?;
        }
    }

    tracing::info!("foursome completed successfully");
    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("foursome=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("foursome={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}
