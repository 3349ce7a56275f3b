//! Main entry point for the Card Ladder rating tool
//!
//! Loads the JSON data file, runs one command against it through the rating
//! service and writes the data file back when the command changed it.

use anyhow::{Context, Result};
use card_ladder::config::AppConfig;
use card_ladder::stats::RatingKind;
use card_ladder::{InMemoryGameStore, RatingService, RawRanking};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Card Ladder - Elo, OpenSkill and WHR ratings for card game sessions
#[derive(Parser)]
#[command(
    name = "card-ladder",
    version,
    about = "Rate players of multiplayer card game sessions",
    long_about = "Card Ladder records finishing orders of card game sessions and keeps three \
                 ratings per player: multiplayer Elo, OpenSkill (Weng-Lin) and Whole-History \
                 Rating. Players who rejoin a session are rated by their average position."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Data file override
    #[arg(long, value_name = "FILE", help = "Override the JSON data file path")]
    data: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (compute but do not save)
    #[arg(long, help = "Run the command without writing the data file")]
    dry_run: bool,

    /// Print results as JSON
    #[arg(long, help = "Print results as JSON instead of text")]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a new player
    AddPlayer {
        /// Display name; the player id is derived from it
        name: String,
    },
    /// Rate and record one game from a JSON file
    Submit {
        /// File with `rankings` and an optional `played_at`
        file: PathBuf,
    },
    /// Recompute all ratings from the complete history
    Recompute,
    /// Show players ordered by a rating
    Leaderboard {
        #[arg(long, default_value_t = RatingKind::OpenSkill)]
        by: RatingKind,
    },
    /// Show statistics and rating history of one player
    Player { id: String },
    /// Show the head-to-head record of every pair of players
    HeadToHead,
}

/// Game submission file
#[derive(Debug, Serialize, Deserialize)]
struct GameFile {
    /// Defaults to the current time
    #[serde(default)]
    played_at: Option<DateTime<Utc>>,
    rankings: Vec<RawRanking>,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    // Start with environment-based config
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(data) = &args.data {
        config.storage.data_path = data.clone();
    }

    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_game_file(path: &Path) -> Result<GameFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read game file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse game file {}", path.display()))
}

/// Run one command; returns whether the data file needs saving
async fn run(args: &Args, service: &RatingService) -> Result<bool> {
    match &args.command {
        Command::AddPlayer { name } => {
            let player = service.register_player(name).await?;
            if args.json {
                print_json(&player)?;
            } else {
                println!("Added {} ({})", player.name, player.id);
            }
            Ok(true)
        }
        Command::Submit { file } => {
            let game = read_game_file(file)?;
            let played_at = game.played_at.unwrap_or_else(Utc::now);

            let submission = if args.dry_run {
                service.preview_game(played_at, &game.rankings).await?
            } else {
                service.submit_game(played_at, &game.rankings).await?
            };

            if args.json {
                print_json(&submission)?;
            } else {
                println!("Game {} ({} seats)", submission.game.id, submission.game.total_players);
                for result in &submission.results {
                    println!(
                        "  {:>4}  {:<20} elo {:>6} ({:+})  os {:>6} ({:+})",
                        result.normalized_position,
                        result.player_id,
                        result.elo_after,
                        result.elo_change,
                        result.os_after,
                        result.os_change
                    );
                }
            }
            Ok(true)
        }
        Command::Recompute => {
            let report = if args.dry_run {
                service.preview_recompute().await?.report
            } else {
                service.recompute_all().await?
            };

            if !report.complete {
                warn!("Recomputation incomplete");
            }
            if args.json {
                print_json(&report)?;
            } else {
                println!("Games rated:   {}", report.games_processed);
                println!("Games skipped: {}", report.skipped_games.len());
                println!("Games failed:  {}", report.failed_games.len());
                for failure in &report.failed_games {
                    println!("  {}: {}", failure.game_id, failure.reason);
                }
                match report.whr_iterations {
                    Some(iterations) => println!("WHR converged after {} sweeps", iterations),
                    None => println!("WHR did not converge; WHR ratings unchanged"),
                }
            }
            Ok(true)
        }
        Command::Leaderboard { by } => {
            let board = service.leaderboard(*by).await?;
            if args.json {
                print_json(&board)?;
            } else {
                println!("Leaderboard by {}", by);
                for entry in &board {
                    println!(
                        "{:>3}. {:<20} {:>7} ({} games)",
                        entry.rank, entry.name, entry.rating, entry.games_played
                    );
                }
            }
            Ok(false)
        }
        Command::Player { id } => {
            let profile = service.player_profile(id).await?;
            if args.json {
                print_json(&profile)?;
            } else {
                let player = &profile.player;
                println!("{} ({})", player.name, player.id);
                println!(
                    "  Elo {}  OpenSkill {}  WHR {}",
                    player.elo, player.os_ordinal, player.whr_rating
                );
                println!(
                    "  Games {}  Wins {}  Ties {}  Win rate {:.0}%",
                    profile.games_played,
                    profile.wins,
                    profile.ties,
                    profile.win_rate * 100.0
                );
                if let (Some(average), Some(best)) = (profile.average_position, profile.best_finish)
                {
                    println!("  Avg position {:.1}  Best finish {}", average, best);
                }
                for point in &profile.history {
                    println!(
                        "  {}  pos {:<4} elo {:>6}  os {:>6}  whr {:>6}",
                        point.played_at.format("%Y-%m-%d %H:%M"),
                        point.normalized_position,
                        point.elo,
                        point.openskill,
                        point.whr
                    );
                }
            }
            Ok(false)
        }
        Command::HeadToHead => {
            let h2h = service.head_to_head().await?;
            if args.json {
                print_json(&h2h)?;
            } else {
                for (player, record) in &h2h.summary {
                    println!(
                        "{:<20} {}W {}L {}T",
                        player, record.wins, record.losses, record.ties
                    );
                    for (opponent, cell) in &h2h.matrix[player] {
                        if cell.games() > 0 {
                            println!(
                                "    vs {:<16} {}W {}L {}T",
                                opponent, cell.wins, cell.losses, cell.ties
                            );
                        }
                    }
                }
            }
            Ok(false)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration (CLI args can override environment/config file)
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    let data_path = config.storage.data_path.clone();
    info!("Using data file {}", data_path.display());

    let store = Arc::new(InMemoryGameStore::load_json(&data_path)?);
    let service = RatingService::new(store.clone(), config.rating.clone())?;

    match run(&args, &service).await {
        Ok(changed) => {
            if changed && !args.dry_run {
                store.save_json(&data_path, config.storage.pretty_json)?;
                info!("Saved {}", data_path.display());
            } else if changed {
                info!("Dry run, {} not written", data_path.display());
            }
            Ok(())
        }
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
