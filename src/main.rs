//! Secret AGI - simulation and recovery CLI.
//!
//! Thin collaborator surface over the library: run seeded random games,
//! list interrupted games, and recover them. Exits non-zero on invalid
//! configuration, I/O errors, or unrecovered interruption.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use secret_agi::{
    EventStore, GameConfig, GameEngine, RandomPolicy, RecoveryService, Settings,
};

/// Secret AGI - deterministic game engine with event-sourced persistence
#[derive(Parser, Debug)]
#[command(name = "secret_agi")]
#[command(about = "Run and recover Secret AGI games", long_about = None)]
#[command(version)]
struct Cli {
    /// Database path; overrides SECRET_AGI_DB_PATH
    #[arg(long)]
    db_path: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Run one or more random games to completion
    Simulate {
        /// Number of players (5-10)
        #[arg(long, default_value_t = 5)]
        players: usize,

        /// Setup seed; overrides SECRET_AGI_SEED
        #[arg(long)]
        seed: Option<u64>,

        /// How many games to run
        #[arg(long, default_value_t = 1)]
        games: u64,

        /// Turn cap per game; overrides SECRET_AGI_MAX_TURNS
        #[arg(long)]
        max_turns: Option<u32>,
    },

    /// List games interrupted mid-action
    ListInterrupted,

    /// Classify an interrupted game without repairing it
    Analyze {
        /// Game id to analyze
        game_id: String,
    },

    /// Recover an interrupted game to its last consistent snapshot
    Recover {
        /// Game id to recover
        game_id: String,
    },
}

fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();
    let db_path = cli.db_path.unwrap_or_else(|| settings.db_path.clone());
    let store = EventStore::open(&db_path)?;

    match cli.command {
        Command::Simulate {
            players,
            seed,
            games,
            max_turns,
        } => {
            let seed = seed.or(settings.seed);
            let max_turns = max_turns.unwrap_or(settings.max_turns);
            for run in 0..games {
                let run_seed = seed.map(|s| s + run);
                let config = GameConfig {
                    player_count: players,
                    player_ids: (1..=players).map(|i| format!("player_{i}")).collect(),
                    seed: run_seed,
                };
                let mut engine = GameEngine::create_game(store.clone(), &config)?;
                let mut policy = match run_seed {
                    Some(s) => RandomPolicy::seeded(s),
                    None => RandomPolicy::from_entropy(),
                };
                let summary = engine.simulate_to_completion(&mut policy, max_turns)?;
                info!(
                    game_id = %summary.game_id,
                    completed = summary.completed,
                    turns = summary.turns,
                    "Simulation finished"
                );
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        }
        Command::ListInterrupted => {
            let interrupted = RecoveryService::new(store).find_interrupted()?;
            if interrupted.is_empty() {
                println!("no interrupted games");
            }
            for game_id in interrupted {
                println!("{game_id}");
            }
        }
        Command::Analyze { game_id } => {
            let analysis = RecoveryService::new(store).analyze(&game_id)?;
            println!(
                "game {game_id}: {} (last valid turn {}, {} pending actions)",
                analysis.kind.to_db_string(),
                analysis.last_valid_turn,
                analysis.pending_action_ids.len()
            );
        }
        Command::Recover { game_id } => {
            let (engine, report) = GameEngine::recover(store, &game_id)?;
            println!(
                "recovered game {game_id} to turn {} ({}; {} pending actions failed)",
                report.recovered_turn,
                report.kind.to_db_string(),
                report.pending_marked_failed
            );
            info!(stats = ?engine.stats(), "Recovered game ready");
        }
    }

    Ok(())
}
