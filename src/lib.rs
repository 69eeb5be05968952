//! Secret AGI core library.
//!
//! A hidden-role social-deduction game for 5-10 AI agents, run
//! end-to-end for controlled experiments. This crate is the game's hard
//! core: the deterministic rules engine, validation-first action
//! processing, and an event-sourced SQLite store with per-turn snapshots
//! and crash recovery. Agents, orchestration, and serving surfaces are
//! external collaborators.
//!
//! # Architecture
//!
//! - **Engine**: pure rule functions and a single-action processor over
//!   an immutable state value
//! - **Store**: append-only persistence of games, snapshots, action
//!   attempts, events, and chat
//! - **Facade**: [`GameEngine`] ties one game's state to the store and
//!   returns player-filtered updates
//!
//! # Example
//!
//! ```no_run
//! use secret_agi::{EventStore, GameConfig, GameEngine, RandomPolicy};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = EventStore::open("secret_agi.db")?;
//! let config = GameConfig {
//!     player_count: 5,
//!     player_ids: (1..=5).map(|i| format!("p{i}")).collect(),
//!     seed: Some(42),
//! };
//! let mut engine = GameEngine::create_game(store, &config)?;
//! let summary = engine.simulate_to_completion(&mut RandomPolicy::seeded(42), 1000)?;
//! println!("winners: {:?}", summary.winners);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod db;
mod engine;
mod settings;

// Crate-level exports - Engine core
pub use engine::{
    apply, check_invariants, evaluate_winners, filtered_state_for, initial_state, next_actor,
    powers_triggered, role_distribution, standard_deck, valid_actions, Action, ActionError,
    ActionKind, Allegiance, Applied, EngineError, ErrorCode, FilteredState, GameConfig,
    GameEngine, GameState, GameStats, GameUpdate, Invariant, Paper, PaperId, Phase, Player,
    PlayerId, PlayerView, Policy, RandomPolicy, Role, SimulationSummary, DECK_SIZE,
    POWER_THRESHOLDS,
};

// Crate-level exports - Engine events
pub use engine::{
    ActionAttempted, ChatMessage, EventKind, GameEnded, GameEvent, PaperPublished,
    PhaseTransition, PowerTriggered, StateChange, VoteCompleted, VoteType,
};

// Crate-level exports - Persistence
pub use db::{
    encode_state, state_checksum, ActionRecord, AgentMetricRecord, ChatMessageRecord,
    EventRecord, EventStore, FailureAnalysis, GameRecord, GameStatus, PlayerRecord,
    RecoveryKind, RecoveryReport, RecoveryService, StateSnapshot, StoreError, TimelineEntry,
    UnitOfWork, RECOVERY_NOTE,
};

// Crate-level exports - Settings
pub use settings::{Settings, DEFAULT_DB_PATH, DEFAULT_MAX_TURNS};
