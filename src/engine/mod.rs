//! The deterministic game core: data model, rules, action processing,
//! filtered views, and the per-game facade.

mod actions;
mod events;
mod facade;
mod invariants;
mod policy;
mod processor;
mod rules;
mod state;
mod types;
mod view;

pub use actions::{valid_actions, Action, ActionError, ErrorCode};
pub use events::{
    ActionAttempted, ChatMessage, EventKind, GameEnded, GameEvent, PaperPublished,
    PhaseTransition, PowerTriggered, StateChange, VoteCompleted, VoteType,
};
pub use facade::{EngineError, GameEngine, SimulationSummary};
pub use invariants::{check_all as check_invariants, Invariant};
pub use policy::{Policy, RandomPolicy};
pub use processor::{apply, next_actor, Applied};
pub use rules::{
    evaluate_winners, initial_state, powers_triggered, role_distribution, standard_deck,
    DECK_SIZE, POWER_THRESHOLDS,
};
pub use state::GameState;
pub use types::{
    ActionKind, Allegiance, GameConfig, Paper, PaperId, Phase, Player, PlayerId, Role,
};
pub use view::{filtered_state_for, FilteredState, GameStats, GameUpdate, PlayerView};
