//! The engine facade: one game, its in-memory state, and its store.
//!
//! The facade exclusively owns the current state. Callers submit actions
//! and get player-filtered updates back; every accepted action is
//! persisted atomically (action completion, snapshot, events, chat, game
//! progress) before the new state becomes authoritative.

use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::{EventStore, GameStatus, RecoveryReport, RecoveryService, StoreError};

use super::actions::{self, Action, ActionError, ErrorCode};
use super::events::{ActionAttempted, EventKind, GameEvent};
use super::policy::Policy;
use super::processor;
use super::rules;
use super::state::GameState;
use super::types::{ActionKind, GameConfig, PlayerId, Role};
use super::view::{self, FilteredState, GameStats, GameUpdate};

/// Errors surfaced by the facade for everything that is not an expected
/// validation failure (those ride inside [`GameUpdate`]).
#[derive(Debug, Display, Error, From)]
pub enum EngineError {
    /// The supplied configuration was rejected.
    #[display("invalid configuration: {_0}")]
    #[from(skip)]
    InvalidConfig(#[error(not(source))] String),
    /// The requested game or snapshot does not exist.
    #[display("not found: {_0}")]
    #[from(skip)]
    NotFound(#[error(not(source))] String),
    /// The persistence layer failed.
    Store(StoreError),
}

/// Result of [`GameEngine::simulate_to_completion`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSummary {
    /// Whether the game reached `GameOver` within the turn cap.
    pub completed: bool,
    /// Winning roles, empty if uncompleted.
    pub winners: Vec<Role>,
    /// Accepted actions at the end of the run.
    pub turns: u32,
    /// Final capability meter.
    pub final_capability: u32,
    /// Final safety meter.
    pub final_safety: u32,
    /// The simulated game.
    pub game_id: String,
}

/// Per-game engine bound to an event store.
#[derive(Debug)]
pub struct GameEngine {
    store: EventStore,
    state: GameState,
    event_cursors: HashMap<PlayerId, usize>,
}

impl GameEngine {
    /// Creates a new game: deals roles, shuffles the deck, persists the
    /// game row, seat assignments, and the turn-0 snapshot atomically.
    #[instrument(skip(store, config), fields(player_count = config.player_count, seed = ?config.seed))]
    pub fn create_game(store: EventStore, config: &GameConfig) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;

        let game_id = Uuid::new_v4().to_string();
        let state =
            rules::initial_state(&game_id, config).map_err(EngineError::InvalidConfig)?;

        let config_json = serde_json::to_string(config).map_err(StoreError::from)?;
        store.transaction(|uow| {
            uow.insert_game(&game_id, config_json.clone())?;
            uow.insert_players(&state)?;
            uow.insert_snapshot(&state)?;
            Ok(())
        })?;

        info!(game_id = %game_id, "Game created");
        Ok(Self {
            store,
            state,
            event_cursors: HashMap::new(),
        })
    }

    /// Reconstructs a game from its snapshot at `turn` (latest when
    /// absent) and makes that the current state.
    #[instrument(skip(store))]
    pub fn load_game(
        store: EventStore,
        game_id: &str,
        turn: Option<u32>,
    ) -> Result<Self, EngineError> {
        if store.game(game_id)?.is_none() {
            return Err(EngineError::NotFound(format!("game {game_id}")));
        }
        let snapshot = store.snapshot(game_id, turn)?.ok_or_else(|| {
            EngineError::NotFound(match turn {
                Some(t) => format!("snapshot for game {game_id} at turn {t}"),
                None => format!("any snapshot for game {game_id}"),
            })
        })?;
        let state = store.decode_snapshot(&snapshot)?;
        info!(game_id, turn = state.turn_number, "Game loaded");
        Ok(Self {
            store,
            state,
            event_cursors: HashMap::new(),
        })
    }

    /// Recovers an interrupted game via the recovery service and returns
    /// an engine bound to the restored state.
    #[instrument(skip(store))]
    pub fn recover(store: EventStore, game_id: &str) -> Result<(Self, RecoveryReport), EngineError> {
        let report = RecoveryService::new(store.clone()).recover(game_id)?;
        let engine = Self {
            store,
            state: report.state.clone(),
            event_cursors: HashMap::new(),
        };
        Ok((engine, report))
    }

    /// The game id.
    pub fn game_id(&self) -> &str {
        &self.state.game_id
    }

    /// The current authoritative state. Debugging and tests only;
    /// players go through [`GameEngine::perform_action`] and the
    /// filtered views.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Public scalar summary of the current state.
    pub fn stats(&self) -> GameStats {
        GameStats::from_state(&self.state)
    }

    /// Whether the game has ended.
    pub fn is_game_over(&self) -> bool {
        self.state.is_game_over
    }

    /// Winning roles, empty while the game runs.
    pub fn winners(&self) -> &[Role] {
        &self.state.winners
    }

    /// Legal next actions for a player.
    pub fn valid_actions(&self, player_id: &str) -> Vec<ActionKind> {
        actions::valid_actions(&self.state, player_id)
    }

    /// The player-filtered view of the current state.
    pub fn filtered_state(&self, player_id: &str) -> Option<FilteredState> {
        view::filtered_state_for(&self.state, player_id)
    }

    /// Submits one action for `actor_id`.
    ///
    /// The attempt is recorded pending before processing; acceptance
    /// commits the completion, the new snapshot, the emitted events, any
    /// chat rows, and the game-row progress in one transaction. A
    /// rejected action records the attempt (with its audit event) and
    /// leaves the state untouched.
    #[instrument(skip(self, action), fields(game_id = %self.state.game_id, actor = actor_id, kind = action.kind().as_str()))]
    pub fn perform_action(
        &mut self,
        actor_id: &str,
        action: Action,
    ) -> Result<GameUpdate, EngineError> {
        let started = Instant::now();
        let candidate_turn = self.state.turn_number + 1;

        let action_id = self.store.begin_action(
            &self.state.game_id,
            candidate_turn,
            actor_id,
            action.kind().as_str(),
            &action.params_json(),
        )?;

        match processor::apply(&self.state, actor_id, &action) {
            Ok(applied) => {
                let elapsed_ms = started.elapsed().as_millis() as i32;
                let committed = self.commit_accepted(&action_id, &applied, elapsed_ms);
                match committed {
                    Ok(()) => {
                        self.state = applied.state;
                        Ok(self.build_update(actor_id, true, None))
                    }
                    Err(err) => {
                        // The pre-action state stays authoritative; the
                        // pending row is left for recovery if even the
                        // failure marking cannot be written.
                        warn!(error = %err, "Commit failed; keeping pre-action state");
                        let _ = self.store.transaction(|uow| {
                            uow.complete_action(
                                &action_id,
                                false,
                                Some("persistence failure"),
                                None,
                            )
                        });
                        Ok(self.build_update(
                            actor_id,
                            false,
                            Some(ActionError::new(
                                ErrorCode::Internal,
                                format!("persistence failure: {err}"),
                            )),
                        ))
                    }
                }
            }
            Err(validation) => {
                let elapsed_ms = started.elapsed().as_millis() as i32;
                let audit = GameEvent::new(
                    EventKind::ActionAttempted(ActionAttempted {
                        kind: action.kind(),
                        params: action.params_json(),
                        valid: false,
                        error: Some(validation.to_string()),
                    }),
                    Some(actor_id.to_string()),
                    candidate_turn,
                );
                let game_id = self.state.game_id.clone();
                self.store.transaction(|uow| {
                    uow.complete_action(
                        &action_id,
                        false,
                        Some(&validation.to_string()),
                        Some(elapsed_ms),
                    )?;
                    uow.insert_events(&game_id, std::slice::from_ref(&audit))
                })?;
                Ok(self.build_update(actor_id, false, Some(validation)))
            }
        }
    }

    fn commit_accepted(
        &self,
        action_id: &str,
        applied: &processor::Applied,
        elapsed_ms: i32,
    ) -> Result<(), StoreError> {
        let state = &applied.state;
        let game_id = state.game_id.clone();
        let status = if state.is_game_over {
            GameStatus::Completed
        } else {
            GameStatus::Active
        };
        let final_outcome = state.is_game_over.then(|| {
            json!({
                "winners": state.winners.iter().map(Role::as_str).collect::<Vec<_>>(),
                "capability": state.capability,
                "safety": state.safety,
                "turns": state.turn_number,
            })
            .to_string()
        });
        let eliminated = applied.events.iter().any(|e| {
            matches!(
                e.kind,
                EventKind::StateChanged(super::events::StateChange::PlayerEliminated { .. })
            )
        });

        self.store.transaction(|uow| {
            uow.complete_action(action_id, true, None, Some(elapsed_ms))?;
            uow.insert_snapshot(state)?;
            uow.insert_events(&game_id, &applied.events)?;
            for event in &applied.events {
                if let EventKind::ChatMessage(chat) = &event.kind {
                    let speaker = event.actor.as_deref().unwrap_or_default();
                    uow.insert_chat(
                        &game_id,
                        event.turn_number,
                        speaker,
                        &chat.message,
                        chat.phase,
                    )?;
                }
            }
            if eliminated {
                uow.sync_player_liveness(state)?;
            }
            uow.update_game_progress(&game_id, status, state.turn_number, final_outcome.clone())?;
            Ok(())
        })
    }

    fn build_update(
        &mut self,
        actor_id: &str,
        success: bool,
        error: Option<ActionError>,
    ) -> GameUpdate {
        let cursor = self.event_cursors.get(actor_id).copied().unwrap_or(0);
        let (events_since_last, new_cursor) = view::events_since(&self.state, actor_id, cursor);
        self.event_cursors.insert(actor_id.to_string(), new_cursor);

        let chat_since_last = events_since_last
            .iter()
            .filter(|e| matches!(e.kind, EventKind::ChatMessage(_)))
            .cloned()
            .collect();

        GameUpdate {
            success,
            error,
            events_since_last,
            state_view: view::filtered_state_for(&self.state, actor_id),
            valid_actions: actions::valid_actions(&self.state, actor_id),
            chat_since_last,
        }
    }

    /// Writes an extra snapshot of the current state and returns its id.
    /// Replaces the stored snapshot for the current turn if one exists.
    #[instrument(skip(self), fields(game_id = %self.state.game_id, turn = self.state.turn_number))]
    pub fn checkpoint(&self) -> Result<String, EngineError> {
        let state = self.state.clone();
        let id = self.store.transaction(|uow| uow.insert_snapshot(&state))?;
        Ok(id)
    }

    /// Drives the game with a policy until `GameOver` or the turn cap.
    ///
    /// The next actor is always the first living seat with a substantive
    /// legal action; the policy picks among those actions using only the
    /// actor's filtered view.
    #[instrument(skip(self, policy), fields(game_id = %self.state.game_id))]
    pub fn simulate_to_completion(
        &mut self,
        policy: &mut dyn Policy,
        turn_cap: u32,
    ) -> Result<SimulationSummary, EngineError> {
        let mut stalls = 0u32;
        while !self.state.is_game_over && self.state.turn_number < turn_cap {
            let Some(actor_id) = processor::next_actor(&self.state) else {
                warn!("No player can act; stopping simulation");
                break;
            };
            let valid = actions::valid_actions(&self.state, &actor_id);
            let chosen = self
                .filtered_state(&actor_id)
                .and_then(|v| policy.choose(&v, &valid));
            let Some(action) = chosen else {
                warn!(actor = %actor_id, "Policy declined to act; stopping simulation");
                break;
            };

            let update = self.perform_action(&actor_id, action)?;
            if update.success {
                stalls = 0;
            } else {
                stalls += 1;
                if stalls >= 25 {
                    warn!("Policy keeps producing invalid actions; stopping simulation");
                    break;
                }
            }
        }

        Ok(SimulationSummary {
            completed: self.state.is_game_over,
            winners: self.state.winners.clone(),
            turns: self.state.turn_number,
            final_capability: self.state.capability,
            final_safety: self.state.safety,
            game_id: self.state.game_id.clone(),
        })
    }
}
