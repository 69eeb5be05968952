//! Recovery of games interrupted mid-action.
//!
//! A crash between the pending-action insert and the completing
//! transaction leaves an action row with `is_valid` NULL. Recovery finds
//! those games, classifies what went wrong, marks the stragglers failed,
//! and hands back the state at the last consistent snapshot.

use tracing::{info, instrument, warn};

use crate::db::models::{GameStatus, RecoveryKind};
use crate::db::store::EventStore;
use crate::db::StoreError;
use crate::engine::GameState;

/// Note written onto actions failed by recovery.
pub const RECOVERY_NOTE: &str = "recovered from interruption";

/// Classification of an interrupted game.
#[derive(Debug, Clone)]
pub struct FailureAnalysis {
    /// What kind of failure the store shows.
    pub kind: RecoveryKind,
    /// Turn of the last snapshot consistent with the valid actions.
    pub last_valid_turn: u32,
    /// Ids of action records still pending.
    pub pending_action_ids: Vec<String>,
}

/// Outcome of a successful recovery run.
#[derive(Debug, Clone)]
pub struct RecoveryReport {
    /// The recovered game.
    pub game_id: String,
    /// Failure classification that drove the recovery.
    pub kind: RecoveryKind,
    /// Turn the game was rolled back to.
    pub recovered_turn: u32,
    /// How many pending actions were marked failed.
    pub pending_marked_failed: usize,
    /// The reconstructed state, now safe to run.
    pub state: GameState,
}

/// Detects and repairs interrupted games.
#[derive(Debug, Clone)]
pub struct RecoveryService {
    store: EventStore,
}

impl RecoveryService {
    /// Creates a service over the given store.
    pub fn new(store: EventStore) -> Self {
        Self { store }
    }

    /// Game ids needing recovery: active with at least one pending action.
    #[instrument(skip(self))]
    pub fn find_interrupted(&self) -> Result<Vec<String>, StoreError> {
        self.store.find_interrupted()
    }

    /// Classifies a game's failure without modifying anything.
    #[instrument(skip(self))]
    pub fn analyze(&self, game_id: &str) -> Result<FailureAnalysis, StoreError> {
        let pending = self.store.pending_actions(game_id)?;
        let valid_count = self.store.valid_action_count(game_id)? as u32;
        let latest_snapshot_turn = self
            .store
            .snapshot(game_id, None)?
            .map(|s| *s.turn_number() as u32);

        let kind = if !pending.is_empty() {
            RecoveryKind::IncompleteAction
        } else if latest_snapshot_turn != Some(valid_count) {
            RecoveryKind::TransactionFailure
        } else {
            RecoveryKind::AgentTimeout
        };

        let last_valid_turn = self
            .last_consistent_turn(game_id, valid_count)?
            .unwrap_or(0);

        Ok(FailureAnalysis {
            kind,
            last_valid_turn,
            pending_action_ids: pending.into_iter().map(|a| a.id().clone()).collect(),
        })
    }

    /// Repairs an interrupted game and returns the state to resume from.
    ///
    /// Safe to rerun: a second invocation finds no pending actions and
    /// lands on the same snapshot.
    #[instrument(skip(self))]
    pub fn recover(&self, game_id: &str) -> Result<RecoveryReport, StoreError> {
        if self.store.game(game_id)?.is_none() {
            return Err(StoreError::new(format!("unknown game {game_id}")));
        }

        let analysis = self.analyze(game_id)?;
        let valid_count = self.store.valid_action_count(game_id)? as u32;

        let Some(snapshot_turn) = self.last_consistent_turn(game_id, valid_count)? else {
            warn!(game_id, "No consistent snapshot; marking game failed");
            self.store.transaction(|uow| {
                uow.mark_pending_actions_failed(game_id, RECOVERY_NOTE)?;
                uow.update_game_progress(game_id, GameStatus::Failed, 0, None)?;
                Ok(())
            })?;
            return Err(StoreError::new(format!(
                "no consistent snapshot to recover game {game_id}"
            )));
        };

        let snapshot = self
            .store
            .snapshot(game_id, Some(snapshot_turn))?
            .ok_or_else(|| StoreError::new(format!("snapshot vanished at turn {snapshot_turn}")))?;
        let state = self.store.decode_snapshot(&snapshot)?;

        let marked = self.store.transaction(|uow| {
            let marked = uow.mark_pending_actions_failed(game_id, RECOVERY_NOTE)?;
            uow.update_game_progress(game_id, GameStatus::Active, snapshot_turn, None)?;
            Ok(marked)
        })?;

        info!(
            game_id,
            kind = analysis.kind.to_db_string(),
            recovered_turn = snapshot_turn,
            marked,
            "Game recovered"
        );

        Ok(RecoveryReport {
            game_id: game_id.to_string(),
            kind: analysis.kind,
            recovered_turn: snapshot_turn,
            pending_marked_failed: marked,
            state,
        })
    }

    /// Latest snapshot turn consistent with the accepted actions: the
    /// snapshot at `valid_count` when present, otherwise the newest one
    /// at or below it (turn 0 is always a candidate).
    fn last_consistent_turn(
        &self,
        game_id: &str,
        valid_count: u32,
    ) -> Result<Option<u32>, StoreError> {
        if let Some(s) = self.store.snapshot(game_id, Some(valid_count))? {
            return Ok(Some(*s.turn_number() as u32));
        }
        Ok(self
            .store
            .snapshot_at_or_before(game_id, valid_count)?
            .map(|s| *s.turn_number() as u32))
    }
}
