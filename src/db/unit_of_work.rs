//! Unit-of-work: grouped writes for one action, committed atomically.
//!
//! A single accepted action produces several rows (action completion,
//! snapshot, events, chat, game progress). The unit-of-work scopes them
//! to one transaction opened by [`EventStore::transaction`]; if any
//! write fails, SQLite rolls the whole group back and the caller keeps
//! its pre-action in-memory state as authoritative.
//!
//! [`EventStore::transaction`]: crate::db::EventStore::transaction

use diesel::prelude::*;
use tracing::debug;
use uuid::Uuid;

use crate::db::models::{
    GameStatus, NewChatMessageRecord, NewEventRecord, NewGameRecord, NewPlayerRecord,
    NewStateSnapshot,
};
use crate::db::store::{encode_state, now_utc, state_checksum};
use crate::db::{schema, StoreError};
use crate::engine::{GameEvent, GameState, Phase};

/// Write surface available inside one store transaction.
pub struct UnitOfWork<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> UnitOfWork<'a> {
    pub(crate) fn new(conn: &'a mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Inserts the game row.
    pub fn insert_game(&mut self, game_id: &str, config_json: String) -> Result<(), StoreError> {
        let now = now_utc();
        let record = NewGameRecord::new(
            game_id.to_string(),
            now,
            now,
            GameStatus::Active.to_db_string().to_string(),
            config_json,
            0,
            "{}".to_string(),
        );
        diesel::insert_into(schema::games::table)
            .values(&record)
            .execute(self.conn)?;
        Ok(())
    }

    /// Inserts one seat assignment row per player.
    pub fn insert_players(&mut self, state: &GameState) -> Result<(), StoreError> {
        let records: Vec<NewPlayerRecord> = state
            .players
            .iter()
            .map(|p| {
                NewPlayerRecord::new(
                    Uuid::new_v4().to_string(),
                    state.game_id.clone(),
                    p.id.clone(),
                    "external".to_string(),
                    "{}".to_string(),
                    p.role.as_str().to_string(),
                    p.allegiance.as_str().to_string(),
                    p.alive,
                )
            })
            .collect();
        diesel::insert_into(schema::players::table)
            .values(&records)
            .execute(self.conn)?;
        Ok(())
    }

    /// Writes the full-state snapshot for the state's turn number.
    ///
    /// Replaces any existing snapshot with the same `(game_id, turn)`,
    /// which makes checkpointing and replay-branching idempotent.
    pub fn insert_snapshot(&mut self, state: &GameState) -> Result<String, StoreError> {
        let blob = encode_state(state)?;
        let checksum = state_checksum(&blob);
        let snapshot_id = Uuid::new_v4().to_string();
        let record = NewStateSnapshot::new(
            snapshot_id.clone(),
            state.game_id.clone(),
            state.turn_number as i32,
            blob,
            now_utc(),
            checksum,
        );
        diesel::replace_into(schema::game_states::table)
            .values(&record)
            .execute(self.conn)?;
        debug!(turn = state.turn_number, "Snapshot written");
        Ok(snapshot_id)
    }

    /// Appends the events emitted by one action.
    pub fn insert_events(&mut self, game_id: &str, events: &[GameEvent]) -> Result<(), StoreError> {
        if events.is_empty() {
            return Ok(());
        }
        let now = now_utc();
        let records: Result<Vec<NewEventRecord>, StoreError> = events
            .iter()
            .map(|e| {
                Ok(NewEventRecord::new(
                    e.id.clone(),
                    game_id.to_string(),
                    e.turn_number as i32,
                    e.kind.type_str().to_string(),
                    e.actor.clone(),
                    serde_json::to_string(&e.kind)?,
                    now,
                ))
            })
            .collect();
        diesel::insert_into(schema::events::table)
            .values(&records?)
            .execute(self.conn)?;
        Ok(())
    }

    /// Appends one chat row.
    pub fn insert_chat(
        &mut self,
        game_id: &str,
        turn_number: u32,
        speaker_id: &str,
        message: &str,
        phase: Phase,
    ) -> Result<(), StoreError> {
        let record = NewChatMessageRecord::new(
            Uuid::new_v4().to_string(),
            game_id.to_string(),
            turn_number as i32,
            speaker_id.to_string(),
            message.to_string(),
            phase.as_str().to_string(),
            now_utc(),
        );
        diesel::insert_into(schema::chat_messages::table)
            .values(&record)
            .execute(self.conn)?;
        Ok(())
    }

    /// Completes a pending action record with its validity verdict.
    pub fn complete_action(
        &mut self,
        action_id: &str,
        is_valid: bool,
        error: Option<&str>,
        processing_ms: Option<i32>,
    ) -> Result<(), StoreError> {
        use crate::db::schema::actions::dsl;

        diesel::update(dsl::actions.find(action_id))
            .set((
                dsl::is_valid.eq(Some(is_valid)),
                dsl::error.eq(error),
                dsl::processing_ms.eq(processing_ms),
            ))
            .execute(self.conn)?;
        Ok(())
    }

    /// Marks every pending action of a game failed with a recovery note.
    /// Returns how many rows were touched.
    pub fn mark_pending_actions_failed(
        &mut self,
        game_id: &str,
        note: &str,
    ) -> Result<usize, StoreError> {
        use crate::db::schema::actions::dsl;

        let touched = diesel::update(
            dsl::actions
                .filter(dsl::game_id.eq(game_id))
                .filter(dsl::is_valid.is_null()),
        )
        .set((dsl::is_valid.eq(Some(false)), dsl::error.eq(note)))
        .execute(self.conn)?;
        Ok(touched)
    }

    /// Updates the game row's status, cursor, and optional final outcome.
    pub fn update_game_progress(
        &mut self,
        game_id: &str,
        status: GameStatus,
        current_turn: u32,
        final_outcome: Option<String>,
    ) -> Result<(), StoreError> {
        use crate::db::schema::games::dsl;

        diesel::update(dsl::games.find(game_id))
            .set((
                dsl::status.eq(status.to_db_string()),
                dsl::current_turn.eq(current_turn as i32),
                dsl::final_outcome.eq(final_outcome),
                dsl::updated_at.eq(now_utc()),
            ))
            .execute(self.conn)?;
        Ok(())
    }

    /// Mirrors eliminations onto the seat assignment rows.
    pub fn sync_player_liveness(&mut self, state: &GameState) -> Result<(), StoreError> {
        use crate::db::schema::players::dsl;

        for player in &state.players {
            diesel::update(
                dsl::players
                    .filter(dsl::game_id.eq(&state.game_id))
                    .filter(dsl::seat_id.eq(&player.id)),
            )
            .set(dsl::alive.eq(player.alive))
            .execute(self.conn)?;
        }
        Ok(())
    }
}
