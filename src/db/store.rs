//! Append-only event store over SQLite.
//!
//! The store owns all durable state: game rows, per-turn snapshots with
//! content digests, action attempts, events, chat, and agent metrics.
//! Reads open their own short-lived connections; grouped writes go
//! through [`EventStore::transaction`] and the unit-of-work.

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::db::models::{
    ActionRecord, ChatMessageRecord, EventRecord, GameRecord, NewAgentMetricRecord,
    PlayerRecord, StateSnapshot,
};
use crate::db::unit_of_work::UnitOfWork;
use crate::db::{schema, StoreError};
use crate::engine::GameState;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Current UTC wall-clock, as stored in every timestamp column.
pub fn now_utc() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Serializes a state to its canonical JSON blob.
pub fn encode_state(state: &GameState) -> Result<String, StoreError> {
    Ok(serde_json::to_string(state)?)
}

/// SHA-256 digest of a state blob, hex-encoded.
pub fn state_checksum(blob: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(blob.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// One entry of a game's merged action/event timeline.
#[derive(Debug, Clone)]
pub enum TimelineEntry {
    /// An action attempt, valid or not.
    Action(ActionRecord),
    /// An emitted event.
    Event(EventRecord),
}

impl TimelineEntry {
    fn sort_key(&self) -> (i32, NaiveDateTime) {
        match self {
            Self::Action(a) => (*a.turn_number(), *a.created_at()),
            Self::Event(e) => (*e.turn_number(), *e.created_at()),
        }
    }
}

/// Repository handle for the SQLite event store.
#[derive(Debug, Clone)]
pub struct EventStore {
    db_path: String,
}

impl EventStore {
    /// Opens (creating if necessary) the store at the given path and
    /// applies any pending migrations.
    ///
    /// Use `":memory:"` for an in-memory database in tests; note that
    /// each connection to `":memory:"` sees its own database, so
    /// file-backed paths are required for anything multi-connection.
    #[instrument(skip(db_path), fields(db_path = %db_path.as_ref()))]
    pub fn open(db_path: impl AsRef<str>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref().to_string();
        info!(path = %db_path, "Opening event store");
        let mut conn = SqliteConnection::establish(&db_path)?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::new(format!("migrations failed: {e}")))?;
        Ok(Self { db_path })
    }

    /// Establishes a database connection.
    fn connection(&self) -> Result<SqliteConnection, StoreError> {
        debug!(path = %self.db_path, "Establishing connection");
        Ok(SqliteConnection::establish(&self.db_path)?)
    }

    /// Runs `f` inside a single immediate transaction. All writes made
    /// through the unit-of-work commit together or not at all.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut UnitOfWork<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.connection()?;
        conn.immediate_transaction(|conn| f(&mut UnitOfWork::new(conn)))
    }

    /// Inserts a pending action record outside any unit-of-work.
    ///
    /// This deliberately commits on its own: a crash between this write
    /// and the action's completing transaction leaves a pending row
    /// behind, which is exactly what recovery looks for.
    #[instrument(skip(self, params))]
    pub fn begin_action(
        &self,
        game_id: &str,
        turn_number: u32,
        actor_id: &str,
        kind: &str,
        params: &serde_json::Value,
    ) -> Result<String, StoreError> {
        use crate::db::schema::actions::dsl::actions;

        let mut conn = self.connection()?;
        let action_id = Uuid::new_v4().to_string();
        let record = crate::db::models::NewActionRecord::new(
            action_id.clone(),
            game_id.to_string(),
            turn_number as i32,
            actor_id.to_string(),
            kind.to_string(),
            params.to_string(),
            now_utc(),
        );
        diesel::insert_into(actions).values(&record).execute(&mut conn)?;
        debug!(action_id = %action_id, "Pending action recorded");
        Ok(action_id)
    }

    /// Loads a game row.
    #[instrument(skip(self))]
    pub fn game(&self, game_id: &str) -> Result<Option<GameRecord>, StoreError> {
        let mut conn = self.connection()?;
        let record = schema::games::table
            .find(game_id)
            .first::<GameRecord>(&mut conn)
            .optional()?;
        Ok(record)
    }

    /// Loads the snapshot at `turn`, or the latest one when `turn` is
    /// `None`.
    #[instrument(skip(self))]
    pub fn snapshot(
        &self,
        game_id: &str,
        turn: Option<u32>,
    ) -> Result<Option<StateSnapshot>, StoreError> {
        use crate::db::schema::game_states::dsl;

        let mut conn = self.connection()?;
        let query = dsl::game_states.filter(dsl::game_id.eq(game_id));
        let snapshot = match turn {
            Some(t) => query
                .filter(dsl::turn_number.eq(t as i32))
                .first::<StateSnapshot>(&mut conn)
                .optional()?,
            None => query
                .order(dsl::turn_number.desc())
                .first::<StateSnapshot>(&mut conn)
                .optional()?,
        };
        Ok(snapshot)
    }

    /// Decodes a snapshot blob back into a state, verifying its digest.
    #[instrument(skip(self, snapshot), fields(game_id = %snapshot.game_id(), turn = *snapshot.turn_number()))]
    pub fn decode_snapshot(&self, snapshot: &StateSnapshot) -> Result<GameState, StoreError> {
        let expected = state_checksum(snapshot.state_blob());
        if &expected != snapshot.checksum() {
            warn!(turn = *snapshot.turn_number(), "Snapshot checksum mismatch");
            return Err(StoreError::new(format!(
                "checksum mismatch for game {} turn {}",
                snapshot.game_id(),
                snapshot.turn_number()
            )));
        }
        Ok(serde_json::from_str(snapshot.state_blob())?)
    }

    /// Loads the latest snapshot at or below `turn`.
    #[instrument(skip(self))]
    pub fn snapshot_at_or_before(
        &self,
        game_id: &str,
        turn: u32,
    ) -> Result<Option<StateSnapshot>, StoreError> {
        use crate::db::schema::game_states::dsl;

        let mut conn = self.connection()?;
        let snapshot = dsl::game_states
            .filter(dsl::game_id.eq(game_id))
            .filter(dsl::turn_number.le(turn as i32))
            .order(dsl::turn_number.desc())
            .first::<StateSnapshot>(&mut conn)
            .optional()?;
        Ok(snapshot)
    }

    /// Counts accepted actions for a game.
    #[instrument(skip(self))]
    pub fn valid_action_count(&self, game_id: &str) -> Result<i64, StoreError> {
        use crate::db::schema::actions::dsl;

        let mut conn = self.connection()?;
        let count = dsl::actions
            .filter(dsl::game_id.eq(game_id))
            .filter(dsl::is_valid.eq(true))
            .count()
            .get_result(&mut conn)?;
        Ok(count)
    }

    /// Action records still pending (is_valid NULL), oldest first.
    #[instrument(skip(self))]
    pub fn pending_actions(&self, game_id: &str) -> Result<Vec<ActionRecord>, StoreError> {
        use crate::db::schema::actions::dsl;

        let mut conn = self.connection()?;
        let records = dsl::actions
            .filter(dsl::game_id.eq(game_id))
            .filter(dsl::is_valid.is_null())
            .order(dsl::created_at.asc())
            .load::<ActionRecord>(&mut conn)?;
        Ok(records)
    }

    /// Game ids with `status = active` and at least one pending action.
    #[instrument(skip(self))]
    pub fn find_interrupted(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection()?;

        let pending_games = schema::actions::table
            .filter(schema::actions::is_valid.is_null())
            .select(schema::actions::game_id)
            .distinct();
        let ids = schema::games::table
            .filter(schema::games::status.eq("active"))
            .filter(schema::games::id.eq_any(pending_games))
            .order(schema::games::created_at.asc())
            .select(schema::games::id)
            .load::<String>(&mut conn)?;

        info!(count = ids.len(), "Interrupted games found");
        Ok(ids)
    }

    /// All action records for a game, in turn then insertion order.
    #[instrument(skip(self))]
    pub fn actions_for_game(&self, game_id: &str) -> Result<Vec<ActionRecord>, StoreError> {
        use crate::db::schema::actions::dsl;

        let mut conn = self.connection()?;
        let records = dsl::actions
            .filter(dsl::game_id.eq(game_id))
            .order((dsl::turn_number.asc(), dsl::created_at.asc()))
            .load::<ActionRecord>(&mut conn)?;
        Ok(records)
    }

    /// All event records for a game, in turn then insertion order.
    #[instrument(skip(self))]
    pub fn events_for_game(&self, game_id: &str) -> Result<Vec<EventRecord>, StoreError> {
        use crate::db::schema::events::dsl;

        let mut conn = self.connection()?;
        let records = dsl::events
            .filter(dsl::game_id.eq(game_id))
            .order((dsl::turn_number.asc(), dsl::created_at.asc()))
            .load::<EventRecord>(&mut conn)?;
        Ok(records)
    }

    /// All chat rows for a game, oldest first.
    #[instrument(skip(self))]
    pub fn chat_for_game(&self, game_id: &str) -> Result<Vec<ChatMessageRecord>, StoreError> {
        use crate::db::schema::chat_messages::dsl;

        let mut conn = self.connection()?;
        let records = dsl::chat_messages
            .filter(dsl::game_id.eq(game_id))
            .order((dsl::turn_number.asc(), dsl::created_at.asc()))
            .load::<ChatMessageRecord>(&mut conn)?;
        Ok(records)
    }

    /// Seat assignment rows for a game, in seating order of insertion.
    #[instrument(skip(self))]
    pub fn players_for_game(&self, game_id: &str) -> Result<Vec<PlayerRecord>, StoreError> {
        use crate::db::schema::players::dsl;

        let mut conn = self.connection()?;
        let records = dsl::players
            .filter(dsl::game_id.eq(game_id))
            .load::<PlayerRecord>(&mut conn)?;
        Ok(records)
    }

    /// Records one agent performance sample.
    #[instrument(skip(self))]
    pub fn record_agent_metrics(
        &self,
        game_id: &str,
        actor_id: &str,
        turn_number: u32,
        tokens: Option<i32>,
        response_ms: Option<i32>,
        invalid_attempts: i32,
        state_size: Option<i32>,
    ) -> Result<String, StoreError> {
        use crate::db::schema::agent_metrics::dsl::agent_metrics;

        let mut conn = self.connection()?;
        let metric_id = Uuid::new_v4().to_string();
        let record = NewAgentMetricRecord::new(
            metric_id.clone(),
            game_id.to_string(),
            actor_id.to_string(),
            turn_number as i32,
            tokens,
            response_ms,
            invalid_attempts,
            state_size,
            now_utc(),
        );
        diesel::insert_into(agent_metrics)
            .values(&record)
            .execute(&mut conn)?;
        Ok(metric_id)
    }

    /// Merged per-game timeline of actions and events, ordered by
    /// `(turn_number, created_at)`.
    #[instrument(skip(self))]
    pub fn timeline(&self, game_id: &str) -> Result<Vec<TimelineEntry>, StoreError> {
        let mut entries: Vec<TimelineEntry> = self
            .actions_for_game(game_id)?
            .into_iter()
            .map(TimelineEntry::Action)
            .chain(
                self.events_for_game(game_id)?
                    .into_iter()
                    .map(TimelineEntry::Event),
            )
            .collect();
        entries.sort_by_key(|e| e.sort_key());
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_stable_and_content_sensitive() {
        let a = state_checksum("{\"x\":1}");
        let b = state_checksum("{\"x\":1}");
        let c = state_checksum("{\"x\":2}");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
