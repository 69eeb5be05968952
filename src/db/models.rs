//! Database models and store-level domain types.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;

use crate::db::{schema, StoreError};

/// Lifecycle status of a persisted game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameStatus {
    /// The game is running (or recoverable).
    Active,
    /// The game finished normally.
    Completed,
    /// Recovery could not restore a consistent state.
    Failed,
    /// Suspended by a collaborator; no engine transitions pending.
    Paused,
}

impl GameStatus {
    /// Converts the status to the string stored in the database.
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Paused => "paused",
        }
    }

    /// Parses the status from the string stored in the database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the string is not a valid status value.
    pub fn from_db_string(s: &str) -> Result<Self, StoreError> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "paused" => Ok(Self::Paused),
            _ => Err(StoreError::new(format!("invalid game status: '{s}'"))),
        }
    }
}

/// Classification of an interrupted game, produced by recovery analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryKind {
    /// An action record was left pending mid-processing.
    IncompleteAction,
    /// The snapshot trail does not line up with the valid actions.
    TransactionFailure,
    /// The game idled out with a clean store; nothing to repair.
    AgentTimeout,
}

impl RecoveryKind {
    /// Canonical string used in reports and logs.
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::IncompleteAction => "incomplete_action",
            Self::TransactionFailure => "transaction_failure",
            Self::AgentTimeout => "agent_timeout",
        }
    }
}

/// Game session row.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::games)]
pub struct GameRecord {
    id: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    status: String,
    config: String,
    current_turn: i32,
    final_outcome: Option<String>,
    metadata: String,
}

impl GameRecord {
    /// Parses the stored status string.
    pub fn parse_status(&self) -> Result<GameStatus, StoreError> {
        GameStatus::from_db_string(self.status())
    }
}

/// Insertable game row.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::games)]
pub struct NewGameRecord {
    id: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    status: String,
    config: String,
    current_turn: i32,
    metadata: String,
}

/// Full-state snapshot row, keyed by `(game_id, turn_number)`.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Getters)]
#[diesel(table_name = schema::game_states)]
#[diesel(belongs_to(GameRecord, foreign_key = game_id))]
pub struct StateSnapshot {
    id: String,
    game_id: String,
    turn_number: i32,
    state_blob: String,
    created_at: NaiveDateTime,
    checksum: String,
}

/// Insertable snapshot row.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::game_states)]
pub struct NewStateSnapshot {
    id: String,
    game_id: String,
    turn_number: i32,
    state_blob: String,
    created_at: NaiveDateTime,
    checksum: String,
}

/// Seat assignment row.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Getters)]
#[diesel(table_name = schema::players)]
#[diesel(belongs_to(GameRecord, foreign_key = game_id))]
pub struct PlayerRecord {
    id: String,
    game_id: String,
    seat_id: String,
    agent_type: String,
    agent_config: String,
    role: String,
    allegiance: String,
    alive: bool,
}

/// Insertable seat assignment row.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::players)]
pub struct NewPlayerRecord {
    id: String,
    game_id: String,
    seat_id: String,
    agent_type: String,
    agent_config: String,
    role: String,
    allegiance: String,
    alive: bool,
}

/// Action attempt row. `is_valid` is tri-state: `NULL` while the action
/// is being processed, then true/false.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Getters)]
#[diesel(table_name = schema::actions)]
#[diesel(belongs_to(GameRecord, foreign_key = game_id))]
pub struct ActionRecord {
    id: String,
    game_id: String,
    turn_number: i32,
    actor_id: String,
    kind: String,
    params: String,
    is_valid: Option<bool>,
    error: Option<String>,
    processing_ms: Option<i32>,
    created_at: NaiveDateTime,
}

/// Insertable action row; always starts pending.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::actions)]
pub struct NewActionRecord {
    id: String,
    game_id: String,
    turn_number: i32,
    actor_id: String,
    kind: String,
    params: String,
    created_at: NaiveDateTime,
}

/// Event stream row.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Getters)]
#[diesel(table_name = schema::events)]
#[diesel(belongs_to(GameRecord, foreign_key = game_id))]
pub struct EventRecord {
    id: String,
    game_id: String,
    turn_number: i32,
    event_type: String,
    actor_id: Option<String>,
    payload: String,
    created_at: NaiveDateTime,
}

/// Insertable event row.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::events)]
pub struct NewEventRecord {
    id: String,
    game_id: String,
    turn_number: i32,
    event_type: String,
    actor_id: Option<String>,
    payload: String,
    created_at: NaiveDateTime,
}

/// Chat history row.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Getters)]
#[diesel(table_name = schema::chat_messages)]
#[diesel(belongs_to(GameRecord, foreign_key = game_id))]
pub struct ChatMessageRecord {
    id: String,
    game_id: String,
    turn_number: i32,
    speaker_id: String,
    message: String,
    phase: String,
    created_at: NaiveDateTime,
}

/// Insertable chat row.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::chat_messages)]
pub struct NewChatMessageRecord {
    id: String,
    game_id: String,
    turn_number: i32,
    speaker_id: String,
    message: String,
    phase: String,
    created_at: NaiveDateTime,
}

/// Agent performance row, written by the orchestrating collaborator.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Getters)]
#[diesel(table_name = schema::agent_metrics)]
#[diesel(belongs_to(GameRecord, foreign_key = game_id))]
pub struct AgentMetricRecord {
    id: String,
    game_id: String,
    actor_id: String,
    turn_number: i32,
    tokens: Option<i32>,
    response_ms: Option<i32>,
    invalid_attempts: i32,
    state_size: Option<i32>,
    created_at: NaiveDateTime,
}

/// Insertable agent metric row.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::agent_metrics)]
pub struct NewAgentMetricRecord {
    id: String,
    game_id: String,
    actor_id: String,
    turn_number: i32,
    tokens: Option<i32>,
    response_ms: Option<i32>,
    invalid_attempts: i32,
    state_size: Option<i32>,
    created_at: NaiveDateTime,
}
