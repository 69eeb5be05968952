//! SQLite persistence layer: event store, unit-of-work, and recovery.

mod error;
mod models;
mod recovery;
mod schema;
mod store;
mod unit_of_work;

pub use error::StoreError;
pub use models::{
    ActionRecord, AgentMetricRecord, ChatMessageRecord, EventRecord, GameRecord, GameStatus,
    PlayerRecord, RecoveryKind, StateSnapshot,
};
pub use recovery::{FailureAnalysis, RecoveryReport, RecoveryService, RECOVERY_NOTE};
pub use store::{encode_state, state_checksum, EventStore, TimelineEntry};
pub use unit_of_work::UnitOfWork;
