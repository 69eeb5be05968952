//! Game events: a shared envelope around per-variant payload structs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::types::{ActionKind, Allegiance, Paper, Phase, PlayerId, Role};

/// A structured record of a game-significant occurrence.
///
/// Events are produced by the action processor, appended to the state's
/// event log, and persisted verbatim by the event store. The envelope is
/// shared; the payload lives in [`EventKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Unique event id.
    pub id: String,
    /// Typed payload.
    pub kind: EventKind,
    /// Player that caused the event, when attributable.
    pub actor: Option<PlayerId>,
    /// Turn at which the event was produced.
    pub turn_number: u32,
}

impl GameEvent {
    /// Creates an event with a fresh id.
    pub fn new(kind: EventKind, actor: Option<PlayerId>, turn_number: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            actor,
            turn_number,
        }
    }

    /// Whether this event may be shown to `player_id`.
    ///
    /// Most events are table-public. Allegiance views are private to the
    /// viewer; chat is restricted to living players.
    pub fn visible_to(&self, player_id: &str, viewer_alive: bool) -> bool {
        match &self.kind {
            EventKind::StateChanged(StateChange::AllegianceViewed { .. }) => {
                self.actor.as_deref() == Some(player_id)
            }
            EventKind::ChatMessage(_) => viewer_alive,
            _ => true,
        }
    }
}

/// Tagged event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventKind {
    /// A player submitted an action (valid or not).
    ActionAttempted(ActionAttempted),
    /// A discrete state mutation outside the publish/vote flow.
    StateChanged(StateChange),
    /// The top-level phase changed.
    PhaseTransition(PhaseTransition),
    /// A paper's contributions were applied to the board.
    PaperPublished(PaperPublished),
    /// A capability threshold fired.
    PowerTriggered(PowerTriggered),
    /// Every living player has voted and the tally is in.
    VoteCompleted(VoteCompleted),
    /// Table talk.
    ChatMessage(ChatMessage),
    /// Terminal event carrying the winning roles.
    GameEnded(GameEnded),
}

impl EventKind {
    /// Canonical type tag stored in the `events` table.
    pub fn type_str(&self) -> &'static str {
        match self {
            Self::ActionAttempted(_) => "action_attempted",
            Self::StateChanged(_) => "state_changed",
            Self::PhaseTransition(_) => "phase_transition",
            Self::PaperPublished(_) => "paper_published",
            Self::PowerTriggered(_) => "power_triggered",
            Self::VoteCompleted(_) => "vote_completed",
            Self::ChatMessage(_) => "chat_message",
            Self::GameEnded(_) => "game_ended",
        }
    }
}

/// Payload for [`EventKind::ActionAttempted`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionAttempted {
    /// Which action was attempted.
    pub kind: ActionKind,
    /// Action parameters as submitted.
    pub params: serde_json::Value,
    /// Whether validation accepted the action.
    pub valid: bool,
    /// Error message for invalid attempts.
    pub error: Option<String>,
}

/// Payload for [`EventKind::StateChanged`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change")]
pub enum StateChange {
    /// The capability-11 power removed a player; their role is public.
    PlayerEliminated {
        /// The eliminated player.
        player_id: PlayerId,
        /// Role revealed on elimination.
        role: Role,
    },
    /// An allegiance-viewing power resolved. Private to the viewer.
    AllegianceViewed {
        /// The inspected player.
        target_id: PlayerId,
        /// What the viewer saw.
        allegiance: Allegiance,
    },
    /// The capability-9 power chose the next director.
    DirectorChosen {
        /// Director for the next TeamProposal.
        next_director_id: PlayerId,
    },
}

/// Payload for [`EventKind::PhaseTransition`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseTransition {
    /// Phase before the transition.
    pub from: Phase,
    /// Phase after the transition.
    pub to: Phase,
}

/// Payload for [`EventKind::PaperPublished`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperPublished {
    /// The published paper's printed values.
    pub paper: Paper,
    /// Capability actually applied (after any emergency-safety reduction).
    pub capability_delta: u32,
    /// Safety actually applied.
    pub safety_delta: u32,
    /// True when forced by three failed proposals.
    pub auto_published: bool,
    /// Board capability after applying the deltas.
    pub capability: u32,
    /// Board safety after applying the deltas.
    pub safety: u32,
}

/// Payload for [`EventKind::PowerTriggered`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerTriggered {
    /// Capability threshold that fired.
    pub threshold: u32,
    /// Short human-readable description of the effect.
    pub effect: String,
    /// True when the director still owes a target via `use_power`.
    pub awaiting_target: bool,
}

/// Payload for [`EventKind::VoteCompleted`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteCompleted {
    /// Which ballot this closes.
    pub vote: VoteType,
    /// Whether the motion carried.
    pub passed: bool,
    /// Yes votes among living players.
    pub yes: usize,
    /// Living players that voted.
    pub total: usize,
    /// The full public ballot.
    pub votes: BTreeMap<PlayerId, bool>,
}

/// The two ballots the table can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteType {
    /// Approve or reject the proposed team.
    #[serde(rename = "team")]
    Team,
    /// Activate emergency safety for the next publication.
    #[serde(rename = "emergency_safety")]
    Emergency,
}

impl VoteType {
    /// Canonical string used in payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Team => "team",
            Self::Emergency => "emergency_safety",
        }
    }
}

/// Payload for [`EventKind::ChatMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message body, recorded verbatim.
    pub message: String,
    /// Phase during which the message was sent.
    pub phase: Phase,
}

/// Payload for [`EventKind::GameEnded`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEnded {
    /// Winning roles.
    pub winners: Vec<Role>,
    /// Final capability.
    pub capability: u32,
    /// Final safety.
    pub safety: u32,
    /// Accepted-action count at game end.
    pub turns: u32,
}
