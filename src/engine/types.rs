//! Core domain types for the Secret AGI engine.

use serde::{Deserialize, Serialize};

/// Unique identifier for a player within a game.
pub type PlayerId = String;

/// Unique identifier for a research paper.
pub type PaperId = String;

/// Hidden role dealt to each player at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Safety researcher; wins by keeping safety ahead of capability.
    Safety,
    /// Accelerationist; wins by racing capability ahead.
    Accelerationist,
    /// The AGI itself; allied with the Accelerationists.
    #[serde(rename = "AGI")]
    Agi,
}

impl Role {
    /// Canonical string stored in the database and event payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safety => "Safety",
            Self::Accelerationist => "Accelerationist",
            Self::Agi => "AGI",
        }
    }

    /// Parses the canonical string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Safety" => Some(Self::Safety),
            "Accelerationist" => Some(Self::Accelerationist),
            "AGI" => Some(Self::Agi),
            _ => None,
        }
    }

    /// The allegiance implied by this role.
    pub fn allegiance(&self) -> Allegiance {
        match self {
            Self::Safety => Allegiance::Safety,
            Self::Accelerationist | Self::Agi => Allegiance::Acceleration,
        }
    }

    /// Whether this role belongs to the evil faction.
    pub fn is_evil(&self) -> bool {
        matches!(self, Self::Accelerationist | Self::Agi)
    }
}

/// Faction information revealed by allegiance-viewing powers.
///
/// Coarser than [`Role`]: the AGI shows up as Acceleration, so a viewed
/// allegiance never distinguishes the AGI from an Accelerationist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Allegiance {
    /// Aligned with the safety faction.
    Safety,
    /// Aligned with the accelerationist faction (includes the AGI).
    Acceleration,
}

impl Allegiance {
    /// Canonical string stored in the database and event payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safety => "Safety",
            Self::Acceleration => "Acceleration",
        }
    }

    /// Parses the canonical string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Safety" => Some(Self::Safety),
            "Acceleration" => Some(Self::Acceleration),
            _ => None,
        }
    }
}

/// Top-level game phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Director nominates an engineer; the table votes.
    TeamProposal,
    /// Approved team draws, discards, and publishes a paper.
    Research,
    /// Terminal; no further actions are accepted.
    GameOver,
}

impl Phase {
    /// Canonical string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TeamProposal => "TeamProposal",
            Self::Research => "Research",
            Self::GameOver => "GameOver",
        }
    }

    /// Parses the canonical string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TeamProposal" => Some(Self::TeamProposal),
            "Research" => Some(Self::Research),
            "GameOver" => Some(Self::GameOver),
            _ => None,
        }
    }
}

/// Discriminant for the action surface exposed to players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Director nominates an engineer.
    Nominate,
    /// Vote on the proposed team.
    VoteTeam,
    /// Open an emergency safety vote.
    CallEmergencySafety,
    /// Vote on an open emergency safety call.
    VoteEmergency,
    /// Director discards one of three drawn papers.
    DiscardPaper,
    /// Engineer declares a veto.
    DeclareVeto,
    /// Director agrees or refuses a declared veto.
    RespondVeto,
    /// Engineer publishes one of two papers.
    PublishPaper,
    /// Director resolves a pending capability power.
    UsePower,
    /// Record a table-talk message.
    SendChatMessage,
    /// Read-only look at the current filtered state.
    Observe,
}

impl ActionKind {
    /// Canonical string stored in the `actions` table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nominate => "nominate",
            Self::VoteTeam => "vote_team",
            Self::CallEmergencySafety => "call_emergency_safety",
            Self::VoteEmergency => "vote_emergency",
            Self::DiscardPaper => "discard_paper",
            Self::DeclareVeto => "declare_veto",
            Self::RespondVeto => "respond_veto",
            Self::PublishPaper => "publish_paper",
            Self::UsePower => "use_power",
            Self::SendChatMessage => "send_chat_message",
            Self::Observe => "observe",
        }
    }

    /// Parses the canonical string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "nominate" => Some(Self::Nominate),
            "vote_team" => Some(Self::VoteTeam),
            "call_emergency_safety" => Some(Self::CallEmergencySafety),
            "vote_emergency" => Some(Self::VoteEmergency),
            "discard_paper" => Some(Self::DiscardPaper),
            "declare_veto" => Some(Self::DeclareVeto),
            "respond_veto" => Some(Self::RespondVeto),
            "publish_paper" => Some(Self::PublishPaper),
            "use_power" => Some(Self::UsePower),
            "send_chat_message" => Some(Self::SendChatMessage),
            "observe" => Some(Self::Observe),
            _ => None,
        }
    }
}

/// A research paper: a pair of non-negative contributions to the two
/// board meters. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    /// Stable identifier, unique within a deck.
    pub id: PaperId,
    /// Contribution to the capability meter when published.
    pub capability: u32,
    /// Contribution to the safety meter when published.
    pub safety: u32,
}

impl Paper {
    /// Creates a new paper.
    pub fn new(id: impl Into<PaperId>, capability: u32, safety: u32) -> Self {
        Self {
            id: id.into(),
            capability,
            safety,
        }
    }
}

/// A seated player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Caller-supplied identifier; also the seat label.
    pub id: PlayerId,
    /// Hidden role dealt at setup.
    pub role: Role,
    /// Faction shown by allegiance-viewing powers.
    pub allegiance: Allegiance,
    /// False once eliminated by the capability-11 power.
    pub alive: bool,
    /// True for the engineer of the most recent publication only.
    pub was_last_engineer: bool,
}

impl Player {
    /// Creates a live player with the allegiance implied by the role.
    pub fn new(id: impl Into<PlayerId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            allegiance: role.allegiance(),
            alive: true,
            was_last_engineer: false,
        }
    }
}

/// Configuration for creating a new game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Number of seats, 5 through 10.
    pub player_count: usize,
    /// One identifier per seat, in seating order.
    pub player_ids: Vec<PlayerId>,
    /// Seed for the deterministic setup shuffle. `None` draws from entropy.
    pub seed: Option<u64>,
}

impl GameConfig {
    /// Validates player count bounds and id/count agreement.
    pub fn validate(&self) -> Result<(), String> {
        if !(5..=10).contains(&self.player_count) {
            return Err(format!(
                "player_count must be between 5 and 10, got {}",
                self.player_count
            ));
        }
        if self.player_ids.len() != self.player_count {
            return Err(format!(
                "expected {} player ids, got {}",
                self.player_count,
                self.player_ids.len()
            ));
        }
        Ok(())
    }
}
