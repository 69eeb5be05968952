//! Player actions: the submitted forms, validation, and error codes.
//!
//! Validation is a pure read over the current state. It never mutates;
//! the processor only applies an action after validation has passed.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::rules;
use super::state::GameState;
use super::types::{ActionKind, PaperId, Phase, PlayerId};

/// Machine-readable error codes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Action does not exist in the current phase or sub-state.
    InvalidPhase,
    /// Submitter is not the player the action belongs to.
    NotActor,
    /// Target is missing, dead, or otherwise not selectable.
    IneligibleTarget,
    /// The submitter already voted on this ballot.
    DuplicateVote,
    /// The mechanism (veto, emergency safety) is not available yet.
    NotUnlocked,
    /// The referenced paper is not in the relevant hand.
    UnknownPaper,
    /// The power does not exist at this table size.
    SizeGated,
    /// The game has ended.
    GameOver,
    /// Engine-internal failure; state was left untouched.
    Internal,
}

impl ErrorCode {
    /// Canonical wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidPhase => "invalid_phase",
            Self::NotActor => "not_actor",
            Self::IneligibleTarget => "ineligible_target",
            Self::DuplicateVote => "duplicate_vote",
            Self::NotUnlocked => "not_unlocked",
            Self::UnknownPaper => "unknown_paper",
            Self::SizeGated => "size_gated",
            Self::GameOver => "game_over",
            Self::Internal => "internal",
        }
    }
}

/// A rejected action: code plus human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error, Serialize, Deserialize)]
#[display("{}: {}", code.as_str(), message)]
pub struct ActionError {
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Explanation for logs and callers.
    pub message: String,
}

impl ActionError {
    /// Creates an error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// An action as submitted by a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Director nominates `target_id` as engineer.
    Nominate {
        /// Proposed engineer.
        target_id: PlayerId,
    },
    /// Ballot on the proposed team.
    VoteTeam {
        /// True to approve.
        approve: bool,
    },
    /// Open an emergency safety vote.
    CallEmergencySafety,
    /// Ballot on the open emergency safety call.
    VoteEmergency {
        /// True to activate.
        approve: bool,
    },
    /// Director discards one of the three drawn papers.
    DiscardPaper {
        /// Paper to discard.
        paper_id: PaperId,
    },
    /// Engineer refuses to publish; requires director agreement.
    DeclareVeto,
    /// Director's answer to a declared veto.
    RespondVeto {
        /// True to agree and scrap the round's papers.
        agree: bool,
    },
    /// Engineer publishes one of the two remaining papers.
    PublishPaper {
        /// Paper to publish.
        paper_id: PaperId,
    },
    /// Director resolves the oldest pending power.
    UsePower {
        /// Target player, for powers that take one.
        target_id: Option<PlayerId>,
    },
    /// Record a chat message.
    SendChatMessage {
        /// Message body.
        text: String,
    },
    /// No-op; returns the caller's filtered view.
    Observe,
}

impl Action {
    /// The discriminant of this action.
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Nominate { .. } => ActionKind::Nominate,
            Self::VoteTeam { .. } => ActionKind::VoteTeam,
            Self::CallEmergencySafety => ActionKind::CallEmergencySafety,
            Self::VoteEmergency { .. } => ActionKind::VoteEmergency,
            Self::DiscardPaper { .. } => ActionKind::DiscardPaper,
            Self::DeclareVeto => ActionKind::DeclareVeto,
            Self::RespondVeto { .. } => ActionKind::RespondVeto,
            Self::PublishPaper { .. } => ActionKind::PublishPaper,
            Self::UsePower { .. } => ActionKind::UsePower,
            Self::SendChatMessage { .. } => ActionKind::SendChatMessage,
            Self::Observe => ActionKind::Observe,
        }
    }

    /// Parameter payload persisted alongside the action record.
    pub fn params_json(&self) -> serde_json::Value {
        match self {
            Self::Nominate { target_id } => json!({ "target_id": target_id }),
            Self::VoteTeam { approve } | Self::VoteEmergency { approve } => {
                json!({ "approve": approve })
            }
            Self::DiscardPaper { paper_id } | Self::PublishPaper { paper_id } => {
                json!({ "paper_id": paper_id })
            }
            Self::RespondVeto { agree } => json!({ "agree": agree }),
            Self::UsePower { target_id } => json!({ "target_id": target_id }),
            Self::SendChatMessage { text } => json!({ "text": text }),
            Self::CallEmergencySafety | Self::DeclareVeto | Self::Observe => json!({}),
        }
    }
}

/// Validates an action against the current state.
pub fn validate(state: &GameState, actor_id: &str, action: &Action) -> Result<(), ActionError> {
    if state.is_game_over {
        return Err(ActionError::new(ErrorCode::GameOver, "the game has ended"));
    }

    let actor = state.player(actor_id).ok_or_else(|| {
        ActionError::new(ErrorCode::NotActor, format!("unknown player {actor_id}"))
    })?;
    if !actor.alive {
        return Err(ActionError::new(
            ErrorCode::NotActor,
            format!("player {actor_id} has been eliminated"),
        ));
    }

    match action {
        Action::Observe => Ok(()),
        Action::SendChatMessage { .. } => Ok(()),
        Action::UsePower { target_id } => validate_use_power(state, actor_id, target_id.as_deref()),
        _ if !state.pending_powers.is_empty() => Err(ActionError::new(
            ErrorCode::InvalidPhase,
            "a power must be resolved before play continues",
        )),
        Action::Nominate { target_id } => validate_nominate(state, actor_id, target_id),
        Action::VoteTeam { .. } => validate_vote_team(state, actor_id),
        Action::CallEmergencySafety => validate_call_emergency(state),
        Action::VoteEmergency { .. } => validate_vote_emergency(state, actor_id),
        Action::DiscardPaper { paper_id } => validate_discard(state, actor_id, paper_id),
        Action::DeclareVeto => validate_declare_veto(state, actor_id),
        Action::RespondVeto { .. } => validate_respond_veto(state, actor_id),
        Action::PublishPaper { paper_id } => validate_publish(state, actor_id, paper_id),
    }
}

fn require_phase(state: &GameState, phase: Phase, what: &str) -> Result<(), ActionError> {
    if state.current_phase != phase {
        return Err(ActionError::new(
            ErrorCode::InvalidPhase,
            format!(
                "{what} is only available during {}, current phase is {}",
                phase.as_str(),
                state.current_phase.as_str()
            ),
        ));
    }
    Ok(())
}

fn require_director(state: &GameState, actor_id: &str, what: &str) -> Result<(), ActionError> {
    if state.current_director().id != actor_id {
        return Err(ActionError::new(
            ErrorCode::NotActor,
            format!("only the director may {what}"),
        ));
    }
    Ok(())
}

fn require_engineer(state: &GameState, actor_id: &str, what: &str) -> Result<(), ActionError> {
    if state.nominated_engineer_id.as_deref() != Some(actor_id) {
        return Err(ActionError::new(
            ErrorCode::NotActor,
            format!("only the engineer may {what}"),
        ));
    }
    Ok(())
}

fn validate_nominate(state: &GameState, actor_id: &str, target_id: &str) -> Result<(), ActionError> {
    require_phase(state, Phase::TeamProposal, "nomination")?;
    require_director(state, actor_id, "nominate")?;
    if state.nominated_engineer_id.is_some() {
        return Err(ActionError::new(
            ErrorCode::InvalidPhase,
            "an engineer has already been nominated this proposal",
        ));
    }
    let target = state.player(target_id).ok_or_else(|| {
        ActionError::new(
            ErrorCode::IneligibleTarget,
            format!("unknown player {target_id}"),
        )
    })?;
    if !target.alive {
        return Err(ActionError::new(
            ErrorCode::IneligibleTarget,
            format!("player {target_id} has been eliminated"),
        ));
    }
    if target.was_last_engineer {
        return Err(ActionError::new(
            ErrorCode::IneligibleTarget,
            format!("player {target_id} was the last engineer"),
        ));
    }
    Ok(())
}

fn validate_vote_team(state: &GameState, actor_id: &str) -> Result<(), ActionError> {
    require_phase(state, Phase::TeamProposal, "team voting")?;
    if state.nominated_engineer_id.is_none() {
        return Err(ActionError::new(
            ErrorCode::InvalidPhase,
            "no engineer has been nominated",
        ));
    }
    if state.emergency_vote_open {
        return Err(ActionError::new(
            ErrorCode::InvalidPhase,
            "the emergency safety vote must finish first",
        ));
    }
    if state.team_votes.contains_key(actor_id) {
        return Err(ActionError::new(
            ErrorCode::DuplicateVote,
            "already voted on this team",
        ));
    }
    Ok(())
}

fn validate_call_emergency(state: &GameState) -> Result<(), ActionError> {
    require_phase(state, Phase::TeamProposal, "emergency safety")?;
    if !rules::emergency_safety_callable(state) {
        return Err(ActionError::new(
            ErrorCode::NotUnlocked,
            "emergency safety requires a capability lead of 4 or 5",
        ));
    }
    if state.emergency_safety_called_this_round {
        return Err(ActionError::new(
            ErrorCode::InvalidPhase,
            "emergency safety was already called this round",
        ));
    }
    Ok(())
}

fn validate_vote_emergency(state: &GameState, actor_id: &str) -> Result<(), ActionError> {
    if !state.emergency_vote_open {
        return Err(ActionError::new(
            ErrorCode::InvalidPhase,
            "no emergency safety vote is open",
        ));
    }
    if state.emergency_votes.contains_key(actor_id) {
        return Err(ActionError::new(
            ErrorCode::DuplicateVote,
            "already voted on emergency safety",
        ));
    }
    Ok(())
}

fn validate_discard(state: &GameState, actor_id: &str, paper_id: &str) -> Result<(), ActionError> {
    require_phase(state, Phase::Research, "the director discard")?;
    require_director(state, actor_id, "discard")?;
    let cards = state.director_cards.as_ref().ok_or_else(|| {
        ActionError::new(ErrorCode::InvalidPhase, "no drawn papers to discard")
    })?;
    if !cards.iter().any(|p| p.id == paper_id) {
        return Err(ActionError::new(
            ErrorCode::UnknownPaper,
            format!("paper {paper_id} is not in the director's hand"),
        ));
    }
    Ok(())
}

fn validate_declare_veto(state: &GameState, actor_id: &str) -> Result<(), ActionError> {
    require_phase(state, Phase::Research, "veto")?;
    require_engineer(state, actor_id, "declare a veto")?;
    if !state.veto_unlocked {
        return Err(ActionError::new(
            ErrorCode::NotUnlocked,
            "veto power has not been unlocked",
        ));
    }
    if state.engineer_cards.is_none() {
        return Err(ActionError::new(
            ErrorCode::InvalidPhase,
            "there is nothing to veto yet",
        ));
    }
    if state.veto_declared {
        return Err(ActionError::new(
            ErrorCode::InvalidPhase,
            "a veto is already awaiting the director's response",
        ));
    }
    if state.veto_refused {
        return Err(ActionError::new(
            ErrorCode::InvalidPhase,
            "the director already refused a veto this round",
        ));
    }
    Ok(())
}

fn validate_respond_veto(state: &GameState, actor_id: &str) -> Result<(), ActionError> {
    require_phase(state, Phase::Research, "the veto response")?;
    require_director(state, actor_id, "respond to a veto")?;
    if !state.veto_declared {
        return Err(ActionError::new(
            ErrorCode::InvalidPhase,
            "no veto has been declared",
        ));
    }
    Ok(())
}

fn validate_publish(state: &GameState, actor_id: &str, paper_id: &str) -> Result<(), ActionError> {
    require_phase(state, Phase::Research, "publication")?;
    require_engineer(state, actor_id, "publish")?;
    if state.veto_declared {
        return Err(ActionError::new(
            ErrorCode::InvalidPhase,
            "the declared veto must be answered first",
        ));
    }
    let cards = state.engineer_cards.as_ref().ok_or_else(|| {
        ActionError::new(ErrorCode::InvalidPhase, "no papers to publish")
    })?;
    if !cards.iter().any(|p| p.id == paper_id) {
        return Err(ActionError::new(
            ErrorCode::UnknownPaper,
            format!("paper {paper_id} is not in the engineer's hand"),
        ));
    }
    Ok(())
}

fn validate_use_power(
    state: &GameState,
    actor_id: &str,
    target_id: Option<&str>,
) -> Result<(), ActionError> {
    let threshold = *state.pending_powers.first().ok_or_else(|| {
        ActionError::new(ErrorCode::InvalidPhase, "no power is pending")
    })?;
    require_director(state, actor_id, "use a power")?;
    if rules::size_gated(threshold) && state.players.len() < 9 {
        return Err(ActionError::new(
            ErrorCode::SizeGated,
            format!("the capability-{threshold} power requires 9 or more players"),
        ));
    }
    if rules::requires_target(threshold) {
        let target_id = target_id.ok_or_else(|| {
            ActionError::new(
                ErrorCode::IneligibleTarget,
                format!("the capability-{threshold} power requires a target"),
            )
        })?;
        let target = state.player(target_id).ok_or_else(|| {
            ActionError::new(
                ErrorCode::IneligibleTarget,
                format!("unknown player {target_id}"),
            )
        })?;
        if !target.alive {
            return Err(ActionError::new(
                ErrorCode::IneligibleTarget,
                format!("player {target_id} has been eliminated"),
            ));
        }
        if target.id == actor_id {
            return Err(ActionError::new(
                ErrorCode::IneligibleTarget,
                "powers cannot target the director",
            ));
        }
    }
    Ok(())
}

/// Legal action kinds for a player in the current state.
///
/// This is the list returned in every `GameUpdate` and the menu a
/// simulation policy chooses from.
pub fn valid_actions(state: &GameState, player_id: &str) -> Vec<ActionKind> {
    let Some(player) = state.player(player_id) else {
        return Vec::new();
    };
    if !player.alive || state.is_game_over {
        return Vec::new();
    }

    let mut kinds = vec![ActionKind::Observe, ActionKind::SendChatMessage];
    let is_director = state.current_director().id == player_id;
    let is_engineer = state.nominated_engineer_id.as_deref() == Some(player_id);

    if !state.pending_powers.is_empty() {
        if is_director {
            kinds.push(ActionKind::UsePower);
        }
        return kinds;
    }

    match state.current_phase {
        Phase::TeamProposal => {
            if is_director && state.nominated_engineer_id.is_none() {
                kinds.push(ActionKind::Nominate);
            }
            if rules::emergency_safety_callable(state) && !state.emergency_safety_called_this_round
            {
                kinds.push(ActionKind::CallEmergencySafety);
            }
            if state.emergency_vote_open && !state.emergency_votes.contains_key(player_id) {
                kinds.push(ActionKind::VoteEmergency);
            }
            if state.nominated_engineer_id.is_some()
                && !state.emergency_vote_open
                && !state.team_votes.contains_key(player_id)
            {
                kinds.push(ActionKind::VoteTeam);
            }
        }
        Phase::Research => {
            if is_director && state.director_cards.is_some() {
                kinds.push(ActionKind::DiscardPaper);
            }
            if is_director && state.veto_declared {
                kinds.push(ActionKind::RespondVeto);
            }
            if is_engineer && state.engineer_cards.is_some() && !state.veto_declared {
                kinds.push(ActionKind::PublishPaper);
                if state.veto_unlocked && !state.veto_refused {
                    kinds.push(ActionKind::DeclareVeto);
                }
            }
        }
        Phase::GameOver => {}
    }

    kinds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rules::initial_state;
    use crate::engine::types::GameConfig;

    fn fresh_state() -> GameState {
        let config = GameConfig {
            player_count: 5,
            player_ids: (1..=5).map(|i| format!("p{i}")).collect(),
            seed: Some(11),
        };
        initial_state("g", &config).unwrap()
    }

    #[test]
    fn director_may_nominate_in_team_proposal() {
        let state = fresh_state();
        let director = state.current_director().id.clone();
        let target = state
            .players
            .iter()
            .find(|p| p.id != director)
            .unwrap()
            .id
            .clone();
        assert!(validate(&state, &director, &Action::Nominate { target_id: target }).is_ok());
    }

    #[test]
    fn non_director_nomination_is_not_actor() {
        let state = fresh_state();
        let outsider = state
            .players
            .iter()
            .find(|p| p.id != state.current_director().id)
            .unwrap()
            .id
            .clone();
        let err = validate(
            &state,
            &outsider,
            &Action::Nominate {
                target_id: state.current_director().id.clone(),
            },
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotActor);
    }

    #[test]
    fn nominating_last_engineer_is_ineligible() {
        let mut state = fresh_state();
        let director = state.current_director().id.clone();
        let target = state
            .players
            .iter()
            .find(|p| p.id != director)
            .unwrap()
            .id
            .clone();
        state.player_mut(&target).unwrap().was_last_engineer = true;
        let err = validate(&state, &director, &Action::Nominate { target_id: target }).unwrap_err();
        assert_eq!(err.code, ErrorCode::IneligibleTarget);
    }

    #[test]
    fn team_vote_requires_a_nominee() {
        let state = fresh_state();
        let err = validate(&state, "p1", &Action::VoteTeam { approve: true }).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPhase);
    }

    #[test]
    fn double_vote_is_rejected() {
        let mut state = fresh_state();
        state.nominated_engineer_id = Some("p2".into());
        state.team_votes.insert("p1".into(), true);
        let err = validate(&state, "p1", &Action::VoteTeam { approve: false }).unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateVote);
    }

    #[test]
    fn emergency_call_outside_window_is_not_unlocked() {
        let state = fresh_state();
        let err = validate(&state, "p1", &Action::CallEmergencySafety).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotUnlocked);
    }

    #[test]
    fn everything_is_game_over_after_the_end() {
        let mut state = fresh_state();
        state.is_game_over = true;
        state.current_phase = Phase::GameOver;
        let err = validate(&state, "p1", &Action::VoteTeam { approve: true }).unwrap_err();
        assert_eq!(err.code, ErrorCode::GameOver);
        assert!(valid_actions(&state, "p1").is_empty());
    }

    #[test]
    fn veto_requires_unlock() {
        let mut state = fresh_state();
        state.current_phase = Phase::Research;
        state.nominated_engineer_id = Some("p3".into());
        state.engineer_cards = Some(vec![]);
        let err = validate(&state, "p3", &Action::DeclareVeto).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotUnlocked);
    }

    #[test]
    fn pending_power_blocks_normal_play() {
        let mut state = fresh_state();
        state.pending_powers.push(6);
        let director = state.current_director().id.clone();
        let err = validate(
            &state,
            &director,
            &Action::Nominate {
                target_id: "p1".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPhase);

        let kinds = valid_actions(&state, &director);
        assert!(kinds.contains(&ActionKind::UsePower));
        assert!(!kinds.contains(&ActionKind::Nominate));
    }

    #[test]
    fn power_target_must_be_someone_else_alive() {
        let mut state = fresh_state();
        state.pending_powers.push(6);
        let director = state.current_director().id.clone();
        let err = validate(
            &state,
            &director,
            &Action::UsePower {
                target_id: Some(director.clone()),
            },
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::IneligibleTarget);

        let err = validate(&state, &director, &Action::UsePower { target_id: None }).unwrap_err();
        assert_eq!(err.code, ErrorCode::IneligibleTarget);
    }

    #[test]
    fn eliminated_players_cannot_act() {
        let mut state = fresh_state();
        state.player_mut("p4").unwrap().alive = false;
        let err = validate(&state, "p4", &Action::Observe).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotActor);
        assert!(valid_actions(&state, "p4").is_empty());
    }
}
