//! The action processor: validates one action and produces the next state.
//!
//! `apply` is a pure function from `(state, actor, action)` to either a
//! new state plus the events the action emitted, or a coded validation
//! error. The input state is never mutated, so callers can keep it as
//! the authoritative value if persistence fails downstream.

use tracing::{debug, instrument};

use super::actions::{self, Action, ActionError};
use super::events::{
    ActionAttempted, ChatMessage, EventKind, GameEnded, PaperPublished, PhaseTransition,
    PowerTriggered, StateChange, VoteCompleted, VoteType,
};
use super::invariants;
use super::rules;
use super::state::GameState;
use super::types::{Phase, PlayerId, Role};

/// Result of successfully applying an action.
#[derive(Debug, Clone)]
pub struct Applied {
    /// The state after the action.
    pub state: GameState,
    /// Events emitted by this action, in emission order.
    pub events: Vec<super::events::GameEvent>,
}

/// Validates and applies a single action.
///
/// On success the returned state's `turn_number` is the input's plus one
/// and every emitted event is both in the returned list and appended to
/// the state's log. On failure the input state is untouched.
#[instrument(skip(state, action), fields(game_id = %state.game_id, turn = state.turn_number, kind = action.kind().as_str()))]
pub fn apply(state: &GameState, actor_id: &str, action: &Action) -> Result<Applied, ActionError> {
    actions::validate(state, actor_id, action)?;

    let mut next = state.clone();
    next.turn_number += 1;
    let events_before = next.events.len();

    next.push_event(
        EventKind::ActionAttempted(ActionAttempted {
            kind: action.kind(),
            params: action.params_json(),
            valid: true,
            error: None,
        }),
        Some(actor_id.to_string()),
    );

    match action {
        Action::Observe => {}
        Action::SendChatMessage { text } => {
            next.push_event(
                EventKind::ChatMessage(ChatMessage {
                    message: text.clone(),
                    phase: next.current_phase,
                }),
                Some(actor_id.to_string()),
            );
        }
        Action::Nominate { target_id } => {
            next.nominated_engineer_id = Some(target_id.clone());
            next.team_votes.clear();
        }
        Action::CallEmergencySafety => {
            next.emergency_vote_open = true;
            next.emergency_safety_called_this_round = true;
            next.emergency_votes.clear();
        }
        Action::VoteEmergency { approve } => {
            next.emergency_votes.insert(actor_id.to_string(), *approve);
            if rules::vote_complete(&next, &next.emergency_votes) {
                finish_emergency_vote(&mut next);
            }
        }
        Action::VoteTeam { approve } => {
            next.team_votes.insert(actor_id.to_string(), *approve);
            if rules::vote_complete(&next, &next.team_votes) {
                finish_team_vote(&mut next);
            }
        }
        Action::DiscardPaper { paper_id } => {
            let mut cards = next.director_cards.take().unwrap_or_default();
            let idx = cards.iter().position(|p| p.id == *paper_id).ok_or_else(|| {
                ActionError::new(
                    super::actions::ErrorCode::Internal,
                    "validated paper vanished from the director's hand",
                )
            })?;
            let discarded = cards.remove(idx);
            next.discard.push(discarded);
            next.engineer_cards = Some(cards);
        }
        Action::DeclareVeto => {
            next.veto_declared = true;
        }
        Action::RespondVeto { agree } => {
            next.veto_declared = false;
            if *agree {
                agree_to_veto(&mut next);
            } else {
                next.veto_refused = true;
            }
        }
        Action::PublishPaper { paper_id } => {
            publish_chosen_paper(&mut next, actor_id, paper_id)?;
        }
        Action::UsePower { target_id } => {
            resolve_pending_power(&mut next, actor_id, target_id.as_deref());
        }
    }

    debug_assert!(
        invariants::check_all(&next).is_empty(),
        "invariant violation after {:?}: {:?}",
        action.kind(),
        invariants::check_all(&next)
    );

    let events = next.events[events_before..].to_vec();
    debug!(events = events.len(), "action applied");
    Ok(Applied { state: next, events })
}

fn finish_emergency_vote(state: &mut GameState) {
    let (passed, yes, total) = rules::vote_passes(state, &state.emergency_votes);
    state.emergency_vote_open = false;
    if passed {
        state.emergency_safety_active = true;
    }
    let votes = state.emergency_votes.clone();
    state.push_event(
        EventKind::VoteCompleted(VoteCompleted {
            vote: VoteType::Emergency,
            passed,
            yes,
            total,
            votes,
        }),
        None,
    );
}

fn finish_team_vote(state: &mut GameState) {
    let (passed, yes, total) = rules::vote_passes(state, &state.team_votes);
    let votes = state.team_votes.clone();
    state.push_event(
        EventKind::VoteCompleted(VoteCompleted {
            vote: VoteType::Team,
            passed,
            yes,
            total,
            votes,
        }),
        None,
    );

    if passed {
        team_approved(state);
    } else {
        team_rejected(state);
    }
}

/// A team was approved: the proposal streak resets, eligibility clears,
/// and either the AGI-engineer condition ends the game on the spot or
/// the Research phase begins with a fresh director hand.
fn team_approved(state: &mut GameState) {
    state.failed_proposals = 0;
    rules::reset_engineer_eligibility(state);

    let engineer_is_agi = state
        .nominated_engineer_id
        .as_deref()
        .and_then(|id| state.player(id))
        .is_some_and(|p| p.role == Role::Agi);
    if state.capability >= 8 && engineer_is_agi {
        end_game(state, rules::evil_winners());
        return;
    }

    if state.deck.len() < 3 {
        conclude_deck_exhaustion(state);
        return;
    }

    transition_phase(state, Phase::Research);
    let hand: Vec<_> = state.deck.drain(..3).collect();
    state.director_cards = Some(hand);
    state.veto_refused = false;
}

/// A team was rejected: the streak grows, the third failure forces an
/// auto-publish, otherwise the directorship rotates.
fn team_rejected(state: &mut GameState) {
    state.failed_proposals += 1;
    if state.failed_proposals >= 3 {
        auto_publish(state);
    } else {
        advance_director(state);
        reset_proposal_state(state);
    }
}

/// The director agreed to a veto: the engineer's papers are scrapped and
/// the table returns to TeamProposal with the streak grown by one.
fn agree_to_veto(state: &mut GameState) {
    if let Some(cards) = state.engineer_cards.take() {
        state.discard.extend(cards);
    }
    state.nominated_engineer_id = None;

    state.failed_proposals += 1;
    if state.failed_proposals >= 3 {
        auto_publish(state);
        if !state.is_game_over && state.current_phase == Phase::Research {
            transition_phase(state, Phase::TeamProposal);
        }
    } else {
        transition_phase(state, Phase::TeamProposal);
        reset_proposal_state(state);
    }
}

fn publish_chosen_paper(
    state: &mut GameState,
    engineer_id: &str,
    paper_id: &str,
) -> Result<(), ActionError> {
    let mut cards = state.engineer_cards.take().unwrap_or_default();
    let idx = cards.iter().position(|p| p.id == paper_id).ok_or_else(|| {
        ActionError::new(
            super::actions::ErrorCode::Internal,
            "validated paper vanished from the engineer's hand",
        )
    })?;
    let paper = cards.remove(idx);
    state.discard.extend(cards);

    let c_old = state.capability;
    let capability_delta = effective_capability_delta(state, paper.capability);
    state.capability += capability_delta;
    state.safety += paper.safety;

    if let Some(engineer) = state.player_mut(engineer_id) {
        engineer.was_last_engineer = true;
    }

    state.push_event(
        EventKind::PaperPublished(PaperPublished {
            paper: paper.clone(),
            capability_delta,
            safety_delta: paper.safety,
            auto_published: false,
            capability: state.capability,
            safety: state.safety,
        }),
        Some(engineer_id.to_string()),
    );
    state.published.push(paper);

    trigger_powers(state, c_old);

    if let Some(winners) = rules::evaluate_winners(state, true) {
        end_game(state, winners);
        return Ok(());
    }
    if state.pending_powers.is_empty() {
        prepare_next_round(state);
    }
    Ok(())
}

/// Forced publication after three failed proposals. The top paper goes
/// straight from the deck to the discard pile; the round then restarts
/// with the next director.
fn auto_publish(state: &mut GameState) {
    if state.deck.is_empty() {
        conclude_deck_exhaustion(state);
        return;
    }

    let paper = state.deck.remove(0);
    let c_old = state.capability;
    let capability_delta = effective_capability_delta(state, paper.capability);
    state.capability += capability_delta;
    state.safety += paper.safety;

    state.push_event(
        EventKind::PaperPublished(PaperPublished {
            paper: paper.clone(),
            capability_delta,
            safety_delta: paper.safety,
            auto_published: true,
            capability: state.capability,
            safety: state.safety,
        }),
        None,
    );
    state.discard.push(paper);

    state.failed_proposals = 0;
    rules::reset_engineer_eligibility(state);
    advance_director(state);
    state.round_number += 1;
    state.emergency_safety_called_this_round = false;
    reset_proposal_state(state);

    trigger_powers(state, c_old);

    if let Some(winners) = rules::evaluate_winners(state, true) {
        end_game(state, winners);
    }
}

/// Queues or applies the powers fired by a capability increase, in
/// ascending threshold order.
fn trigger_powers(state: &mut GameState, c_old: u32) {
    let triggered = rules::powers_triggered(c_old, state.capability, state.players.len());
    for threshold in triggered {
        let awaiting_target = rules::requires_target(threshold);
        match threshold {
            10 => state.agi_must_reveal = true,
            12 => state.veto_unlocked = true,
            _ => state.pending_powers.push(threshold),
        }
        let director_id = state.current_director().id.clone();
        state.push_event(
            EventKind::PowerTriggered(PowerTriggered {
                threshold,
                effect: rules::power_effect(threshold).to_string(),
                awaiting_target,
            }),
            awaiting_target.then_some(director_id),
        );
    }
}

/// Resolves the oldest pending power with the director's chosen target.
fn resolve_pending_power(state: &mut GameState, director_id: &str, target_id: Option<&str>) {
    let threshold = state.pending_powers.remove(0);
    match threshold {
        3 | 6 => {
            let target_id = target_id.expect("validated power target");
            let allegiance = state
                .player(target_id)
                .expect("validated power target")
                .allegiance;
            state
                .viewed_allegiances
                .entry(director_id.to_string())
                .or_default()
                .insert(target_id.to_string(), allegiance);
            state.push_event(
                EventKind::StateChanged(StateChange::AllegianceViewed {
                    target_id: target_id.to_string(),
                    allegiance,
                }),
                Some(director_id.to_string()),
            );
        }
        9 => {
            let target_id = target_id.expect("validated power target");
            state.next_director_override = Some(target_id.to_string());
            state.push_event(
                EventKind::StateChanged(StateChange::DirectorChosen {
                    next_director_id: target_id.to_string(),
                }),
                Some(director_id.to_string()),
            );
        }
        11 => {
            let target_id = target_id.expect("validated power target");
            let role = {
                let target = state.player_mut(target_id).expect("validated power target");
                target.alive = false;
                target.role
            };
            state.push_event(
                EventKind::StateChanged(StateChange::PlayerEliminated {
                    player_id: target_id.to_string(),
                    role,
                }),
                Some(director_id.to_string()),
            );
        }
        other => {
            // 10 and 12 never enter the queue.
            debug!(threshold = other, "non-target power found in pending queue");
        }
    }

    if let Some(winners) = rules::evaluate_winners(state, false) {
        end_game(state, winners);
        return;
    }
    if state.pending_powers.is_empty() && state.current_phase == Phase::Research {
        prepare_next_round(state);
    }
}

/// Capability contribution after the one-shot emergency safety
/// reduction; consumes the flag.
fn effective_capability_delta(state: &mut GameState, printed: u32) -> u32 {
    if state.emergency_safety_active {
        state.emergency_safety_active = false;
        printed.saturating_sub(1)
    } else {
        printed
    }
}

/// Rotates the directorship, honouring a capability-9 override.
fn advance_director(state: &mut GameState) {
    if let Some(chosen) = state.next_director_override.take() {
        if let Some(idx) = state.seat_index(&chosen) {
            if state.players[idx].alive {
                state.current_director_index = idx;
                return;
            }
        }
    }
    state.current_director_index = state.next_director_index();
}

/// Begins the next round after a publication: new director, fresh
/// proposal state, round counter up.
fn prepare_next_round(state: &mut GameState) {
    advance_director(state);
    state.round_number += 1;
    state.emergency_safety_called_this_round = false;
    transition_phase(state, Phase::TeamProposal);
    reset_proposal_state(state);
}

fn reset_proposal_state(state: &mut GameState) {
    state.nominated_engineer_id = None;
    state.team_votes.clear();
    state.emergency_votes.clear();
    state.emergency_vote_open = false;
    state.director_cards = None;
    state.engineer_cards = None;
    state.veto_declared = false;
    state.veto_refused = false;
}

fn transition_phase(state: &mut GameState, to: Phase) {
    let from = state.current_phase;
    if from == to {
        return;
    }
    state.current_phase = to;
    state.push_event(EventKind::PhaseTransition(PhaseTransition { from, to }), None);
}

/// The deck ran out where a draw or round conclusion was required:
/// safety parity decides the game.
fn conclude_deck_exhaustion(state: &mut GameState) {
    let winners = if state.safety >= state.capability {
        vec![Role::Safety]
    } else {
        rules::evil_winners()
    };
    end_game(state, winners);
}

fn end_game(state: &mut GameState, winners: Vec<Role>) {
    state.is_game_over = true;
    state.winners = winners.clone();
    state.current_phase = Phase::GameOver;
    state.push_event(
        EventKind::GameEnded(GameEnded {
            winners,
            capability: state.capability,
            safety: state.safety,
            turns: state.turn_number,
        }),
        None,
    );
}

/// Player expected to act next, in seating order: the first living
/// player with a substantive (non-observe, non-chat) legal action.
pub fn next_actor(state: &GameState) -> Option<PlayerId> {
    if state.is_game_over {
        return None;
    }
    state
        .alive_players()
        .find(|p| {
            actions::valid_actions(state, &p.id).iter().any(|k| {
                !matches!(
                    k,
                    super::types::ActionKind::Observe | super::types::ActionKind::SendChatMessage
                )
            })
        })
        .map(|p| p.id.clone())
}
