//! Player-filtered projections of the game state.
//!
//! Players never see the raw [`GameState`]: hidden roles, the deck, and
//! other players' hands are stripped before anything leaves the facade.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::actions::ActionError;
use super::events::GameEvent;
use super::state::GameState;
use super::types::{ActionKind, Allegiance, Paper, Phase, PlayerId, Role};

/// What one player is allowed to know about the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredState {
    /// Game id.
    pub game_id: String,
    /// Accepted-action count.
    pub turn_number: u32,
    /// Round counter.
    pub round_number: u32,
    /// Current phase.
    pub current_phase: Phase,

    /// Capability meter.
    pub capability: u32,
    /// Safety meter.
    pub safety: u32,
    /// Consecutive failed proposals.
    pub failed_proposals: u8,

    /// Seats in order, roles redacted except for self and known allies.
    pub players: Vec<PlayerView>,
    /// Current director.
    pub current_director_id: PlayerId,
    /// Current nominee, if any.
    pub nominated_engineer_id: Option<PlayerId>,

    /// Ballots cast so far on the current nomination.
    pub team_votes: BTreeMap<PlayerId, bool>,
    /// Ballots cast so far on the emergency safety call.
    pub emergency_votes: BTreeMap<PlayerId, bool>,
    /// True while an emergency ballot is collecting votes.
    pub emergency_vote_open: bool,
    /// True when the one-shot reduction is armed.
    pub emergency_safety_active: bool,
    /// True once veto is unlocked.
    pub veto_unlocked: bool,
    /// True once the AGI is compelled to reveal itself when asked.
    pub agi_must_reveal: bool,
    /// Threshold the director still has to resolve, if any.
    pub pending_power: Option<u32>,

    /// Papers left in the draw pile; contents stay hidden.
    pub deck_size: usize,
    /// Discarded papers; contents stay hidden.
    pub discard_size: usize,
    /// Papers published so far, public record.
    pub published: Vec<Paper>,

    /// Terminal flag.
    pub is_game_over: bool,
    /// Winning roles once the game ends.
    pub winners: Vec<Role>,

    /// The viewer's own role.
    pub your_role: Role,
    /// Players the viewer knows to be on the accelerationist side
    /// (non-empty only for Accelerationists and the AGI).
    pub known_allies: Vec<PlayerId>,
    /// Allegiances this viewer has seen through powers.
    pub viewed_allegiances: BTreeMap<PlayerId, Allegiance>,
    /// The viewer's current hand, when director or engineer.
    pub your_hand: Option<Vec<Paper>>,
}

/// One seat as visible to a particular viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    /// Player id / seat label.
    pub id: PlayerId,
    /// Whether the player is still in the game.
    pub alive: bool,
    /// Whether the player published the most recent paper.
    pub was_last_engineer: bool,
    /// Role, only for self and known allies.
    pub role: Option<Role>,
}

/// Builds the filtered view of `state` for `player_id`.
///
/// Accelerationists and the AGI see each other's roles; everyone else
/// sees roles redacted. Hands are attached only for their holder.
pub fn filtered_state_for(state: &GameState, player_id: &str) -> Option<FilteredState> {
    let viewer = state.player(player_id)?;
    let viewer_is_evil = viewer.role.is_evil();

    let players = state
        .players
        .iter()
        .map(|p| {
            let role_known = p.id == viewer.id || (viewer_is_evil && p.role.is_evil());
            PlayerView {
                id: p.id.clone(),
                alive: p.alive,
                was_last_engineer: p.was_last_engineer,
                role: role_known.then_some(p.role),
            }
        })
        .collect();

    let known_allies = if viewer_is_evil {
        state
            .players
            .iter()
            .filter(|p| p.role.is_evil() && p.id != viewer.id)
            .map(|p| p.id.clone())
            .collect()
    } else {
        Vec::new()
    };

    let is_director = state.current_director().id == player_id;
    let is_engineer = state.nominated_engineer_id.as_deref() == Some(player_id);
    let your_hand = if is_director && state.director_cards.is_some() {
        state.director_cards.clone()
    } else if is_engineer && state.engineer_cards.is_some() {
        state.engineer_cards.clone()
    } else {
        None
    };

    Some(FilteredState {
        game_id: state.game_id.clone(),
        turn_number: state.turn_number,
        round_number: state.round_number,
        current_phase: state.current_phase,
        capability: state.capability,
        safety: state.safety,
        failed_proposals: state.failed_proposals,
        players,
        current_director_id: state.current_director().id.clone(),
        nominated_engineer_id: state.nominated_engineer_id.clone(),
        team_votes: state.team_votes.clone(),
        emergency_votes: state.emergency_votes.clone(),
        emergency_vote_open: state.emergency_vote_open,
        emergency_safety_active: state.emergency_safety_active,
        veto_unlocked: state.veto_unlocked,
        agi_must_reveal: state.agi_must_reveal,
        pending_power: state.pending_powers.first().copied(),
        deck_size: state.deck.len(),
        discard_size: state.discard.len(),
        published: state.published.clone(),
        is_game_over: state.is_game_over,
        winners: state.winners.clone(),
        your_role: viewer.role,
        known_allies,
        viewed_allegiances: state
            .viewed_allegiances
            .get(player_id)
            .cloned()
            .unwrap_or_default(),
        your_hand,
    })
}

/// Events in `state` visible to `player_id` with index > `cursor`.
///
/// Returns the visible events and the new cursor (the absolute index of
/// the last event in the log).
pub fn events_since(state: &GameState, player_id: &str, cursor: usize) -> (Vec<GameEvent>, usize) {
    let alive = state.player(player_id).map(|p| p.alive).unwrap_or(false);
    let visible = state
        .events
        .iter()
        .skip(cursor)
        .filter(|e| e.visible_to(player_id, alive))
        .cloned()
        .collect();
    (visible, state.events.len())
}

/// The per-action response handed back to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameUpdate {
    /// Whether the action was accepted.
    pub success: bool,
    /// Validation error for rejected actions.
    pub error: Option<ActionError>,
    /// Events visible to the actor since their previous call.
    pub events_since_last: Vec<GameEvent>,
    /// The actor's filtered view of the resulting state; `None` only
    /// when the actor is not seated in this game.
    pub state_view: Option<FilteredState>,
    /// Legal next actions for the actor.
    pub valid_actions: Vec<ActionKind>,
    /// Chat events among `events_since_last`, split out for convenience.
    pub chat_since_last: Vec<GameEvent>,
}

/// Public scalar summary of a game, for logs and collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStats {
    /// Game id.
    pub game_id: String,
    /// Accepted-action count.
    pub turn_number: u32,
    /// Round counter.
    pub round_number: u32,
    /// Seats at the table.
    pub player_count: usize,
    /// Players still alive.
    pub alive_count: usize,
    /// Capability meter.
    pub capability: u32,
    /// Safety meter.
    pub safety: u32,
    /// Papers left to draw.
    pub deck_size: usize,
    /// Papers discarded.
    pub discard_size: usize,
    /// Papers published.
    pub published_count: usize,
    /// Consecutive failed proposals.
    pub failed_proposals: u8,
    /// Current phase.
    pub current_phase: Phase,
    /// Terminal flag.
    pub is_game_over: bool,
    /// Winning roles once over.
    pub winners: Vec<Role>,
}

impl GameStats {
    /// Reads the summary off a state.
    pub fn from_state(state: &GameState) -> Self {
        Self {
            game_id: state.game_id.clone(),
            turn_number: state.turn_number,
            round_number: state.round_number,
            player_count: state.players.len(),
            alive_count: state.alive_count(),
            capability: state.capability,
            safety: state.safety,
            deck_size: state.deck.len(),
            discard_size: state.discard.len(),
            published_count: state.published.len(),
            failed_proposals: state.failed_proposals,
            current_phase: state.current_phase,
            is_game_over: state.is_game_over,
            winners: state.winners.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rules::initial_state;
    use crate::engine::types::GameConfig;

    fn fresh_state() -> GameState {
        let config = GameConfig {
            player_count: 7,
            player_ids: (1..=7).map(|i| format!("p{i}")).collect(),
            seed: Some(5),
        };
        initial_state("g", &config).unwrap()
    }

    #[test]
    fn safety_viewer_sees_only_own_role() {
        let state = fresh_state();
        let safety = state
            .players
            .iter()
            .find(|p| p.role == Role::Safety)
            .unwrap()
            .id
            .clone();
        let view = filtered_state_for(&state, &safety).unwrap();
        assert_eq!(view.your_role, Role::Safety);
        assert!(view.known_allies.is_empty());
        let visible_roles = view.players.iter().filter(|p| p.role.is_some()).count();
        assert_eq!(visible_roles, 1);
    }

    #[test]
    fn evil_viewers_know_each_other() {
        let state = fresh_state();
        let accel = state
            .players
            .iter()
            .find(|p| p.role == Role::Accelerationist)
            .unwrap()
            .id
            .clone();
        let view = filtered_state_for(&state, &accel).unwrap();
        // 7 players: 2 accelerationists + 1 AGI; the viewer knows the other two.
        assert_eq!(view.known_allies.len(), 2);
        let visible_roles = view.players.iter().filter(|p| p.role.is_some()).count();
        assert_eq!(visible_roles, 3);
    }

    #[test]
    fn deck_contents_are_hidden() {
        let state = fresh_state();
        let view = filtered_state_for(&state, "p1").unwrap();
        assert_eq!(view.deck_size, 17);
        assert!(view.your_hand.is_none());
    }

    #[test]
    fn hands_are_visible_to_their_holder_only() {
        let mut state = fresh_state();
        state.current_phase = Phase::Research;
        state.nominated_engineer_id = Some(state.current_director().id.clone());
        let hand: Vec<_> = state.deck.drain(..3).collect();
        state.director_cards = Some(hand.clone());

        let director = state.current_director().id.clone();
        let view = filtered_state_for(&state, &director).unwrap();
        assert_eq!(view.your_hand.as_deref(), Some(hand.as_slice()));

        let other = state
            .players
            .iter()
            .find(|p| p.id != director)
            .unwrap()
            .id
            .clone();
        let view = filtered_state_for(&state, &other).unwrap();
        assert!(view.your_hand.is_none());
    }

    #[test]
    fn unknown_viewer_gets_nothing() {
        let state = fresh_state();
        assert!(filtered_state_for(&state, "intruder").is_none());
    }
}
