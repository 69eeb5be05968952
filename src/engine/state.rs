//! The versioned game-state aggregate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::events::{EventKind, GameEvent};
use super::types::{Allegiance, Paper, Phase, Player, PlayerId, Role};

/// Complete state of one game, treated as a value.
///
/// The action processor consumes a state and returns a new one; a state
/// handed out to callers or to the snapshot store is never mutated again.
/// Ordered maps keep the canonical JSON serialization stable, which the
/// snapshot checksum relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Owning game id.
    pub game_id: String,
    /// Count of accepted actions since creation; snapshot key.
    pub turn_number: u32,
    /// Round counter; a round ends when a paper is published.
    pub round_number: u32,

    /// Fixed seating order.
    pub players: Vec<Player>,

    /// Capability meter.
    pub capability: u32,
    /// Safety meter.
    pub safety: u32,

    /// Draw pile; index 0 is the top.
    pub deck: Vec<Paper>,
    /// Face-down discard pile.
    pub discard: Vec<Paper>,
    /// Papers published by engineers, in publication order.
    pub published: Vec<Paper>,

    /// Seat index of the current director; always a living player.
    pub current_director_index: usize,
    /// Consecutive failed team proposals, 0 through 2 between publications.
    pub failed_proposals: u8,

    /// Top-level phase.
    pub current_phase: Phase,

    /// Set between nomination and the end of the Research phase.
    pub nominated_engineer_id: Option<PlayerId>,
    /// Director's drawn hand of 3; present only before the discard.
    pub director_cards: Option<Vec<Paper>>,
    /// Engineer's hand of 2; present only after the director discard.
    pub engineer_cards: Option<Vec<Paper>>,

    /// Ballot on the current nomination.
    pub team_votes: BTreeMap<PlayerId, bool>,
    /// Ballot on the current emergency safety call.
    pub emergency_votes: BTreeMap<PlayerId, bool>,
    /// True while an emergency vote is collecting ballots.
    pub emergency_vote_open: bool,
    /// Latch preventing a second call in the same round.
    pub emergency_safety_called_this_round: bool,

    /// Permanent once set by the capability-12 power.
    pub veto_unlocked: bool,
    /// One-shot modifier consumed by the next publication.
    pub emergency_safety_active: bool,
    /// Permanent once set by the capability-10 power.
    pub agi_must_reveal: bool,

    /// True between `declare_veto` and the director's response.
    pub veto_declared: bool,
    /// True after a refused veto; blocks a second declaration this phase.
    pub veto_refused: bool,

    /// Target-requiring power thresholds awaiting `use_power`, ascending.
    pub pending_powers: Vec<u32>,
    /// Director chosen by the capability-9 power for the next round.
    pub next_director_override: Option<PlayerId>,

    /// viewer id -> (target id -> allegiance seen).
    pub viewed_allegiances: BTreeMap<PlayerId, BTreeMap<PlayerId, Allegiance>>,

    /// Terminal flag; no transitions are accepted once set.
    pub is_game_over: bool,
    /// Winning roles, set together with `is_game_over`.
    pub winners: Vec<Role>,

    /// Ordered event log since creation.
    pub events: Vec<GameEvent>,
}

impl GameState {
    /// Creates an empty pre-setup state for the given game id.
    pub fn new(game_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            turn_number: 0,
            round_number: 1,
            players: Vec::new(),
            capability: 0,
            safety: 0,
            deck: Vec::new(),
            discard: Vec::new(),
            published: Vec::new(),
            current_director_index: 0,
            failed_proposals: 0,
            current_phase: Phase::TeamProposal,
            nominated_engineer_id: None,
            director_cards: None,
            engineer_cards: None,
            team_votes: BTreeMap::new(),
            emergency_votes: BTreeMap::new(),
            emergency_vote_open: false,
            emergency_safety_called_this_round: false,
            veto_unlocked: false,
            emergency_safety_active: false,
            agi_must_reveal: false,
            veto_declared: false,
            veto_refused: false,
            pending_powers: Vec::new(),
            next_director_override: None,
            viewed_allegiances: BTreeMap::new(),
            is_game_over: false,
            winners: Vec::new(),
            events: Vec::new(),
        }
    }

    /// The current director.
    ///
    /// Seat bounds are an engine invariant; an out-of-range index is a bug
    /// upstream, so this indexes directly.
    pub fn current_director(&self) -> &Player {
        &self.players[self.current_director_index]
    }

    /// All living players in seating order.
    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.alive)
    }

    /// Count of living players.
    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }

    /// Looks up a player by id.
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Looks up a player by id, mutably.
    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Seat index of a player id.
    pub fn seat_index(&self, id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    /// The AGI player. Exactly one exists after setup.
    pub fn agi_player(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.role == Role::Agi)
    }

    /// Seat index of the next living director in clockwise rotation.
    pub fn next_director_index(&self) -> usize {
        let alive: Vec<usize> = self
            .players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.alive)
            .map(|(i, _)| i)
            .collect();
        let pos = alive
            .iter()
            .position(|&i| i == self.current_director_index)
            .unwrap_or(0);
        alive[(pos + 1) % alive.len()]
    }

    /// Appends an event at the current turn number.
    pub fn push_event(&mut self, kind: EventKind, actor: Option<PlayerId>) {
        let event = GameEvent::new(kind, actor, self.turn_number);
        self.events.push(event);
    }

    /// Total papers across every pile and buffer. Must always equal the
    /// deck size the game was set up with.
    pub fn paper_total(&self) -> usize {
        self.deck.len()
            + self.discard.len()
            + self.published.len()
            + self.director_cards.as_ref().map_or(0, Vec::len)
            + self.engineer_cards.as_ref().map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::Role;

    fn five_players() -> Vec<Player> {
        let roles = [
            Role::Safety,
            Role::Safety,
            Role::Safety,
            Role::Accelerationist,
            Role::Agi,
        ];
        roles
            .iter()
            .enumerate()
            .map(|(i, role)| Player::new(format!("p{}", i + 1), *role))
            .collect()
    }

    #[test]
    fn rotation_skips_eliminated_seats() {
        let mut state = GameState::new("g");
        state.players = five_players();
        state.current_director_index = 0;
        state.players[1].alive = false;

        assert_eq!(state.next_director_index(), 2);
    }

    #[test]
    fn rotation_wraps_around_the_table() {
        let mut state = GameState::new("g");
        state.players = five_players();
        state.current_director_index = 4;

        assert_eq!(state.next_director_index(), 0);
    }

    #[test]
    fn serialization_round_trips_structurally() {
        let mut state = GameState::new("g1");
        state.players = five_players();
        state.deck.push(Paper::new("paper_0", 1, 2));
        state
            .viewed_allegiances
            .entry("p1".into())
            .or_default()
            .insert("p5".into(), Allegiance::Acceleration);

        let json = serde_json::to_string(&state).unwrap();
        let back: GameState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
