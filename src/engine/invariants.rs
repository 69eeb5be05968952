//! First-class invariants over the game state.
//!
//! Invariants are logical properties that must hold after every accepted
//! action. They are checked behind `debug_assertions` by the processor
//! and exercised directly by the integration tests.

use super::rules::DECK_SIZE;
use super::state::GameState;
use super::types::Phase;

/// A logical property that must hold for a given state.
pub trait Invariant<S> {
    /// Checks if the invariant holds for the given state.
    fn holds(state: &S) -> bool;

    /// Human-readable description of the invariant.
    fn description() -> &'static str;
}

/// Every paper is in exactly one pile or buffer.
pub struct PaperConservation;

impl Invariant<GameState> for PaperConservation {
    fn holds(state: &GameState) -> bool {
        state.paper_total() == DECK_SIZE
    }

    fn description() -> &'static str {
        "deck + discard + hands + published always total 17 papers"
    }
}

/// The director seat points at a living player while the game runs.
pub struct DirectorAlive;

impl Invariant<GameState> for DirectorAlive {
    fn holds(state: &GameState) -> bool {
        state.is_game_over
            || state
                .players
                .get(state.current_director_index)
                .is_some_and(|p| p.alive)
    }

    fn description() -> &'static str {
        "current_director_index refers to an alive player until game over"
    }
}

/// TeamProposal carries no research hands, and no stale ballots before a
/// nomination exists.
pub struct ProposalPhaseClean;

impl Invariant<GameState> for ProposalPhaseClean {
    fn holds(state: &GameState) -> bool {
        if state.current_phase != Phase::TeamProposal {
            return true;
        }
        let hands_clear = state.director_cards.is_none() && state.engineer_cards.is_none();
        let ballots_fresh = state.nominated_engineer_id.is_some() || state.team_votes.is_empty();
        hands_clear && ballots_fresh
    }

    fn description() -> &'static str {
        "TeamProposal has no drawn hands and no ballots before a nomination"
    }
}

/// Research hands have the documented sizes: 3 before the director
/// discard, 2 after, never both at once.
pub struct ResearchHandSizes;

impl Invariant<GameState> for ResearchHandSizes {
    fn holds(state: &GameState) -> bool {
        if state.current_phase != Phase::Research {
            return true;
        }
        if state.nominated_engineer_id.is_none() {
            return false;
        }
        match (&state.director_cards, &state.engineer_cards) {
            (Some(d), None) => d.len() == 3,
            (None, Some(e)) => e.len() == 2,
            // Both empty only while pending powers hold the phase open.
            (None, None) => !state.pending_powers.is_empty(),
            (Some(_), Some(_)) => false,
        }
    }

    fn description() -> &'static str {
        "Research holds a 3-card director hand or a 2-card engineer hand"
    }
}

/// The failure streak rests at 0..=2; the third failure is consumed by
/// auto-publish within the same action.
pub struct FailureStreakBounded;

impl Invariant<GameState> for FailureStreakBounded {
    fn holds(state: &GameState) -> bool {
        state.failed_proposals <= 2
    }

    fn description() -> &'static str {
        "failed_proposals rests in 0..=2 between actions"
    }
}

/// Game-over bookkeeping is all-or-nothing.
pub struct TerminalConsistent;

impl Invariant<GameState> for TerminalConsistent {
    fn holds(state: &GameState) -> bool {
        if state.is_game_over {
            state.current_phase == Phase::GameOver && !state.winners.is_empty()
        } else {
            state.current_phase != Phase::GameOver && state.winners.is_empty()
        }
    }

    fn description() -> &'static str {
        "is_game_over, Phase::GameOver and winners are set together"
    }
}

/// Runs every invariant and returns the descriptions of those violated.
pub fn check_all(state: &GameState) -> Vec<&'static str> {
    let mut violated = Vec::new();
    macro_rules! check {
        ($inv:ty) => {
            if !<$inv>::holds(state) {
                violated.push(<$inv as Invariant<GameState>>::description());
            }
        };
    }
    check!(PaperConservation);
    check!(DirectorAlive);
    check!(ProposalPhaseClean);
    check!(ResearchHandSizes);
    check!(FailureStreakBounded);
    check!(TerminalConsistent);
    violated
}
