//! Pure rule functions: setup, tallies, power triggers, win evaluation.
//!
//! Nothing in this module performs I/O or touches persistence; every
//! function is deterministic given its inputs (setup takes its RNG from
//! the caller).

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

use super::state::GameState;
use super::types::{GameConfig, Paper, Player, PlayerId, Role};

/// Number of papers in the canonical deck.
pub const DECK_SIZE: usize = 17;

/// Capability thresholds that trigger powers, ascending.
pub const POWER_THRESHOLDS: [u32; 6] = [3, 6, 9, 10, 11, 12];

/// Builds the canonical 17-paper deck, unshuffled.
///
/// Multiplicities: 3x (0,2); 2x each of (1,2), (1,3), (1,1), (2,2),
/// (3,0), (2,1), (3,1).
pub fn standard_deck() -> Vec<Paper> {
    let counts: [(u32, u32, usize); 8] = [
        (0, 2, 3),
        (1, 2, 2),
        (1, 3, 2),
        (1, 1, 2),
        (2, 2, 2),
        (3, 0, 2),
        (2, 1, 2),
        (3, 1, 2),
    ];
    let mut papers = Vec::with_capacity(DECK_SIZE);
    for (capability, safety, count) in counts {
        for _ in 0..count {
            papers.push(Paper::new(
                format!("paper_{}", papers.len()),
                capability,
                safety,
            ));
        }
    }
    papers
}

/// Role counts `(safety, accelerationist, agi)` for a player count.
pub fn role_distribution(player_count: usize) -> Option<(usize, usize, usize)> {
    match player_count {
        5 => Some((3, 1, 1)),
        6 => Some((4, 1, 1)),
        7 => Some((4, 2, 1)),
        8 => Some((5, 2, 1)),
        9 => Some((5, 3, 1)),
        10 => Some((6, 3, 1)),
        _ => None,
    }
}

/// Builds the initial state for a validated config: roles dealt, deck
/// shuffled, and starting director drawn from the config's seed.
pub fn initial_state(game_id: &str, config: &GameConfig) -> Result<GameState, String> {
    config.validate()?;

    let mut rng = match config.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };

    let (safety_count, accel_count, agi_count) = role_distribution(config.player_count)
        .ok_or_else(|| format!("no role distribution for {} players", config.player_count))?;

    let mut roles = Vec::with_capacity(config.player_count);
    roles.extend(std::iter::repeat(Role::Safety).take(safety_count));
    roles.extend(std::iter::repeat(Role::Accelerationist).take(accel_count));
    roles.extend(std::iter::repeat(Role::Agi).take(agi_count));
    roles.shuffle(&mut rng);

    let mut state = GameState::new(game_id);
    state.players = config
        .player_ids
        .iter()
        .zip(roles)
        .map(|(id, role)| Player::new(id.clone(), role))
        .collect();

    let mut deck = standard_deck();
    deck.shuffle(&mut rng);
    state.deck = deck;

    state.current_director_index = rng.gen_range(0..config.player_count);

    Ok(state)
}

/// Players currently eligible for nomination: alive and not the most
/// recent engineer.
pub fn eligible_engineers(state: &GameState) -> Vec<PlayerId> {
    state
        .alive_players()
        .filter(|p| !p.was_last_engineer)
        .map(|p| p.id.clone())
        .collect()
}

/// Clears every player's `was_last_engineer` flag. Runs on successful
/// team formation and after an auto-publish.
pub fn reset_engineer_eligibility(state: &mut GameState) {
    for player in &mut state.players {
        player.was_last_engineer = false;
    }
}

/// Whether emergency safety may be called: the capability lead over
/// safety is exactly 4 or 5.
pub fn emergency_safety_callable(state: &GameState) -> bool {
    let lead = state.capability as i64 - state.safety as i64;
    lead == 4 || lead == 5
}

/// Whether every living player has cast a ballot.
pub fn vote_complete(state: &GameState, votes: &BTreeMap<PlayerId, bool>) -> bool {
    state.alive_players().all(|p| votes.contains_key(&p.id))
}

/// Tallies a completed ballot among living players: strict majority of
/// yes votes carries; ties fail.
pub fn vote_passes(state: &GameState, votes: &BTreeMap<PlayerId, bool>) -> (bool, usize, usize) {
    let mut yes = 0;
    let mut total = 0;
    for player in state.alive_players() {
        if let Some(vote) = votes.get(&player.id) {
            total += 1;
            if *vote {
                yes += 1;
            }
        }
    }
    (yes * 2 > total, yes, total)
}

/// Thresholds fired by a capability increase from `c_old` to `c_new`,
/// ascending. The 3 and 11 powers exist only in 9-10 player games.
pub fn powers_triggered(c_old: u32, c_new: u32, player_count: usize) -> Vec<u32> {
    POWER_THRESHOLDS
        .iter()
        .copied()
        .filter(|&t| !size_gated(t) || player_count >= 9)
        .filter(|&t| c_old < t && t <= c_new)
        .collect()
}

/// Whether a threshold only exists in 9-10 player games.
pub fn size_gated(threshold: u32) -> bool {
    threshold == 3 || threshold == 11
}

/// Whether a threshold's power needs a director-supplied target.
pub fn requires_target(threshold: u32) -> bool {
    matches!(threshold, 3 | 6 | 9 | 11)
}

/// Short public description of a power, used in event payloads.
pub fn power_effect(threshold: u32) -> &'static str {
    match threshold {
        3 | 6 => "director views a player's allegiance",
        9 => "director chooses the next director",
        10 => "the AGI must reveal itself when asked",
        11 => "director eliminates a player",
        12 => "veto power unlocked",
        _ => "unknown power",
    }
}

/// Evaluates every win condition that can be read off the state.
///
/// `deck_moment` marks a point where the engine would otherwise need to
/// draw or conclude a round; only then does an empty deck end the game.
/// All conditions are collected simultaneously and a non-empty evil set
/// beats a non-empty safety set. The AGI-engineer condition is checked
/// at team approval by the processor, not here.
pub fn evaluate_winners(state: &GameState, deck_moment: bool) -> Option<Vec<Role>> {
    let mut safety_wins = false;
    let mut evil_wins = false;

    if state.capability == 10 && state.safety >= state.capability {
        safety_wins = true;
    }
    if state.safety >= 15 {
        safety_wins = true;
    }
    if state.agi_player().is_some_and(|agi| !agi.alive) {
        safety_wins = true;
    }

    if state.capability >= 15 && state.safety < 10 {
        evil_wins = true;
    }
    if state.capability as i64 - state.safety as i64 >= 6 {
        evil_wins = true;
    }

    if deck_moment && state.deck.is_empty() && !safety_wins && !evil_wins {
        if state.safety >= state.capability {
            safety_wins = true;
        } else {
            evil_wins = true;
        }
    }

    if evil_wins {
        Some(evil_winners())
    } else if safety_wins {
        Some(vec![Role::Safety])
    } else {
        None
    }
}

/// The winner set for an evil victory.
pub fn evil_winners() -> Vec<Role> {
    vec![Role::Accelerationist, Role::Agi]
}
