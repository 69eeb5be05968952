//! Randomized completeness tests: seeded games must run to completion
//! with every invariant holding at every accepted action.

use secret_agi::{
    apply, check_invariants, filtered_state_for, initial_state, next_actor, valid_actions,
    EventKind, GameConfig, GameState, Policy, RandomPolicy,
};

fn new_state(player_count: usize, seed: u64) -> GameState {
    let config = GameConfig {
        player_count,
        player_ids: (1..=player_count).map(|i| format!("p{i}")).collect(),
        seed: Some(seed),
    };
    initial_state("game", &config).expect("setup failed")
}

fn published_count(state: &GameState) -> usize {
    state
        .events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::PaperPublished(_)))
        .count()
}

/// Drives a game with the random policy, checking invariants and flag
/// monotonicity after every accepted action.
fn run_checked(player_count: usize, seed: u64) -> GameState {
    let mut state = new_state(player_count, seed);
    let mut policy = RandomPolicy::seeded(seed);

    while !state.is_game_over && state.turn_number < 1000 {
        let actor = next_actor(&state).expect("someone can always act in a live game");
        let valid = valid_actions(&state, &actor);
        let view = filtered_state_for(&state, &actor).expect("actor has a view");
        let action = policy
            .choose(&view, &valid)
            .expect("policy finds an action");

        let applied = apply(&state, &actor, &action)
            .unwrap_or_else(|e| panic!("policy produced an invalid action: {e}"));
        let next = applied.state;

        let violated = check_invariants(&next);
        assert!(violated.is_empty(), "invariants violated: {violated:?}");
        assert_eq!(next.turn_number, state.turn_number + 1);

        // Meters never decrease; unlocked flags never clear.
        assert!(next.capability >= state.capability);
        assert!(next.safety >= state.safety);
        if state.veto_unlocked {
            assert!(next.veto_unlocked);
        }
        if state.agi_must_reveal {
            assert!(next.agi_must_reveal);
        }

        state = next;
    }

    assert!(state.is_game_over, "game did not finish within the cap");
    state
}

#[test]
fn five_player_seeded_game_runs_to_completion() {
    let state = run_checked(5, 42);
    assert!(!state.winners.is_empty());
    let published = published_count(&state);
    assert!(
        (1..=17).contains(&published),
        "unexpected publication count {published}"
    );
}

#[test]
fn all_table_sizes_complete_across_seeds() {
    for player_count in 5..=10 {
        for seed in 0..5 {
            let state = run_checked(player_count, seed);
            assert!(
                !state.winners.is_empty(),
                "{player_count} players seed {seed} ended without winners"
            );
        }
    }
}

#[test]
fn same_seed_same_outcome() {
    let a = run_checked(6, 7);
    let b = run_checked(6, 7);
    assert_eq!(a.winners, b.winners);
    assert_eq!(a.turn_number, b.turn_number);
    assert_eq!(a.capability, b.capability);
    assert_eq!(a.safety, b.safety);
}

#[test]
fn finished_games_reject_everything_with_game_over() {
    use secret_agi::{Action, ErrorCode};

    let state = run_checked(5, 3);
    for player in &state.players {
        let err = apply(&state, &player.id, &Action::Observe).unwrap_err();
        assert_eq!(err.code, ErrorCode::GameOver);
        assert!(valid_actions(&state, &player.id).is_empty());
    }
}
