//! Capability power tests: triggering windows, target resolution, and
//! the elimination win.

use secret_agi::{
    apply, check_invariants, initial_state, Action, EventKind, GameConfig, GameState, Phase,
    Role, StateChange,
};

fn new_state(player_count: usize, seed: u64) -> GameState {
    let config = GameConfig {
        player_count,
        player_ids: (1..=player_count).map(|i| format!("p{i}")).collect(),
        seed: Some(seed),
    };
    initial_state("game", &config).expect("setup failed")
}

fn step(state: &GameState, actor: &str, action: Action) -> GameState {
    let applied = apply(state, actor, &action)
        .unwrap_or_else(|e| panic!("action by {actor} rejected: {e}"));
    assert!(check_invariants(&applied.state).is_empty());
    applied.state
}

/// Puts the game mid-Research with the engineer holding a paper of the
/// given printed values (plus a filler card). Returns the paper id.
fn give_engineer_paper(state: &mut GameState, engineer: &str, capability: u32, safety: u32) -> String {
    state.current_phase = Phase::Research;
    state.nominated_engineer_id = Some(engineer.to_string());

    let pos = state
        .deck
        .iter()
        .position(|p| p.capability == capability && p.safety == safety)
        .unwrap_or_else(|| panic!("deck has a ({capability},{safety}) paper"));
    let chosen = state.deck.remove(pos);
    let filler = state.deck.remove(0);
    let discarded = state.deck.remove(0);
    state.discard.push(discarded);
    let paper_id = chosen.id.clone();
    state.engineer_cards = Some(vec![chosen, filler]);
    paper_id
}

fn power_events(state: &GameState) -> Vec<u32> {
    state
        .events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::PowerTriggered(p) => Some(p.threshold),
            _ => None,
        })
        .collect()
}

#[test]
fn capability_six_grants_an_allegiance_view() {
    let mut state = new_state(5, 31);
    state.capability = 5;
    state.safety = 2;

    let director = state.current_director().id.clone();
    let engineer = state
        .players
        .iter()
        .find(|p| p.alive && p.id != director)
        .unwrap()
        .id
        .clone();
    let paper_id = give_engineer_paper(&mut state, &engineer, 1, 1);

    let state = step(&state, &engineer, Action::PublishPaper { paper_id });
    assert_eq!(state.pending_powers, vec![6]);
    assert_eq!(state.current_phase, Phase::Research);

    // Only the director can resolve the pending power.
    assert!(apply(
        &state,
        &engineer,
        &Action::UsePower {
            target_id: Some(director.clone())
        }
    )
    .is_err());

    let target = state
        .players
        .iter()
        .find(|p| p.alive && p.id != director)
        .unwrap()
        .id
        .clone();
    let state = step(
        &state,
        &director,
        Action::UsePower {
            target_id: Some(target.clone()),
        },
    );

    let expected = state.player(&target).unwrap().allegiance;
    assert_eq!(
        state.viewed_allegiances.get(&director).and_then(|m| m.get(&target)),
        Some(&expected)
    );
    // The round moved on once the queue drained.
    assert_eq!(state.current_phase, Phase::TeamProposal);
    assert_eq!(state.round_number, 2);
    assert!(state.pending_powers.is_empty());
}

#[test]
fn allegiance_views_stay_private_to_the_viewer() {
    let mut state = new_state(5, 31);
    state.capability = 5;
    state.safety = 2;

    let director = state.current_director().id.clone();
    let engineer = state
        .players
        .iter()
        .find(|p| p.alive && p.id != director)
        .unwrap()
        .id
        .clone();
    let paper_id = give_engineer_paper(&mut state, &engineer, 1, 1);
    let state = step(&state, &engineer, Action::PublishPaper { paper_id });
    let target = engineer.clone();
    let state = step(
        &state,
        &director,
        Action::UsePower {
            target_id: Some(target.clone()),
        },
    );

    let view_event = state
        .events
        .iter()
        .find(|e| matches!(e.kind, EventKind::StateChanged(StateChange::AllegianceViewed { .. })))
        .unwrap();
    assert!(view_event.visible_to(&director, true));
    assert!(!view_event.visible_to(&target, true));

    let director_view = secret_agi::filtered_state_for(&state, &director).unwrap();
    assert_eq!(director_view.viewed_allegiances.len(), 1);
    let other_view = secret_agi::filtered_state_for(&state, &target).unwrap();
    assert!(other_view.viewed_allegiances.is_empty());
}

#[test]
fn nine_player_crossing_fires_powers_in_ascending_order() {
    let mut state = new_state(9, 17);
    state.capability = 8;
    state.safety = 8;

    let director = state.current_director().id.clone();
    let engineer = state
        .players
        .iter()
        .find(|p| p.alive && p.id != director)
        .unwrap()
        .id
        .clone();
    let paper_id = give_engineer_paper(&mut state, &engineer, 3, 0);

    let state = step(&state, &engineer, Action::PublishPaper { paper_id });

    // 8 -> 11 crosses 9, 10, and (at nine players) 11.
    assert_eq!(power_events(&state), vec![9, 10, 11]);
    assert!(state.agi_must_reveal);
    assert_eq!(state.pending_powers, vec![9, 11]);

    // Resolve C=9: pick the next director.
    let chosen = state
        .players
        .iter()
        .find(|p| p.alive && p.id != director && p.id != engineer)
        .unwrap()
        .id
        .clone();
    let state = step(
        &state,
        &director,
        Action::UsePower {
            target_id: Some(chosen.clone()),
        },
    );
    assert_eq!(state.pending_powers, vec![11]);

    // Resolve C=11: eliminate someone who is not the AGI.
    let victim = state
        .players
        .iter()
        .find(|p| p.alive && p.role != Role::Agi && p.id != director && p.id != chosen)
        .unwrap()
        .id
        .clone();
    let state = step(
        &state,
        &director,
        Action::UsePower {
            target_id: Some(victim.clone()),
        },
    );

    assert!(!state.player(&victim).unwrap().alive);
    assert!(state
        .events
        .iter()
        .any(|e| matches!(&e.kind, EventKind::StateChanged(StateChange::PlayerEliminated { player_id, .. }) if *player_id == victim)));

    // Queue drained: the chosen director takes the next round.
    assert!(!state.is_game_over);
    assert_eq!(state.current_phase, Phase::TeamProposal);
    assert_eq!(state.current_director().id, chosen);
}

#[test]
fn eliminating_the_agi_wins_for_safety() {
    let mut state = new_state(9, 23);
    state.capability = 10;
    state.safety = 9;

    let director = state.current_director().id.clone();
    let agi = state
        .players
        .iter()
        .find(|p| p.role == Role::Agi)
        .unwrap()
        .id
        .clone();
    let engineer = state
        .players
        .iter()
        .find(|p| p.alive && p.id != director && p.id != agi)
        .unwrap()
        .id
        .clone();
    let paper_id = give_engineer_paper(&mut state, &engineer, 1, 2);

    // 10 -> 11 queues only the elimination power.
    let state = step(&state, &engineer, Action::PublishPaper { paper_id });
    assert_eq!(state.pending_powers, vec![11]);

    let state = step(&state, &director, Action::UsePower { target_id: Some(agi) });
    assert!(state.is_game_over);
    assert_eq!(state.winners, vec![Role::Safety]);
}

#[test]
fn capability_twelve_unlocks_veto_permanently() {
    let mut state = new_state(5, 41);
    state.capability = 11;
    state.safety = 6;

    let director = state.current_director().id.clone();
    let engineer = state
        .players
        .iter()
        .find(|p| p.alive && p.id != director)
        .unwrap()
        .id
        .clone();
    let paper_id = give_engineer_paper(&mut state, &engineer, 1, 1);
    assert!(!state.veto_unlocked);

    let state = step(&state, &engineer, Action::PublishPaper { paper_id });

    // At five players the C=11 power is size-gated away; only 12 fires.
    assert_eq!(power_events(&state), vec![12]);
    assert!(state.veto_unlocked);
    assert!(state.pending_powers.is_empty());
    assert_eq!(state.current_phase, Phase::TeamProposal);
}
