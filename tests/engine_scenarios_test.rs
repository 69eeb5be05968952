//! Scenario tests for the pure engine: proposal failures, veto,
//! emergency safety, and win-condition edges.

use secret_agi::{
    apply, check_invariants, initial_state, Action, ActionKind, ErrorCode, EventKind,
    GameConfig, GameState, Phase, Role,
};

fn config(player_count: usize, seed: u64) -> GameConfig {
    GameConfig {
        player_count,
        player_ids: (1..=player_count).map(|i| format!("p{i}")).collect(),
        seed: Some(seed),
    }
}

fn new_state(player_count: usize, seed: u64) -> GameState {
    initial_state("game", &config(player_count, seed)).expect("setup failed")
}

/// Applies an action that is expected to be valid.
fn step(state: &GameState, actor: &str, action: Action) -> GameState {
    let applied = apply(state, actor, &action)
        .unwrap_or_else(|e| panic!("action by {actor} rejected: {e}"));
    assert!(
        check_invariants(&applied.state).is_empty(),
        "invariants violated: {:?}",
        check_invariants(&applied.state)
    );
    applied.state
}

/// Every living player votes the same way on the current team.
fn vote_all_team(mut state: GameState, approve: bool) -> GameState {
    let voters: Vec<String> = state
        .players
        .iter()
        .filter(|p| p.alive)
        .map(|p| p.id.clone())
        .collect();
    for voter in voters {
        state = step(&state, &voter, Action::VoteTeam { approve });
    }
    state
}

/// Every living player votes the same way on emergency safety.
fn vote_all_emergency(mut state: GameState, approve: bool) -> GameState {
    let voters: Vec<String> = state
        .players
        .iter()
        .filter(|p| p.alive)
        .map(|p| p.id.clone())
        .collect();
    for voter in voters {
        state = step(&state, &voter, Action::VoteEmergency { approve });
    }
    state
}

fn eligible_target(state: &GameState) -> String {
    state
        .players
        .iter()
        .find(|p| p.alive && !p.was_last_engineer)
        .expect("someone is eligible")
        .id
        .clone()
}

fn published_events(state: &GameState) -> Vec<&secret_agi::PaperPublished> {
    state
        .events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::PaperPublished(p) => Some(p),
            _ => None,
        })
        .collect()
}

#[test]
fn three_failed_proposals_trigger_exactly_one_auto_publish() {
    let mut state = new_state(5, 42);

    for failure in 1..=3u8 {
        let director = state.current_director().id.clone();
        let target = eligible_target(&state);
        state = step(&state, &director, Action::Nominate { target_id: target });
        state = vote_all_team(state, false);

        if failure < 3 {
            assert_eq!(state.failed_proposals, failure);
            assert!(state.published.is_empty());
        }
    }

    // Third failure: forced publication, counter reset, eligibility reset.
    assert_eq!(state.failed_proposals, 0);
    let published = published_events(&state);
    assert_eq!(published.len(), 1);
    assert!(published[0].auto_published);
    assert!(state.players.iter().all(|p| !p.was_last_engineer));
    assert_eq!(state.deck.len(), 16);
    assert_eq!(state.discard.len(), 1);
    assert_eq!(state.current_phase, Phase::TeamProposal);
}

#[test]
fn approved_team_enters_research_with_three_cards() {
    let mut state = new_state(5, 42);
    let director = state.current_director().id.clone();
    let target = eligible_target(&state);
    state = step(&state, &director, Action::Nominate { target_id: target.clone() });
    state = vote_all_team(state, true);

    assert_eq!(state.current_phase, Phase::Research);
    assert_eq!(state.failed_proposals, 0);
    assert_eq!(state.director_cards.as_ref().map(Vec::len), Some(3));
    assert_eq!(state.deck.len(), 14);
    assert_eq!(state.nominated_engineer_id.as_deref(), Some(target.as_str()));
}

#[test]
fn agreed_veto_scraps_the_round_without_moving_the_meters() {
    let mut state = new_state(5, 7);
    state.veto_unlocked = true;

    let director = state.current_director().id.clone();
    let engineer = state
        .players
        .iter()
        .find(|p| p.alive && p.id != director)
        .unwrap()
        .id
        .clone();
    state = step(
        &state,
        &director,
        Action::Nominate {
            target_id: engineer.clone(),
        },
    );
    state = vote_all_team(state, true);

    let discard_pile_before = state.discard.len();
    let to_discard = state.director_cards.as_ref().unwrap()[0].id.clone();
    state = step(&state, &director, Action::DiscardPaper { paper_id: to_discard });
    state = step(&state, &engineer, Action::DeclareVeto);
    assert!(state.veto_declared);

    // Engineer cannot publish past a declared veto.
    let paper = state.engineer_cards.as_ref().unwrap()[0].id.clone();
    let err = apply(&state, &engineer, &Action::PublishPaper { paper_id: paper }).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidPhase);

    state = step(&state, &director, Action::RespondVeto { agree: true });

    // All three drawn papers end up in the discard pile.
    assert_eq!(state.discard.len(), discard_pile_before + 3);
    assert_eq!(state.failed_proposals, 1);
    assert_eq!(state.current_phase, Phase::TeamProposal);
    assert_eq!(state.capability, 0);
    assert_eq!(state.safety, 0);
    assert!(state.engineer_cards.is_none());
    assert!(state.director_cards.is_none());
}

#[test]
fn refused_veto_forces_publication() {
    let mut state = new_state(5, 7);
    state.veto_unlocked = true;

    let director = state.current_director().id.clone();
    let engineer = state
        .players
        .iter()
        .find(|p| p.alive && p.id != director)
        .unwrap()
        .id
        .clone();
    state = step(
        &state,
        &director,
        Action::Nominate {
            target_id: engineer.clone(),
        },
    );
    state = vote_all_team(state, true);
    let to_discard = state.director_cards.as_ref().unwrap()[0].id.clone();
    state = step(&state, &director, Action::DiscardPaper { paper_id: to_discard });
    state = step(&state, &engineer, Action::DeclareVeto);
    state = step(&state, &director, Action::RespondVeto { agree: false });

    // A second declaration this round is rejected.
    let err = apply(&state, &engineer, &Action::DeclareVeto).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidPhase);

    // Publication proceeds normally.
    let paper = state.engineer_cards.as_ref().unwrap()[0].clone();
    state = step(&state, &engineer, Action::PublishPaper { paper_id: paper.id });
    assert_eq!(published_events(&state).len(), 1);
}

#[test]
fn emergency_safety_reduces_the_next_publication_by_one() {
    let mut state = new_state(5, 21);
    state.capability = 6;
    state.safety = 2;

    // Put a (3, 1) paper on top of the deck so it lands in the hand.
    let pos = state
        .deck
        .iter()
        .position(|p| p.capability == 3 && p.safety == 1)
        .expect("deck contains a (3,1) paper");
    let strong = state.deck.remove(pos);
    state.deck.insert(0, strong);

    let caller = state.players[0].id.clone();
    state = step(&state, &caller, Action::CallEmergencySafety);
    assert!(state.emergency_vote_open);
    state = vote_all_emergency(state, true);
    assert!(state.emergency_safety_active);
    assert!(!state.emergency_vote_open);

    // A second call this round is rejected.
    let err = apply(&state, &caller, &Action::CallEmergencySafety).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidPhase);

    let director = state.current_director().id.clone();
    let engineer = state
        .players
        .iter()
        .find(|p| p.alive && p.id != director)
        .unwrap()
        .id
        .clone();
    state = step(
        &state,
        &director,
        Action::Nominate {
            target_id: engineer.clone(),
        },
    );
    state = vote_all_team(state, true);

    let hand = state.director_cards.clone().unwrap();
    let target_paper = hand
        .iter()
        .find(|p| p.capability == 3 && p.safety == 1)
        .expect("stacked paper drawn")
        .clone();
    let discard = hand.iter().find(|p| p.id != target_paper.id).unwrap().id.clone();
    state = step(&state, &director, Action::DiscardPaper { paper_id: discard });
    state = step(
        &state,
        &engineer,
        Action::PublishPaper {
            paper_id: target_paper.id.clone(),
        },
    );

    // Printed (3, 1), applied (2, 1); the one-shot flag is consumed.
    assert_eq!(state.capability, 8);
    assert_eq!(state.safety, 3);
    assert!(!state.emergency_safety_active);
    let published = published_events(&state);
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].capability_delta, 2);
    assert_eq!(published[0].safety_delta, 1);
}

#[test]
fn agi_engineer_at_capability_eight_ends_the_game_at_approval() {
    let mut state = new_state(7, 13);
    state.capability = 8;
    state.safety = 7;

    let agi = state
        .players
        .iter()
        .find(|p| p.role == Role::Agi)
        .unwrap()
        .id
        .clone();
    let director = state.current_director().id.clone();
    state = step(&state, &director, Action::Nominate { target_id: agi });
    state = vote_all_team(state, true);

    assert!(state.is_game_over);
    assert_eq!(state.current_phase, Phase::GameOver);
    assert_eq!(state.winners, vec![Role::Accelerationist, Role::Agi]);
    // Research never started.
    assert!(state.director_cards.is_none());
    assert_eq!(state.deck.len(), 17);

    // No further actions are accepted.
    let err = apply(&state, &director, &Action::Observe).unwrap_err();
    assert_eq!(err.code, ErrorCode::GameOver);
}

#[test]
fn simultaneous_safety_and_evil_conditions_resolve_to_evil() {
    let mut state = new_state(5, 99);
    state.capability = 19;
    state.safety = 14;
    state.current_phase = Phase::Research;

    let director = state.current_director().id.clone();
    let engineer = state
        .players
        .iter()
        .find(|p| p.alive && p.id != director)
        .unwrap()
        .id
        .clone();
    state.nominated_engineer_id = Some(engineer.clone());

    // Hand the engineer a (3, 1) paper; keep paper conservation intact.
    let pos = state
        .deck
        .iter()
        .position(|p| p.capability == 3 && p.safety == 1)
        .unwrap();
    let strong = state.deck.remove(pos);
    let filler = state.deck.remove(0);
    let discarded = state.deck.remove(0);
    state.discard.push(discarded);
    state.engineer_cards = Some(vec![strong.clone(), filler]);

    // Publishing (3, 1) reaches safety 15 and a capability lead of 6
    // in the same step.
    let state = step(
        &state,
        &engineer,
        Action::PublishPaper {
            paper_id: strong.id,
        },
    );
    assert!(state.is_game_over);
    assert_eq!(state.winners, vec![Role::Accelerationist, Role::Agi]);
}

#[test]
fn turn_number_counts_only_accepted_actions() {
    let state = new_state(5, 8);
    let director = state.current_director().id.clone();
    let outsider = state
        .players
        .iter()
        .find(|p| p.id != director)
        .unwrap()
        .id
        .clone();

    // Invalid attempt leaves the state untouched.
    assert!(apply(
        &state,
        &outsider,
        &Action::Nominate {
            target_id: director.clone()
        }
    )
    .is_err());
    assert_eq!(state.turn_number, 0);

    let next = step(
        &state,
        &director,
        Action::Nominate {
            target_id: outsider,
        },
    );
    assert_eq!(next.turn_number, 1);
}

#[test]
fn chat_is_recorded_without_changing_the_game() {
    let state = new_state(5, 4);
    let speaker = state.players[1].id.clone();
    let next = step(
        &state,
        &speaker,
        Action::SendChatMessage {
            text: "watch the director".into(),
        },
    );
    assert_eq!(next.turn_number, state.turn_number + 1);
    assert_eq!(next.current_phase, state.current_phase);
    assert_eq!(next.deck, state.deck);
    assert!(next
        .events
        .iter()
        .any(|e| matches!(&e.kind, EventKind::ChatMessage(c) if c.message == "watch the director")));
}

#[test]
fn observe_is_a_pure_read_with_a_turn_increment() {
    let state = new_state(5, 4);
    let viewer = state.players[0].id.clone();
    let next = step(&state, &viewer, Action::Observe);
    assert_eq!(next.turn_number, 1);
    assert_eq!(next.capability, state.capability);
    assert_eq!(next.current_phase, state.current_phase);
    assert!(secret_agi::valid_actions(&next, &viewer).contains(&ActionKind::Observe));
}
