//! Simulation policies: pick an action for whoever must act next.
//!
//! Policies see only the acting player's filtered view, the same
//! information a real agent would get. The random policy is the
//! reference implementation used by completeness tests.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::actions::Action;
use super::types::ActionKind;
use super::view::FilteredState;

/// Chooses an action for the acting player.
pub trait Policy {
    /// Picks one of `valid` for the player whose view this is, with any
    /// parameters filled in. Returning `None` skips the player.
    fn choose(&mut self, view: &FilteredState, valid: &[ActionKind]) -> Option<Action>;
}

/// Uniformly random but well-formed choices.
#[derive(Debug)]
pub struct RandomPolicy {
    rng: SmallRng,
}

impl RandomPolicy {
    /// A policy with a deterministic seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// A policy seeded from entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }
}

impl Policy for RandomPolicy {
    fn choose(&mut self, view: &FilteredState, valid: &[ActionKind]) -> Option<Action> {
        let substantive: Vec<ActionKind> = valid
            .iter()
            .copied()
            .filter(|k| !matches!(k, ActionKind::Observe | ActionKind::SendChatMessage))
            .collect();
        let kind = *substantive.choose(&mut self.rng)?;

        match kind {
            ActionKind::Nominate => {
                let eligible: Vec<&str> = view
                    .players
                    .iter()
                    .filter(|p| p.alive && !p.was_last_engineer)
                    .map(|p| p.id.as_str())
                    .collect();
                let target = eligible.choose(&mut self.rng)?;
                Some(Action::Nominate {
                    target_id: target.to_string(),
                })
            }
            ActionKind::VoteTeam => Some(Action::VoteTeam {
                approve: self.rng.gen_bool(0.5),
            }),
            ActionKind::CallEmergencySafety => Some(Action::CallEmergencySafety),
            ActionKind::VoteEmergency => Some(Action::VoteEmergency {
                approve: self.rng.gen_bool(0.5),
            }),
            ActionKind::DiscardPaper => {
                let hand = view.your_hand.as_ref()?;
                let paper = hand.choose(&mut self.rng)?;
                Some(Action::DiscardPaper {
                    paper_id: paper.id.clone(),
                })
            }
            ActionKind::PublishPaper => {
                let hand = view.your_hand.as_ref()?;
                let paper = hand.choose(&mut self.rng)?;
                Some(Action::PublishPaper {
                    paper_id: paper.id.clone(),
                })
            }
            ActionKind::DeclareVeto => Some(Action::DeclareVeto),
            ActionKind::RespondVeto => Some(Action::RespondVeto {
                agree: self.rng.gen_bool(0.5),
            }),
            ActionKind::UsePower => {
                let targets: Vec<&str> = view
                    .players
                    .iter()
                    .filter(|p| p.alive && p.id != view.current_director_id)
                    .map(|p| p.id.as_str())
                    .collect();
                let target = targets.choose(&mut self.rng)?;
                Some(Action::UsePower {
                    target_id: Some(target.to_string()),
                })
            }
            ActionKind::SendChatMessage | ActionKind::Observe => None,
        }
    }
}
