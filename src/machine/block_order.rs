//! Block-ordering rounds: arrange shuffled fragments (distractors included) into
//! the canonical program. The whole arrangement is one scored item.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::{accept, reject, summarize, GameState, Phase};
use crate::domain::RoundContent;
use crate::feedback;
use crate::verify::{BlockPlacement, Verifiable};

/// Deterministic shuffle of every block (distractors included) for the current round.
pub(super) fn presented_order(state: &GameState) -> Vec<String> {
  let Some(RoundContent::BlockOrder(c)) = state.round().map(|r| &r.content) else {
    return Vec::new();
  };
  let mut ids: Vec<String> = c.blocks.iter().map(|b| b.id.clone()).collect();
  let mut rng = StdRng::seed_from_u64(state.shuffle_seed ^ (state.round_index as u64).rotate_left(32));
  ids.shuffle(&mut rng);
  ids
}

pub(super) fn submit_blocks(state: &GameState, placements: &[BlockPlacement]) -> Option<GameState> {
  if state.phase != Phase::SelectingTarget || placements.is_empty() {
    return None;
  }
  let round = state.round()?;
  let RoundContent::BlockOrder(c) = &round.content else {
    return None;
  };

  let result = c.verify(placements, &round.config);
  if result.passed {
    let mut next = accept(state, c.weight(), result)?;
    next.phase = Phase::RoundComplete;
    // No per-item review step here: the arrangement resolves the round.
    if next.is_last_round() {
      next = summarize(&next);
      next.phase = Phase::Completed;
    }
    return Some(next);
  }

  let correct = result.checks.iter().filter(|k| k.id.starts_with("position-") && k.passed).count();
  let total = c.correct_order.len();
  let notes: Vec<String> = result.checks.iter().filter(|k| !k.passed).map(|k| k.detail.clone()).collect();
  let mut next = reject(state, result, "")?;
  if !next.item.exhausted {
    next.feedback = Some(feedback::blocks_rejected(&state.settings.feedback, state.blueprint.mode, correct, total, &notes));
  }
  Some(next)
}

#[cfg(test)]
mod tests {
  use super::super::tests::{run, settings};
  use super::super::*;
  use crate::seeds;
  use crate::verify::BlockPlacement;

  fn reorder() -> GameState {
    run(GameState::new(seeds::sorting_block_order(), settings(), 42), &[Event::Start, Event::BeginSelecting])
  }

  fn canonical(s: &GameState) -> Vec<BlockPlacement> {
    let Some(crate::domain::RoundContent::BlockOrder(c)) = s.round().map(|r| &r.content) else { panic!("not blocks") };
    c.correct_order
      .iter()
      .map(|id| BlockPlacement { block_id: id.clone(), indent: c.block(id).unwrap().indent })
      .collect()
  }

  #[test]
  fn presented_order_is_a_seeded_permutation() {
    let s = reorder();
    assert_eq!(s.presented_blocks.len(), 11);
    let again = reorder();
    assert_eq!(s.presented_blocks, again.presented_blocks);
    let mut sorted = s.presented_blocks.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), 11);
  }

  #[test]
  fn canonical_order_completes_the_exercise() {
    let s = reorder();
    let placements = canonical(&s);
    assert_eq!(placements.len(), 9);
    let done = transition(&s, &Event::SubmitBlocks { placements });
    assert_eq!(done.phase, Phase::Completed);
    let report = done.report().unwrap();
    assert!(report.all_correct);
    // 200 first try + no hints, first try and zero wrong clicks bonuses.
    assert_eq!(report.total_score, 200 + 50 + 100 + 25);
  }

  #[test]
  fn wrong_indent_or_distractor_is_rejected_with_penalty() {
    let s = reorder();
    let mut wrong_indent = canonical(&s);
    wrong_indent[1].indent += 1;
    let r = transition(&s, &Event::SubmitBlocks { placements: wrong_indent });
    assert_eq!(r.phase, Phase::FixRejected);
    assert_eq!(r.scoring.total, -20);
    assert!(r.feedback.unwrap().message.starts_with("8 of 9"));

    let mut with_distractor = canonical(&s);
    with_distractor.insert(3, BlockPlacement { block_id: "d1".into(), indent: 1 });
    let r = transition(&s, &Event::SubmitBlocks { placements: with_distractor });
    assert_eq!(r.phase, Phase::FixRejected);
  }

  #[test]
  fn retry_then_success_uses_second_attempt_points() {
    let s = reorder();
    let mut reversed = canonical(&s);
    reversed.reverse();
    let s = run(s.clone(), &[Event::SubmitBlocks { placements: reversed }, Event::Retry]);
    let placements = canonical(&s);
    let s = transition(&s, &Event::SubmitBlocks { placements });
    assert_eq!(s.phase, Phase::Completed);
    assert_eq!(s.scoring.ledger[0].points, 130);
  }
}
