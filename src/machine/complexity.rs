//! Complexity rounds: pick the Big-O label, and for bottleneck questions also
//! the code section responsible for it.

use super::{accept, reject, GameState, Phase};
use crate::domain::Challenge;
use crate::verify::{ChoiceAnswer, Verifiable};

fn active(state: &GameState) -> Option<&Challenge> {
  state.round()?.challenge(state.item_index)
}

pub(super) fn select_section(state: &GameState, section_id: &str) -> Option<GameState> {
  if state.phase != Phase::SelectingTarget {
    return None;
  }
  let ch = active(state)?;
  if !ch.sections.iter().any(|s| s.id == section_id) || state.section_choice.as_deref() == Some(section_id) {
    return None;
  }
  let mut next = state.clone();
  next.section_choice = Some(section_id.to_string());
  Some(next)
}

pub(super) fn submit_answer(state: &GameState, option_id: &str) -> Option<GameState> {
  if state.phase != Phase::SelectingTarget {
    return None;
  }
  let round = state.round()?;
  let ch = active(state)?;
  if ch.option(option_id).is_none() {
    return None;
  }

  let answer = ChoiceAnswer { option_id: option_id.to_string(), section_id: state.section_choice.clone() };
  let result = ch.verify(&answer, &round.config);
  if result.passed {
    return accept(state, ch.weight(), result);
  }
  let detail = match result.checks.iter().find(|c| !c.passed).map(|c| c.id.as_str()) {
    Some("section") => "That section is not where the time goes.".to_string(),
    _ => ch.explanation.clone(),
  };
  reject(state, result, &detail)
}

#[cfg(test)]
mod tests {
  use super::super::tests::{run, settings};
  use super::super::*;
  use crate::seeds;

  fn analyzer() -> GameState {
    run(GameState::new(seeds::bottleneck_complexity(), settings(), 5), &[Event::Start, Event::BeginSelecting])
  }

  fn answer(option: &str) -> Event {
    Event::SubmitAnswer { option_id: option.into() }
  }

  fn section(id: &str) -> Event {
    Event::SelectSection { section_id: id.into() }
  }

  #[test]
  fn correct_label_in_wrong_section_is_incorrect() {
    let s = run(analyzer(), &[section("sec-read"), answer("o-n2")]);
    assert_eq!(s.phase, Phase::FixRejected);
    assert!(!s.last_result.as_ref().unwrap().passed);
    assert_eq!(s.scoring.total, -15);
  }

  #[test]
  fn label_and_section_both_correct_is_accepted() {
    let s = run(analyzer(), &[section("sec-pairs"), answer("o-n2")]);
    assert_eq!(s.phase, Phase::FixAccepted);
    // difficulty 2 → 100 * 1.5
    assert_eq!(s.scoring.total, 150);
  }

  #[test]
  fn unknown_section_or_option_is_ignored() {
    let s = analyzer();
    assert_eq!(transition(&s, &section("nope")), s);
    assert_eq!(transition(&s, &answer("nope")), s);
  }

  #[test]
  fn hints_reduce_the_award() {
    let s = run(analyzer(), &[Event::UseHint { tier: 2 }, section("sec-pairs"), answer("o-n2")]);
    // 100 * 1.5 * 0.70
    assert_eq!(s.scoring.total, 105);
    assert_eq!(s.scoring.ledger[0].hints_used, 1);
  }

  #[test]
  fn full_walkthrough_reaches_completed_with_bonuses_once() {
    let s = run(
      analyzer(),
      &[section("sec-pairs"), answer("o-n2"), Event::Advance, answer("o-n"), Event::Advance],
    );
    assert_eq!(s.phase, Phase::RoundComplete);
    let summary = transition(&s, &Event::Advance);
    assert_eq!(summary.phase, Phase::VerificationSummary);
    let done = transition(&summary, &Event::Advance);
    assert_eq!(done.phase, Phase::Completed);
    assert_eq!(done.scoring.bonuses, summary.scoring.bonuses);
    assert_eq!(transition(&done, &Event::Advance), done);
    let report = done.report().unwrap();
    assert_eq!(report.ledger.len(), 2);
    assert_eq!(report.total_score, 150 + 100 + 50 + 100 + 25);
  }
}
