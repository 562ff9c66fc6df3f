//! Bug-hunt rounds: locate the defect's lines, then fix them.

use tracing::debug;

use super::{accept, charge, reject, GameState, LineStatus, Phase, PendingVerification};
use crate::domain::{BugHuntContent, Defect, FixMode, Round, RoundContent, VerificationMode};
use crate::feedback;
use crate::scoring::PenaltyKind;
use crate::verify::{execution_request, FixAnswer, VerificationResult, Verifiable};

fn content(round: &Round) -> Option<&BugHuntContent> {
  match &round.content {
    RoundContent::BugHunt(c) => Some(c),
    _ => None,
  }
}

/// Defects the learner may currently be aiming at: the active one when bugs are
/// revealed in sequence, otherwise every unresolved one.
fn candidates<'a>(state: &GameState, c: &'a BugHuntContent, sequential: bool) -> Vec<(usize, &'a Defect)> {
  c.bugs
    .iter()
    .enumerate()
    .filter(|(i, b)| if sequential { *i == state.item_index } else { !state.is_resolved(&b.id) })
    .collect()
}

pub(super) fn select_line(state: &GameState, line: u32, multi_select: bool, extend: bool) -> Option<GameState> {
  if state.phase != Phase::SelectingTarget || line == 0 {
    return None;
  }
  let round = state.round()?;
  let c = content(round)?;
  let line_count = round.code.lines().count() as u32;
  if line_count > 0 && line > line_count {
    return None;
  }
  if matches!(state.line_status.get(&line), Some(LineStatus::Fixed | LineStatus::Revealed)) {
    return None;
  }

  let sequential = round.config.reveal_sequentially;
  let pool = candidates(state, c, sequential);
  let aimed = pool
    .iter()
    .find(|(_, b)| b.bug_lines.contains(&line))
    .or_else(|| pool.iter().find(|(i, _)| *i == state.item_index))
    .or(pool.first())
    .copied();
  let (idx, defect) = aimed?;

  if defect.is_multi_line() {
    return Some(accumulate(state, line, multi_select, extend));
  }
  if defect.bug_lines.contains(&line) {
    return Some(confirm_target(state, idx, defect, false));
  }

  // Wrong click.
  let (mut next, penalty) = charge(state, PenaltyKind::WrongLine)?;
  let templates = &state.settings.feedback;
  match c.red_herring(line) {
    Some(rh) => {
      next.line_status.insert(line, LineStatus::RedHerring);
      next.feedback = Some(feedback::red_herring(templates, line, &rh.explanation, penalty));
    }
    None => {
      next.line_status.insert(line, LineStatus::WrongClick);
      next.feedback = Some(feedback::wrong_line(templates, line, penalty));
    }
  }
  if next.item.wrong_clicks >= round.config.max_wrong_line_clicks {
    let active = c.bugs.get(state.item_index)?;
    let charged = next.clone();
    next = confirm_target(&charged, state.item_index, active, true);
  }
  Some(next)
}

/// Multi-line defects: build up a selection, checked only on confirm.
fn accumulate(state: &GameState, line: u32, multi_select: bool, extend: bool) -> GameState {
  let mut next = state.clone();
  let sel = &mut next.selection;
  match (extend, sel.anchor) {
    (true, Some(anchor)) => {
      let (lo, hi) = if anchor <= line { (anchor, line) } else { (line, anchor) };
      sel.lines.extend(lo..=hi);
    }
    _ if multi_select => {
      if !sel.lines.remove(&line) {
        sel.lines.insert(line);
      }
      sel.anchor = Some(line);
    }
    _ => {
      sel.lines.clear();
      sel.lines.insert(line);
      sel.anchor = Some(line);
    }
  }
  next.line_status.retain(|_, s| *s != LineStatus::Selected);
  let selected: Vec<u32> = next.selection.lines.iter().copied().collect();
  for l in selected {
    next.line_status.entry(l).or_insert(LineStatus::Selected);
  }
  next
}

pub(super) fn confirm_selection(state: &GameState) -> Option<GameState> {
  if state.phase != Phase::SelectingTarget || state.selection.lines.is_empty() {
    return None;
  }
  let round = state.round()?;
  let c = content(round)?;
  let chosen: Vec<u32> = state.selection.lines.iter().copied().collect();

  let pool = candidates(state, c, round.config.reveal_sequentially);
  if let Some((idx, defect)) = pool.into_iter().find(|(_, b)| b.bug_lines == chosen) {
    return Some(confirm_target(state, idx, defect, false));
  }

  let (mut next, penalty) = charge(state, PenaltyKind::WrongSelection)?;
  next.selection = Default::default();
  next.line_status.retain(|_, s| *s != LineStatus::Selected);
  next.feedback = Some(feedback::wrong_selection(&state.settings.feedback, penalty));
  Some(next)
}

fn confirm_target(state: &GameState, idx: usize, defect: &Defect, revealed: bool) -> GameState {
  let mut next = state.clone();
  if idx != state.item_index {
    // Hint tier and attempts belong to the defect they were spent on.
    super::reset_item(&mut next);
  }
  next.item_index = idx;
  next.selection = Default::default();
  next.line_status.retain(|_, s| *s != LineStatus::Selected);
  let status = if revealed { LineStatus::Revealed } else { LineStatus::Found };
  for l in &defect.bug_lines {
    next.line_status.insert(*l, status);
  }
  let templates = &state.settings.feedback;
  next.feedback = Some(if revealed {
    feedback::target_revealed(templates, &defect.lines_label())
  } else {
    feedback::target_found(templates, &defect.lines_label())
  });
  next.phase = Phase::TargetConfirmed;
  debug!(target: "exercise", bug = %defect.id, revealed, "Defect located");
  next
}

pub(super) fn submit_fix(state: &GameState, answer: FixAnswer) -> Option<GameState> {
  if state.phase != Phase::TargetConfirmed {
    return None;
  }
  let round = state.round()?;
  let c = content(round)?;
  let defect = c.bugs.get(state.item_index)?;

  let (fix_text, detail) = match (&answer, round.config.fix_mode) {
    (FixAnswer::Option(id), FixMode::MultipleChoice) => {
      let opt = defect.option(id)?;
      (opt.code.clone(), opt.feedback.clone())
    }
    (FixAnswer::Text(text), FixMode::FreeText) => (text.clone(), String::new()),
    _ => return None,
  };

  if round.config.verification == VerificationMode::Execution && !c.test_cases.is_empty() {
    let mut next = state.clone();
    next.pending = Some(PendingVerification {
      generation: state.generation,
      item_id: defect.id.clone(),
      request: execution_request(&round.code, &state.blueprint.language, defect, &fix_text, &c.test_cases),
    });
    next.phase = Phase::AwaitingVerification;
    next.feedback = None;
    return Some(next);
  }

  let result = defect.verify(&answer, &round.config);
  let detail = if detail.is_empty() && !result.passed {
    format!("{} of {} lines match.", result.passed_count(), result.checks.len())
  } else {
    detail
  };
  Some(apply_verdict(state, result, detail))
}

/// Book the outcome of a fix, whichever strategy produced it.
pub(super) fn apply_verdict(state: &GameState, result: VerificationResult, detail: String) -> GameState {
  let Some(defect) = state.round().and_then(|r| r.bug(state.item_index)).cloned() else {
    return state.clone();
  };

  if result.passed {
    let Some(mut next) = accept(state, defect.weight(), result) else {
      return state.clone();
    };
    for l in &defect.bug_lines {
      next.line_status.insert(*l, LineStatus::Fixed);
    }
    return next;
  }

  let detail = if detail.is_empty() {
    format!("{} of {} checks passed.", result.passed_count(), result.checks.len())
  } else {
    detail
  };
  let Some(mut next) = reject(state, result, &detail) else {
    return state.clone();
  };
  if next.item.exhausted {
    for l in &defect.bug_lines {
      next.line_status.insert(*l, LineStatus::Revealed);
    }
  }
  next
}

#[cfg(test)]
mod tests {
  use super::super::tests::{binary_search, run, settings};
  use super::super::*;
  use crate::verify::Diagnostic;
  use serde_json::json;

  fn two_line_bug() -> GameState {
    GameState::new(
      json!({
        "title": "swap",
        "code": "a = 1\nb = 2\nt = a\na = b\nb = a\nprint(a, b)",
        "bugs": [{ "id": "swap", "bugLines": [4, 5], "fixCode": "a = b\nb = t", "difficulty": 2 }],
        "redHerrings": [{ "line": 3, "explanation": "temporary is fine" }],
        "config": { "fixMode": "free_text" }
      }),
      settings(),
      3,
    )
  }

  fn selecting(s: GameState) -> GameState {
    run(s, &[Event::Start, Event::BeginSelecting])
  }

  fn click(line: u32) -> Event {
    Event::SelectLine { line, multi_select: false, extend: false }
  }

  #[test]
  fn correct_first_try_awards_base_points() {
    let s = run(
      binary_search(),
      &[Event::Start, Event::BeginSelecting, click(4), Event::SubmitFix { option_id: "opt-b".into() }],
    );
    assert_eq!(s.phase, Phase::FixAccepted);
    assert_eq!(s.scoring.total, 150);
    assert_eq!(s.scoring.ledger.len(), 1);
    assert_eq!(s.line_status.get(&4), Some(&LineStatus::Fixed));
  }

  #[test]
  fn wrong_click_costs_and_red_herring_explains() {
    let s = selecting(binary_search());
    let s = transition(&s, &click(2));
    assert_eq!(s.phase, Phase::SelectingTarget);
    assert_eq!(s.scoring.total, -10);
    assert_eq!(s.line_status.get(&2), Some(&LineStatus::RedHerring));
    assert!(s.feedback.as_ref().unwrap().message.contains("looks suspicious"));
  }

  #[test]
  fn too_many_wrong_clicks_reveal_the_target() {
    let mut s = selecting(binary_search());
    for line in [1, 2, 3, 5, 6] {
      s = transition(&s, &click(line));
    }
    assert_eq!(s.phase, Phase::TargetConfirmed);
    assert_eq!(s.line_status.get(&4), Some(&LineStatus::Revealed));
    assert_eq!(s.scoring.penalties.len(), 5);
  }

  #[test]
  fn switching_defects_out_of_order_starts_a_fresh_item() {
    let s = GameState::new(
      json!({
        "code": "x = 1\ny = 2\nz = 3",
        "bugs": [
          { "id": "first", "bugLines": [1], "fixCode": "x = 0" },
          { "id": "second", "bugLines": [3], "fixCode": "z = 0" }
        ],
        "config": { "fixMode": "free_text", "revealSequentially": false }
      }),
      settings(),
      8,
    );
    let s = run(s, &[Event::Start, Event::BeginSelecting, Event::UseHint { tier: 2 }, click(3)]);
    assert_eq!(s.phase, Phase::TargetConfirmed);
    assert_eq!(s.item_index, 1);
    assert_eq!(s.hint_tier, 0);
    assert_eq!(s.item.hints_used, 0);
    assert_eq!(s.hints_used, 1);

    let s = transition(&s, &Event::SubmitFreeText { text: "z = 0".into() });
    assert_eq!(s.phase, Phase::FixAccepted);
    assert_eq!(s.scoring.ledger[0].item_id, "second");
    assert_eq!(s.scoring.ledger[0].points, 150);
  }

  #[test]
  fn out_of_range_and_fixed_lines_are_ignored() {
    let s = selecting(binary_search());
    assert_eq!(transition(&s, &click(500)), s);
  }

  #[test]
  fn multi_line_selection_requires_exact_set() {
    let s = selecting(two_line_bug());
    // Plain click, then shift-extend to build {4, 5}.
    let picked = run(s.clone(), &[click(4), Event::SelectLine { line: 5, multi_select: false, extend: true }]);
    assert_eq!(picked.phase, Phase::SelectingTarget);
    assert_eq!(picked.selection.lines.iter().copied().collect::<Vec<_>>(), vec![4, 5]);
    let confirmed = transition(&picked, &Event::ConfirmSelection);
    assert_eq!(confirmed.phase, Phase::TargetConfirmed);
    assert!(confirmed.scoring.penalties.is_empty());

    for events in [
      vec![click(4)],
      vec![click(3), Event::SelectLine { line: 5, multi_select: false, extend: true }],
    ] {
      let before = run(s.clone(), &events);
      let after = transition(&before, &Event::ConfirmSelection);
      assert_eq!(after.phase, Phase::SelectingTarget);
      assert_eq!(after.scoring.penalties.len(), 1);
      assert_eq!(after.scoring.total, -10);
      assert!(after.selection.lines.is_empty());
    }
  }

  #[test]
  fn ctrl_click_toggles_lines() {
    let s = selecting(two_line_bug());
    let ctrl = |line| Event::SelectLine { line, multi_select: true, extend: false };
    let s = run(s, &[ctrl(4), ctrl(5), ctrl(6), ctrl(6)]);
    assert_eq!(s.selection.lines.iter().copied().collect::<Vec<_>>(), vec![4, 5]);
  }

  #[test]
  fn free_text_fix_with_retry_and_difficulty_weight() {
    let s = run(two_line_bug(), &[Event::Start, Event::BeginSelecting, click(4), Event::SelectLine { line: 5, multi_select: true, extend: false }, Event::ConfirmSelection]);
    let s = transition(&s, &Event::SubmitFreeText { text: "a = b\nb = a".into() });
    assert_eq!(s.phase, Phase::FixRejected);
    assert_eq!(s.item.attempts, 1);
    assert_eq!(s.scoring.total, -20);
    assert!(s.feedback.as_ref().unwrap().message.contains("b = t"));
    // No resubmission without an explicit retry.
    assert_eq!(transition(&s, &Event::SubmitFreeText { text: "a = b\nb = t".into() }), s);

    let s = run(s, &[Event::Retry, Event::SubmitFreeText { text: "  a = b\n\n  b = t ".into() }]);
    assert_eq!(s.phase, Phase::FixAccepted);
    // 100 * 1.5 - 20
    assert_eq!(s.scoring.total, 130);
    assert_eq!(s.scoring.ledger[0].attempts, 2);
  }

  #[test]
  fn exhausting_attempts_resolves_item_as_incorrect() {
    let mut s = run(binary_search(), &[Event::Start, Event::BeginSelecting, click(4)]);
    for _ in 0..3 {
      s = run(s, &[Event::SubmitFix { option_id: "opt-a".into() }, Event::Retry]);
    }
    assert_eq!(s.phase, Phase::FixRejected);
    assert!(s.item.exhausted);
    assert_eq!(s.scoring.ledger.len(), 1);
    assert!(!s.scoring.ledger[0].correct);
    assert_eq!(s.scoring.total, -60);
    let s = transition(&s, &Event::Advance);
    assert_eq!(s.phase, Phase::RoundComplete);
  }

  #[test]
  fn execution_mode_waits_for_matching_verdict() {
    let mut raw = crate::seeds::binary_search_bug_hunt();
    raw["config"]["verification"] = json!("execution");
    let s = run(GameState::new(raw, settings(), 1), &[Event::Start, Event::BeginSelecting, click(4)]);
    let waiting = transition(&s, &Event::SubmitFix { option_id: "opt-b".into() });
    assert_eq!(waiting.phase, Phase::AwaitingVerification);
    let pending = waiting.pending.clone().unwrap();
    assert!(pending.request.code.contains("while left <= right:"));

    // Duplicate submits while in flight are ignored.
    assert_eq!(transition(&waiting, &Event::SubmitFix { option_id: "opt-b".into() }), waiting);

    let ok = VerificationResult { passed: true, checks: vec![], diagnostic: None };
    let wrong_gen = Event::VerificationResolved { generation: 99, item_id: pending.item_id.clone(), result: ok.clone() };
    assert_eq!(transition(&waiting, &wrong_gen), waiting);

    let done = transition(&waiting, &Event::VerificationResolved { generation: pending.generation, item_id: pending.item_id, result: ok });
    assert_eq!(done.phase, Phase::FixAccepted);
    assert!(done.pending.is_none());
    assert_eq!(done.scoring.total, 150);
  }

  #[test]
  fn degraded_verdict_rejects_without_penalty() {
    let mut raw = crate::seeds::binary_search_bug_hunt();
    raw["config"]["verification"] = json!("execution");
    let s = run(GameState::new(raw, settings(), 1), &[Event::Start, Event::BeginSelecting, click(4), Event::SubmitFix { option_id: "opt-b".into() }]);
    let pending = s.pending.clone().unwrap();
    let degraded = VerificationResult {
      passed: false,
      checks: vec![],
      diagnostic: Some(Diagnostic::ExecutionUnavailable { reason: "timeout".into() }),
    };
    let s = transition(&s, &Event::VerificationResolved { generation: pending.generation, item_id: pending.item_id, result: degraded });
    assert_eq!(s.phase, Phase::FixRejected);
    assert_eq!(s.scoring.total, 0);
    assert_eq!(s.item.attempts, 0);
    assert!(s.last_result.as_ref().unwrap().is_degraded());
  }
}
