//! Scoring & penalty engine.
//!
//! Pure functions over `ScoringProfile`; `ScoringState` is the append-only record a
//! session carries. Nothing here mutates its inputs.

use serde::{Deserialize, Serialize};

use crate::config::{BonusConfig, ScoringProfile};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyKind {
  /// Clicked a line that is not part of the active defect.
  WrongLine,
  /// Confirmed a multi-line selection that is not an exact match.
  WrongSelection,
  /// Submitted a wrong fix / order / option.
  WrongAnswer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusKind {
  NoHints,
  AllFirstTry,
  ZeroWrongClicks,
}

/// One resolved item. Appended exactly once per item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemScore {
  pub item_id: String,
  pub correct: bool,
  pub points: i64,
  pub attempts: u32,
  pub hints_used: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyEvent {
  pub item_id: String,
  pub kind: PenaltyKind,
  pub points: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bonus {
  pub kind: BonusKind,
  pub points: i64,
}

/// Points for a correct answer.
///
/// `attempt` is 1-based; attempts past the end of the table reuse its last entry.
/// Difficulty is clamped to 1..=3 and hint tier to 0..=3. Rounding happens once,
/// after both multipliers are applied.
pub fn award_for_correct(profile: &ScoringProfile, attempt: u32, difficulty: u8, hint_tier: u8) -> i64 {
  let Some(last) = profile.attempt_points.len().checked_sub(1) else {
    return 0;
  };
  let idx = (attempt.max(1) as usize - 1).min(last);
  let base = profile.attempt_points[idx] as f64;
  let weight = profile.difficulty_multipliers[(difficulty.clamp(1, 3) - 1) as usize];
  let hint = profile.hint_penalties[hint_tier.min(3) as usize];
  (base * weight * (1.0 - hint)).round() as i64
}

/// Flat deduction for a wrong attempt. Always ≤ 0.
pub fn penalty_for_wrong_attempt(profile: &ScoringProfile, kind: PenaltyKind) -> i64 {
  match kind {
    PenaltyKind::WrongLine | PenaltyKind::WrongSelection => -profile.wrong_line_penalty.abs(),
    PenaltyKind::WrongAnswer => -profile.wrong_answer_penalty.abs(),
  }
}

/// End-of-exercise bonuses, derived from the full ledger. A ledger without a
/// single correct item (empty included) earns nothing.
pub fn compute_bonuses(ledger: &[ItemScore], hints_used: u32, wrong_clicks: u32, cfg: &BonusConfig) -> Vec<Bonus> {
  if !ledger.iter().any(|i| i.correct) {
    return Vec::new();
  }
  let mut out = Vec::new();
  if hints_used == 0 {
    out.push(Bonus { kind: BonusKind::NoHints, points: cfg.no_hints });
  }
  if ledger.iter().all(|i| i.correct && i.attempts == 1) {
    out.push(Bonus { kind: BonusKind::AllFirstTry, points: cfg.all_first_try });
  }
  if wrong_clicks == 0 {
    out.push(Bonus { kind: BonusKind::ZeroWrongClicks, points: cfg.zero_wrong_clicks });
  }
  out
}

/// Running score of one session. Three append-only streams; `total` is their sum.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringState {
  pub total: i64,
  pub correct_count: u32,
  pub ledger: Vec<ItemScore>,
  pub penalties: Vec<PenaltyEvent>,
  pub bonuses: Vec<Bonus>,
  pub bonuses_awarded: bool,
}

impl ScoringState {
  pub fn with_item(mut self, item: ItemScore) -> Self {
    self.total += item.points;
    if item.correct {
      self.correct_count += 1;
    }
    self.ledger.push(item);
    self
  }

  pub fn with_penalty(mut self, penalty: PenaltyEvent) -> Self {
    self.total += penalty.points;
    self.penalties.push(penalty);
    self
  }

  /// Bonuses are granted once per session; later calls are ignored.
  pub fn with_bonuses(mut self, bonuses: Vec<Bonus>) -> Self {
    if self.bonuses_awarded {
      return self;
    }
    self.total += bonuses.iter().map(|b| b.points).sum::<i64>();
    self.bonuses.extend(bonuses);
    self.bonuses_awarded = true;
    self
  }

  pub fn ledger_sum(&self) -> i64 {
    self.ledger.iter().map(|i| i.points).sum()
  }

  pub fn penalty_sum(&self) -> i64 {
    self.penalties.iter().map(|p| p.points).sum()
  }

  pub fn bonus_sum(&self) -> i64 {
    self.bonuses.iter().map(|b| b.points).sum()
  }

  pub fn is_consistent(&self) -> bool {
    self.total == self.ledger_sum() + self.penalty_sum() + self.bonus_sum()
  }

  pub fn wrong_clicks(&self) -> u32 {
    self
      .penalties
      .iter()
      .filter(|p| matches!(p.kind, PenaltyKind::WrongLine | PenaltyKind::WrongSelection))
      .count() as u32
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(id: &str, correct: bool, points: i64, attempts: u32) -> ItemScore {
    ItemScore { item_id: id.into(), correct, points, attempts, hints_used: 0 }
  }

  #[test]
  fn first_attempt_no_hint_is_full_base_times_weight() {
    let p = ScoringProfile::bug_hunt();
    assert_eq!(award_for_correct(&p, 1, 1, 0), 150);
    assert_eq!(award_for_correct(&p, 1, 2, 0), 225);
    assert_eq!(award_for_correct(&p, 1, 3, 0), 300);
  }

  #[test]
  fn reward_decays_with_attempts_and_repeats_last_step() {
    let p = ScoringProfile::block_order();
    assert_eq!(award_for_correct(&p, 2, 1, 0), 130);
    assert_eq!(award_for_correct(&p, 3, 1, 0), 70);
    assert_eq!(award_for_correct(&p, 9, 1, 0), 70);
    assert_eq!(award_for_correct(&p, 0, 1, 0), 200);
  }

  #[test]
  fn hint_penalty_rounds_only_at_the_end() {
    let p = ScoringProfile::complexity();
    // 65 * 1.5 * 0.85 = 82.875
    assert_eq!(award_for_correct(&p, 2, 2, 1), 83);
    // 150 * 1.0 * 0.5
    assert_eq!(award_for_correct(&ScoringProfile::bug_hunt(), 1, 1, 3), 75);
    assert_eq!(award_for_correct(&ScoringProfile::bug_hunt(), 1, 1, 9), 75);
  }

  #[test]
  fn empty_table_awards_nothing() {
    let mut p = ScoringProfile::bug_hunt();
    p.attempt_points.clear();
    assert_eq!(award_for_correct(&p, 1, 1, 0), 0);
  }

  #[test]
  fn penalties_are_negative_and_per_kind() {
    let p = ScoringProfile::bug_hunt();
    assert_eq!(penalty_for_wrong_attempt(&p, PenaltyKind::WrongLine), -10);
    assert_eq!(penalty_for_wrong_attempt(&p, PenaltyKind::WrongSelection), -10);
    assert_eq!(penalty_for_wrong_attempt(&p, PenaltyKind::WrongAnswer), -20);
  }

  #[test]
  fn bonuses_follow_the_ledger() {
    let cfg = BonusConfig::default();
    let clean = vec![item("a", true, 150, 1), item("b", true, 150, 1)];
    let kinds: Vec<_> = compute_bonuses(&clean, 0, 0, &cfg).into_iter().map(|b| b.kind).collect();
    assert_eq!(kinds, vec![BonusKind::NoHints, BonusKind::AllFirstTry, BonusKind::ZeroWrongClicks]);

    let retried = vec![item("a", true, 100, 2)];
    let kinds: Vec<_> = compute_bonuses(&retried, 1, 3, &cfg).into_iter().map(|b| b.kind).collect();
    assert!(kinds.is_empty());
    assert!(compute_bonuses(&[], 0, 0, &cfg).is_empty());

    let failed = vec![item("a", false, 0, 3), item("b", false, 0, 3)];
    assert!(compute_bonuses(&failed, 0, 0, &cfg).is_empty());
  }

  #[test]
  fn scoring_state_keeps_total_consistent_and_bonuses_once() {
    let s = ScoringState::default()
      .with_penalty(PenaltyEvent { item_id: "a".into(), kind: PenaltyKind::WrongLine, points: -10 })
      .with_item(item("a", true, 150, 1));
    assert_eq!(s.total, 140);
    assert!(s.is_consistent());

    let bonus = vec![Bonus { kind: BonusKind::NoHints, points: 50 }];
    let s = s.with_bonuses(bonus.clone()).with_bonuses(bonus);
    assert_eq!(s.total, 190);
    assert_eq!(s.bonuses.len(), 1);
    assert!(s.is_consistent());
    assert_eq!(s.wrong_clicks(), 1);
  }
}
