//! Exercise state machine.
//!
//! `transition(state, event) -> state` is pure and run-to-completion. Events that
//! make no sense for the current phase return an identical state. The only
//! asynchronous step (delegated execution) is represented by `pending`: the caller
//! runs the request and feeds the verdict back as `Event::VerificationResolved`
//! tagged with the generation it was issued under, so verdicts that arrive after a
//! reset are dropped.
//!
//! Family-specific rules live in `bug_hunt`, `block_order` and `complexity`; this
//! module holds what they share: hints, advancing, retries, resets and the
//! accept/reject bookkeeping.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::{GameConfig, ScoringProfile};
use crate::domain::{ExerciseFamily, NormalizedBlueprint, Round};
use crate::feedback::{self, Feedback};
use crate::normalize::normalize;
use crate::scoring::{
  award_for_correct, compute_bonuses, penalty_for_wrong_attempt, Bonus, ItemScore, PenaltyEvent, PenaltyKind,
  ScoringState,
};
use crate::verify::{BlockPlacement, ExecutionRequest, FixAnswer, VerificationResult};

mod block_order;
mod bug_hunt;
mod complexity;

pub const MAX_HINT_TIER: u8 = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
  #[default]
  Init,
  ReadingContent,
  SelectingTarget,
  TargetConfirmed,
  AwaitingVerification,
  FixAccepted,
  FixRejected,
  RoundComplete,
  VerificationSummary,
  Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
  Selected,
  WrongClick,
  RedHerring,
  Found,
  Fixed,
  Revealed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
  pub lines: BTreeSet<u32>,
  pub anchor: Option<u32>,
}

/// Per-item counters, reset whenever a new item becomes active.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemProgress {
  /// Rejected submissions so far.
  pub attempts: u32,
  pub hints_used: u32,
  pub wrong_clicks: u32,
  /// Out of attempts; the item is resolved as incorrect.
  pub exhausted: bool,
}

/// An execution request waiting for the sandbox.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingVerification {
  pub generation: u64,
  pub item_id: String,
  pub request: ExecutionRequest,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Event {
  Start,
  BeginSelecting,
  SelectLine {
    line: u32,
    #[serde(default)]
    multi_select: bool,
    #[serde(default)]
    extend: bool,
  },
  ConfirmSelection,
  SelectSection { section_id: String },
  SubmitFix { option_id: String },
  SubmitFreeText { text: String },
  SubmitBlocks { placements: Vec<BlockPlacement> },
  SubmitAnswer { option_id: String },
  VerificationResolved { generation: u64, item_id: String, result: VerificationResult },
  UseHint { tier: u8 },
  Retry,
  Advance,
  Reset,
}

/// Snapshot of one play session. Replaced, never mutated in place, by `transition`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
  #[serde(skip_serializing)]
  pub source: Arc<Value>,
  #[serde(skip_serializing)]
  pub blueprint: Arc<NormalizedBlueprint>,
  #[serde(skip_serializing)]
  pub settings: Arc<GameConfig>,
  pub generation: u64,
  pub shuffle_seed: u64,
  pub phase: Phase,
  pub round_index: usize,
  pub item_index: usize,
  pub solved: BTreeSet<String>,
  pub line_status: BTreeMap<u32, LineStatus>,
  pub selection: Selection,
  pub section_choice: Option<String>,
  pub presented_blocks: Vec<String>,
  pub hint_tier: u8,
  pub hints_used: u32,
  pub item: ItemProgress,
  pub pending: Option<PendingVerification>,
  pub last_result: Option<VerificationResult>,
  pub feedback: Option<Feedback>,
  pub scoring: ScoringState,
}

/// What the caller records once the session is over.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalReport {
  pub blueprint_id: String,
  pub total_score: i64,
  pub all_correct: bool,
  pub ledger: Vec<ItemScore>,
  pub penalties: Vec<PenaltyEvent>,
  pub bonuses: Vec<Bonus>,
}

impl GameState {
  /// Fresh `Init` state for a raw blueprint.
  pub fn new(raw: Value, settings: Arc<GameConfig>, shuffle_seed: u64) -> Self {
    Self::fresh(Arc::new(raw), settings, shuffle_seed, 0)
  }

  fn fresh(source: Arc<Value>, settings: Arc<GameConfig>, shuffle_seed: u64, generation: u64) -> Self {
    let blueprint = Arc::new(normalize(&source));
    Self {
      source,
      blueprint,
      settings,
      generation,
      shuffle_seed,
      phase: Phase::Init,
      round_index: 0,
      item_index: 0,
      solved: BTreeSet::new(),
      line_status: BTreeMap::new(),
      selection: Selection::default(),
      section_choice: None,
      presented_blocks: Vec::new(),
      hint_tier: 0,
      hints_used: 0,
      item: ItemProgress::default(),
      pending: None,
      last_result: None,
      feedback: None,
      scoring: ScoringState::default(),
    }
  }

  pub fn round(&self) -> Option<&Round> {
    self.blueprint.round(self.round_index)
  }

  pub fn family(&self) -> Option<ExerciseFamily> {
    self.round().map(Round::family)
  }

  pub fn current_item_id(&self) -> Option<&str> {
    self.round().and_then(|r| r.item_id(self.item_index))
  }

  pub fn profile(&self) -> Option<&ScoringProfile> {
    self.family().map(|f| self.settings.scoring.profile(f))
  }

  pub fn is_resolved(&self, item_id: &str) -> bool {
    self.scoring.ledger.iter().any(|i| i.item_id == item_id)
  }

  pub fn is_last_round(&self) -> bool {
    self.round_index + 1 >= self.blueprint.rounds.len()
  }

  /// Available once the session reached `Completed`.
  pub fn report(&self) -> Option<FinalReport> {
    (self.phase == Phase::Completed).then(|| FinalReport {
      blueprint_id: self.blueprint.id.clone(),
      total_score: self.scoring.total,
      all_correct: !self.scoring.ledger.is_empty() && self.scoring.ledger.iter().all(|i| i.correct),
      ledger: self.scoring.ledger.clone(),
      penalties: self.scoring.penalties.clone(),
      bonuses: self.scoring.bonuses.clone(),
    })
  }

  /// First unresolved item of the current round at or after `from`, wrapping around.
  fn next_open_item(&self, from: usize) -> Option<usize> {
    let round = self.round()?;
    let n = round.item_count();
    (0..n).map(|k| (from + k) % n).find(|&i| round.item_id(i).is_some_and(|id| !self.is_resolved(id)))
  }
}

pub fn transition(state: &GameState, event: &Event) -> GameState {
  let next = match event {
    Event::Reset => Some(reset(state)),
    Event::Start => start(state),
    Event::BeginSelecting => begin_selecting(state),
    Event::UseHint { tier } => use_hint(state, *tier),
    Event::Retry => retry(state),
    Event::Advance => advance(state),
    Event::VerificationResolved { generation, item_id, result } => resolve_pending(state, *generation, item_id, result),
    Event::SelectLine { line, multi_select, extend } => bug_hunt::select_line(state, *line, *multi_select, *extend),
    Event::ConfirmSelection => bug_hunt::confirm_selection(state),
    Event::SubmitFix { option_id } => bug_hunt::submit_fix(state, FixAnswer::Option(option_id.clone())),
    Event::SubmitFreeText { text } => bug_hunt::submit_fix(state, FixAnswer::Text(text.clone())),
    Event::SubmitBlocks { placements } => block_order::submit_blocks(state, placements),
    Event::SelectSection { section_id } => complexity::select_section(state, section_id),
    Event::SubmitAnswer { option_id } => complexity::submit_answer(state, option_id),
  };

  match next {
    Some(next) => {
      debug!(target: "exercise", from = ?state.phase, to = ?next.phase, total = next.scoring.total, "Transition applied");
      debug_assert!(next.scoring.is_consistent(), "score total drifted from its streams");
      next
    }
    None => {
      debug!(target: "exercise", phase = ?state.phase, ?event, "Event ignored in this phase");
      state.clone()
    }
  }
}

// ---- shared transitions ----

fn reset(state: &GameState) -> GameState {
  GameState::fresh(
    state.source.clone(),
    state.settings.clone(),
    state.shuffle_seed.wrapping_add(1),
    state.generation + 1,
  )
}

fn start(state: &GameState) -> Option<GameState> {
  if state.phase != Phase::Init || state.blueprint.rounds.is_empty() {
    return None;
  }
  Some(enter_round(state, 0))
}

fn begin_selecting(state: &GameState) -> Option<GameState> {
  if state.phase != Phase::ReadingContent {
    return None;
  }
  let mut next = state.clone();
  next.feedback = None;
  next.phase = match state.round() {
    Some(r) if r.item_count() > 0 => Phase::SelectingTarget,
    // Nothing to play in this round.
    _ => Phase::RoundComplete,
  };
  Some(next)
}

/// Tier only ever rises; each new tier reached counts as one hint used.
fn use_hint(state: &GameState, requested: u8) -> Option<GameState> {
  let item_open = matches!(state.phase, Phase::SelectingTarget | Phase::TargetConfirmed)
    || (state.phase == Phase::FixRejected && !state.item.exhausted);
  if !item_open {
    return None;
  }
  let tier = state.hint_tier.max(requested.min(MAX_HINT_TIER));
  if tier == state.hint_tier {
    return None;
  }
  let round = state.round()?;
  let mut next = state.clone();
  next.hint_tier = tier;
  next.item.hints_used += 1;
  next.hints_used += 1;
  next.feedback = Some(feedback::hint(&state.settings.feedback, round, state.item_index, tier));
  Some(next)
}

fn retry(state: &GameState) -> Option<GameState> {
  if state.phase != Phase::FixRejected || state.item.exhausted {
    return None;
  }
  let mut next = state.clone();
  next.phase = match state.family()? {
    // The defect has been located already; only the fix is retried.
    ExerciseFamily::BugHunt => Phase::TargetConfirmed,
    ExerciseFamily::BlockOrder | ExerciseFamily::Complexity => Phase::SelectingTarget,
  };
  next.feedback = None;
  Some(next)
}

fn advance(state: &GameState) -> Option<GameState> {
  match state.phase {
    Phase::FixAccepted => Some(after_item(state)),
    Phase::FixRejected if state.item.exhausted => Some(after_item(state)),
    Phase::RoundComplete if state.is_last_round() => Some(summarize(state)),
    Phase::RoundComplete => Some(enter_round(state, state.round_index + 1)),
    Phase::VerificationSummary => {
      let mut next = state.clone();
      next.phase = Phase::Completed;
      Some(next)
    }
    _ => None,
  }
}

fn resolve_pending(state: &GameState, generation: u64, item_id: &str, result: &VerificationResult) -> Option<GameState> {
  let pending = state.pending.as_ref()?;
  if state.phase != Phase::AwaitingVerification || generation != state.generation || pending.generation != generation {
    return None;
  }
  if pending.item_id != item_id {
    return None;
  }
  let mut cleared = state.clone();
  cleared.pending = None;
  match state.family()? {
    ExerciseFamily::BugHunt => Some(bug_hunt::apply_verdict(&cleared, result.clone(), String::new())),
    // Only defects are verified by execution.
    ExerciseFamily::BlockOrder | ExerciseFamily::Complexity => None,
  }
}

// ---- helpers shared by the families ----

pub(crate) fn enter_round(state: &GameState, round_index: usize) -> GameState {
  let mut next = state.clone();
  next.phase = Phase::ReadingContent;
  next.round_index = round_index;
  next.item_index = 0;
  next.line_status.clear();
  next.presented_blocks = block_order::presented_order(&next);
  next.feedback = None;
  next.last_result = None;
  reset_item(&mut next);
  next
}

fn reset_item(next: &mut GameState) {
  next.item = ItemProgress::default();
  next.hint_tier = 0;
  next.selection = Selection::default();
  next.section_choice = None;
  next.pending = None;
  next.line_status.retain(|_, s| matches!(s, LineStatus::Fixed | LineStatus::Revealed | LineStatus::RedHerring));
}

/// Move past a resolved item: the next open item of the round, or the round's end.
fn after_item(state: &GameState) -> GameState {
  let mut next = state.clone();
  next.feedback = None;
  next.last_result = None;
  match state.next_open_item(state.item_index + 1) {
    Some(i) => {
      next.item_index = i;
      reset_item(&mut next);
      next.phase = Phase::SelectingTarget;
    }
    None => {
      reset_item(&mut next);
      next.phase = Phase::RoundComplete;
    }
  }
  next
}

/// End-of-exercise bonuses are computed here, once.
pub(crate) fn summarize(state: &GameState) -> GameState {
  let mut next = state.clone();
  let bonuses = compute_bonuses(
    &state.scoring.ledger,
    state.hints_used,
    state.scoring.wrong_clicks(),
    &state.settings.bonuses,
  );
  next.scoring = state.scoring.clone().with_bonuses(bonuses);
  next.phase = Phase::VerificationSummary;
  next
}

/// Book a correct answer for the active item.
pub(crate) fn accept(state: &GameState, weight: u8, result: VerificationResult) -> Option<GameState> {
  let item_id = state.current_item_id()?.to_string();
  let profile = state.profile()?;
  let attempt = state.item.attempts + 1;
  let points = award_for_correct(profile, attempt, weight, state.hint_tier);

  let mut next = state.clone();
  next.scoring = state.scoring.clone().with_item(ItemScore {
    item_id: item_id.clone(),
    correct: true,
    points,
    attempts: attempt,
    hints_used: state.item.hints_used,
  });
  next.solved.insert(item_id);
  next.phase = Phase::FixAccepted;
  next.last_result = Some(result);
  next.feedback = Some(feedback::correct(&state.settings.feedback, points));
  Some(next)
}

/// Book a rejected answer: penalty, attempt count, and resolution as incorrect
/// once the round's attempt budget is spent. `detail` is the learning-mode reason.
pub(crate) fn reject(state: &GameState, result: VerificationResult, detail: &str) -> Option<GameState> {
  let round = state.round()?;
  let item_id = state.current_item_id()?.to_string();
  let profile = state.profile()?;
  let templates = &state.settings.feedback;
  let mode = state.blueprint.mode;
  let answer = feedback::answer_text(round, state.item_index);

  let mut next = state.clone();
  next.phase = Phase::FixRejected;
  next.last_result = Some(result.clone());

  if result.is_degraded() {
    // The learner is not charged for a sandbox outage.
    next.feedback = Some(feedback::execution_unavailable(templates));
    return Some(next);
  }

  next.scoring = state.scoring.clone().with_penalty(PenaltyEvent {
    item_id: item_id.clone(),
    kind: PenaltyKind::WrongAnswer,
    points: penalty_for_wrong_attempt(profile, PenaltyKind::WrongAnswer),
  });
  next.item.attempts += 1;

  if next.item.attempts >= round.config.max_attempts {
    next.item.exhausted = true;
    next.scoring = next.scoring.with_item(ItemScore {
      item_id,
      correct: false,
      points: 0,
      attempts: next.item.attempts,
      hints_used: next.item.hints_used,
    });
    next.feedback = Some(feedback::out_of_attempts(templates, mode, &answer));
  } else {
    next.feedback = Some(feedback::rejected(templates, mode, detail, &answer));
  }
  Some(next)
}

/// Book a targeting mistake (wrong line, wrong selection).
pub(crate) fn charge(state: &GameState, kind: PenaltyKind) -> Option<(GameState, i64)> {
  let item_id = state.current_item_id()?.to_string();
  let points = penalty_for_wrong_attempt(state.profile()?, kind);
  let mut next = state.clone();
  next.scoring = state.scoring.clone().with_penalty(PenaltyEvent { item_id, kind, points });
  next.item.wrong_clicks += 1;
  Some((next, points))
}
