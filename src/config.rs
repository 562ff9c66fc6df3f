//! Loading game configuration (scoring tables, execution sandbox, feedback text) from TOML.
//!
//! Every section has defaults, so an absent or partial file still yields a
//! complete `GameConfig`. See `ScoringProfile` for the per-family reward curves.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::domain::ExerciseFamily;
use crate::error::{GameError, Result};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Default)]
pub struct GameConfig {
  #[serde(default)]
  pub scoring: ScoringConfig,
  #[serde(default)]
  pub bonuses: BonusConfig,
  #[serde(default)]
  pub execution: ExecutionConfig,
  #[serde(default)]
  pub feedback: FeedbackTemplates,
}

/// Reward curves per exercise family. A partial section only overrides the keys
/// it names; the rest come from that family's own profile.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(from = "ScoringOverrides")]
pub struct ScoringConfig {
  pub bug_hunt: ScoringProfile,
  pub block_order: ScoringProfile,
  pub complexity: ScoringProfile,
}

impl Default for ScoringConfig {
  fn default() -> Self {
    Self {
      bug_hunt: ScoringProfile::bug_hunt(),
      block_order: ScoringProfile::block_order(),
      complexity: ScoringProfile::complexity(),
    }
  }
}

#[derive(Deserialize, Default)]
struct ScoringOverrides {
  #[serde(default)]
  bug_hunt: ProfileOverrides,
  #[serde(default)]
  block_order: ProfileOverrides,
  #[serde(default)]
  complexity: ProfileOverrides,
}

impl From<ScoringOverrides> for ScoringConfig {
  fn from(o: ScoringOverrides) -> Self {
    Self {
      bug_hunt: o.bug_hunt.over(ScoringProfile::bug_hunt()),
      block_order: o.block_order.over(ScoringProfile::block_order()),
      complexity: o.complexity.over(ScoringProfile::complexity()),
    }
  }
}

#[derive(Deserialize, Default)]
struct ProfileOverrides {
  attempt_points: Option<Vec<i64>>,
  difficulty_multipliers: Option<[f64; 3]>,
  hint_penalties: Option<[f64; 4]>,
  wrong_line_penalty: Option<i64>,
  wrong_answer_penalty: Option<i64>,
}

impl ProfileOverrides {
  fn over(self, base: ScoringProfile) -> ScoringProfile {
    ScoringProfile {
      attempt_points: self.attempt_points.filter(|p| !p.is_empty()).unwrap_or(base.attempt_points),
      difficulty_multipliers: self.difficulty_multipliers.unwrap_or(base.difficulty_multipliers),
      hint_penalties: self.hint_penalties.unwrap_or(base.hint_penalties),
      wrong_line_penalty: self.wrong_line_penalty.unwrap_or(base.wrong_line_penalty),
      wrong_answer_penalty: self.wrong_answer_penalty.unwrap_or(base.wrong_answer_penalty),
    }
  }
}

impl ScoringConfig {
  pub fn profile(&self, family: ExerciseFamily) -> &ScoringProfile {
    match family {
      ExerciseFamily::BugHunt => &self.bug_hunt,
      ExerciseFamily::BlockOrder => &self.block_order,
      ExerciseFamily::Complexity => &self.complexity,
    }
  }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ScoringProfile {
  /// Points for a correct answer on attempt 1, 2, 3…; the last entry repeats.
  pub attempt_points: Vec<i64>,
  /// Multipliers for difficulty weights 1, 2, 3.
  pub difficulty_multipliers: [f64; 3],
  /// Fraction removed for hint tiers 0..=3.
  pub hint_penalties: [f64; 4],
  pub wrong_line_penalty: i64,
  pub wrong_answer_penalty: i64,
}

impl ScoringProfile {
  pub fn bug_hunt() -> Self {
    Self {
      attempt_points: vec![150, 100, 50],
      difficulty_multipliers: default_difficulty_multipliers(),
      hint_penalties: default_hint_penalties(),
      wrong_line_penalty: 10,
      wrong_answer_penalty: 20,
    }
  }

  pub fn block_order() -> Self {
    Self {
      attempt_points: vec![200, 130, 70],
      difficulty_multipliers: default_difficulty_multipliers(),
      hint_penalties: default_hint_penalties(),
      wrong_line_penalty: 10,
      wrong_answer_penalty: 20,
    }
  }

  pub fn complexity() -> Self {
    Self {
      attempt_points: vec![100, 65, 35],
      difficulty_multipliers: default_difficulty_multipliers(),
      hint_penalties: default_hint_penalties(),
      wrong_line_penalty: 10,
      wrong_answer_penalty: 15,
    }
  }
}

fn default_difficulty_multipliers() -> [f64; 3] { [1.0, 1.5, 2.0] }
fn default_hint_penalties() -> [f64; 4] { [0.0, 0.15, 0.30, 0.50] }

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct BonusConfig {
  #[serde(default = "default_no_hints_bonus")]
  pub no_hints: i64,
  #[serde(default = "default_all_first_try_bonus")]
  pub all_first_try: i64,
  #[serde(default = "default_zero_wrong_clicks_bonus")]
  pub zero_wrong_clicks: i64,
}

impl Default for BonusConfig {
  fn default() -> Self {
    Self {
      no_hints: default_no_hints_bonus(),
      all_first_try: default_all_first_try_bonus(),
      zero_wrong_clicks: default_zero_wrong_clicks_bonus(),
    }
  }
}

fn default_no_hints_bonus() -> i64 { 50 }
fn default_all_first_try_bonus() -> i64 { 100 }
fn default_zero_wrong_clicks_bonus() -> i64 { 25 }

/// Where (and how patiently) to reach the code-execution sandbox.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ExecutionConfig {
  #[serde(default)]
  pub endpoint: Option<String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ExecutionConfig {
  fn default() -> Self {
    Self { endpoint: None, timeout_secs: default_timeout_secs() }
  }
}

fn default_timeout_secs() -> u64 { 10 }

/// Learner-facing messages. Placeholders in `{braces}` are filled at runtime.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FeedbackTemplates {
  pub correct: String,
  pub target_found: String,
  pub target_revealed: String,
  pub wrong_line: String,
  pub red_herring: String,
  pub wrong_selection: String,
  pub rejected_learning: String,
  pub rejected_test: String,
  pub out_of_attempts: String,
  pub execution_unavailable: String,
  pub blocks_rejected: String,
  pub hint_location: String,
  pub hint_reveal: String,
}

impl Default for FeedbackTemplates {
  fn default() -> Self {
    Self {
      correct: "Correct! +{points} points.".into(),
      target_found: "You found it. Now fix line(s) {lines}.".into(),
      target_revealed: "Too many wrong clicks. The bug is on line(s) {lines}.".into(),
      wrong_line: "Line {line} is not the bug. {penalty} points.".into(),
      red_herring: "Line {line} looks suspicious, but it is fine: {explanation} {penalty} points.".into(),
      wrong_selection: "That selection does not match the buggy lines. {penalty} points.".into(),
      rejected_learning: "Not quite. {feedback} Expected: {answer}".into(),
      rejected_test: "Incorrect.".into(),
      out_of_attempts: "Out of attempts. {answer}".into(),
      execution_unavailable: "The code runner is unavailable; your fix was checked against known outputs only.".into(),
      blocks_rejected: "{correct} of {total} blocks are in the right place.".into(),
      hint_location: "Look closely at line(s) {lines}.".into(),
      hint_reveal: "The fix is: {answer}".into(),
    }
  }
}

/// Load and parse a TOML config file.
pub fn load_game_config(path: &Path) -> Result<GameConfig> {
  let raw = std::fs::read_to_string(path)
    .map_err(|source| GameError::ConfigRead { path: path.to_path_buf(), source })?;
  toml::from_str::<GameConfig>(&raw)
    .map_err(|e| GameError::ConfigParse { path: path.to_path_buf(), message: e.to_string() })
}

/// Attempt to load `GameConfig` from GAME_CONFIG_PATH, then apply env overrides.
/// On any IO/parse error, logs and falls back to defaults.
pub fn load_game_config_from_env() -> GameConfig {
  let mut cfg = match std::env::var("GAME_CONFIG_PATH") {
    Ok(path) => match load_game_config(Path::new(&path)) {
      Ok(cfg) => {
        info!(target: "gamelab", %path, "Loaded game config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "gamelab", %path, error = %e, "Failed to load game config; using defaults");
        GameConfig::default()
      }
    },
    Err(_) => GameConfig::default(),
  };

  if let Ok(endpoint) = std::env::var("EXECUTION_ENDPOINT") {
    if !endpoint.trim().is_empty() {
      cfg.execution.endpoint = Some(endpoint.trim().to_string());
    }
  }
  if let Ok(raw) = std::env::var("EXECUTION_TIMEOUT_SECS") {
    match raw.parse::<u64>() {
      Ok(secs) if secs > 0 => cfg.execution.timeout_secs = secs,
      _ => warn!(target: "gamelab", value = %raw, "Ignoring invalid EXECUTION_TIMEOUT_SECS"),
    }
  }
  cfg
}
