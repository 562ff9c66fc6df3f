//! Canonical exercise models: blueprint, rounds, and the per-family entities
//! (defects, blocks, challenges). Produced by `normalize`, read-only afterwards.

use serde::{Deserialize, Serialize};

/// Which family of exercise a round belongs to. Selects the state-machine
/// specialization and the scoring profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseFamily {
  BugHunt,
  BlockOrder,
  Complexity,
}

/// Learning mode discloses answers on failure; test mode only says "incorrect".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayMode {
  #[default]
  Learning,
  Test,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixMode {
  MultipleChoice,
  FreeText,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMode {
  #[default]
  Structural,
  Execution,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedBlueprint {
  pub id: String,
  pub title: String,
  pub language: String,
  pub mode: PlayMode,
  pub rounds: Vec<Round>,
}

impl NormalizedBlueprint {
  pub fn round(&self, index: usize) -> Option<&Round> {
    self.rounds.get(index)
  }

  pub fn total_items(&self) -> usize {
    self.rounds.iter().map(Round::item_count).sum()
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
  pub id: String,
  pub title: String,
  /// Source shown to the learner (buggy code for bug hunts).
  pub code: String,
  #[serde(default)]
  pub correct_code: String,
  pub config: RoundConfig,
  pub content: RoundContent,
}

impl Round {
  pub fn family(&self) -> ExerciseFamily {
    match &self.content {
      RoundContent::BugHunt(_) => ExerciseFamily::BugHunt,
      RoundContent::BlockOrder(_) => ExerciseFamily::BlockOrder,
      RoundContent::Complexity(_) => ExerciseFamily::Complexity,
    }
  }

  /// Number of independently scored items. A block puzzle is one item.
  pub fn item_count(&self) -> usize {
    match &self.content {
      RoundContent::BugHunt(c) => c.bugs.len(),
      RoundContent::BlockOrder(_) => 1,
      RoundContent::Complexity(c) => c.challenges.len(),
    }
  }

  pub fn item_id(&self, index: usize) -> Option<&str> {
    match &self.content {
      RoundContent::BugHunt(c) => c.bugs.get(index).map(|b| b.id.as_str()),
      RoundContent::BlockOrder(_) => (index == 0).then_some(self.id.as_str()),
      RoundContent::Complexity(c) => c.challenges.get(index).map(|ch| ch.id.as_str()),
    }
  }

  pub fn bug(&self, index: usize) -> Option<&Defect> {
    match &self.content {
      RoundContent::BugHunt(c) => c.bugs.get(index),
      _ => None,
    }
  }

  pub fn challenge(&self, index: usize) -> Option<&Challenge> {
    match &self.content {
      RoundContent::Complexity(c) => c.challenges.get(index),
      _ => None,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundConfig {
  pub fix_mode: FixMode,
  pub verification: VerificationMode,
  pub reveal_sequentially: bool,
  pub max_wrong_line_clicks: u32,
  pub max_attempts: u32,
  pub indentation_matters: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundContent {
  BugHunt(BugHuntContent),
  BlockOrder(BlockOrderContent),
  Complexity(ComplexityContent),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugHuntContent {
  pub bugs: Vec<Defect>,
  pub red_herrings: Vec<RedHerring>,
  pub test_cases: Vec<TestCase>,
}

impl BugHuntContent {
  pub fn red_herring(&self, line: u32) -> Option<&RedHerring> {
    self.red_herrings.iter().find(|r| r.line == line)
  }
}

/// A located, fixable error in the round's source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defect {
  pub id: String,
  /// 1-based, sorted, deduplicated.
  pub bug_lines: Vec<u32>,
  pub fix_code: String,
  pub difficulty: u8,
  pub explanation: String,
  pub hints: Vec<String>,
  pub fix_options: Vec<FixOption>,
}

impl Defect {
  pub fn is_multi_line(&self) -> bool {
    self.bug_lines.len() > 1
  }

  pub fn correct_option(&self) -> Option<&FixOption> {
    self.fix_options.iter().find(|o| o.is_correct)
  }

  pub fn option(&self, id: &str) -> Option<&FixOption> {
    self.fix_options.iter().find(|o| o.id == id)
  }

  pub fn lines_label(&self) -> String {
    self.bug_lines.iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixOption {
  pub id: String,
  pub code: String,
  pub is_correct: bool,
  pub feedback: String,
}

/// A line that looks wrong but is not a bug.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedHerring {
  pub line: u32,
  pub explanation: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
  pub id: String,
  pub input_description: String,
  pub input: String,
  pub expected_output: String,
  /// What the unfixed code prints for this input.
  pub buggy_output: String,
  pub exposed_bugs: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockOrderContent {
  pub blocks: Vec<Block>,
  pub correct_order: Vec<String>,
}

impl BlockOrderContent {
  pub fn block(&self, id: &str) -> Option<&Block> {
    self.blocks.iter().find(|b| b.id == id)
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
  pub id: String,
  pub code: String,
  pub indent: u32,
  pub is_distractor: bool,
  /// Shown only when the block is placed incorrectly.
  pub explanation: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityContent {
  pub challenges: Vec<Challenge>,
}

/// A single-answer question, optionally paired with a "find the bottleneck"
/// section choice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
  pub id: String,
  pub prompt: String,
  pub options: Vec<ChoiceOption>,
  pub correct_option_id: String,
  pub difficulty: u8,
  pub explanation: String,
  pub hints: Vec<String>,
  pub sections: Vec<CodeSection>,
}

impl Challenge {
  pub fn is_bottleneck_variant(&self) -> bool {
    !self.sections.is_empty()
  }

  pub fn bottleneck_section(&self) -> Option<&CodeSection> {
    self.sections.iter().find(|s| s.is_bottleneck)
  }

  pub fn option(&self, id: &str) -> Option<&ChoiceOption> {
    self.options.iter().find(|o| o.id == id)
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceOption {
  pub id: String,
  pub label: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSection {
  pub id: String,
  pub label: String,
  pub start_line: u32,
  pub end_line: u32,
  pub is_bottleneck: bool,
}
