//! Learner-facing feedback and hints, built from `FeedbackTemplates`.
//!
//! Disclosure policy: in learning mode a failure explains itself and shows the
//! expected answer; in test mode it only says it was incorrect.

use serde::{Deserialize, Serialize};

use crate::config::FeedbackTemplates;
use crate::domain::{PlayMode, Round, RoundContent};
use crate::util::fill_template;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
  Info,
  Success,
  Warning,
  Error,
  Hint,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
  pub tone: Tone,
  pub message: String,
}

impl Feedback {
  fn new(tone: Tone, message: String) -> Self {
    Self { tone, message: message.trim().to_string() }
  }
}

pub fn correct(t: &FeedbackTemplates, points: i64) -> Feedback {
  Feedback::new(Tone::Success, fill_template(&t.correct, &[("points", &points.to_string())]))
}

pub fn target_found(t: &FeedbackTemplates, lines: &str) -> Feedback {
  Feedback::new(Tone::Success, fill_template(&t.target_found, &[("lines", lines)]))
}

pub fn target_revealed(t: &FeedbackTemplates, lines: &str) -> Feedback {
  Feedback::new(Tone::Warning, fill_template(&t.target_revealed, &[("lines", lines)]))
}

pub fn wrong_line(t: &FeedbackTemplates, line: u32, penalty: i64) -> Feedback {
  Feedback::new(
    Tone::Error,
    fill_template(&t.wrong_line, &[("line", &line.to_string()), ("penalty", &penalty.to_string())]),
  )
}

pub fn red_herring(t: &FeedbackTemplates, line: u32, explanation: &str, penalty: i64) -> Feedback {
  Feedback::new(
    Tone::Error,
    fill_template(
      &t.red_herring,
      &[("line", &line.to_string()), ("explanation", explanation), ("penalty", &penalty.to_string())],
    ),
  )
}

pub fn wrong_selection(t: &FeedbackTemplates, penalty: i64) -> Feedback {
  Feedback::new(Tone::Error, fill_template(&t.wrong_selection, &[("penalty", &penalty.to_string())]))
}

/// A rejected answer with attempts left.
pub fn rejected(t: &FeedbackTemplates, mode: PlayMode, detail: &str, answer: &str) -> Feedback {
  match mode {
    PlayMode::Learning => {
      Feedback::new(Tone::Error, fill_template(&t.rejected_learning, &[("feedback", detail), ("answer", answer)]))
    }
    PlayMode::Test => Feedback::new(Tone::Error, t.rejected_test.clone()),
  }
}

/// Partial credit report for a block arrangement (learning mode only).
pub fn blocks_rejected(t: &FeedbackTemplates, mode: PlayMode, correct: usize, total: usize, notes: &[String]) -> Feedback {
  match mode {
    PlayMode::Learning => {
      let mut msg = fill_template(&t.blocks_rejected, &[("correct", &correct.to_string()), ("total", &total.to_string())]);
      for n in notes.iter().filter(|n| !n.is_empty()) {
        msg.push(' ');
        msg.push_str(n);
      }
      Feedback::new(Tone::Error, msg)
    }
    PlayMode::Test => Feedback::new(Tone::Error, t.rejected_test.clone()),
  }
}

pub fn out_of_attempts(t: &FeedbackTemplates, mode: PlayMode, answer: &str) -> Feedback {
  let shown = match mode {
    PlayMode::Learning => answer,
    PlayMode::Test => "",
  };
  Feedback::new(Tone::Error, fill_template(&t.out_of_attempts, &[("answer", shown)]))
}

pub fn execution_unavailable(t: &FeedbackTemplates) -> Feedback {
  Feedback::new(Tone::Warning, t.execution_unavailable.clone())
}

/// The expected answer for the item, as shown when disclosure is allowed.
pub fn answer_text(round: &Round, item_index: usize) -> String {
  match &round.content {
    RoundContent::BugHunt(c) => c.bugs.get(item_index).map(|b| b.fix_code.clone()).unwrap_or_default(),
    RoundContent::BlockOrder(c) => c
      .correct_order
      .iter()
      .filter_map(|id| c.block(id))
      .map(|b| b.code.trim().to_string())
      .collect::<Vec<_>>()
      .join(" / "),
    RoundContent::Complexity(c) => match c.challenges.get(item_index) {
      Some(ch) => {
        let label = ch.option(&ch.correct_option_id).map(|o| o.label.clone()).unwrap_or_default();
        match ch.bottleneck_section() {
          Some(s) => format!("{label} (bottleneck: {})", s.label),
          None => label,
        }
      }
      None => String::new(),
    },
  }
}

/// Hint text for a tier: 1 = nudge, 2 = location, 3 = the answer itself.
pub fn hint(t: &FeedbackTemplates, round: &Round, item_index: usize, tier: u8) -> Feedback {
  let authored = |hints: &[String], k: usize| hints.get(k).cloned();
  let text = match (&round.content, tier) {
    (_, 0) => String::new(),
    (_, tier) if tier >= 3 => fill_template(&t.hint_reveal, &[("answer", &answer_text(round, item_index))]),
    (RoundContent::BugHunt(c), tier) => {
      let Some(bug) = c.bugs.get(item_index) else { return Feedback::new(Tone::Hint, String::new()) };
      match tier {
        1 => authored(&bug.hints, 0).unwrap_or_else(|| "Trace the code with a small input and watch the boundaries.".into()),
        _ => authored(&bug.hints, 1).unwrap_or_else(|| fill_template(&t.hint_location, &[("lines", &bug.lines_label())])),
      }
    }
    (RoundContent::BlockOrder(c), 1) => match c.correct_order.first().and_then(|id| c.block(id)) {
      Some(b) => format!("Start with: {}", b.code.trim()),
      None => String::new(),
    },
    (RoundContent::BlockOrder(c), _) => {
      let distractors = c.blocks.iter().filter(|b| b.is_distractor).count();
      format!("{} of the blocks do not belong in the solution.", distractors)
    }
    (RoundContent::Complexity(c), tier) => {
      let Some(ch) = c.challenges.get(item_index) else { return Feedback::new(Tone::Hint, String::new()) };
      match tier {
        1 => authored(&ch.hints, 0).unwrap_or_else(|| "Count how many times the innermost statement runs.".into()),
        _ => authored(&ch.hints, 1).unwrap_or_else(|| match ch.bottleneck_section() {
          Some(s) => format!("Focus on lines {}-{}.", s.start_line, s.end_line),
          None => "Look at the deepest loop nesting.".into(),
        }),
      }
    }
  };
  Feedback::new(Tone::Hint, text)
}
