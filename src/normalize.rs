//! Blueprint normalization: loosely-typed generator JSON → `NormalizedBlueprint`.
//!
//! `normalize` is total. Unknown or mistyped fields fall back to defaults, legacy
//! single-round blueprints (top-level `bugs` / `blocks` / `challenges`) are wrapped
//! into one round, and missing identifiers are derived from position. The canonical
//! output serializes to JSON that normalizes to itself.

use serde_json::Value;
use tracing::debug;

use crate::domain::*;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_MAX_WRONG_LINE_CLICKS: u32 = 5;

/// Keys whose presence at the top level marks a legacy single-round blueprint.
const LEGACY_ROUND_KEYS: &[&str] = &[
  "bugs", "defects", "blocks", "challenges", "questions", "code", "buggyCode", "buggy_code",
];

pub fn normalize(raw: &Value) -> NormalizedBlueprint {
  let id = str_field(raw, &["id", "blueprintId", "blueprint_id"]).unwrap_or_else(|| "blueprint".into());
  let title = str_field(raw, &["title", "name"]).unwrap_or_else(|| "Untitled exercise".into());
  let language = str_field(raw, &["language", "lang"]).unwrap_or_else(|| "python".into());
  let mode = match str_field(raw, &["mode", "playMode", "play_mode"]).as_deref() {
    Some("test") | Some("exam") => PlayMode::Test,
    _ => PlayMode::Learning,
  };
  let inherited_config = field(raw, &["config"]);

  let rounds: Vec<Round> = match arr_field(raw, &["rounds", "scenes", "levels"]) {
    Some(list) if !list.is_empty() => list
      .iter()
      .enumerate()
      .map(|(i, r)| normalize_round(r, i + 1, false, inherited_config))
      .collect(),
    _ if LEGACY_ROUND_KEYS.iter().any(|k| raw.get(*k).is_some()) => {
      vec![normalize_round(raw, 1, true, None)]
    }
    _ => Vec::new(),
  };

  let bp = NormalizedBlueprint { id, title, language, mode, rounds };
  debug!(target: "exercise", id = %bp.id, rounds = bp.rounds.len(), items = bp.total_items(), "Blueprint normalized");
  bp
}

fn normalize_round(raw: &Value, n: usize, legacy: bool, inherited_config: Option<&Value>) -> Round {
  let id = if legacy {
    format!("r{n}")
  } else {
    str_field(raw, &["id", "roundId", "round_id"]).unwrap_or_else(|| format!("r{n}"))
  };
  let title = (!legacy)
    .then(|| str_field(raw, &["title", "name"]))
    .flatten()
    .unwrap_or_else(|| format!("Round {n}"));
  let code = str_field(raw, &["code", "buggyCode", "buggy_code", "sourceCode", "source_code"]).unwrap_or_default();
  let correct_code = str_field(raw, &["correctCode", "correct_code", "solutionCode"]).unwrap_or_default();

  // Canonical rounds nest their entities under `content`; generator output does not.
  let source = match raw.get("content") {
    Some(c) if c.is_object() => c,
    _ => raw,
  };

  let content = match family_of(source) {
    ExerciseFamily::BugHunt => RoundContent::BugHunt(normalize_bug_hunt(source, &id)),
    ExerciseFamily::BlockOrder => RoundContent::BlockOrder(normalize_blocks(source, &id)),
    ExerciseFamily::Complexity => RoundContent::Complexity(normalize_challenges(source, &id)),
  };

  let config_src = field(raw, &["config"]).or(inherited_config);
  let config = normalize_config(config_src, &content);

  Round { id, title, code, correct_code, config, content }
}

fn family_of(source: &Value) -> ExerciseFamily {
  let declared = str_field(source, &["kind", "type", "gameType", "game_type"]).map(|s| s.to_ascii_lowercase());
  match declared.as_deref() {
    Some("bug_hunt") | Some("bughunt") | Some("bug_hunting") | Some("bugs") => return ExerciseFamily::BugHunt,
    Some("block_order") | Some("blockorder") | Some("reorder") | Some("parsons") => {
      return ExerciseFamily::BlockOrder
    }
    Some("complexity") | Some("complexity_analysis") | Some("multiple_choice") => {
      return ExerciseFamily::Complexity
    }
    _ => {}
  }
  if source.get("blocks").is_some() {
    ExerciseFamily::BlockOrder
  } else if source.get("challenges").is_some() || source.get("questions").is_some() {
    ExerciseFamily::Complexity
  } else {
    ExerciseFamily::BugHunt
  }
}

fn normalize_config(raw: Option<&Value>, content: &RoundContent) -> RoundConfig {
  let empty = Value::Null;
  let raw = raw.unwrap_or(&empty);

  let has_options = match content {
    RoundContent::BugHunt(c) => c.bugs.iter().any(|b| !b.fix_options.is_empty()),
    _ => false,
  };
  let fix_mode = match str_field(raw, &["fixMode", "fix_mode"]).map(|s| s.to_ascii_lowercase()).as_deref() {
    Some("free_text") | Some("freetext") | Some("free-text") => FixMode::FreeText,
    Some("multiple_choice") | Some("multiplechoice") | Some("multiple-choice") => FixMode::MultipleChoice,
    _ if has_options => FixMode::MultipleChoice,
    _ => FixMode::FreeText,
  };
  let verification = match str_field(raw, &["verification", "verificationMode", "executionMode", "execution_mode"])
    .map(|s| s.to_ascii_lowercase())
    .as_deref()
  {
    Some("execution") | Some("execute") | Some("run") | Some("sandbox") => VerificationMode::Execution,
    _ => VerificationMode::Structural,
  };

  RoundConfig {
    fix_mode,
    verification,
    reveal_sequentially: bool_field(raw, &["revealSequentially", "reveal_sequentially"]).unwrap_or(true),
    max_wrong_line_clicks: u32_field(raw, &["maxWrongLineClicks", "max_wrong_line_clicks"])
      .filter(|v| *v > 0)
      .unwrap_or(DEFAULT_MAX_WRONG_LINE_CLICKS),
    max_attempts: u32_field(raw, &["maxAttempts", "max_attempts"]).filter(|v| *v > 0).unwrap_or(DEFAULT_MAX_ATTEMPTS),
    indentation_matters: bool_field(raw, &["indentationMatters", "indentation_matters"]).unwrap_or(true),
  }
}

fn normalize_bug_hunt(source: &Value, round_id: &str) -> BugHuntContent {
  let bugs = arr_field(source, &["bugs", "defects"])
    .map(|list| list.iter().enumerate().map(|(i, b)| normalize_defect(b, round_id, i + 1)).collect())
    .unwrap_or_default();

  let mut red_herrings: Vec<RedHerring> = arr_field(source, &["redHerrings", "red_herrings"])
    .map(|list| {
      list
        .iter()
        .filter_map(|r| {
          let line = u32_field(r, &["line", "lineNumber", "line_number"]).filter(|l| *l > 0)?;
          let explanation = str_field(r, &["explanation", "reason", "why"]).unwrap_or_default();
          Some(RedHerring { line, explanation })
        })
        .collect()
    })
    .unwrap_or_default();
  red_herrings.sort_by_key(|r| r.line);
  red_herrings.dedup_by_key(|r| r.line);

  let test_cases = arr_field(source, &["testCases", "test_cases", "tests"])
    .map(|list| {
      list
        .iter()
        .enumerate()
        .map(|(i, t)| TestCase {
          id: str_field(t, &["id"]).unwrap_or_else(|| format!("{round_id}-test-{}", i + 1)),
          input_description: str_field(t, &["inputDescription", "input_description", "description"]).unwrap_or_default(),
          input: str_field(t, &["input", "stdin"]).unwrap_or_default(),
          expected_output: str_field(t, &["expectedOutput", "expected_output", "expected"]).unwrap_or_default(),
          buggy_output: str_field(t, &["buggyOutput", "buggy_output"]).unwrap_or_default(),
          exposed_bugs: str_list(t, &["exposedBugs", "exposed_bugs"]),
        })
        .collect()
    })
    .unwrap_or_default();

  BugHuntContent { bugs, red_herrings, test_cases }
}

fn normalize_defect(raw: &Value, round_id: &str, n: usize) -> Defect {
  let id = str_field(raw, &["id", "bugId", "bug_id"]).unwrap_or_else(|| format!("{round_id}-bug-{n}"));

  let mut bug_lines: Vec<u32> = match arr_field(raw, &["bugLines", "bug_lines", "lines"]) {
    Some(list) => list.iter().filter_map(as_u32).collect(),
    None => u32_field(raw, &["line", "lineNumber", "line_number"]).into_iter().collect(),
  };
  bug_lines.retain(|l| *l > 0);
  bug_lines.sort_unstable();
  bug_lines.dedup();

  let mut fix_options: Vec<FixOption> = arr_field(raw, &["fixOptions", "fix_options", "options"])
    .map(|list| {
      list
        .iter()
        .enumerate()
        .map(|(k, o)| FixOption {
          id: str_field(o, &["id"]).unwrap_or_else(|| format!("{id}-opt-{}", k + 1)),
          code: str_field(o, &["code", "text", "label", "fix"]).unwrap_or_default(),
          is_correct: bool_field(o, &["isCorrect", "is_correct", "correct"]).unwrap_or(false),
          feedback: str_field(o, &["feedback", "explanation"]).unwrap_or_default(),
        })
        .collect()
    })
    .unwrap_or_default();

  let mut fix_code = str_field(raw, &["fixCode", "fix_code", "correctCode", "correct_code", "fix"])
    .or_else(|| {
      let lines = str_list(raw, &["correctLines", "correct_lines", "fixLines"]);
      (!lines.is_empty()).then(|| lines.join("\n"))
    })
    .unwrap_or_default();

  keep_single_correct(&mut fix_options, &fix_code);
  if fix_code.is_empty() {
    if let Some(opt) = fix_options.iter().find(|o| o.is_correct) {
      fix_code = opt.code.clone();
    }
  }

  Defect {
    id,
    bug_lines,
    fix_code,
    difficulty: difficulty_of(raw),
    explanation: str_field(raw, &["explanation", "description"]).unwrap_or_default(),
    hints: hints_of(raw),
    fix_options,
  }
}

/// Closed option sets carry exactly one correct flag: the first flagged one, or
/// the option whose code matches the canonical fix.
fn keep_single_correct(options: &mut [FixOption], fix_code: &str) {
  if options.is_empty() {
    return;
  }
  let chosen = options.iter().position(|o| o.is_correct).or_else(|| {
    let wanted = crate::util::code_lines(fix_code);
    (!wanted.is_empty()).then(|| options.iter().position(|o| crate::util::code_lines(&o.code) == wanted)).flatten()
  });
  for (i, o) in options.iter_mut().enumerate() {
    o.is_correct = Some(i) == chosen;
  }
}

fn normalize_blocks(source: &Value, round_id: &str) -> BlockOrderContent {
  let blocks: Vec<Block> = arr_field(source, &["blocks"])
    .map(|list| {
      list
        .iter()
        .enumerate()
        .map(|(k, b)| Block {
          id: str_field(b, &["id"]).unwrap_or_else(|| format!("{round_id}-block-{}", k + 1)),
          code: str_field(b, &["code", "text", "content"]).unwrap_or_default(),
          indent: u32_field(b, &["indent", "indentLevel", "indent_level"]).unwrap_or(0),
          is_distractor: bool_field(b, &["isDistractor", "is_distractor", "distractor"]).unwrap_or(false),
          explanation: str_field(b, &["explanation", "feedback"]).unwrap_or_default(),
        })
        .collect()
    })
    .unwrap_or_default();

  // A present key is authoritative even when every id is dropped.
  const ORDER_KEYS: &[&str] = &["correctOrder", "correct_order", "solution"];
  let correct_order: Vec<String> = if field(source, ORDER_KEYS).is_some() {
    str_list(source, ORDER_KEYS).into_iter().filter(|id| blocks.iter().any(|b| &b.id == id)).collect()
  } else {
    blocks.iter().filter(|b| !b.is_distractor).map(|b| b.id.clone()).collect()
  };

  BlockOrderContent { blocks, correct_order }
}

fn normalize_challenges(source: &Value, round_id: &str) -> ComplexityContent {
  let challenges = arr_field(source, &["challenges", "questions"])
    .map(|list| list.iter().enumerate().map(|(i, c)| normalize_challenge(c, round_id, i + 1)).collect())
    .unwrap_or_default();
  ComplexityContent { challenges }
}

fn normalize_challenge(raw: &Value, round_id: &str, n: usize) -> Challenge {
  let id = str_field(raw, &["id"]).unwrap_or_else(|| format!("{round_id}-challenge-{n}"));

  let mut flagged: Option<String> = None;
  let options: Vec<ChoiceOption> = arr_field(raw, &["options", "choices"])
    .map(|list| {
      list
        .iter()
        .enumerate()
        .map(|(k, o)| {
          let opt = match o {
            Value::String(label) => ChoiceOption { id: format!("{id}-opt-{}", k + 1), label: label.clone() },
            _ => ChoiceOption {
              id: str_field(o, &["id"]).unwrap_or_else(|| format!("{id}-opt-{}", k + 1)),
              label: str_field(o, &["label", "text", "value"]).unwrap_or_default(),
            },
          };
          if flagged.is_none() && bool_field(o, &["isCorrect", "is_correct", "correct"]).unwrap_or(false) {
            flagged = Some(opt.id.clone());
          }
          opt
        })
        .collect()
    })
    .unwrap_or_default();

  // The declared answer may name an option by id or by label.
  let correct_option_id = str_field(raw, &["correctOptionId", "correct_option_id", "correctAnswer", "correct_answer", "answer"])
    .and_then(|a| options.iter().find(|o| o.id == a || o.label == a).map(|o| o.id.clone()))
    .or(flagged)
    .unwrap_or_default();

  let mut sections: Vec<CodeSection> = arr_field(raw, &["sections", "codeSections", "code_sections"])
    .map(|list| {
      list
        .iter()
        .enumerate()
        .map(|(k, s)| {
          let start_line = u32_field(s, &["startLine", "start_line", "start"]).unwrap_or(0);
          CodeSection {
            id: str_field(s, &["id"]).unwrap_or_else(|| format!("{id}-sec-{}", k + 1)),
            label: str_field(s, &["label", "name"]).unwrap_or_default(),
            start_line,
            end_line: u32_field(s, &["endLine", "end_line", "end"]).unwrap_or(start_line).max(start_line),
            is_bottleneck: bool_field(s, &["isBottleneck", "is_bottleneck", "bottleneck"]).unwrap_or(false),
          }
        })
        .collect()
    })
    .unwrap_or_default();
  let first_bottleneck = sections.iter().position(|s| s.is_bottleneck);
  for (i, s) in sections.iter_mut().enumerate() {
    s.is_bottleneck = Some(i) == first_bottleneck;
  }

  Challenge {
    id,
    prompt: str_field(raw, &["prompt", "question", "text"]).unwrap_or_default(),
    options,
    correct_option_id,
    difficulty: difficulty_of(raw),
    explanation: str_field(raw, &["explanation"]).unwrap_or_default(),
    hints: hints_of(raw),
    sections,
  }
}

fn difficulty_of(raw: &Value) -> u8 {
  let d = match field(raw, &["difficulty", "weight"]) {
    Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
      "easy" => 1,
      "medium" => 2,
      "hard" => 3,
      other => other.parse::<u32>().unwrap_or(1),
    },
    Some(v) => as_u32(v).unwrap_or(1),
    None => 1,
  };
  d.clamp(1, 3) as u8
}

fn hints_of(raw: &Value) -> Vec<String> {
  let list = str_list(raw, &["hints"]);
  if !list.is_empty() {
    return list;
  }
  str_field(raw, &["hint"]).into_iter().collect()
}

// ---- tolerant field access ----

fn field<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
  keys.iter().filter_map(|k| obj.get(*k)).find(|v| !v.is_null())
}

fn str_field(obj: &Value, keys: &[&str]) -> Option<String> {
  match field(obj, keys)? {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

fn u32_field(obj: &Value, keys: &[&str]) -> Option<u32> {
  field(obj, keys).and_then(as_u32)
}

fn bool_field(obj: &Value, keys: &[&str]) -> Option<bool> {
  match field(obj, keys)? {
    Value::Bool(b) => Some(*b),
    Value::String(s) => match s.as_str() {
      "true" | "yes" => Some(true),
      "false" | "no" => Some(false),
      _ => None,
    },
    Value::Number(n) => n.as_i64().map(|v| v != 0),
    _ => None,
  }
}

fn arr_field<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
  field(obj, keys).and_then(Value::as_array)
}

fn str_list(obj: &Value, keys: &[&str]) -> Vec<String> {
  arr_field(obj, keys)
    .map(|list| {
      list
        .iter()
        .filter_map(|v| match v {
          Value::String(s) => Some(s.clone()),
          Value::Number(n) => Some(n.to_string()),
          _ => None,
        })
        .collect()
    })
    .unwrap_or_default()
}

fn as_u32(v: &Value) -> Option<u32> {
  match v {
    Value::Number(n) => n.as_u64().and_then(|x| u32::try_from(x).ok()),
    Value::String(s) => s.trim().parse::<u32>().ok(),
    _ => None,
  }
}
