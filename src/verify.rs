//! Verification strategies: decide whether a submitted answer is correct.
//!
//! - structural text match (free-text fixes)
//! - closed option match (fix options, complexity labels, bottleneck sections)
//! - block order match
//! - delegated execution, interpreted per test case, with a degraded fallback
//!   that never reports success for tests the active defect affects.

use serde::{Deserialize, Serialize};

use crate::domain::{BlockOrderContent, Challenge, Defect, RoundConfig, TestCase};
use crate::error::SandboxError;
use crate::util::{code_lines, same_output};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
  pub id: String,
  pub passed: bool,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub detail: String,
}

impl CheckResult {
  fn new(id: impl Into<String>, passed: bool) -> Self {
    Self { id: id.into(), passed, detail: String::new() }
  }

  fn with_detail(mut self, detail: impl Into<String>) -> Self {
    self.detail = detail.into();
    self
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
  /// The sandbox could not be used; results come from the recorded baseline.
  ExecutionUnavailable { reason: String },
  UnknownOption { option_id: String },
  /// A bottleneck question was answered without choosing a section.
  SectionMissing,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
  pub passed: bool,
  pub checks: Vec<CheckResult>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub diagnostic: Option<Diagnostic>,
}

impl VerificationResult {
  fn from_checks(checks: Vec<CheckResult>) -> Self {
    let passed = !checks.is_empty() && checks.iter().all(|c| c.passed);
    Self { passed, checks, diagnostic: None }
  }

  fn with_diagnostic(mut self, d: Diagnostic) -> Self {
    self.diagnostic = Some(d);
    self
  }

  pub fn passed_count(&self) -> usize {
    self.checks.iter().filter(|c| c.passed).count()
  }

  pub fn is_degraded(&self) -> bool {
    matches!(self.diagnostic, Some(Diagnostic::ExecutionUnavailable { .. }))
  }

  /// Verdict and diagnostic only; per-check flags and details would outline the answer.
  pub fn redacted(&self) -> Self {
    Self { passed: self.passed, checks: Vec::new(), diagnostic: self.diagnostic.clone() }
  }
}

/// Capability shared by every scorable exercise item.
pub trait Verifiable {
  type Answer: ?Sized;

  fn verify(&self, answer: &Self::Answer, config: &RoundConfig) -> VerificationResult;

  /// Difficulty weight (1..=3) fed into the scoring engine.
  fn weight(&self) -> u8;
}

// ---- structural text ----

/// Exact line-for-line comparison after whitespace normalization. One check per
/// reference line, plus one for surplus candidate lines.
pub fn verify_text(candidate: &str, reference: &str) -> VerificationResult {
  let got = code_lines(candidate);
  let want = code_lines(reference);
  let mut checks: Vec<CheckResult> = want
    .iter()
    .enumerate()
    .map(|(i, line)| CheckResult::new(format!("line-{}", i + 1), got.get(i) == Some(line)))
    .collect();
  if got.len() > want.len() {
    checks.push(CheckResult::new("extra-lines", false).with_detail(format!("{} unexpected line(s)", got.len() - want.len())));
  }
  VerificationResult::from_checks(checks)
}

// ---- defects ----

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FixAnswer {
  Option(String),
  Text(String),
}

impl Verifiable for Defect {
  type Answer = FixAnswer;

  fn verify(&self, answer: &FixAnswer, _config: &RoundConfig) -> VerificationResult {
    match answer {
      FixAnswer::Option(id) => match self.option(id) {
        Some(opt) => VerificationResult::from_checks(vec![CheckResult::new("option", opt.is_correct)]),
        None => VerificationResult::from_checks(vec![CheckResult::new("option", false)])
          .with_diagnostic(Diagnostic::UnknownOption { option_id: id.clone() }),
      },
      FixAnswer::Text(text) => verify_text(text, &self.fix_code),
    }
  }

  fn weight(&self) -> u8 {
    self.difficulty
  }
}

// ---- blocks ----

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPlacement {
  pub block_id: String,
  #[serde(default)]
  pub indent: u32,
}

impl Verifiable for BlockOrderContent {
  type Answer = [BlockPlacement];

  /// One check per expected position, one per distractor used, one for surplus blocks.
  fn verify(&self, placements: &[BlockPlacement], config: &RoundConfig) -> VerificationResult {
    let mut checks = Vec::with_capacity(self.correct_order.len());
    for (pos, expected_id) in self.correct_order.iter().enumerate() {
      let id = format!("position-{}", pos + 1);
      let check = match (placements.get(pos), self.block(expected_id)) {
        (Some(p), Some(expected)) if &p.block_id == expected_id => {
          if config.indentation_matters && p.indent != expected.indent {
            CheckResult::new(id, false).with_detail(format!("indent {} expected {}", p.indent, expected.indent))
          } else {
            CheckResult::new(id, true)
          }
        }
        (Some(p), _) => {
          let explanation = self.block(&p.block_id).map(|b| b.explanation.clone()).unwrap_or_default();
          CheckResult::new(id, false).with_detail(explanation)
        }
        (None, _) => CheckResult::new(id, false).with_detail("missing"),
      };
      checks.push(check);
    }

    for p in placements {
      if let Some(b) = self.block(&p.block_id).filter(|b| b.is_distractor) {
        checks.push(CheckResult::new(format!("distractor-{}", b.id), false).with_detail(b.explanation.clone()));
      }
    }
    if placements.len() > self.correct_order.len() {
      checks.push(CheckResult::new("extra-blocks", false));
    }
    VerificationResult::from_checks(checks)
  }

  fn weight(&self) -> u8 {
    1
  }
}

// ---- challenges ----

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceAnswer {
  pub option_id: String,
  #[serde(default)]
  pub section_id: Option<String>,
}

impl Verifiable for Challenge {
  type Answer = ChoiceAnswer;

  /// The label must match; bottleneck variants also need the flagged section.
  fn verify(&self, answer: &ChoiceAnswer, _config: &RoundConfig) -> VerificationResult {
    let mut checks = vec![CheckResult::new("label", answer.option_id == self.correct_option_id)];
    let mut diagnostic = None;
    if self.option(&answer.option_id).is_none() {
      diagnostic = Some(Diagnostic::UnknownOption { option_id: answer.option_id.clone() });
    }
    if self.is_bottleneck_variant() {
      let ok = match (&answer.section_id, self.bottleneck_section()) {
        (Some(chosen), Some(b)) => chosen == &b.id,
        (None, _) => {
          diagnostic.get_or_insert(Diagnostic::SectionMissing);
          false
        }
        _ => false,
      };
      checks.push(CheckResult::new("section", ok));
    }
    let mut result = VerificationResult::from_checks(checks);
    result.diagnostic = diagnostic;
    result
  }

  fn weight(&self) -> u8 {
    self.difficulty
  }
}

// ---- delegated execution ----

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
  pub code: String,
  pub language: String,
  pub test_inputs: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
  #[serde(alias = "exit_code")]
  pub exit_code: i32,
  #[serde(default)]
  pub output: String,
  #[serde(default)]
  pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResponse {
  pub results: Vec<ExecutionOutcome>,
}

/// Splice a fix into the round source: the first defect line is replaced by the
/// fix (re-indented to that line), the remaining defect lines are dropped.
pub fn apply_fix(code: &str, bug_lines: &[u32], fix: &str) -> String {
  let Some(&first) = bug_lines.first() else {
    return code.to_string();
  };
  let mut out = Vec::new();
  for (i, line) in code.lines().enumerate() {
    let n = i as u32 + 1;
    if n == first {
      let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
      out.extend(reindent(fix, &indent));
    } else if !bug_lines.contains(&n) {
      out.push(line.to_string());
    }
  }
  out.join("\n")
}

fn reindent(fix: &str, indent: &str) -> Vec<String> {
  let lines: Vec<&str> = fix.lines().filter(|l| !l.trim().is_empty()).collect();
  let common = lines.iter().map(|l| l.len() - l.trim_start().len()).min().unwrap_or(0);
  lines.iter().map(|l| format!("{indent}{}", l.get(common..).unwrap_or_else(|| l.trim_start()))).collect()
}

pub fn execution_request(code: &str, language: &str, defect: &Defect, fix: &str, tests: &[TestCase]) -> ExecutionRequest {
  ExecutionRequest {
    code: apply_fix(code, &defect.bug_lines, fix),
    language: language.to_string(),
    test_inputs: tests.iter().map(|t| t.input.clone()).collect(),
  }
}

/// Map the sandbox outcome onto the round's test cases. Anything other than a
/// well-formed, positionally aligned response takes the degraded path.
pub fn interpret_execution(
  outcome: Result<ExecutionResponse, SandboxError>,
  tests: &[TestCase],
  active_bug: &str,
) -> VerificationResult {
  let response = match outcome {
    Ok(r) if r.results.len() == tests.len() => r,
    Ok(r) => {
      let err = SandboxError::Malformed(format!("expected {} results, got {}", tests.len(), r.results.len()));
      return degraded_results(tests, active_bug, &err);
    }
    Err(err) => return degraded_results(tests, active_bug, &err),
  };

  let checks = tests
    .iter()
    .zip(response.results.iter())
    .map(|(t, r)| {
      let error = r.error.as_deref().unwrap_or("").trim();
      let passed = r.exit_code == 0 && same_output(&r.output, &t.expected_output) && error.is_empty();
      let check = CheckResult::new(t.id.clone(), passed);
      if passed {
        check
      } else if !error.is_empty() {
        check.with_detail(error.to_string())
      } else {
        check.with_detail(format!("exit {} output {:?}", r.exit_code, r.output.trim()))
      }
    })
    .collect();
  VerificationResult::from_checks(checks)
}

/// Baseline verdicts when the sandbox is unusable: tests exposing the active
/// defect fail; the rest pass only if the unfixed code already produced the
/// expected output.
pub fn degraded_results(tests: &[TestCase], active_bug: &str, err: &SandboxError) -> VerificationResult {
  let checks: Vec<CheckResult> = tests
    .iter()
    .map(|t| {
      let passed = if t.exposed_bugs.iter().any(|b| b == active_bug) {
        false
      } else {
        t.expected_output == t.buggy_output
      };
      CheckResult::new(t.id.clone(), passed).with_detail("not executed")
    })
    .collect();
  VerificationResult {
    // Degraded results never confirm a fix.
    passed: false,
    checks,
    diagnostic: Some(Diagnostic::ExecutionUnavailable { reason: err.kind().to_string() }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Block, CodeSection, ChoiceOption, FixMode, FixOption, VerificationMode};

  fn cfg(indentation_matters: bool) -> RoundConfig {
    RoundConfig {
      fix_mode: FixMode::FreeText,
      verification: VerificationMode::Structural,
      reveal_sequentially: true,
      max_wrong_line_clicks: 5,
      max_attempts: 3,
      indentation_matters,
    }
  }

  fn test_case(id: &str, expected: &str, buggy: &str, exposed: &[&str]) -> TestCase {
    TestCase {
      id: id.into(),
      input_description: String::new(),
      input: String::new(),
      expected_output: expected.into(),
      buggy_output: buggy.into(),
      exposed_bugs: exposed.iter().map(|s| s.to_string()).collect(),
    }
  }

  #[test]
  fn text_match_ignores_spacing_but_not_content() {
    assert!(verify_text("  while left  <= right:\n\n", "while left <= right:").passed);
    assert!(!verify_text("while left < right:", "while left <= right:").passed);
    let extra = verify_text("a = 1\nb = 2\nc = 3", "a = 1\nb = 2");
    assert!(!extra.passed);
    assert_eq!(extra.passed_count(), 2);
    assert!(!verify_text("", "").passed);
  }

  #[test]
  fn defect_option_match_and_unknown_option() {
    let d = Defect {
      id: "b1".into(),
      bug_lines: vec![4],
      fix_code: "x".into(),
      difficulty: 1,
      explanation: String::new(),
      hints: vec![],
      fix_options: vec![
        FixOption { id: "o1".into(), code: "x".into(), is_correct: true, feedback: String::new() },
        FixOption { id: "o2".into(), code: "y".into(), is_correct: false, feedback: String::new() },
      ],
    };
    assert!(d.verify(&FixAnswer::Option("o1".into()), &cfg(true)).passed);
    assert!(!d.verify(&FixAnswer::Option("o2".into()), &cfg(true)).passed);
    let unknown = d.verify(&FixAnswer::Option("zz".into()), &cfg(true));
    assert_eq!(unknown.diagnostic, Some(Diagnostic::UnknownOption { option_id: "zz".into() }));
  }

  fn blocks() -> BlockOrderContent {
    let mk = |id: &str, indent: u32, d: bool| Block {
      id: id.into(),
      code: id.into(),
      indent,
      is_distractor: d,
      explanation: format!("{id} explained"),
    };
    BlockOrderContent {
      blocks: vec![mk("a", 0, false), mk("b", 1, false), mk("x", 0, true)],
      correct_order: vec!["a".into(), "b".into()],
    }
  }

  fn place(id: &str, indent: u32) -> BlockPlacement {
    BlockPlacement { block_id: id.into(), indent }
  }

  #[test]
  fn block_order_checks_order_indent_and_distractors() {
    let c = blocks();
    assert!(c.verify(&[place("a", 0), place("b", 1)], &cfg(true)).passed);
    assert!(!c.verify(&[place("a", 0), place("b", 0)], &cfg(true)).passed);
    assert!(c.verify(&[place("a", 0), place("b", 0)], &cfg(false)).passed);
    assert!(!c.verify(&[place("b", 1), place("a", 0)], &cfg(true)).passed);
    let with_distractor = c.verify(&[place("a", 0), place("b", 1), place("x", 0)], &cfg(true));
    assert!(!with_distractor.passed);
    assert!(with_distractor.checks.iter().any(|c| c.id == "distractor-x" && c.detail == "x explained"));
  }

  #[test]
  fn bottleneck_needs_label_and_section() {
    let ch = Challenge {
      id: "c1".into(),
      prompt: String::new(),
      options: vec![
        ChoiceOption { id: "n".into(), label: "O(n)".into() },
        ChoiceOption { id: "n2".into(), label: "O(n^2)".into() },
      ],
      correct_option_id: "n2".into(),
      difficulty: 1,
      explanation: String::new(),
      hints: vec![],
      sections: vec![
        CodeSection { id: "s1".into(), label: "setup".into(), start_line: 1, end_line: 2, is_bottleneck: false },
        CodeSection { id: "s2".into(), label: "loops".into(), start_line: 3, end_line: 6, is_bottleneck: true },
      ],
    };
    let answer = |o: &str, s: Option<&str>| ChoiceAnswer { option_id: o.into(), section_id: s.map(Into::into) };
    assert!(ch.verify(&answer("n2", Some("s2")), &cfg(true)).passed);
    assert!(!ch.verify(&answer("n2", Some("s1")), &cfg(true)).passed);
    assert!(!ch.verify(&answer("n", Some("s2")), &cfg(true)).passed);
    let missing = ch.verify(&answer("n2", None), &cfg(true));
    assert!(!missing.passed);
    assert_eq!(missing.diagnostic, Some(Diagnostic::SectionMissing));
  }

  #[test]
  fn execution_results_map_per_test() {
    let tests = vec![test_case("t1", "3", "-1", &["b1"]), test_case("t2", "0", "0", &[])];
    let ok = ExecutionResponse {
      results: vec![
        ExecutionOutcome { exit_code: 0, output: "3\n".into(), error: None },
        ExecutionOutcome { exit_code: 0, output: "0".into(), error: Some(String::new()) },
      ],
    };
    assert!(interpret_execution(Ok(ok), &tests, "b1").passed);

    let failing = ExecutionResponse {
      results: vec![
        ExecutionOutcome { exit_code: 1, output: "3".into(), error: None },
        ExecutionOutcome { exit_code: 0, output: "0".into(), error: Some("Traceback".into()) },
      ],
    };
    let r = interpret_execution(Ok(failing), &tests, "b1");
    assert!(!r.passed);
    assert_eq!(r.passed_count(), 0);
    assert_eq!(r.checks[1].detail, "Traceback");
  }

  #[test]
  fn unreachable_sandbox_degrades_without_false_positives() {
    let tests = vec![
      test_case("t1", "3", "-1", &["b1"]),
      test_case("t2", "0", "0", &[]),
      test_case("t3", "5", "4", &["b2"]),
    ];
    let r = interpret_execution(Err(SandboxError::Unreachable("refused".into())), &tests, "b1");
    assert!(!r.passed);
    assert!(r.is_degraded());
    let verdicts: Vec<bool> = r.checks.iter().map(|c| c.passed).collect();
    assert_eq!(verdicts, vec![false, true, false]);
  }

  #[test]
  fn misaligned_response_is_treated_as_malformed() {
    let tests = vec![test_case("t1", "1", "1", &[])];
    let r = interpret_execution(Ok(ExecutionResponse { results: vec![] }), &tests, "b1");
    assert_eq!(r.diagnostic, Some(Diagnostic::ExecutionUnavailable { reason: "malformed".into() }));
  }

  #[test]
  fn apply_fix_replaces_defect_lines_with_indentation() {
    let code = "def f(xs):\n    left = 0\n    while left < right:\n        pass\n    return -1";
    assert_eq!(
      apply_fix(code, &[3], "while left <= right:"),
      "def f(xs):\n    left = 0\n    while left <= right:\n        pass\n    return -1"
    );
    assert_eq!(apply_fix(code, &[2, 3], "  a = 1\n  b = 2"), "def f(xs):\n    a = 1\n    b = 2\n        pass\n    return -1");
  }
}
