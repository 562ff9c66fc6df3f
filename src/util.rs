//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Split code into comparable lines: inner whitespace runs collapsed to a single
/// space, each line trimmed, empty lines dropped.
pub fn code_lines(code: &str) -> Vec<String> {
  code
    .lines()
    .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
    .filter(|l| !l.is_empty())
    .collect()
}

/// Compare program output ignoring trailing newlines and surrounding blanks.
pub fn same_output(a: &str, b: &str) -> bool {
  a.trim() == b.trim()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_every_key() {
    let out = fill_template("+{points} for {item}, {points}!", &[("points", "150"), ("item", "bug-1")]);
    assert_eq!(out, "+150 for bug-1, 150!");
  }

  #[test]
  fn code_lines_ignores_blank_lines_and_spacing() {
    let lines = code_lines("  while   left <= right:\n\n\t mid = (left + right) // 2  \n");
    assert_eq!(lines, vec!["while left <= right:", "mid = (left + right) // 2"]);
  }

  #[test]
  fn trunc_for_log_keeps_short_strings() {
    assert_eq!(trunc_for_log("abc", 10), "abc");
    assert!(trunc_for_log("abcdefghijkl", 4).starts_with("abcd…"));
  }
}
