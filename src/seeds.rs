//! Built-in blueprints. They keep the service usable without a generator and
//! double as fixtures for the state machine tests.

use serde_json::{json, Value};

/// Names accepted by `sample`.
pub const SAMPLE_NAMES: &[&str] = &["binary-search", "insertion-sort", "duplicate-pairs"];

pub fn sample(name: &str) -> Option<Value> {
  match name {
    "binary-search" => Some(binary_search_bug_hunt()),
    "insertion-sort" => Some(sorting_block_order()),
    "duplicate-pairs" => Some(bottleneck_complexity()),
    _ => None,
  }
}

/// One off-by-one defect on line 4, a red herring on line 2.
pub fn binary_search_bug_hunt() -> Value {
  let code = [
    "def binary_search(items, target):",
    "    left, right = 0, len(items) - 1",
    "    # search the closed interval [left, right]",
    "    while left < right:",
    "        mid = (left + right) // 2",
    "        if items[mid] == target:",
    "            return mid",
    "        elif items[mid] < target:",
    "            left = mid + 1",
    "        else:",
    "            right = mid - 1",
    "    return -1",
    "",
    "if __name__ == \"__main__\":",
    "    import sys",
    "    *xs, t = map(int, sys.stdin.read().split())",
    "    print(binary_search(xs, t))",
  ]
  .join("\n");
  json!({
    "id": "binary-search",
    "title": "Binary search that misses the last element",
    "language": "python",
    "buggyCode": code,
    "bugs": [{
      "id": "bug-1",
      "bugLines": [4],
      "difficulty": 1,
      "explanation": "With an inclusive right bound the loop must also run when left == right.",
      "hints": [
        "Search for the last element of a short list by hand.",
        "The loop condition stops one iteration early."
      ],
      "fixOptions": [
        { "id": "opt-a", "code": "while left < right - 1:", "feedback": "That stops even earlier." },
        { "id": "opt-b", "code": "while left <= right:", "isCorrect": true },
        { "id": "opt-c", "code": "while left != right:", "feedback": "Still skips the case left == right." }
      ]
    }],
    "redHerrings": [
      { "line": 2, "explanation": "len(items) - 1 is the right start for an inclusive bound." }
    ],
    "testCases": [
      { "id": "last", "inputDescription": "target is the last element", "input": "1 3 5 7 7",
        "expectedOutput": "3", "buggyOutput": "-1", "exposedBugs": ["bug-1"] },
      { "id": "first", "inputDescription": "target is the first element", "input": "1 3 5 7 1",
        "expectedOutput": "0", "buggyOutput": "-1", "exposedBugs": ["bug-1"] },
      { "id": "middle", "inputDescription": "target found on the first probe", "input": "1 3 5 7 3",
        "expectedOutput": "1", "buggyOutput": "1", "exposedBugs": [] },
      { "id": "absent", "inputDescription": "target not present", "input": "2 4 6 5",
        "expectedOutput": "-1", "buggyOutput": "-1", "exposedBugs": [] }
    ],
    "config": { "fixMode": "multiple_choice", "maxAttempts": 3, "maxWrongLineClicks": 5 }
  })
}

/// Insertion sort in nine blocks plus two distractors.
pub fn sorting_block_order() -> Value {
  json!({
    "id": "insertion-sort",
    "title": "Assemble insertion sort",
    "language": "python",
    "type": "block_order",
    "blocks": [
      { "id": "b1", "code": "def insertion_sort(xs):", "indent": 0 },
      { "id": "b2", "code": "for i in range(1, len(xs)):", "indent": 1,
        "explanation": "The outer loop starts at the second element." },
      { "id": "b3", "code": "key = xs[i]", "indent": 2 },
      { "id": "b4", "code": "j = i - 1", "indent": 2 },
      { "id": "b5", "code": "while j >= 0 and xs[j] > key:", "indent": 2,
        "explanation": "Shift while the left neighbour is larger." },
      { "id": "b6", "code": "xs[j + 1] = xs[j]", "indent": 3 },
      { "id": "b7", "code": "j -= 1", "indent": 3 },
      { "id": "b8", "code": "xs[j + 1] = key", "indent": 2,
        "explanation": "The key lands after the shifting stops." },
      { "id": "b9", "code": "return xs", "indent": 1 },
      { "id": "d1", "code": "xs[j] = key", "indent": 2, "isDistractor": true,
        "explanation": "Off by one: j already points left of the gap." },
      { "id": "d2", "code": "for i in range(len(xs)):", "indent": 1, "isDistractor": true,
        "explanation": "Starting at 0 compares the first element with nothing." }
    ],
    "correctOrder": ["b1", "b2", "b3", "b4", "b5", "b6", "b7", "b8", "b9"],
    "config": { "indentationMatters": true, "maxAttempts": 3 }
  })
}

/// Two questions over one function; the first also asks for the bottleneck.
pub fn bottleneck_complexity() -> Value {
  let code = [
    "def duplicate_pairs(path):",
    "    with open(path) as f:",
    "        scores = [int(x) for x in f]",
    "    pairs = 0",
    "    for i in range(len(scores)):",
    "        for j in range(i + 1, len(scores)):",
    "            pairs += scores[i] == scores[j]",
    "    print(f\"{pairs} duplicate pairs\")",
    "    return pairs",
  ]
  .join("\n");
  json!({
    "id": "duplicate-pairs",
    "title": "Where does the time go?",
    "language": "python",
    "code": code,
    "challenges": [
      {
        "id": "overall",
        "prompt": "What is the time complexity of duplicate_pairs, and which section dominates?",
        "options": [
          { "id": "o-n", "label": "O(n)" },
          { "id": "o-nlogn", "label": "O(n log n)" },
          { "id": "o-n2", "label": "O(n^2)" }
        ],
        "correctOptionId": "o-n2",
        "difficulty": 2,
        "explanation": "Every pair (i, j) is compared once: n(n-1)/2 comparisons.",
        "hints": ["Reading the file touches each line once.", "Count the iterations of the inner loop."],
        "sections": [
          { "id": "sec-read", "label": "read scores", "startLine": 2, "endLine": 3 },
          { "id": "sec-pairs", "label": "compare pairs", "startLine": 5, "endLine": 7, "isBottleneck": true },
          { "id": "sec-report", "label": "report", "startLine": 8, "endLine": 9 }
        ]
      },
      {
        "id": "reading",
        "prompt": "What is the cost of reading the scores (lines 2-3) alone?",
        "options": [
          { "id": "o-1", "label": "O(1)" },
          { "id": "o-n", "label": "O(n)" },
          { "id": "o-n2", "label": "O(n^2)" }
        ],
        "correctOptionId": "o-n",
        "difficulty": 1,
        "explanation": "Each line of the file is parsed once."
      }
    ]
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{ExerciseFamily, FixMode};
  use crate::normalize::normalize;

  #[test]
  fn every_sample_normalizes_to_a_playable_round() {
    for name in SAMPLE_NAMES {
      let bp = normalize(&sample(name).unwrap());
      assert_eq!(bp.rounds.len(), 1, "{name}");
      assert!(bp.total_items() > 0, "{name}");
    }
    assert!(sample("nope").is_none());
  }

  #[test]
  fn binary_search_seed_shape() {
    let bp = normalize(&binary_search_bug_hunt());
    let round = &bp.rounds[0];
    assert_eq!(round.family(), ExerciseFamily::BugHunt);
    assert_eq!(round.config.fix_mode, FixMode::MultipleChoice);
    assert_eq!(round.code.lines().nth(3), Some("    while left < right:"));
    let bug = round.bug(0).unwrap();
    assert_eq!(bug.correct_option().map(|o| o.id.as_str()), Some("opt-b"));
    assert_eq!(bug.fix_code, "while left <= right:");
  }

  #[test]
  fn block_seed_has_two_distractors() {
    let bp = normalize(&sorting_block_order());
    let crate::domain::RoundContent::BlockOrder(c) = &bp.rounds[0].content else { panic!("expected blocks") };
    assert_eq!(c.blocks.len(), 11);
    assert_eq!(c.correct_order.len(), 9);
    assert_eq!(c.blocks.iter().filter(|b| b.is_distractor).count(), 2);
  }
}
