//! Scene sequencing: chains independent exercises, validates each scene before
//! it is driven and aggregates the per-scene scores.
//!
//! A scene whose content lacks the minimum fields for its declared type is
//! never handed to the state machine. It scores 0 and is reported as skipped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{ExerciseFamily, FixMode, NormalizedBlueprint, Round, RoundContent};
use crate::normalize::normalize;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDescriptor {
  pub id: String,
  #[serde(alias = "type")]
  pub kind: String,
  #[serde(default)]
  pub content: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Playability {
  Playable { blueprint: NormalizedBlueprint },
  Unplayable { reason: String },
}

impl Playability {
  pub fn is_playable(&self) -> bool {
    matches!(self, Playability::Playable { .. })
  }
}

fn declared_family(kind: &str) -> Option<ExerciseFamily> {
  match kind.to_ascii_lowercase().replace('-', "_").as_str() {
    "bug_hunt" | "bughunt" | "bug_hunting" => Some(ExerciseFamily::BugHunt),
    "block_order" | "blockorder" | "reorder" | "parsons" => Some(ExerciseFamily::BlockOrder),
    "complexity" | "complexity_analysis" | "bottleneck" => Some(ExerciseFamily::Complexity),
    _ => None,
  }
}

/// Minimum-field validation for a scene's declared type.
pub fn check_scene(scene: &SceneDescriptor) -> Playability {
  let unplayable = |reason: String| {
    debug!(target: "exercise", scene = %scene.id, %reason, "Scene unplayable");
    Playability::Unplayable { reason }
  };

  let Some(family) = declared_family(&scene.kind) else {
    return unplayable(format!("unknown scene type '{}'", scene.kind));
  };
  if !scene.content.is_object() {
    return unplayable("scene content is not an object".into());
  }

  // The declared type wins over shape inference.
  let mut content = scene.content.clone();
  if let Some(obj) = content.as_object_mut() {
    if !obj.contains_key("rounds") {
      obj.insert("type".into(), Value::String(family_tag(family).into()));
    }
  }
  let blueprint = normalize(&content);

  if blueprint.rounds.is_empty() {
    return unplayable("scene has no rounds".into());
  }
  for round in &blueprint.rounds {
    if round.family() != family {
      return unplayable(format!("round '{}' is not a {} round", round.id, family_tag(family)));
    }
    if let Err(reason) = check_round(round) {
      return unplayable(format!("round '{}': {reason}", round.id));
    }
  }
  Playability::Playable { blueprint }
}

fn family_tag(family: ExerciseFamily) -> &'static str {
  match family {
    ExerciseFamily::BugHunt => "bug_hunt",
    ExerciseFamily::BlockOrder => "block_order",
    ExerciseFamily::Complexity => "complexity",
  }
}

fn check_round(round: &Round) -> Result<(), String> {
  match &round.content {
    RoundContent::BugHunt(c) => {
      if round.code.trim().is_empty() {
        return Err("missing code".into());
      }
      if c.bugs.is_empty() {
        return Err("no bugs".into());
      }
      let line_count = round.code.lines().count() as u32;
      for bug in &c.bugs {
        if bug.bug_lines.is_empty() {
          return Err(format!("bug '{}' has no lines", bug.id));
        }
        if bug.bug_lines.iter().any(|l| *l > line_count) {
          return Err(format!("bug '{}' points past the end of the code", bug.id));
        }
        match round.config.fix_mode {
          FixMode::MultipleChoice if bug.correct_option().is_none() => {
            return Err(format!("bug '{}' has no correct option", bug.id));
          }
          FixMode::FreeText if bug.fix_code.trim().is_empty() => {
            return Err(format!("bug '{}' has no fix", bug.id));
          }
          _ => {}
        }
      }
      Ok(())
    }
    RoundContent::BlockOrder(c) => {
      if c.blocks.is_empty() {
        return Err("no blocks".into());
      }
      if c.correct_order.is_empty() {
        return Err("no correct order".into());
      }
      Ok(())
    }
    RoundContent::Complexity(c) => {
      if c.challenges.is_empty() {
        return Err("no challenges".into());
      }
      for ch in &c.challenges {
        if ch.options.is_empty() || ch.option(&ch.correct_option_id).is_none() {
          return Err(format!("challenge '{}' has no valid answer", ch.id));
        }
        if !ch.sections.is_empty() && ch.bottleneck_section().is_none() {
          return Err(format!("challenge '{}' has sections but no bottleneck", ch.id));
        }
      }
      Ok(())
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneScore {
  pub scene_id: String,
  pub score: i64,
  #[serde(default)]
  pub skipped: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum NextScene {
  Index(usize),
  Complete,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneAdvance {
  pub next: NextScene,
  pub aggregate: i64,
  pub scene_scores: Vec<SceneScore>,
  /// Scenes passed over on the way to `next`, each recorded with score 0.
  pub skipped: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckedScene {
  pub id: String,
  pub playability: Playability,
}

impl CheckedScene {
  pub fn new(scene: &SceneDescriptor) -> Self {
    Self { id: scene.id.clone(), playability: check_scene(scene) }
  }
}

/// Record `score` for `completed_scene_id` and find the next playable scene
/// after it. A scene already scored keeps its first score.
pub fn advance_scene(
  scenes: &[CheckedScene],
  scene_scores: &[SceneScore],
  completed_scene_id: &str,
  score: i64,
) -> SceneAdvance {
  let mut scores = scene_scores.to_vec();
  let from = match scenes.iter().position(|s| s.id == completed_scene_id) {
    Some(i) => {
      if !scores.iter().any(|s| s.scene_id == completed_scene_id) {
        scores.push(SceneScore { scene_id: completed_scene_id.to_string(), score, skipped: false });
      }
      i + 1
    }
    None => {
      warn!(target: "exercise", scene = %completed_scene_id, "Score reported for an unknown scene");
      scenes.iter().position(|s| !scores.iter().any(|r| r.scene_id == s.id)).unwrap_or(scenes.len())
    }
  };
  next_from(scenes, scores, from)
}

/// Entry point of a sequence: skips leading unplayable scenes.
pub fn first_scene(scenes: &[CheckedScene]) -> SceneAdvance {
  next_from(scenes, Vec::new(), 0)
}

fn next_from(scenes: &[CheckedScene], mut scores: Vec<SceneScore>, from: usize) -> SceneAdvance {
  let mut skipped = Vec::new();
  let mut next = NextScene::Complete;
  for (i, scene) in scenes.iter().enumerate().skip(from) {
    if scene.playability.is_playable() {
      next = NextScene::Index(i);
      break;
    }
    if !scores.iter().any(|s| s.scene_id == scene.id) {
      scores.push(SceneScore { scene_id: scene.id.clone(), score: 0, skipped: true });
    }
    skipped.push(scene.id.clone());
  }
  let aggregate = scores.iter().map(|s| s.score).sum();
  SceneAdvance { next, aggregate, scene_scores: scores, skipped }
}

/// A running sequence of scenes, owned by one session.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progression {
  pub scenes: Vec<CheckedScene>,
  pub scene_scores: Vec<SceneScore>,
  pub current: NextScene,
  pub aggregate: i64,
}

impl Progression {
  pub fn new(scenes: &[SceneDescriptor]) -> Self {
    let scenes: Vec<CheckedScene> = scenes.iter().map(CheckedScene::new).collect();
    let start = first_scene(&scenes);
    Self { scenes, scene_scores: start.scene_scores, current: start.next, aggregate: start.aggregate }
  }

  pub fn current_blueprint(&self) -> Option<&NormalizedBlueprint> {
    let NextScene::Index(i) = self.current else { return None };
    match &self.scenes.get(i)?.playability {
      Playability::Playable { blueprint } => Some(blueprint),
      Playability::Unplayable { .. } => None,
    }
  }

  pub fn current_id(&self) -> Option<&str> {
    let NextScene::Index(i) = self.current else { return None };
    self.scenes.get(i).map(|s| s.id.as_str())
  }

  pub fn is_complete(&self) -> bool {
    self.current == NextScene::Complete
  }

  /// Close the current scene with its final score and move on.
  pub fn complete_current(&mut self, score: i64) -> Option<SceneAdvance> {
    let id = self.current_id()?.to_string();
    let step = advance_scene(&self.scenes, &self.scene_scores, &id, score);
    self.scene_scores = step.scene_scores.clone();
    self.current = step.next;
    self.aggregate = step.aggregate;
    Some(step)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::seeds;
  use serde_json::json;

  fn scene(id: &str, kind: &str, content: Value) -> SceneDescriptor {
    SceneDescriptor { id: id.into(), kind: kind.into(), content }
  }

  #[test]
  fn samples_are_playable_under_their_declared_type() {
    assert!(check_scene(&scene("a", "bug_hunt", seeds::binary_search_bug_hunt())).is_playable());
    assert!(check_scene(&scene("b", "block-order", seeds::sorting_block_order())).is_playable());
    assert!(check_scene(&scene("c", "complexity", seeds::bottleneck_complexity())).is_playable());
  }

  #[test]
  fn missing_fields_make_a_scene_unplayable() {
    let cases = vec![
      scene("no-code", "bug_hunt", json!({ "bugs": [{ "bugLines": [1], "fixCode": "x" }] })),
      scene("no-lines", "bug_hunt", json!({ "code": "a\nb", "bugs": [{ "fixCode": "x" }] })),
      scene("past-end", "bug_hunt", json!({ "code": "a\nb", "bugs": [{ "bugLines": [9], "fixCode": "x" }] })),
      scene("no-correct", "bug_hunt", json!({ "code": "a", "bugs": [{ "bugLines": [1], "options": [{ "code": "y" }] }] })),
      scene("no-blocks", "block_order", json!({ "blocks": [] })),
      scene("no-answer", "complexity", json!({ "challenges": [{ "options": ["O(n)"] }] })),
      scene("no-bottleneck", "complexity", json!({ "challenges": [{ "options": ["O(n)"], "answer": "O(n)",
        "sections": [{ "label": "all", "startLine": 1 }] }] })),
      scene("wrong-kind", "quiz", json!({ "challenges": [] })),
      scene("not-object", "complexity", json!("text")),
    ];
    for s in cases {
      assert!(matches!(check_scene(&s), Playability::Unplayable { .. }), "{} should be unplayable", s.id);
    }
  }

  #[test]
  fn advancing_skips_unplayable_scenes_with_zero_score() {
    let scenes = vec![
      CheckedScene::new(&scene("s1", "bug_hunt", seeds::binary_search_bug_hunt())),
      CheckedScene::new(&scene("broken", "block_order", json!({}))),
      CheckedScene::new(&scene("s3", "complexity", seeds::bottleneck_complexity())),
    ];
    let start = first_scene(&scenes);
    assert_eq!(start.next, NextScene::Index(0));

    let step = advance_scene(&scenes, &start.scene_scores, "s1", 150);
    assert_eq!(step.next, NextScene::Index(2));
    assert_eq!(step.skipped, vec!["broken".to_string()]);
    assert_eq!(step.aggregate, 150);
    assert!(step.scene_scores.iter().any(|s| s.scene_id == "broken" && s.skipped && s.score == 0));

    let done = advance_scene(&scenes, &step.scene_scores, "s3", 425);
    assert_eq!(done.next, NextScene::Complete);
    assert_eq!(done.aggregate, 575);

    // Reporting the same scene again does not count twice.
    let again = advance_scene(&scenes, &done.scene_scores, "s3", 425);
    assert_eq!(again.aggregate, 575);
  }

  #[test]
  fn progression_tracks_the_current_scene() {
    let mut p = Progression::new(&[
      scene("broken", "bug_hunt", json!({ "code": "" })),
      scene("only", "block_order", seeds::sorting_block_order()),
    ]);
    assert_eq!(p.current_id(), Some("only"));
    assert!(p.current_blueprint().is_some());
    assert_eq!(p.scene_scores.len(), 1);

    let step = p.complete_current(375).unwrap();
    assert_eq!(step.next, NextScene::Complete);
    assert!(p.is_complete());
    assert_eq!(p.aggregate, 375);
    assert!(p.complete_current(10).is_none());
  }
}
