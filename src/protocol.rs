//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Views never carry answer keys: correctness flags, canonical fixes and
//! bottleneck markers stay on the server.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{ExerciseFamily, FixMode, PlayMode, RoundContent};
use crate::machine::{Event, FinalReport, GameState};
use crate::progression::{Playability, Progression, SceneDescriptor, SceneScore};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  Start(CreateSessionIn),
  Event { event: Event },
  Report,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  State { view: SessionView },
  Report(ReportOut),
  Error { message: String },
}

/// How to build a session: inline blueprint, built-in sample, or a scene list.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionIn {
  #[serde(default)]
  pub blueprint: Option<Value>,
  #[serde(default)]
  pub sample: Option<String>,
  #[serde(default)]
  pub scenes: Option<Vec<SceneDescriptor>>,
  /// Fixes the block shuffle; random when absent.
  #[serde(default)]
  pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
  pub session_id: Uuid,
  pub blueprint_id: String,
  pub title: String,
  pub mode: PlayMode,
  pub round_count: usize,
  pub round: Option<RoundView>,
  pub state: GameState,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub progression: Option<ProgressionView>,
}

impl SessionView {
  pub fn new(session_id: Uuid, game: &GameState, progression: Option<&Progression>) -> Self {
    let mut state = game.clone();
    if game.blueprint.mode == PlayMode::Test {
      state.last_result = state.last_result.map(|r| r.redacted());
    }
    Self {
      session_id,
      blueprint_id: game.blueprint.id.clone(),
      title: game.blueprint.title.clone(),
      mode: game.blueprint.mode,
      round_count: game.blueprint.rounds.len(),
      round: RoundView::from_state(game),
      state,
      progression: progression.map(ProgressionView::from),
    }
  }
}

/// The learner-facing part of the active round.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
  pub id: String,
  pub title: String,
  pub family: ExerciseFamily,
  pub code: String,
  pub item_count: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub fix_mode: Option<FixMode>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub fix_options: Vec<OptionView>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub blocks: Vec<OptionView>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub challenge: Option<ChallengeView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionView {
  pub id: String,
  pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeView {
  pub id: String,
  pub prompt: String,
  pub options: Vec<OptionView>,
  pub sections: Vec<SectionView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionView {
  pub id: String,
  pub label: String,
  pub start_line: u32,
  pub end_line: u32,
}

impl RoundView {
  pub fn from_state(game: &GameState) -> Option<Self> {
    let round = game.round()?;
    let mut view = RoundView {
      id: round.id.clone(),
      title: round.title.clone(),
      family: round.family(),
      code: round.code.clone(),
      item_count: round.item_count(),
      fix_mode: None,
      fix_options: Vec::new(),
      blocks: Vec::new(),
      challenge: None,
    };
    match &round.content {
      RoundContent::BugHunt(c) => {
        view.fix_mode = Some(round.config.fix_mode);
        if let Some(bug) = c.bugs.get(game.item_index) {
          view.fix_options =
            bug.fix_options.iter().map(|o| OptionView { id: o.id.clone(), text: o.code.clone() }).collect();
        }
      }
      RoundContent::BlockOrder(c) => {
        view.blocks = game
          .presented_blocks
          .iter()
          .filter_map(|id| c.block(id))
          .map(|b| OptionView { id: b.id.clone(), text: b.code.clone() })
          .collect();
      }
      RoundContent::Complexity(c) => {
        view.challenge = c.challenges.get(game.item_index).map(|ch| ChallengeView {
          id: ch.id.clone(),
          prompt: ch.prompt.clone(),
          options: ch.options.iter().map(|o| OptionView { id: o.id.clone(), text: o.label.clone() }).collect(),
          sections: ch
            .sections
            .iter()
            .map(|s| SectionView { id: s.id.clone(), label: s.label.clone(), start_line: s.start_line, end_line: s.end_line })
            .collect(),
        });
      }
    }
    Some(view)
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionView {
  pub scene_ids: Vec<String>,
  pub current_scene_id: Option<String>,
  pub complete: bool,
  pub aggregate: i64,
  pub scene_scores: Vec<SceneScore>,
}

impl From<&Progression> for ProgressionView {
  fn from(p: &Progression) -> Self {
    Self {
      scene_ids: p.scenes.iter().map(|s| s.id.clone()).collect(),
      current_scene_id: p.current_id().map(str::to_string),
      complete: p.is_complete(),
      aggregate: p.aggregate,
      scene_scores: p.scene_scores.clone(),
    }
  }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOut {
  pub session_id: Uuid,
  /// Reports of every finished scene, in play order.
  pub reports: Vec<FinalReport>,
  pub total_score: i64,
  pub complete: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneCheckOut {
  pub id: String,
  pub playable: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
  pub item_count: usize,
}

impl SceneCheckOut {
  pub fn new(id: &str, playability: &Playability) -> Self {
    match playability {
      Playability::Playable { blueprint } => {
        Self { id: id.to_string(), playable: true, reason: None, item_count: blueprint.total_items() }
      }
      Playability::Unplayable { reason } => {
        Self { id: id.to_string(), playable: false, reason: Some(reason.clone()), item_count: 0 }
      }
    }
  }
}

#[derive(Serialize)]
pub struct SamplesOut {
  pub names: Vec<&'static str>,
}

#[derive(Serialize)]
pub struct ErrorOut {
  pub error: String,
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
  pub execution: bool,
}
