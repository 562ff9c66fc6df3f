//! Application state: the in-memory session store, game settings and the
//! optional execution sandbox.
//!
//! This module owns:
//!   - sessions (one `GameState` each, plus an optional scene progression)
//!   - the shared `GameConfig` (scoring tables, bonuses, feedback templates)
//!   - the sandbox client, when an execution endpoint is configured
//!
//! Transitions themselves are pure; this is where the one asynchronous step
//! happens. When a transition leaves a pending verification, `dispatch` runs it
//! against the sandbox outside the store lock and feeds the verdict back tagged
//! with the generation it was issued under.

use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::{load_game_config_from_env, GameConfig};
use crate::domain::RoundContent;
use crate::error::{GameError, Result};
use crate::machine::{transition, Event, FinalReport, GameState, Phase, PendingVerification};
use crate::progression::{NextScene, Progression};
use crate::protocol::{CreateSessionIn, ReportOut, SessionView};
use crate::sandbox::{verify_by_execution, Sandbox};
use crate::seeds;

pub struct Session {
  pub id: Uuid,
  pub game: GameState,
  pub progression: Option<Progression>,
  pub reports: Vec<FinalReport>,
}

impl Session {
  pub fn view(&self) -> SessionView {
    SessionView::new(self.id, &self.game, self.progression.as_ref())
  }

  /// Apply one event; on completion, hand the score to the progression and
  /// load the next playable scene.
  fn apply(&mut self, event: &Event) {
    let before = self.game.phase;
    self.game = transition(&self.game, event);
    if before == Phase::Completed || self.game.phase != Phase::Completed {
      return;
    }
    let Some(report) = self.game.report() else { return };
    info!(target: "exercise", session = %self.id, total = report.total_score, all_correct = report.all_correct, "Exercise completed");
    let total = report.total_score;
    self.reports.push(report);

    let Some(progression) = self.progression.as_mut() else { return };
    let Some(step) = progression.complete_current(total) else { return };
    if !step.skipped.is_empty() {
      warn!(target: "exercise", session = %self.id, skipped = ?step.skipped, "Skipped unplayable scenes");
    }
    if let NextScene::Index(_) = step.next {
      if let Some(bp) = progression.current_blueprint() {
        let raw = serde_json::to_value(bp).unwrap_or(Value::Null);
        self.game = GameState::new(raw, self.game.settings.clone(), self.game.shuffle_seed);
      }
    }
  }

  fn total_score(&self) -> i64 {
    match &self.progression {
      Some(p) => p.aggregate,
      None => self.reports.iter().map(|r| r.total_score).sum(),
    }
  }
}

#[derive(Clone)]
pub struct AppState {
  pub sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
  pub config: Arc<GameConfig>,
  pub sandbox: Option<Sandbox>,
}

impl AppState {
  /// Build state from env: load config, init the sandbox client.
  #[instrument(level = "info", skip_all)]
  pub fn new() -> Self {
    Self::with_config(load_game_config_from_env())
  }

  pub fn with_config(config: GameConfig) -> Self {
    let sandbox = Sandbox::from_config(&config.execution);
    match &sandbox {
      Some(sb) => {
        info!(target: "gamelab", endpoint = %sb.endpoint, timeout = ?sb.timeout, "Execution sandbox enabled.")
      }
      None => info!(target: "gamelab", "Execution sandbox disabled. Execution rounds use recorded outputs."),
    }
    Self { sessions: Arc::new(RwLock::new(HashMap::new())), config: Arc::new(config), sandbox }
  }

  /// Create a session from an inline blueprint, a sample name or a scene list.
  #[instrument(level = "info", skip(self, req), fields(sample = ?req.sample, scenes = req.scenes.as_ref().map(Vec::len)))]
  pub async fn create_session(&self, req: CreateSessionIn) -> Result<SessionView> {
    let seed = req.seed.unwrap_or_else(rand::random);
    let (raw, progression) = match (req.blueprint, req.sample, req.scenes) {
      (Some(bp), _, _) => (bp, None),
      (None, Some(name), _) => (seeds::sample(&name).ok_or(GameError::SampleNotFound(name))?, None),
      (None, None, Some(scenes)) => {
        let p = Progression::new(&scenes);
        let bp = p
          .current_blueprint()
          .ok_or_else(|| GameError::InvalidRequest("no playable scene".into()))?;
        let raw = serde_json::to_value(bp).map_err(|e| GameError::InvalidRequest(e.to_string()))?;
        (raw, Some(p))
      }
      (None, None, None) => return Err(GameError::InvalidRequest("expected blueprint, sample or scenes".into())),
    };

    let session = Session {
      id: Uuid::new_v4(),
      game: GameState::new(raw, self.config.clone(), seed),
      progression,
      reports: Vec::new(),
    };
    let view = session.view();
    info!(target: "gamelab", session = %session.id, blueprint = %view.blueprint_id, rounds = view.round_count, "Session created");
    self.sessions.write().await.insert(session.id, session);
    Ok(view)
  }

  #[instrument(level = "debug", skip(self))]
  pub async fn view(&self, id: Uuid) -> Result<SessionView> {
    let sessions = self.sessions.read().await;
    sessions.get(&id).map(Session::view).ok_or(GameError::SessionNotFound(id))
  }

  #[instrument(level = "debug", skip(self))]
  pub async fn report(&self, id: Uuid) -> Result<ReportOut> {
    let sessions = self.sessions.read().await;
    let s = sessions.get(&id).ok_or(GameError::SessionNotFound(id))?;
    let complete = match &s.progression {
      Some(p) => p.is_complete(),
      None => s.game.phase == Phase::Completed,
    };
    Ok(ReportOut { session_id: id, reports: s.reports.clone(), total_score: s.total_score(), complete })
  }

  pub async fn remove(&self, id: Uuid) {
    self.sessions.write().await.remove(&id);
  }

  /// Apply a client event and, if it started a verification, drive it to its verdict.
  #[instrument(level = "info", skip(self, event))]
  pub async fn dispatch(&self, id: Uuid, event: Event) -> Result<SessionView> {
    if matches!(event, Event::VerificationResolved { .. }) {
      // Verdicts come from the sandbox, never from clients.
      return Err(GameError::InvalidRequest("verification results cannot be submitted".into()));
    }

    let job = {
      let mut sessions = self.sessions.write().await;
      let s = sessions.get_mut(&id).ok_or(GameError::SessionNotFound(id))?;
      let had_pending = s.game.pending.is_some();
      s.apply(&event);
      match (&s.game.pending, had_pending) {
        (Some(p), false) => Some(VerificationJob::new(&s.game, p)),
        _ => None,
      }
    };

    if let Some(job) = job {
      let result = verify_by_execution(self.sandbox.as_ref(), &job.pending.request, &job.tests, &job.pending.item_id).await;
      debug!(target: "exercise", %id, passed = result.passed, degraded = result.is_degraded(), "Verification finished");
      let verdict = Event::VerificationResolved {
        generation: job.pending.generation,
        item_id: job.pending.item_id.clone(),
        result,
      };
      let mut sessions = self.sessions.write().await;
      let s = sessions.get_mut(&id).ok_or(GameError::SessionNotFound(id))?;
      // A reset while we were waiting bumped the generation; the machine drops the verdict.
      s.apply(&verdict);
    }

    self.view(id).await
  }
}

impl Default for AppState {
  fn default() -> Self {
    Self::new()
  }
}

/// Everything needed to run a pending verification without holding the store lock.
struct VerificationJob {
  pending: PendingVerification,
  tests: Vec<crate::domain::TestCase>,
}

impl VerificationJob {
  fn new(game: &GameState, pending: &PendingVerification) -> Self {
    let tests = match game.round().map(|r| &r.content) {
      Some(RoundContent::BugHunt(c)) => c.test_cases.clone(),
      _ => Vec::new(),
    };
    Self { pending: pending.clone(), tests }
  }
}
