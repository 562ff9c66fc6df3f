//! Minimal HTTP client for the external code-execution sandbox.
//!
//! One call: POST `{code, language, testInputs}` and read `{results: [...]}`.
//! Calls are instrumented and log latency and sizes, never the submitted code.
//! Every failure maps to a `SandboxError`, which the verifier turns into its
//! degraded verdict.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use crate::config::ExecutionConfig;
use crate::domain::TestCase;
use crate::error::SandboxError;
use crate::util::trunc_for_log;
use crate::verify::{interpret_execution, ExecutionRequest, ExecutionResponse, VerificationResult};

#[derive(Clone, Debug)]
pub struct Sandbox {
  client: reqwest::Client,
  pub endpoint: String,
  pub timeout: Duration,
}

impl Sandbox {
  /// Construct the client if an endpoint is configured; otherwise return None.
  pub fn from_config(cfg: &ExecutionConfig) -> Option<Self> {
    let endpoint = cfg.endpoint.clone().filter(|e| !e.trim().is_empty())?;
    let timeout = Duration::from_secs(cfg.timeout_secs.max(1));
    let client = match reqwest::Client::builder().timeout(timeout).build() {
      Ok(c) => c,
      Err(e) => {
        error!(target: "sandbox", error = %e, "Failed to build HTTP client; execution disabled");
        return None;
      }
    };
    Some(Self { client, endpoint, timeout })
  }

  #[instrument(level = "info", skip(self, req), fields(endpoint = %self.endpoint, code_len = req.code.len(), tests = req.test_inputs.len()))]
  pub async fn execute(&self, req: &ExecutionRequest) -> Result<ExecutionResponse, SandboxError> {
    let start = std::time::Instant::now();
    let res = self
      .client
      .post(&self.endpoint)
      .header(USER_AGENT, "gamelab-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(req)
      .send()
      .await
      .map_err(|e| if e.is_timeout() { SandboxError::Timeout } else { SandboxError::Unreachable(e.to_string()) })?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_sandbox_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(SandboxError::HttpStatus { status, message });
    }

    let body = res.text().await.map_err(|e| {
      if e.is_timeout() { SandboxError::Timeout } else { SandboxError::Unreachable(e.to_string()) }
    })?;
    let parsed = serde_json::from_str::<ExecutionResponse>(&body)
      .map_err(|e| SandboxError::Malformed(format!("{e}; body: {}", trunc_for_log(&body, 120))))?;

    info!(target: "sandbox", elapsed = ?start.elapsed(), results = parsed.results.len(), "Sandbox response received");
    Ok(parsed)
  }
}

/// Run the request when a sandbox is available and interpret the outcome.
/// A missing sandbox is just another reason to take the degraded path.
#[instrument(level = "info", skip(sandbox, req, tests), fields(%active_bug, tests = tests.len()))]
pub async fn verify_by_execution(
  sandbox: Option<&Sandbox>,
  req: &ExecutionRequest,
  tests: &[TestCase],
  active_bug: &str,
) -> VerificationResult {
  let outcome = match sandbox {
    Some(sb) => sb.execute(req).await,
    None => Err(SandboxError::Disabled),
  };
  if let Err(e) = &outcome {
    warn!(target: "sandbox", error = %e, "Execution unavailable; using recorded outputs");
  }
  interpret_execution(outcome, tests, active_bug)
}

/// Try to extract a clean error message from a JSON error body.
fn extract_sandbox_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EBody {
    #[serde(alias = "message")]
    error: String,
  }
  serde_json::from_str::<EBody>(body).ok().map(|b| b.error)
}
