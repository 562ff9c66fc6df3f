//! Error types for the service boundary.
//!
//! The exercise core itself never fails: wrong answers and out-of-phase events
//! are ordinary values. Errors only exist where the process touches the outside
//! world (config files, the execution sandbox, session lookup).

use std::path::PathBuf;

use uuid::Uuid;

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Debug, thiserror::Error)]
pub enum GameError {
  #[error("failed to read config file '{path}': {source}")]
  ConfigRead {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config file '{path}': {message}")]
  ConfigParse { path: PathBuf, message: String },

  #[error("execution sandbox error: {0}")]
  Sandbox(#[from] SandboxError),

  #[error("unknown session: {0}")]
  SessionNotFound(Uuid),

  #[error("unknown sample blueprint: {0}")]
  SampleNotFound(String),

  #[error("invalid request: {0}")]
  InvalidRequest(String),
}

/// Ways the delegated execution call can fail. All of them route to the
/// degraded verification path; none of them reach the learner as a crash.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SandboxError {
  #[error("no execution endpoint configured")]
  Disabled,

  #[error("execution endpoint unreachable: {0}")]
  Unreachable(String),

  #[error("execution endpoint timed out")]
  Timeout,

  #[error("execution endpoint returned HTTP {status}: {message}")]
  HttpStatus { status: u16, message: String },

  #[error("malformed execution response: {0}")]
  Malformed(String),
}

impl SandboxError {
  /// Short machine-readable label surfaced in verification diagnostics.
  pub fn kind(&self) -> &'static str {
    match self {
      SandboxError::Disabled => "disabled",
      SandboxError::Unreachable(_) => "unreachable",
      SandboxError::Timeout => "timeout",
      SandboxError::HttpStatus { .. } => "http_status",
      SandboxError::Malformed(_) => "malformed",
    }
  }
}
