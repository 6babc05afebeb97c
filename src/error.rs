use std::fmt;

use crate::scoring::ScoringError;
use crate::session::SessionError;
use crate::storage::StorageError;

#[derive(Debug)]
pub enum AppError {
  /// Generation attempted without a stored API key.
  MissingCredential,
  /// Rejected before any external call.
  InvalidInput(String),
  /// The question provider failed or returned an unusable set.
  GenerationFailure(String),
  /// The requested transition is not allowed from the current phase.
  Busy { phase: &'static str },
  SessionAlreadyComplete,
  NoMistakesToRetry,
  NotFound(String),
  Session(SessionError),
  Scoring(ScoringError),
  Storage(StorageError),
}

impl AppError {
  pub fn kind(&self) -> &'static str {
    match self {
      AppError::MissingCredential => "missing_credential",
      AppError::InvalidInput(_) => "invalid_input",
      AppError::GenerationFailure(_) => "generation_failure",
      AppError::Busy { .. } => "busy",
      AppError::SessionAlreadyComplete => "session_already_complete",
      AppError::NoMistakesToRetry => "no_mistakes_to_retry",
      AppError::NotFound(_) => "not_found",
      AppError::Session(_) => "session",
      AppError::Scoring(_) => "scoring",
      AppError::Storage(_) => "storage_failure",
    }
  }
}

impl std::error::Error for AppError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      AppError::Session(e) => Some(e),
      AppError::Scoring(e) => Some(e),
      AppError::Storage(e) => Some(e),
      _ => None,
    }
  }
}

impl fmt::Display for AppError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AppError::MissingCredential => write!(f, "An API key is required. Add one in settings first."),
      AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
      AppError::GenerationFailure(msg) => write!(f, "{}", msg),
      AppError::Busy { phase } => write!(f, "Not allowed while the quiz is in the '{}' phase", phase),
      AppError::SessionAlreadyComplete => write!(f, "The session is already complete"),
      AppError::NoMistakesToRetry => write!(f, "There are no mistakes to retry"),
      AppError::NotFound(what) => write!(f, "{} not found", what),
      AppError::Session(e) => write!(f, "Session error: {}", e),
      AppError::Scoring(e) => write!(f, "Scoring error: {}", e),
      AppError::Storage(e) => write!(f, "Storage error: {}", e),
    }
  }
}

impl From<SessionError> for AppError {
  fn from(err: SessionError) -> Self {
    match err {
      SessionError::SessionAlreadyComplete => AppError::SessionAlreadyComplete,
      other => AppError::Session(other),
    }
  }
}

impl From<ScoringError> for AppError {
  fn from(err: ScoringError) -> Self {
    AppError::Scoring(err)
  }
}

impl From<StorageError> for AppError {
  fn from(err: StorageError) -> Self {
    AppError::Storage(err)
  }
}
