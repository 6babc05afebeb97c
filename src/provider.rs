//! Boundary to whatever produces question sets.
//!
//! The core never interprets a generation failure; it only surfaces the
//! message. `validate_questions` is applied to every successful result so a
//! malformed set fails the same way a network error does.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;

use crate::domain::{ExamStyle, Question, QuizMode};

/// Where the questions come from. Exactly one source per request.
#[derive(Clone, Debug, PartialEq)]
pub enum QuizSource {
  Document { file_name: String, bytes: Vec<u8> },
  Topic(String),
}

impl QuizSource {
  /// Label recorded in history: the file name or the topic.
  pub fn label(&self) -> &str {
    match self {
      QuizSource::Document { file_name, .. } => file_name,
      QuizSource::Topic(topic) => topic,
    }
  }

  /// First progress phase shown while the request is in flight.
  pub fn initial_status(&self) -> &'static str {
    match self {
      QuizSource::Document { .. } => "Reading document...",
      QuizSource::Topic(_) => "Analyzing topic...",
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
  pub source: QuizSource,
  pub model_id: String,
  pub question_count: u32,
  pub mode: QuizMode,
  pub style: ExamStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError(pub String);

impl std::error::Error for ProviderError {}

impl fmt::Display for ProviderError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<String> for ProviderError {
  fn from(msg: String) -> Self {
    ProviderError(msg)
  }
}

impl From<&str> for ProviderError {
  fn from(msg: &str) -> Self {
    ProviderError(msg.to_string())
  }
}

pub type ProgressFn<'a> = &'a (dyn Fn(&str) + Send + Sync);

#[async_trait]
pub trait QuestionProvider: Send + Sync {
  async fn generate(
    &self,
    api_key: &str,
    request: &GenerationRequest,
    on_progress: ProgressFn<'_>,
  ) -> Result<Vec<Question>, ProviderError>;
}

/// Reject sets the session controller could not run.
pub fn validate_questions(questions: &[Question]) -> Result<(), ProviderError> {
  if questions.is_empty() {
    return Err("The model returned no questions.".into());
  }
  let mut seen = HashSet::new();
  for q in questions {
    if !seen.insert(q.id) {
      return Err(format!("Duplicate question id {} in generated set.", q.id).into());
    }
    if q.options.len() < 2 {
      return Err(format!("Question {} has fewer than two options.", q.id).into());
    }
    if q.correct_index >= q.options.len() {
      return Err(format!(
        "Question {} marks option {} correct but has only {} options.",
        q.id,
        q.correct_index,
        q.options.len()
      )
      .into());
    }
  }
  Ok(())
}
