//! Application state machine.
//!
//! `Config → Processing → {QuizActive | Error}`, `QuizActive → Results`,
//! `Results → {Config | QuizActive (retry mistakes)}`, `Error → Config`.
//! Loading a history entry enters `QuizActive` directly.
//!
//! `QuizApp` owns which question set and which result are current. The
//! generation call itself is split in two (`begin_generation` and
//! `complete_generation`) so the caller can await the provider without
//! holding the app, while the phase check keeps a second request out.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::companion::{companion_view, CompanionView};
use crate::config::{ModelCatalog, QuizRules};
use crate::credentials::CredentialStore;
use crate::domain::{AnswerRecord, Difficulty, ExamStyle, Question, QuizMode, QuizResult};
use crate::error::AppError;
use crate::history::{HistoryEntry, HistoryStore};
use crate::provider::{validate_questions, GenerationRequest, ProviderError, QuizSource};
use crate::report::{self, Grade};
use crate::scoring::{build_result, derive_mistakes};
use crate::session::{AnswerOutcome, Selection, Session, TimerToken};
use crate::storage::KvStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
  Config,
  Processing { request_id: u64, status: String },
  QuizActive,
  Results,
  Error { message: String },
}

impl Phase {
  pub fn name(&self) -> &'static str {
    match self {
      Phase::Config => "config",
      Phase::Processing { .. } => "processing",
      Phase::QuizActive => "quiz_active",
      Phase::Results => "results",
      Phase::Error { .. } => "error",
    }
  }
}

/// What the user filled in on the configuration screen.
#[derive(Clone, Debug, Default)]
pub struct GenerationInput {
  pub document: Option<(String, Vec<u8>)>,
  pub topic: Option<String>,
  pub model_id: Option<String>,
  pub question_count: u32,
  pub mode: QuizMode,
  pub style: ExamStyle,
}

/// Everything the caller needs to run the provider call outside the app.
#[derive(Clone, Debug)]
pub struct GenerationTicket {
  pub request_id: u64,
  pub api_key: String,
  pub request: GenerationRequest,
}

/// Question as shown while it is being answered (no correct index).
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
  pub id: u32,
  pub text: String,
  pub options: Vec<String>,
  pub key_point: String,
  pub difficulty: Difficulty,
}

impl From<&Question> for QuestionView {
  fn from(q: &Question) -> Self {
    Self { id: q.id, text: q.text.clone(), options: q.options.clone(), key_point: q.key_point.clone(), difficulty: q.difficulty }
  }
}

/// Revealed after each answer.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
  pub question_id: u32,
  pub selected_index: Option<usize>,
  pub correct_index: usize,
  pub is_correct: bool,
  pub timed_out: bool,
  pub explanation: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
  pub session_id: u64,
  pub current_index: usize,
  pub total: usize,
  pub question: Option<QuestionView>,
  pub lives_remaining: Option<u32>,
  pub seconds_left: Option<u64>,
  pub answers: Vec<AnswerRecord>,
}

/// Serializable view of the whole app for presentation layers.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSnapshot {
  pub phase: &'static str,
  pub status: Option<String>,
  pub error: Option<String>,
  pub needs_credential: bool,
  pub mode: QuizMode,
  pub session: Option<SessionView>,
  pub last_feedback: Option<Feedback>,
  pub result: Option<QuizResult>,
  pub grade: Option<Grade>,
  pub mistakes: usize,
  pub can_retry_mistakes: bool,
}

pub struct QuizApp {
  rules: QuizRules,
  models: ModelCatalog,
  credentials: CredentialStore,
  history: HistoryStore,

  phase: Phase,
  needs_credential: bool,
  active_mode: QuizMode,
  questions: Vec<Question>,
  original_questions: Vec<Question>,
  session: Option<Session>,
  last_feedback: Option<Feedback>,
  result: Option<QuizResult>,
  pending: Option<GenerationRequest>,

  next_request_id: u64,
  next_session_id: u64,
}

impl QuizApp {
  pub fn new(rules: QuizRules, models: ModelCatalog, store: Arc<dyn KvStore>) -> Self {
    let credentials = CredentialStore::new(store.clone());
    let history = HistoryStore::new(store, rules.history_limit);
    let needs_credential = !matches!(credentials.get(), Ok(Some(_)));
    Self {
      rules,
      models,
      credentials,
      history,
      phase: Phase::Config,
      needs_credential,
      active_mode: QuizMode::Standard,
      questions: Vec::new(),
      original_questions: Vec::new(),
      session: None,
      last_feedback: None,
      result: None,
      pending: None,
      next_request_id: 1,
      next_session_id: 1,
    }
  }

  pub fn phase(&self) -> &Phase { &self.phase }
  pub fn needs_credential(&self) -> bool { self.needs_credential }
  pub fn active_mode(&self) -> QuizMode { self.active_mode }
  pub fn questions(&self) -> &[Question] { &self.questions }
  pub fn original_questions(&self) -> &[Question] { &self.original_questions }
  pub fn session(&self) -> Option<&Session> { self.session.as_ref() }
  pub fn result(&self) -> Option<&QuizResult> { self.result.as_ref() }
  pub fn models(&self) -> &ModelCatalog { &self.models }

  pub fn armed_timer(&self) -> Option<TimerToken> {
    self.session.as_ref().and_then(Session::armed_timer)
  }

  // -------- Generation --------

  /// Validate the input and move to `Processing`. Only allowed from `Config`.
  #[instrument(level = "info", skip(self, input), fields(phase = self.phase.name(), count = input.question_count, mode = %input.mode))]
  pub fn begin_generation(&mut self, input: GenerationInput) -> Result<GenerationTicket, AppError> {
    if self.phase != Phase::Config {
      warn!(target: "glassquiz", phase = self.phase.name(), "Generation rejected: not in config phase");
      return Err(AppError::Busy { phase: self.phase.name() });
    }
    let request = self.validate_input(input)?;

    let api_key = match self.credentials.get() {
      Ok(Some(key)) => key,
      Ok(None) => {
        self.needs_credential = true;
        return Err(AppError::MissingCredential);
      }
      Err(e) => {
        warn!(target: "glassquiz", error = %e, "Credential read failed");
        self.needs_credential = true;
        return Err(AppError::MissingCredential);
      }
    };

    let request_id = self.next_request_id;
    self.next_request_id += 1;
    self.active_mode = request.mode;
    self.phase = Phase::Processing { request_id, status: request.source.initial_status().to_string() };
    self.pending = Some(request.clone());
    info!(target: "glassquiz", request_id, model = %request.model_id, source = %request.source.label(), "Generation started");
    Ok(GenerationTicket { request_id, api_key, request })
  }

  fn validate_input(&self, input: GenerationInput) -> Result<GenerationRequest, AppError> {
    let topic = input.topic.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
    let source = match (input.document, topic) {
      (Some(_), Some(_)) => return Err(AppError::InvalidInput("provide either a document or a topic, not both".into())),
      (None, None) => return Err(AppError::InvalidInput("a document or a topic is required".into())),
      (Some((file_name, bytes)), None) => {
        if bytes.is_empty() {
          return Err(AppError::InvalidInput("the document is empty".into()));
        }
        QuizSource::Document { file_name, bytes }
      }
      (None, Some(topic)) => {
        if topic.chars().count() < self.rules.min_topic_chars {
          return Err(AppError::InvalidInput(format!("the topic must be at least {} characters", self.rules.min_topic_chars)));
        }
        QuizSource::Topic(topic)
      }
    };

    let (min, max) = (self.rules.min_question_count, self.rules.max_question_count);
    if !(min..=max).contains(&input.question_count) {
      return Err(AppError::InvalidInput(format!("question count must be between {} and {}", min, max)));
    }

    let model_id = input.model_id.unwrap_or_else(|| self.models.default_model.clone());
    if !self.models.contains(&model_id) {
      return Err(AppError::InvalidInput(format!("unknown model '{}'", model_id)));
    }

    Ok(GenerationRequest { source, model_id, question_count: input.question_count, mode: input.mode, style: input.style })
  }

  /// Update the coarse progress text. Ignored unless `request_id` is in flight.
  pub fn report_progress(&mut self, request_id: u64, status: &str) -> bool {
    match &mut self.phase {
      Phase::Processing { request_id: current, status: s } if *current == request_id => {
        *s = status.to_string();
        true
      }
      _ => false,
    }
  }

  /// Finish the in-flight request. A stale `request_id` is ignored.
  #[instrument(level = "info", skip(self, outcome, now))]
  pub fn complete_generation(
    &mut self,
    request_id: u64,
    outcome: Result<Vec<Question>, ProviderError>,
    now: Instant,
  ) -> Result<(), AppError> {
    let in_flight = matches!(&self.phase, Phase::Processing { request_id: current, .. } if *current == request_id);
    if !in_flight {
      warn!(target: "glassquiz", request_id, phase = self.phase.name(), "Ignoring stale generation result");
      return Err(AppError::Busy { phase: self.phase.name() });
    }
    let request = self.pending.take();

    let questions = match outcome {
      Ok(qs) => validate_questions(&qs).map(|()| qs).map_err(|e| e.to_string()),
      Err(e) => Err(e.to_string()),
    };
    let questions = match questions {
      Ok(qs) => qs,
      Err(message) => {
        warn!(target: "glassquiz", request_id, %message, "Generation failed");
        self.phase = Phase::Error { message: message.clone() };
        return Err(AppError::GenerationFailure(message));
      }
    };

    if let Some(request) = &request {
      let entry = HistoryEntry::new(request.source.label(), &request.model_id, request.mode, questions.clone(), Utc::now());
      if let Err(e) = self.history.append(entry) {
        warn!(target: "history", error = %e, "Could not save generated quiz to history");
      }
    }

    self.original_questions = questions.clone();
    self.result = None;
    self.start_session(questions, now)?;
    info!(target: "glassquiz", request_id, count = self.original_questions.len(), "Generation completed");
    Ok(())
  }

  // -------- Session --------

  fn start_session(&mut self, questions: Vec<Question>, now: Instant) -> Result<(), AppError> {
    let id = self.next_session_id;
    self.next_session_id += 1;
    let session = Session::start(id, questions, self.active_mode, self.rules.session_rules(), now)?;
    self.questions = session.questions().to_vec();
    self.session = Some(session);
    self.last_feedback = None;
    self.phase = Phase::QuizActive;
    Ok(())
  }

  #[instrument(level = "debug", skip(self, now))]
  pub fn submit_answer(&mut self, selection: Selection, now: Instant) -> Result<AnswerOutcome, AppError> {
    let session = match (&self.phase, self.session.as_mut()) {
      (Phase::QuizActive, Some(s)) => s,
      (Phase::Results, _) => return Err(AppError::SessionAlreadyComplete),
      _ => return Err(AppError::Busy { phase: self.phase.name() }),
    };
    let question = session.current_question()?.clone();
    let outcome = session.submit_answer(selection, now)?;
    self.after_answer(&question, &outcome)?;
    Ok(outcome)
  }

  /// Deliver a TimeRush timer. Stale tokens change nothing and return `None`.
  pub fn expire_timer(&mut self, token: TimerToken, now: Instant) -> Result<Option<AnswerOutcome>, AppError> {
    let Some(session) = self.session.as_mut().filter(|_| self.phase == Phase::QuizActive) else {
      return Ok(None);
    };
    let question = match session.current_question() {
      Ok(q) => q.clone(),
      Err(_) => return Ok(None),
    };
    match session.fire_timer(token, now)? {
      Some(outcome) => {
        info!(target: "session", session_id = token.session_id, index = token.question_index, "Question timed out");
        self.after_answer(&question, &outcome)?;
        Ok(Some(outcome))
      }
      None => Ok(None),
    }
  }

  fn after_answer(&mut self, question: &Question, outcome: &AnswerOutcome) -> Result<(), AppError> {
    self.last_feedback = Some(Feedback {
      question_id: question.id,
      selected_index: outcome.record.selected_index,
      correct_index: question.correct_index,
      is_correct: outcome.record.is_correct,
      timed_out: outcome.timed_out,
      explanation: question.explanation.clone(),
    });
    let finished = self.session.as_ref().map_or(false, Session::is_complete);
    if finished {
      self.finish_session()?;
    }
    Ok(())
  }

  fn finish_session(&mut self) -> Result<(), AppError> {
    let Some(session) = self.session.take() else { return Ok(()) };
    let result = build_result(session.answers(), session.mode(), session.questions().len())?;
    info!(
      target: "glassquiz",
      session_id = session.id(),
      correct = result.correct_count,
      total = result.total_questions,
      score = result.score,
      "Session scored"
    );
    self.result = Some(result);
    self.phase = Phase::Results;
    Ok(())
  }

  // -------- Results --------

  pub fn mistakes(&self) -> Vec<Question> {
    match &self.result {
      Some(r) => derive_mistakes(r, &self.original_questions),
      None => Vec::new(),
    }
  }

  pub fn can_retry_mistakes(&self) -> bool {
    self.phase == Phase::Results && !self.mistakes().is_empty()
  }

  /// Re-enter `QuizActive` with the questions missed in the last run,
  /// always taken from the originally generated set.
  #[instrument(level = "info", skip(self, now))]
  pub fn retry_mistakes(&mut self, now: Instant) -> Result<(), AppError> {
    if self.phase != Phase::Results {
      return Err(AppError::Busy { phase: self.phase.name() });
    }
    let mistakes = self.mistakes();
    if mistakes.is_empty() {
      return Err(AppError::NoMistakesToRetry);
    }
    info!(target: "glassquiz", count = mistakes.len(), "Retrying mistakes");
    self.result = None;
    self.start_session(mistakes, now)
  }

  /// Back to `Config`, dropping any session, result and question set.
  /// Refused while a generation request is in flight.
  pub fn new_quiz(&mut self) -> Result<(), AppError> {
    if matches!(self.phase, Phase::Processing { .. }) {
      return Err(AppError::Busy { phase: self.phase.name() });
    }
    if self.session.take().is_some() {
      info!(target: "session", "Active session abandoned");
    }
    self.questions.clear();
    self.original_questions.clear();
    self.result = None;
    self.last_feedback = None;
    self.phase = Phase::Config;
    Ok(())
  }

  pub fn report(&self) -> Option<String> {
    self.result.as_ref().map(|r| report::render_text(r, &self.original_questions))
  }

  // -------- History --------

  pub fn history(&self) -> Vec<HistoryEntry> {
    self.history.list()
  }

  pub fn clear_history(&self) -> Result<(), AppError> {
    Ok(self.history.clear()?)
  }

  /// Replay a stored generation. Allowed from `Config`, `Results` and `Error`.
  #[instrument(level = "info", skip(self, now))]
  pub fn load_history(&mut self, id: i64, now: Instant) -> Result<(), AppError> {
    if matches!(self.phase, Phase::Processing { .. } | Phase::QuizActive) {
      return Err(AppError::Busy { phase: self.phase.name() });
    }
    let entry = self.history.get(id).ok_or_else(|| AppError::NotFound(format!("history entry {}", id)))?;
    if entry.questions.is_empty() {
      return Err(AppError::InvalidInput(format!("history entry {} has no questions", id)));
    }
    self.active_mode = entry.mode;
    self.original_questions = entry.questions.clone();
    self.result = None;
    self.start_session(entry.questions, now)
  }

  pub fn companion<R: Rng + ?Sized>(&self, rng: &mut R) -> CompanionView {
    companion_view(self.history.len(), rng)
  }

  // -------- Credential --------

  pub fn has_api_key(&self) -> bool {
    matches!(self.credentials.get(), Ok(Some(_)))
  }

  pub fn set_api_key(&mut self, key: &str) -> Result<(), AppError> {
    let key = key.trim();
    if key.chars().count() < self.rules.min_api_key_chars {
      return Err(AppError::InvalidInput("the API key looks too short".into()));
    }
    self.credentials.set(key)?;
    self.needs_credential = false;
    info!(target: "glassquiz", "API key saved");
    Ok(())
  }

  pub fn clear_api_key(&mut self) -> Result<(), AppError> {
    self.credentials.clear()?;
    self.needs_credential = true;
    info!(target: "glassquiz", "API key removed");
    Ok(())
  }

  // -------- Presentation --------

  pub fn snapshot(&self, now: Instant) -> AppSnapshot {
    let session = self.session.as_ref().map(|s| SessionView {
      session_id: s.id(),
      current_index: s.current_index(),
      total: s.questions().len(),
      question: s.current_question().ok().map(QuestionView::from),
      lives_remaining: s.lives_remaining(),
      seconds_left: s.seconds_left(now),
      answers: s.answers().to_vec(),
    });
    let (status, error) = match &self.phase {
      Phase::Processing { status, .. } => (Some(status.clone()), None),
      Phase::Error { message } => (None, Some(message.clone())),
      _ => (None, None),
    };
    let mistakes = self.mistakes().len();
    AppSnapshot {
      phase: self.phase.name(),
      status,
      error,
      needs_credential: self.needs_credential,
      mode: self.active_mode,
      session,
      last_feedback: self.last_feedback.clone(),
      result: self.result.clone(),
      grade: self.result.as_ref().map(|r| Grade::for_score(r.score)),
      mistakes,
      can_retry_mistakes: self.phase == Phase::Results && mistakes > 0,
    }
  }
}
