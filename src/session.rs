//! Session controller: the state machine for one quiz run.
//!
//! A `Session` owns the working state of a run (question order, index,
//! answers, lives, timer). Callers pass the current `Instant` in so the
//! transitions stay pure and testable; scheduling the TimeRush timer is left
//! to whoever drives the session (see `AppState::schedule_timer`).

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::domain::{AnswerRecord, Question, QuizMode};

pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(20);
pub const DEFAULT_SURVIVAL_LIVES: u32 = 3;

/// Mode parameters that are not part of the mode itself.
#[derive(Clone, Copy, Debug)]
pub struct SessionRules {
  pub time_limit: Duration,
  pub survival_lives: u32,
}

impl Default for SessionRules {
  fn default() -> Self {
    Self { time_limit: DEFAULT_TIME_LIMIT, survival_lives: DEFAULT_SURVIVAL_LIVES }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
  Active,
  Completed,
}

/// What the player did with the current question.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
  Choice(usize),
  /// No answer given; recorded as incorrect.
  NoAnswer,
}

/// Identifies the question a TimeRush timer was armed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerToken {
  pub session_id: u64,
  pub question_index: usize,
  pub deadline: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
  EmptyQuestionSet,
  NoCurrentQuestion,
  SessionAlreadyComplete,
  InvalidOption { index: usize, options: usize },
}

impl std::error::Error for SessionError {}

impl fmt::Display for SessionError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SessionError::EmptyQuestionSet => write!(f, "cannot start a session without questions"),
      SessionError::NoCurrentQuestion => write!(f, "session has no current question"),
      SessionError::SessionAlreadyComplete => write!(f, "session is already complete"),
      SessionError::InvalidOption { index, options } => {
        write!(f, "option {} is out of range for a question with {} options", index, options)
      }
    }
  }
}

/// Result of a single accepted submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerOutcome {
  pub record: AnswerRecord,
  pub timed_out: bool,
  pub status: SessionStatus,
  pub lives_remaining: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Session {
  id: u64,
  mode: QuizMode,
  rules: SessionRules,
  questions: Vec<Question>,
  current_index: usize,
  answers: Vec<AnswerRecord>,
  lives_remaining: Option<u32>,
  timer: Option<TimerToken>,
  status: SessionStatus,
}

impl Session {
  /// Start a run. Scaffolding reorders once here (stable, easy to hard).
  #[instrument(level = "debug", skip(questions, rules, now), fields(count = questions.len(), %mode))]
  pub fn start(
    id: u64,
    mut questions: Vec<Question>,
    mode: QuizMode,
    rules: SessionRules,
    now: Instant,
  ) -> Result<Self, SessionError> {
    if questions.is_empty() {
      return Err(SessionError::EmptyQuestionSet);
    }
    if mode == QuizMode::Scaffolding {
      // Vec::sort_by_key is stable: equal difficulties keep input order.
      questions.sort_by_key(|q| q.difficulty);
    }
    let lives_remaining = (mode == QuizMode::Survival).then_some(rules.survival_lives);

    let mut session = Self {
      id,
      mode,
      rules,
      questions,
      current_index: 0,
      answers: Vec::new(),
      lives_remaining,
      timer: None,
      status: SessionStatus::Active,
    };
    session.arm_timer(now);
    info!(target: "session", session_id = id, %mode, count = session.questions.len(), "Session started");
    Ok(session)
  }

  pub fn id(&self) -> u64 { self.id }
  pub fn mode(&self) -> QuizMode { self.mode }
  pub fn status(&self) -> SessionStatus { self.status }
  pub fn is_complete(&self) -> bool { self.status == SessionStatus::Completed }
  pub fn current_index(&self) -> usize { self.current_index }
  pub fn questions(&self) -> &[Question] { &self.questions }
  pub fn answers(&self) -> &[AnswerRecord] { &self.answers }
  pub fn lives_remaining(&self) -> Option<u32> { self.lives_remaining }
  pub fn armed_timer(&self) -> Option<TimerToken> { self.timer }

  pub fn current_question(&self) -> Result<&Question, SessionError> {
    if self.is_complete() {
      return Err(SessionError::NoCurrentQuestion);
    }
    self.questions.get(self.current_index).ok_or(SessionError::NoCurrentQuestion)
  }

  /// Seconds left on the current question's timer, rounded up.
  pub fn seconds_left(&self, now: Instant) -> Option<u64> {
    self.timer.map(|t| {
      let left = t.deadline.saturating_duration_since(now);
      left.as_secs() + u64::from(left.subsec_nanos() > 0)
    })
  }

  /// Record an answer for the current question and advance.
  ///
  /// In TimeRush a submission at or past the deadline is recorded as a
  /// timeout regardless of the selection.
  #[instrument(level = "debug", skip(self, now), fields(session_id = self.id, index = self.current_index))]
  pub fn submit_answer(&mut self, selection: Selection, now: Instant) -> Result<AnswerOutcome, SessionError> {
    if self.is_complete() {
      return Err(SessionError::SessionAlreadyComplete);
    }
    let question = self.current_question()?;

    let expired = self.timer.map_or(false, |t| now >= t.deadline);
    let (record, timed_out) = match selection {
      _ if expired => (AnswerRecord::timed_out(question), true),
      Selection::NoAnswer => (AnswerRecord::timed_out(question), false),
      Selection::Choice(index) => {
        if index >= question.options.len() {
          return Err(SessionError::InvalidOption { index, options: question.options.len() });
        }
        (AnswerRecord::for_choice(question, index), false)
      }
    };
    Ok(self.record(record, timed_out, now))
  }

  /// Deliver a TimeRush timer. Tokens armed for another session, another
  /// question, or a finished session are ignored (`Ok(None)`).
  #[instrument(level = "debug", skip(self, now), fields(session_id = self.id, token_index = token.question_index))]
  pub fn fire_timer(&mut self, token: TimerToken, now: Instant) -> Result<Option<AnswerOutcome>, SessionError> {
    if self.is_complete() || self.timer != Some(token) || now < token.deadline {
      debug!(target: "session", session_id = self.id, current = self.current_index, token_index = token.question_index, "Stale timer ignored");
      return Ok(None);
    }
    let question = self.current_question()?;
    let record = AnswerRecord::timed_out(question);
    Ok(Some(self.record(record, true, now)))
  }

  fn record(&mut self, record: AnswerRecord, timed_out: bool, now: Instant) -> AnswerOutcome {
    self.timer = None;
    let correct = record.is_correct;
    self.answers.push(record.clone());

    if !correct {
      if let Some(lives) = self.lives_remaining.as_mut() {
        *lives = lives.saturating_sub(1);
        if *lives == 0 {
          self.status = SessionStatus::Completed;
        }
      }
    }

    self.current_index += 1;
    if self.current_index >= self.questions.len() {
      self.status = SessionStatus::Completed;
    }

    if self.is_complete() {
      info!(target: "session", session_id = self.id, answered = self.answers.len(), total = self.questions.len(), "Session completed");
    } else {
      self.arm_timer(now);
    }

    AnswerOutcome { record, timed_out, status: self.status, lives_remaining: self.lives_remaining }
  }

  fn arm_timer(&mut self, now: Instant) {
    if self.mode == QuizMode::TimeRush && !self.is_complete() {
      self.timer = Some(TimerToken {
        session_id: self.id,
        question_index: self.current_index,
        deadline: now + self.rules.time_limit,
      });
    }
  }
}
