//! Domain models: questions, quiz modes, exam styles, answer records and results.
//!
//! Field names follow the camelCase layout the browser front end and the
//! persisted history already use.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Difficulty tag attached by the generator. Ordered Easy < Medium < Hard.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Difficulty {
  #[serde(alias = "easy", alias = "EASY")]
  Easy,
  #[serde(alias = "medium", alias = "MEDIUM")]
  Medium,
  #[serde(alias = "hard", alias = "HARD")]
  Hard,
}

impl Default for Difficulty {
  fn default() -> Self { Difficulty::Medium }
}

/// A multiple-choice question. Immutable once generated.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  pub id: u32,
  pub text: String,
  pub options: Vec<String>,
  pub correct_index: usize,
  #[serde(default)] pub explanation: String,
  #[serde(default)] pub key_point: String,
  #[serde(default)] pub difficulty: Difficulty,
}

impl Question {
  /// Text of the correct option, if the index is in range.
  pub fn correct_option(&self) -> Option<&str> {
    self.options.get(self.correct_index).map(String::as_str)
  }

  pub fn is_correct(&self, selected: usize) -> bool {
    selected == self.correct_index
  }
}

/// How a session is run. Fixed at session start.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuizMode {
  /// Untimed, presented in generated order.
  Standard,
  /// Presented easy to hard.
  Scaffolding,
  /// Fixed timer per question.
  TimeRush,
  /// Limited lives; ends early when they run out.
  Survival,
}

impl Default for QuizMode {
  fn default() -> Self { QuizMode::Standard }
}

impl QuizMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      QuizMode::Standard => "STANDARD",
      QuizMode::Scaffolding => "SCAFFOLDING",
      QuizMode::TimeRush => "TIME_RUSH",
      QuizMode::Survival => "SURVIVAL",
    }
  }

  /// Wording appended to the generation prompt.
  pub fn prompt_hint(&self) -> &'static str {
    match self {
      QuizMode::Standard => "Mix difficulties naturally.",
      QuizMode::Scaffolding => "Spread questions evenly across Easy, Medium and Hard so they can be ordered from easy to hard.",
      QuizMode::TimeRush => "Keep every question short enough to answer within 20 seconds.",
      QuizMode::Survival => "Prefer precise questions with a single unambiguous answer.",
    }
  }
}

impl fmt::Display for QuizMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Generation-time hint only; sessions never look at it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExamStyle {
  Conceptual,
  Analytical,
  CaseStudy,
  Competitive,
}

impl Default for ExamStyle {
  fn default() -> Self { ExamStyle::Conceptual }
}

impl ExamStyle {
  pub fn prompt_hint(&self) -> &'static str {
    match self {
      ExamStyle::Conceptual => "Focus on definitions, terms and recall of key concepts.",
      ExamStyle::Analytical => "Focus on reasoning, cause and effect, and drawing conclusions.",
      ExamStyle::CaseStudy => "Frame each question as a realistic scenario that applies the material.",
      ExamStyle::Competitive => "Olympiad style: detailed, tricky distractors, hard questions.",
    }
  }
}

/// One answered (or timed out) question. Never mutated after creation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
  pub question_id: u32,
  /// `None` when the question timed out without a selection.
  pub selected_index: Option<usize>,
  pub is_correct: bool,
}

impl AnswerRecord {
  pub fn for_choice(question: &Question, selected: usize) -> Self {
    Self { question_id: question.id, selected_index: Some(selected), is_correct: question.is_correct(selected) }
  }

  pub fn timed_out(question: &Question) -> Self {
    Self { question_id: question.id, selected_index: None, is_correct: false }
  }
}

/// Terminal snapshot of one session run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
  pub correct_count: u32,
  pub total_questions: u32,
  pub score: u32,
  pub mode: QuizMode,
  pub answers: Vec<AnswerRecord>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn difficulty_orders_easy_to_hard() {
    assert!(Difficulty::Easy < Difficulty::Medium);
    assert!(Difficulty::Medium < Difficulty::Hard);
  }

  #[test]
  fn difficulty_accepts_any_case() {
    for (raw, want) in [("\"easy\"", Difficulty::Easy), ("\"MEDIUM\"", Difficulty::Medium), ("\"Hard\"", Difficulty::Hard)] {
      assert_eq!(serde_json::from_str::<Difficulty>(raw).unwrap(), want);
    }
    assert_eq!(serde_json::to_string(&Difficulty::Easy).unwrap(), "\"Easy\"");
  }

  #[test]
  fn question_uses_camel_case_layout() {
    let json = r#"{"id":3,"text":"2+2?","options":["3","4"],"correctIndex":1,"explanation":"sum","keyPoint":"Arithmetic","difficulty":"Easy"}"#;
    let q: Question = serde_json::from_str(json).unwrap();
    assert_eq!(q.correct_option(), Some("4"));
    assert_eq!(q.difficulty, Difficulty::Easy);
    let back = serde_json::to_value(&q).unwrap();
    assert_eq!(back["keyPoint"], "Arithmetic");
  }

  #[test]
  fn modes_serialize_as_screaming_snake_case() {
    assert_eq!(serde_json::to_string(&QuizMode::TimeRush).unwrap(), "\"TIME_RUSH\"");
    assert_eq!(serde_json::to_string(&ExamStyle::CaseStudy).unwrap(), "\"CASE_STUDY\"");
    assert_eq!(QuizMode::Survival.to_string(), "SURVIVAL");
  }

  #[test]
  fn timed_out_answer_has_no_selection() {
    let q = Question {
      id: 1, text: "q".into(), options: vec!["a".into(), "b".into()], correct_index: 0,
      explanation: String::new(), key_point: String::new(), difficulty: Difficulty::Easy,
    };
    let rec = AnswerRecord::timed_out(&q);
    assert_eq!(rec.selected_index, None);
    assert!(!rec.is_correct);
    assert!(AnswerRecord::for_choice(&q, 0).is_correct);
  }
}
