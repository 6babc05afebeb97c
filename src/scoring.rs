//! Scoring: reduce a run's answers into a `QuizResult` and derive the
//! "retry mistakes" subset.

use std::collections::HashSet;
use std::fmt;

use crate::domain::{AnswerRecord, Question, QuizMode, QuizResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoringError {
  /// A result needs at least one presented question.
  NothingPresented,
}

impl std::error::Error for ScoringError {}

impl fmt::Display for ScoringError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ScoringError::NothingPresented => write!(f, "cannot score a session with zero presented questions"),
    }
  }
}

/// `round(100 * correct / total)`, halves rounded up.
pub fn percentage(correct: u32, total: u32) -> u32 {
  if total == 0 {
    return 0;
  }
  let (c, t) = (u64::from(correct), u64::from(total));
  ((200 * c + t) / (2 * t)) as u32
}

pub fn build_result(answers: &[AnswerRecord], mode: QuizMode, total_presented: usize) -> Result<QuizResult, ScoringError> {
  if total_presented == 0 {
    return Err(ScoringError::NothingPresented);
  }
  let correct_count = answers.iter().filter(|a| a.is_correct).count() as u32;
  let total_questions = total_presented as u32;
  Ok(QuizResult {
    correct_count,
    total_questions,
    score: percentage(correct_count, total_questions),
    mode,
    answers: answers.to_vec(),
  })
}

/// Questions from `original` that were answered incorrectly, in `original`'s order.
pub fn derive_mistakes(result: &QuizResult, original: &[Question]) -> Vec<Question> {
  let wrong: HashSet<u32> = result
    .answers
    .iter()
    .filter(|a| !a.is_correct)
    .map(|a| a.question_id)
    .collect();
  original.iter().filter(|q| wrong.contains(&q.id)).cloned().collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Difficulty;

  fn q(id: u32) -> Question {
    Question {
      id,
      text: format!("q{}", id),
      options: vec!["a".into(), "b".into()],
      correct_index: 0,
      explanation: String::new(),
      key_point: String::new(),
      difficulty: Difficulty::Easy,
    }
  }

  fn ans(id: u32, ok: bool) -> AnswerRecord {
    AnswerRecord { question_id: id, selected_index: Some(if ok { 0 } else { 1 }), is_correct: ok }
  }

  #[test]
  fn seven_of_ten_scores_seventy() {
    let answers: Vec<_> = (1..=10).map(|i| ans(i, i <= 7)).collect();
    let r = build_result(&answers, QuizMode::Standard, 10).unwrap();
    assert_eq!(r.correct_count, 7);
    assert_eq!(r.total_questions, 10);
    assert_eq!(r.score, 70);
  }

  #[test]
  fn rounding_matches_half_up() {
    assert_eq!(percentage(1, 8), 13);
    assert_eq!(percentage(1, 3), 33);
    assert_eq!(percentage(2, 3), 67);
    assert_eq!(percentage(0, 5), 0);
    assert_eq!(percentage(5, 5), 100);
  }

  #[test]
  fn zero_presented_is_rejected() {
    assert_eq!(build_result(&[], QuizMode::Survival, 0).unwrap_err(), ScoringError::NothingPresented);
  }

  #[test]
  fn survival_early_end_scores_against_run_length() {
    let answers = vec![ans(1, true), ans(2, false), ans(3, false), ans(4, false)];
    let r = build_result(&answers, QuizMode::Survival, 10).unwrap();
    assert_eq!(r.score, 10);
    assert_eq!(r.answers.len(), 4);
  }

  #[test]
  fn mistakes_follow_original_order() {
    let original = vec![q(1), q(2), q(3), q(4)];
    let r = build_result(&[ans(1, true), ans(3, false), ans(2, false)], QuizMode::Scaffolding, 3).unwrap();
    let ids: Vec<u32> = derive_mistakes(&r, &original).iter().map(|q| q.id).collect();
    assert_eq!(ids, vec![2, 3]);
  }

  #[test]
  fn no_mistakes_gives_empty_subset() {
    let original = vec![q(1), q(2)];
    let r = build_result(&[ans(1, true), ans(2, true)], QuizMode::Standard, 2).unwrap();
    assert!(derive_mistakes(&r, &original).is_empty());
  }
}
