//! Result grading and the plain-text result export.

use serde::Serialize;

use crate::domain::{Question, QuizResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
  NeedsPractice,
  Good,
  Excellent,
}

impl Grade {
  pub fn for_score(score: u32) -> Self {
    if score < 60 {
      Grade::NeedsPractice
    } else if score < 80 {
      Grade::Good
    } else {
      Grade::Excellent
    }
  }

  pub fn message(&self) -> &'static str {
    match self {
      Grade::NeedsPractice => "Needs more practice",
      Grade::Good => "Good",
      Grade::Excellent => "Outstanding",
    }
  }
}

pub fn wrong_count(result: &QuizResult) -> u32 {
  result.total_questions.saturating_sub(result.correct_count)
}

/// Render the downloadable report: header with the score and grade, then every
/// question of `questions` with its verdict, correct option and explanation.
pub fn render_text(result: &QuizResult, questions: &[Question]) -> String {
  let mut out = format!(
    "GLASSQUIZ RESULT\nScore: {}%\nCorrect: {}/{}\nWrong: {}\nGrade: {}\nMode: {}\n\n",
    result.score,
    result.correct_count,
    result.total_questions,
    wrong_count(result),
    Grade::for_score(result.score).message(),
    result.mode
  );
  for (i, q) in questions.iter().enumerate() {
    let verdict = match result.answers.iter().find(|a| a.question_id == q.id) {
      Some(a) if a.is_correct => "CORRECT",
      Some(_) => "WRONG",
      None => "NOT ANSWERED",
    };
    out.push_str(&format!(
      "[NO. {}] {}\nQ: {}\nA: {}\nInfo: {}\n-----------------------------------\n",
      i + 1,
      verdict,
      q.text,
      q.correct_option().unwrap_or("-"),
      q.explanation
    ));
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{AnswerRecord, Difficulty, QuizMode};

  #[test]
  fn grade_bands() {
    assert_eq!(Grade::for_score(59), Grade::NeedsPractice);
    assert_eq!(Grade::for_score(60), Grade::Good);
    assert_eq!(Grade::for_score(79), Grade::Good);
    assert_eq!(Grade::for_score(80), Grade::Excellent);
  }

  #[test]
  fn report_lists_each_question_with_verdict() {
    let questions: Vec<Question> = (1..=3)
      .map(|id| Question {
        id,
        text: format!("Question {}", id),
        options: vec!["yes".into(), "no".into()],
        correct_index: 0,
        explanation: format!("because {}", id),
        key_point: String::new(),
        difficulty: Difficulty::Easy,
      })
      .collect();
    let result = QuizResult {
      correct_count: 1,
      total_questions: 3,
      score: 33,
      mode: QuizMode::Survival,
      answers: vec![
        AnswerRecord { question_id: 1, selected_index: Some(0), is_correct: true },
        AnswerRecord { question_id: 2, selected_index: None, is_correct: false },
      ],
    };
    let text = render_text(&result, &questions);
    assert!(text.starts_with("GLASSQUIZ RESULT\nScore: 33%\nCorrect: 1/3\nWrong: 2\nGrade: Needs more practice\nMode: SURVIVAL\n\n"));
    assert!(text.contains("[NO. 1] CORRECT\nQ: Question 1\nA: yes\nInfo: because 1"));
    assert!(text.contains("[NO. 2] WRONG"));
    assert!(text.contains("[NO. 3] NOT ANSWERED"));
    assert_eq!(wrong_count(&result), 2);
  }
}
