//! Study companion shown on the dashboard. Its stage grows with the number
//! of generated quizzes in history.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

pub struct Stage {
  pub min_sessions: usize,
  pub title: &'static str,
  pub faces: &'static [&'static str],
  pub lines: &'static [&'static str],
}

pub static STAGES: [Stage; 4] = [
  Stage {
    min_sessions: 0,
    title: "AI Assistant",
    faces: &["( . _ . )", "( ? _ ? )", "( o _ o )"],
    lines: &[
      "Hello. Ready to process your material.",
      "Upload a document to get started.",
      "All systems normal. Waiting for input...",
    ],
  },
  Stage {
    min_sessions: 3,
    title: "Study Buddy",
    faces: &["( ◕ ‿ ◕ )", "( ^ _ ^ )", "( ｡ • ̀ᴗ-)"],
    lines: &[
      "Good to see you again!",
      "Let's study some more, I'll help.",
      "You're getting consistent, nice.",
    ],
  },
  Stage {
    min_sessions: 8,
    title: "Close Friend",
    faces: &["( ✧ ▽ ✧ )", "( ´ ▽ ` )ﾉ", "٩( ◕ ᗜ ◕ )و"],
    lines: &[
      "Yay, you're finally here!",
      "I've got a fun quiz ready for you!",
      "Take a break soon, but one quiz first.",
    ],
  },
  Stage {
    min_sessions: 20,
    title: "Academic Soulmate",
    faces: &["(づ ◕ ᗜ ◕ )づ", "( ♥ ◡ ♥ )", "( ˘ ³˘)♥"],
    lines: &[
      "I missed you! Been waiting all day...",
      "You're so smart, proud to be your AI!",
      "The world needs people like you. Keep going!",
    ],
  },
];

pub fn stage_for(session_count: usize) -> usize {
  STAGES.iter().rposition(|s| session_count >= s.min_sessions).unwrap_or(0)
}

/// Percent of the way from the current stage to the next; 100 at the last.
pub fn progress_percent(session_count: usize) -> u32 {
  let idx = stage_for(session_count);
  let Some(next) = STAGES.get(idx + 1) else { return 100 };
  let start = STAGES[idx].min_sessions;
  let span = next.min_sessions - start;
  (((session_count - start) * 100) / span).min(100) as u32
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompanionView {
  pub stage: usize,
  pub title: &'static str,
  pub face: &'static str,
  pub line: &'static str,
  pub progress: u32,
  pub total_sessions: usize,
  pub sessions_to_next: Option<usize>,
}

pub fn companion_view<R: Rng + ?Sized>(session_count: usize, rng: &mut R) -> CompanionView {
  let stage = stage_for(session_count);
  let data = &STAGES[stage];
  CompanionView {
    stage,
    title: data.title,
    face: data.faces.choose(rng).copied().unwrap_or(""),
    line: data.lines.choose(rng).copied().unwrap_or(""),
    progress: progress_percent(session_count),
    total_sessions: session_count,
    sessions_to_next: STAGES.get(stage + 1).map(|n| n.min_sessions - session_count),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  #[test]
  fn stage_thresholds() {
    assert_eq!(stage_for(0), 0);
    assert_eq!(stage_for(2), 0);
    assert_eq!(stage_for(3), 1);
    assert_eq!(stage_for(7), 1);
    assert_eq!(stage_for(8), 2);
    assert_eq!(stage_for(20), 3);
    assert_eq!(stage_for(500), 3);
  }

  #[test]
  fn progress_within_stage() {
    assert_eq!(progress_percent(0), 0);
    assert_eq!(progress_percent(1), 33);
    assert_eq!(progress_percent(5), 40);
    assert_eq!(progress_percent(14), 50);
    assert_eq!(progress_percent(25), 100);
  }

  #[test]
  fn view_picks_from_current_stage() {
    let mut rng = StdRng::seed_from_u64(7);
    let view = companion_view(9, &mut rng);
    assert_eq!(view.title, "Close Friend");
    assert!(STAGES[2].faces.contains(&view.face));
    assert!(STAGES[2].lines.contains(&view.line));
    assert_eq!(view.sessions_to_next, Some(11));
    assert_eq!(companion_view(20, &mut rng).sessions_to_next, None);
  }
}
