//! Bounded, newest-first log of past generations.
//!
//! Every write replaces the whole log: read, mutate in memory, write back.
//! Only original generations are recorded, never retries or replays.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::domain::{Question, QuizMode};
use crate::storage::{KvStore, StorageError};

pub const HISTORY_KEY: &str = "glassquiz_history";
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

const FALLBACK_LABEL: &str = "Manual topic";
const FALLBACK_SUMMARY: &str = "General";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
  /// Creation time in epoch milliseconds.
  pub id: i64,
  pub file_name: String,
  pub model_id: String,
  pub mode: QuizMode,
  pub date: DateTime<Utc>,
  pub question_count: usize,
  pub topic_summary: String,
  pub questions: Vec<Question>,
}

impl HistoryEntry {
  pub fn new(label: &str, model_id: &str, mode: QuizMode, questions: Vec<Question>, now: DateTime<Utc>) -> Self {
    let label = label.trim();
    Self {
      id: now.timestamp_millis(),
      file_name: if label.is_empty() { FALLBACK_LABEL.to_string() } else { label.to_string() },
      model_id: model_id.to_string(),
      mode,
      date: now,
      question_count: questions.len(),
      topic_summary: questions
        .first()
        .map(|q| q.key_point.clone())
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| FALLBACK_SUMMARY.to_string()),
      questions,
    }
  }
}

#[derive(Clone)]
pub struct HistoryStore {
  store: Arc<dyn KvStore>,
  limit: usize,
}

impl HistoryStore {
  pub fn new(store: Arc<dyn KvStore>, limit: usize) -> Self {
    Self { store, limit: limit.max(1) }
  }

  /// All entries, newest first. A missing or unreadable log reads as empty.
  pub fn list(&self) -> Vec<HistoryEntry> {
    self.read().unwrap_or_else(|e| {
      warn!(target: "history", error = %e, "History log is unreadable; treating as empty");
      Vec::new()
    })
  }

  fn read(&self) -> Result<Vec<HistoryEntry>, StorageError> {
    match self.store.get(HISTORY_KEY)? {
      Some(raw) => Ok(serde_json::from_str(&raw)?),
      None => Ok(Vec::new()),
    }
  }

  pub fn len(&self) -> usize {
    self.list().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn get(&self, id: i64) -> Option<HistoryEntry> {
    self.list().into_iter().find(|e| e.id == id)
  }

  /// Insert at the front, evicting beyond the bound. Ids are kept unique
  /// and increasing by bumping a colliding timestamp.
  ///
  /// An existing log that cannot be read is left untouched and the entry is
  /// not saved. When the write fails the log is cleared and a log holding
  /// only the new entry is written once; the returned error is from that
  /// second attempt.
  #[instrument(level = "info", skip(self, entry), fields(id = entry.id, questions = entry.question_count))]
  pub fn append(&self, mut entry: HistoryEntry) -> Result<HistoryEntry, StorageError> {
    let mut log = self.read().map_err(|e| {
      error!(target: "history", error = %e, "History log is unreadable; entry not saved");
      e
    })?;
    if let Some(newest) = log.first() {
      if entry.id <= newest.id {
        entry.id = newest.id + 1;
      }
    }
    log.insert(0, entry.clone());
    log.truncate(self.limit);

    match self.write(&log) {
      Ok(()) => {
        info!(target: "history", id = entry.id, size = log.len(), "History entry saved");
        Ok(entry)
      }
      Err(e) => {
        warn!(target: "history", error = %e, "History write failed; clearing log and retrying");
        self.store.remove(HISTORY_KEY)?;
        self.write(std::slice::from_ref(&entry)).map_err(|e| {
          error!(target: "history", error = %e, "History rewrite failed");
          e
        })?;
        Ok(entry)
      }
    }
  }

  pub fn clear(&self) -> Result<(), StorageError> {
    info!(target: "history", "History cleared");
    self.store.remove(HISTORY_KEY)
  }

  fn write(&self, log: &[HistoryEntry]) -> Result<(), StorageError> {
    let json = serde_json::to_string(log)?;
    self.store.set(HISTORY_KEY, &json)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Difficulty;
  use crate::storage::MemoryStore;
  use chrono::{Duration, TimeZone};

  fn question(id: u32, key_point: &str) -> Question {
    Question {
      id,
      text: format!("q{}", id),
      options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
      correct_index: 2,
      explanation: String::new(),
      key_point: key_point.into(),
      difficulty: Difficulty::Hard,
    }
  }

  fn at(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).unwrap()
  }

  #[test]
  fn entry_fields_follow_first_question() {
    let e = HistoryEntry::new("notes.pdf", "gemini-2.5-flash", QuizMode::Survival, vec![question(1, "Cells"), question(2, "DNA")], at(1_000));
    assert_eq!(e.id, 1_000);
    assert_eq!(e.topic_summary, "Cells");
    assert_eq!(e.question_count, 2);
    let blank = HistoryEntry::new("  ", "m", QuizMode::Standard, vec![], at(2_000));
    assert_eq!(blank.file_name, "Manual topic");
    assert_eq!(blank.topic_summary, "General");
  }

  #[test]
  fn serialized_layout_uses_camel_case() {
    let e = HistoryEntry::new("topic", "m", QuizMode::TimeRush, vec![question(1, "k")], at(5));
    let v = serde_json::to_value(&e).unwrap();
    for field in ["id", "fileName", "modelId", "mode", "date", "questionCount", "topicSummary", "questions"] {
      assert!(v.get(field).is_some(), "missing {field}");
    }
    assert_eq!(v["mode"], "TIME_RUSH");
    assert!(v["date"].as_str().unwrap().starts_with("1970-01-01T00:00:00.005"));
  }

  #[test]
  fn twenty_first_entry_evicts_oldest() {
    let history = HistoryStore::new(Arc::new(MemoryStore::new()), DEFAULT_HISTORY_LIMIT);
    let base = at(1_000_000);
    for i in 0..21 {
      let e = HistoryEntry::new(&format!("topic {}", i), "m", QuizMode::Standard, vec![question(1, "k")], base + Duration::seconds(i));
      history.append(e).unwrap();
    }
    let list = history.list();
    assert_eq!(list.len(), 20);
    assert_eq!(list[0].file_name, "topic 20");
    assert_eq!(list[19].file_name, "topic 1");
    assert!(list.iter().all(|e| e.file_name != "topic 0"));
  }

  #[test]
  fn colliding_ids_are_bumped() {
    let history = HistoryStore::new(Arc::new(MemoryStore::new()), 5);
    let a = history.append(HistoryEntry::new("a", "m", QuizMode::Standard, vec![], at(10))).unwrap();
    let b = history.append(HistoryEntry::new("b", "m", QuizMode::Standard, vec![], at(10))).unwrap();
    assert_eq!(a.id, 10);
    assert_eq!(b.id, 11);
    assert_eq!(history.get(11).unwrap().file_name, "b");
  }

  #[test]
  fn quota_failure_clears_and_keeps_newest() {
    let store = Arc::new(MemoryStore::with_quota(1_500));
    let history = HistoryStore::new(store, 20);
    let big = |label: &str, ms: i64| {
      let qs = (1..=3).map(|i| question(i, &"x".repeat(100))).collect();
      HistoryEntry::new(label, "m", QuizMode::Standard, qs, at(ms))
    };
    history.append(big("first", 1)).unwrap();
    history.append(big("second", 2)).unwrap();
    let list = history.list();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].file_name, "second");
  }

  #[test]
  fn corrupt_log_reads_as_empty_and_is_not_overwritten() {
    let store = Arc::new(MemoryStore::new());
    store.set(HISTORY_KEY, "{not json").unwrap();
    let history = HistoryStore::new(store.clone(), 20);
    assert!(history.is_empty());

    let err = history.append(HistoryEntry::new("t", "m", QuizMode::Standard, vec![], at(1))).unwrap_err();
    assert!(matches!(err, StorageError::Serde(_)));
    assert_eq!(store.get(HISTORY_KEY).unwrap().as_deref(), Some("{not json"));

    history.clear().unwrap();
    history.append(HistoryEntry::new("t", "m", QuizMode::Standard, vec![], at(1))).unwrap();
    assert_eq!(history.len(), 1);
  }
}
