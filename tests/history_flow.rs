use std::sync::Arc;
use std::time::Instant;

use glassquiz::config::{ModelCatalog, QuizRules};
use glassquiz::session::Selection;
use glassquiz::storage::{FileStore, KvStore};
use glassquiz::{Difficulty, GenerationInput, Phase, Question, QuizApp, QuizMode};

fn question(id: u32, difficulty: Difficulty) -> Question {
    Question {
        id,
        text: format!("Question {}", id),
        options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        correct_index: 2,
        explanation: String::new(),
        key_point: format!("Point {}", id),
        difficulty,
    }
}

fn open_app(dir: &std::path::Path) -> QuizApp {
    let store: Arc<dyn KvStore> = Arc::new(FileStore::open(dir).unwrap());
    QuizApp::new(QuizRules::default(), ModelCatalog::default(), store)
}

#[test]
fn history_and_credential_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let set = vec![
        question(1, Difficulty::Hard),
        question(2, Difficulty::Easy),
        question(3, Difficulty::Medium),
        question(4, Difficulty::Easy),
        question(5, Difficulty::Hard),
    ];

    {
        let mut app = open_app(dir.path());
        app.set_api_key("AIza-test-key-123").unwrap();
        let input = GenerationInput {
            document: Some(("lecture.txt".into(), b"notes".to_vec())),
            question_count: 5,
            mode: QuizMode::Scaffolding,
            ..Default::default()
        };
        let ticket = app.begin_generation(input).unwrap();
        assert_eq!(ticket.api_key, "AIza-test-key-123");
        app.complete_generation(ticket.request_id, Ok(set.clone()), Instant::now()).unwrap();

        // Scaffolding orders easy to hard, keeping ties stable.
        let order: Vec<u32> = app.questions().iter().map(|q| q.id).collect();
        assert_eq!(order, vec![2, 4, 3, 1, 5]);
    }

    let mut app = open_app(dir.path());
    assert!(app.has_api_key());
    let history = app.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].file_name, "lecture.txt");
    assert_eq!(history[0].mode, QuizMode::Scaffolding);
    assert_eq!(history[0].question_count, 5);
    assert_eq!(history[0].topic_summary, "Point 1");

    let now = Instant::now();
    app.load_history(history[0].id, now).unwrap();
    assert_eq!(*app.phase(), Phase::QuizActive);
    for _ in 0..5 {
        app.submit_answer(Selection::Choice(2), now).unwrap();
    }
    assert_eq!(*app.phase(), Phase::Results);
    assert_eq!(app.result().unwrap().score, 100);
    assert!(!app.can_retry_mistakes());

    app.clear_history().unwrap();
    assert!(open_app(dir.path()).history().is_empty());
}
