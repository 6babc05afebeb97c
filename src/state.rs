//! Shared service state: the quiz app behind a mutex, the question provider,
//! and the broadcast channel presentation layers subscribe to.
//!
//! The mutex is never held across an await. Generation runs in a spawned
//! task between `begin_generation` and `complete_generation`; TimeRush timers
//! are spawned tasks that sleep until the token deadline and hand the token
//! back to the app, which drops it if it is stale.

use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::app::{AppSnapshot, GenerationInput, GenerationTicket, QuizApp};
use crate::config::{load_config_from_env, AppConfig};
use crate::error::AppError;
use crate::openai::OpenAiProvider;
use crate::provider::QuestionProvider;
use crate::session::TimerToken;
use crate::storage::{FileStore, KvStore};

const UPDATE_BUFFER: usize = 64;

pub struct AppState {
    pub quiz: Mutex<QuizApp>,
    pub provider: Arc<dyn QuestionProvider>,
    pub updates: broadcast::Sender<AppSnapshot>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn KvStore>, provider: Arc<dyn QuestionProvider>) -> Self {
        let quiz = QuizApp::new(config.rules.clone(), config.models.clone(), store);
        let (updates, _) = broadcast::channel(UPDATE_BUFFER);
        Self { quiz: Mutex::new(quiz), provider, updates, config }
    }

    /// Build state from env: load config, open the data directory, build the provider.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Result<Self, Box<dyn Error>> {
        let config = load_config_from_env().unwrap_or_default();
        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".into());
        let store = Arc::new(FileStore::open(&data_dir)?);
        let provider = OpenAiProvider::from_env(config.prompts.clone())?;
        info!(target: "glassquiz", %data_dir, base_url = %provider.base_url, default_model = %config.models.default_model, "State initialized");
        Ok(Self::new(config, store, Arc::new(provider)))
    }

    pub fn lock(&self) -> MutexGuard<'_, QuizApp> {
        self.quiz.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> AppSnapshot {
        self.lock().snapshot(Instant::now())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppSnapshot> {
        self.updates.subscribe()
    }

    fn publish(&self, snapshot: AppSnapshot) {
        // No subscribers is fine.
        let _ = self.updates.send(snapshot);
    }

    /// Run one transition under the lock, then publish the new snapshot and
    /// arm a timer task if the transition armed a new TimeRush token.
    pub fn transition<T>(
        self: &Arc<Self>,
        f: impl FnOnce(&mut QuizApp, Instant) -> Result<T, AppError>,
    ) -> Result<(T, AppSnapshot), AppError> {
        let (result, snapshot, timer) = {
            let mut app = self.lock();
            let before = app.armed_timer();
            let now = Instant::now();
            let result = f(&mut *app, now);
            let after = app.armed_timer();
            (result, app.snapshot(now), after.filter(|t| Some(*t) != before))
        };
        self.publish(snapshot.clone());
        if let Some(token) = timer {
            self.schedule_timer(token);
        }
        result.map(|value| (value, snapshot))
    }

    fn schedule_timer(self: &Arc<Self>, token: TimerToken) {
        let state = Arc::clone(self);
        debug!(target: "session", session_id = token.session_id, index = token.question_index, "Timer armed");
        tokio::spawn(async move {
            tokio::time::sleep_until(tokio::time::Instant::from_std(token.deadline)).await;
            // The sleep only returns at or past the deadline.
            let fired = state.transition(|app, now| app.expire_timer(token, now.max(token.deadline)));
            if let Err(e) = fired {
                warn!(target: "session", error = %e, "Timer delivery failed");
            }
        });
    }

    /// Move to `Processing` and run the provider call in the background.
    #[instrument(level = "info", skip(self, input))]
    pub fn start_generation(self: &Arc<Self>, input: GenerationInput) -> Result<AppSnapshot, AppError> {
        let (ticket, snapshot) = self.transition(|app, _| app.begin_generation(input))?;
        let state = Arc::clone(self);
        tokio::spawn(async move { state.run_generation(ticket).await });
        Ok(snapshot)
    }

    async fn run_generation(self: Arc<Self>, ticket: GenerationTicket) {
        let request_id = ticket.request_id;
        let progress_state = Arc::clone(&self);
        let on_progress = move |status: &str| {
            let snapshot = {
                let mut app = progress_state.lock();
                app.report_progress(request_id, status).then(|| app.snapshot(Instant::now()))
            };
            if let Some(s) = snapshot {
                progress_state.publish(s);
            }
        };

        let outcome = self.provider.generate(&ticket.api_key, &ticket.request, &on_progress).await;
        match self.transition(|app, now| app.complete_generation(request_id, outcome, now)) {
            Ok(_) => info!(target: "glassquiz", request_id, "Quiz is ready"),
            Err(e) => warn!(target: "glassquiz", request_id, error = %e, "Generation did not produce a quiz"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Difficulty, Question, QuizMode};
    use crate::provider::{GenerationRequest, ProgressFn, ProviderError};
    use crate::session::Selection;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedProvider;

    #[async_trait]
    impl QuestionProvider for FixedProvider {
        async fn generate(
            &self,
            _api_key: &str,
            request: &GenerationRequest,
            on_progress: ProgressFn<'_>,
        ) -> Result<Vec<Question>, ProviderError> {
            on_progress("Generating questions...");
            Ok((1..=request.question_count.min(5))
                .map(|id| Question {
                    id,
                    text: format!("q{}", id),
                    options: vec!["a".into(), "b".into()],
                    correct_index: 0,
                    explanation: String::new(),
                    key_point: "kp".into(),
                    difficulty: Difficulty::Easy,
                })
                .collect())
        }
    }

    fn state() -> Arc<AppState> {
        let state = AppState::new(AppConfig::default(), Arc::new(MemoryStore::new()), Arc::new(FixedProvider));
        state.lock().set_api_key("sk-0123456789abc").unwrap();
        Arc::new(state)
    }

    async fn wait_for_phase(state: &AppState, phase: &str) {
        for _ in 0..100 {
            if state.snapshot().phase == phase {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("phase {} never reached, now {}", phase, state.snapshot().phase);
    }

    fn input(mode: QuizMode) -> GenerationInput {
        GenerationInput { topic: Some("Rust ownership".into()), question_count: 5, mode, ..Default::default() }
    }

    #[tokio::test]
    async fn generation_runs_in_background_and_publishes() {
        let state = state();
        let mut rx = state.subscribe();
        let snap = state.start_generation(input(QuizMode::Standard)).unwrap();
        assert_eq!(snap.phase, "processing");
        assert!(matches!(state.start_generation(input(QuizMode::Standard)), Err(AppError::Busy { .. })));

        wait_for_phase(&state, "quiz_active").await;
        assert_eq!(rx.recv().await.unwrap().phase, "processing");
        assert_eq!(state.lock().history().len(), 1);

        for _ in 0..5 {
            state.transition(|app, now| app.submit_answer(Selection::Choice(0), now)).unwrap();
        }
        let snap = state.snapshot();
        assert_eq!(snap.phase, "results");
        assert_eq!(snap.result.unwrap().score, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn time_rush_timer_task_expires_questions() {
        let state = state();
        state.start_generation(input(QuizMode::TimeRush)).unwrap();
        wait_for_phase(&state, "quiz_active").await;

        tokio::time::sleep(Duration::from_secs(21)).await;
        let snap = state.snapshot();
        let session = snap.session.unwrap();
        assert!(session.current_index >= 1);
        assert_eq!(session.answers[0].selected_index, None);
        assert!(snap.last_feedback.unwrap().timed_out);
    }
}
