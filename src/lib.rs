//! GlassQuiz: AI-generated multiple-choice quizzes with timed, survival and
//! scaffolded modes, scoring, a persisted history log, and a study companion.
//!
//! The core (`session`, `scoring`, `app`) is synchronous and clock-injected;
//! `state` and `routes` wrap it in an Axum service.

pub mod app;
pub mod companion;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod error;
pub mod history;
pub mod openai;
pub mod protocol;
pub mod provider;
pub mod report;
pub mod routes;
pub mod scoring;
pub mod session;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod util;

pub use app::{AppSnapshot, GenerationInput, Phase, QuizApp};
pub use domain::{Difficulty, ExamStyle, Question, QuizMode, QuizResult};
pub use error::AppError;
pub use provider::{GenerationRequest, ProviderError, QuestionProvider};
pub use state::AppState;
