//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::{AppSnapshot, GenerationInput};
use crate::config::ModelOption;
use crate::domain::{ExamStyle, QuizMode};
use crate::error::AppError;
use crate::history::HistoryEntry;
use crate::session::Selection;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Snapshot,
    Answer {
        #[serde(rename = "selectedIndex", default)]
        selected_index: Option<usize>,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Snapshot { snapshot: AppSnapshot },
    Error { kind: &'static str, message: String },
}

pub fn selection(selected_index: Option<usize>) -> Selection {
    selected_index.map_or(Selection::NoAnswer, Selection::Choice)
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentIn {
    pub file_name: String,
    pub data_base64: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateIn {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub document: Option<DocumentIn>,
    #[serde(default)]
    pub model_id: Option<String>,
    pub question_count: u32,
    #[serde(default)]
    pub mode: QuizMode,
    #[serde(default)]
    pub style: ExamStyle,
}

impl GenerateIn {
    pub fn into_input(self) -> Result<GenerationInput, AppError> {
        let document = match self.document {
            Some(doc) => {
                let bytes = STANDARD
                    .decode(doc.data_base64.trim())
                    .map_err(|e| AppError::InvalidInput(format!("document is not valid base64: {}", e)))?;
                Some((doc.file_name, bytes))
            }
            None => None,
        };
        Ok(GenerationInput {
            document,
            topic: self.topic,
            model_id: self.model_id,
            question_count: self.question_count,
            mode: self.mode,
            style: self.style,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerIn {
    #[serde(default)]
    pub selected_index: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyIn {
    pub api_key: String,
}

#[derive(Serialize)]
pub struct CredentialOut {
    pub configured: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsOut {
    pub default_model: String,
    pub available: Vec<ModelOption>,
}

/// History row without the stored questions.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummaryOut {
    pub id: i64,
    pub file_name: String,
    pub model_id: String,
    pub mode: QuizMode,
    pub date: DateTime<Utc>,
    pub question_count: usize,
    pub topic_summary: String,
}

impl From<&HistoryEntry> for HistorySummaryOut {
    fn from(e: &HistoryEntry) -> Self {
        Self {
            id: e.id,
            file_name: e.file_name.clone(),
            model_id: e.model_id.clone(),
            mode: e.mode,
            date: e.date,
            question_count: e.question_count,
            topic_summary: e.topic_summary.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
    pub kind: &'static str,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
