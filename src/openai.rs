//! Question generation over an OpenAI-compatible chat.completions endpoint.
//!
//! The default base URL is Gemini's OpenAI-compatible surface, so the model
//! ids from the catalog work as-is. The API key is the user's, passed per call.
//! Calls are instrumented and log model names, latencies and response sizes
//! (not contents).
//!
//! NOTE: We never log the API key.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::config::Prompts;
use crate::domain::{Difficulty, Question};
use crate::provider::{validate_questions, GenerationRequest, ProgressFn, ProviderError, QuestionProvider, QuizSource};
use crate::util::{fill_template, trunc_for_log};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

#[derive(Clone)]
pub struct OpenAiProvider {
  pub client: reqwest::Client,
  pub base_url: String,
  pub prompts: Prompts,
}

impl OpenAiProvider {
  /// Build the client; LLM_BASE_URL overrides the endpoint.
  pub fn from_env(prompts: Prompts) -> Result<Self, ProviderError> {
    let base_url = std::env::var("LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    Self::new(base_url, prompts)
  }

  pub fn new(base_url: impl Into<String>, prompts: Prompts) -> Result<Self, ProviderError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(120))
      .build()
      .map_err(|e| ProviderError(format!("HTTP client setup failed: {}", e)))?;
    Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string(), prompts })
  }

  /// JSON-object chat completion. Generic over the target type T.
  #[instrument(level = "info", skip(self, api_key, system, user), fields(model = %model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(
    &self,
    api_key: &str,
    model: &str,
    system: &str,
    user: MessageContent,
    temperature: f32,
  ) -> Result<T, String> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: MessageContent::Text(system.into()) },
        ChatMessageReq { role: "user".into(), content: user },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "glassquiz/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", api_key))
      .json(&req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_api_error(&body).unwrap_or(body);
      return Err(format!("Model API HTTP {}: {}", status, msg));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Model usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default();

    parse_json_payload::<T>(&text).map_err(|e| {
      warn!(preview = %trunc_for_log(&text, 200), "Model returned unparseable JSON");
      format!("JSON parse error: {}", e)
    })
  }

  fn user_content(&self, request: &GenerationRequest) -> MessageContent {
    let style_hint = request.style.prompt_hint();
    let mode_hint = request.mode.prompt_hint();
    let count = request.question_count.to_string();
    let fill = |source: &str| {
      fill_template(
        &self.prompts.generation_user_template,
        &[("count", &count), ("style_hint", style_hint), ("mode_hint", mode_hint), ("source", source)],
      )
    };

    match &request.source {
      QuizSource::Topic(topic) => MessageContent::Text(fill(&format!("Topic: {}", topic.trim()))),
      QuizSource::Document { file_name, bytes } => match std::str::from_utf8(bytes) {
        Ok(text) => MessageContent::Text(fill(&format!("Document '{}':\n{}", file_name, text))),
        Err(_) => MessageContent::Parts(vec![
          ContentPart::Text { text: fill(&format!("The attached document '{}'.", file_name)) },
          ContentPart::File {
            file: FilePart {
              filename: file_name.clone(),
              file_data: format!("data:{};base64,{}", mime_for(file_name), STANDARD.encode(bytes)),
            },
          },
        ]),
      },
    }
  }
}

#[async_trait]
impl QuestionProvider for OpenAiProvider {
  #[instrument(
    level = "info",
    skip(self, api_key, request, on_progress),
    fields(model = %request.model_id, count = request.question_count, mode = %request.mode)
  )]
  async fn generate(
    &self,
    api_key: &str,
    request: &GenerationRequest,
    on_progress: ProgressFn<'_>,
  ) -> Result<Vec<Question>, ProviderError> {
    on_progress(request.source.initial_status());
    let user = self.user_content(request);

    on_progress("Generating questions...");
    let start = std::time::Instant::now();
    let result = self
      .chat_json::<Generated>(api_key, &request.model_id, &self.prompts.generation_system, user, 0.7)
      .await;
    let elapsed = start.elapsed();

    let generated = match result {
      Ok(g) => {
        info!(?elapsed, returned = g.questions.len(), "Model response received successfully");
        g
      }
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed during question generation");
        return Err(ProviderError(format!("Question generation failed: {e}")));
      }
    };

    on_progress("Validating questions...");
    let questions = into_questions(generated, request.question_count as usize);
    validate_questions(&questions)?;
    Ok(questions)
  }
}

#[derive(Deserialize)]
struct Generated {
  #[serde(default)]
  questions: Vec<GeneratedQuestion>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedQuestion {
  text: String,
  options: Vec<String>,
  correct_index: usize,
  #[serde(default)] explanation: String,
  #[serde(default)] key_point: String,
  #[serde(default)] difficulty: Difficulty,
}

/// Number ids 1..n in generated order and cap at the requested count.
fn into_questions(generated: Generated, limit: usize) -> Vec<Question> {
  generated
    .questions
    .into_iter()
    .take(limit)
    .zip(1u32..)
    .map(|(g, id)| Question {
      id,
      text: g.text,
      options: g.options,
      correct_index: g.correct_index,
      explanation: g.explanation,
      key_point: g.key_point,
      difficulty: g.difficulty,
    })
    .collect()
}

/// Models sometimes wrap JSON in a ```json fence despite json_object mode.
fn parse_json_payload<T: for<'a> Deserialize<'a>>(text: &str) -> Result<T, serde_json::Error> {
  let trimmed = text.trim();
  let unfenced = trimmed
    .strip_prefix("```json")
    .or_else(|| trimmed.strip_prefix("```"))
    .and_then(|s| s.strip_suffix("```"))
    .unwrap_or(trimmed);
  serde_json::from_str::<T>(unfenced.trim())
}

fn mime_for(file_name: &str) -> &'static str {
  let lower = file_name.to_lowercase();
  if lower.ends_with(".pdf") {
    "application/pdf"
  } else if lower.ends_with(".png") {
    "image/png"
  } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
    "image/jpeg"
  } else {
    "application/octet-stream"
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: MessageContent }
#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
  Text(String),
  Parts(Vec<ContentPart>),
}
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
  Text { text: String },
  File { file: FilePart },
}
#[derive(Serialize)]
struct FilePart { filename: String, file_data: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an API error body.
/// Gemini's compatibility layer sometimes wraps it in a one-element array.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  if let Ok(w) = serde_json::from_str::<EWrap>(body) {
    return Some(w.error.message);
  }
  serde_json::from_str::<Vec<EWrap>>(body)
    .ok()
    .and_then(|v| v.into_iter().next())
    .map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{ExamStyle, QuizMode};

  fn provider() -> OpenAiProvider {
    OpenAiProvider::new("http://localhost:9/v1/", Prompts::default()).unwrap()
  }

  fn request(source: QuizSource) -> GenerationRequest {
    GenerationRequest { source, model_id: "m".into(), question_count: 5, mode: QuizMode::Scaffolding, style: ExamStyle::Analytical }
  }

  #[test]
  fn strips_trailing_slash_from_base_url() {
    assert_eq!(provider().base_url, "http://localhost:9/v1");
  }

  #[test]
  fn topic_prompt_fills_every_placeholder() {
    let content = provider().user_content(&request(QuizSource::Topic("  Photosynthesis ".into())));
    let MessageContent::Text(text) = content else { panic!("expected plain text") };
    assert!(text.contains("exactly 5 multiple-choice"));
    assert!(text.contains("Topic: Photosynthesis"));
    assert!(text.contains(ExamStyle::Analytical.prompt_hint()));
    assert!(text.contains(QuizMode::Scaffolding.prompt_hint()));
    assert!(!text.contains("{source}"));
  }

  #[test]
  fn binary_document_is_sent_as_base64_file_part() {
    let content = provider().user_content(&request(QuizSource::Document {
      file_name: "Notes.PDF".into(),
      bytes: vec![0xff, 0xfe, 0x00],
    }));
    let json = serde_json::to_value(&content).unwrap();
    assert_eq!(json[0]["type"], "text");
    assert_eq!(json[1]["type"], "file");
    assert_eq!(json[1]["file"]["file_data"], "data:application/pdf;base64,//4A");
  }

  #[test]
  fn generated_questions_are_renumbered_and_capped() {
    let raw = r#"```json
    {"questions": [
      {"text": "a", "options": ["1","2","3","4"], "correctIndex": 1, "keyPoint": "K", "difficulty": "Hard"},
      {"text": "b", "options": ["1","2","3","4"], "correctIndex": 0, "difficulty": "easy"},
      {"text": "c", "options": ["1","2","3","4"], "correctIndex": 2}
    ]}
    ```"#;
    let generated: Generated = parse_json_payload(raw).unwrap();
    let qs = into_questions(generated, 2);
    assert_eq!(qs.len(), 2);
    assert_eq!(qs[0].id, 1);
    assert_eq!(qs[1].id, 2);
    assert_eq!(qs[0].difficulty, Difficulty::Hard);
    assert_eq!(qs[1].difficulty, Difficulty::Easy);
  }

  #[test]
  fn api_error_message_is_extracted() {
    assert_eq!(extract_api_error(r#"{"error":{"message":"API key not valid"}}"#).as_deref(), Some("API key not valid"));
    assert_eq!(extract_api_error(r#"[{"error":{"message":"quota"}}]"#).as_deref(), Some("quota"));
    assert_eq!(extract_api_error("<html>"), None);
  }
}
