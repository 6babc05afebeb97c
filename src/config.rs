//! Loading service configuration (prompts, quiz rules, model list) from TOML.
//!
//! See `AppConfig`, `Prompts` and `QuizRules` for the expected schema. Every
//! section is optional; missing values fall back to the defaults below.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::session::SessionRules;

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
  pub prompts: Prompts,
  pub rules: QuizRules,
  pub models: ModelCatalog,
}

/// Prompts used by the question generator. Placeholders are `{count}`,
/// `{style_hint}`, `{mode_hint}` and `{source}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub generation_system: String,
  pub generation_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generation_system: "You are an exam author who writes multiple-choice questions. Respond ONLY with strict JSON.".into(),
      generation_user_template: "Write exactly {count} multiple-choice questions about the material below.\n\
Style: {style_hint}\n\
Ordering: {mode_hint}\n\
Each question has exactly 4 options and one correct answer.\n\
Return JSON {\"questions\": [{\"text\": string, \"options\": [string, string, string, string], \"correctIndex\": number (0-3), \"explanation\": string, \"keyPoint\": string (2-4 words), \"difficulty\": \"Easy\" | \"Medium\" | \"Hard\"}]}.\n\n\
Material:\n{source}".into(),
    }
  }
}

/// Session and input limits.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct QuizRules {
  pub time_rush_secs: u64,
  pub survival_lives: u32,
  pub history_limit: usize,
  pub min_question_count: u32,
  pub max_question_count: u32,
  pub min_topic_chars: usize,
  pub min_api_key_chars: usize,
}

impl Default for QuizRules {
  fn default() -> Self {
    Self {
      time_rush_secs: 20,
      survival_lives: 3,
      history_limit: crate::history::DEFAULT_HISTORY_LIMIT,
      min_question_count: 5,
      max_question_count: 50,
      min_topic_chars: 4,
      min_api_key_chars: 11,
    }
  }
}

impl QuizRules {
  pub fn session_rules(&self) -> SessionRules {
    SessionRules {
      time_limit: Duration::from_secs(self.time_rush_secs.max(1)),
      survival_lives: self.survival_lives.max(1),
    }
  }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ModelOption {
  pub id: String,
  pub label: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ModelCatalog {
  pub default_model: String,
  pub available: Vec<ModelOption>,
}

impl ModelCatalog {
  pub fn contains(&self, id: &str) -> bool {
    self.available.iter().any(|m| m.id == id)
  }
}

impl Default for ModelCatalog {
  fn default() -> Self {
    let available = [
      ("gemini-2.5-flash", "Gemini 2.5 Flash (Standard - Recommended)"),
      ("gemini-2.5-flash-lite", "Gemini 2.5 Flash Lite (Very fast)"),
      ("gemini-3-flash-preview", "Gemini 3 Flash (Experimental)"),
      ("gemma-3-27b-it", "Gemma 3 27B (Deep reasoning)"),
      ("gemma-3-12b-it", "Gemma 3 12B (Balanced)"),
      ("gemma-3-4b-it", "Gemma 3 4B (Mobile friendly)"),
      ("gemma-3-1b-it", "Gemma 3 1B (Ultra light)"),
    ]
    .into_iter()
    .map(|(id, label)| ModelOption { id: id.into(), label: label.into() })
    .collect();
    Self { default_model: "gemini-2.5-flash-lite".into(), available }
  }
}

pub fn parse_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str::<AppConfig>(s)
}

/// Load `AppConfig` from QUIZ_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("QUIZ_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "glassquiz", %path, "Loaded quiz config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "glassquiz", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "glassquiz", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_config_uses_defaults() {
    let cfg = parse_config("").unwrap();
    assert_eq!(cfg.rules.time_rush_secs, 20);
    assert_eq!(cfg.rules.survival_lives, 3);
    assert_eq!(cfg.rules.history_limit, 20);
    assert!(cfg.models.contains("gemini-2.5-flash"));
    assert!(cfg.prompts.generation_user_template.contains("{count}"));
  }

  #[test]
  fn partial_sections_override_only_given_fields() {
    let cfg = parse_config(
      r#"
      [rules]
      time_rush_secs = 30
      survival_lives = 5

      [models]
      default_model = "local-model"
      available = [{ id = "local-model", label = "Local" }]
      "#,
    )
    .unwrap();
    assert_eq!(cfg.rules.time_rush_secs, 30);
    assert_eq!(cfg.rules.max_question_count, 50);
    let rules = cfg.rules.session_rules();
    assert_eq!(rules.time_limit, Duration::from_secs(30));
    assert_eq!(rules.survival_lives, 5);
    assert!(cfg.models.contains("local-model"));
    assert!(!cfg.models.contains("gemini-2.5-flash"));
  }
}
