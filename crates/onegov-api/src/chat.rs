//! Handler for `POST /chat`.
//!
//! Body: `{"message", "language"?, "persona"?, "state"?, "userId"?}`.
//! Answers `{reply, sources?, confidence, lastUpdated}`.

use axum::{Json, extract::State};
use chrono::Utc;
use onegov_core::{StorageEngine, assistant::Assistant, domain::NewQaPair};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  ApiError, ApiState, JsonBody,
  id::{self, Id},
  memory::ANONYMOUS_KEY,
  prompt::{ChatContext, DEFAULT_LANGUAGE, Source, build_prompt, extract_sources},
};

/// Reported with every reply; there is no scoring model behind it.
pub const CONFIDENCE: f64 = 0.95;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
  /// Kept loose so a non-string message is a 400 rather than a decode error.
  pub message:  Option<Value>,
  pub language: Option<String>,
  pub persona:  Option<String>,
  pub state:    Option<String>,
  pub user_id:  Option<Id>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
  pub reply:        String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sources:      Option<Vec<Source>>,
  pub confidence:   f64,
  /// `YYYY-MM-DD`.
  pub last_updated: String,
}

fn non_blank(s: Option<&String>) -> Option<&str> {
  s.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// `POST /chat`
pub async fn handler<S, A>(
  State(state): State<ApiState<S, A>>,
  JsonBody(body): JsonBody<ChatBody>,
) -> Result<Json<ChatResponse>, ApiError>
where
  S: StorageEngine,
  A: Assistant,
{
  let message = match &body.message {
    Some(Value::String(m)) if !m.trim().is_empty() => m.as_str(),
    _ => {
      return Err(ApiError::BadRequest(
        "Message is required and must be a string.".into(),
      ));
    }
  };
  let Some(assistant) = state.assistant.as_ref() else {
    return Err(ApiError::Unavailable(
      "The assistant is not configured.".into(),
    ));
  };

  let language = non_blank(body.language.as_ref()).unwrap_or(DEFAULT_LANGUAGE);
  let persona = non_blank(body.persona.as_ref());
  let region = non_blank(body.state.as_ref());
  let user = id::present(body.user_id.as_ref());
  let key = user.map_or_else(|| ANONYMOUS_KEY.to_owned(), Id::to_string);

  let history = state.memory.recall(&key).await;
  let prompt = build_prompt(&ChatContext {
    message,
    language,
    persona,
    state: region,
    history: &history,
  });

  let reply = assistant
    .generate(&prompt)
    .await
    .map_err(ApiError::assistant)?;

  let now = Utc::now();
  let sources = extract_sources(&reply, now.date_naive());
  state.memory.record(&key, message, &reply).await;

  let pair = NewQaPair {
    user_id:    user.and_then(Id::value),
    question:   message.to_owned(),
    answer:     reply.clone(),
    persona:    persona.map(str::to_owned),
    state:      region.map(str::to_owned),
    language:   language.to_owned(),
    created_at: now,
  };
  if let Err(e) = state.repo.log_qa_pair(pair).await {
    tracing::warn!(error = %e, "failed to log Q&A pair");
  }

  Ok(Json(ChatResponse {
    reply,
    sources: (!sources.is_empty()).then_some(sources),
    confidence: CONFIDENCE,
    last_updated: now.format("%Y-%m-%d").to_string(),
  }))
}
