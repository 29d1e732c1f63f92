//! Handlers for saved chat history.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/chat/save` | Body: `{"userId","title","messages":[{"role","content"}]}` |
//! | `GET`  | `/chat/history?userId=<id>` | Newest first, at most 50 |
//! | `POST` | `/chat/history` | Body: `{"sessionId"}`; messages in original order |

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{DateTime, Utc};
use onegov_core::{
  StorageEngine,
  assistant::Assistant,
  domain::{NewChatSession, NewConversation, Role},
  query::DEFAULT_HISTORY_LIMIT,
};
use serde::{Deserialize, Serialize};

use crate::{
  ApiError, ApiState, JsonBody,
  id::{self, Id},
};

// ─── Save ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SavedMessage {
  pub role:    String,
  pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveBody {
  pub user_id:  Option<Id>,
  pub title:    Option<String>,
  pub messages: Option<Vec<SavedMessage>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
  pub success:    bool,
  pub session_id: i64,
  pub message:    &'static str,
}

/// `POST /chat/save`
pub async fn save<S, A>(
  State(state): State<ApiState<S, A>>,
  JsonBody(body): JsonBody<SaveBody>,
) -> Result<Json<SaveResponse>, ApiError>
where
  S: StorageEngine,
  A: Assistant,
{
  let (Some(user_id), Some(title), Some(messages)) = (
    id::present(body.user_id.as_ref()),
    body.title.filter(|t| !t.trim().is_empty()),
    body.messages,
  ) else {
    return Err(ApiError::BadRequest(
      "userId, title, and messages array are required.".into(),
    ));
  };
  let user_id = id::parse_required(user_id, "userId")?;

  let messages = messages
    .into_iter()
    .map(|m| {
      let role = m
        .role
        .parse::<Role>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
      Ok((role, m.content))
    })
    .collect::<Result<Vec<_>, ApiError>>()?;

  let (session_id, saved) = state
    .repo
    .save_conversation(NewConversation {
      session: NewChatSession {
        user_id,
        title,
        created_at: Utc::now(),
      },
      messages,
    })
    .await
    .map_err(ApiError::store)?;
  tracing::info!(session_id, messages = saved, "chat history saved");

  Ok(Json(SaveResponse {
    success: true,
    session_id,
    message: "Chat history saved successfully",
  }))
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
  pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
  /// Stringified for the client.
  pub id:           String,
  pub title:        String,
  pub last_message: String,
  /// The session's `updated_at`.
  pub timestamp:    DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
  pub history: Vec<HistoryEntry>,
}

/// `GET /chat/history?userId=<id>`
pub async fn list<S, A>(
  State(state): State<ApiState<S, A>>,
  Query(params): Query<ListParams>,
) -> Result<Json<HistoryResponse>, ApiError>
where
  S: StorageEngine,
  A: Assistant,
{
  let user_id = params.user_id.map(Id::Text);
  let Some(user_id) = id::present(user_id.as_ref()) else {
    return Err(ApiError::BadRequest("userId is required.".into()));
  };
  let user_id = id::parse_required(user_id, "userId")?;

  let summaries = state
    .repo
    .list_chat_sessions(user_id, DEFAULT_HISTORY_LIMIT)
    .await
    .map_err(ApiError::store)?;

  let history = summaries
    .into_iter()
    .map(|s| HistoryEntry {
      id:           s.id.to_string(),
      title:        s.title,
      last_message: s.last_message,
      timestamp:    s.updated_at,
    })
    .collect();
  Ok(Json(HistoryResponse { history }))
}

// ─── Messages ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesBody {
  pub session_id: Option<Id>,
}

#[derive(Debug, Serialize)]
pub struct MessageEntry {
  pub role:      Role,
  pub content:   String,
  pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
  pub messages: Vec<MessageEntry>,
}

/// `POST /chat/history`
pub async fn messages<S, A>(
  State(state): State<ApiState<S, A>>,
  JsonBody(body): JsonBody<MessagesBody>,
) -> Result<Json<MessagesResponse>, ApiError>
where
  S: StorageEngine,
  A: Assistant,
{
  let Some(session_id) = id::present(body.session_id.as_ref()) else {
    return Err(ApiError::BadRequest("sessionId is required.".into()));
  };
  let session_id = id::parse_required(session_id, "sessionId")?;

  let messages = state
    .repo
    .list_chat_messages(session_id)
    .await
    .map_err(ApiError::store)?
    .into_iter()
    .map(|m| MessageEntry {
      role:      m.role,
      content:   m.content,
      timestamp: m.created_at,
    })
    .collect();
  Ok(Json(MessagesResponse { messages }))
}
