//! JSON shapes exchanged with PostgREST.
//!
//! Timestamps travel as RFC 3339 strings in both directions; chrono's serde
//! support handles the `+00:00` offsets Postgres sends back.

use chrono::{DateTime, Utc};
use onegov_core::domain::{
  ChatMessage, NewChatMessage, NewChatSession, NewQaPair, NewSession, NewUser,
  Role, Session, SessionWithUser, User, UserProfile,
};
use serde::{Deserialize, Serialize};

// ─── Outgoing rows ───────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct UserRow<'a> {
  pub name:       &'a str,
  pub email:      &'a str,
  pub password:   &'a str,
  pub created_at: DateTime<Utc>,
}

impl<'a> From<&'a NewUser> for UserRow<'a> {
  fn from(u: &'a NewUser) -> Self {
    Self {
      name:       &u.name,
      email:      &u.email,
      password:   &u.password_hash,
      created_at: u.created_at,
    }
  }
}

#[derive(Serialize)]
pub struct SessionRow<'a> {
  pub user_id:    i64,
  pub token:      &'a str,
  pub expires_at: DateTime<Utc>,
  pub created_at: DateTime<Utc>,
}

impl<'a> From<&'a NewSession> for SessionRow<'a> {
  fn from(s: &'a NewSession) -> Self {
    Self {
      user_id:    s.user_id,
      token:      &s.token,
      expires_at: s.expires_at,
      created_at: s.created_at,
    }
  }
}

#[derive(Serialize)]
pub struct ChatSessionRow<'a> {
  pub user_id:    i64,
  pub title:      &'a str,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a NewChatSession> for ChatSessionRow<'a> {
  fn from(s: &'a NewChatSession) -> Self {
    Self {
      user_id:    s.user_id,
      title:      &s.title,
      created_at: s.created_at,
      updated_at: s.created_at,
    }
  }
}

#[derive(Serialize)]
pub struct ChatMessageRow<'a> {
  pub session_id: i64,
  pub role:       Role,
  pub content:    &'a str,
  pub created_at: DateTime<Utc>,
}

impl<'a> From<&'a NewChatMessage> for ChatMessageRow<'a> {
  fn from(m: &'a NewChatMessage) -> Self {
    Self {
      session_id: m.session_id,
      role:       m.role,
      content:    &m.content,
      created_at: m.created_at,
    }
  }
}

#[derive(Serialize)]
pub struct QaPairRow<'a> {
  pub user_id:    Option<i64>,
  pub question:   &'a str,
  pub answer:     &'a str,
  pub persona:    Option<&'a str>,
  pub state:      Option<&'a str>,
  pub language:   &'a str,
  pub created_at: DateTime<Utc>,
}

impl<'a> From<&'a NewQaPair> for QaPairRow<'a> {
  fn from(q: &'a NewQaPair) -> Self {
    Self {
      user_id:    q.user_id,
      question:   &q.question,
      answer:     &q.answer,
      persona:    q.persona.as_deref(),
      state:      q.state.as_deref(),
      language:   &q.language,
      created_at: q.created_at,
    }
  }
}

// ─── Incoming rows ───────────────────────────────────────────────────────────

/// What `select=id` returns for inserts and deletes.
#[derive(Deserialize)]
pub struct RawId {
  pub id: i64,
}

#[derive(Deserialize)]
pub struct RawUser {
  pub id:         i64,
  pub name:       String,
  pub email:      String,
  pub password:   String,
  pub created_at: DateTime<Utc>,
}

impl RawUser {
  pub fn into_user(self) -> User {
    User {
      id:            self.id,
      name:          self.name,
      email:         self.email,
      password_hash: self.password,
      created_at:    self.created_at,
    }
  }
}

#[derive(Deserialize)]
pub struct RawSession {
  pub id:         i64,
  pub user_id:    i64,
  pub token:      String,
  pub expires_at: DateTime<Utc>,
  pub created_at: DateTime<Utc>,
}

impl RawSession {
  pub fn with_user(self, user: UserProfile) -> SessionWithUser {
    SessionWithUser {
      session: Session {
        id:         self.id,
        user_id:    self.user_id,
        token:      self.token,
        expires_at: self.expires_at,
        created_at: self.created_at,
      },
      user,
    }
  }
}

#[derive(Deserialize)]
pub struct RawChatSession {
  pub id:         i64,
  pub title:      String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct RawContent {
  pub content: String,
}

#[derive(Deserialize)]
pub struct RawChatMessage {
  pub id:         i64,
  pub session_id: i64,
  pub role:       Role,
  pub content:    String,
  pub created_at: DateTime<Utc>,
}

impl From<RawChatMessage> for ChatMessage {
  fn from(m: RawChatMessage) -> Self {
    ChatMessage {
      id:         m.id,
      session_id: m.session_id,
      role:       m.role,
      content:    m.content,
      created_at: m.created_at,
    }
  }
}

/// The body PostgREST sends with an error status.
#[derive(Deserialize, Default)]
pub struct RawError {
  pub code:    Option<String>,
  pub message: Option<String>,
}
