//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings with microsecond precision
//! and a `Z` suffix, which keeps them fixed-width and text-sortable.

use chrono::{DateTime, SecondsFormat, Utc};
use onegov_core::domain::{
  ChatMessage, ChatSessionSummary, Role, Session, SessionWithUser, User,
  UserProfile,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub id:         i64,
  pub name:       String,
  pub email:      String,
  pub password:   String,
  pub created_at: String,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:            self.id,
      name:          self.name,
      email:         self.email,
      password_hash: self.password,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// A `sessions` row joined with the owning user's public columns.
pub struct RawSessionWithUser {
  pub id:         i64,
  pub user_id:    i64,
  pub token:      String,
  pub expires_at: String,
  pub created_at: String,
  pub name:       String,
  pub email:      String,
}

impl RawSessionWithUser {
  pub fn into_session(self) -> Result<SessionWithUser> {
    Ok(SessionWithUser {
      session: Session {
        id:         self.id,
        user_id:    self.user_id,
        token:      self.token,
        expires_at: decode_dt(&self.expires_at)?,
        created_at: decode_dt(&self.created_at)?,
      },
      user:    UserProfile {
        id:    self.user_id,
        name:  self.name,
        email: self.email,
      },
    })
  }
}

/// A `chat_sessions` row plus the content of its newest message.
pub struct RawChatSummary {
  pub id:           i64,
  pub title:        String,
  pub created_at:   String,
  pub updated_at:   String,
  pub last_message: Option<String>,
}

impl RawChatSummary {
  pub fn into_summary(self) -> Result<ChatSessionSummary> {
    Ok(ChatSessionSummary {
      id:           self.id,
      title:        self.title,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
      last_message: self.last_message.unwrap_or_default(),
    })
  }
}

pub struct RawChatMessage {
  pub id:         i64,
  pub session_id: i64,
  pub role:       String,
  pub content:    String,
  pub created_at: String,
}

impl RawChatMessage {
  pub fn into_message(self) -> Result<ChatMessage> {
    Ok(ChatMessage {
      id:         self.id,
      session_id: self.session_id,
      role:       self.role.parse::<Role>()?,
      content:    self.content,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn encoded_timestamps_sort_as_text() {
    let a = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
      .unwrap()
      .with_timezone(&Utc);
    let b = a + chrono::Duration::milliseconds(1500);
    let (ea, eb) = (encode_dt(a), encode_dt(b));
    assert_eq!(ea.len(), eb.len());
    assert!(ea < eb);
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }
}
