//! Domain records, as persisted by every storage engine.
//!
//! Identifiers are plain integers assigned by the engine on insert.
//! Timestamps are UTC throughout.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// How long a login session stays valid.
pub const SESSION_TTL_DAYS: i64 = 7;

/// Trim and lowercase an email address. All lookups and inserts go through
/// this so uniqueness is case-insensitive.
pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

// ─── Users ───────────────────────────────────────────────────────────────────

/// A stored account, including the password hash.
///
/// Never serialised to clients; use [`User::profile`] for that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
  pub id:            i64,
  pub name:          String,
  pub email:         String,
  /// Argon2 PHC string.
  pub password_hash: String,
  pub created_at:    DateTime<Utc>,
}

impl User {
  /// The sanitised projection returned over the wire.
  pub fn profile(&self) -> UserProfile {
    UserProfile {
      id:    self.id,
      name:  self.name.clone(),
      email: self.email.clone(),
    }
  }
}

/// Public view of a user. Carries no credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
  pub id:    i64,
  pub name:  String,
  pub email: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
  pub name:          String,
  pub email:         String,
  pub password_hash: String,
  pub created_at:    DateTime<Utc>,
}

impl NewUser {
  /// Build an insert with a trimmed name and a normalised email.
  pub fn new(name: &str, email: &str, password_hash: String) -> Self {
    Self {
      name: name.trim().to_owned(),
      email: normalize_email(email),
      password_hash,
      created_at: Utc::now(),
    }
  }
}

// ─── Auth sessions ───────────────────────────────────────────────────────────

/// A bearer-token login session. Distinct from a [`ChatSessionSummary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  pub id:         i64,
  pub user_id:    i64,
  pub token:      String,
  pub expires_at: DateTime<Utc>,
  pub created_at: DateTime<Utc>,
}

impl Session {
  pub fn is_live_at(&self, now: DateTime<Utc>) -> bool { self.expires_at > now }
}

/// A live session joined with the user it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionWithUser {
  pub session: Session,
  pub user:    UserProfile,
}

#[derive(Debug, Clone)]
pub struct NewSession {
  pub user_id:    i64,
  pub token:      String,
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

impl NewSession {
  /// A session created at `now` that expires [`SESSION_TTL_DAYS`] later.
  pub fn starting_at(user_id: i64, token: String, now: DateTime<Utc>) -> Self {
    Self {
      user_id,
      token,
      created_at: now,
      expires_at: now + Duration::days(SESSION_TTL_DAYS),
    }
  }
}

// ─── Chat history ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  User,
  Assistant,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Role::User => "user",
      Role::Assistant => "assistant",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Role {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "user" => Ok(Role::User),
      "assistant" => Ok(Role::Assistant),
      other => Err(Error::InvalidRole(other.to_owned())),
    }
  }
}

#[derive(Debug, Clone)]
pub struct NewChatSession {
  pub user_id:    i64,
  pub title:      String,
  /// Also used as the initial `updated_at`.
  pub created_at: DateTime<Utc>,
}

/// One row of a user's chat history listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSessionSummary {
  pub id:           i64,
  pub title:        String,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
  /// Content of the newest message, or empty if there is none.
  pub last_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
  pub id:         i64,
  pub session_id: i64,
  pub role:       Role,
  pub content:    String,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewChatMessage {
  pub session_id: i64,
  pub role:       Role,
  pub content:    String,
  pub created_at: DateTime<Utc>,
}

/// A chat session stored together with its messages, all or nothing.
#[derive(Debug, Clone)]
pub struct NewConversation {
  pub session:  NewChatSession,
  /// Kept in this order and stamped with the session's `created_at`.
  pub messages: Vec<(Role, String)>,
}

impl NewConversation {
  /// The message rows once the session has been assigned `session_id`.
  pub fn message_rows(&self, session_id: i64) -> Vec<NewChatMessage> {
    self
      .messages
      .iter()
      .map(|(role, content)| NewChatMessage {
        session_id,
        role: *role,
        content: content.clone(),
        created_at: self.session.created_at,
      })
      .collect()
  }
}

// ─── Q&A audit log ───────────────────────────────────────────────────────────

/// A single question/answer exchange. Write-only: nothing reads these back.
#[derive(Debug, Clone)]
pub struct NewQaPair {
  pub user_id:    Option<i64>,
  pub question:   String,
  pub answer:     String,
  pub persona:    Option<String>,
  pub state:      Option<String>,
  pub language:   String,
  pub created_at: DateTime<Utc>,
}

// ─── Personas ────────────────────────────────────────────────────────────────

/// The citizen profile a question is asked under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
  Teacher,
  Farmer,
  Student,
  Senior,
  JobSeeker,
  General,
}

impl Persona {
  /// Parse a client-supplied persona name. Unknown names map to
  /// [`Persona::General`].
  pub fn from_name(name: &str) -> Self {
    match name.trim() {
      "teacher" => Persona::Teacher,
      "farmer" => Persona::Farmer,
      "student" => Persona::Student,
      "senior" => Persona::Senior,
      "job_seeker" => Persona::JobSeeker,
      _ => Persona::General,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Persona::Teacher => "teacher",
      Persona::Farmer => "farmer",
      Persona::Student => "student",
      Persona::Senior => "senior",
      Persona::JobSeeker => "job_seeker",
      Persona::General => "general",
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn email_is_trimmed_and_lowercased() {
    assert_eq!(normalize_email("  A@X.com "), "a@x.com");
    let user = NewUser::new(" Asha ", "A@X.com ", "hash".into());
    assert_eq!(user.email, "a@x.com");
    assert_eq!(user.name, "Asha");
  }

  #[test]
  fn session_expires_seven_days_after_creation() {
    let now = Utc::now();
    let s = NewSession::starting_at(1, "t".into(), now);
    assert_eq!(s.expires_at - s.created_at, Duration::days(7));
  }

  #[test]
  fn role_parses_known_names_only() {
    assert_eq!("user".parse::<Role>().unwrap(), Role::User);
    assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
    assert!(matches!("system".parse::<Role>(), Err(Error::InvalidRole(_))));
  }

  #[test]
  fn unknown_persona_is_general() {
    assert_eq!(Persona::from_name("farmer"), Persona::Farmer);
    assert_eq!(Persona::from_name("astronaut"), Persona::General);
  }
}
