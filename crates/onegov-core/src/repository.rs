//! [`Repository`] — typed operations over any [`StorageEngine`].
//!
//! Each method prepares exactly one intent, awaits it, and unpacks the
//! records it expects. A record of any other shape is an engine bug and is
//! reported as [`Error::UnexpectedRecord`].

use chrono::{DateTime, Utc};

use crate::{
  Error,
  domain::{
    ChatMessage, ChatSessionSummary, NewChatMessage, NewChatSession,
    NewConversation, NewQaPair, NewSession, NewUser, SessionWithUser, User,
    normalize_email,
  },
  query::{Listing, Lookup, Mutation, Record},
  store::StorageEngine,
};

/// Typed facade over a storage engine.
///
/// Cloning is as cheap as cloning the engine.
#[derive(Debug, Clone)]
pub struct Repository<E> {
  engine: E,
}

impl<E: StorageEngine> Repository<E> {
  pub fn new(engine: E) -> Self { Self { engine } }

  pub fn engine(&self) -> &E { &self.engine }

  // ── Users ─────────────────────────────────────────────────────────────

  pub async fn find_user_by_email(
    &self,
    email: &str,
  ) -> Result<Option<User>, E::Error> {
    let query = Lookup::UserByEmail {
      email: normalize_email(email),
    };
    let name = query.name();
    self
      .engine
      .prepare(query)
      .get()
      .await?
      .map(|r| into_user(r, name))
      .transpose()
      .map_err(E::Error::from)
  }

  pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, E::Error> {
    let query = Lookup::UserById { id };
    let name = query.name();
    self
      .engine
      .prepare(query)
      .get()
      .await?
      .map(|r| into_user(r, name))
      .transpose()
      .map_err(E::Error::from)
  }

  /// Insert a user and return its id. A taken email surfaces as an error
  /// whose [`is_conflict`](crate::StoreError::is_conflict) is `true`.
  pub async fn create_user(&self, user: NewUser) -> Result<i64, E::Error> {
    self.insert(Mutation::InsertUser(user)).await
  }

  // ── Auth sessions ─────────────────────────────────────────────────────

  pub async fn create_session(&self, session: NewSession) -> Result<i64, E::Error> {
    self.insert(Mutation::InsertSession(session)).await
  }

  /// The session for `token` if it has not expired by `now`.
  pub async fn find_live_session(
    &self,
    token: &str,
    now: DateTime<Utc>,
  ) -> Result<Option<SessionWithUser>, E::Error> {
    let query = Lookup::LiveSessionByToken {
      token: token.to_owned(),
      now,
    };
    let name = query.name();
    match self.engine.prepare(query).get().await? {
      None => Ok(None),
      Some(Record::Session(s)) => Ok(Some(s)),
      Some(other) => Err(unexpected(name, "session", &other).into()),
    }
  }

  /// Delete expired sessions; returns how many went.
  pub async fn purge_expired_sessions(
    &self,
    now: DateTime<Utc>,
  ) -> Result<u64, E::Error> {
    let outcome = self
      .engine
      .prepare(Mutation::DeleteExpiredSessions { now })
      .run()
      .await?;
    Ok(outcome.changes)
  }

  // ── Chat history ──────────────────────────────────────────────────────

  pub async fn create_chat_session(
    &self,
    session: NewChatSession,
  ) -> Result<i64, E::Error> {
    self.insert(Mutation::InsertChatSession(session)).await
  }

  /// Insert messages in order; returns how many were stored.
  pub async fn add_chat_messages(
    &self,
    messages: Vec<NewChatMessage>,
  ) -> Result<u64, E::Error> {
    if messages.is_empty() {
      return Ok(0);
    }
    let outcome = self
      .engine
      .prepare(Mutation::InsertChatMessages(messages))
      .run()
      .await?;
    Ok(outcome.changes)
  }

  /// Store a session with its messages; returns the session id and the
  /// number of messages stored. On error nothing was kept.
  pub async fn save_conversation(
    &self,
    conversation: NewConversation,
  ) -> Result<(i64, u64), E::Error> {
    let mutation = Mutation::SaveConversation(conversation);
    let name = mutation.name();
    let outcome = self.engine.prepare(mutation).run().await?;
    let id = outcome
      .last_insert_id
      .ok_or_else(|| E::Error::from(Error::MissingInsertId(name)))?;
    Ok((id, outcome.changes))
  }

  pub async fn list_chat_sessions(
    &self,
    user_id: i64,
    limit: usize,
  ) -> Result<Vec<ChatSessionSummary>, E::Error> {
    let query = Listing::ChatSessionsForUser { user_id, limit };
    let name = query.name();
    let records = self.engine.prepare(query).all().await?;
    records
      .into_iter()
      .map(|r| match r {
        Record::ChatSummary(s) => Ok(s),
        other => Err(E::Error::from(unexpected(name, "chat summary", &other))),
      })
      .collect()
  }

  pub async fn list_chat_messages(
    &self,
    session_id: i64,
  ) -> Result<Vec<ChatMessage>, E::Error> {
    let query = Listing::MessagesForChatSession { session_id };
    let name = query.name();
    let records = self.engine.prepare(query).all().await?;
    records
      .into_iter()
      .map(|r| match r {
        Record::Message(m) => Ok(m),
        other => Err(E::Error::from(unexpected(name, "chat message", &other))),
      })
      .collect()
  }

  // ── Q&A log ───────────────────────────────────────────────────────────

  pub async fn log_qa_pair(&self, pair: NewQaPair) -> Result<i64, E::Error> {
    self.insert(Mutation::InsertQaPair(pair)).await
  }

  async fn insert(&self, mutation: Mutation) -> Result<i64, E::Error> {
    let name = mutation.name();
    let outcome = self.engine.prepare(mutation).run().await?;
    outcome
      .last_insert_id
      .ok_or_else(|| E::Error::from(Error::MissingInsertId(name)))
  }
}

fn into_user(record: Record, query: &'static str) -> Result<User, Error> {
  match record {
    Record::User(u) => Ok(u),
    other => Err(unexpected(query, "user", &other)),
  }
}

fn unexpected(query: &'static str, expected: &'static str, got: &Record) -> Error {
  Error::UnexpectedRecord {
    query,
    expected,
    found: got.shape(),
  }
}
