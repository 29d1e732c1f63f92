//! The closed set of query intents every storage engine understands.
//!
//! Intents are grouped by the call that executes them: [`Lookup`]s answer
//! `get()`, [`Mutation`]s answer `run()` and [`Listing`]s answer `all()`.
//! Engines match on each group exhaustively, so adding an intent is a compile
//! error in every engine until it is handled.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::domain::{
  ChatMessage, ChatSessionSummary, NewChatMessage, NewChatSession,
  NewConversation, NewQaPair, NewSession, NewUser, SessionWithUser, User,
};

/// Listing cap applied when a caller does not choose one.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

// ─── Intents ─────────────────────────────────────────────────────────────────

/// Single-record reads.
#[derive(Debug, Clone)]
pub enum Lookup {
  /// `email` is normalised by the engine before comparing.
  UserByEmail { email: String },
  UserById { id: i64 },
  /// A session whose token matches and whose `expires_at` is after `now`,
  /// joined with its user.
  LiveSessionByToken { token: String, now: DateTime<Utc> },
}

/// Single mutations.
#[derive(Debug, Clone)]
pub enum Mutation {
  InsertUser(NewUser),
  InsertSession(NewSession),
  /// Delete every session with `expires_at` before `now`.
  DeleteExpiredSessions { now: DateTime<Utc> },
  InsertChatSession(NewChatSession),
  /// Bulk insert, kept in the given order.
  InsertChatMessages(Vec<NewChatMessage>),
  /// A chat session and its messages as one unit. Reports the session's id
  /// as `last_insert_id` and the message count as `changes`; a failure
  /// leaves neither behind.
  SaveConversation(NewConversation),
  InsertQaPair(NewQaPair),
}

/// Multi-record reads.
#[derive(Debug, Clone)]
pub enum Listing {
  /// Most recently updated first, at most `limit` rows.
  ChatSessionsForUser { user_id: i64, limit: usize },
  /// Chronological, ties broken by insertion order.
  MessagesForChatSession { session_id: i64 },
}

/// Any intent. This is what [`prepare`](crate::StorageEngine::prepare) takes.
#[derive(Debug, Clone)]
pub enum Query {
  Lookup(Lookup),
  Mutation(Mutation),
  Listing(Listing),
}

impl Query {
  pub fn kind(&self) -> QueryKind {
    match self {
      Query::Lookup(_) => QueryKind::Lookup,
      Query::Mutation(_) => QueryKind::Mutation,
      Query::Listing(_) => QueryKind::Listing,
    }
  }

  pub fn name(&self) -> &'static str {
    match self {
      Query::Lookup(l) => l.name(),
      Query::Mutation(m) => m.name(),
      Query::Listing(l) => l.name(),
    }
  }
}

impl Lookup {
  pub fn name(&self) -> &'static str {
    match self {
      Lookup::UserByEmail { .. } => "UserByEmail",
      Lookup::UserById { .. } => "UserById",
      Lookup::LiveSessionByToken { .. } => "LiveSessionByToken",
    }
  }
}

impl Mutation {
  pub fn name(&self) -> &'static str {
    match self {
      Mutation::InsertUser(_) => "InsertUser",
      Mutation::InsertSession(_) => "InsertSession",
      Mutation::DeleteExpiredSessions { .. } => "DeleteExpiredSessions",
      Mutation::InsertChatSession(_) => "InsertChatSession",
      Mutation::InsertChatMessages(_) => "InsertChatMessages",
      Mutation::SaveConversation(_) => "SaveConversation",
      Mutation::InsertQaPair(_) => "InsertQaPair",
    }
  }
}

impl Listing {
  pub fn name(&self) -> &'static str {
    match self {
      Listing::ChatSessionsForUser { .. } => "ChatSessionsForUser",
      Listing::MessagesForChatSession { .. } => "MessagesForChatSession",
    }
  }
}

impl From<Lookup> for Query {
  fn from(l: Lookup) -> Self { Query::Lookup(l) }
}

impl From<Mutation> for Query {
  fn from(m: Mutation) -> Self { Query::Mutation(m) }
}

impl From<Listing> for Query {
  fn from(l: Listing) -> Self { Query::Listing(l) }
}

// ─── Calls and kinds ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
  Lookup,
  Mutation,
  Listing,
}

impl fmt::Display for QueryKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      QueryKind::Lookup => "lookup",
      QueryKind::Mutation => "mutation",
      QueryKind::Listing => "listing",
    })
  }
}

/// The three statement calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
  Get,
  Run,
  All,
}

impl fmt::Display for Call {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Call::Get => "get",
      Call::Run => "run",
      Call::All => "all",
    })
  }
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// A row produced by a lookup or listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
  User(User),
  Session(SessionWithUser),
  ChatSummary(ChatSessionSummary),
  Message(ChatMessage),
}

impl Record {
  pub fn shape(&self) -> &'static str {
    match self {
      Record::User(_) => "user",
      Record::Session(_) => "session",
      Record::ChatSummary(_) => "chat summary",
      Record::Message(_) => "chat message",
    }
  }
}

/// What a mutation reports back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOutcome {
  /// Id of the last inserted row, for inserts.
  pub last_insert_id: Option<i64>,
  /// Rows inserted or deleted.
  pub changes:        u64,
}

impl RunOutcome {
  pub fn inserted(id: i64) -> Self {
    Self {
      last_insert_id: Some(id),
      changes:        1,
    }
  }

  pub fn changed(changes: u64) -> Self {
    Self {
      last_insert_id: None,
      changes,
    }
  }
}
