//! [`MemoryStore`] — the in-memory implementation of [`StorageEngine`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use onegov_core::{
  StorageEngine,
  domain::{
    ChatMessage, ChatSessionSummary, NewQaPair, Session, SessionWithUser, User,
    normalize_email,
  },
  query::{Listing, Lookup, Mutation, Record, RunOutcome},
};
use tokio::sync::RwLock;

use crate::Result;

// ─── Tables ──────────────────────────────────────────────────────────────────

struct ChatSessionRow {
  id:         i64,
  user_id:    i64,
  title:      String,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

/// Rows are kept in insertion order, which is also id order.
#[derive(Default)]
struct Tables {
  users:         Vec<User>,
  sessions:      Vec<Session>,
  chat_sessions: Vec<ChatSessionRow>,
  chat_messages: Vec<ChatMessage>,
  qa_pairs:      Vec<(i64, NewQaPair)>,
  last_id:       i64,
}

impl Tables {
  /// Ids are unique across tables, which is stricter than needed and keeps a
  /// single counter.
  fn next_id(&mut self) -> i64 {
    self.last_id += 1;
    self.last_id
  }

  fn user(&self, id: i64) -> Option<&User> { self.users.iter().find(|u| u.id == id) }

  fn last_message(&self, session_id: i64) -> String {
    self
      .chat_messages
      .iter()
      .filter(|m| m.session_id == session_id)
      .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
      .map(|m| m.content.clone())
      .unwrap_or_default()
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A volatile store held entirely in process memory.
///
/// Each statement takes the lock once, so every mutation (including the
/// unique-email check and insert) is atomic with respect to other requests.
/// Cloning shares the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
  tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Number of logged Q&A pairs. Nothing else reads the log.
  pub async fn qa_pair_count(&self) -> usize {
    self.tables.read().await.qa_pairs.len()
  }
}

// ─── StorageEngine impl ──────────────────────────────────────────────────────

impl StorageEngine for MemoryStore {
  type Error = crate::Error;

  fn name(&self) -> &'static str { "memory" }

  fn is_durable(&self) -> bool { false }

  async fn lookup(&self, query: Lookup) -> Result<Option<Record>> {
    let t = self.tables.read().await;
    let found = match query {
      Lookup::UserByEmail { email } => {
        let email = normalize_email(&email);
        t.users
          .iter()
          .find(|u| normalize_email(&u.email) == email)
          .cloned()
          .map(Record::User)
      }
      Lookup::UserById { id } => t.user(id).cloned().map(Record::User),
      Lookup::LiveSessionByToken { token, now } => t
        .sessions
        .iter()
        .find(|s| s.token == token && s.is_live_at(now))
        .and_then(|s| {
          t.user(s.user_id).map(|u| {
            Record::Session(SessionWithUser {
              session: s.clone(),
              user:    u.profile(),
            })
          })
        }),
    };
    Ok(found)
  }

  async fn mutate(&self, query: Mutation) -> Result<RunOutcome> {
    let mut t = self.tables.write().await;
    match query {
      Mutation::InsertUser(new) => {
        let email = normalize_email(&new.email);
        if t.users.iter().any(|u| u.email == email) {
          return Err(onegov_core::Error::Conflict(format!("user {email}")).into());
        }
        let id = t.next_id();
        t.users.push(User {
          id,
          name: new.name,
          email,
          password_hash: new.password_hash,
          created_at: new.created_at,
        });
        Ok(RunOutcome::inserted(id))
      }
      Mutation::InsertSession(new) => {
        if t.sessions.iter().any(|s| s.token == new.token) {
          return Err(onegov_core::Error::Conflict("session token".into()).into());
        }
        let id = t.next_id();
        t.sessions.push(Session {
          id,
          user_id: new.user_id,
          token: new.token,
          expires_at: new.expires_at,
          created_at: new.created_at,
        });
        Ok(RunOutcome::inserted(id))
      }
      Mutation::DeleteExpiredSessions { now } => {
        let before = t.sessions.len();
        t.sessions.retain(|s| s.expires_at >= now);
        Ok(RunOutcome::changed((before - t.sessions.len()) as u64))
      }
      Mutation::InsertChatSession(new) => {
        let id = t.next_id();
        t.chat_sessions.push(ChatSessionRow {
          id,
          user_id: new.user_id,
          title: new.title,
          created_at: new.created_at,
          updated_at: new.created_at,
        });
        Ok(RunOutcome::inserted(id))
      }
      Mutation::InsertChatMessages(messages) => {
        let mut outcome = RunOutcome::changed(0);
        for m in messages {
          let id = t.next_id();
          t.chat_messages.push(ChatMessage {
            id,
            session_id: m.session_id,
            role: m.role,
            content: m.content,
            created_at: m.created_at,
          });
          outcome.last_insert_id = Some(id);
          outcome.changes += 1;
        }
        Ok(outcome)
      }
      Mutation::SaveConversation(conversation) => {
        let session = conversation.session;
        let session_id = t.next_id();
        t.chat_sessions.push(ChatSessionRow {
          id:         session_id,
          user_id:    session.user_id,
          title:      session.title,
          created_at: session.created_at,
          updated_at: session.created_at,
        });
        let mut changes = 0;
        for (role, content) in conversation.messages {
          let id = t.next_id();
          t.chat_messages.push(ChatMessage {
            id,
            session_id,
            role,
            content,
            created_at: session.created_at,
          });
          changes += 1;
        }
        Ok(RunOutcome {
          last_insert_id: Some(session_id),
          changes,
        })
      }
      Mutation::InsertQaPair(pair) => {
        let id = t.next_id();
        t.qa_pairs.push((id, pair));
        Ok(RunOutcome::inserted(id))
      }
    }
  }

  async fn list(&self, query: Listing) -> Result<Vec<Record>> {
    let t = self.tables.read().await;
    let records = match query {
      Listing::ChatSessionsForUser { user_id, limit } => {
        let mut rows: Vec<&ChatSessionRow> = t
          .chat_sessions
          .iter()
          .filter(|cs| cs.user_id == user_id)
          .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        rows
          .into_iter()
          .take(limit)
          .map(|cs| {
            Record::ChatSummary(ChatSessionSummary {
              id:           cs.id,
              title:        cs.title.clone(),
              created_at:   cs.created_at,
              updated_at:   cs.updated_at,
              last_message: t.last_message(cs.id),
            })
          })
          .collect()
      }
      Listing::MessagesForChatSession { session_id } => {
        let mut msgs: Vec<&ChatMessage> = t
          .chat_messages
          .iter()
          .filter(|m| m.session_id == session_id)
          .collect();
        // Stable sort: equal timestamps stay in insertion order.
        msgs.sort_by_key(|m| m.created_at);
        msgs.into_iter().cloned().map(Record::Message).collect()
      }
    };
    Ok(records)
  }
}
