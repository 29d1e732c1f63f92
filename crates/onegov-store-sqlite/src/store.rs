//! [`SqliteStore`] — the SQLite implementation of [`StorageEngine`].

use std::path::Path;

use onegov_core::{
  StorageEngine,
  domain::normalize_email,
  query::{Listing, Lookup, Mutation, Record, RunOutcome},
};
use rusqlite::OptionalExtension as _;

use crate::{
  Error, Result,
  encode::{
    RawChatMessage, RawChatSummary, RawSessionWithUser, RawUser, encode_dt,
  },
  schema::SCHEMA,
};

/// File name of the database inside the data directory.
pub const DATABASE_FILE: &str = "users.db";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  /// Missing parent directories are created.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      tokio::fs::create_dir_all(parent).await?;
    }
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::info!(path = %path.display(), "sqlite store ready");
    Ok(store)
  }

  /// Open `<data_dir>/users.db`, creating the directory if needed.
  pub async fn open_in_dir(data_dir: impl AsRef<Path>) -> Result<Self> {
    Self::open(data_dir.as_ref().join(DATABASE_FILE)).await
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn find_user(
    &self,
    column: &'static str,
    value: rusqlite::types::Value,
  ) -> Result<Option<RawUser>> {
    let sql = format!(
      "SELECT id, name, email, password, created_at FROM users WHERE {column} = ?1"
    );
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![value], |row| {
              Ok(RawUser {
                id:         row.get(0)?,
                name:       row.get(1)?,
                email:      row.get(2)?,
                password:   row.get(3)?,
                created_at: row.get(4)?,
              })
            })
            .optional()?,
        )
      })
      .await?;
    Ok(raw)
  }

  /// Run a single-row `INSERT` and return the new row id.
  async fn insert_row(
    &self,
    sql: &'static str,
    values: Vec<rusqlite::types::Value>,
  ) -> Result<RunOutcome> {
    let id = self
      .conn
      .call(move |conn| {
        conn.execute(sql, rusqlite::params_from_iter(values))?;
        Ok(conn.last_insert_rowid())
      })
      .await?;
    Ok(RunOutcome::inserted(id))
  }
}

fn text(s: impl Into<String>) -> rusqlite::types::Value {
  rusqlite::types::Value::Text(s.into())
}

fn opt_text(s: Option<String>) -> rusqlite::types::Value {
  s.map(rusqlite::types::Value::Text)
    .unwrap_or(rusqlite::types::Value::Null)
}

fn int(i: i64) -> rusqlite::types::Value { rusqlite::types::Value::Integer(i) }

/// `(session_id, role, content, created_at)`
type MessageRow = (i64, &'static str, String, String);

fn insert_messages(
  tx: &rusqlite::Transaction<'_>,
  rows: &[MessageRow],
) -> rusqlite::Result<()> {
  let mut stmt = tx.prepare(
    "INSERT INTO chat_messages (session_id, role, content, created_at)
     VALUES (?1, ?2, ?3, ?4)",
  )?;
  for (session_id, role, content, created_at) in rows {
    stmt.execute(rusqlite::params![session_id, role, content, created_at])?;
  }
  Ok(())
}

// ─── StorageEngine impl ──────────────────────────────────────────────────────

impl StorageEngine for SqliteStore {
  type Error = Error;

  fn name(&self) -> &'static str { "sqlite" }

  fn is_durable(&self) -> bool { true }

  // ── Lookups ───────────────────────────────────────────────────────────────

  async fn lookup(&self, query: Lookup) -> Result<Option<Record>> {
    match query {
      Lookup::UserByEmail { email } => {
        let raw = self.find_user("email", text(normalize_email(&email))).await?;
        raw.map(|r| r.into_user().map(Record::User)).transpose()
      }
      Lookup::UserById { id } => {
        let raw = self.find_user("id", int(id)).await?;
        raw.map(|r| r.into_user().map(Record::User)).transpose()
      }
      Lookup::LiveSessionByToken { token, now } => {
        let now_str = encode_dt(now);
        let raw: Option<RawSessionWithUser> = self
          .conn
          .call(move |conn| {
            Ok(
              conn
                .query_row(
                  "SELECT s.id, s.user_id, s.token, s.expires_at, s.created_at,
                          u.name, u.email
                   FROM sessions s
                   JOIN users u ON s.user_id = u.id
                   WHERE s.token = ?1 AND s.expires_at > ?2",
                  rusqlite::params![token, now_str],
                  |row| {
                    Ok(RawSessionWithUser {
                      id:         row.get(0)?,
                      user_id:    row.get(1)?,
                      token:      row.get(2)?,
                      expires_at: row.get(3)?,
                      created_at: row.get(4)?,
                      name:       row.get(5)?,
                      email:      row.get(6)?,
                    })
                  },
                )
                .optional()?,
            )
          })
          .await?;
        raw
          .map(|r| r.into_session().map(Record::Session))
          .transpose()
      }
    }
  }

  // ── Mutations ─────────────────────────────────────────────────────────────

  async fn mutate(&self, query: Mutation) -> Result<RunOutcome> {
    match query {
      Mutation::InsertUser(user) => {
        self
          .insert_row(
            "INSERT INTO users (name, email, password, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            vec![
              text(user.name),
              text(normalize_email(&user.email)),
              text(user.password_hash),
              text(encode_dt(user.created_at)),
            ],
          )
          .await
      }
      Mutation::InsertSession(session) => {
        self
          .insert_row(
            "INSERT INTO sessions (user_id, token, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            vec![
              int(session.user_id),
              text(session.token),
              text(encode_dt(session.created_at)),
              text(encode_dt(session.expires_at)),
            ],
          )
          .await
      }
      Mutation::DeleteExpiredSessions { now } => {
        let now_str = encode_dt(now);
        let changes = self
          .conn
          .call(move |conn| {
            Ok(conn.execute(
              "DELETE FROM sessions WHERE expires_at < ?1",
              rusqlite::params![now_str],
            )?)
          })
          .await?;
        Ok(RunOutcome::changed(changes as u64))
      }
      Mutation::InsertChatSession(session) => {
        let at = encode_dt(session.created_at);
        self
          .insert_row(
            "INSERT INTO chat_sessions (user_id, title, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            vec![int(session.user_id), text(session.title), text(at.clone()), text(at)],
          )
          .await
      }
      Mutation::InsertChatMessages(messages) => {
        let rows: Vec<MessageRow> = messages
          .into_iter()
          .map(|m| (m.session_id, m.role.as_str(), m.content, encode_dt(m.created_at)))
          .collect();

        // One transaction: either every message lands or none do.
        let (last_id, count) = self
          .conn
          .call(move |conn| {
            let tx = conn.transaction()?;
            insert_messages(&tx, &rows)?;
            let last_id = tx.last_insert_rowid();
            tx.commit()?;
            Ok((last_id, rows.len() as u64))
          })
          .await?;

        Ok(RunOutcome {
          last_insert_id: (count > 0).then_some(last_id),
          changes:        count,
        })
      }
      Mutation::SaveConversation(conversation) => {
        let session = conversation.session;
        let at = encode_dt(session.created_at);
        let messages: Vec<(&'static str, String)> = conversation
          .messages
          .into_iter()
          .map(|(role, content)| (role.as_str(), content))
          .collect();

        let (session_id, count) = self
          .conn
          .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
              "INSERT INTO chat_sessions (user_id, title, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?3)",
              rusqlite::params![session.user_id, session.title, at],
            )?;
            let session_id = tx.last_insert_rowid();
            let rows: Vec<MessageRow> = messages
              .into_iter()
              .map(|(role, content)| (session_id, role, content, at.clone()))
              .collect();
            insert_messages(&tx, &rows)?;
            tx.commit()?;
            Ok((session_id, rows.len() as u64))
          })
          .await?;

        Ok(RunOutcome {
          last_insert_id: Some(session_id),
          changes:        count,
        })
      }
      Mutation::InsertQaPair(pair) => {
        self
          .insert_row(
            "INSERT INTO qa_pairs
               (user_id, question, answer, persona, state, language, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            vec![
              pair.user_id.map(int).unwrap_or(rusqlite::types::Value::Null),
              text(pair.question),
              text(pair.answer),
              opt_text(pair.persona),
              opt_text(pair.state),
              text(pair.language),
              text(encode_dt(pair.created_at)),
            ],
          )
          .await
      }
    }
  }

  // ── Listings ──────────────────────────────────────────────────────────────

  async fn list(&self, query: Listing) -> Result<Vec<Record>> {
    match query {
      Listing::ChatSessionsForUser { user_id, limit } => {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let raws: Vec<RawChatSummary> = self
          .conn
          .call(move |conn| {
            let mut stmt = conn.prepare(
              "SELECT cs.id, cs.title, cs.created_at, cs.updated_at,
                      (SELECT content FROM chat_messages
                       WHERE session_id = cs.id
                       ORDER BY created_at DESC, id DESC
                       LIMIT 1) AS last_message
               FROM chat_sessions cs
               WHERE cs.user_id = ?1
               ORDER BY cs.updated_at DESC, cs.id DESC
               LIMIT ?2",
            )?;
            let rows = stmt
              .query_map(rusqlite::params![user_id, limit], |row| {
                Ok(RawChatSummary {
                  id:           row.get(0)?,
                  title:        row.get(1)?,
                  created_at:   row.get(2)?,
                  updated_at:   row.get(3)?,
                  last_message: row.get(4)?,
                })
              })?
              .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
          })
          .await?;
        raws
          .into_iter()
          .map(|r| r.into_summary().map(Record::ChatSummary))
          .collect()
      }
      Listing::MessagesForChatSession { session_id } => {
        let raws: Vec<RawChatMessage> = self
          .conn
          .call(move |conn| {
            let mut stmt = conn.prepare(
              "SELECT id, session_id, role, content, created_at
               FROM chat_messages
               WHERE session_id = ?1
               ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt
              .query_map(rusqlite::params![session_id], |row| {
                Ok(RawChatMessage {
                  id:         row.get(0)?,
                  session_id: row.get(1)?,
                  role:       row.get(2)?,
                  content:    row.get(3)?,
                  created_at: row.get(4)?,
                })
              })?
              .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
          })
          .await?;
        raws
          .into_iter()
          .map(|r| r.into_message().map(Record::Message))
          .collect()
      }
    }
  }
}
