//! [`RemoteStore`] — the PostgREST implementation of [`StorageEngine`].

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use onegov_core::{
  StorageEngine,
  domain::{ChatSessionSummary, NewConversation, normalize_email},
  query::{Listing, Lookup, Mutation, Record, RunOutcome},
};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
  Error, Result,
  encode::{
    ChatMessageRow, ChatSessionRow, QaPairRow, RawChatMessage, RawChatSession,
    RawContent, RawError, RawId, RawSession, RawUser, SessionRow, UserRow,
  },
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const USER_COLUMNS: &str = "id,name,email,password,created_at";
const SESSION_COLUMNS: &str = "id,user_id,token,expires_at,created_at";
const MESSAGE_COLUMNS: &str = "id,session_id,role,content,created_at";

type Params = Vec<(&'static str, String)>;

/// PostgREST filter literal for a timestamp.
fn ts(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

/// A Supabase project reached over HTTPS.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct RemoteStore {
  client:   Client,
  base_url: String,
  key:      String,
}

impl std::fmt::Debug for RemoteStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RemoteStore")
      .field("base_url", &self.base_url)
      .finish_non_exhaustive()
  }
}

impl RemoteStore {
  /// Build a client for `base_url` and confirm the `users` table answers
  /// with the given key.
  pub async fn connect(base_url: &str, key: &str) -> Result<Self> {
    let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    let store = Self {
      client,
      base_url: base_url.trim_end_matches('/').to_owned(),
      key: key.to_owned(),
    };
    store.probe().await?;
    tracing::info!(url = %store.base_url, "connected to remote store");
    Ok(store)
  }

  async fn probe(&self) -> Result<()> {
    let _: Vec<RawId> = self
      .select("users", vec![("select", "id".into()), ("limit", "1".into())])
      .await?;
    Ok(())
  }

  // ── Requests ──────────────────────────────────────────────────────────

  fn request(&self, method: Method, table: &str) -> RequestBuilder {
    self
      .client
      .request(method, format!("{}/rest/v1/{table}", self.base_url))
      .header("apikey", &self.key)
      .bearer_auth(&self.key)
  }

  /// Turn a non-success status into [`Error::Status`].
  async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let parsed: RawError = serde_json::from_str(&body).unwrap_or_default();
    Err(Error::Status {
      status:  status.as_u16(),
      code:    parsed.code,
      message: parsed.message.unwrap_or(body),
    })
  }

  async fn select<T: DeserializeOwned>(
    &self,
    table: &str,
    params: Params,
  ) -> Result<Vec<T>> {
    let resp = self.request(Method::GET, table).query(&params).send().await?;
    Ok(Self::check(resp).await?.json().await?)
  }

  /// Insert one row or an array of rows; returns the new ids in order.
  async fn insert<B: Serialize + ?Sized>(
    &self,
    table: &str,
    body: &B,
  ) -> Result<Vec<RawId>> {
    let resp = self
      .request(Method::POST, table)
      .query(&[("select", "id")])
      .header("Prefer", "return=representation")
      .json(body)
      .send()
      .await?;
    Ok(Self::check(resp).await?.json().await?)
  }

  async fn delete(&self, table: &str, mut params: Params) -> Result<u64> {
    params.push(("select", "id".into()));
    let resp = self
      .request(Method::DELETE, table)
      .query(&params)
      .header("Prefer", "return=representation")
      .send()
      .await?;
    let gone: Vec<RawId> = Self::check(resp).await?.json().await?;
    Ok(gone.len() as u64)
  }

  async fn insert_one<B: Serialize>(&self, table: &str, row: B) -> Result<RunOutcome> {
    let ids = self.insert(table, &row).await?;
    Ok(match ids.last() {
      Some(r) => RunOutcome::inserted(r.id),
      None => RunOutcome::changed(0),
    })
  }

  async fn find_user(&self, column: &'static str, value: String) -> Result<Option<RawUser>> {
    let rows: Vec<RawUser> = self
      .select("users", vec![
        ("select", USER_COLUMNS.into()),
        (column, format!("eq.{value}")),
        ("limit", "1".into()),
      ])
      .await?;
    Ok(rows.into_iter().next())
  }

  /// PostgREST cannot span two requests in a transaction, so a failed
  /// message insert deletes the session it just created.
  async fn save_conversation(
    &self,
    conversation: NewConversation,
  ) -> Result<RunOutcome> {
    let ids = self
      .insert("chat_sessions", &ChatSessionRow::from(&conversation.session))
      .await?;
    let Some(session_id) = ids.last().map(|r| r.id) else {
      return Err(onegov_core::Error::MissingInsertId("SaveConversation").into());
    };

    let saved = |changes: u64| RunOutcome {
      last_insert_id: Some(session_id),
      changes,
    };
    let messages = conversation.message_rows(session_id);
    if messages.is_empty() {
      return Ok(saved(0));
    }
    let rows: Vec<ChatMessageRow<'_>> = messages.iter().map(Into::into).collect();
    match self.insert("chat_messages", rows.as_slice()).await {
      Ok(stored) => Ok(saved(stored.len() as u64)),
      Err(e) => {
        let undo = self
          .delete("chat_sessions", vec![("id", format!("eq.{session_id}"))])
          .await;
        if let Err(undo) = undo {
          tracing::warn!(session_id, error = %undo, "failed to remove partial chat session");
        }
        Err(e)
      }
    }
  }

  async fn last_message(&self, session_id: i64) -> Result<String> {
    let rows: Vec<RawContent> = self
      .select("chat_messages", vec![
        ("select", "content".into()),
        ("session_id", format!("eq.{session_id}")),
        ("order", "created_at.desc,id.desc".into()),
        ("limit", "1".into()),
      ])
      .await?;
    Ok(rows.into_iter().next().map(|r| r.content).unwrap_or_default())
  }
}

// ─── StorageEngine impl ──────────────────────────────────────────────────────

impl StorageEngine for RemoteStore {
  type Error = Error;

  fn name(&self) -> &'static str { "remote" }

  fn is_durable(&self) -> bool { true }

  async fn lookup(&self, query: Lookup) -> Result<Option<Record>> {
    match query {
      Lookup::UserByEmail { email } => Ok(
        self
          .find_user("email", normalize_email(&email))
          .await?
          .map(|u| Record::User(u.into_user())),
      ),
      Lookup::UserById { id } => Ok(
        self
          .find_user("id", id.to_string())
          .await?
          .map(|u| Record::User(u.into_user())),
      ),
      Lookup::LiveSessionByToken { token, now } => {
        let sessions: Vec<RawSession> = self
          .select("sessions", vec![
            ("select", SESSION_COLUMNS.into()),
            ("token", format!("eq.{token}")),
            ("expires_at", format!("gt.{}", ts(now))),
            ("limit", "1".into()),
          ])
          .await?;
        let Some(session) = sessions.into_iter().next() else {
          return Ok(None);
        };
        let user = self.find_user("id", session.user_id.to_string()).await?;
        Ok(user.map(|u| {
          Record::Session(session.with_user(u.into_user().profile()))
        }))
      }
    }
  }

  async fn mutate(&self, query: Mutation) -> Result<RunOutcome> {
    match query {
      Mutation::InsertUser(new) => {
        let email = normalize_email(&new.email);
        let row = UserRow {
          email: &email,
          ..UserRow::from(&new)
        };
        self.insert_one("users", row).await
      }
      Mutation::InsertSession(new) => {
        self.insert_one("sessions", SessionRow::from(&new)).await
      }
      Mutation::DeleteExpiredSessions { now } => {
        let gone = self
          .delete("sessions", vec![("expires_at", format!("lt.{}", ts(now)))])
          .await?;
        Ok(RunOutcome::changed(gone))
      }
      Mutation::InsertChatSession(new) => {
        self.insert_one("chat_sessions", ChatSessionRow::from(&new)).await
      }
      Mutation::InsertChatMessages(messages) => {
        let rows: Vec<ChatMessageRow<'_>> = messages.iter().map(Into::into).collect();
        let ids = self.insert("chat_messages", rows.as_slice()).await?;
        Ok(RunOutcome {
          last_insert_id: ids.last().map(|r| r.id),
          changes:        ids.len() as u64,
        })
      }
      Mutation::SaveConversation(conversation) => {
        self.save_conversation(conversation).await
      }
      Mutation::InsertQaPair(pair) => {
        self.insert_one("qa_pairs", QaPairRow::from(&pair)).await
      }
    }
  }

  async fn list(&self, query: Listing) -> Result<Vec<Record>> {
    match query {
      Listing::ChatSessionsForUser { user_id, limit } => {
        let sessions: Vec<RawChatSession> = self
          .select("chat_sessions", vec![
            ("select", "id,title,created_at,updated_at".into()),
            ("user_id", format!("eq.{user_id}")),
            ("order", "updated_at.desc,id.desc".into()),
            ("limit", limit.to_string()),
          ])
          .await?;

        let mut records = Vec::with_capacity(sessions.len());
        for s in sessions {
          let last_message = self.last_message(s.id).await?;
          records.push(Record::ChatSummary(ChatSessionSummary {
            id: s.id,
            title: s.title,
            created_at: s.created_at,
            updated_at: s.updated_at,
            last_message,
          }));
        }
        Ok(records)
      }
      Listing::MessagesForChatSession { session_id } => {
        let rows: Vec<RawChatMessage> = self
          .select("chat_messages", vec![
            ("select", MESSAGE_COLUMNS.into()),
            ("session_id", format!("eq.{session_id}")),
            ("order", "created_at.asc,id.asc".into()),
          ])
          .await?;
        Ok(rows.into_iter().map(|m| Record::Message(m.into())).collect())
      }
    }
  }
}
