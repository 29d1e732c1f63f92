//! Tests for `RemoteStore`, against an `httpmock` PostgREST stand-in.

use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use onegov_core::{
  Repository, StorageEngine, StoreError,
  domain::{NewChatMessage, NewChatSession, NewConversation, NewUser, Role},
  query::Lookup,
};
use serde_json::json;

use crate::{Error, RemoteStore};

const KEY: &str = "service-key";

async fn connected(server: &MockServer) -> RemoteStore {
  server
    .mock_async(|when, then| {
      when
        .method(GET)
        .path("/rest/v1/users")
        .query_param("select", "id")
        .query_param("limit", "1");
      then.status(200).json_body(json!([]));
    })
    .await;
  RemoteStore::connect(&server.base_url(), KEY).await.unwrap()
}

#[tokio::test]
async fn connect_probes_with_key_headers() {
  let server = MockServer::start_async().await;
  let probe = server
    .mock_async(|when, then| {
      when
        .method(GET)
        .path("/rest/v1/users")
        .header("apikey", KEY)
        .header("authorization", format!("Bearer {KEY}"));
      then.status(200).json_body(json!([{ "id": 1 }]));
    })
    .await;

  let store = RemoteStore::connect(&format!("{}/", server.base_url()), KEY)
    .await
    .unwrap();
  probe.assert_async().await;
  assert_eq!(store.name(), "remote");
  assert!(store.is_durable());
}

#[tokio::test]
async fn connect_fails_when_unauthorized() {
  let server = MockServer::start_async().await;
  server
    .mock_async(|when, then| {
      when.method(GET).path("/rest/v1/users");
      then
        .status(401)
        .json_body(json!({ "code": "PGRST301", "message": "JWT invalid" }));
    })
    .await;

  let err = RemoteStore::connect(&server.base_url(), "bad").await.unwrap_err();
  match err {
    Error::Status {
      status, message, ..
    } => {
      assert_eq!(status, 401);
      assert_eq!(message, "JWT invalid");
    }
    other => panic!("unexpected error: {other}"),
  }
}

#[tokio::test]
async fn user_lookup_filters_on_normalised_email() {
  let server = MockServer::start_async().await;
  let store = connected(&server).await;
  let lookup = server
    .mock_async(|when, then| {
      when
        .method(GET)
        .path("/rest/v1/users")
        .query_param("email", "eq.a@x.com");
      then.status(200).json_body(json!([{
        "id": 4,
        "name": "A",
        "email": "a@x.com",
        "password": "$argon2id$...",
        "created_at": "2024-05-01T10:00:00+00:00"
      }]));
    })
    .await;

  let repo = Repository::new(store);
  let user = repo.find_user_by_email(" A@X.com").await.unwrap().unwrap();
  lookup.assert_async().await;
  assert_eq!(user.id, 4);
  assert_eq!(user.password_hash, "$argon2id$...");
  assert_eq!(
    user.created_at,
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
  );
}

#[tokio::test]
async fn unique_violation_is_a_conflict() {
  let server = MockServer::start_async().await;
  let store = connected(&server).await;
  server
    .mock_async(|when, then| {
      when
        .method(POST)
        .path("/rest/v1/users")
        .header("prefer", "return=representation");
      then.status(409).json_body(json!({
        "code": "23505",
        "message": "duplicate key value violates unique constraint \"users_email_key\""
      }));
    })
    .await;

  let err = Repository::new(store)
    .create_user(NewUser::new("A", "a@x.com", "phc".into()))
    .await
    .unwrap_err();
  assert!(err.is_conflict());
}

#[tokio::test]
async fn live_session_joins_its_user() {
  let server = MockServer::start_async().await;
  let store = connected(&server).await;
  server
    .mock_async(|when, then| {
      when
        .method(GET)
        .path("/rest/v1/sessions")
        .query_param("token", "eq.abc")
        .query_param_exists("expires_at");
      then.status(200).json_body(json!([{
        "id": 9,
        "user_id": 4,
        "token": "abc",
        "expires_at": "2099-01-01T00:00:00+00:00",
        "created_at": "2024-05-01T10:00:00+00:00"
      }]));
    })
    .await;
  server
    .mock_async(|when, then| {
      when
        .method(GET)
        .path("/rest/v1/users")
        .query_param("id", "eq.4");
      then.status(200).json_body(json!([{
        "id": 4,
        "name": "A",
        "email": "a@x.com",
        "password": "phc",
        "created_at": "2024-05-01T10:00:00+00:00"
      }]));
    })
    .await;

  let live = Repository::new(store)
    .find_live_session("abc", Utc::now())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(live.session.id, 9);
  assert_eq!(live.user.email, "a@x.com");
}

#[tokio::test]
async fn messages_are_inserted_in_one_request() {
  let server = MockServer::start_async().await;
  let store = connected(&server).await;
  let insert = server
    .mock_async(|when, then| {
      when
        .method(POST)
        .path("/rest/v1/chat_messages")
        .body_contains("\"first\"")
        .body_contains("\"second\"");
      then
        .status(201)
        .json_body(json!([{ "id": 11 }, { "id": 12 }]));
    })
    .await;

  let now = Utc::now();
  let msgs = [(Role::User, "first"), (Role::Assistant, "second")]
    .into_iter()
    .map(|(role, content)| NewChatMessage {
      session_id: 3,
      role,
      content: content.into(),
      created_at: now,
    })
    .collect();
  let n = Repository::new(store).add_chat_messages(msgs).await.unwrap();

  insert.assert_hits_async(1).await;
  assert_eq!(n, 2);
}

fn conversation() -> NewConversation {
  NewConversation {
    session:  NewChatSession {
      user_id:    4,
      title:      "Pension".into(),
      created_at: Utc::now(),
    },
    messages: vec![
      (Role::User, "Am I eligible?".into()),
      (Role::Assistant, "Yes, from age 60.".into()),
    ],
  }
}

#[tokio::test]
async fn conversation_posts_session_then_messages() {
  let server = MockServer::start_async().await;
  let store = connected(&server).await;
  let session = server
    .mock_async(|when, then| {
      when
        .method(POST)
        .path("/rest/v1/chat_sessions")
        .body_contains("\"Pension\"");
      then.status(201).json_body(json!([{ "id": 9 }]));
    })
    .await;
  let messages = server
    .mock_async(|when, then| {
      when
        .method(POST)
        .path("/rest/v1/chat_messages")
        .body_contains("\"session_id\":9");
      then
        .status(201)
        .json_body(json!([{ "id": 20 }, { "id": 21 }]));
    })
    .await;

  let saved = Repository::new(store).save_conversation(conversation()).await.unwrap();

  session.assert_async().await;
  messages.assert_async().await;
  assert_eq!(saved, (9, 2));
}

#[tokio::test]
async fn failed_messages_remove_the_new_session() {
  let server = MockServer::start_async().await;
  let store = connected(&server).await;
  server
    .mock_async(|when, then| {
      when.method(POST).path("/rest/v1/chat_sessions");
      then.status(201).json_body(json!([{ "id": 9 }]));
    })
    .await;
  server
    .mock_async(|when, then| {
      when.method(POST).path("/rest/v1/chat_messages");
      then
        .status(500)
        .json_body(json!({ "code": "XX000", "message": "boom" }));
    })
    .await;
  let cleanup = server
    .mock_async(|when, then| {
      when
        .method(DELETE)
        .path("/rest/v1/chat_sessions")
        .query_param("id", "eq.9");
      then.status(200).json_body(json!([{ "id": 9 }]));
    })
    .await;

  let err = Repository::new(store)
    .save_conversation(conversation())
    .await
    .unwrap_err();

  cleanup.assert_hits_async(1).await;
  assert!(matches!(err, Error::Status { status: 500, .. }));
}

#[tokio::test]
async fn summaries_carry_the_newest_message() {
  let server = MockServer::start_async().await;
  let store = connected(&server).await;
  server
    .mock_async(|when, then| {
      when
        .method(GET)
        .path("/rest/v1/chat_sessions")
        .query_param("user_id", "eq.4")
        .query_param("order", "updated_at.desc,id.desc")
        .query_param("limit", "50");
      then.status(200).json_body(json!([
        {
          "id": 2,
          "title": "newer",
          "created_at": "2024-05-02T10:00:00+00:00",
          "updated_at": "2024-05-02T10:00:00+00:00"
        },
        {
          "id": 1,
          "title": "older",
          "created_at": "2024-05-01T10:00:00+00:00",
          "updated_at": "2024-05-01T10:00:00+00:00"
        }
      ]));
    })
    .await;
  server
    .mock_async(|when, then| {
      when
        .method(GET)
        .path("/rest/v1/chat_messages")
        .query_param("session_id", "eq.2");
      then.status(200).json_body(json!([{ "content": "latest reply" }]));
    })
    .await;
  server
    .mock_async(|when, then| {
      when
        .method(GET)
        .path("/rest/v1/chat_messages")
        .query_param("session_id", "eq.1");
      then.status(200).json_body(json!([]));
    })
    .await;

  let rows = Repository::new(store).list_chat_sessions(4, 50).await.unwrap();
  assert_eq!(rows.len(), 2);
  assert_eq!(rows[0].title, "newer");
  assert_eq!(rows[0].last_message, "latest reply");
  assert_eq!(rows[1].last_message, "");
}

#[tokio::test]
async fn purge_counts_deleted_rows() {
  let server = MockServer::start_async().await;
  let store = connected(&server).await;
  server
    .mock_async(|when, then| {
      when
        .method(DELETE)
        .path("/rest/v1/sessions")
        .query_param_exists("expires_at");
      then.status(200).json_body(json!([{ "id": 1 }, { "id": 5 }]));
    })
    .await;

  let gone = Repository::new(store)
    .purge_expired_sessions(Utc::now())
    .await
    .unwrap();
  assert_eq!(gone, 2);
}

#[tokio::test]
async fn wrong_call_fails_without_a_request() {
  let server = MockServer::start_async().await;
  let store = connected(&server).await;
  let err = store
    .prepare(Lookup::UserById { id: 1 })
    .run()
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(onegov_core::Error::Unsupported { .. })
  ));
}
