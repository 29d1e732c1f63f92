//! Tests for `MemoryStore`.

use chrono::{Duration, Utc};
use onegov_core::{
  Repository, StorageEngine, StoreError,
  domain::{
    NewChatMessage, NewChatSession, NewConversation, NewQaPair, NewSession,
    NewUser, Role,
  },
  query::Listing,
};

use crate::MemoryStore;

fn repo() -> Repository<MemoryStore> { Repository::new(MemoryStore::new()) }

#[tokio::test]
async fn users_are_found_by_normalised_email() {
  let r = repo();
  let id = r
    .create_user(NewUser::new("A", "A@X.com ", "phc".into()))
    .await
    .unwrap();
  let u = r.find_user_by_email("a@x.com").await.unwrap().unwrap();
  assert_eq!(u.id, id);
  assert_eq!(u.email, "a@x.com");
  assert!(r.find_user_by_id(id + 100).await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_duplicate_signups_admit_exactly_one() {
  let r = repo();
  let mut handles = Vec::new();
  for i in 0..8 {
    let r = r.clone();
    handles.push(tokio::spawn(async move {
      r.create_user(NewUser::new(&format!("u{i}"), " Same@X.com", "phc".into()))
        .await
    }));
  }

  let mut ok = 0;
  for h in handles {
    match h.await.unwrap() {
      Ok(_) => ok += 1,
      Err(e) => assert!(e.is_conflict(), "unexpected error: {e}"),
    }
  }
  assert_eq!(ok, 1);
}

#[tokio::test]
async fn sessions_expire_and_are_purged() {
  let r = repo();
  let uid = r
    .create_user(NewUser::new("A", "a@x.com", "phc".into()))
    .await
    .unwrap();
  let now = Utc::now();
  r.create_session(NewSession::starting_at(uid, "live".into(), now))
    .await
    .unwrap();
  r.create_session(NewSession::starting_at(uid, "dead".into(), now - Duration::days(30)))
    .await
    .unwrap();

  assert!(r.find_live_session("dead", now).await.unwrap().is_none());
  let live = r.find_live_session("live", now).await.unwrap().unwrap();
  assert_eq!(live.user.name, "A");

  assert_eq!(r.purge_expired_sessions(now).await.unwrap(), 1);
  assert_eq!(r.purge_expired_sessions(now).await.unwrap(), 0);
  assert!(
    r.find_live_session("live", now + Duration::days(8))
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn chat_history_round_trip_keeps_order() {
  let r = repo();
  let now = Utc::now();
  let older = r
    .create_chat_session(NewChatSession {
      user_id:    7,
      title:      "older".into(),
      created_at: now - Duration::hours(1),
    })
    .await
    .unwrap();
  let newer = r
    .create_chat_session(NewChatSession {
      user_id:    7,
      title:      "newer".into(),
      created_at: now,
    })
    .await
    .unwrap();

  let msgs = ["one", "two", "three", "four"]
    .iter()
    .enumerate()
    .map(|(i, c)| NewChatMessage {
      session_id: newer,
      role:       if i % 2 == 0 { Role::User } else { Role::Assistant },
      content:    (*c).into(),
      created_at: now,
    })
    .collect();
  assert_eq!(r.add_chat_messages(msgs).await.unwrap(), 4);

  let listed = r.list_chat_messages(newer).await.unwrap();
  let contents: Vec<_> = listed.iter().map(|m| m.content.as_str()).collect();
  assert_eq!(contents, ["one", "two", "three", "four"]);
  assert!(r.list_chat_messages(older).await.unwrap().is_empty());

  let summaries = r.list_chat_sessions(7, 50).await.unwrap();
  assert_eq!(summaries.len(), 2);
  assert_eq!(summaries[0].id, newer);
  assert_eq!(summaries[0].last_message, "four");
  assert_eq!(summaries[1].last_message, "");
}

#[tokio::test]
async fn saved_conversation_is_listed_with_its_messages() {
  let r = repo();
  let at = Utc::now();
  let (sid, stored) = r
    .save_conversation(NewConversation {
      session:  NewChatSession {
        user_id:    3,
        title:      "Ration card".into(),
        created_at: at,
      },
      messages: vec![
        (Role::User, "Where do I apply?".into()),
        (Role::Assistant, "At the district office.".into()),
      ],
    })
    .await
    .unwrap();
  assert_eq!(stored, 2);

  let listed = r.list_chat_messages(sid).await.unwrap();
  assert!(listed.iter().all(|m| m.session_id == sid && m.created_at == at));
  assert_eq!(listed[1].role, Role::Assistant);
  let summaries = r.list_chat_sessions(3, 50).await.unwrap();
  assert_eq!(summaries[0].last_message, "At the district office.");
}

#[tokio::test]
async fn listing_is_capped() {
  let s = MemoryStore::new();
  let r = Repository::new(s.clone());
  for i in 0..60 {
    r.create_chat_session(NewChatSession {
      user_id:    1,
      title:      format!("t{i}"),
      created_at: Utc::now(),
    })
    .await
    .unwrap();
  }
  let rows = s
    .prepare(Listing::ChatSessionsForUser {
      user_id: 1,
      limit:   onegov_core::query::DEFAULT_HISTORY_LIMIT,
    })
    .all()
    .await
    .unwrap();
  assert_eq!(rows.len(), 50);
}

#[tokio::test]
async fn clones_share_tables_and_log_qa_pairs() {
  let s = MemoryStore::new();
  let r = Repository::new(s.clone());
  r.log_qa_pair(NewQaPair {
    user_id:    None,
    question:   "q".into(),
    answer:     "a".into(),
    persona:    None,
    state:      None,
    language:   "hi".into(),
    created_at: Utc::now(),
  })
  .await
  .unwrap();
  assert_eq!(s.qa_pair_count().await, 1);
  assert!(!s.is_durable());
}
