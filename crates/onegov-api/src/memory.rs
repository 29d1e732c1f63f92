//! Per-process conversation memory.
//!
//! Recent turns are kept per conversation key (the caller's user id, or
//! [`ANONYMOUS_KEY`]) in an LRU cache, so idle conversations are evicted
//! once capacity is reached. Nothing here is persisted.

use std::{collections::VecDeque, num::NonZeroUsize};

use lru::LruCache;
use onegov_core::domain::Role;
use tokio::sync::Mutex;

/// Key shared by every caller that does not send a user id.
pub const ANONYMOUS_KEY: &str = "default";

/// Turns retained per conversation.
pub const MAX_TURNS: usize = 20;

/// Turns rendered into a prompt.
pub const CONTEXT_TURNS: usize = 10;

/// Characters of the new message compared against earlier questions.
const SIMILARITY_PREFIX: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
  pub role:    Role,
  pub content: String,
}

/// Bounded, least-recently-used map of conversation key to recent turns.
pub struct ConversationMemory {
  conversations: Mutex<LruCache<String, VecDeque<Turn>>>,
}

impl ConversationMemory {
  /// A zero capacity is treated as one.
  pub fn new(capacity: usize) -> Self {
    let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
    Self {
      conversations: Mutex::new(LruCache::new(capacity)),
    }
  }

  /// The retained turns for `key`, oldest first.
  pub async fn recall(&self, key: &str) -> Vec<Turn> {
    let mut conversations = self.conversations.lock().await;
    conversations
      .get(key)
      .map(|turns| turns.iter().cloned().collect())
      .unwrap_or_default()
  }

  /// Append a question and its answer, dropping the oldest turns beyond
  /// [`MAX_TURNS`].
  pub async fn record(&self, key: &str, question: &str, answer: &str) {
    let mut conversations = self.conversations.lock().await;
    let turns = conversations.get_or_insert_mut(key.to_owned(), VecDeque::new);
    turns.push_back(Turn {
      role:    Role::User,
      content: question.to_owned(),
    });
    turns.push_back(Turn {
      role:    Role::Assistant,
      content: answer.to_owned(),
    });
    while turns.len() > MAX_TURNS {
      turns.pop_front();
    }
  }

  pub async fn len(&self) -> usize { self.conversations.lock().await.len() }

  pub async fn is_empty(&self) -> bool { self.len().await == 0 }
}

/// The last [`CONTEXT_TURNS`] turns as `ROLE: content` lines.
pub fn render_context(turns: &[Turn]) -> String {
  let skip = turns.len().saturating_sub(CONTEXT_TURNS);
  turns[skip..]
    .iter()
    .map(|t| format!("{}: {}", t.role.as_str().to_uppercase(), t.content))
    .collect::<Vec<_>>()
    .join("\n")
}

/// Whether an earlier user turn contains the opening of `message`,
/// compared case-insensitively.
pub fn asked_before(turns: &[Turn], message: &str) -> bool {
  let prefix: String = message
    .to_lowercase()
    .chars()
    .take(SIMILARITY_PREFIX)
    .collect();
  turns
    .iter()
    .filter(|t| t.role == Role::User)
    .any(|t| t.content.to_lowercase().contains(&prefix))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn turn(role: Role, content: &str) -> Turn {
    Turn {
      role,
      content: content.to_owned(),
    }
  }

  #[tokio::test]
  async fn keeps_only_the_most_recent_turns() {
    let memory = ConversationMemory::new(4);
    for i in 0..15 {
      memory.record("7", &format!("q{i}"), &format!("a{i}")).await;
    }
    let turns = memory.recall("7").await;
    assert_eq!(turns.len(), MAX_TURNS);
    assert_eq!(turns[0], turn(Role::User, "q5"));
    assert_eq!(turns[MAX_TURNS - 1], turn(Role::Assistant, "a14"));
  }

  #[tokio::test]
  async fn least_recently_used_conversation_is_evicted() {
    let memory = ConversationMemory::new(2);
    memory.record("a", "q", "r").await;
    memory.record("b", "q", "r").await;
    // Touch "a" so "b" is the eviction candidate.
    assert_eq!(memory.recall("a").await.len(), 2);
    memory.record("c", "q", "r").await;

    assert_eq!(memory.len().await, 2);
    assert!(memory.recall("b").await.is_empty());
    assert_eq!(memory.recall("a").await.len(), 2);
  }

  #[test]
  fn context_renders_last_ten_turns() {
    let turns: Vec<Turn> = (0..12)
      .map(|i| {
        let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
        turn(role, &format!("m{i}"))
      })
      .collect();
    let rendered = render_context(&turns);
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines.len(), CONTEXT_TURNS);
    assert_eq!(lines[0], "USER: m2");
    assert_eq!(lines[9], "ASSISTANT: m11");
    assert_eq!(render_context(&[]), "");
  }

  #[test]
  fn similar_question_matches_on_prefix_of_user_turns() {
    let turns = vec![
      turn(Role::User, "Tell me about PM Kisan Samman Nidhi please"),
      turn(Role::Assistant, "What documents are needed for the scheme"),
    ];
    assert!(asked_before(&turns, "tell me about pm kisan eligibility"));
    assert!(!asked_before(&turns, "What documents are needed for the scheme"));
    assert!(!asked_before(&[], "anything"));
  }
}
