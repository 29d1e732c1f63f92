//! JSON HTTP API for the ONEGOV assistant.
//!
//! Exposes an axum [`Router`] backed by any [`StorageEngine`] and any
//! [`Assistant`]. TLS and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", onegov_api::router(state))
//! ```

pub mod auth;
pub mod chat;
pub mod error;
pub mod extract;
pub mod history;
pub mod id;
pub mod memory;
pub mod prompt;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use onegov_core::{Repository, StorageEngine, assistant::Assistant};

pub use error::ApiError;
pub use extract::JsonBody;
pub use memory::ConversationMemory;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct ApiState<S, A> {
  pub repo:      Repository<S>,
  /// `None` when no model credentials are configured; `/chat` then answers
  /// 503.
  pub assistant: Option<Arc<A>>,
  pub memory:    Arc<ConversationMemory>,
}

impl<S: Clone, A> Clone for ApiState<S, A> {
  fn clone(&self) -> Self {
    Self {
      repo:      self.repo.clone(),
      assistant: self.assistant.clone(),
      memory:    self.memory.clone(),
    }
  }
}

impl<S: StorageEngine, A> ApiState<S, A> {
  pub fn new(engine: S, assistant: Option<A>, memory: ConversationMemory) -> Self {
    Self {
      repo:      Repository::new(engine),
      assistant: assistant.map(Arc::new),
      memory:    Arc::new(memory),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn router<S, A>(state: ApiState<S, A>) -> Router<()>
where
  S: StorageEngine + Clone + 'static,
  A: Assistant + 'static,
{
  Router::new()
    // Auth
    .route("/auth/signup", post(auth::signup::<S, A>))
    .route("/auth/login", post(auth::login::<S, A>))
    .route("/auth/verify", post(auth::verify::<S, A>))
    // Chat
    .route("/chat", post(chat::handler::<S, A>))
    .route("/chat/save", post(history::save::<S, A>))
    .route(
      "/chat/history",
      get(history::list::<S, A>).post(history::messages::<S, A>),
    )
    .with_state(state)
}
