//! The `Assistant` port: whatever turns a prompt into an answer.

use std::future::Future;

/// A fully rendered request for the language model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
  /// Standing instructions: persona, language, formatting rules.
  pub system: String,
  /// Conversation context followed by the current question.
  pub user:   String,
}

/// A generative backend that answers prompts.
pub trait Assistant: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Produce the reply text for `prompt`.
  fn generate<'a>(
    &'a self,
    prompt: &'a Prompt,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;
}
