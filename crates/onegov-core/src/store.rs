//! The `StorageEngine` port and the prepared-statement call contract.
//!
//! The trait is implemented by the storage backends (`onegov-store-sqlite`,
//! `onegov-store-memory`, `onegov-store-remote`). Request handlers only ever
//! see `prepare(query)` followed by `get()`, `run()` or `all()`, and every
//! one of those is awaited, whichever engine is behind it.

use std::future::Future;

use crate::{
  Error,
  query::{Call, Listing, Lookup, Mutation, Query, Record, RunOutcome},
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Engine error types expose the one classification callers act on.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// `true` when a unique constraint rejected the statement.
  fn is_conflict(&self) -> bool;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a backing engine.
///
/// Engines implement one method per intent group and must handle every
/// variant of that group. The group-to-call routing and the loud failure for
/// a mismatched call live in [`Statement`], so no engine can get it wrong.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait StorageEngine: Send + Sync {
  type Error: StoreError + From<Error>;

  /// Short engine name for logs.
  fn name(&self) -> &'static str;

  /// Whether data survives a process restart.
  fn is_durable(&self) -> bool;

  /// Answer a single-record read. `None` means not found.
  fn lookup(
    &self,
    query: Lookup,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + '_;

  /// Apply one mutation.
  fn mutate(
    &self,
    query: Mutation,
  ) -> impl Future<Output = Result<RunOutcome, Self::Error>> + Send + '_;

  /// Answer a multi-record read, ordered as the listing documents.
  fn list(
    &self,
    query: Listing,
  ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send + '_;

  /// Bind a query to this engine.
  fn prepare(&self, query: impl Into<Query>) -> Statement<'_, Self>
  where
    Self: Sized,
  {
    Statement {
      engine: self,
      query:  query.into(),
    }
  }
}

// ─── Statement ───────────────────────────────────────────────────────────────

/// A query bound to an engine, waiting for one of its three calls.
pub struct Statement<'a, E> {
  engine: &'a E,
  query:  Query,
}

impl<E: StorageEngine> Statement<'_, E> {
  pub fn query(&self) -> &Query { &self.query }

  /// At most one record, or `None` when nothing matches.
  pub async fn get(self) -> Result<Option<Record>, E::Error> {
    match self.query {
      Query::Lookup(l) => self.engine.lookup(l).await,
      other => Err(unsupported(Call::Get, &other).into()),
    }
  }

  /// A single mutation.
  pub async fn run(self) -> Result<RunOutcome, E::Error> {
    match self.query {
      Query::Mutation(m) => self.engine.mutate(m).await,
      other => Err(unsupported(Call::Run, &other).into()),
    }
  }

  /// Every matching record.
  pub async fn all(self) -> Result<Vec<Record>, E::Error> {
    match self.query {
      Query::Listing(l) => self.engine.list(l).await,
      other => Err(unsupported(Call::All, &other).into()),
    }
  }
}

fn unsupported(call: Call, query: &Query) -> Error {
  Error::Unsupported {
    call,
    kind: query.kind(),
    query: query.name(),
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::query::QueryKind;

  #[derive(Debug, thiserror::Error)]
  #[error(transparent)]
  struct FakeError(#[from] Error);

  impl StoreError for FakeError {
    fn is_conflict(&self) -> bool { matches!(self.0, Error::Conflict(_)) }
  }

  /// Answers every call with an empty result.
  struct EmptyEngine;

  impl StorageEngine for EmptyEngine {
    type Error = FakeError;

    fn name(&self) -> &'static str { "empty" }

    fn is_durable(&self) -> bool { false }

    async fn lookup(&self, _: Lookup) -> Result<Option<Record>, FakeError> {
      Ok(None)
    }

    async fn mutate(&self, _: Mutation) -> Result<RunOutcome, FakeError> {
      Ok(RunOutcome::changed(0))
    }

    async fn list(&self, _: Listing) -> Result<Vec<Record>, FakeError> {
      Ok(Vec::new())
    }
  }

  #[tokio::test]
  async fn matching_calls_reach_the_engine() {
    let e = EmptyEngine;
    let got = e
      .prepare(Lookup::UserById { id: 1 })
      .get()
      .await
      .unwrap();
    assert!(got.is_none());

    let ran = e
      .prepare(Mutation::DeleteExpiredSessions { now: Utc::now() })
      .run()
      .await
      .unwrap();
    assert_eq!(ran.changes, 0);

    let listed = e
      .prepare(Listing::MessagesForChatSession { session_id: 1 })
      .all()
      .await
      .unwrap();
    assert!(listed.is_empty());
  }

  #[tokio::test]
  async fn get_on_a_mutation_fails_loudly() {
    let e = EmptyEngine;
    let err = e
      .prepare(Mutation::DeleteExpiredSessions { now: Utc::now() })
      .get()
      .await
      .unwrap_err();
    match err.0 {
      Error::Unsupported { call, kind, query } => {
        assert_eq!(call, Call::Get);
        assert_eq!(kind, QueryKind::Mutation);
        assert_eq!(query, "DeleteExpiredSessions");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn run_on_a_lookup_and_all_on_a_mutation_fail() {
    let e = EmptyEngine;
    assert!(
      e.prepare(Lookup::UserById { id: 1 })
        .run()
        .await
        .is_err()
    );
    assert!(
      e.prepare(Mutation::InsertChatMessages(Vec::new()))
        .all()
        .await
        .is_err()
    );
  }
}
