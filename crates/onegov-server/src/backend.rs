//! Backend selection and the [`Backend`] engine that dispatches to it.
//!
//! The selection policy is a pure function of configuration so it can be
//! tested for every input; opening the chosen engine is separate.

use std::path::PathBuf;

use onegov_core::{
  StorageEngine, StoreError,
  query::{Listing, Lookup, Mutation, Record, RunOutcome},
};
use onegov_store_memory::MemoryStore;
use onegov_store_remote::RemoteStore;
use onegov_store_sqlite::{DATABASE_FILE, SqliteStore};
use thiserror::Error;

use crate::settings::ServerConfig;

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Which engine the configuration asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
  Remote { url: String, key: String },
  Memory,
  Sqlite { path: PathBuf },
}

/// Remote credentials win; then a serverless context gets the volatile
/// engine; otherwise the embedded file.
pub fn choose(cfg: &ServerConfig, on_vercel: bool) -> Choice {
  if let Some((url, key)) = cfg.supabase_credentials() {
    return Choice::Remote {
      url: url.to_owned(),
      key: key.to_owned(),
    };
  }
  if cfg.serverless || on_vercel {
    return Choice::Memory;
  }
  Choice::Sqlite {
    path: cfg.data_dir.join(DATABASE_FILE),
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// The engine chosen at startup.
#[derive(Clone)]
pub enum Backend {
  Sqlite(SqliteStore),
  Memory(MemoryStore),
  Remote(RemoteStore),
}

#[derive(Debug, Error)]
pub enum BackendError {
  #[error(transparent)]
  Core(#[from] onegov_core::Error),

  #[error(transparent)]
  Sqlite(#[from] onegov_store_sqlite::Error),

  #[error(transparent)]
  Memory(#[from] onegov_store_memory::Error),

  #[error(transparent)]
  Remote(#[from] onegov_store_remote::Error),
}

impl StoreError for BackendError {
  fn is_conflict(&self) -> bool {
    match self {
      BackendError::Core(e) => matches!(e, onegov_core::Error::Conflict(_)),
      BackendError::Sqlite(e) => e.is_conflict(),
      BackendError::Memory(e) => e.is_conflict(),
      BackendError::Remote(e) => e.is_conflict(),
    }
  }
}

impl Backend {
  /// Open the chosen engine. When that fails and `allow_memory_fallback` is
  /// set, log the failure and use the in-memory engine instead.
  pub async fn open(choice: Choice, allow_memory_fallback: bool) -> Result<Self, BackendError> {
    match Self::open_choice(choice).await {
      Ok(backend) => Ok(backend),
      Err(e) if allow_memory_fallback => {
        tracing::error!(error = %e, "storage engine failed to open; falling back to memory");
        Ok(Self::memory())
      }
      Err(e) => Err(e),
    }
  }

  async fn open_choice(choice: Choice) -> Result<Self, BackendError> {
    match choice {
      Choice::Remote { url, key } => Ok(Backend::Remote(RemoteStore::connect(&url, &key).await?)),
      Choice::Sqlite { path } => Ok(Backend::Sqlite(SqliteStore::open(&path).await?)),
      Choice::Memory => Ok(Self::memory()),
    }
  }

  fn memory() -> Self {
    tracing::warn!("using in-memory storage; data will not survive a restart");
    Backend::Memory(MemoryStore::new())
  }
}

impl StorageEngine for Backend {
  type Error = BackendError;

  fn name(&self) -> &'static str {
    match self {
      Backend::Sqlite(s) => s.name(),
      Backend::Memory(s) => s.name(),
      Backend::Remote(s) => s.name(),
    }
  }

  fn is_durable(&self) -> bool {
    match self {
      Backend::Sqlite(s) => s.is_durable(),
      Backend::Memory(s) => s.is_durable(),
      Backend::Remote(s) => s.is_durable(),
    }
  }

  async fn lookup(&self, query: Lookup) -> Result<Option<Record>, BackendError> {
    Ok(match self {
      Backend::Sqlite(s) => s.lookup(query).await?,
      Backend::Memory(s) => s.lookup(query).await?,
      Backend::Remote(s) => s.lookup(query).await?,
    })
  }

  async fn mutate(&self, query: Mutation) -> Result<RunOutcome, BackendError> {
    Ok(match self {
      Backend::Sqlite(s) => s.mutate(query).await?,
      Backend::Memory(s) => s.mutate(query).await?,
      Backend::Remote(s) => s.mutate(query).await?,
    })
  }

  async fn list(&self, query: Listing) -> Result<Vec<Record>, BackendError> {
    Ok(match self {
      Backend::Sqlite(s) => s.list(query).await?,
      Backend::Memory(s) => s.list(query).await?,
      Backend::Remote(s) => s.list(query).await?,
    })
  }
}

#[cfg(test)]
mod tests {
  use onegov_core::{Repository, domain::NewUser};

  use super::*;

  fn cfg(url: Option<&str>, key: Option<&str>, serverless: bool) -> ServerConfig {
    ServerConfig {
      supabase_url: url.map(Into::into),
      supabase_key: key.map(Into::into),
      serverless,
      data_dir: PathBuf::from("/srv/onegov"),
      ..ServerConfig::default()
    }
  }

  #[test]
  fn selection_policy_covers_every_input() {
    let remote = Choice::Remote {
      url: "https://x.supabase.co".into(),
      key: "k".into(),
    };
    let sqlite = Choice::Sqlite {
      path: PathBuf::from("/srv/onegov/users.db"),
    };

    for url in [None, Some("https://x.supabase.co")] {
      for key in [None, Some("k")] {
        for serverless in [false, true] {
          for vercel in [false, true] {
            let got = choose(&cfg(url, key, serverless), vercel);
            let want = if url.is_some() && key.is_some() {
              &remote
            } else if serverless || vercel {
              &Choice::Memory
            } else {
              &sqlite
            };
            assert_eq!(&got, want, "url={url:?} key={key:?} serverless={serverless} vercel={vercel}");
          }
        }
      }
    }
  }

  #[tokio::test]
  async fn sqlite_choice_creates_the_data_directory() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ServerConfig {
      data_dir: dir.path().join("nested/data"),
      ..ServerConfig::default()
    };
    let backend = Backend::open(choose(&cfg, false), false).await.unwrap();
    assert_eq!(backend.name(), "sqlite");
    assert!(dir.path().join("nested/data").join(DATABASE_FILE).exists());
  }

  #[tokio::test]
  async fn unreachable_remote_fails_or_falls_back() {
    // Nothing listens on port 9 locally.
    let choice = Choice::Remote {
      url: "http://127.0.0.1:9".into(),
      key: "k".into(),
    };
    assert!(Backend::open(choice.clone(), false).await.is_err());

    let backend = Backend::open(choice, true).await.unwrap();
    assert_eq!(backend.name(), "memory");
    assert!(!backend.is_durable());
  }

  #[tokio::test]
  async fn conflicts_survive_dispatch() {
    let repo = Repository::new(Backend::Memory(MemoryStore::new()));
    repo
      .create_user(NewUser::new("A", "a@x.com", "phc".into()))
      .await
      .unwrap();
    let err = repo
      .create_user(NewUser::new("B", "A@X.com", "phc".into()))
      .await
      .unwrap_err();
    assert!(err.is_conflict());
  }
}
