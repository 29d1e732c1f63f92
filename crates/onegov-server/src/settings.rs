//! Runtime configuration, deserialised from `onegov.toml` and `ONEGOV_*`
//! environment variables.

use std::path::PathBuf;

use serde::Deserialize;

/// Environment variable prefix; `ONEGOV_PORT` sets `port`.
pub const ENV_PREFIX: &str = "ONEGOV";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                  String,
  pub port:                  u16,
  /// Directory holding the SQLite database file.
  pub data_dir:              PathBuf,
  pub supabase_url:          Option<String>,
  pub supabase_key:          Option<String>,
  /// Force the volatile in-memory engine.
  pub serverless:            bool,
  /// Fall back to the in-memory engine when the durable one fails to open.
  pub allow_memory_fallback: bool,
  pub gemini_api_key:        Option<String>,
  pub gemini_model:          String,
  pub gemini_base_url:       String,
  /// Conversations kept by the in-process memory before eviction.
  pub memory_capacity:       usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                  "127.0.0.1".to_owned(),
      port:                  3000,
      data_dir:              PathBuf::from("data"),
      supabase_url:          None,
      supabase_key:          None,
      serverless:            false,
      allow_memory_fallback: false,
      gemini_api_key:        None,
      gemini_model:          "gemini-2.0-flash".to_owned(),
      gemini_base_url:       "https://generativelanguage.googleapis.com".to_owned(),
      memory_capacity:       1024,
    }
  }
}

impl ServerConfig {
  /// Both remote credentials, when both are set and non-blank.
  pub fn supabase_credentials(&self) -> Option<(&str, &str)> {
    let url = self.supabase_url.as_deref().map(str::trim);
    let key = self.supabase_key.as_deref().map(str::trim);
    match (url, key) {
      (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Some((url, key)),
      _ => None,
    }
  }

  pub fn gemini_key(&self) -> Option<&str> {
    self
      .gemini_api_key
      .as_deref()
      .map(str::trim)
      .filter(|k| !k.is_empty())
  }
}

/// Layer the optional TOML file under the environment.
pub fn load(path: PathBuf) -> Result<ServerConfig, config::ConfigError> {
  config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    .build()?
    .try_deserialize()
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load(dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg.port, 3000);
    assert_eq!(cfg.gemini_model, "gemini-2.0-flash");
    assert!(cfg.supabase_credentials().is_none());
  }

  #[test]
  fn file_values_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("onegov.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "port = 8080\nserverless = true\nsupabase_url = \"https://x.supabase.co\"").unwrap();

    let cfg = load(path).unwrap();
    assert_eq!(cfg.port, 8080);
    assert!(cfg.serverless);
    // A url without a key is not usable.
    assert!(cfg.supabase_credentials().is_none());
  }

  #[test]
  fn blank_credentials_are_ignored() {
    let cfg = ServerConfig {
      supabase_url: Some("https://x.supabase.co".into()),
      supabase_key: Some("  ".into()),
      gemini_api_key: Some(String::new()),
      ..ServerConfig::default()
    };
    assert!(cfg.supabase_credentials().is_none());
    assert!(cfg.gemini_key().is_none());
  }
}
