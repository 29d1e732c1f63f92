//! [`Gemini`] — the Google Generative Language implementation of
//! [`Assistant`].

use std::{future::Future, time::Duration};

use onegov_core::assistant::{Assistant, Prompt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum GeminiError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("gemini returned {status}: {body}")]
  Status { status: u16, body: String },

  #[error("gemini returned no text")]
  Empty,
}

/// Client for `models/{model}:generateContent`.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct Gemini {
  client:   Client,
  base_url: String,
  model:    String,
  api_key:  String,
}

impl Gemini {
  pub fn new(api_key: &str, model: &str, base_url: &str) -> Result<Self, GeminiError> {
    let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    Ok(Self {
      client,
      base_url: base_url.trim_end_matches('/').to_owned(),
      model: model.to_owned(),
      api_key: api_key.to_owned(),
    })
  }

  fn url(&self) -> String {
    format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
  }

  async fn call(&self, prompt: &Prompt) -> Result<String, GeminiError> {
    let body = GenerateRequest {
      system_instruction: Content {
        role:  None,
        parts: vec![Part { text: prompt.system.clone() }],
      },
      contents:           vec![Content {
        role:  Some("user"),
        parts: vec![Part { text: prompt.user.clone() }],
      }],
    };

    let resp = self
      .client
      .post(self.url())
      .header("x-goog-api-key", &self.api_key)
      .json(&body)
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(GeminiError::Status {
        status: status.as_u16(),
        body,
      });
    }

    let parsed: GenerateResponse = resp.json().await?;
    let text: String = parsed
      .candidates
      .into_iter()
      .next()
      .and_then(|c| c.content)
      .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
      .unwrap_or_default();

    if text.trim().is_empty() {
      return Err(GeminiError::Empty);
    }
    Ok(text)
  }
}

impl Assistant for Gemini {
  type Error = GeminiError;

  fn generate<'a>(
    &'a self,
    prompt: &'a Prompt,
  ) -> impl Future<Output = Result<String, GeminiError>> + Send + 'a {
    self.call(prompt)
  }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
  system_instruction: Content,
  contents:           Vec<Content>,
}

#[derive(Serialize)]
struct Content {
  #[serde(skip_serializing_if = "Option::is_none")]
  role:  Option<&'static str>,
  parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
  text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
  content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
  #[serde(default)]
  parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
  text: Option<String>,
}

#[cfg(test)]
mod tests {
  use httpmock::prelude::*;
  use serde_json::json;

  use super::*;

  const PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

  fn prompt() -> Prompt {
    Prompt {
      system: "be kind".into(),
      user:   "USER: hello".into(),
    }
  }

  #[tokio::test]
  async fn sends_system_and_user_text_and_joins_parts() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when
          .method(POST)
          .path(PATH)
          .header("x-goog-api-key", "key")
          .json_body(json!({
            "systemInstruction": { "parts": [{ "text": "be kind" }] },
            "contents": [{ "role": "user", "parts": [{ "text": "USER: hello" }] }]
          }));
        then.status(200).json_body(json!({
          "candidates": [{
            "content": { "parts": [{ "text": "Namaste! " }, { "text": "How can I help?" }] }
          }]
        }));
      })
      .await;

    let gemini = Gemini::new("key", "gemini-2.0-flash", &server.base_url()).unwrap();
    let reply = gemini.generate(&prompt()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(reply, "Namaste! How can I help?");
  }

  #[tokio::test]
  async fn error_status_is_reported() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(POST).path(PATH);
        then.status(403).body("API key not valid");
      })
      .await;

    let gemini = Gemini::new("bad", "gemini-2.0-flash", &server.base_url()).unwrap();
    match gemini.generate(&prompt()).await {
      Err(GeminiError::Status { status, body }) => {
        assert_eq!(status, 403);
        assert_eq!(body, "API key not valid");
      }
      other => panic!("unexpected result: {other:?}"),
    }
  }

  #[tokio::test]
  async fn no_candidates_is_an_error() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(POST).path(PATH);
        then.status(200).json_body(json!({ "candidates": [] }));
      })
      .await;

    let gemini = Gemini::new("key", "gemini-2.0-flash", &server.base_url()).unwrap();
    assert!(matches!(
      gemini.generate(&prompt()).await,
      Err(GeminiError::Empty)
    ));
  }
}
