//! Handlers for `/auth` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/signup` | Body: `{"name","email","password"}`; 201 on success |
//! | `POST` | `/auth/login`  | Body: `{"email","password"}`; returns a bearer token |
//! | `POST` | `/auth/verify` | Body `{"token"}` or `Authorization: Bearer` |

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{
  Json,
  body::Bytes,
  extract::State,
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use chrono::Utc;
use onegov_core::{
  StorageEngine, StoreError,
  assistant::Assistant,
  domain::{NewSession, NewUser, UserProfile},
};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{ApiError, ApiState, JsonBody};

pub const MIN_PASSWORD_LEN: usize = 6;

const INVALID_CREDENTIALS: &str = "Invalid email or password.";
const EMAIL_TAKEN: &str = "User with this email already exists.";

// ─── Credentials ─────────────────────────────────────────────────────────────

/// Argon2id PHC string for `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| ApiError::Internal(format!("argon2 error: {e}")))
}

/// `false` for a wrong password and for an unparseable stored hash alike.
pub fn verify_password(password: &str, phc: &str) -> bool {
  PasswordHash::new(phc)
    .map(|parsed| {
      Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
    })
    .unwrap_or(false)
}

/// 32 random bytes, hex encoded.
pub fn new_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

/// Argon2 is deliberately slow; keep it off the async workers.
async fn blocking<T: Send + 'static>(
  f: impl FnOnce() -> T + Send + 'static,
) -> Result<T, ApiError> {
  tokio::task::spawn_blocking(f)
    .await
    .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))
}

fn non_blank(s: Option<String>) -> Option<String> {
  s.filter(|s| !s.trim().is_empty())
}

/// Passwords are taken as typed; only the length rule judges their content.
fn non_empty(s: Option<String>) -> Option<String> { s.filter(|s| !s.is_empty()) }

// ─── Signup ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SignupBody {
  pub name:     Option<String>,
  pub email:    Option<String>,
  pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
  pub message: &'static str,
  pub user_id: i64,
  pub user:    UserProfile,
}

/// `POST /auth/signup`
pub async fn signup<S, A>(
  State(state): State<ApiState<S, A>>,
  JsonBody(body): JsonBody<SignupBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: StorageEngine,
  A: Assistant,
{
  let (Some(name), Some(email), Some(password)) = (
    non_blank(body.name),
    non_blank(body.email),
    non_empty(body.password),
  ) else {
    return Err(ApiError::BadRequest(
      "Name, email, and password are required.".into(),
    ));
  };
  if password.chars().count() < MIN_PASSWORD_LEN {
    return Err(ApiError::BadRequest(format!(
      "Password must be at least {MIN_PASSWORD_LEN} characters."
    )));
  }

  let repo = &state.repo;
  if repo
    .find_user_by_email(&email)
    .await
    .map_err(ApiError::store)?
    .is_some()
  {
    return Err(ApiError::BadRequest(EMAIL_TAKEN.into()));
  }

  let hash = blocking(move || hash_password(&password)).await??;
  let new = NewUser::new(&name, &email, hash);
  let profile = UserProfile {
    id:    0,
    name:  new.name.clone(),
    email: new.email.clone(),
  };

  // A concurrent signup can win between the check and the insert.
  let id = match repo.create_user(new).await {
    Ok(id) => id,
    Err(e) if e.is_conflict() => {
      return Err(ApiError::BadRequest(EMAIL_TAKEN.into()));
    }
    Err(e) => return Err(ApiError::store(e)),
  };
  tracing::info!(user_id = id, "user created");

  Ok((
    StatusCode::CREATED,
    Json(SignupResponse {
      message: "User created successfully",
      user_id: id,
      user:    UserProfile { id, ..profile },
    }),
  ))
}

// ─── Login ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub email:    Option<String>,
  pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
  pub message: &'static str,
  pub token:   String,
  pub user:    UserProfile,
}

/// `POST /auth/login`
pub async fn login<S, A>(
  State(state): State<ApiState<S, A>>,
  JsonBody(body): JsonBody<LoginBody>,
) -> Result<Json<LoginResponse>, ApiError>
where
  S: StorageEngine,
  A: Assistant,
{
  let (Some(email), Some(password)) =
    (non_blank(body.email), non_empty(body.password))
  else {
    return Err(ApiError::BadRequest(
      "Email and password are required.".into(),
    ));
  };

  let repo = &state.repo;
  let Some(user) = repo
    .find_user_by_email(&email)
    .await
    .map_err(ApiError::store)?
  else {
    return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
  };

  let phc = user.password_hash.clone();
  if !blocking(move || verify_password(&password, &phc)).await? {
    return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
  }

  let now = Utc::now();
  let token = new_token();
  repo
    .create_session(NewSession::starting_at(user.id, token.clone(), now))
    .await
    .map_err(ApiError::store)?;

  match repo.purge_expired_sessions(now).await {
    Ok(0) => {}
    Ok(n) => tracing::debug!(purged = n, "expired sessions removed"),
    Err(e) => tracing::warn!(error = %e, "failed to purge expired sessions"),
  }
  tracing::info!(user_id = user.id, "login succeeded");

  Ok(Json(LoginResponse {
    message: "Login successful",
    token,
    user: user.profile(),
  }))
}

// ─── Verify ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct VerifyBody {
  pub token: Option<String>,
}

/// The token from the JSON body, falling back to a bearer header.
fn presented_token(headers: &HeaderMap, body: &[u8]) -> Option<String> {
  let from_body = serde_json::from_slice::<VerifyBody>(body)
    .unwrap_or_default()
    .token;
  non_blank(from_body).or_else(|| {
    headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.strip_prefix("Bearer "))
      .map(|t| t.trim().to_owned())
      .filter(|t| !t.is_empty())
  })
}

/// `POST /auth/verify`
///
/// Always answers `{valid: bool, ...}` rather than the usual `{error}` shape.
pub async fn verify<S, A>(
  State(state): State<ApiState<S, A>>,
  headers: HeaderMap,
  body: Bytes,
) -> Response
where
  S: StorageEngine,
  A: Assistant,
{
  let invalid = (StatusCode::UNAUTHORIZED, Json(json!({ "valid": false })));

  let Some(token) = presented_token(&headers, &body) else {
    return invalid.into_response();
  };

  match state.repo.find_live_session(&token, Utc::now()).await {
    Ok(Some(found)) => {
      Json(json!({ "valid": true, "user": found.user })).into_response()
    }
    Ok(None) => invalid.into_response(),
    Err(e) => {
      tracing::error!(error = %e, "session lookup failed");
      (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "valid": false })),
      )
        .into_response()
    }
  }
}
