//! Record ids as clients send them: JSON numbers or numeric strings.

use std::fmt;

use serde::Deserialize;

use crate::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Id {
  Number(i64),
  Text(String),
}

impl Id {
  /// The numeric value, if there is one.
  pub fn value(&self) -> Option<i64> {
    match self {
      Id::Number(n) => Some(*n),
      Id::Text(s) => s.trim().parse().ok(),
    }
  }

  fn is_blank(&self) -> bool { matches!(self, Id::Text(s) if s.trim().is_empty()) }
}

impl fmt::Display for Id {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Id::Number(n) => write!(f, "{n}"),
      Id::Text(s) => f.write_str(s.trim()),
    }
  }
}

/// A present, non-blank id, or `None`.
pub fn present(id: Option<&Id>) -> Option<&Id> { id.filter(|id| !id.is_blank()) }

/// Resolve a required id field, rejecting non-numeric values.
pub fn parse_required(id: &Id, field: &str) -> Result<i64, ApiError> {
  id.value()
    .ok_or_else(|| ApiError::BadRequest(format!("{field} must be a number.")))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn numbers_and_numeric_strings_are_accepted() {
    let n: Id = serde_json::from_str("42").unwrap();
    let s: Id = serde_json::from_str("\" 42 \"").unwrap();
    assert_eq!(n.value(), Some(42));
    assert_eq!(s.value(), Some(42));
    assert_eq!(s.to_string(), "42");
  }

  #[test]
  fn blank_and_garbage_ids() {
    let blank = Id::Text("  ".into());
    assert!(present(Some(&blank)).is_none());
    let junk = Id::Text("abc".into());
    assert!(matches!(
      parse_required(&junk, "userId"),
      Err(ApiError::BadRequest(_))
    ));
  }
}
