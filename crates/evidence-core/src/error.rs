//! Error types for `evidence-core`.

use thiserror::Error;

/// The kind of record an [`Error::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
  Study,
  Claim,
  Link,
}

#[derive(Debug, Error)]
pub enum Error {
  /// One or more records are malformed. Batch operations list every offending
  /// record here rather than stopping at the first.
  #[error("validation failed: {}", .0.join("; "))]
  Validation(Vec<String>),

  #[error("{kind} not found: {id}")]
  NotFound { kind: EntityKind, id: String },

  #[error("conflict: {0}")]
  Conflict(String),

  /// A vocabulary tag with no evidence links at all.
  #[error("claim {0} has no evidence links")]
  EmptyClaim(String),

  /// The link table references something it should not. Always a bug in
  /// write-time enforcement, never a normal runtime condition.
  #[error("referential integrity violation: {0}")]
  Integrity(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn invalid(message: impl Into<String>) -> Self {
    Self::Validation(vec![message.into()])
  }

  pub fn study_not_found(id: impl ToString) -> Self {
    Self::NotFound { kind: EntityKind::Study, id: id.to_string() }
  }

  pub fn claim_not_found(tag: impl ToString) -> Self {
    Self::NotFound { kind: EntityKind::Claim, id: tag.to_string() }
  }

  pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound { .. }) }

  pub fn is_conflict(&self) -> bool { matches!(self, Self::Conflict(_)) }

  pub fn is_validation(&self) -> bool { matches!(self, Self::Validation(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
