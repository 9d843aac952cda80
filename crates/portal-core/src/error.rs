//! Error types for `portal-core`.
//!
//! Everything raised here is a validation failure: it is detected before any
//! storage call and guarantees that nothing was written.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid group name: {0}")]
  InvalidGroupName(String),

  #[error("invalid login: {0}")]
  InvalidLogin(String),

  #[error("password must be at least {min} characters")]
  PasswordTooShort { min: usize },

  #[error("invalid display name: {0}")]
  InvalidDisplayName(String),

  #[error("invalid email address: {0:?}")]
  InvalidEmail(String),

  #[error("invalid phone number: {0:?}")]
  InvalidPhone(String),

  #[error("admission year {0} is out of range")]
  InvalidAdmissionYear(i32),

  #[error("grade {0} is outside the range 1..=5")]
  GradeOutOfRange(i64),

  #[error("invalid date {0:?}: expected YYYY-MM-DD")]
  InvalidDate(String),

  #[error("semester {0} is outside the range 1..=12")]
  InvalidSemester(i64),

  #[error("invalid subject name: {0}")]
  InvalidSubjectName(String),

  #[error("unsupported material file type: {0:?}")]
  UnsupportedFileType(String),

  #[error("a study material must be published to at least one group")]
  NoMaterialGroups,

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// The coarse taxonomy every layer maps its errors onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// A referenced group, account, subject or offering does not exist.
  NotFound,
  /// A uniqueness-bearing insert collided with an existing row.
  Conflict,
  /// Input was rejected before any write.
  Validation,
  /// Storage unreachable or a statement failed. Retryable by the caller.
  Persistence,
}

/// Implemented by every error type that crosses a storage trait boundary.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Serialization(_) => ErrorKind::Persistence,
      _ => ErrorKind::Validation,
    }
  }
}
