//! Error type for the portal facade.

use portal_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Unknown login, wrong password, or an account without a credential.
  /// Deliberately does not say which.
  #[error("invalid login or password")]
  InvalidCredentials,

  /// The caller's role or identity does not allow the operation.
  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error(transparent)]
  Core(#[from] portal_core::Error),

  #[error("storage error: {source}")]
  Store {
    kind:   ErrorKind,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("credential hashing failed: {0}")]
  Hash(String),

  #[error("material file error: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Wrap a storage error, keeping its classification.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Classify + Send + Sync + 'static,
  {
    Self::Store { kind: e.kind(), source: Box::new(e) }
  }

  /// Storage-level classification. `None` for authentication and capability
  /// failures, which have no storage counterpart.
  pub fn kind(&self) -> Option<ErrorKind> {
    match self {
      Self::InvalidCredentials | Self::Forbidden(_) => None,
      Self::NotFound(_) => Some(ErrorKind::NotFound),
      Self::Core(e) => Some(e.kind()),
      Self::Store { kind, .. } => Some(*kind),
      Self::Hash(_) | Self::Io(_) => Some(ErrorKind::Persistence),
    }
  }
}
