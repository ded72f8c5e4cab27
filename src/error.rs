//! Error types for the Higgla client SDK.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  #[error("Invalid argument: {0}")]
  InvalidArgument(String),

  #[error("Connection error: {0}")]
  Connection(String),

  #[error("Protocol error: {0}")]
  Protocol(String),

  #[error("Server error: {0}")]
  Server(String),

  #[error("Expected revision {expected_revision} of box '{id}'")]
  VersionConflict { id: String, expected_revision: u64 },

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Serialization error: {0}")]
  Serialization(String),
}

impl Error {
  /// True for every error reported by the server itself, conflicts included.
  pub fn is_server_error(&self) -> bool {
    matches!(self, Self::Server(_) | Self::VersionConflict { .. })
  }

  pub(crate) fn invalid(msg: impl Into<String>) -> Self {
    Self::InvalidArgument(msg.into())
  }

  pub(crate) fn protocol(msg: impl Into<String>) -> Self {
    Self::Protocol(msg.into())
  }
}

impl From<serde_json::Error> for Error {
  fn from(e: serde_json::Error) -> Self {
    Self::Serialization(e.to_string())
  }
}

pub type Result<T> = std::result::Result<T, Error>;
