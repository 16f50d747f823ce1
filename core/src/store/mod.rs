use thiserror::Error;

use crate::models::{Node, Scalar};

pub mod key_codec;
mod sqlite;
pub mod structured_clone;

pub use self::sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("not found: {0}")]
  NotFound(String),
  #[error("cannot open {path}: {reason}")]
  Open { path: String, reason: String },
  #[error("decode error for key {key}: {reason}")]
  Decode { key: String, reason: String },
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
  pub(crate) fn decode(key: &Scalar, reason: impl Into<String>) -> Self {
    StoreError::Decode {
      key: key.to_string(),
      reason: reason.into(),
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, StoreError::NotFound(_))
  }
}

/// An open key/value store the lazy view reads through.
pub trait RecordStore {
  /// Keys in the store's natural order, without touching any value.
  fn list_keys(&self) -> Result<Vec<Scalar>, StoreError>;

  /// Decode the single record stored under `key`.
  fn decode(&self, key: &Scalar) -> Result<Node, StoreError>;
}

impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
  fn list_keys(&self) -> Result<Vec<Scalar>, StoreError> {
    (**self).list_keys()
  }

  fn decode(&self, key: &Scalar) -> Result<Node, StoreError> {
    (**self).decode(key)
  }
}
