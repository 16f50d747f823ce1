use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use crate::{
  models::{Node, Scalar},
  store::{
    key_codec::{decode_key, encode_key},
    structured_clone::read_structured_clone,
    RecordStore, StoreError,
  },
};

/// One object store of an IndexedDB database file, opened read-only.
///
/// The connection is closed when the store is dropped.
pub struct SqliteStore {
  conn: Connection,
  path: PathBuf,
  object_store_id: i64,
}

impl SqliteStore {
  /// Open `path` and select `object_store` by name (default: lowest id).
  pub fn open(path: &Path, object_store: Option<&str>) -> Result<Self, StoreError> {
    if !path.is_file() {
      return Err(StoreError::NotFound(path.display().to_string()));
    }
    let open_err = |reason: String| StoreError::Open {
      path: path.display().to_string(),
      reason,
    };

    let conn = Connection::open_with_flags(
      path,
      OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| open_err(e.to_string()))?;

    let object_store_id = match object_store {
      Some(name) => conn
        .query_row(
          "SELECT id FROM object_store WHERE name=?1",
          params![name],
          |row| row.get::<_, i64>(0),
        )
        .optional()
        .map_err(|e| open_err(format!("not an IndexedDB database ({e})")))?
        .ok_or_else(|| StoreError::NotFound(format!("object store {name:?}")))?,
      None => conn
        .query_row("SELECT id FROM object_store ORDER BY id LIMIT 1", [], |row| {
          row.get::<_, i64>(0)
        })
        .optional()
        .map_err(|e| open_err(format!("not an IndexedDB database ({e})")))?
        .ok_or_else(|| open_err("database has no object stores".into()))?,
    };
    tracing::debug!(path = %path.display(), object_store_id, "opened store");

    Ok(Self {
      conn,
      path: path.to_path_buf(),
      object_store_id,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Names of every object store in the database, by id.
  pub fn object_store_names(&self) -> Result<Vec<String>, StoreError> {
    let mut stmt = self.conn.prepare("SELECT name FROM object_store ORDER BY id")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for r in rows {
      out.push(r?);
    }
    Ok(out)
  }
}

impl RecordStore for SqliteStore {
  fn list_keys(&self) -> Result<Vec<Scalar>, StoreError> {
    let mut stmt = self
      .conn
      .prepare("SELECT key FROM object_data WHERE object_store_id=?1 ORDER BY key")?;
    let rows = stmt.query_map(params![self.object_store_id], |row| row.get::<_, Vec<u8>>(0))?;

    let mut out = Vec::new();
    for r in rows {
      let raw = r?;
      match decode_key(&raw) {
        Ok(k) => out.push(k),
        Err(e) => tracing::warn!(
          path = %self.path.display(),
          "skipping record with undecodable key: {e}"
        ),
      }
    }
    Ok(out)
  }

  fn decode(&self, key: &Scalar) -> Result<Node, StoreError> {
    let raw_key = encode_key(key).map_err(|e| StoreError::decode(key, e.to_string()))?;
    let row = self
      .conn
      .query_row(
        "SELECT data, file_ids FROM object_data WHERE object_store_id=?1 AND key=?2",
        params![self.object_store_id, raw_key],
        |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Option<String>>(1)?)),
      )
      .optional()?;
    let (data, file_ids) = row.ok_or_else(|| StoreError::NotFound(key.to_string()))?;

    if file_ids.as_deref().is_some_and(|s| !s.is_empty()) {
      return Err(StoreError::decode(key, "value is stored in an external file"));
    }
    let clone_data = snap::raw::Decoder::new()
      .decompress_vec(&data)
      .map_err(|e| StoreError::decode(key, format!("snappy: {e}")))?;
    read_structured_clone(&clone_data).map_err(|e| StoreError::decode(key, e.to_string()))
  }
}
