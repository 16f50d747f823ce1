use std::path::{Path, PathBuf};

use crate::{
  engine::CoreError,
  models::{ResolveRequest, StorageLocation},
  profile::{containers::read_containers, extensions::find_extension_uuid},
};

/// Reserved container name of the private context holding extension storage.
pub const WEBEXT_STORAGE_CONTEXT_NAME: &str = "userContextIdInternal.webextStorageLocal";
/// Context id used for extension storage when the manifest does not list it
/// (`-1` as an unsigned 32-bit value).
pub const WEBEXT_STORAGE_CONTEXT_ID: u32 = u32::MAX;
/// Database file of `browser.storage.local` inside an origin's `idb/` directory.
pub const STORAGE_LOCAL_DB_FILENAME: &str = "3647222921wleabcEoxlt-eengsairo.sqlite";
pub const EXTENSION_ORIGIN_PREFIX: &str = "moz-extension+++";

/// Resolve a numeric or named context selector to a context id.
pub fn resolve_context_id(profile: Option<&Path>, selector: &str) -> Result<u32, CoreError> {
  let selector = selector.trim();
  if let Ok(n) = selector.parse::<i64>() {
    if n < i64::from(i32::MIN) || n > i64::from(u32::MAX) {
      return Err(CoreError::Usage(format!("context id {n} is out of range")));
    }
    return Ok(n as u32);
  }

  let profile = profile.ok_or_else(|| {
    CoreError::Usage(format!("a profile directory is required to look up container {selector:?}"))
  })?;
  if let Some(c) = read_containers(profile).find(|c| c.name == selector) {
    tracing::debug!(name = selector, id = c.user_context_id, "resolved container");
    return Ok(c.user_context_id);
  }
  if selector == WEBEXT_STORAGE_CONTEXT_NAME {
    return Ok(WEBEXT_STORAGE_CONTEXT_ID);
  }
  Err(CoreError::Lookup(format!(
    "unknown container name {selector:?} in {}",
    profile.display()
  )))
}

/// `<profile>/storage/default/<origin>[^userContextId=<id>]/idb/<db file>`
pub fn storage_path(profile: &Path, origin: &str, context_id: u32) -> PathBuf {
  let dir = if context_id != 0 {
    format!("{origin}^userContextId={context_id}")
  } else {
    origin.to_string()
  };
  profile
    .join("storage")
    .join("default")
    .join(dir)
    .join("idb")
    .join(STORAGE_LOCAL_DB_FILENAME)
}

/// Turn the caller's partial identity into a concrete store location.
pub fn resolve_location(req: &ResolveRequest) -> Result<StorageLocation, CoreError> {
  match (&req.path, &req.extension_id) {
    (Some(_), Some(_)) => Err(CoreError::Usage(
      "give either a database path or an extension id, not both".into(),
    )),
    (None, None) => Err(CoreError::Usage(
      "a database path or an extension id is required".into(),
    )),
    (Some(path), None) => {
      if let Some(ctx) = &req.context {
        tracing::warn!("ignoring context selector {ctx:?}: an explicit path was given");
      }
      Ok(StorageLocation::Explicit(path.clone()))
    }
    (None, Some(extension_id)) => {
      let profile = req.profile.as_deref().ok_or_else(|| {
        CoreError::Usage("a profile directory is required with an extension id".into())
      })?;
      let context_id = resolve_context_id(
        Some(profile),
        req.context.as_deref().unwrap_or(WEBEXT_STORAGE_CONTEXT_NAME),
      )?;
      let uuid = find_extension_uuid(profile, extension_id).ok_or_else(|| {
        CoreError::Lookup(format!(
          "extension {extension_id:?} is not installed in profile {}",
          profile.display()
        ))
      })?;
      let origin = format!("{EXTENSION_ORIGIN_PREFIX}{uuid}");
      let path = storage_path(profile, &origin, context_id);
      tracing::debug!(path = %path.display(), "resolved storage location");
      Ok(StorageLocation::Synthesized {
        path,
        origin,
        context_id,
      })
    }
  }
}
