use std::path::Path;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::profile::prefs::read_prefs;

pub const PREFS_FILE: &str = "prefs.js";
/// Preference holding the extension id → internal UUID table as JSON text.
pub const EXTENSION_UUIDS_PREF: &str = "extensions.webextensions.uuids";

/// Internal storage UUID of `extension_id`, from the profile's `prefs.js`.
pub fn find_extension_uuid(profile: &Path, extension_id: &str) -> Option<String> {
  let prefs_path = profile.join(PREFS_FILE);
  let entry = read_prefs(&prefs_path).find(|e| e.name == EXTENSION_UUIDS_PREF)?;

  let table: Map<String, Value> = match entry.value {
    Value::String(text) => match serde_json::from_str(&text) {
      Ok(t) => t,
      Err(e) => {
        tracing::warn!("{}: cannot parse {EXTENSION_UUIDS_PREF}: {e}", prefs_path.display());
        return None;
      }
    },
    Value::Object(map) => map,
    other => {
      tracing::warn!(
        "{}: {EXTENSION_UUIDS_PREF} has unexpected value {other}",
        prefs_path.display()
      );
      return None;
    }
  };

  let uuid = table.get(extension_id)?.as_str()?;
  match Uuid::parse_str(uuid) {
    Ok(_) => Some(uuid.to_string()),
    Err(e) => {
      tracing::warn!("{}: UUID {uuid:?} for {extension_id} is malformed: {e}", prefs_path.display());
      None
    }
  }
}
