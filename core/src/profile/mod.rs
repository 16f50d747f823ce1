//! Profile-directory lookups: preference file, container manifest,
//! extension UUIDs, and the storage path derived from them.

mod containers;
mod extensions;
mod location;
mod prefs;

pub use self::containers::{read_containers, CONTAINERS_FILE, SUPPORTED_CONTAINERS_VERSION};
pub use self::extensions::{find_extension_uuid, EXTENSION_UUIDS_PREF, PREFS_FILE};
pub use self::location::{
  resolve_context_id, resolve_location, storage_path, EXTENSION_ORIGIN_PREFIX,
  STORAGE_LOCAL_DB_FILENAME, WEBEXT_STORAGE_CONTEXT_ID, WEBEXT_STORAGE_CONTEXT_NAME,
};
pub use self::prefs::{read_prefs, PrefsReader};
