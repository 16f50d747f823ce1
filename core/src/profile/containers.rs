use std::path::Path;

use serde_json::Value;

use crate::models::ContainerIdentity;

pub const CONTAINERS_FILE: &str = "containers.json";
/// The only manifest schema this reader understands.
pub const SUPPORTED_CONTAINERS_VERSION: u64 = 4;

const L10N_NAME_PREFIX: &str = "userContext";

/// Containers declared in `<profile>/containers.json`, in manifest order.
///
/// A missing, malformed or differently versioned manifest yields nothing
/// (with a diagnostic): profiles without containers are normal.
pub fn read_containers(profile: &Path) -> impl Iterator<Item = ContainerIdentity> {
  load_manifest(&profile.join(CONTAINERS_FILE)).into_iter()
}

fn load_manifest(path: &Path) -> Vec<ContainerIdentity> {
  let text = match std::fs::read_to_string(path) {
    Ok(t) => t,
    Err(e) => {
      tracing::warn!("{}: cannot read container manifest: {e}", path.display());
      return Vec::new();
    }
  };
  let manifest: Value = match serde_json::from_str(&text) {
    Ok(v) => v,
    Err(e) => {
      tracing::warn!("{}:{}: malformed container manifest: {e}", path.display(), e.line());
      return Vec::new();
    }
  };

  let version = manifest.get("version").and_then(Value::as_u64);
  if version != Some(SUPPORTED_CONTAINERS_VERSION) {
    tracing::warn!(
      "{}: unsupported container manifest version {} (expected {})",
      path.display(),
      manifest.get("version").map_or_else(|| "<missing>".to_string(), |v| v.to_string()),
      SUPPORTED_CONTAINERS_VERSION
    );
    return Vec::new();
  }

  let identities = match manifest.get("identities").and_then(Value::as_array) {
    Some(items) => items,
    None => {
      tracing::warn!("{}: container manifest has no identities list", path.display());
      return Vec::new();
    }
  };

  identities
    .iter()
    .enumerate()
    .filter_map(|(idx, entry)| {
      let identity = parse_identity(entry);
      if identity.is_none() {
        tracing::warn!("{}: skipping unusable identity #{idx}", path.display());
      }
      identity
    })
    .collect()
}

fn parse_identity(entry: &Value) -> Option<ContainerIdentity> {
  let user_context_id = entry
    .get("userContextId")
    .and_then(Value::as_u64)
    .and_then(|id| u32::try_from(id).ok())?;

  let name = match entry.get("name").and_then(Value::as_str) {
    Some(n) => n.to_string(),
    None => name_from_l10n_id(entry.get("l10nID").and_then(Value::as_str)?),
  };

  Some(ContainerIdentity {
    user_context_id,
    name,
  })
}

/// `userContextPersonal.label` → `Personal`.
pub(crate) fn name_from_l10n_id(l10n_id: &str) -> String {
  let head = l10n_id.split('.').next().unwrap_or(l10n_id);
  head.strip_prefix(L10N_NAME_PREFIX).unwrap_or(head).to_string()
}
