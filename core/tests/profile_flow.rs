use std::path::{Path, PathBuf};

use idb_core::{
  profile::{
    find_extension_uuid, read_containers, read_prefs, resolve_context_id, resolve_location,
    storage_path, STORAGE_LOCAL_DB_FILENAME, WEBEXT_STORAGE_CONTEXT_ID,
    WEBEXT_STORAGE_CONTEXT_NAME,
  },
  CoreError, ResolveRequest, StorageLocation,
};

const UUID: &str = "11111111-2222-3333-4444-555555555555";

fn write_prefs(profile: &Path, body: &str) {
  std::fs::write(profile.join("prefs.js"), body).unwrap();
}

fn write_containers(profile: &Path, body: &str) {
  std::fs::write(profile.join("containers.json"), body).unwrap();
}

fn profile_with_extension() -> tempfile::TempDir {
  let dir = tempfile::tempdir().unwrap();
  write_prefs(
    dir.path(),
    &format!(
      "// Mozilla User Preferences\n\nuser_pref(\"extensions.webextensions.uuids\", \"{{\\\"ext@x\\\":\\\"{UUID}\\\"}}\");\n"
    ),
  );
  dir
}

#[test]
fn prefs_in_file_order_and_bad_lines_skipped() {
  let dir = tempfile::tempdir().unwrap();
  write_prefs(
    dir.path(),
    concat!(
      "// comment line\n",
      "\n",
      "user_pref(\"a.first\", 1);\n",
      "user_pref('b.second', \"two\");\r\n",
      "user_pref(\"c.broken\", {not json});\n",
      "user_pref(\"d.third\", true);\n",
      "pref(\"not.a.user.pref\", 3);\n",
      "user_pref(\"e.object\", {\"k\": [1, 2]});\n",
    ),
  );

  let entries: Vec<_> = read_prefs(dir.path().join("prefs.js")).collect();
  let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
  assert_eq!(names, vec!["a.first", "b.second", "d.third", "e.object"]);
  assert_eq!(entries[0].value, serde_json::json!(1));
  assert_eq!(entries[1].value, serde_json::json!("two"));
  assert_eq!(entries[2].value, serde_json::json!(true));
  assert_eq!(entries[3].value, serde_json::json!({"k": [1, 2]}));
}

#[test]
fn prefs_with_invalid_utf8_name_are_skipped() {
  let dir = tempfile::tempdir().unwrap();
  let mut bytes = b"user_pref(\"ok\", 1);\nuser_pref(\"".to_vec();
  bytes.extend_from_slice(&[0xff, 0xfe]);
  bytes.extend_from_slice(b"\", 2);\nuser_pref(\"after\", 3);\n");
  std::fs::write(dir.path().join("prefs.js"), bytes).unwrap();

  let names: Vec<String> = read_prefs(dir.path().join("prefs.js")).map(|e| e.name).collect();
  assert_eq!(names, vec!["ok".to_string(), "after".to_string()]);
}

#[test]
fn prefs_reader_is_restartable_and_missing_file_is_empty() {
  let dir = tempfile::tempdir().unwrap();
  assert_eq!(read_prefs(dir.path().join("prefs.js")).count(), 0);

  write_prefs(dir.path(), "user_pref(\"x\", 1);\n");
  let path = dir.path().join("prefs.js");
  assert_eq!(read_prefs(&path).count(), 1);
  assert_eq!(read_prefs(&path).count(), 1);
}

#[test]
fn containers_use_name_or_l10n_id() {
  let dir = tempfile::tempdir().unwrap();
  write_containers(
    dir.path(),
    r#"{"version": 4, "lastUserContextId": 5, "identities": [
      {"userContextId": 1, "public": true, "l10nID": "userContextPersonal.label"},
      {"userContextId": 2, "public": true, "l10nID": "otherWork.label"},
      {"userContextId": 7, "public": true, "name": "Shopping"},
      {"public": true, "name": "NoId"}
    ]}"#,
  );

  let got: Vec<(u32, String)> = read_containers(dir.path())
    .map(|c| (c.user_context_id, c.name))
    .collect();
  assert_eq!(
    got,
    vec![
      (1, "Personal".to_string()),
      (2, "otherWork".to_string()),
      (7, "Shopping".to_string()),
    ]
  );
}

#[test]
fn containers_wrong_version_or_malformed_is_empty() {
  let dir = tempfile::tempdir().unwrap();
  write_containers(
    dir.path(),
    r#"{"version": 5, "identities": [{"userContextId": 7, "name": "Shopping"}]}"#,
  );
  assert_eq!(read_containers(dir.path()).count(), 0);

  write_containers(dir.path(), "{ not json");
  assert_eq!(read_containers(dir.path()).count(), 0);

  std::fs::remove_file(dir.path().join("containers.json")).unwrap();
  assert_eq!(read_containers(dir.path()).count(), 0);
}

#[test]
fn context_by_name_number_and_sentinel() {
  let dir = tempfile::tempdir().unwrap();
  write_containers(
    dir.path(),
    r#"{"version":4,"identities":[{"userContextId":7,"name":"Shopping"}]}"#,
  );
  let profile = Some(dir.path());

  assert_eq!(resolve_context_id(profile, "Shopping").unwrap(), 7);
  // Same manifest, same answer.
  assert_eq!(resolve_context_id(profile, "Shopping").unwrap(), 7);
  assert!(matches!(
    resolve_context_id(profile, "NoSuchName"),
    Err(CoreError::Lookup(_))
  ));

  assert_eq!(resolve_context_id(None, "42").unwrap(), 42);
  assert_eq!(resolve_context_id(None, "-1").unwrap(), u32::MAX);
  assert_eq!(
    resolve_context_id(profile, WEBEXT_STORAGE_CONTEXT_NAME).unwrap(),
    WEBEXT_STORAGE_CONTEXT_ID
  );
  assert!(matches!(
    resolve_context_id(None, "Shopping"),
    Err(CoreError::Usage(_))
  ));
}

#[test]
fn extension_uuid_lookup() {
  let dir = profile_with_extension();
  assert_eq!(find_extension_uuid(dir.path(), "ext@x").as_deref(), Some(UUID));
  assert_eq!(find_extension_uuid(dir.path(), "ext@missing"), None);

  let empty = tempfile::tempdir().unwrap();
  assert_eq!(find_extension_uuid(empty.path(), "ext@x"), None);
}

#[test]
fn extension_uuid_unparsable_pref_is_not_found() {
  let dir = tempfile::tempdir().unwrap();
  write_prefs(dir.path(), "user_pref(\"extensions.webextensions.uuids\", \"{broken\");\n");
  assert_eq!(find_extension_uuid(dir.path(), "ext@x"), None);
}

#[test]
fn both_or_neither_source_is_usage_error() {
  let both = ResolveRequest {
    path: Some(PathBuf::from("/tmp/x.sqlite")),
    extension_id: Some("ext@x".into()),
    profile: Some(PathBuf::from("/tmp")),
    context: Some("3".into()),
  };
  assert!(matches!(resolve_location(&both), Err(CoreError::Usage(_))));

  let neither = ResolveRequest {
    profile: Some(PathBuf::from("/tmp")),
    ..ResolveRequest::default()
  };
  assert!(matches!(resolve_location(&neither), Err(CoreError::Usage(_))));

  let no_profile = ResolveRequest {
    extension_id: Some("ext@x".into()),
    ..ResolveRequest::default()
  };
  assert!(matches!(resolve_location(&no_profile), Err(CoreError::Usage(_))));
}

#[test]
fn explicit_path_is_used_verbatim() {
  let req = ResolveRequest {
    path: Some(PathBuf::from("/data/db.sqlite")),
    context: Some("Shopping".into()),
    ..ResolveRequest::default()
  };
  assert_eq!(
    resolve_location(&req).unwrap(),
    StorageLocation::Explicit(PathBuf::from("/data/db.sqlite"))
  );
}

#[test]
fn extension_defaults_to_webext_storage_context() {
  let dir = profile_with_extension();
  let req = ResolveRequest {
    extension_id: Some("ext@x".into()),
    profile: Some(dir.path().to_path_buf()),
    ..ResolveRequest::default()
  };
  let loc = resolve_location(&req).unwrap();
  let origin = format!("moz-extension+++{UUID}");
  assert_eq!(
    loc,
    StorageLocation::Synthesized {
      path: dir
        .path()
        .join("storage")
        .join("default")
        .join(format!("{origin}^userContextId=4294967295"))
        .join("idb")
        .join(STORAGE_LOCAL_DB_FILENAME),
      origin,
      context_id: WEBEXT_STORAGE_CONTEXT_ID,
    }
  );
}

#[test]
fn extension_with_manifest_mapped_sentinel_and_zero_context() {
  let dir = profile_with_extension();
  write_containers(
    dir.path(),
    r#"{"version":4,"identities":[{"userContextId":4,"name":"userContextIdInternal.webextStorageLocal"}]}"#,
  );
  let mut req = ResolveRequest {
    extension_id: Some("ext@x".into()),
    profile: Some(dir.path().to_path_buf()),
    ..ResolveRequest::default()
  };
  match resolve_location(&req).unwrap() {
    StorageLocation::Synthesized { context_id, .. } => assert_eq!(context_id, 4),
    other => panic!("unexpected {other:?}"),
  }

  req.context = Some("0".into());
  let loc = resolve_location(&req).unwrap();
  let origin = format!("moz-extension+++{UUID}");
  assert_eq!(loc.path(), storage_path(dir.path(), &origin, 0));
  assert!(!loc.path().to_string_lossy().contains("userContextId"));
}

#[test]
fn unknown_extension_is_lookup_failure() {
  let dir = profile_with_extension();
  let req = ResolveRequest {
    extension_id: Some("ext@missing".into()),
    profile: Some(dir.path().to_path_buf()),
    ..ResolveRequest::default()
  };
  assert!(matches!(resolve_location(&req), Err(CoreError::Lookup(_))));
}
