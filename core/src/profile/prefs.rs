use std::{
  fs::File,
  io::{self, BufRead, BufReader},
  path::{Path, PathBuf},
};

use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::models::PreferenceEntry;

// Byte-oriented so that names with broken UTF-8 still match and get reported.
static USER_PREF: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r#"(?s-u)^\s*user_pref\(\s*(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)')\s*,\s*(.*)\)\s*;\s*$"#,
  )
  .expect("user_pref pattern")
});

/// Streams the `user_pref(...)` entries of a preference file, in file order.
///
/// Created by [`read_prefs`]. Lines that are not preference assignments are
/// skipped silently; assignments with a bad name or value are reported and
/// skipped.
pub struct PrefsReader {
  path: PathBuf,
  lines: Option<io::Split<BufReader<File>>>,
  line_no: u64,
}

/// Open `path` for reading preferences. A missing file yields no entries.
pub fn read_prefs(path: impl AsRef<Path>) -> PrefsReader {
  let path = path.as_ref().to_path_buf();
  let lines = match File::open(&path) {
    Ok(f) => Some(BufReader::new(f).split(b'\n')),
    Err(e) if e.kind() == io::ErrorKind::NotFound => None,
    Err(e) => {
      tracing::warn!("{}: cannot open preference file: {e}", path.display());
      None
    }
  };
  PrefsReader {
    path,
    lines,
    line_no: 0,
  }
}

impl Iterator for PrefsReader {
  type Item = PreferenceEntry;

  fn next(&mut self) -> Option<PreferenceEntry> {
    loop {
      let lines = self.lines.as_mut()?;
      let mut line = match lines.next()? {
        Ok(l) => l,
        Err(e) => {
          tracing::warn!("{}:{}: read error: {e}", self.path.display(), self.line_no + 1);
          self.lines = None;
          return None;
        }
      };
      self.line_no += 1;
      if line.last() == Some(&b'\r') {
        line.pop();
      }
      match parse_pref_line(&line) {
        Ok(Some(entry)) => return Some(entry),
        Ok(None) => {}
        Err(msg) => tracing::warn!("{}:{}: {msg}", self.path.display(), self.line_no),
      }
    }
  }
}

/// `Ok(None)` for lines that are not preference assignments at all.
pub(crate) fn parse_pref_line(line: &[u8]) -> Result<Option<PreferenceEntry>, String> {
  let caps = match USER_PREF.captures(line) {
    Some(c) => c,
    None => return Ok(None),
  };
  let (raw_name, quote) = match (caps.get(1), caps.get(2)) {
    (Some(m), _) => (m.as_bytes(), '"'),
    (None, Some(m)) => (m.as_bytes(), '\''),
    (None, None) => return Ok(None),
  };
  let raw_value = caps.get(3).map(|m| m.as_bytes()).unwrap_or_default();

  let name = std::str::from_utf8(raw_name)
    .map_err(|e| format!("preference name is not valid UTF-8: {e}"))?;
  let name = unescape_name(name, quote).ok_or_else(|| format!("invalid preference name {name:?}"))?;

  let value: serde_json::Value = serde_json::from_slice(trim_ascii(raw_value))
    .map_err(|e| format!("invalid value for preference {name:?}: {e}"))?;

  Ok(Some(PreferenceEntry { name, value }))
}

fn unescape_name(name: &str, quote: char) -> Option<String> {
  let json = if quote == '\'' {
    format!("\"{}\"", name.replace("\\'", "'").replace('"', "\\\""))
  } else {
    format!("\"{name}\"")
  };
  serde_json::from_str(&json).ok()
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
  let start = bytes
    .iter()
    .position(|b| !b.is_ascii_whitespace())
    .unwrap_or(bytes.len());
  let end = bytes
    .iter()
    .rposition(|b| !b.is_ascii_whitespace())
    .map_or(start, |i| i + 1);
  &bytes[start..end]
}
