use std::{
  cell::RefCell,
  fmt,
  path::{Path, PathBuf},
  rc::Rc,
};

use serde::{Deserialize, Serialize};

use crate::view::{Mapping, MemoryMapping};

/// A leaf value of the record tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  Text(String),
  Bytes(Vec<u8>),
}

impl Scalar {
  pub fn type_name(&self) -> &'static str {
    match self {
      Scalar::Null => "null",
      Scalar::Bool(_) => "bool",
      Scalar::Int(_) => "int",
      Scalar::Float(_) => "float",
      Scalar::Text(_) => "text",
      Scalar::Bytes(_) => "bytes",
    }
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Scalar::Text(s) => Some(s),
      _ => None,
    }
  }
}

impl fmt::Display for Scalar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&crate::render::encode_scalar(self))
  }
}

impl From<&str> for Scalar {
  fn from(s: &str) -> Self {
    Scalar::Text(s.to_string())
  }
}

impl From<String> for Scalar {
  fn from(s: String) -> Self {
    Scalar::Text(s)
  }
}

impl From<i64> for Scalar {
  fn from(n: i64) -> Self {
    Scalar::Int(n)
  }
}

/// An ordered, growable list node. Interior mutability lets decoders hand out
/// the node before its items are known (back references may point at it).
#[derive(Debug, Default)]
pub struct Sequence {
  type_name: &'static str,
  items: RefCell<Vec<Node>>,
}

impl Sequence {
  pub fn new(type_name: &'static str, items: Vec<Node>) -> Self {
    Self {
      type_name,
      items: RefCell::new(items),
    }
  }

  pub fn list(items: Vec<Node>) -> Self {
    Self::new("list", items)
  }

  pub fn type_name(&self) -> &'static str {
    self.type_name
  }

  pub fn len(&self) -> usize {
    self.items.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.borrow().is_empty()
  }

  pub fn get(&self, idx: usize) -> Option<Node> {
    self.items.borrow().get(idx).cloned()
  }

  pub fn items(&self) -> Vec<Node> {
    self.items.borrow().clone()
  }

  pub fn push(&self, node: Node) {
    self.items.borrow_mut().push(node);
  }

  /// Store `node` at `idx`, padding any gap with nulls (sparse arrays).
  pub fn set(&self, idx: usize, node: Node) {
    let mut items = self.items.borrow_mut();
    if idx >= items.len() {
      items.resize(idx + 1, Node::Scalar(Scalar::Null));
    }
    items[idx] = node;
  }
}

/// A node of the (possibly lazy) record tree.
#[derive(Clone)]
pub enum Node {
  Scalar(Scalar),
  Sequence(Rc<Sequence>),
  Mapping(Rc<dyn Mapping>),
}

impl Node {
  pub fn null() -> Self {
    Node::Scalar(Scalar::Null)
  }

  pub fn text(s: impl Into<String>) -> Self {
    Node::Scalar(Scalar::Text(s.into()))
  }

  pub fn type_name(&self) -> &'static str {
    match self {
      Node::Scalar(s) => s.type_name(),
      Node::Sequence(seq) => seq.type_name(),
      Node::Mapping(map) => map.type_name(),
    }
  }

  /// Address of the shared allocation; `None` for scalars.
  pub fn identity(&self) -> Option<usize> {
    match self {
      Node::Scalar(_) => None,
      Node::Sequence(seq) => Some(Rc::as_ptr(seq) as *const () as usize),
      Node::Mapping(map) => Some(Rc::as_ptr(map) as *const () as usize),
    }
  }

  /// Build an in-memory tree from a decoded JSON value.
  pub fn from_json(value: &serde_json::Value) -> Self {
    use serde_json::Value;
    match value {
      Value::Null => Node::Scalar(Scalar::Null),
      Value::Bool(b) => Node::Scalar(Scalar::Bool(*b)),
      Value::Number(n) => match n.as_i64() {
        Some(i) => Node::Scalar(Scalar::Int(i)),
        None => Node::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN))),
      },
      Value::String(s) => Node::text(s.as_str()),
      Value::Array(items) => Node::Sequence(Rc::new(Sequence::list(
        items.iter().map(Node::from_json).collect(),
      ))),
      Value::Object(map) => {
        let out = MemoryMapping::new("object");
        for (k, v) in map {
          out.insert(Scalar::Text(k.clone()), Node::from_json(v));
        }
        Node::Mapping(Rc::new(out))
      }
    }
  }
}

impl fmt::Debug for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Node::Scalar(s) => write!(f, "{s:?}"),
      Node::Sequence(seq) => write!(f, "<{} len={}>", seq.type_name(), seq.len()),
      Node::Mapping(map) => write!(f, "<{} len={}>", map.type_name(), map.len()),
    }
  }
}

impl From<Scalar> for Node {
  fn from(s: Scalar) -> Self {
    Node::Scalar(s)
  }
}

/// One `user_pref(...)` line of a preference file.
#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceEntry {
  pub name: String,
  pub value: serde_json::Value,
}

/// A browser container ("contextual identity").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerIdentity {
  pub user_context_id: u32,
  pub name: String,
}

/// The inputs a caller has to identify a store.
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
  pub path: Option<PathBuf>,
  pub extension_id: Option<String>,
  pub profile: Option<PathBuf>,
  pub context: Option<String>,
}

/// Where the store lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
  Explicit(PathBuf),
  Synthesized {
    path: PathBuf,
    origin: String,
    context_id: u32,
  },
}

impl StorageLocation {
  pub fn path(&self) -> &Path {
    match self {
      StorageLocation::Explicit(p) => p,
      StorageLocation::Synthesized { path, .. } => path,
    }
  }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
  /// Single-line JSON, always machine-parseable.
  Json,
  /// Indented, width-wrapped layout for humans.
  Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderOptions {
  pub mode: OutputMode,
  pub indent: usize,
  pub width: usize,
  pub max_depth: Option<usize>,
  pub sort_keys: bool,
}

impl Default for RenderOptions {
  fn default() -> Self {
    Self {
      mode: OutputMode::Pretty,
      indent: 2,
      width: 80,
      max_depth: None,
      sort_keys: false,
    }
  }
}

#[derive(Debug, Clone)]
pub struct Rendered {
  pub text: String,
  /// Values that failed to decode and were rendered as error markers.
  pub decode_errors: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResult {
  pub output_path: String,
  pub records_written: u64,
}
