use std::{cell::RefCell, collections::HashSet};

use crate::{
  models::{Node, Scalar},
  store::{RecordStore, StoreError},
};

/// Read-only associative node.
///
/// Implemented by the lazy store view and by plain in-memory mappings
/// (decoded records, query results); the renderer and the query evaluator
/// only ever talk to this trait.
pub trait Mapping {
  fn type_name(&self) -> &'static str;

  /// Keys in stable enumeration order. Never decodes values.
  fn keys(&self) -> Vec<Scalar>;

  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// `StoreError::NotFound` for absent keys, `StoreError::Decode` when the
  /// value exists but cannot be decoded.
  fn get(&self, key: &Scalar) -> Result<Node, StoreError>;

  /// Every entry, in enumeration order.
  fn materialize(&self) -> Result<Vec<(Scalar, Node)>, StoreError> {
    self
      .keys()
      .into_iter()
      .map(|k| {
        let v = self.get(&k)?;
        Ok((k, v))
      })
      .collect()
  }
}

/// Insertion-ordered mapping held fully in memory.
#[derive(Debug, Default)]
pub struct MemoryMapping {
  type_name: &'static str,
  entries: RefCell<Vec<(Scalar, Node)>>,
}

impl MemoryMapping {
  pub fn new(type_name: &'static str) -> Self {
    Self {
      type_name,
      entries: RefCell::new(Vec::new()),
    }
  }

  pub fn from_entries(type_name: &'static str, entries: Vec<(Scalar, Node)>) -> Self {
    let out = Self::new(type_name);
    for (k, v) in entries {
      out.insert(k, v);
    }
    out
  }

  /// Insert or replace; replacing keeps the original position.
  pub fn insert(&self, key: Scalar, value: Node) {
    let mut entries = self.entries.borrow_mut();
    match entries.iter_mut().find(|(k, _)| *k == key) {
      Some(slot) => slot.1 = value,
      None => entries.push((key, value)),
    }
  }
}

impl Mapping for MemoryMapping {
  fn type_name(&self) -> &'static str {
    self.type_name
  }

  fn keys(&self) -> Vec<Scalar> {
    self.entries.borrow().iter().map(|(k, _)| k.clone()).collect()
  }

  fn len(&self) -> usize {
    self.entries.borrow().len()
  }

  fn get(&self, key: &Scalar) -> Result<Node, StoreError> {
    self
      .entries
      .borrow()
      .iter()
      .find(|(k, _)| k == key)
      .map(|(_, v)| v.clone())
      .ok_or_else(|| StoreError::NotFound(key.to_string()))
  }

  fn materialize(&self) -> Result<Vec<(Scalar, Node)>, StoreError> {
    Ok(self.entries.borrow().clone())
  }
}

/// Mapping over an open record store that decodes a record only when asked.
///
/// The key list is fetched once at construction; values are never cached, so
/// every `get` goes to the store.
pub struct LazyRecordView<S: RecordStore> {
  store: S,
  keys: Vec<Scalar>,
  index: HashSet<(&'static str, String)>,
}

/// Hashable identity of a key: its kind plus its encoded form.
fn index_key(key: &Scalar) -> (&'static str, String) {
  (key.type_name(), key.to_string())
}

impl<S: RecordStore> LazyRecordView<S> {
  pub fn new(store: S) -> Result<Self, StoreError> {
    let keys = store.list_keys()?;
    tracing::debug!(keys = keys.len(), "opened lazy record view");
    let index = keys.iter().map(index_key).collect();
    Ok(Self { store, keys, index })
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub fn into_store(self) -> S {
    self.store
  }
}

impl<S: RecordStore> Mapping for LazyRecordView<S> {
  fn type_name(&self) -> &'static str {
    "store"
  }

  fn keys(&self) -> Vec<Scalar> {
    self.keys.clone()
  }

  fn len(&self) -> usize {
    self.keys.len()
  }

  fn get(&self, key: &Scalar) -> Result<Node, StoreError> {
    if !self.index.contains(&index_key(key)) {
      return Err(StoreError::NotFound(key.to_string()));
    }
    self.store.decode(key)
  }
}
