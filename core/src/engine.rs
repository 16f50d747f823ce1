use std::{path::Path, rc::Rc};

use thiserror::Error;

use crate::{
  export as export_impl,
  models::{ExportResult, Node, RenderOptions, Rendered, ResolveRequest, StorageLocation},
  profile,
  query::{PathQuery, QueryError, QueryEvaluator},
  render,
  store::{SqliteStore, StoreError},
  view::{LazyRecordView, Mapping},
};

#[derive(Debug, Error)]
pub enum CoreError {
  #[error("usage error: {0}")]
  Usage(String),
  #[error("lookup failure: {0}")]
  Lookup(String),
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("store error: {0}")]
  Store(#[from] StoreError),
  #[error(transparent)]
  Query(#[from] QueryError),
}

#[derive(Debug, Clone, Default)]
pub struct CoreOptions {
  /// Object store to read; the database's first store when `None`.
  pub object_store: Option<String>,
  pub render: RenderOptions,
}

/// Resolve → open → query → render, one store per call.
pub struct CoreEngine {
  options: CoreOptions,
  evaluator: Box<dyn QueryEvaluator>,
}

impl CoreEngine {
  pub fn new(options: CoreOptions) -> Self {
    Self::with_evaluator(options, PathQuery)
  }

  pub fn with_evaluator(options: CoreOptions, evaluator: impl QueryEvaluator + 'static) -> Self {
    Self {
      options,
      evaluator: Box::new(evaluator),
    }
  }

  pub fn options(&self) -> &CoreOptions {
    &self.options
  }

  pub fn resolve(&self, request: &ResolveRequest) -> Result<StorageLocation, CoreError> {
    profile::resolve_location(request)
  }

  pub fn open(&self, location: &StorageLocation) -> Result<LazyRecordView<SqliteStore>, CoreError> {
    let store = SqliteStore::open(location.path(), self.options.object_store.as_deref())?;
    Ok(LazyRecordView::new(store)?)
  }

  /// Evaluate `query` against `root` and render the result.
  pub fn query(&self, root: &Node, query: &str) -> Result<Rendered, CoreError> {
    let result = self.evaluator.evaluate(query, root)?;
    Ok(render::render(&result, &self.options.render))
  }

  /// The whole pipeline. The store is closed before this returns, on success
  /// and on every error path.
  pub fn run(&self, request: &ResolveRequest, query: &str) -> Result<Rendered, CoreError> {
    let location = self.resolve(request)?;
    let view = self.open(&location)?;
    let root = Node::Mapping(Rc::new(view));
    self.query(&root, query)
  }

  /// Decode every record and write the snapshot as JSON to `output_path`.
  pub fn export(
    &self,
    request: &ResolveRequest,
    output_path: impl AsRef<Path>,
  ) -> Result<ExportResult, CoreError> {
    let location = self.resolve(request)?;
    let view = self.open(&location)?;
    export_impl::export_snapshot(&view as &dyn Mapping, output_path.as_ref())
  }
}
