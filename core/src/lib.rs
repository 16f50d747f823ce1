mod engine;
mod export;
mod models;
pub mod profile;
pub mod query;
pub mod render;
pub mod store;
mod view;

pub use crate::engine::{CoreEngine, CoreOptions};
pub use crate::models::{
  ContainerIdentity, ExportResult, Node, OutputMode, PreferenceEntry, RenderOptions, Rendered,
  ResolveRequest, Scalar, Sequence, StorageLocation,
};
pub use crate::query::{PathQuery, PathSegment, QueryError, QueryEvaluator};
pub use crate::store::{RecordStore, SqliteStore, StoreError};
pub use crate::view::{LazyRecordView, Mapping, MemoryMapping};

pub use crate::engine::CoreError;
