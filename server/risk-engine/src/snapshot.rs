//! Immutable reference data shared by concurrent analysis runs.
//!
//! A run holds an `Arc<ReferenceData>` for its whole lifetime. Reloading the
//! catalog or history swaps in a new snapshot; runs already in flight keep
//! the one they started with.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::TestCatalog;
use crate::error::EngineError;
use crate::history::FailureHistory;

#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
  pub catalog: TestCatalog,
  pub history: FailureHistory,
}

impl ReferenceData {
  pub fn new(catalog: TestCatalog, history: FailureHistory) -> Self {
    Self { catalog, history }
  }

  pub fn empty() -> Self {
    Self::default()
  }

  /// Load catalog and history files.
  ///
  /// A path that is not given or does not exist yields empty data and a
  /// warning; a file that exists but cannot be read or is not a JSON array
  /// is an error.
  pub fn load(catalog_path: Option<&Path>, history_path: Option<&Path>) -> Result<Self, EngineError> {
    let catalog = load_optional(catalog_path, "test catalog", TestCatalog::load)?;
    let history = load_optional(history_path, "failure history", FailureHistory::load)?;
    Ok(Self::new(catalog, history))
  }
}

fn load_optional<T, F>(path: Option<&Path>, kind: &str, load: F) -> Result<T, EngineError>
where
  T: Default,
  F: FnOnce(&Path) -> Result<T, EngineError>,
{
  match path {
    Some(p) if p.exists() => load(p),
    Some(p) => {
      tracing::warn!(kind, path = %p.display(), "reference file not found, continuing without it");
      Ok(T::default())
    }
    None => {
      tracing::warn!(kind, "no reference file configured, continuing without it");
      Ok(T::default())
    }
  }
}

/// Current reference snapshot, replaceable at runtime.
#[derive(Debug)]
pub struct ReferenceStore {
  current: RwLock<Arc<ReferenceData>>,
}

impl ReferenceStore {
  pub fn new(data: ReferenceData) -> Self {
    Self {
      current: RwLock::new(Arc::new(data)),
    }
  }

  /// The snapshot to use for one analysis run.
  pub fn snapshot(&self) -> Arc<ReferenceData> {
    Arc::clone(&self.current.read())
  }

  /// Install a new snapshot, returning the previous one.
  pub fn replace(&self, data: ReferenceData) -> Arc<ReferenceData> {
    let (tests, failures) = (data.catalog.len(), data.history.len());
    let previous = std::mem::replace(&mut *self.current.write(), Arc::new(data));
    tracing::info!(tests, failures, "reference data reloaded");
    previous
  }
}

impl Default for ReferenceStore {
  fn default() -> Self {
    Self::new(ReferenceData::empty())
  }
}
