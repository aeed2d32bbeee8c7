//! Static test catalog with coverage and id indexes.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::EngineError;
use crate::normalize::{self, read_file};
use crate::types::TestCase;

/// Read-only test catalog, loaded once and shared across runs.
///
/// Keeps catalog order; lookups by id and by covered file go through indexes.
#[derive(Debug, Clone, Default)]
pub struct TestCatalog {
  tests: Vec<TestCase>,
  by_id: HashMap<String, usize>,
  by_file: HashMap<String, Vec<usize>>,
}

impl TestCatalog {
  /// Build from normalized tests. A repeated `test_id` keeps the first entry.
  pub fn new(tests: Vec<TestCase>) -> Self {
    let mut catalog = Self::default();
    for test in tests {
      if catalog.by_id.contains_key(&test.test_id) {
        tracing::warn!(test_id = %test.test_id, "duplicate test id in catalog, keeping first");
        continue;
      }
      let idx = catalog.tests.len();
      catalog.by_id.insert(test.test_id.clone(), idx);
      for file in &test.covered_files {
        catalog.by_file.entry(file.clone()).or_default().push(idx);
      }
      catalog.tests.push(test);
    }
    catalog
  }

  pub fn from_json_str(raw: &str) -> Result<Self, EngineError> {
    let tests = normalize::parse_entries(raw, "test catalog", normalize::normalize_test_case)?;
    Ok(Self::new(tests))
  }

  pub fn load(path: &Path) -> Result<Self, EngineError> {
    let catalog = Self::from_json_str(&read_file(path)?)?;
    tracing::info!(path = %path.display(), tests = catalog.len(), "loaded test catalog");
    Ok(catalog)
  }

  pub fn tests(&self) -> &[TestCase] {
    &self.tests
  }

  pub fn len(&self) -> usize {
    self.tests.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tests.is_empty()
  }

  pub fn get(&self, test_id: &str) -> Option<&TestCase> {
    self.by_id.get(test_id).map(|&idx| &self.tests[idx])
  }

  /// Tests whose coverage includes `file_path`, in catalog order.
  pub fn covering<'a>(&'a self, file_path: &str) -> impl Iterator<Item = &'a TestCase> + 'a {
    self
      .by_file
      .get(file_path)
      .into_iter()
      .flatten()
      .map(move |&idx| &self.tests[idx])
  }

  /// Tests covering `file_path` directly, then tests whose path contains the
  /// file's directory, without repeats.
  ///
  /// A root-level file has an empty directory, which every test path
  /// contains; `skip_root_files` turns that match off.
  pub fn related_to(&self, file_path: &str, skip_root_files: bool) -> Vec<&TestCase> {
    let mut seen = HashSet::new();
    let mut related: Vec<&TestCase> = self
      .covering(file_path)
      .filter(|t| seen.insert(t.test_id.as_str()))
      .collect();

    let dir = parent_dir(file_path);
    if dir.is_empty() && skip_root_files {
      return related;
    }
    for test in &self.tests {
      if test.test_path.contains(dir) && seen.insert(test.test_id.as_str()) {
        related.push(test);
      }
    }
    related
  }
}

fn parent_dir(file_path: &str) -> &str {
  file_path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{Criticality, TestType};

  fn test_case(id: &str, path: &str, covers: &[&str]) -> TestCase {
    TestCase {
      test_id: id.into(),
      test_name: format!("test_{}", id.to_lowercase()),
      test_path: path.into(),
      test_type: TestType::Unit,
      execution_time_seconds: 1.0,
      covered_files: covers.iter().map(|f| f.to_string()).collect(),
      criticality: Criticality::Medium,
      last_failure_date: None,
      failure_count: 0,
      dependencies: vec![],
    }
  }

  #[test]
  fn duplicate_ids_keep_first() {
    let catalog = TestCatalog::new(vec![
      test_case("T1", "tests/a.py", &["a.py"]),
      test_case("T1", "tests/b.py", &["b.py"]),
    ]);
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.get("T1").unwrap().test_path, "tests/a.py");
    assert_eq!(catalog.covering("b.py").count(), 0);
  }

  #[test]
  fn covering_preserves_catalog_order() {
    let catalog = TestCatalog::new(vec![
      test_case("T2", "tests/x.py", &["src/a.py"]),
      test_case("T1", "tests/y.py", &["src/a.py", "src/b.py"]),
    ]);
    let ids: Vec<_> = catalog.covering("src/a.py").map(|t| t.test_id.as_str()).collect();
    assert_eq!(ids, vec!["T2", "T1"]);
    assert_eq!(catalog.covering("src/none.py").count(), 0);
  }

  #[test]
  fn related_includes_same_directory_tests() {
    let catalog = TestCatalog::new(vec![
      test_case("T1", "tests/other.py", &["payments/charge.py"]),
      test_case("T2", "payments/tests/test_refund.py", &[]),
      test_case("T3", "tests/unrelated.py", &[]),
    ]);
    let ids: Vec<_> = catalog
      .related_to("payments/charge.py", false)
      .into_iter()
      .map(|t| t.test_id.as_str())
      .collect();
    assert_eq!(ids, vec!["T1", "T2"]);
  }

  #[test]
  fn related_for_root_file_matches_every_test() {
    let catalog = TestCatalog::new(vec![
      test_case("T1", "tests/test_setup.py", &["setup.py"]),
      test_case("T2", "tests/anything.py", &[]),
    ]);
    let ids: Vec<_> = catalog
      .related_to("setup.py", false)
      .into_iter()
      .map(|t| t.test_id.as_str())
      .collect();
    assert_eq!(ids, vec!["T1", "T2"]);
  }

  #[test]
  fn related_for_root_file_can_skip_directory_match() {
    let catalog = TestCatalog::new(vec![
      test_case("T1", "tests/test_setup.py", &["setup.py"]),
      test_case("T2", "tests/anything.py", &[]),
    ]);
    let related = catalog.related_to("setup.py", true);
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].test_id, "T1");
  }

  #[test]
  fn from_json_builds_indexes() {
    let raw = r#"[
      {"test_id": "T1", "test_name": "login", "test_path": "tests/test_login.py",
       "test_type": "unit", "execution_time_seconds": 2.0,
       "covered_files": ["auth/login.py"], "criticality": "critical",
       "dependencies": ["T9"]}
    ]"#;
    let catalog = TestCatalog::from_json_str(raw).unwrap();
    let t = catalog.get("T1").unwrap();
    assert_eq!(t.criticality, Criticality::Critical);
    assert_eq!(t.dependencies, vec!["T9".to_string()]);
    assert_eq!(catalog.covering("auth/login.py").count(), 1);
  }
}
