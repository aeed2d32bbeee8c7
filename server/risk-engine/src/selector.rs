//! Risk-driven test selection over the static catalog.
//!
//! One deterministic pass:
//! 1. critical tests (always in, priority 1.0)
//! 2. tests covering changed files, keeping the best priority per test
//! 3. tests around files with a bad failure history (priority 0.8)
//! 4. stable sort by priority, truncate to `max_tests`
//! 5. dependency closure (single hop by default, see [`DependencyClosure`])
//!
//! Every test enters at most once, so cyclic dependency graphs terminate.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::catalog::TestCatalog;
use crate::config::{DependencyClosure, TestSelectionConfig};
use crate::types::{ChangeMetrics, ChangeType, Criticality, RiskLevel, RiskScore, TestCase, TestSelection};

const CRITICAL_TEST_PRIORITY: f64 = 1.0;
const HISTORICAL_AREA_PRIORITY: f64 = 0.8;
const HISTORICAL_RISK_TRIGGER: f64 = 0.7;
const DEPENDENCY_DECAY: f64 = 0.8;

pub const CRITICAL_TEST_REASON: &str = "Critical test - always included";

/// Priority of `test` for a changed file with the given risk, in [0, 1].
pub fn test_priority(test: &TestCase, risk: &RiskScore) -> f64 {
  let mut priority = 0.4 * risk.overall_risk;
  priority += 0.3 * test.criticality.weight();
  if test.failure_count > 0 {
    priority += 0.2 * (f64::from(test.failure_count) / 10.0).min(1.0);
  }
  priority += 0.1 * test.test_type.weight();
  priority.min(1.0)
}

/// Human-readable reason a test was picked for a changed file.
pub fn selection_reason(test: &TestCase, change: &ChangeMetrics, risk: &RiskScore) -> String {
  let mut reasons = Vec::new();
  if risk.risk_level == RiskLevel::High {
    reasons.push(format!(
      "{} risk in {}",
      risk.risk_level.as_str().to_uppercase(),
      change.file_path
    ));
  }
  if change.is_critical_file {
    reasons.push("covers critical file".to_string());
  }
  if test.failure_count > 3 {
    reasons.push(format!("historically unstable ({} failures)", test.failure_count));
  }
  if change.change_type == ChangeType::Database && test.test_path.to_lowercase().contains("database") {
    reasons.push("database change detected".to_string());
  }
  if reasons.is_empty() {
    reasons.push(format!("covers modified file {}", change.file_path));
  }
  reasons.join("; ")
}

struct Candidate<'a> {
  test: &'a TestCase,
  reason: String,
  priority: f64,
}

/// Insertion-ordered candidate set keyed by test id.
#[derive(Default)]
struct Candidates<'a> {
  entries: Vec<Candidate<'a>>,
  index: HashMap<&'a str, usize>,
}

impl<'a> Candidates<'a> {
  fn insert_if_absent(&mut self, test: &'a TestCase, reason: impl FnOnce() -> String, priority: f64) {
    if self.index.contains_key(test.test_id.as_str()) {
      return;
    }
    self.index.insert(test.test_id.as_str(), self.entries.len());
    self.entries.push(Candidate {
      test,
      reason: reason(),
      priority,
    });
  }

  /// Insert, or raise an existing entry when `priority` strictly beats it.
  fn upsert_max(&mut self, test: &'a TestCase, reason: impl FnOnce() -> String, priority: f64) {
    match self.index.get(test.test_id.as_str()) {
      Some(&idx) => {
        let entry = &mut self.entries[idx];
        if priority > entry.priority {
          entry.priority = priority;
          entry.reason = reason();
        }
      }
      None => self.insert_if_absent(test, reason, priority),
    }
  }
}

/// Select and order tests for the scored changes.
pub fn select(
  risk_results: &[(ChangeMetrics, RiskScore)],
  catalog: &TestCatalog,
  config: &TestSelectionConfig,
) -> TestSelection {
  if catalog.is_empty() {
    tracing::warn!("no test catalog loaded, cannot select tests");
    return TestSelection::empty();
  }

  let mut candidates = Candidates::default();

  if config.include_critical_tests {
    for test in catalog.tests() {
      if test.criticality == Criticality::Critical {
        candidates.insert_if_absent(test, || CRITICAL_TEST_REASON.to_string(), CRITICAL_TEST_PRIORITY);
      }
    }
  }

  for (change, risk) in risk_results {
    for test in catalog.covering(&change.file_path) {
      let priority = test_priority(test, risk);
      candidates.upsert_max(test, || selection_reason(test, change, risk), priority);
    }
  }

  for (change, risk) in risk_results {
    if risk.risk_factors.historical_risk <= HISTORICAL_RISK_TRIGGER {
      continue;
    }
    for test in catalog.related_to(&change.file_path, config.skip_root_directory_match) {
      candidates.insert_if_absent(
        test,
        || format!("Historical failures in {}", change.file_path),
        HISTORICAL_AREA_PRIORITY,
      );
    }
  }

  let mut ranked = candidates.entries;
  if config.prioritize_by_risk {
    // Stable: equal priorities keep insertion order.
    ranked.sort_by(|a, b| b.priority.total_cmp(&a.priority));
  }
  ranked.truncate(config.max_tests);

  match config.dependency_closure {
    DependencyClosure::SingleHop => add_direct_dependencies(&mut ranked, catalog),
    DependencyClosure::Transitive => add_transitive_dependencies(&mut ranked, catalog, config.max_tests),
  }

  build_selection(ranked, risk_results)
}

/// Direct dependencies of the truncated set, one hop, cap not re-checked.
fn add_direct_dependencies<'a>(ranked: &mut Vec<Candidate<'a>>, catalog: &'a TestCatalog) {
  let mut seen: HashSet<&'a str> = ranked.iter().map(|c| c.test.test_id.as_str()).collect();
  let mut pulled = Vec::new();
  for parent in ranked.iter() {
    for dep_id in &parent.test.dependencies {
      if seen.contains(dep_id.as_str()) {
        continue;
      }
      match catalog.get(dep_id) {
        Some(dep) => {
          seen.insert(dep.test_id.as_str());
          pulled.push(Candidate {
            test: dep,
            reason: format!("Dependency of {}", parent.test.test_name),
            priority: parent.priority * DEPENDENCY_DECAY,
          });
        }
        None => tracing::warn!(test_id = %parent.test.test_id, dependency = %dep_id, "unknown test dependency"),
      }
    }
  }
  ranked.extend(pulled);
}

/// Breadth-first closure over dependencies, never growing past `max_tests`.
fn add_transitive_dependencies<'a>(ranked: &mut Vec<Candidate<'a>>, catalog: &'a TestCatalog, max_tests: usize) {
  let mut seen: HashSet<&'a str> = ranked.iter().map(|c| c.test.test_id.as_str()).collect();
  let mut queue: VecDeque<usize> = (0..ranked.len()).collect();
  while let Some(idx) = queue.pop_front() {
    let parent_test = ranked[idx].test;
    let parent_priority = ranked[idx].priority;
    for dep_id in &parent_test.dependencies {
      if seen.contains(dep_id.as_str()) {
        continue;
      }
      if ranked.len() >= max_tests {
        tracing::debug!(max_tests, "dependency closure stopped at selection cap");
        return;
      }
      match catalog.get(dep_id) {
        Some(dep) => {
          seen.insert(dep.test_id.as_str());
          queue.push_back(ranked.len());
          ranked.push(Candidate {
            test: dep,
            reason: format!("Dependency of {}", parent_test.test_name),
            priority: parent_priority * DEPENDENCY_DECAY,
          });
        }
        None => tracing::warn!(test_id = %parent_test.test_id, dependency = %dep_id, "unknown test dependency"),
      }
    }
  }
}

fn build_selection(ranked: Vec<Candidate<'_>>, risk_results: &[(ChangeMetrics, RiskScore)]) -> TestSelection {
  let mut reason_map = BTreeMap::new();
  let mut selected_tests = Vec::with_capacity(ranked.len());
  for candidate in ranked {
    reason_map.insert(candidate.test.test_id.clone(), candidate.reason);
    selected_tests.push(candidate.test.clone());
  }

  let total_estimated_time: f64 = selected_tests.iter().map(|t| t.execution_time_seconds).sum();
  let coverage_score = coverage_score(&selected_tests, risk_results);
  let risk_coverage = risk_coverage(&selected_tests, risk_results);

  tracing::info!(
    selected = selected_tests.len(),
    coverage = coverage_score,
    estimated_seconds = total_estimated_time,
    "test selection complete"
  );

  TestSelection {
    selected_tests,
    reason_map,
    total_estimated_time,
    coverage_score,
    risk_coverage,
  }
}

/// Share of changed files covered by at least one selected test; 1.0 when
/// nothing changed.
pub fn coverage_score(selected: &[TestCase], risk_results: &[(ChangeMetrics, RiskScore)]) -> f64 {
  let changed: HashSet<&str> = risk_results.iter().map(|(c, _)| c.file_path.as_str()).collect();
  if changed.is_empty() {
    return 1.0;
  }
  let covered = changed
    .iter()
    .filter(|file| selected.iter().any(|t| t.covered_files.contains(**file)))
    .count();
  covered as f64 / changed.len() as f64
}

/// Changed file -> names of the selected tests covering it (covered files only).
pub fn risk_coverage(
  selected: &[TestCase],
  risk_results: &[(ChangeMetrics, RiskScore)],
) -> BTreeMap<String, Vec<String>> {
  let changed: HashSet<&str> = risk_results.iter().map(|(c, _)| c.file_path.as_str()).collect();
  let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
  for test in selected {
    for file in &test.covered_files {
      if changed.contains(file.as_str()) {
        map.entry(file.clone()).or_default().push(test.test_name.clone());
      }
    }
  }
  map
}
