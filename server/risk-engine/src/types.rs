//! Core types for the risk engine (JSON contracts + internal models).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::change_type::{classify_change_type, is_critical_path};
use crate::normalize::normalize_path;

// ---------------------------------------------------------------------------
// Change metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
  Code,
  Config,
  Database,
}

impl ChangeType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Code => "code",
      Self::Config => "config",
      Self::Database => "database",
    }
  }
}

/// Per-file summary of one change. Classification fields are derived from the
/// path once, at construction; deserialization goes through [`InboundChange`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "InboundChange")]
pub struct ChangeMetrics {
  pub file_path: String,
  pub lines_added: u32,
  pub lines_removed: u32,
  /// Sum of per-function cyclomatic complexity.
  pub complexity_delta: f64,
  /// Conventionally 0-100, higher is healthier.
  pub maintainability_index: f64,
  pub functions_modified: BTreeSet<String>,
  pub is_critical_file: bool,
  pub change_type: ChangeType,
}

impl ChangeMetrics {
  pub fn new(
    file_path: &str,
    lines_added: u32,
    lines_removed: u32,
    complexity_delta: f64,
    maintainability_index: f64,
    functions_modified: impl IntoIterator<Item = String>,
  ) -> Self {
    let file_path = normalize_path(file_path);
    Self {
      is_critical_file: is_critical_path(&file_path),
      change_type: classify_change_type(&file_path),
      file_path,
      lines_added,
      lines_removed,
      complexity_delta,
      maintainability_index,
      functions_modified: functions_modified.into_iter().collect(),
    }
  }

  pub fn lines_changed(&self) -> u32 {
    self.lines_added.saturating_add(self.lines_removed)
  }
}

/// Per-file metrics as supplied by the diff/static-analysis collaborator.
/// Classification is not accepted from the caller; it is recomputed from the path.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundChange {
  pub file_path: String,
  #[serde(default)]
  pub lines_added: u32,
  #[serde(default)]
  pub lines_removed: u32,
  #[serde(default)]
  pub complexity_delta: f64,
  #[serde(default = "default_maintainability")]
  pub maintainability_index: f64,
  #[serde(default)]
  pub functions_modified: Vec<String>,
}

fn default_maintainability() -> f64 {
  100.0
}

impl From<InboundChange> for ChangeMetrics {
  fn from(raw: InboundChange) -> Self {
    ChangeMetrics::new(
      &raw.file_path,
      raw.lines_added,
      raw.lines_removed,
      raw.complexity_delta.max(0.0),
      raw.maintainability_index,
      raw.functions_modified,
    )
  }
}

// ---------------------------------------------------------------------------
// Risk score
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
  Minimal,
  Low,
  Medium,
  High,
}

impl RiskLevel {
  pub const ALL: [RiskLevel; 4] = [Self::High, Self::Medium, Self::Low, Self::Minimal];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Minimal => "minimal",
      Self::Low => "low",
      Self::Medium => "medium",
      Self::High => "high",
    }
  }
}

/// The four sub-scores, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
  pub complexity_risk: f64,
  pub historical_risk: f64,
  pub magnitude_risk: f64,
  pub criticality_risk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
  pub overall_risk: f64,
  pub risk_level: RiskLevel,
  pub confidence: f64,
  pub risk_factors: RiskFactors,
  /// Highest priority first.
  pub recommendations: Vec<String>,
  pub predicted_failure_probability: f64,
}

/// A scored file, as carried in reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRisk {
  pub change: ChangeMetrics,
  pub risk: RiskScore,
}

// ---------------------------------------------------------------------------
// Historical failures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Low,
  Medium,
  High,
  Unknown,
}

impl Severity {
  pub fn from_str_loose(s: &str) -> Self {
    match s.trim().to_ascii_lowercase().as_str() {
      "low" => Self::Low,
      "medium" | "moderate" => Self::Medium,
      "high" => Self::High,
      _ => Self::Unknown,
    }
  }
}

/// One failure history record line. Unknown fields are silently ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFailure {
  pub timestamp: String,
  pub file_path: String,
  pub failure_type: String,
  pub severity: String,
  pub resolution_time_hours: f64,
  #[serde(default)]
  pub related_commits: Vec<String>,
  #[serde(default)]
  pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalFailure {
  pub timestamp: DateTime<Utc>,
  pub file_path: String,
  pub failure_type: String,
  pub severity: Severity,
  pub resolution_time_hours: f64,
  pub related_commits: Vec<String>,
  pub metadata: HashMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Test catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
  Unit,
  Integration,
  E2e,
  Performance,
  Unknown,
}

impl TestType {
  pub fn from_str_loose(s: &str) -> Self {
    match s.trim().to_ascii_lowercase().as_str() {
      "unit" => Self::Unit,
      "integration" => Self::Integration,
      "e2e" | "end-to-end" | "end_to_end" => Self::E2e,
      "performance" | "perf" => Self::Performance,
      _ => Self::Unknown,
    }
  }

  /// Preference for cheaper test kinds at similar coverage.
  pub fn weight(self) -> f64 {
    match self {
      Self::Unit => 0.9,
      Self::Integration => 0.7,
      Self::Performance => 0.6,
      Self::E2e => 0.5,
      Self::Unknown => 0.5,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Unit => "unit",
      Self::Integration => "integration",
      Self::E2e => "e2e",
      Self::Performance => "performance",
      Self::Unknown => "unknown",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
  Critical,
  High,
  Medium,
  Low,
  Unknown,
}

impl Criticality {
  pub fn from_str_loose(s: &str) -> Self {
    match s.trim().to_ascii_lowercase().as_str() {
      "critical" => Self::Critical,
      "high" => Self::High,
      "medium" => Self::Medium,
      "low" => Self::Low,
      _ => Self::Unknown,
    }
  }

  pub fn weight(self) -> f64 {
    match self {
      Self::Critical => 1.0,
      Self::High => 0.8,
      Self::Medium => 0.5,
      Self::Low => 0.3,
      Self::Unknown => 0.5,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Critical => "critical",
      Self::High => "high",
      Self::Medium => "medium",
      Self::Low => "low",
      Self::Unknown => "unknown",
    }
  }
}

/// One catalog entry as stored in the catalog JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundTestCase {
  pub test_id: String,
  pub test_name: String,
  pub test_path: String,
  pub test_type: String,
  pub execution_time_seconds: f64,
  pub covered_files: Vec<String>,
  #[serde(default = "default_criticality")]
  pub criticality: String,
  #[serde(default)]
  pub last_failure_date: Option<String>,
  #[serde(default)]
  pub failure_count: u32,
  #[serde(default)]
  pub dependencies: Vec<String>,
}

fn default_criticality() -> String {
  "medium".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCase {
  pub test_id: String,
  pub test_name: String,
  pub test_path: String,
  pub test_type: TestType,
  pub execution_time_seconds: f64,
  pub covered_files: BTreeSet<String>,
  pub criticality: Criticality,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_failure_date: Option<String>,
  pub failure_count: u32,
  /// Ids of tests that must run alongside this one, declaration order, no repeats.
  pub dependencies: Vec<String>,
}

// ---------------------------------------------------------------------------
// Test selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestSelection {
  /// Priority order, no duplicate ids.
  pub selected_tests: Vec<TestCase>,
  /// test_id -> why it was selected.
  pub reason_map: BTreeMap<String, String>,
  pub total_estimated_time: f64,
  pub coverage_score: f64,
  /// Changed file -> names of selected tests covering it.
  pub risk_coverage: BTreeMap<String, Vec<String>>,
}

impl TestSelection {
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn contains(&self, test_id: &str) -> bool {
    self.selected_tests.iter().any(|t| t.test_id == test_id)
  }
}

// ---------------------------------------------------------------------------
// External assessments (schema analysis + drift detection collaborators)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaRiskLevel {
  Moderate,
  High,
  Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaAssessment {
  pub risk_level: SchemaRiskLevel,
  #[serde(default)]
  pub affected_tables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftAssessment {
  pub average_drift_score: f64,
  #[serde(default)]
  pub high_drift_columns: Vec<String>,
}
