//! Run summaries consumed by the report/export layer.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::{ChangeMetrics, ChangeType, RiskLevel, RiskScore, TestSelection};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeSummary {
  pub total_files_changed: usize,
  pub total_lines_added: u64,
  pub total_lines_removed: u64,
  pub changes_by_type: BTreeMap<String, usize>,
  pub critical_files_changed: usize,
  pub average_complexity: f64,
  pub critical_files: Vec<String>,
}

impl ChangeSummary {
  pub fn from_changes(changes: &[ChangeMetrics]) -> Self {
    let mut changes_by_type: BTreeMap<String, usize> = [ChangeType::Code, ChangeType::Config, ChangeType::Database]
      .iter()
      .map(|t| (t.as_str().to_string(), 0))
      .collect();
    for change in changes {
      *changes_by_type.entry(change.change_type.as_str().to_string()).or_default() += 1;
    }

    let critical_files: Vec<String> = changes
      .iter()
      .filter(|c| c.is_critical_file)
      .map(|c| c.file_path.clone())
      .collect();

    let average_complexity = if changes.is_empty() {
      0.0
    } else {
      changes.iter().map(|c| c.complexity_delta).sum::<f64>() / changes.len() as f64
    };

    Self {
      total_files_changed: changes.len(),
      total_lines_added: changes.iter().map(|c| u64::from(c.lines_added)).sum(),
      total_lines_removed: changes.iter().map(|c| u64::from(c.lines_removed)).sum(),
      changes_by_type,
      critical_files_changed: critical_files.len(),
      average_complexity,
      critical_files,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskSummary {
  pub total_changes: usize,
  pub average_risk: f64,
  pub max_risk: f64,
  pub risk_distribution: BTreeMap<String, usize>,
  pub high_risk_files: Vec<String>,
  pub deployment_recommendation: String,
}

impl RiskSummary {
  pub fn from_results(results: &[(ChangeMetrics, RiskScore)]) -> Self {
    let mut risk_distribution: BTreeMap<String, usize> =
      RiskLevel::ALL.iter().map(|l| (l.as_str().to_string(), 0)).collect();
    for (_, score) in results {
      *risk_distribution.entry(score.risk_level.as_str().to_string()).or_default() += 1;
    }

    let (average_risk, max_risk) = if results.is_empty() {
      (0.0, 0.0)
    } else {
      let sum: f64 = results.iter().map(|(_, s)| s.overall_risk).sum();
      let max = results.iter().map(|(_, s)| s.overall_risk).fold(0.0, f64::max);
      (sum / results.len() as f64, max)
    };

    Self {
      total_changes: results.len(),
      average_risk,
      max_risk,
      risk_distribution,
      high_risk_files: results
        .iter()
        .filter(|(_, s)| s.risk_level == RiskLevel::High)
        .map(|(c, _)| c.file_path.clone())
        .collect(),
      deployment_recommendation: risk_recommendation(average_risk, max_risk).to_string(),
    }
  }
}

/// Per-file risk verdict, worst signal first.
pub fn risk_recommendation(average_risk: f64, max_risk: f64) -> &'static str {
  if max_risk > 0.8 {
    "HALT - Critical risk detected. Do not deploy until addressed."
  } else if average_risk > 0.6 {
    "CAUTION - High average risk. Thorough testing required."
  } else if max_risk > 0.6 {
    "REVIEW - Some high-risk changes. Focus testing on flagged areas."
  } else if average_risk > 0.4 {
    "PROCEED WITH CARE - Moderate risk. Standard testing recommended."
  } else {
    "PROCEED - Low risk. Standard deployment process."
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionSummary {
  pub total_tests_selected: usize,
  pub estimated_execution_time_minutes: f64,
  pub coverage_score: f64,
  pub tests_by_type: BTreeMap<String, usize>,
  pub tests_by_criticality: BTreeMap<String, usize>,
  pub files_with_coverage: usize,
  pub recommendation: String,
}

impl SelectionSummary {
  pub fn from_selection(selection: &TestSelection) -> Self {
    let mut tests_by_type: BTreeMap<String, usize> = BTreeMap::new();
    let mut tests_by_criticality: BTreeMap<String, usize> = BTreeMap::new();
    for test in &selection.selected_tests {
      *tests_by_type.entry(test.test_type.as_str().to_string()).or_default() += 1;
      *tests_by_criticality.entry(test.criticality.as_str().to_string()).or_default() += 1;
    }

    Self {
      total_tests_selected: selection.selected_tests.len(),
      estimated_execution_time_minutes: selection.total_estimated_time / 60.0,
      coverage_score: selection.coverage_score,
      tests_by_type,
      tests_by_criticality,
      files_with_coverage: selection.risk_coverage.len(),
      recommendation: coverage_recommendation(selection).to_string(),
    }
  }
}

fn coverage_recommendation(selection: &TestSelection) -> &'static str {
  if selection.selected_tests.is_empty() {
    return "No tests selected.";
  }
  match selection.coverage_score {
    c if c >= 0.9 => "Excellent test coverage for changed files.",
    c if c >= 0.7 => "Good test coverage. Consider adding tests for uncovered files.",
    c if c >= 0.5 => "Moderate coverage. Some changed files lack test coverage.",
    _ => "Low test coverage. Many changed files are not covered by tests.",
  }
}
