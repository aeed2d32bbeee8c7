//! Historical failure records and the historical-risk sub-score.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};

use crate::error::EngineError;
use crate::normalize::{self, read_file};
use crate::types::{HistoricalFailure, Severity};

/// Risk when no history exists at all (moderate uncertainty).
pub const NO_HISTORY_RISK: f64 = 0.3;
/// Risk when history exists but none of it concerns the file.
pub const CLEAN_FILE_RISK: f64 = 0.1;

/// Read-only failure history, loaded once and shared across runs.
#[derive(Debug, Clone, Default)]
pub struct FailureHistory {
  records: Vec<HistoricalFailure>,
}

impl FailureHistory {
  pub fn new(records: Vec<HistoricalFailure>) -> Self {
    Self { records }
  }

  pub fn empty() -> Self {
    Self::default()
  }

  pub fn from_json_str(raw: &str) -> Result<Self, EngineError> {
    let records = normalize::parse_entries(raw, "failure history", normalize::normalize_failure)?;
    Ok(Self::new(records))
  }

  pub fn load(path: &Path) -> Result<Self, EngineError> {
    let history = Self::from_json_str(&read_file(path)?)?;
    tracing::info!(path = %path.display(), records = history.len(), "loaded failure history");
    Ok(history)
  }

  pub fn records(&self) -> &[HistoricalFailure] {
    &self.records
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  /// Failures for `file_path` strictly newer than `since`.
  pub fn failures_since<'a>(
    &'a self,
    file_path: &'a str,
    since: DateTime<Utc>,
  ) -> impl Iterator<Item = &'a HistoricalFailure> + 'a {
    self
      .records
      .iter()
      .filter(move |f| f.file_path == file_path && f.timestamp > since)
  }
}

/// Historical risk for one file, in [0, 1].
///
/// - 0.3 when there is no history at all
/// - 0.1 when nothing for this file falls inside the window ending at `as_of`
/// - otherwise 0.7 * min(count / 10, 1) + 0.3 * high_severity_share
pub fn historical_risk(
  history: &FailureHistory,
  file_path: &str,
  as_of: DateTime<Utc>,
  window_days: u32,
) -> f64 {
  if history.is_empty() {
    return NO_HISTORY_RISK;
  }

  let cutoff = as_of - Duration::days(i64::from(window_days));
  let (count, high) = history
    .failures_since(file_path, cutoff)
    .fold((0usize, 0usize), |(count, high), f| {
      (count + 1, high + usize::from(f.severity == Severity::High))
    });

  if count == 0 {
    return CLEAN_FILE_RISK;
  }

  let frequency_risk = (count as f64 / 10.0).min(1.0);
  let severity_risk = high as f64 / count as f64;
  0.7 * frequency_risk + 0.3 * severity_risk
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
  }

  fn failure(path: &str, days_ago: i64, severity: Severity) -> HistoricalFailure {
    HistoricalFailure {
      timestamp: now() - Duration::days(days_ago),
      file_path: path.into(),
      failure_type: "test_failure".into(),
      severity,
      resolution_time_hours: 2.0,
      related_commits: vec![],
      metadata: Default::default(),
    }
  }

  #[test]
  fn no_history_is_moderate() {
    let risk = historical_risk(&FailureHistory::empty(), "a.py", now(), 90);
    assert_eq!(risk, NO_HISTORY_RISK);
  }

  #[test]
  fn unrelated_history_is_low() {
    let history = FailureHistory::new(vec![failure("b.py", 1, Severity::High)]);
    assert_eq!(historical_risk(&history, "a.py", now(), 90), CLEAN_FILE_RISK);
  }

  #[test]
  fn old_failures_fall_out_of_window() {
    let history = FailureHistory::new(vec![failure("a.py", 120, Severity::High)]);
    assert_eq!(historical_risk(&history, "a.py", now(), 90), CLEAN_FILE_RISK);
    // A wider window picks it up again.
    let wide = historical_risk(&history, "a.py", now(), 180);
    assert!((wide - (0.07 + 0.3)).abs() < 1e-9);
  }

  #[test]
  fn frequency_and_severity_blend() {
    let mut records: Vec<_> = (0..4).map(|d| failure("a.py", d, Severity::High)).collect();
    records.extend((0..4).map(|d| failure("a.py", d, Severity::Low)));
    let history = FailureHistory::new(records);
    // 8 failures, half high severity.
    let risk = historical_risk(&history, "a.py", now(), 90);
    assert!((risk - (0.7 * 0.8 + 0.3 * 0.5)).abs() < 1e-9);
  }

  #[test]
  fn frequency_saturates_at_ten() {
    let records: Vec<_> = (0..25).map(|d| failure("a.py", d, Severity::High)).collect();
    let risk = historical_risk(&FailureHistory::new(records), "a.py", now(), 90);
    assert!((risk - 1.0).abs() < 1e-9);
  }

  #[test]
  fn from_json_skips_bad_records() {
    let raw = r#"[
      {"timestamp": "2025-05-30T08:00:00", "file_path": "a.py", "failure_type": "crash",
       "severity": "high", "resolution_time_hours": 4.5, "related_commits": ["abc"]},
      {"timestamp": "garbage", "file_path": "a.py", "failure_type": "crash",
       "severity": "high", "resolution_time_hours": 1.0},
      {"file_path": "a.py"}
    ]"#;
    let history = FailureHistory::from_json_str(raw).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history.records()[0].severity, Severity::High);
    assert_eq!(history.records()[0].related_commits, vec!["abc".to_string()]);
  }
}
