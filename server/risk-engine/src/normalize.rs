//! Normalize inbound reference data into canonical internal models.
//!
//! Reference files are read tolerantly: the document must be a JSON array, but
//! an element that does not parse or validate is skipped with a warning and
//! the rest of the file is still used.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;

use crate::error::EngineError;
use crate::types::*;

/// Read a whole file, mapping I/O failures to `EngineError::Io`.
pub(crate) fn read_file(path: &Path) -> Result<String, EngineError> {
  std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))
}

/// Parse a JSON array and normalize each element, skipping bad ones.
pub(crate) fn parse_entries<R, T, F>(raw: &str, kind: &str, normalize: F) -> Result<Vec<T>, EngineError>
where
  R: DeserializeOwned,
  F: Fn(R) -> Result<T, EngineError>,
{
  let doc: serde_json::Value = serde_json::from_str(raw)?;
  let items = match doc {
    serde_json::Value::Array(items) => items,
    _ => return Err(EngineError::parse(format!("{}: expected a JSON array", kind))),
  };

  let total = items.len();
  let mut out = Vec::with_capacity(total);
  for (index, item) in items.into_iter().enumerate() {
    let normalized = serde_json::from_value::<R>(item)
      .map_err(EngineError::from)
      .and_then(&normalize);
    match normalized {
      Ok(v) => out.push(v),
      Err(e) => tracing::warn!(kind, index, error = %e, "skipping malformed entry"),
    }
  }
  if out.len() < total {
    tracing::warn!(kind, kept = out.len(), skipped = total - out.len(), "some entries were skipped");
  }
  Ok(out)
}

/// Validate and normalize a catalog entry.
pub fn normalize_test_case(raw: InboundTestCase) -> Result<TestCase, EngineError> {
  let test_id = raw.test_id.trim().to_string();
  if test_id.is_empty() {
    return Err(EngineError::validation("test_id", "must not be empty"));
  }
  if !raw.execution_time_seconds.is_finite() || raw.execution_time_seconds < 0.0 {
    return Err(EngineError::validation(
      "execution_time_seconds",
      "must be a finite, non-negative number",
    ));
  }

  let mut seen = HashSet::new();
  let dependencies = raw
    .dependencies
    .into_iter()
    .map(|d| d.trim().to_string())
    .filter(|d| !d.is_empty() && *d != test_id && seen.insert(d.clone()))
    .collect();

  Ok(TestCase {
    test_name: raw.test_name,
    test_path: normalize_path(&raw.test_path),
    test_type: TestType::from_str_loose(&raw.test_type),
    execution_time_seconds: raw.execution_time_seconds,
    covered_files: raw.covered_files.iter().map(|f| normalize_path(f)).collect(),
    criticality: Criticality::from_str_loose(&raw.criticality),
    last_failure_date: raw.last_failure_date,
    failure_count: raw.failure_count,
    dependencies,
    test_id,
  })
}

/// Validate and normalize a failure history record.
pub fn normalize_failure(raw: InboundFailure) -> Result<HistoricalFailure, EngineError> {
  let timestamp = parse_timestamp(&raw.timestamp)
    .ok_or_else(|| EngineError::validation("timestamp", "expected RFC3339 or ISO-8601 date/time"))?;
  if raw.file_path.trim().is_empty() {
    return Err(EngineError::validation("file_path", "must not be empty"));
  }

  Ok(HistoricalFailure {
    timestamp,
    file_path: normalize_path(&raw.file_path),
    failure_type: raw.failure_type,
    severity: Severity::from_str_loose(&raw.severity),
    resolution_time_hours: raw.resolution_time_hours,
    related_commits: raw.related_commits,
    metadata: raw.metadata,
  })
}

/// RFC3339 first; naive ISO-8601 date/time or bare date are read as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  let s = s.trim();
  if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
    return Some(ts.with_timezone(&Utc));
  }
  for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
      return Some(naive.and_utc());
    }
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|naive| naive.and_utc())
}

/// Normalize a file path for stable comparison:
/// - backslash -> forward slash
/// - collapse repeated slashes
/// - strip leading ./
///
/// Case is preserved; catalog and diff paths are matched exactly.
pub fn normalize_path(p: &str) -> String {
  let s = p.trim().replace('\\', "/");
  let mut out = String::with_capacity(s.len());
  let mut prev_slash = false;
  for ch in s.chars() {
    if ch == '/' {
      if !prev_slash {
        out.push('/');
      }
      prev_slash = true;
    } else {
      prev_slash = false;
      out.push(ch);
    }
  }
  let mut trimmed = out.as_str();
  while let Some(rest) = trimmed.strip_prefix("./") {
    trimmed = rest;
  }
  trimmed.to_string()
}
