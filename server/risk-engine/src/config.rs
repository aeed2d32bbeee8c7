//! Engine configuration with sane defaults.
//!
//! Mirrors the `config.yaml` layout used by the pipeline:
//!
//! ```yaml
//! feature_weights:
//!   code_complexity: 0.25
//!   historical_failures: 0.35
//!   change_magnitude: 0.20
//!   file_criticality: 0.20
//! risk_analysis:
//!   risk_levels: { high: 0.7, medium: 0.4, low: 0.2 }
//! test_selection:
//!   max_tests: 50
//!   prioritize_by_risk: true
//!   include_critical_tests: true
//!   dependency_closure: single_hop
//!   skip_root_directory_match: false
//! ```
//!
//! Missing keys fall back to defaults, unknown keys are ignored. Every load
//! path validates, so a nonsensical weight or threshold set fails here rather
//! than producing a silently wrong risk ordering.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::normalize::read_file;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub feature_weights: FeatureWeights,
  pub risk_analysis: RiskAnalysisConfig,
  pub test_selection: TestSelectionConfig,
}

/// Blend weights for the four risk sub-scores. Not renormalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureWeights {
  pub code_complexity: f64,
  pub historical_failures: f64,
  pub change_magnitude: f64,
  pub file_criticality: f64,
}

impl Default for FeatureWeights {
  fn default() -> Self {
    Self {
      code_complexity: 0.25,
      historical_failures: 0.35,
      change_magnitude: 0.20,
      file_criticality: 0.20,
    }
  }
}

/// Cut points for risk levels; a score at or above a cut point reaches that level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLevels {
  pub high: f64,
  pub medium: f64,
  pub low: f64,
}

impl Default for RiskLevels {
  fn default() -> Self {
    Self {
      high: 0.7,
      medium: 0.4,
      low: 0.2,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskAnalysisConfig {
  pub risk_levels: RiskLevels,
  /// Failures older than this many days do not count toward historical risk.
  pub history_window_days: u32,
  /// Minimum history size before a learned predictor may be blended in.
  pub min_history_for_model: usize,
}

impl Default for RiskAnalysisConfig {
  fn default() -> Self {
    Self {
      risk_levels: RiskLevels::default(),
      history_window_days: 90,
      min_history_for_model: 10,
    }
  }
}

/// How declared test dependencies are pulled into a selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyClosure {
  /// Direct dependencies of the truncated selection only; may exceed `max_tests`.
  #[default]
  SingleHop,
  /// Dependencies of dependencies too, stopping once `max_tests` is reached.
  Transitive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestSelectionConfig {
  pub max_tests: usize,
  /// Sort candidates by priority before truncating. When false, candidates
  /// keep insertion order (critical, coverage, historical area); the sort is
  /// otherwise unconditional.
  pub prioritize_by_risk: bool,
  pub include_critical_tests: bool,
  pub dependency_closure: DependencyClosure,
  /// Historical-area matching normally treats a root-level file's empty
  /// directory as matching every test path. Set to match only direct coverage.
  pub skip_root_directory_match: bool,
}

impl Default for TestSelectionConfig {
  fn default() -> Self {
    Self {
      max_tests: 50,
      prioritize_by_risk: true,
      include_critical_tests: true,
      dependency_closure: DependencyClosure::SingleHop,
      skip_root_directory_match: false,
    }
  }
}

impl Config {
  /// Load from a file: `.json` is read as JSON, anything else as YAML.
  pub fn load(path: &Path) -> Result<Self, EngineError> {
    let raw = read_file(path)?;
    let is_json = path
      .extension()
      .and_then(|ext| ext.to_str())
      .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let config = if is_json {
      Self::from_json_str(&raw)?
    } else {
      Self::from_yaml_str(&raw)?
    };
    tracing::info!(path = %path.display(), "loaded engine config");
    Ok(config)
  }

  pub fn from_yaml_str(raw: &str) -> Result<Self, EngineError> {
    // An empty document is a valid "all defaults" config.
    if raw.trim().is_empty() {
      return Ok(Self::default());
    }
    let config: Config = serde_yaml::from_str(raw)?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_json_str(raw: &str) -> Result<Self, EngineError> {
    let config: Config = serde_json::from_str(raw)?;
    config.validate()?;
    Ok(config)
  }

  /// Reject weights and thresholds that would make the risk ordering meaningless.
  pub fn validate(&self) -> Result<(), EngineError> {
    let w = &self.feature_weights;
    for (key, value) in [
      ("feature_weights.code_complexity", w.code_complexity),
      ("feature_weights.historical_failures", w.historical_failures),
      ("feature_weights.change_magnitude", w.change_magnitude),
      ("feature_weights.file_criticality", w.file_criticality),
    ] {
      if !value.is_finite() || value < 0.0 {
        return Err(EngineError::config(key, "must be a finite, non-negative number"));
      }
    }

    let t = &self.risk_analysis.risk_levels;
    for (key, value) in [
      ("risk_analysis.risk_levels.high", t.high),
      ("risk_analysis.risk_levels.medium", t.medium),
      ("risk_analysis.risk_levels.low", t.low),
    ] {
      if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(EngineError::config(key, "must be within [0, 1]"));
      }
    }
    if !(t.high > t.medium && t.medium > t.low) {
      return Err(EngineError::config(
        "risk_analysis.risk_levels",
        "thresholds must be strictly decreasing: high > medium > low",
      ));
    }

    if self.risk_analysis.history_window_days == 0 {
      return Err(EngineError::config(
        "risk_analysis.history_window_days",
        "must be at least 1",
      ));
    }
    if self.test_selection.max_tests == 0 {
      return Err(EngineError::config("test_selection.max_tests", "must be at least 1"));
    }
    Ok(())
  }
}
