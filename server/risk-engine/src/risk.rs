//! Per-file risk scoring: four weighted sub-scores, a clamped blend, a risk
//! level, and rule-table recommendations.
//!
//! Scoring is pure given the configuration, the failure history and the
//! `as_of` instant the history window is anchored to. An optional learned
//! predictor can be blended in; without one the rule-based score stands alone.

use chrono::{DateTime, Utc};

use crate::config::{Config, RiskLevels};
use crate::history::{self, FailureHistory};
use crate::types::{ChangeMetrics, ChangeType, RiskFactors, RiskLevel, RiskScore};

/// Floor for files without measured complexity.
const ZERO_COMPLEXITY_RISK: f64 = 0.1;
const NEUTRAL_PREDICTION: f64 = 0.5;
const RULE_CONFIDENCE: f64 = 0.6;
const BLENDED_CONFIDENCE: f64 = 0.8;
const RULE_BLEND_WEIGHT: f64 = 0.6;
const MODEL_BLEND_WEIGHT: f64 = 0.4;

// ---------------------------------------------------------------------------
// Learned-model extension point
// ---------------------------------------------------------------------------

/// Model inputs derived from one change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskFeatures {
  pub lines_added: f64,
  pub lines_removed: f64,
  pub total_lines_changed: f64,
  pub complexity: f64,
  pub maintainability: f64,
  pub is_critical: f64,
  pub functions_count: f64,
  pub is_database: f64,
  pub is_config: f64,
}

impl RiskFeatures {
  pub fn from_change(change: &ChangeMetrics) -> Self {
    let flag = |b: bool| if b { 1.0 } else { 0.0 };
    Self {
      lines_added: f64::from(change.lines_added),
      lines_removed: f64::from(change.lines_removed),
      total_lines_changed: f64::from(change.lines_changed()),
      complexity: change.complexity_delta,
      maintainability: change.maintainability_index,
      is_critical: flag(change.is_critical_file),
      functions_count: change.functions_modified.len() as f64,
      is_database: flag(change.change_type == ChangeType::Database),
      is_config: flag(change.change_type == ChangeType::Config),
    }
  }

  /// Fixed feature order for vector-based models.
  pub fn to_array(&self) -> [f64; 9] {
    [
      self.lines_added,
      self.lines_removed,
      self.total_lines_changed,
      self.complexity,
      self.maintainability,
      self.is_critical,
      self.functions_count,
      self.is_database,
      self.is_config,
    ]
  }
}

/// A trained failure classifier. Returns the failure probability, or `None`
/// to abstain (the rule-based score is then used unchanged).
pub trait FailurePredictor: Send + Sync {
  fn predict(&self, features: &RiskFeatures) -> Option<f64>;
}

// ---------------------------------------------------------------------------
// Sub-scores
// ---------------------------------------------------------------------------

pub fn complexity_risk(change: &ChangeMetrics) -> f64 {
  if change.complexity_delta == 0.0 {
    return ZERO_COMPLEXITY_RISK;
  }
  let complexity_score = (change.complexity_delta / 20.0).min(1.0);
  let maintainability_score = 1.0 - change.maintainability_index / 100.0;
  unit_score(0.6 * complexity_score + 0.4 * maintainability_score)
}

/// Clamp to [0, 1]; an undefined (NaN) score counts as maximal risk.
fn unit_score(score: f64) -> f64 {
  if score.is_nan() {
    1.0
  } else {
    score.clamp(0.0, 1.0)
  }
}

/// Change size, amplified for database (x1.5) and config (x1.3) changes.
pub fn magnitude_risk(change: &ChangeMetrics) -> f64 {
  let base = (f64::from(change.lines_changed()) / 500.0).min(1.0);
  let amplified = match change.change_type {
    ChangeType::Database => base * 1.5,
    ChangeType::Config => base * 1.3,
    ChangeType::Code => base,
  };
  amplified.min(1.0)
}

pub fn criticality_risk(change: &ChangeMetrics) -> f64 {
  if change.is_critical_file {
    1.0
  } else {
    0.2
  }
}

/// Highest level whose threshold the score meets.
pub fn risk_level(score: f64, thresholds: &RiskLevels) -> RiskLevel {
  if score >= thresholds.high {
    RiskLevel::High
  } else if score >= thresholds.medium {
    RiskLevel::Medium
  } else if score >= thresholds.low {
    RiskLevel::Low
  } else {
    RiskLevel::Minimal
  }
}

// ---------------------------------------------------------------------------
// Recommendation rules
// ---------------------------------------------------------------------------

type Rule = fn(&ChangeMetrics, &RiskFactors, RiskLevel) -> bool;

/// Evaluated in order; every rule that fires contributes its message.
const RECOMMENDATION_RULES: &[(Rule, &str)] = &[
  (
    |_, _, level| level == RiskLevel::High,
    "High-risk change detected. Consider thorough code review and run the full test suite before deployment.",
  ),
  (
    |_, factors, _| factors.complexity_risk > 0.6,
    "High complexity detected. Consider refactoring for maintainability.",
  ),
  (
    |_, factors, _| factors.historical_risk > 0.7,
    "This file has a history of failures. Extra scrutiny recommended.",
  ),
  (
    |change, _, _| change.is_critical_file,
    "Critical file modified. Ensure comprehensive testing.",
  ),
  (
    |change, _, _| change.change_type == ChangeType::Database,
    "Database change detected. Test rollback procedures and verify schema compatibility and data migration.",
  ),
  (
    |change, _, _| change.change_type == ChangeType::Config,
    "Configuration change. Test in staging environment first.",
  ),
  (
    |_, factors, _| factors.magnitude_risk > 0.7,
    "Large change detected. Consider breaking into smaller commits.",
  ),
  (
    |change, _, _| change.maintainability_index < 50.0,
    "Low maintainability index. Code may be difficult to maintain.",
  ),
];

pub const LOW_RISK_RECOMMENDATION: &str = "Change appears low-risk. Standard review process recommended.";

fn recommendations(change: &ChangeMetrics, factors: &RiskFactors, level: RiskLevel) -> Vec<String> {
  let mut out: Vec<String> = RECOMMENDATION_RULES
    .iter()
    .filter(|(applies, _)| applies(change, factors, level))
    .map(|(_, message)| message.to_string())
    .collect();
  if out.is_empty() {
    out.push(LOW_RISK_RECOMMENDATION.to_string());
  }
  out
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Scores changes against one configuration and one history snapshot.
pub struct RiskScorer<'a> {
  config: &'a Config,
  history: &'a FailureHistory,
  as_of: DateTime<Utc>,
  predictor: Option<&'a dyn FailurePredictor>,
}

impl<'a> RiskScorer<'a> {
  pub fn new(config: &'a Config, history: &'a FailureHistory, as_of: DateTime<Utc>) -> Self {
    Self {
      config,
      history,
      as_of,
      predictor: None,
    }
  }

  pub fn with_predictor(mut self, predictor: &'a dyn FailurePredictor) -> Self {
    self.predictor = Some(predictor);
    self
  }

  pub fn score(&self, change: &ChangeMetrics) -> RiskScore {
    let factors = RiskFactors {
      complexity_risk: complexity_risk(change),
      historical_risk: history::historical_risk(
        self.history,
        &change.file_path,
        self.as_of,
        self.config.risk_analysis.history_window_days,
      ),
      magnitude_risk: magnitude_risk(change),
      criticality_risk: criticality_risk(change),
    };

    let w = &self.config.feature_weights;
    let mut overall = factors.complexity_risk * w.code_complexity
      + factors.historical_risk * w.historical_failures
      + factors.magnitude_risk * w.change_magnitude
      + factors.criticality_risk * w.file_criticality;

    let mut predicted = NEUTRAL_PREDICTION;
    let mut confidence = RULE_CONFIDENCE;
    if let Some(probability) = self.model_prediction(change) {
      overall = RULE_BLEND_WEIGHT * overall + MODEL_BLEND_WEIGHT * probability;
      predicted = probability;
      confidence = BLENDED_CONFIDENCE;
    }

    let overall_risk = unit_score(overall);
    let risk_level = risk_level(overall_risk, &self.config.risk_analysis.risk_levels);
    let recommendations = recommendations(change, &factors, risk_level);

    RiskScore {
      overall_risk,
      risk_level,
      confidence,
      risk_factors: factors,
      recommendations,
      predicted_failure_probability: predicted,
    }
  }

  pub fn score_all(&self, changes: &[ChangeMetrics]) -> Vec<(ChangeMetrics, RiskScore)> {
    changes
      .iter()
      .map(|change| (change.clone(), self.score(change)))
      .collect()
  }

  fn model_prediction(&self, change: &ChangeMetrics) -> Option<f64> {
    let predictor = self.predictor?;
    if self.history.len() < self.config.risk_analysis.min_history_for_model {
      return None;
    }
    match predictor.predict(&RiskFeatures::from_change(change)) {
      Some(p) if p.is_finite() => Some(p.clamp(0.0, 1.0)),
      _ => {
        tracing::debug!(file = %change.file_path, "failure predictor abstained");
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{HistoricalFailure, Severity};
  use chrono::{Duration, TimeZone};

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
  }

  fn login_change() -> ChangeMetrics {
    ChangeMetrics::new("auth/login.py", 50, 10, 25.0, 40.0, vec!["login".to_string()])
  }

  fn history_for(path: &str, n: usize, severity: Severity) -> FailureHistory {
    FailureHistory::new(
      (0..n)
        .map(|i| HistoricalFailure {
          timestamp: now() - Duration::days(i as i64 % 30),
          file_path: path.into(),
          failure_type: "test_failure".into(),
          severity,
          resolution_time_hours: 1.0,
          related_commits: vec![],
          metadata: Default::default(),
        })
        .collect(),
    )
  }

  struct Fixed(Option<f64>);

  impl FailurePredictor for Fixed {
    fn predict(&self, _features: &RiskFeatures) -> Option<f64> {
      self.0
    }
  }

  #[test]
  fn login_scenario_scores_medium() {
    let config = Config::default();
    let history = FailureHistory::empty();
    let score = RiskScorer::new(&config, &history, now()).score(&login_change());

    let f = score.risk_factors;
    assert!((f.complexity_risk - 0.84).abs() < 1e-9);
    assert_eq!(f.historical_risk, 0.3);
    assert!((f.magnitude_risk - 0.12).abs() < 1e-9);
    assert_eq!(f.criticality_risk, 1.0);
    // 0.25*0.84 + 0.35*0.3 + 0.20*0.12 + 0.20*1.0
    assert!((score.overall_risk - 0.539).abs() < 1e-9);
    assert_eq!(score.risk_level, RiskLevel::Medium);
    assert_eq!(score.confidence, 0.6);
    assert_eq!(score.predicted_failure_probability, 0.5);
  }

  #[test]
  fn undefined_metrics_score_as_maximal_risk() {
    let config = Config::default();
    let history = FailureHistory::empty();
    let change = ChangeMetrics::new("src/util.rs", 1, 0, 5.0, f64::NAN, vec![]);
    let score = RiskScorer::new(&config, &history, now()).score(&change);

    assert_eq!(score.risk_factors.complexity_risk, 1.0);
    assert!((0.0..=1.0).contains(&score.overall_risk));
    assert_eq!(score.risk_level, risk_level(score.overall_risk, &config.risk_analysis.risk_levels));

    let change = ChangeMetrics::new("src/util.rs", 1, 0, f64::NAN, 80.0, vec![]);
    let score = RiskScorer::new(&config, &history, now()).score(&change);
    assert!((0.0..=1.0).contains(&score.risk_factors.complexity_risk));
    assert!((0.0..=1.0).contains(&score.overall_risk));
  }

  #[test]
  fn zero_complexity_has_floor() {
    let change = ChangeMetrics::new("src/util.rs", 1, 0, 0.0, 10.0, vec![]);
    assert_eq!(complexity_risk(&change), 0.1);
  }

  #[test]
  fn magnitude_amplifies_database_and_config() {
    let db = ChangeMetrics::new("db/001.sql", 100, 0, 0.0, 100.0, vec![]);
    let cfg = ChangeMetrics::new("deploy.yaml", 100, 0, 0.0, 100.0, vec![]);
    let code = ChangeMetrics::new("src/a.rs", 100, 0, 0.0, 100.0, vec![]);
    assert!((magnitude_risk(&db) - 0.3).abs() < 1e-9);
    assert!((magnitude_risk(&cfg) - 0.26).abs() < 1e-9);
    assert!((magnitude_risk(&code) - 0.2).abs() < 1e-9);

    let huge_db = ChangeMetrics::new("db/002.sql", 400, 0, 0.0, 100.0, vec![]);
    assert_eq!(magnitude_risk(&huge_db), 1.0);
  }

  #[test]
  fn levels_follow_thresholds() {
    let t = RiskLevels::default();
    assert_eq!(risk_level(0.7, &t), RiskLevel::High);
    assert_eq!(risk_level(0.69, &t), RiskLevel::Medium);
    assert_eq!(risk_level(0.4, &t), RiskLevel::Medium);
    assert_eq!(risk_level(0.2, &t), RiskLevel::Low);
    assert_eq!(risk_level(0.19, &t), RiskLevel::Minimal);
  }

  #[test]
  fn heavy_weights_are_clamped() {
    let mut config = Config::default();
    config.feature_weights.file_criticality = 2.0;
    let history = FailureHistory::empty();
    let score = RiskScorer::new(&config, &history, now()).score(&login_change());
    assert_eq!(score.overall_risk, 1.0);
    assert_eq!(score.risk_level, RiskLevel::High);
  }

  #[test]
  fn recommendations_follow_rule_order() {
    let config = Config::default();
    let history = history_for("db/migrations/001_users.sql", 10, Severity::High);
    let change = ChangeMetrics::new("db/migrations/001_users.sql", 600, 0, 30.0, 20.0, vec![]);
    let score = RiskScorer::new(&config, &history, now()).score(&change);

    assert_eq!(score.risk_level, RiskLevel::High);
    let expected: Vec<String> = [0usize, 1, 2, 3, 4, 6, 7]
      .iter()
      .map(|&i| RECOMMENDATION_RULES[i].1.to_string())
      .collect();
    assert_eq!(score.recommendations, expected);
  }

  #[test]
  fn quiet_change_gets_low_risk_message() {
    let config = Config::default();
    let history = FailureHistory::empty();
    let change = ChangeMetrics::new("src/utils/format.rs", 3, 1, 0.0, 90.0, vec![]);
    let score = RiskScorer::new(&config, &history, now()).score(&change);
    assert_eq!(score.recommendations, vec![LOW_RISK_RECOMMENDATION.to_string()]);
  }

  #[test]
  fn predictor_blends_with_enough_history() {
    let config = Config::default();
    let history = history_for("elsewhere.py", 10, Severity::Low);
    let model = Fixed(Some(0.9));
    let scorer = RiskScorer::new(&config, &history, now()).with_predictor(&model);
    let score = scorer.score(&login_change());

    // Rule part: historical risk is 0.1 (history exists, none for this file).
    let rule = 0.25 * 0.84 + 0.35 * 0.1 + 0.20 * 0.12 + 0.20 * 1.0;
    assert!((score.overall_risk - (0.6 * rule + 0.4 * 0.9)).abs() < 1e-9);
    assert_eq!(score.confidence, 0.8);
    assert_eq!(score.predicted_failure_probability, 0.9);
  }

  #[test]
  fn predictor_ignored_with_thin_history() {
    let config = Config::default();
    let history = history_for("elsewhere.py", 9, Severity::Low);
    let model = Fixed(Some(0.9));
    let score = RiskScorer::new(&config, &history, now())
      .with_predictor(&model)
      .score(&login_change());
    assert_eq!(score.confidence, 0.6);
    assert_eq!(score.predicted_failure_probability, 0.5);
  }

  #[test]
  fn abstaining_predictor_keeps_rule_score() {
    let config = Config::default();
    let history = history_for("elsewhere.py", 12, Severity::Low);
    let plain = RiskScorer::new(&config, &history, now()).score(&login_change());
    let model = Fixed(None);
    let with_model = RiskScorer::new(&config, &history, now())
      .with_predictor(&model)
      .score(&login_change());
    assert_eq!(plain, with_model);
  }

  #[test]
  fn features_follow_change() {
    let f = RiskFeatures::from_change(&login_change());
    assert_eq!(f.to_array(), [50.0, 10.0, 60.0, 25.0, 40.0, 1.0, 1.0, 0.0, 0.0]);
  }
}
