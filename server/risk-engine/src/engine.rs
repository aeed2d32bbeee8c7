//! Core engine: scores one change set, selects tests, folds everything into a
//! single deployment risk and recommendation.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::risk::{FailurePredictor, RiskScorer};
use crate::selector;
use crate::snapshot::ReferenceData;
use crate::summary::{ChangeSummary, RiskSummary, SelectionSummary};
use crate::types::*;

/// One analysis run's inputs.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
  pub changes: Vec<ChangeMetrics>,
  /// Anchor for the failure-history window.
  pub as_of: DateTime<Utc>,
  pub commit: Option<String>,
  pub schema: Option<SchemaAssessment>,
  pub drift: Option<DriftAssessment>,
}

impl AnalysisRequest {
  pub fn new(changes: Vec<ChangeMetrics>, as_of: DateTime<Utc>) -> Self {
    Self {
      changes,
      as_of,
      commit: None,
      schema: None,
      drift: None,
    }
  }

  pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
    self.commit = Some(commit.into());
    self
  }

  pub fn with_schema(mut self, schema: SchemaAssessment) -> Self {
    self.schema = Some(schema);
    self
  }

  pub fn with_drift(mut self, drift: DriftAssessment) -> Self {
    self.drift = Some(drift);
    self
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
  pub analysis_id: String,
  pub as_of: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub commit: Option<String>,
  pub change_summary: ChangeSummary,
  pub risk_summary: RiskSummary,
  pub selection_summary: SelectionSummary,
  pub file_risks: Vec<FileRisk>,
  pub test_selection: TestSelection,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub schema: Option<SchemaAssessment>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub drift: Option<DriftAssessment>,
  pub deployment_risk_score: f64,
  pub risk_flags: Vec<String>,
  pub overall_recommendation: String,
}

/// Deployment verdict from the additive-penalty model.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentAssessment {
  pub risk: f64,
  pub flags: Vec<String>,
  pub recommendation: String,
}

/// Start from the mean file risk (coarse buckets above 0.5), add penalties for
/// thin coverage, schema changes and data drift, clamp to [0, 1].
pub fn assess_deployment(
  average_risk: f64,
  coverage_score: f64,
  schema: Option<&SchemaAssessment>,
  drift: Option<&DriftAssessment>,
) -> DeploymentAssessment {
  let mut flags: Vec<&str> = Vec::new();

  let mut risk = if average_risk > 0.7 {
    flags.push("CRITICAL CODE RISK");
    0.9
  } else if average_risk > 0.5 {
    flags.push("HIGH CODE RISK");
    0.7
  } else {
    average_risk
  };

  if coverage_score < 0.5 {
    flags.push("LOW TEST COVERAGE");
    risk += 0.2;
  }

  match schema.map(|s| s.risk_level) {
    Some(SchemaRiskLevel::Critical) => {
      flags.push("CRITICAL SCHEMA CHANGES");
      risk += 0.3;
    }
    Some(SchemaRiskLevel::High) => {
      flags.push("HIGH-RISK SCHEMA CHANGES");
      risk += 0.15;
    }
    Some(SchemaRiskLevel::Moderate) | None => {}
  }

  if let Some(drift) = drift {
    if drift.average_drift_score > 0.7 {
      flags.push("SIGNIFICANT DATA DRIFT");
      risk += 0.25;
    } else if drift.average_drift_score > 0.4 {
      flags.push("MODERATE DATA DRIFT");
      risk += 0.1;
    }
  }

  let risk = risk.clamp(0.0, 1.0);
  let verdict = deployment_verdict(risk);
  let recommendation = if flags.is_empty() {
    verdict.to_string()
  } else {
    format!("{}\n\n{}", flags.join("\n"), verdict)
  };

  DeploymentAssessment {
    risk,
    flags: flags.into_iter().map(String::from).collect(),
    recommendation,
  }
}

fn deployment_verdict(risk: f64) -> &'static str {
  if risk >= 0.8 {
    "DO NOT DEPLOY - Critical issues detected. Address all high-risk items before proceeding."
  } else if risk >= 0.6 {
    "DEPLOY WITH EXTREME CAUTION - Multiple risk factors present. Ensure comprehensive testing and monitoring."
  } else if risk >= 0.4 {
    "PROCEED CAREFULLY - Moderate risk detected. Follow standard testing procedures and monitor closely."
  } else if risk >= 0.2 {
    "SAFE TO DEPLOY - Low risk. Standard deployment process recommended."
  } else {
    "SAFE TO DEPLOY - Minimal risk detected. Changes appear safe."
  }
}

/// Stable run id from the commit and the set of changed paths.
fn analysis_id(commit: Option<&str>, changes: &[ChangeMetrics]) -> String {
  let mut paths: Vec<&str> = changes.iter().map(|c| c.file_path.as_str()).collect();
  paths.sort_unstable();

  let mut hasher = blake3::Hasher::new();
  hasher.update(commit.unwrap_or("staged").as_bytes());
  for path in paths {
    hasher.update(b"|");
    hasher.update(path.as_bytes());
  }
  let hex = hasher.finalize().to_hex();
  format!("run-{}", &hex.as_str()[..16])
}

/// The risk engine. Holds configuration and a reference snapshot; every
/// analysis is independent and the engine is safe to share across threads.
pub struct Engine {
  config: Config,
  reference: Arc<ReferenceData>,
  predictor: Option<Box<dyn FailurePredictor>>,
}

impl Engine {
  pub fn new(config: Config, reference: Arc<ReferenceData>) -> Self {
    Self {
      config,
      reference,
      predictor: None,
    }
  }

  pub fn with_defaults() -> Self {
    Self::new(Config::default(), Arc::new(ReferenceData::empty()))
  }

  /// Enable the learned-model blend.
  pub fn with_predictor(mut self, predictor: Box<dyn FailurePredictor>) -> Self {
    self.predictor = Some(predictor);
    self
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn reference(&self) -> &Arc<ReferenceData> {
    &self.reference
  }

  /// Score changes against the engine's own reference snapshot.
  pub fn score(&self, changes: &[ChangeMetrics], as_of: DateTime<Utc>) -> Vec<(ChangeMetrics, RiskScore)> {
    self.score_with(&self.reference, changes, as_of)
  }

  fn score_with(
    &self,
    reference: &ReferenceData,
    changes: &[ChangeMetrics],
    as_of: DateTime<Utc>,
  ) -> Vec<(ChangeMetrics, RiskScore)> {
    let scorer = RiskScorer::new(&self.config, &reference.history, as_of);
    let scorer = match &self.predictor {
      Some(predictor) => scorer.with_predictor(predictor.as_ref()),
      None => scorer,
    };
    scorer.score_all(changes)
  }

  pub fn analyze(&self, request: &AnalysisRequest) -> AnalysisReport {
    self.analyze_with(&self.reference, request)
  }

  /// Analyze against an explicit snapshot (e.g. one taken from a
  /// [`ReferenceStore`](crate::snapshot::ReferenceStore)).
  pub fn analyze_with(&self, reference: &ReferenceData, request: &AnalysisRequest) -> AnalysisReport {
    let analysis_id = analysis_id(request.commit.as_deref(), &request.changes);
    let _span = tracing::info_span!("analyze", %analysis_id, changes = request.changes.len()).entered();

    let risk_results = self.score_with(reference, &request.changes, request.as_of);
    let risk_summary = RiskSummary::from_results(&risk_results);
    tracing::info!(
      average_risk = risk_summary.average_risk,
      max_risk = risk_summary.max_risk,
      "risk analysis complete"
    );

    let selection = selector::select(&risk_results, &reference.catalog, &self.config.test_selection);
    let selection_summary = SelectionSummary::from_selection(&selection);

    let deployment = assess_deployment(
      risk_summary.average_risk,
      selection.coverage_score,
      request.schema.as_ref(),
      request.drift.as_ref(),
    );
    tracing::info!(
      deployment_risk = deployment.risk,
      flags = deployment.flags.len(),
      "analysis complete"
    );

    AnalysisReport {
      analysis_id,
      as_of: request.as_of.to_rfc3339_opts(SecondsFormat::Secs, true),
      commit: request.commit.clone(),
      change_summary: ChangeSummary::from_changes(&request.changes),
      risk_summary,
      selection_summary,
      file_risks: risk_results
        .into_iter()
        .map(|(change, risk)| FileRisk { change, risk })
        .collect(),
      test_selection: selection,
      schema: request.schema.clone(),
      drift: request.drift.clone(),
      deployment_risk_score: deployment.risk,
      risk_flags: deployment.flags,
      overall_recommendation: deployment.recommendation,
    }
  }
}
