//! Change risk scoring and adaptive test selection.
//!
//! Scores each changed file from complexity, failure history, change
//! magnitude and path criticality, picks a prioritized test subset from a
//! catalog, and folds code risk, test coverage, schema risk and data drift
//! into one deployment verdict.
//!
//! Pure computation over in-memory reference data; no network, no DB.

pub mod catalog;
pub mod change_type;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod normalize;
pub mod risk;
pub mod selector;
pub mod snapshot;
pub mod summary;
pub mod types;

pub use catalog::TestCatalog;
pub use config::Config;
pub use engine::{AnalysisReport, AnalysisRequest, Engine};
pub use error::EngineError;
pub use history::FailureHistory;
pub use risk::{FailurePredictor, RiskFeatures, RiskScorer};
pub use snapshot::{ReferenceData, ReferenceStore};
pub use types::{ChangeMetrics, RiskLevel, RiskScore, TestCase, TestSelection};
