//! Structured error types for the risk engine.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("config: {key}: {reason}")]
  Config { key: String, reason: String },

  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("io: {}: {}", .path.display(), .source)]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("parse: {0}")]
  Parse(String),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("yaml: {0}")]
  Yaml(#[from] serde_yaml::Error),
}

impl EngineError {
  pub fn config(key: &str, reason: &str) -> Self {
    Self::Config {
      key: key.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn io(path: &Path, source: std::io::Error) -> Self {
    Self::Io {
      path: path.to_path_buf(),
      source,
    }
  }

  pub fn parse(msg: impl Into<String>) -> Self {
    Self::Parse(msg.into())
  }
}
