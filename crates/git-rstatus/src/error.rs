use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Configuration file not found. Checked paths: {checked_paths:?}")]
  ConfigNotFound { checked_paths: Vec<PathBuf> },

  #[error("Invalid configuration in {path:?}: {details}")]
  ConfigInvalid { path: PathBuf, details: String },

  #[error("Invalid argument: {0}")]
  InvalidArgument(String),

  #[error("Failed to execute command '{command}': {reason}")]
  CommandNotFound { command: String, reason: String },

  #[error("Failed to scan {path:?}: {source}")]
  Scan {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("{kind} failed in {dir:?}: {details}")]
  Query {
    kind: String,
    dir: PathBuf,
    details: String,
  },

  #[error("Viewport error: {0}")]
  Viewport(String),

  #[error("IO error: {0}")]
  IoError(#[from] std::io::Error),

  #[error("Task join error: {0}")]
  TaskJoinError(#[from] tokio::task::JoinError),

  #[error("JSON parse error: {0}")]
  JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
