use crate::command::{self, CommandOutput};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// The closed set of queries the status pipeline issues against a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
  Status,
  Sync,
  RemoteInfo,
  History,
  Pull,
}

impl QueryKind {
  pub fn index(self) -> usize {
    self as usize
  }
}

impl std::fmt::Display for QueryKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      QueryKind::Status => write!(f, "status"),
      QueryKind::Sync => write!(f, "sync"),
      QueryKind::RemoteInfo => write!(f, "remote-info"),
      QueryKind::History => write!(f, "history"),
      QueryKind::Pull => write!(f, "pull"),
    }
  }
}

/// One finished query, kept on the item for the summary and diagnostics.
#[derive(Debug, Clone)]
pub struct QueryResult {
  pub kind: QueryKind,
  pub output: CommandOutput,
}

/// Runs a query against the repository in `dir`.
///
/// A non-zero exit code is not an error at this level; `Err` means the query
/// could not be run at all.
#[async_trait]
pub trait QueryRunner: Send + Sync {
  async fn query(
    &self,
    kind: QueryKind,
    dir: &Path,
    timeout: Option<Duration>,
  ) -> Result<QueryResult>;
}

/// Keeps git from prompting for credentials on the terminal the dashboard
/// is drawing on; such a fetch fails instead.
pub const GIT_ENV: &[(&str, &str)] = &[("GIT_TERMINAL_PROMPT", "0")];

/// Production [`QueryRunner`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitQueries {
  program: String,
}

impl GitQueries {
  pub fn new() -> Self {
    Self::with_program("git")
  }

  pub fn with_program(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
    }
  }

  pub fn program(&self) -> &str {
    &self.program
  }

  pub fn args(kind: QueryKind) -> &'static [&'static str] {
    match kind {
      QueryKind::Status => &["status", "-bs"],
      QueryKind::Sync => &["fetch"],
      QueryKind::RemoteInfo => &["remote", "-v"],
      QueryKind::History => &["log", "-1", "--pretty=(%cd) %s", "--date=relative"],
      QueryKind::Pull => &["pull"],
    }
  }
}

impl Default for GitQueries {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl QueryRunner for GitQueries {
  async fn query(
    &self,
    kind: QueryKind,
    dir: &Path,
    timeout: Option<Duration>,
  ) -> Result<QueryResult> {
    let args = Self::args(kind);
    let output = command::run_with_env(&self.program, args, GIT_ENV, dir, timeout).await?;
    Ok(QueryResult { kind, output })
  }
}
