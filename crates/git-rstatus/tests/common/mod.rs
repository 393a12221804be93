#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use git_rstatus::Result;
use git_rstatus::command::CommandOutput;
use git_rstatus::query::{QueryKind, QueryResult, QueryRunner};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct Reply {
  pub exit_code: i32,
  pub stdout: Vec<String>,
  pub stderr: Vec<String>,
}

impl Reply {
  pub fn ok(lines: &[&str]) -> Self {
    Self {
      exit_code: 0,
      stdout: lines.iter().map(|l| l.to_string()).collect(),
      stderr: Vec::new(),
    }
  }

  pub fn fail(exit_code: i32, stderr: &str) -> Self {
    Self {
      exit_code,
      stdout: Vec::new(),
      stderr: vec![stderr.to_string()],
    }
  }
}

/// Answers queries from a fixed script and records every call.
#[derive(Default)]
pub struct ScriptedQueries {
  replies: HashMap<QueryKind, Reply>,
  calls: Mutex<Vec<(PathBuf, QueryKind)>>,
}

impl ScriptedQueries {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn reply(mut self, kind: QueryKind, reply: Reply) -> Self {
    self.replies.insert(kind, reply);
    self
  }

  pub fn kinds(&self) -> Vec<QueryKind> {
    self.calls.lock().unwrap().iter().map(|(_, kind)| *kind).collect()
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }
}

#[async_trait]
impl QueryRunner for ScriptedQueries {
  async fn query(
    &self,
    kind: QueryKind,
    dir: &Path,
    _timeout: Option<Duration>,
  ) -> Result<QueryResult> {
    self.calls.lock().unwrap().push((dir.to_path_buf(), kind));
    let reply = self.replies.get(&kind).cloned().unwrap_or_default();

    Ok(QueryResult {
      kind,
      output: CommandOutput {
        program: "git".to_string(),
        args: vec![kind.to_string()],
        exit_code: reply.exit_code,
        stdout: reply.stdout,
        stderr: reply.stderr,
        started: Utc::now(),
        duration: Duration::from_millis(1),
        timed_out: false,
      },
    })
  }
}

/// A runner whose queries panic, taking their bucket task down.
pub struct PanickingQueries;

#[async_trait]
impl QueryRunner for PanickingQueries {
  async fn query(
    &self,
    kind: QueryKind,
    _dir: &Path,
    _timeout: Option<Duration>,
  ) -> Result<QueryResult> {
    panic!("{kind} query exploded");
  }
}

/// Creates `root/<rel>/.git` for every entry.
pub fn make_repos(root: &Path, repos: &[&str]) {
  for rel in repos {
    fs::create_dir_all(root.join(rel).join(".git")).unwrap();
  }
}
