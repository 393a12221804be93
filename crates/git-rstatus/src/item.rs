use crate::error::{AppError, Result};
use crate::model::{ItemStatus, RunStatus};
use crate::policy::Policy;
use crate::query::{QueryKind, QueryResult, QueryRunner};
use crate::scan::DiscoveredRoot;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Instrument, Span, debug, info_span, warn};

const STATUS_PREFIX: &str = "## ";
const UPSTREAM_SEPARATOR: &str = "...";
const NO_COMMITS_PREFIX: &str = "No commits yet on ";

/// First line of `git status -bs`, e.g. `## main...origin/main [ahead 1, behind 2]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusHeader {
  pub branch: Option<String>,
  pub ahead: Option<u32>,
  pub behind: Option<u32>,
}

impl StatusHeader {
  pub fn parse(line: &str) -> Self {
    let mut header = StatusHeader::default();

    let Some(rest) = line.strip_prefix(STATUS_PREFIX) else {
      return header;
    };

    let rest = rest.strip_prefix(NO_COMMITS_PREFIX).unwrap_or(rest);
    let branch = match rest.find(UPSTREAM_SEPARATOR) {
      Some(end) => &rest[..end],
      None => rest.split_whitespace().next().unwrap_or(""),
    };
    if !branch.is_empty() {
      header.branch = Some(branch.to_string());
    }

    if let (Some(open), Some(close)) = (rest.rfind('['), rest.rfind(']')) {
      if open < close {
        for part in rest[open + 1..close].split(',') {
          let mut words = part.split_whitespace();
          let count = words.clone().nth(1).and_then(|n| n.parse().ok());
          match words.next() {
            Some("ahead") => header.ahead = count,
            Some("behind") => header.behind = count,
            _ => {}
          }
        }
      }
    }

    header
  }

  /// Signed summary of the divergence: `-2`, `+3` or `+1/-2`.
  pub fn offset(&self) -> Option<String> {
    match (self.ahead, self.behind) {
      (Some(ahead), Some(behind)) => Some(format!("+{ahead}/-{behind}")),
      (Some(ahead), None) => Some(format!("+{ahead}")),
      (None, Some(behind)) => Some(format!("-{behind}")),
      (None, None) => None,
    }
  }
}

/// Mutable details of an item, written only by the worker that owns it.
#[derive(Debug, Default)]
pub struct ItemDetail {
  pub started: Option<DateTime<Utc>>,
  pub duration: Option<Duration>,
  pub last_error: Option<String>,
  pub branch: Option<String>,
  pub branch_offset: Option<String>,
  results: [Option<QueryResult>; 5],
}

impl ItemDetail {
  pub fn result(&self, kind: QueryKind) -> Option<&QueryResult> {
    self.results[kind.index()].as_ref()
  }
}

/// Live state of one repository.
///
/// Exactly one worker drives an item; the dashboard only reads it and may see
/// a state that is a step behind. The two status fields are atomics so a
/// frame never waits on the worker, and the details sit behind a lock that is
/// only held for field copies.
#[derive(Debug)]
pub struct ItemState {
  root: DiscoveredRoot,
  status: AtomicU8,
  run_status: AtomicU8,
  detail: Mutex<ItemDetail>,
}

impl ItemState {
  pub fn new(root: DiscoveredRoot) -> Self {
    Self {
      root,
      status: AtomicU8::new(ItemStatus::Found as u8),
      run_status: AtomicU8::new(RunStatus::Pending as u8),
      detail: Mutex::new(ItemDetail::default()),
    }
  }

  pub fn root(&self) -> &DiscoveredRoot {
    &self.root
  }

  pub fn status(&self) -> ItemStatus {
    ItemStatus::from_u8(self.status.load(Ordering::Acquire))
  }

  pub fn run_status(&self) -> RunStatus {
    RunStatus::from_u8(self.run_status.load(Ordering::Acquire))
  }

  pub fn is_done(&self) -> bool {
    self.run_status().is_done()
  }

  /// Read access to the details. Poisoning is ignored: a worker that panicked
  /// mid-write leaves at worst a stale field.
  pub fn detail(&self) -> MutexGuard<'_, ItemDetail> {
    self.detail.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn set_status(&self, status: ItemStatus) {
    debug_assert_eq!(self.run_status(), RunStatus::Running);
    self.status.store(status as u8, Ordering::Release);
  }

  fn begin(&self) {
    self.detail().started = Some(Utc::now());
    self.run_status.store(RunStatus::Running as u8, Ordering::Release);
  }

  fn finish(&self, outcome: Result<ItemStatus>, elapsed: Duration) {
    let run_status = {
      let mut detail = self.detail();
      detail.duration = Some(elapsed);

      match outcome {
        Ok(status) => {
          debug_assert!(status.is_terminal(), "item finished as {status}");
          self.set_status(status);
          RunStatus::Complete
        }
        Err(e) => {
          detail.last_error = Some(e.to_string());
          self.set_status(ItemStatus::Error);
          RunStatus::Error
        }
      }
    };

    self.run_status.store(run_status as u8, Ordering::Release);
  }

  fn store_result(&self, result: QueryResult) {
    let kind = result.kind;
    self.detail().results[kind.index()] = Some(result);
  }

  /// One line describing the item for the dashboard and the final summary.
  pub fn summary_line(&self) -> String {
    let status = self.status();
    let detail = self.detail();

    let status_output = detail.result(QueryKind::Status).map(|r| &r.output);

    match status {
      ItemStatus::Error => format!("<ERROR> {}", detail.last_error.as_deref().unwrap_or("unknown")),
      ItemStatus::Found | ItemStatus::Check => String::new(),
      ItemStatus::Behind | ItemStatus::Pull | ItemStatus::Ahead => status_output
        .and_then(|o| o.first_line())
        .unwrap_or("<ERR>")
        .to_string(),
      ItemStatus::Dirty => match status_output {
        Some(o) if o.stdout.len() > 1 => {
          format!("[{} files] {}", o.stdout.len() - 1, o.stdout[1].trim())
        }
        _ => status.to_string(),
      },
      ItemStatus::UpToDate | ItemStatus::Ignore => match detail.result(QueryKind::History) {
        Some(history) => {
          let output = &history.output;
          if let Some(line) = output.first_line() {
            line.to_string()
          } else if let Some(line) = output.stderr.first() {
            line.clone()
          } else if output.exit_code != 0 {
            format!("exitcode: {}", output.exit_code)
          } else {
            String::new()
          }
        }
        None => String::new(),
      },
    }
  }
}

/// Drives items through the status pipeline, one query at a time.
#[derive(Clone)]
pub struct ItemStateMachine {
  queries: Arc<dyn QueryRunner>,
  policy: Arc<Policy>,
  timeout: Option<Duration>,
  span: Span,
}

impl ItemStateMachine {
  pub fn new(
    queries: Arc<dyn QueryRunner>,
    policy: Arc<Policy>,
    timeout: Option<Duration>,
    span: Span,
  ) -> Self {
    Self {
      queries,
      policy,
      timeout,
      span,
    }
  }

  /// Runs the whole pipeline for `item`. Errors end up on the item itself,
  /// which always leaves this call as `Complete` or `Error`.
  pub async fn run(&self, item: &ItemState) {
    let span = info_span!(parent: &self.span, "item", path = %item.root().relative.display());

    async {
      let start = Instant::now();
      item.begin();

      let outcome = self.drive(item).await;
      if let Err(e) = &outcome {
        warn!(error = %e, "item failed");
      }

      item.finish(outcome, start.elapsed());
      debug!(status = %item.status(), elapsed = ?start.elapsed(), "item done");
    }
    .instrument(span)
    .await
  }

  async fn drive(&self, item: &ItemState) -> Result<ItemStatus> {
    let root = item.root();

    if self.policy.is_ignored(root) {
      return Ok(ItemStatus::Ignore);
    }

    item.set_status(ItemStatus::Check);

    if self.policy.remote_info {
      match self.query(item, QueryKind::RemoteInfo).await {
        Ok(remote) if !remote.output.success() => {
          warn!(exit_code = remote.output.exit_code, "remote info query failed")
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "remote info query failed"),
      }
    }

    let mut synced = false;
    if self.policy.should_sync(root) {
      let sync = self.query(item, QueryKind::Sync).await?;
      if sync.output.success() {
        synced = true;
      } else {
        item.detail().last_error = Some(query_failure(&sync, root).to_string());
      }
    }

    let status = self.query(item, QueryKind::Status).await?;
    if !status.output.success() {
      return Err(query_failure(&status, root));
    }

    let Some(first_line) = status.output.first_line() else {
      return Err(AppError::Query {
        kind: QueryKind::Status.to_string(),
        dir: root.path.clone(),
        details: "no output".to_string(),
      });
    };

    let header = StatusHeader::parse(first_line);
    {
      let mut detail = item.detail();
      detail.branch = header.branch.clone();
      detail.branch_offset = header.offset();
    }

    if status.output.stdout.len() > 1 {
      return Ok(ItemStatus::Dirty);
    }

    if header.behind.is_some() {
      item.set_status(ItemStatus::Behind);

      if !self.policy.pull_requested() {
        return Ok(ItemStatus::Behind);
      }

      let pull = self.query(item, QueryKind::Pull).await?;
      if !pull.output.success() {
        return Err(query_failure(&pull, root));
      }
      return Ok(ItemStatus::Pull);
    }

    if header.ahead.is_some() {
      return Ok(ItemStatus::Ahead);
    }

    // Best effort: whatever the history query produced ends up in the summary
    if let Err(e) = self.query(item, QueryKind::History).await {
      debug!(error = %e, "history query failed");
    }

    // Without a successful fetch a clean tree may still be stale
    Ok(if synced { ItemStatus::UpToDate } else { ItemStatus::Ignore })
  }

  async fn query(&self, item: &ItemState, kind: QueryKind) -> Result<QueryResult> {
    let result = self.queries.query(kind, &item.root().path, self.timeout).await?;
    let output = &result.output;

    debug!(
      %kind,
      command = %output.command_line(),
      exit_code = output.exit_code,
      duration = ?output.duration,
      stdout_lines = output.stdout.len(),
      stderr_lines = output.stderr.len(),
      "query finished"
    );

    if output.timed_out {
      warn!(%kind, duration = ?output.duration, "query killed after timeout");
    } else if output.exit_code == 0
      && output.stdout.is_empty()
      && !matches!(kind, QueryKind::Sync | QueryKind::Pull)
    {
      warn!(%kind, "query succeeded without output");
    }

    for line in &output.stderr {
      debug!(%kind, stderr = %line);
    }

    item.store_result(result.clone());
    Ok(result)
  }
}

fn query_failure(result: &QueryResult, root: &DiscoveredRoot) -> AppError {
  let output = &result.output;
  let details = if output.timed_out {
    format!("timed out after {:.1}s", output.duration.as_secs_f64())
  } else {
    format!(
      "bad exit code ({}) | {}",
      output.exit_code,
      output.stderr.first().map(String::as_str).unwrap_or("")
    )
  };

  AppError::Query {
    kind: result.kind.to_string(),
    dir: root.path.clone(),
    details,
  }
}
