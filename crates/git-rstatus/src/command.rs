use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Exit code reported for a process killed because it ran past its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = -99;

/// Exit code reported when the process ended without one (killed by a signal).
pub const SIGNAL_EXIT_CODE: i32 = -1;

/// Outcome of one external command invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
  pub program: String,
  pub args: Vec<String>,
  pub exit_code: i32,
  pub stdout: Vec<String>,
  pub stderr: Vec<String>,
  pub started: DateTime<Utc>,
  pub duration: Duration,
  pub timed_out: bool,
}

impl CommandOutput {
  pub fn success(&self) -> bool {
    self.exit_code == 0 && !self.timed_out
  }

  pub fn first_line(&self) -> Option<&str> {
    self.stdout.first().map(String::as_str)
  }

  /// `program arg arg`, for logs and error messages.
  pub fn command_line(&self) -> String {
    let mut line = self.program.clone();
    for arg in &self.args {
      line.push(' ');
      line.push_str(arg);
    }
    line
  }
}

/// Checks that `program` can be found on `PATH`.
pub fn ensure_program(program: &str) -> Result<()> {
  which::which(program)
    .map(|_| ())
    .map_err(|e| AppError::CommandNotFound {
      command: program.to_string(),
      reason: e.to_string(),
    })
}

type LineBuffer = Arc<Mutex<Vec<String>>>;

fn drain_lines<R>(reader: R) -> (LineBuffer, JoinHandle<()>)
where
  R: AsyncRead + Unpin + Send + 'static,
{
  let buffer = LineBuffer::default();
  let sink = buffer.clone();

  let handle = tokio::spawn(async move {
    let mut lines = BufReader::new(reader).lines();

    // Stop at the first read error; whatever arrived so far is kept
    while let Ok(Some(line)) = lines.next_line().await {
      if let Ok(mut collected) = sink.lock() {
        collected.push(line);
      }
    }
  });

  (buffer, handle)
}

/// Runs `program` in `dir` and collects both output streams line by line.
///
/// Stdout and stderr are drained concurrently so a chatty command cannot
/// block on a full pipe. When `timeout` elapses the child is killed and the
/// output is flagged `timed_out` with [`TIMEOUT_EXIT_CODE`]. Lines read
/// before the kill are still returned.
pub async fn run(
  program: &str,
  args: &[&str],
  dir: &Path,
  timeout: Option<Duration>,
) -> Result<CommandOutput> {
  run_with_env(program, args, &[], dir, timeout).await
}

/// [`run`] with extra environment variables set for the child.
///
/// The timeout bounds the whole call. A child that exits while a background
/// descendant keeps its pipes open is reported as timed out once the budget
/// is spent, with the lines read so far.
pub async fn run_with_env(
  program: &str,
  args: &[&str],
  envs: &[(&str, &str)],
  dir: &Path,
  timeout: Option<Duration>,
) -> Result<CommandOutput> {
  let started = Utc::now();
  let start_time = Instant::now();

  let mut child = Command::new(program)
    .args(args)
    .envs(envs.iter().copied())
    .current_dir(dir)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true)
    .spawn()
    .map_err(|e| AppError::CommandNotFound {
      command: program.to_string(),
      reason: e.to_string(),
    })?;

  let stdout = child.stdout.take().map(drain_lines);
  let stderr = child.stderr.take().map(drain_lines);

  let (mut exit_code, mut timed_out) = match timeout {
    Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
      Ok(status) => (status?.code().unwrap_or(SIGNAL_EXIT_CODE), false),
      Err(_) => {
        debug!(program, ?dir, ?limit, "killing process after timeout");
        child.kill().await?;
        (TIMEOUT_EXIT_CODE, true)
      }
    },
    None => (child.wait().await?.code().unwrap_or(SIGNAL_EXIT_CODE), false),
  };

  let mut duration = start_time.elapsed();

  // Grandchildren may still hold the pipes open, so the readers only get
  // what is left of the budget, or a short grace period after a kill
  let deadline = match timeout {
    _ if timed_out => Some(Instant::now() + DRAIN_GRACE),
    Some(limit) => Some(start_time + limit.max(duration + DRAIN_GRACE)),
    None => None,
  };

  let (stdout, stdout_drained) = collect_lines(stdout, deadline).await;
  let (stderr, stderr_drained) = collect_lines(stderr, deadline).await;

  if !timed_out && !(stdout_drained && stderr_drained) {
    debug!(program, ?dir, "output still open after the timeout");
    exit_code = TIMEOUT_EXIT_CODE;
    timed_out = true;
    duration = start_time.elapsed();
  }

  Ok(CommandOutput {
    program: program.to_string(),
    args: args.iter().map(|a| a.to_string()).collect(),
    exit_code,
    stdout,
    stderr,
    started,
    duration,
    timed_out,
  })
}

const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Waits for a reader until `deadline`, then takes whatever it collected.
/// The flag is `false` when the reader had to be abandoned.
async fn collect_lines(
  reader: Option<(LineBuffer, JoinHandle<()>)>,
  deadline: Option<Instant>,
) -> (Vec<String>, bool) {
  let Some((buffer, mut handle)) = reader else {
    return (Vec::new(), true);
  };

  let drained = match deadline {
    Some(deadline) => {
      let finished = tokio::time::timeout_at(deadline, &mut handle).await.is_ok();
      if !finished {
        handle.abort();
      }
      finished
    }
    None => {
      let _ = handle.await;
      true
    }
  };

  let lines = buffer
    .lock()
    .map(|mut lines| std::mem::take(&mut *lines))
    .unwrap_or_default();

  (lines, drained)
}
