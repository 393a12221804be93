use crate::config::Settings;
use crate::error::Result;
use crate::item::ItemStateMachine;
use crate::orchestrator::Orchestrator;
use crate::output::ItemSummary;
use crate::query::QueryRunner;
use crate::render::{Dashboard, Progress};
use crate::viewport::TermConsole;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{info, info_span};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_NO_REPOSITORIES: i32 = 2;

/// ~30 frames per second
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// What a finished run leaves behind for the final output.
#[derive(Debug)]
pub struct Report {
  pub summaries: Vec<ItemSummary>,
  pub first_error: Option<(String, String)>,
}

impl Report {
  pub fn exit_code(&self) -> i32 {
    if self.summaries.is_empty() {
      EXIT_NO_REPOSITORIES
    } else {
      EXIT_OK
    }
  }
}

pub struct App {
  settings: Settings,
  queries: Arc<dyn QueryRunner>,
  /// Draw the live dashboard while working?
  interactive: bool,
}

impl App {
  pub fn new(settings: Settings, queries: Arc<dyn QueryRunner>, interactive: bool) -> Self {
    Self {
      settings,
      queries,
      interactive,
    }
  }

  /// Scans and processes every root, drawing the dashboard when interactive.
  /// Item failures end up in the report; only fatal errors are returned.
  pub async fn run(self) -> Result<Report> {
    let settings = &self.settings;
    let span = info_span!("run", roots = settings.roots.len(), concurrency = settings.concurrency);
    let started = Instant::now();

    let policy = Arc::new(settings.policy.clone());
    let machine =
      ItemStateMachine::new(self.queries.clone(), policy.clone(), settings.timeout, span.clone());
    let orchestrator = Arc::new(Orchestrator::new(
      policy,
      machine,
      settings.max_depth,
      settings.concurrency,
      span,
    ));

    let task = {
      let orchestrator = orchestrator.clone();
      let roots = settings.roots.clone();
      tokio::spawn(async move { orchestrator.run(roots).await })
    };

    if self.interactive {
      let drawn = watch(&orchestrator, &task, settings.absolute).await;
      if drawn.is_err() {
        task.abort();
      }
      drawn?;
    }

    task.await??;

    let (done, total) = orchestrator.progress();
    info!(done, total, elapsed = ?started.elapsed(), "run finished");

    Ok(Report {
      summaries: orchestrator.summaries(settings.absolute),
      first_error: orchestrator.first_error(),
    })
  }
}

/// Redraws the dashboard on a fixed tick until the orchestrator task ends,
/// then draws the complete table one last time.
async fn watch(
  orchestrator: &Orchestrator,
  task: &JoinHandle<Result<()>>,
  absolute: bool,
) -> Result<()> {
  let mut dashboard = Dashboard::new(TermConsole::stdout(), absolute);
  dashboard.init()?;

  let mut ticker = interval(FRAME_INTERVAL);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
  let mut resized = false;

  loop {
    ticker.tick().await;

    if !resized && orchestrator.scan_complete() {
      dashboard.resize(orchestrator.items().len())?;
      resized = true;
    }

    if task.is_finished() {
      break;
    }

    dashboard.frame(Progress::of(orchestrator), orchestrator.items())?;
  }

  dashboard.finish(Progress::of(orchestrator), orchestrator.items())
}
