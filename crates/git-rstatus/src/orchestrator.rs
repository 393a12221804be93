use crate::error::{AppError, Result};
use crate::item::{ItemState, ItemStateMachine};
use crate::model::Phase;
use crate::output::ItemSummary;
use crate::policy::Policy;
use crate::scan::{self, DiscoveredRoot};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::task::JoinSet;
use tracing::{Instrument, Span, debug, info, info_span};

/// Splits `items` into at most `buckets` contiguous, near-even slices.
///
/// The first `len % buckets` slices take one extra item, so 10 items over 4
/// buckets come out as `[3, 3, 2, 2]`. No slice is empty.
pub fn partition<T>(items: &[T], buckets: usize) -> Vec<&[T]> {
  if items.is_empty() {
    return Vec::new();
  }

  let buckets = buckets.clamp(1, items.len());
  let base = items.len() / buckets;
  let extra = items.len() % buckets;

  let mut slices = Vec::with_capacity(buckets);
  let mut start = 0;
  for idx in 0..buckets {
    let len = base + usize::from(idx < extra);
    slices.push(&items[start..start + len]);
    start += len;
  }

  slices
}

/// Runs the scan phase, then the bounded-concurrency process phase, and
/// exposes progress for the dashboard to poll.
pub struct Orchestrator {
  policy: Arc<Policy>,
  machine: ItemStateMachine,
  max_depth: usize,
  concurrency: usize,
  phase: AtomicU8,
  scan_complete: AtomicBool,
  items: OnceLock<Vec<Arc<ItemState>>>,
  span: Span,
}

impl Orchestrator {
  pub fn new(
    policy: Arc<Policy>,
    machine: ItemStateMachine,
    max_depth: usize,
    concurrency: usize,
    span: Span,
  ) -> Self {
    Self {
      policy,
      machine,
      max_depth,
      concurrency,
      phase: AtomicU8::new(Phase::Scanning as u8),
      scan_complete: AtomicBool::new(false),
      items: OnceLock::new(),
      span,
    }
  }

  pub fn phase(&self) -> Phase {
    Phase::from_u8(self.phase.load(Ordering::Acquire))
  }

  fn set_phase(&self, phase: Phase) {
    self.phase.store(phase as u8, Ordering::Release);
  }

  pub fn scan_complete(&self) -> bool {
    self.scan_complete.load(Ordering::Acquire)
  }

  /// Discovered items, empty until the scan phase has finished.
  pub fn items(&self) -> &[Arc<ItemState>] {
    self.items.get().map(Vec::as_slice).unwrap_or(&[])
  }

  /// `(done, total)`, where done counts items that finished either way.
  pub fn progress(&self) -> (usize, usize) {
    let items = self.items();
    let done = items.iter().filter(|item| item.is_done()).count();
    (done, items.len())
  }

  /// Both phases back to back. Any fatal error flips the phase to `Error`.
  pub async fn run(&self, roots: Vec<PathBuf>) -> Result<()> {
    let outcome = async {
      self.scan(roots).await?;
      self.process().await
    }
    .instrument(self.span.clone())
    .await;

    match outcome {
      Ok(()) => self.set_phase(Phase::Completed),
      Err(_) => self.set_phase(Phase::Error),
    }

    outcome
  }

  /// Scans every root on its own blocking task and merges the results.
  pub async fn scan(&self, roots: Vec<PathBuf>) -> Result<usize> {
    self.set_phase(Phase::Scanning);

    let mut scans = JoinSet::new();
    for root in roots {
      let policy = self.policy.clone();
      let max_depth = self.max_depth;
      let span = self.span.clone();

      scans.spawn_blocking(move || {
        let _entered = span.enter();
        let report = scan::scan(&root, max_depth, |path| policy.exclude(path))?;
        info!(
          root = %root.display(),
          found = report.roots.len(),
          visited = report.directories_visited,
          "scan finished"
        );
        Ok::<_, AppError>(report.roots)
      });
    }

    let mut found: Vec<DiscoveredRoot> = Vec::new();
    while let Some(joined) = scans.join_next().await {
      found.extend(joined??);
    }

    // Overlapping scan roots would otherwise report a repository twice
    found.sort_by(|a, b| a.path.cmp(&b.path));
    found.dedup_by(|a, b| a.path == b.path);

    let count = found.len();
    let items = found.into_iter().map(|root| Arc::new(ItemState::new(root))).collect();
    if self.items.set(items).is_err() {
      return Err(AppError::InvalidArgument("scan may only run once".to_string()));
    }

    self.scan_complete.store(true, Ordering::Release);
    Ok(count)
  }

  /// Runs every item's pipeline, `concurrency` buckets at a time.
  ///
  /// Items inside a bucket go one after another; buckets run side by side.
  /// Item failures stay on the item. A failing bucket task is fatal.
  pub async fn process(&self) -> Result<()> {
    self.set_phase(Phase::Processing);

    let items = self.items();
    let mut workers = JoinSet::new();

    for (idx, bucket) in partition(items, self.concurrency).into_iter().enumerate() {
      let bucket: Vec<Arc<ItemState>> = bucket.to_vec();
      let machine = self.machine.clone();
      let span = info_span!(parent: &self.span, "bucket", idx, size = bucket.len());

      workers.spawn(
        async move {
          for item in &bucket {
            machine.run(item).await;
          }
          debug!("bucket done");
        }
        .instrument(span),
      );
    }

    while let Some(joined) = workers.join_next().await {
      if let Err(e) = joined {
        workers.abort_all();
        return Err(AppError::TaskJoinError(e));
      }
    }

    Ok(())
  }

  /// Final per-item records, ordered by path.
  pub fn summaries(&self, absolute: bool) -> Vec<ItemSummary> {
    let mut summaries: Vec<ItemSummary> =
      self.items().iter().map(|item| ItemSummary::from_item(item, absolute)).collect();
    summaries.sort_by(|a, b| a.path.cmp(&b.path));
    summaries
  }

  /// The first item that failed, in path order.
  pub fn first_error(&self) -> Option<(String, String)> {
    self
      .summaries(true)
      .into_iter()
      .filter(ItemSummary::failed)
      .find_map(|s| s.error.map(|e| (s.path, e)))
  }
}
