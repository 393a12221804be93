use crate::error::Result;
use crate::item::ItemState;
use crate::model::{Phase, StatusDisplay};
use crate::orchestrator::Orchestrator;
use crate::table::{Column, Table};
use crate::viewport::{Console, Viewport};
use crossterm::style::Color;
use std::sync::Arc;
use std::time::Instant;

const SPINNER_FRAMES: &str = "⡿⣟⣯⣷⣾⣽⣻⢿";
const SPINNER_SPEED: f64 = 0.2;

/// Header and footer lines around the table.
const RESERVED_LINES: u16 = 2;
/// Region size before the number of repositories is known.
const INITIAL_HEIGHT: u16 = 1 + RESERVED_LINES;

#[derive(Debug, Clone)]
pub struct Spinner {
  frames: Vec<char>,
  speed: f64,
  position: f64,
}

impl Spinner {
  pub fn new(frames: &str, speed: f64) -> Self {
    Self {
      frames: frames.chars().collect(),
      speed,
      position: 0.0,
    }
  }

  /// Current frame, then advances by the spinner speed.
  pub fn tick(&mut self) -> char {
    if self.frames.is_empty() {
      return ' ';
    }
    let frame = self.frames[self.position as usize % self.frames.len()];
    self.position += self.speed;
    frame
  }
}

impl Default for Spinner {
  fn default() -> Self {
    Self::new(SPINNER_FRAMES, SPINNER_SPEED)
  }
}

/// What the footer needs from the orchestrator, sampled once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
  pub phase: Phase,
  pub scan_complete: bool,
  pub done: usize,
  pub total: usize,
}

impl Progress {
  pub fn of(orchestrator: &Orchestrator) -> Self {
    let (done, total) = orchestrator.progress();
    Self {
      phase: orchestrator.phase(),
      scan_complete: orchestrator.scan_complete(),
      done,
      total,
    }
  }
}

/// Live status table drawn into a [`Viewport`].
pub struct Dashboard<C: Console> {
  viewport: Viewport<C>,
  table: Table<usize>,
  spinner: Spinner,
  started: Instant,
  absolute: bool,
}

impl<C: Console> Dashboard<C> {
  pub fn new(console: C, absolute: bool) -> Self {
    Self {
      viewport: Viewport::new(console),
      table: Table::new(vec![
        Column::new("Status").min(6),
        Column::new("Path").min(30).max(60),
        Column::new("Git").min(30).max(60),
        Column::new("Branch").max(30),
      ]),
      spinner: Spinner::default(),
      started: Instant::now(),
      absolute,
    }
  }

  pub fn viewport(&self) -> &Viewport<C> {
    &self.viewport
  }

  pub fn init(&mut self) -> Result<()> {
    self.viewport.init(INITIAL_HEIGHT)
  }

  /// Grows the region to fit every discovered repository.
  pub fn resize(&mut self, item_count: usize) -> Result<()> {
    let rows = u16::try_from(item_count).unwrap_or(u16::MAX);
    self.viewport.resize(rows.saturating_add(RESERVED_LINES).max(INITIAL_HEIGHT))
  }

  /// Redraws the whole region from the current item states.
  ///
  /// # Panics
  ///
  /// Panics if a table row refers to an item outside `items`.
  pub fn frame(&mut self, progress: Progress, items: &[Arc<ItemState>]) -> Result<()> {
    self.viewport.start_draw(false)?;

    let header = if progress.scan_complete {
      format!("[git-rstatus] found {}", progress.total)
    } else {
      "[git-rstatus] scanning...".to_string()
    };
    self.viewport.write_line(&header)?;

    self.fill_table(items);

    let limit = if self.viewport.allow_overflow() {
      usize::MAX
    } else {
      usize::from(self.viewport.height().saturating_sub(RESERVED_LINES))
    };

    for row in self.table.rows().iter().take(limit) {
      let item = &items[row.tag];
      let status = item.status();
      let (_, color) = status.colored();

      let cells = self.table.render_row(row);
      for (idx, cell) in cells.iter().enumerate() {
        if idx > 0 {
          self.viewport.write(" ")?;
        }

        let highlight = idx == 0 || (idx == 2 && status.is_verdict());
        if highlight {
          self.viewport.set_foreground(color)?;
          self.viewport.write(cell)?;
          self.viewport.revert()?;
        } else {
          self.viewport.write(cell)?;
        }
      }
      self.viewport.write_line("")?;
    }

    let footer = format!(
      "[{}] [{:>10}] Items {}/{} in {:.1} sec",
      self.spinner.tick(),
      progress.phase,
      progress.done,
      progress.total,
      self.started.elapsed().as_secs_f64()
    );
    if progress.phase == Phase::Error {
      self.viewport.set_foreground(Color::Red)?;
    }
    self.viewport.write_line(&footer)?;
    self.viewport.revert()?;

    self.viewport.finish_draw()
  }

  /// Last frame with every row, then hands the terminal back.
  pub fn finish(&mut self, progress: Progress, items: &[Arc<ItemState>]) -> Result<()> {
    self.viewport.set_allow_overflow(true);
    self.frame(progress, items)?;
    self.viewport.dispose()
  }

  fn fill_table(&mut self, items: &[Arc<ItemState>]) {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| items[a].root().path.cmp(&items[b].root().path));

    self.table.clear();
    for idx in order {
      let item = &items[idx];
      let root = item.root();
      let path = if self.absolute { &root.path } else { &root.relative };
      let status = item.status();
      let (label, _) = status.colored();
      let summary = item.summary_line();

      let branch = {
        let detail = item.detail();
        match (&detail.branch, &detail.branch_offset) {
          (Some(branch), Some(offset)) => format!("{branch} {offset}"),
          (Some(branch), None) => branch.clone(),
          _ => String::new(),
        }
      };

      self
        .table
        .push_row(vec![label.to_string(), path.display().to_string(), summary, branch], idx);
    }

    self.table.calc_column_sizes();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::scan::DiscoveredRoot;
  use crate::viewport::sim::SimConsole;

  fn items(names: &[&str]) -> Vec<Arc<ItemState>> {
    names
      .iter()
      .map(|name| {
        Arc::new(ItemState::new(DiscoveredRoot {
          path: format!("/src/{name}").into(),
          relative: (*name).into(),
        }))
      })
      .collect()
  }

  fn progress(total: usize) -> Progress {
    Progress {
      phase: Phase::Processing,
      scan_complete: true,
      done: 0,
      total,
    }
  }

  #[test]
  fn spinner_advances_fractionally() {
    let mut spinner = Spinner::new("ab", 0.5);
    let frames: Vec<char> = (0..5).map(|_| spinner.tick()).collect();
    assert_eq!(frames, vec!['a', 'a', 'b', 'b', 'a']);
  }

  #[test]
  fn scanning_frame_shows_header_and_footer() {
    let mut dashboard = Dashboard::new(SimConsole::new(80, 20, 0), false);
    dashboard.init().unwrap();

    let scanning = Progress {
      phase: Phase::Scanning,
      scan_complete: false,
      done: 0,
      total: 0,
    };
    dashboard.frame(scanning, &[]).unwrap();

    let console = dashboard.viewport().console();
    assert_eq!(console.line(0), "[git-rstatus] scanning...");
    assert!(console.line(1).starts_with("[⡿] [  Scanning] Items 0/0 in"));
  }

  #[test]
  fn rows_are_sorted_by_path() {
    let items = items(&["c", "a", "b"]);
    let mut dashboard = Dashboard::new(SimConsole::new(100, 20, 0), false);
    dashboard.init().unwrap();
    dashboard.resize(items.len()).unwrap();
    dashboard.frame(progress(3), &items).unwrap();

    let console = dashboard.viewport().console();
    assert_eq!(console.line(0), "[git-rstatus] found 3");
    assert_eq!(console.line(1), "Found  a");
    assert_eq!(console.line(2), "Found  b");
    assert_eq!(console.line(3), "Found  c");
    assert!(console.line(4).contains("Items 0/3"));
    assert_eq!(console.wraps, 0);
  }

  #[test]
  fn rows_are_limited_to_the_region() {
    let items = items(&["a", "b", "c", "d"]);
    let mut dashboard = Dashboard::new(SimConsole::new(100, 20, 0), false);
    dashboard.init().unwrap();
    dashboard.frame(progress(4), &items).unwrap();

    let console = dashboard.viewport().console();
    assert_eq!(console.line(1), "Found  a");
    assert!(console.line(2).starts_with("[⡿]"));
    assert_eq!(console.line(3), "");
  }

  #[test]
  fn final_frame_shows_every_row() {
    let items = items(&["a", "b", "c", "d"]);
    let mut dashboard = Dashboard::new(SimConsole::new(100, 20, 0), true);
    dashboard.init().unwrap();
    dashboard.frame(progress(4), &items).unwrap();

    let done = Progress {
      phase: Phase::Completed,
      scan_complete: true,
      done: 4,
      total: 4,
    };
    dashboard.finish(done, &items).unwrap();

    let console = dashboard.viewport().console();
    assert_eq!(console.line(4), "Found  /src/d");
    assert!(console.line(5).contains("[ Completed] Items 4/4"));
    assert!(console.cursor_visible);
  }
}
