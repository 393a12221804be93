use crossterm::style::Color;
use serde::Serialize;

/// Where an item is in the status pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum ItemStatus {
  Found = 0,
  Check = 1,
  Ignore = 2,
  UpToDate = 3,
  Dirty = 4,
  Behind = 5,
  Ahead = 6,
  Pull = 7,
  Error = 8,
}

impl ItemStatus {
  pub fn from_u8(value: u8) -> Self {
    match value {
      0 => ItemStatus::Found,
      1 => ItemStatus::Check,
      2 => ItemStatus::Ignore,
      3 => ItemStatus::UpToDate,
      4 => ItemStatus::Dirty,
      5 => ItemStatus::Behind,
      6 => ItemStatus::Ahead,
      7 => ItemStatus::Pull,
      _ => ItemStatus::Error,
    }
  }

  pub fn is_terminal(self) -> bool {
    !matches!(self, ItemStatus::Found | ItemStatus::Check)
  }

  /// Statuses that carry a verdict worth highlighting in the summary column.
  pub fn is_verdict(self) -> bool {
    (self as u8) >= (ItemStatus::UpToDate as u8)
  }
}

impl std::fmt::Display for ItemStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ItemStatus::Found => write!(f, "Found"),
      ItemStatus::Check => write!(f, "Check"),
      ItemStatus::Ignore => write!(f, "Ignore"),
      ItemStatus::UpToDate => write!(f, "UpToDate"),
      ItemStatus::Dirty => write!(f, "Dirty"),
      ItemStatus::Behind => write!(f, "Behind"),
      ItemStatus::Ahead => write!(f, "Ahead"),
      ItemStatus::Pull => write!(f, "Pull"),
      ItemStatus::Error => write!(f, "Error"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum RunStatus {
  Pending = 0,
  Running = 1,
  Complete = 2,
  Error = 3,
}

impl RunStatus {
  pub fn from_u8(value: u8) -> Self {
    match value {
      0 => RunStatus::Pending,
      1 => RunStatus::Running,
      2 => RunStatus::Complete,
      _ => RunStatus::Error,
    }
  }

  pub fn is_done(self) -> bool {
    matches!(self, RunStatus::Complete | RunStatus::Error)
  }
}

/// Coarse label for the whole run, polled by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
  Scanning = 0,
  Processing = 1,
  Completed = 2,
  Error = 3,
}

impl Phase {
  pub fn from_u8(value: u8) -> Self {
    match value {
      0 => Phase::Scanning,
      1 => Phase::Processing,
      2 => Phase::Completed,
      _ => Phase::Error,
    }
  }
}

impl std::fmt::Display for Phase {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    // Pad through the formatter so `{:>10}` works for the footer
    let label = match self {
      Phase::Scanning => "Scanning",
      Phase::Processing => "Processing",
      Phase::Completed => "Completed",
      Phase::Error => "Error",
    };
    f.pad(label)
  }
}

pub trait StatusDisplay {
  fn colored(&self) -> (&str, Color);
}

impl StatusDisplay for ItemStatus {
  fn colored(&self) -> (&str, Color) {
    match self {
      ItemStatus::Found => ("Found", Color::DarkBlue),
      ItemStatus::Check => ("Check", Color::DarkCyan),
      ItemStatus::Ignore => ("Ignore", Color::DarkGrey),
      ItemStatus::UpToDate => ("OK", Color::DarkGreen),
      ItemStatus::Dirty => ("Dirty", Color::Yellow),
      ItemStatus::Behind => ("Behind", Color::Cyan),
      ItemStatus::Ahead => ("Ahead", Color::Blue),
      ItemStatus::Pull => ("Pull", Color::Magenta),
      ItemStatus::Error => ("Error", Color::Red),
    }
  }
}
