use crate::error::Result;
use crate::item::ItemState;
use crate::model::ItemStatus;
use crate::table::{Column, Table};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

/// Final record for one repository, suitable for serialization.
#[derive(Debug, Clone, Serialize)]
pub struct ItemSummary {
  pub path: String,
  pub status: ItemStatus,
  pub branch: Option<String>,
  pub branch_offset: Option<String>,
  pub summary: String,
  pub duration_ms: Option<u64>,
  pub started: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl ItemSummary {
  pub fn from_item(item: &ItemState, absolute: bool) -> Self {
    let root = item.root();
    let path = if absolute { &root.path } else { &root.relative };
    let summary = item.summary_line();
    let detail = item.detail();

    Self {
      path: path.display().to_string(),
      status: item.status(),
      branch: detail.branch.clone(),
      branch_offset: detail.branch_offset.clone(),
      summary,
      duration_ms: detail.duration.map(|d| d.as_millis() as u64),
      started: detail.started,
      error: detail.last_error.clone(),
    }
  }

  pub fn failed(&self) -> bool {
    self.status == ItemStatus::Error
  }
}

pub fn write_json<W: Write>(out: &mut W, summaries: &[ItemSummary]) -> Result<()> {
  serde_json::to_writer_pretty(&mut *out, summaries)?;
  writeln!(out)?;
  Ok(())
}

/// Plain table for pipes and terminals where the dashboard is not drawn.
pub fn write_plain<W: Write>(out: &mut W, summaries: &[ItemSummary]) -> Result<()> {
  let mut table = Table::new(vec![
    Column::new("Status").min(6),
    Column::new("Path").min(10).max(60),
    Column::new("Branch").min(6).max(30),
    Column::new("+/-").min(3),
    Column::new("Summary").min(7).max(80),
  ]);

  for s in summaries {
    table.push_row(
      vec![
        s.status.to_string(),
        s.path.clone(),
        s.branch.clone().unwrap_or_default(),
        s.branch_offset.clone().unwrap_or_default(),
        s.summary.clone(),
      ],
      (),
    );
  }

  table.calc_column_sizes();

  writeln!(out, "{}", table.render_header().join(" ").trim_end())?;
  for row in table.rows() {
    writeln!(out, "{}", table.render_row(row).join(" ").trim_end())?;
  }

  Ok(())
}
