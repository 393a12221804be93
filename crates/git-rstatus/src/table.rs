use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Column {
  pub title: String,
  pub min: Option<usize>,
  pub max: Option<usize>,
  width: usize,
}

impl Column {
  pub fn new(title: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      ..Self::default()
    }
  }

  pub fn min(mut self, min: usize) -> Self {
    self.min = Some(min);
    self
  }

  pub fn max(mut self, max: usize) -> Self {
    self.max = Some(max);
    self
  }

  /// Width resolved by the last [`Table::calc_column_sizes`] call.
  pub fn width(&self) -> usize {
    self.width
  }

  fn resolve(&mut self, content: usize) {
    let mut width = content;
    if let Some(min) = self.min {
      width = width.max(min);
    }
    if let Some(max) = self.max {
      width = width.min(max);
    }
    self.width = width;
  }
}

#[derive(Debug, Clone)]
pub struct Row<T> {
  pub cells: Vec<String>,
  pub tag: T,
}

/// Column-aligned rows of pre-formatted text.
///
/// Widths follow the content of the current rows and are recomputed on every
/// [`calc_column_sizes`](Table::calc_column_sizes) call; nothing is cached
/// across frames.
#[derive(Debug, Clone)]
pub struct Table<T> {
  columns: Vec<Column>,
  rows: Vec<Row<T>>,
}

impl<T> Table<T> {
  pub fn new(columns: Vec<Column>) -> Self {
    Self {
      columns,
      rows: Vec::new(),
    }
  }

  pub fn columns(&self) -> &[Column] {
    &self.columns
  }

  pub fn rows(&self) -> &[Row<T>] {
    &self.rows
  }

  pub fn row_count(&self) -> usize {
    self.rows.len()
  }

  pub fn push_row(&mut self, cells: Vec<String>, tag: T) {
    self.rows.push(Row { cells, tag });
  }

  pub fn clear(&mut self) {
    self.rows.clear();
  }

  /// Resolves every column to the widest cell it holds, clamped to the
  /// column's `[min, max]`. Rows with more cells than there are columns get
  /// untitled columns appended.
  pub fn calc_column_sizes(&mut self) {
    let cell_count = self.rows.iter().map(|r| r.cells.len()).max().unwrap_or(0);
    while self.columns.len() < cell_count {
      self.columns.push(Column::default());
    }

    for (idx, column) in self.columns.iter_mut().enumerate() {
      let content = self
        .rows
        .iter()
        .filter_map(|row| row.cells.get(idx))
        .map(|cell| display_width(cell))
        .max()
        .unwrap_or(0);

      column.resolve(content);
    }
  }

  pub fn render_cell(&self, col: usize, text: &str) -> String {
    let width = self.columns.get(col).map(Column::width).unwrap_or(0);
    fit_width(text, width)
  }

  /// Every column of `row`, padded or cut to its resolved width. Missing
  /// cells render as blanks.
  pub fn render_row(&self, row: &Row<T>) -> Vec<String> {
    (0..self.columns.len())
      .map(|idx| self.render_cell(idx, row.cells.get(idx).map(String::as_str).unwrap_or("")))
      .collect()
  }

  pub fn render_header(&self) -> Vec<String> {
    self
      .columns
      .iter()
      .map(|column| fit_width(&column.title, column.width))
      .collect()
  }
}

/// Terminal columns taken by `text`, summed per character.
pub fn display_width(text: &str) -> usize {
  text.chars().map(|ch| ch.width().unwrap_or(0)).sum()
}

/// Pads `text` with spaces or cuts it so it takes exactly `width` terminal
/// columns. No ellipsis. A wide character that would straddle the edge is
/// dropped and replaced by padding.
pub fn fit_width(text: &str, width: usize) -> String {
  let mut out = String::with_capacity(width);
  let mut used = 0;

  for ch in text.chars() {
    let w = ch.width().unwrap_or(0);
    if used + w > width {
      break;
    }
    out.push(ch);
    used += w;
  }

  out.extend(std::iter::repeat_n(' ', width - used));
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  fn table_with(cells: &[&[&str]]) -> Table<usize> {
    let mut table = Table::new(vec![Column::new("Status").min(4), Column::new("Path").max(8)]);
    for (idx, row) in cells.iter().enumerate() {
      table.push_row(row.iter().map(|c| c.to_string()).collect(), idx);
    }
    table
  }

  #[test]
  fn widths_follow_content_within_bounds() {
    let mut table = table_with(&[&["ok", "short"], &["dirty", "a/very/long/path"]]);
    table.calc_column_sizes();

    let widths: Vec<usize> = table.columns().iter().map(Column::width).collect();
    assert_eq!(widths, vec![5, 8]);
  }

  #[test]
  fn min_width_applies_to_narrow_content() {
    let mut table = table_with(&[&["", "x"]]);
    table.calc_column_sizes();
    assert_eq!(table.columns()[0].width(), 4);
    assert_eq!(table.columns()[1].width(), 1);
  }

  #[test]
  fn widths_shrink_when_content_changes() {
    let mut table = table_with(&[&["ok", "abcdef"]]);
    table.calc_column_sizes();
    assert_eq!(table.columns()[1].width(), 6);

    table.clear();
    table.push_row(vec!["ok".into(), "ab".into()], 0);
    table.calc_column_sizes();
    assert_eq!(table.columns()[1].width(), 2);
  }

  #[test]
  fn extra_cells_get_untitled_columns() {
    let mut table = table_with(&[&["ok", "path", "summary"]]);
    table.calc_column_sizes();
    assert_eq!(table.columns().len(), 3);
    assert_eq!(table.columns()[2].title, "");
    assert_eq!(table.columns()[2].width(), 7);
  }

  #[test]
  fn render_row_pads_and_truncates() {
    let mut table = table_with(&[&["ok", "a/very/long/path"], &["dirty"]]);
    table.calc_column_sizes();

    let rows = table.rows();
    assert_eq!(table.render_row(&rows[0]), vec!["ok   ", "a/very/l"]);
    assert_eq!(table.render_row(&rows[1]), vec!["dirty", "        "]);
    assert_eq!(table.render_header(), vec!["Statu", "Path    "]);
  }

  #[test]
  fn wide_characters_never_overflow() {
    assert_eq!(fit_width("日本語", 5), "日本 ");
    assert_eq!(fit_width("日本語", 6), "日本語");
  }

  proptest! {
    #[test]
    fn prop_calc_is_idempotent(
      cells in prop::collection::vec(("[a-z ]{0,20}", "[a-z/]{0,30}"), 0..12)
    ) {
      let mut table = Table::new(vec![Column::new("A").min(3), Column::new("B").min(2).max(10)]);
      for (a, b) in &cells {
        table.push_row(vec![a.clone(), b.clone()], ());
      }

      table.calc_column_sizes();
      let first: Vec<usize> = table.columns().iter().map(Column::width).collect();
      table.calc_column_sizes();
      let second: Vec<usize> = table.columns().iter().map(Column::width).collect();

      prop_assert_eq!(&first, &second);
      prop_assert!(first[0] >= 3);
      prop_assert!(first[1] >= 2 && first[1] <= 10);
    }

    #[test]
    fn prop_rendered_cell_matches_width(text in "[a-zA-Z0-9 /._é日本語]{0,40}", width in 0usize..50) {
      prop_assert_eq!(display_width(&fit_width(&text, width)), width);
    }
  }
}
