use crate::error::{AppError, Result};
use crossterm::style::{Color, Print, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{cursor, queue};
use std::io::{self, Write};
use tracing::debug;
use unicode_width::UnicodeWidthChar;

/// The few terminal operations the viewport needs.
pub trait Console {
  /// `(columns, rows)` of the visible window.
  fn size(&self) -> io::Result<(u16, u16)>;
  fn cursor_row(&mut self) -> io::Result<u16>;
  fn move_to_row(&mut self, row: u16) -> io::Result<()>;
  fn write(&mut self, text: &str) -> io::Result<()>;
  /// Moves to column 0 of the next row, scrolling when on the last row.
  fn newline(&mut self) -> io::Result<()>;
  fn clear_line_tail(&mut self) -> io::Result<()>;
  fn set_foreground(&mut self, color: Color) -> io::Result<()>;
  fn set_background(&mut self, color: Color) -> io::Result<()>;
  /// Colors in effect before the viewport touched anything.
  fn colors(&self) -> (Color, Color);
  fn set_cursor_visible(&mut self, visible: bool) -> io::Result<()>;
  fn flush(&mut self) -> io::Result<()>;
}

/// [`Console`] over a real terminal through crossterm.
pub struct TermConsole<W: Write> {
  out: W,
}

impl TermConsole<io::Stdout> {
  pub fn stdout() -> Self {
    Self { out: io::stdout() }
  }
}

impl<W: Write> TermConsole<W> {
  pub fn new(out: W) -> Self {
    Self { out }
  }
}

impl<W: Write> Console for TermConsole<W> {
  fn size(&self) -> io::Result<(u16, u16)> {
    terminal::size()
  }

  fn cursor_row(&mut self) -> io::Result<u16> {
    self.out.flush()?;
    cursor::position().map(|(_, row)| row)
  }

  fn move_to_row(&mut self, row: u16) -> io::Result<()> {
    queue!(self.out, cursor::MoveTo(0, row))
  }

  fn write(&mut self, text: &str) -> io::Result<()> {
    queue!(self.out, Print(text))
  }

  fn newline(&mut self) -> io::Result<()> {
    queue!(self.out, Print("\r\n"))
  }

  fn clear_line_tail(&mut self) -> io::Result<()> {
    queue!(self.out, Clear(ClearType::UntilNewLine))
  }

  fn set_foreground(&mut self, color: Color) -> io::Result<()> {
    queue!(self.out, SetForegroundColor(color))
  }

  fn set_background(&mut self, color: Color) -> io::Result<()> {
    queue!(self.out, SetBackgroundColor(color))
  }

  fn colors(&self) -> (Color, Color) {
    // Terminals cannot be asked for their current colors; Reset restores them
    (Color::Reset, Color::Reset)
  }

  fn set_cursor_visible(&mut self, visible: bool) -> io::Result<()> {
    if visible {
      queue!(self.out, cursor::Show)
    } else {
      queue!(self.out, cursor::Hide)
    }
  }

  fn flush(&mut self) -> io::Result<()> {
    self.out.flush()
  }
}

/// Where a region of `height` rows starts, and how many blank lines must be
/// emitted at the bottom of the window to make room for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionPlan {
  pub origin: u16,
  pub height: u16,
  pub scroll: u16,
}

/// Fits a region of `requested` rows starting at `origin` into a window of
/// `window_height` rows.
///
/// The last row is never used: printing a newline there scrolls the window.
/// When there is not enough room below `origin`, the window is scrolled up,
/// which moves the origin up by the same amount, but never above row 0.
pub fn plan_region(origin: u16, window_height: u16, requested: u16) -> RegionPlan {
  let usable = window_height.saturating_sub(1);
  let new_origin = origin.min(usable.saturating_sub(requested));
  let height = requested.min(usable - new_origin.min(usable));

  RegionPlan {
    origin: new_origin,
    height,
    scroll: origin - new_origin,
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportPhase {
  Uninitialized,
  Initialized,
  Resized,
  Disposed,
}

/// A fixed-origin slice of a scrolling terminal, redrawn in place each frame.
///
/// Lines never wrap: text is cut at the right edge so the region's line
/// accounting stays exact. Once the per-frame line budget is spent, further
/// lines are dropped unless overflow is allowed.
pub struct Viewport<C: Console> {
  console: C,
  phase: ViewportPhase,
  origin: u16,
  height: u16,
  requested: u16,
  frame: u64,
  free_lines: u16,
  skipped: usize,
  width: u16,
  column: usize,
  start_fg: Color,
  start_bg: Color,
  allow_overflow: bool,
  needs_clear: bool,
}

impl<C: Console> Viewport<C> {
  pub fn new(console: C) -> Self {
    let (start_fg, start_bg) = console.colors();
    Self {
      console,
      phase: ViewportPhase::Uninitialized,
      origin: 0,
      height: 0,
      requested: 0,
      frame: 0,
      free_lines: 0,
      skipped: 0,
      width: 0,
      column: 0,
      start_fg,
      start_bg,
      allow_overflow: false,
      needs_clear: false,
    }
  }

  pub fn phase(&self) -> ViewportPhase {
    self.phase
  }

  pub fn origin(&self) -> u16 {
    self.origin
  }

  /// Rows assigned to the region.
  pub fn height(&self) -> u16 {
    self.height
  }

  pub fn requested_height(&self) -> u16 {
    self.requested
  }

  pub fn free_lines(&self) -> u16 {
    self.free_lines
  }

  /// Lines dropped during the current frame.
  pub fn skipped(&self) -> usize {
    self.skipped
  }

  pub fn frame(&self) -> u64 {
    self.frame
  }

  pub fn allow_overflow(&self) -> bool {
    self.allow_overflow
  }

  pub fn set_allow_overflow(&mut self, allow: bool) {
    self.allow_overflow = allow;
  }

  pub fn console(&self) -> &C {
    &self.console
  }

  /// Anchors the region at the current cursor row.
  pub fn init(&mut self, requested: u16) -> Result<()> {
    if self.phase != ViewportPhase::Uninitialized {
      return Err(AppError::Viewport(format!("init called while {:?}", self.phase)));
    }

    self.origin = self.console.cursor_row()?;
    let (fg, bg) = self.console.colors();
    self.start_fg = fg;
    self.start_bg = bg;

    self.fit(requested)?;
    self.phase = ViewportPhase::Initialized;
    Ok(())
  }

  /// Grows (or shrinks) the region once the final row count is known.
  /// Allowed exactly once, after [`init`](Self::init).
  pub fn resize(&mut self, requested: u16) -> Result<()> {
    if self.phase != ViewportPhase::Initialized {
      return Err(AppError::Viewport(format!("resize called while {:?}", self.phase)));
    }

    self.fit(requested)?;
    self.phase = ViewportPhase::Resized;
    self.needs_clear = true;
    Ok(())
  }

  fn fit(&mut self, requested: u16) -> Result<()> {
    if requested == 0 {
      return Err(AppError::Viewport("region height must be positive".to_string()));
    }

    let (_, window_height) = self.console.size()?;
    let plan = plan_region(self.origin, window_height, requested);

    if plan.scroll > 0 {
      self.console.move_to_row(window_height.saturating_sub(1))?;
      for _ in 0..plan.scroll {
        self.console.newline()?;
      }
    }

    debug!(
      from = self.origin,
      origin = plan.origin,
      height = plan.height,
      requested,
      scroll = plan.scroll,
      window_height,
      "viewport fitted"
    );

    self.origin = plan.origin;
    self.height = plan.height;
    self.requested = requested;
    self.free_lines = plan.height;

    self.console.move_to_row(self.origin)?;
    self.console.flush()?;
    Ok(())
  }

  /// Starts a frame at the region origin. The region is blanked on the first
  /// frame, after a resize, or when `clear_full` is set; otherwise the new
  /// frame simply overwrites the previous one.
  pub fn start_draw(&mut self, clear_full: bool) -> Result<()> {
    if !matches!(self.phase, ViewportPhase::Initialized | ViewportPhase::Resized) {
      return Err(AppError::Viewport(format!("start_draw called while {:?}", self.phase)));
    }

    let (width, _) = self.console.size()?;
    self.width = width;

    self.console.set_cursor_visible(false)?;
    self.revert()?;

    if self.frame == 0 || clear_full || self.needs_clear {
      for line in 0..self.height {
        self.console.move_to_row(self.origin + line)?;
        self.console.clear_line_tail()?;
      }
      self.needs_clear = false;
    }

    self.console.move_to_row(self.origin)?;
    self.free_lines = self.height;
    self.skipped = 0;
    self.column = 0;
    self.frame += 1;
    Ok(())
  }

  /// Blanks the region lines the current frame did not use and flushes.
  pub fn finish_draw(&mut self) -> Result<()> {
    if !self.allow_overflow && self.free_lines > 0 {
      let used = self.height - self.free_lines;
      for line in used..self.height {
        self.console.move_to_row(self.origin + line)?;
        self.console.clear_line_tail()?;
      }
      self.console.move_to_row(self.origin + used)?;
    }

    self.console.flush()?;
    Ok(())
  }

  /// Writes `text` on the current line, cut at the right edge. Returns
  /// `false` when anything was cut or dropped.
  pub fn write(&mut self, text: &str) -> Result<bool> {
    if self.free_lines == 0 && !self.allow_overflow {
      return Ok(false);
    }

    // The last column stays empty: filling it leaves some terminals in a
    // pending-wrap state
    let room = usize::from(self.width.saturating_sub(1)).saturating_sub(self.column);
    let (fitted, used) = take_width(text, room);

    if !fitted.is_empty() {
      self.console.write(fitted)?;
    }
    self.column += used;

    Ok(fitted.len() == text.len())
  }

  /// Writes `text` and ends the line. Returns `false` when the line was
  /// dropped because the frame's line budget is spent.
  pub fn write_line(&mut self, text: &str) -> Result<bool> {
    if self.free_lines == 0 && !self.allow_overflow {
      self.skipped += 1;
      return Ok(false);
    }

    self.write(text)?;
    self.console.clear_line_tail()?;
    self.console.newline()?;
    self.free_lines = self.free_lines.saturating_sub(1);
    self.column = 0;
    Ok(true)
  }

  pub fn set_foreground(&mut self, color: Color) -> Result<()> {
    self.console.set_foreground(color)?;
    Ok(())
  }

  pub fn set_background(&mut self, color: Color) -> Result<()> {
    self.console.set_background(color)?;
    Ok(())
  }

  /// Back to the colors captured at [`init`](Self::init).
  pub fn revert(&mut self) -> Result<()> {
    self.console.set_foreground(self.start_fg)?;
    self.console.set_background(self.start_bg)?;
    Ok(())
  }

  /// Restores the cursor. Safe to call more than once.
  pub fn dispose(&mut self) -> Result<()> {
    if self.phase == ViewportPhase::Disposed {
      return Ok(());
    }

    self.phase = ViewportPhase::Disposed;
    self.revert()?;
    self.console.set_cursor_visible(true)?;
    self.console.flush()?;
    Ok(())
  }
}

impl<C: Console> Drop for Viewport<C> {
  fn drop(&mut self) {
    let _ = self.dispose();
  }
}

/// Longest prefix of `text` that fits in `room` columns, and its width.
fn take_width(text: &str, room: usize) -> (&str, usize) {
  let mut used = 0;
  for (idx, ch) in text.char_indices() {
    let w = ch.width().unwrap_or(0);
    if used + w > room {
      return (&text[..idx], used);
    }
    used += w;
  }
  (text, used)
}

/// An in-memory terminal with real scrolling and auto-wrap, for tests.
#[cfg(test)]
pub(crate) mod sim {
  use super::Console;
  use crossterm::style::Color;
  use std::io;

  #[derive(Debug)]
  pub struct SimConsole {
    pub width: u16,
    pub height: u16,
    pub row: u16,
    pub col: u16,
    pub lines: Vec<String>,
    pub scrolled: usize,
    pub wraps: usize,
    pub cursor_visible: bool,
    pub fg: Color,
  }

  impl SimConsole {
    pub fn new(width: u16, height: u16, row: u16) -> Self {
      Self {
        width,
        height,
        row,
        col: 0,
        lines: vec![String::new(); usize::from(height)],
        scrolled: 0,
        wraps: 0,
        cursor_visible: true,
        fg: Color::Reset,
      }
    }

    pub fn line(&self, row: u16) -> &str {
      self.lines[usize::from(row)].trim_end()
    }

    fn advance_row(&mut self) {
      if self.row + 1 >= self.height {
        self.lines.remove(0);
        self.lines.push(String::new());
        self.scrolled += 1;
      } else {
        self.row += 1;
      }
      self.col = 0;
    }

    fn put(&mut self, ch: char) {
      if self.col >= self.width {
        self.wraps += 1;
        self.advance_row();
      }

      let line = &mut self.lines[usize::from(self.row)];
      let mut cells: Vec<char> = line.chars().collect();
      let col = usize::from(self.col);
      if cells.len() <= col {
        cells.resize(col + 1, ' ');
      }
      cells[col] = ch;
      *line = cells.into_iter().collect();
      self.col += 1;
    }
  }

  impl Console for SimConsole {
    fn size(&self) -> io::Result<(u16, u16)> {
      Ok((self.width, self.height))
    }

    fn cursor_row(&mut self) -> io::Result<u16> {
      Ok(self.row)
    }

    fn move_to_row(&mut self, row: u16) -> io::Result<()> {
      assert!(row < self.height, "cursor moved below the window: {row}");
      self.row = row;
      self.col = 0;
      Ok(())
    }

    fn write(&mut self, text: &str) -> io::Result<()> {
      for ch in text.chars() {
        self.put(ch);
      }
      Ok(())
    }

    fn newline(&mut self) -> io::Result<()> {
      self.advance_row();
      Ok(())
    }

    fn clear_line_tail(&mut self) -> io::Result<()> {
      let line = &mut self.lines[usize::from(self.row)];
      *line = line.chars().take(usize::from(self.col)).collect();
      Ok(())
    }

    fn set_foreground(&mut self, color: Color) -> io::Result<()> {
      self.fg = color;
      Ok(())
    }

    fn set_background(&mut self, _color: Color) -> io::Result<()> {
      Ok(())
    }

    fn colors(&self) -> (Color, Color) {
      (Color::Reset, Color::Reset)
    }

    fn set_cursor_visible(&mut self, visible: bool) -> io::Result<()> {
      self.cursor_visible = visible;
      Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
      Ok(())
    }
  }
}
