//! Recursive git status for every repository under a set of directories,
//! drawn as a live table in a fixed region of the terminal.

pub mod app;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod item;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod output;
pub mod policy;
pub mod query;
pub mod render;
pub mod scan;
pub mod table;
pub mod viewport;

pub use app::{App, Report};
pub use cli::Cli;
pub use error::{AppError, Result};

use config::{Config, Settings};
use query::GitQueries;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

/// Runs the whole program for parsed command line arguments and returns the
/// process exit code.
pub async fn run(cli: Cli) -> Result<i32> {
  if let Some(path) = &cli.log {
    logging::init(path)?;
  }

  let config = match &cli.config {
    Some(path) => Config::from_file(path)?,
    None => Config::discover(&std::env::current_dir()?)?,
  };
  let settings = Settings::resolve(config, &cli)?;

  let queries = GitQueries::default();
  command::ensure_program(queries.program())?;

  let json = settings.json;
  let interactive = !json && io::stdout().is_terminal();

  let report = App::new(settings, Arc::new(queries), interactive).run().await?;

  {
    let mut out = io::stdout().lock();
    if json {
      output::write_json(&mut out, &report.summaries)?;
    } else if !interactive {
      output::write_plain(&mut out, &report.summaries)?;
    }
    out.flush()?;
  }

  if report.summaries.is_empty() {
    eprintln!("No git repositories found");
  }
  if let Some((path, error)) = &report.first_error {
    eprintln!("{}: {}", path, error);
  }

  Ok(report.exit_code())
}
