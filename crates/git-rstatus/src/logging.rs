use crate::error::Result;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Sends all events to `path`. The terminal belongs to the dashboard, so
/// nothing is logged unless a file is given.
///
/// `RUST_LOG` directives are honored on top of the default `debug` level.
pub fn init(path: &Path) -> Result<()> {
  let file = OpenOptions::new().create(true).append(true).open(path)?;

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
    .with_writer(Mutex::new(file))
    .with_ansi(false)
    .with_thread_ids(true)
    .init();

  Ok(())
}
