use crate::error::{AppError, Result};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Name of the marker directory that makes a directory a repository root.
pub const GIT_MARKER: &str = ".git";

/// A repository root found while scanning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveredRoot {
  pub path: PathBuf,
  /// Path relative to the scan root the repository was found under.
  pub relative: PathBuf,
}

impl DiscoveredRoot {
  pub fn new(scan_root: &Path, path: PathBuf) -> Self {
    let relative = match path.strip_prefix(scan_root) {
      Ok(rel) if rel.as_os_str().is_empty() => PathBuf::from("."),
      Ok(rel) => rel.to_path_buf(),
      Err(_) => path.clone(),
    };

    Self { path, relative }
  }
}

#[derive(Debug, Default)]
pub struct ScanReport {
  pub roots: Vec<DiscoveredRoot>,
  pub directories_visited: usize,
}

/// Walks `root` depth first looking for directories holding a `.git` folder.
///
/// The root itself is depth 0. Directories deeper than `max_depth` are never
/// looked at. `exclude` is asked about every child before descending, and an
/// excluded subtree is skipped whole. Permission errors are skipped; any
/// other I/O error aborts the scan.
pub fn scan<F>(root: &Path, max_depth: usize, exclude: F) -> Result<ScanReport>
where
  F: Fn(&Path) -> bool,
{
  let mut report = ScanReport::default();

  // Symlinks are not followed, which also keeps cycles out of the walk
  let walker = WalkDir::new(root)
    .follow_links(false)
    .max_depth(max_depth)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|entry| {
      entry.depth() == 0
        || (entry.file_type().is_dir() && entry.file_name() != GIT_MARKER && !exclude(entry.path()))
    });

  for entry in walker {
    let entry = match entry {
      Ok(entry) => entry,
      Err(e) if e.io_error().map(io::Error::kind) == Some(ErrorKind::PermissionDenied) => continue,
      Err(e) => {
        let path = e.path().unwrap_or(root).to_path_buf();
        return Err(AppError::Scan {
          path,
          source: io::Error::from(e),
        });
      }
    };

    report.directories_visited += 1;
    if entry.path().join(GIT_MARKER).is_dir() {
      report.roots.push(DiscoveredRoot::new(root, entry.into_path()));
    }
  }

  Ok(report)
}
