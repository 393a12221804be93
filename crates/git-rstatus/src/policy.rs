use crate::scan::DiscoveredRoot;
use fast_glob::glob_match;
use std::path::Path;
use tracing::debug;

/// A user supplied path pattern.
///
/// `*` alone matches everything. Patterns containing glob syntax are matched
/// with `fast-glob` against the full path. Anything else matches when the
/// path ends with the pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern(String);

impl PathPattern {
  pub fn new(pattern: impl Into<String>) -> Self {
    Self(pattern.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  fn is_glob(&self) -> bool {
    self.0.contains(['*', '?', '[', '{'])
  }

  pub fn matches(&self, path: &str) -> bool {
    if self.0 == "*" {
      return true;
    }

    if self.is_glob() {
      glob_match(self.0.as_str(), path)
    } else {
      path.trim_end_matches('/').ends_with(self.0.trim_end_matches('/'))
    }
  }
}

/// Splits comma separated CLI values into patterns, dropping empty entries.
pub fn parse_patterns<S: AsRef<str>>(values: &[S]) -> Vec<PathPattern> {
  values
    .iter()
    .flat_map(|v| v.as_ref().split(','))
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .map(PathPattern::new)
    .collect()
}

fn first_match<'a>(patterns: &'a [PathPattern], path: &str) -> Option<&'a PathPattern> {
  patterns.iter().find(|p| p.matches(path))
}

/// Decides which directories are scanned, which repositories are fetched,
/// and which are skipped outright.
#[derive(Debug, Clone, Default)]
pub struct Policy {
  pub exclude: Vec<PathPattern>,
  pub no_sync: Vec<PathPattern>,
  pub ignore: Vec<PathPattern>,
  pub pull: bool,
  pub remote_info: bool,
}

impl Policy {
  /// Should the scanner skip this directory and everything below it?
  pub fn exclude(&self, path: &Path) -> bool {
    let path = path.to_string_lossy();
    match first_match(&self.exclude, &path) {
      Some(pattern) => {
        debug!(%path, pattern = pattern.as_str(), "excluding directory");
        true
      }
      None => false,
    }
  }

  /// Should the repository be fetched before its status is read?
  pub fn should_sync(&self, root: &DiscoveredRoot) -> bool {
    first_match(&self.no_sync, &root.relative.to_string_lossy()).is_none()
  }

  /// Pre-marked repositories skip every query.
  pub fn is_ignored(&self, root: &DiscoveredRoot) -> bool {
    first_match(&self.ignore, &root.path.to_string_lossy()).is_some()
  }

  pub fn pull_requested(&self) -> bool {
    self.pull
  }
}
