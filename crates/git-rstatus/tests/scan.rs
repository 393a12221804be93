mod common;

use common::make_repos;
use git_rstatus::scan::scan;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn relative_paths(root: &std::path::Path, max_depth: usize) -> Vec<PathBuf> {
  scan(root, max_depth, |_| false)
    .unwrap()
    .roots
    .into_iter()
    .map(|r| r.relative)
    .collect()
}

#[test]
fn depth_limits_discovery() {
  let dir = TempDir::new().unwrap();
  make_repos(dir.path(), &["a/b/c"]);

  assert_eq!(relative_paths(dir.path(), 4), vec![PathBuf::from("a/b/c")]);
  assert_eq!(relative_paths(dir.path(), 3), vec![PathBuf::from("a/b/c")]);
  assert!(relative_paths(dir.path(), 2).is_empty());
}

#[test]
fn finds_nested_repositories_in_name_order() {
  let dir = TempDir::new().unwrap();
  make_repos(dir.path(), &["zeta", "alpha", "alpha/vendor/lib", "mid/one"]);
  fs::create_dir_all(dir.path().join("empty/deeper")).unwrap();

  assert_eq!(
    relative_paths(dir.path(), 8),
    vec![
      PathBuf::from("alpha"),
      PathBuf::from("alpha/vendor/lib"),
      PathBuf::from("mid/one"),
      PathBuf::from("zeta"),
    ]
  );
}

#[test]
fn scan_root_can_be_a_repository() {
  let dir = TempDir::new().unwrap();
  make_repos(dir.path(), &["."]);

  let report = scan(dir.path(), 8, |_| false).unwrap();
  assert_eq!(report.roots.len(), 1);
  assert_eq!(report.roots[0].relative, PathBuf::from("."));
  assert_eq!(report.roots[0].path, dir.path());
}

#[test]
fn git_directories_are_not_searched() {
  let dir = TempDir::new().unwrap();
  make_repos(dir.path(), &["app", "app/.git/modules/lib"]);

  assert_eq!(relative_paths(dir.path(), 8), vec![PathBuf::from("app")]);
}

#[test]
fn excluded_subtrees_are_skipped() {
  let dir = TempDir::new().unwrap();
  make_repos(dir.path(), &["app", "app/node_modules/pkg", "lib"]);

  let report = scan(dir.path(), 8, |path| path.ends_with("node_modules")).unwrap();
  let found: Vec<PathBuf> = report.roots.into_iter().map(|r| r.relative).collect();
  assert_eq!(found, vec![PathBuf::from("app"), PathBuf::from("lib")]);
}

#[cfg(unix)]
#[test]
fn symlinks_are_not_followed() {
  let dir = TempDir::new().unwrap();
  make_repos(dir.path(), &["a"]);
  std::os::unix::fs::symlink(dir.path(), dir.path().join("a/loop")).unwrap();

  let report = scan(dir.path(), 50, |_| false).unwrap();
  assert_eq!(report.roots.len(), 1);
}

#[cfg(unix)]
#[test]
fn unreadable_directories_are_skipped() {
  use std::os::unix::fs::PermissionsExt;

  let dir = TempDir::new().unwrap();
  make_repos(dir.path(), &["open/repo", "locked/repo", "zeta"]);
  let locked = dir.path().join("locked");
  fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

  // Privileged users read through the mode bits, so there is nothing to test
  if fs::read_dir(&locked).is_ok() {
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    return;
  }

  let result = scan(dir.path(), 8, |_| false);
  fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

  let found: Vec<PathBuf> = result.unwrap().roots.into_iter().map(|r| r.relative).collect();
  assert_eq!(found, vec![PathBuf::from("open/repo"), PathBuf::from("zeta")]);
}

#[test]
fn missing_root_is_an_error() {
  let dir = TempDir::new().unwrap();
  assert!(scan(&dir.path().join("nope"), 8, |_| false).is_err());
}
