#![cfg(unix)]

use git_rstatus::query::{GitQueries, QueryKind, QueryRunner};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::TempDir;

/// A stand-in `git` that reports its arguments and prompt setting.
fn fake_git(dir: &Path) -> String {
  let path = dir.join("fake-git");
  fs::write(&path, "#!/bin/sh\necho \"$GIT_TERMINAL_PROMPT $*\"\n").unwrap();
  fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
  path.display().to_string()
}

#[tokio::test]
async fn queries_never_prompt_for_credentials() {
  let dir = TempDir::new().unwrap();
  let queries = GitQueries::with_program(fake_git(dir.path()));

  let fetch = queries.query(QueryKind::Sync, dir.path(), None).await.unwrap();
  assert_eq!(fetch.output.stdout, vec!["0 fetch"]);

  let status = queries.query(QueryKind::Status, dir.path(), None).await.unwrap();
  assert_eq!(status.kind, QueryKind::Status);
  assert_eq!(status.output.stdout, vec!["0 status -bs"]);
}
