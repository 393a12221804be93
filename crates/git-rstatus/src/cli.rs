use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_LOG_FILE: &str = "git-rstatus.log";

#[derive(Debug, Default, Parser)]
#[command(name = "git-rstatus")]
#[command(about = "Fast recursive git status (with fetch and pull)")]
#[command(version)]
pub struct Cli {
  /// Directories to scan for repositories (default: current directory)
  #[arg(value_name = "PATH")]
  pub paths: Vec<PathBuf>,

  /// Skip directories matching these patterns while scanning
  #[arg(long, value_name = "PATTERNS", value_delimiter = ',')]
  pub exclude: Vec<String>,

  /// Do not fetch repositories matching these patterns
  #[arg(long, value_name = "PATTERNS", value_delimiter = ',')]
  pub no_fetch: Vec<String>,

  /// Do not fetch any repository
  #[arg(long)]
  pub no_fetch_all: bool,

  /// Report repositories matching these patterns without querying them
  #[arg(long, value_name = "PATTERNS", value_delimiter = ',')]
  pub ignore: Vec<String>,

  /// Pull repositories that are behind and have no local changes
  #[arg(short, long)]
  pub pull: bool,

  /// Query remote URLs of every repository
  #[arg(long)]
  pub remote: bool,

  /// Maximum directory depth to scan
  #[arg(long, value_name = "N")]
  pub depth: Option<usize>,

  /// Number of repositories processed at the same time
  #[arg(short = 'j', long, value_name = "N")]
  pub concurrency: Option<usize>,

  /// Kill git commands running longer than this (e.g. 30s, 2m)
  #[arg(long, value_name = "DURATION")]
  pub timeout: Option<String>,

  /// Show absolute paths
  #[arg(short, long)]
  pub abs: bool,

  /// Print the final result as JSON
  #[arg(long)]
  pub json: bool,

  /// Write a debug log to FILE
  #[arg(long, value_name = "FILE", num_args = 0..=1, default_missing_value = DEFAULT_LOG_FILE)]
  pub log: Option<PathBuf>,

  /// Read settings from FILE instead of looking for one in the current directory
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pattern_lists_split_on_commas() {
    let cli = Cli::parse_from([
      "git-rstatus",
      "--exclude",
      "node_modules,target",
      "--no-fetch",
      "vendor",
      "src",
    ]);
    assert_eq!(cli.exclude, vec!["node_modules", "target"]);
    assert_eq!(cli.no_fetch, vec!["vendor"]);
    assert_eq!(cli.paths, vec![PathBuf::from("src")]);
  }

  #[test]
  fn log_file_is_optional() {
    let cli = Cli::parse_from(["git-rstatus", "--log"]);
    assert_eq!(cli.log, Some(PathBuf::from(DEFAULT_LOG_FILE)));

    let cli = Cli::parse_from(["git-rstatus", "--log=run.log", "-j", "8"]);
    assert_eq!(cli.log, Some(PathBuf::from("run.log")));
    assert_eq!(cli.concurrency, Some(8));
  }

  #[test]
  fn short_flags() {
    let cli = Cli::parse_from(["git-rstatus", "-p", "-a"]);
    assert!(cli.pull);
    assert!(cli.abs);
    assert!(!cli.json);
  }
}
