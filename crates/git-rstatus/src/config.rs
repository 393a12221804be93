use crate::cli::Cli;
use crate::error::{AppError, Result};
use crate::policy::{Policy, parse_patterns};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum ConfigSource {
  TomlFile(PathBuf),
  JsonFile(PathBuf),
}

impl ConfigSource {
  fn from_path(path: PathBuf) -> Self {
    match path.extension().and_then(|e| e.to_str()) {
      Some("json") => ConfigSource::JsonFile(path),
      _ => ConfigSource::TomlFile(path),
    }
  }
}

// Lookup order
const FILE_CANDIDATES: [(&str, fn(PathBuf) -> ConfigSource); 4] = [
  (".git-rstatus.toml", ConfigSource::TomlFile),
  ("git-rstatus.toml", ConfigSource::TomlFile),
  (".git-rstatus.json", ConfigSource::JsonFile),
  ("git-rstatus.json", ConfigSource::JsonFile),
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  pub max_depth: usize,
  pub concurrency: usize,
  // Duration string, e.g. "30s" or "2m"
  pub timeout: Option<String>,
  pub exclude: Vec<String>,
  pub no_fetch: Vec<String>,
  pub ignore: Vec<String>,
  pub pull: bool,
  pub remote: bool,
  pub abs: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      max_depth: 8,
      concurrency: 4,
      timeout: Some("60s".to_string()),
      exclude: Vec::new(),
      no_fetch: Vec::new(),
      ignore: Vec::new(),
      pull: false,
      remote: false,
      abs: false,
    }
  }
}

impl Config {
  pub fn find_file(dir: &Path) -> Result<ConfigSource> {
    let mut checked_paths = Vec::new();

    for (filename, source_fn) in FILE_CANDIDATES {
      let path = dir.join(filename);

      checked_paths.push(path.clone());

      if path.exists() {
        return Ok(source_fn(path));
      }
    }

    Err(AppError::ConfigNotFound { checked_paths })
  }

  /// Settings from the first candidate file in `dir`, or defaults when
  /// there is none.
  pub fn discover(dir: &Path) -> Result<Config> {
    match Self::find_file(dir) {
      Ok(source) => Self::load(source),
      Err(AppError::ConfigNotFound { .. }) => Ok(Config::default()),
      Err(e) => Err(e),
    }
  }

  /// Settings from an explicitly named file, which must exist.
  pub fn from_file(path: &Path) -> Result<Config> {
    if !path.exists() {
      return Err(AppError::ConfigNotFound {
        checked_paths: vec![path.to_path_buf()],
      });
    }
    Self::load(ConfigSource::from_path(path.to_path_buf()))
  }

  pub fn load(source: ConfigSource) -> Result<Config> {
    match source {
      ConfigSource::TomlFile(path) => {
        let config_content = fs::read_to_string(&path).map_err(|e| AppError::ConfigInvalid {
          path: path.clone(),
          details: format!("Failed to read toml file: {}", e),
        })?;

        toml::from_str(&config_content).map_err(|e| AppError::ConfigInvalid {
          path: path.clone(),
          details: format!("Invalid TOML: {}", e),
        })
      }
      ConfigSource::JsonFile(path) => {
        let config_content = fs::read_to_string(&path).map_err(|e| AppError::ConfigInvalid {
          path: path.clone(),
          details: format!("Failed to read json file: {}", e),
        })?;

        serde_json::from_str(&config_content).map_err(|e| AppError::ConfigInvalid {
          path: path.clone(),
          details: format!("Invalid JSON: {}", e),
        })
      }
    }
  }
}

/// Fully resolved run settings: file values with command line overrides.
#[derive(Debug, Clone)]
pub struct Settings {
  pub roots: Vec<PathBuf>,
  pub max_depth: usize,
  pub concurrency: usize,
  pub timeout: Option<Duration>,
  pub absolute: bool,
  pub json: bool,
  pub policy: Policy,
}

impl Settings {
  pub fn resolve(config: Config, cli: &Cli) -> Result<Settings> {
    let timeout = match cli.timeout.as_deref().or(config.timeout.as_deref()) {
      Some(text) => Some(parse_timeout(text)?),
      None => None,
    };

    let concurrency = cli.concurrency.unwrap_or(config.concurrency);
    if concurrency == 0 {
      return Err(AppError::InvalidArgument("concurrency must be at least 1".to_string()));
    }

    let mut no_sync = parse_patterns(&config.no_fetch);
    no_sync.extend(parse_patterns(&cli.no_fetch));
    if cli.no_fetch_all {
      no_sync = parse_patterns(&["*"]);
    }

    let mut exclude = parse_patterns(&config.exclude);
    exclude.extend(parse_patterns(&cli.exclude));

    let mut ignore = parse_patterns(&config.ignore);
    ignore.extend(parse_patterns(&cli.ignore));

    let roots = if cli.paths.is_empty() {
      vec![std::env::current_dir()?]
    } else {
      cli.paths.iter().map(|p| absolutize(p)).collect::<Result<_>>()?
    };

    Ok(Settings {
      roots,
      max_depth: cli.depth.unwrap_or(config.max_depth),
      concurrency,
      timeout,
      absolute: cli.abs || config.abs,
      json: cli.json,
      policy: Policy {
        exclude,
        no_sync,
        ignore,
        pull: cli.pull || config.pull,
        remote_info: cli.remote || config.remote,
      },
    })
  }
}

fn parse_timeout(text: &str) -> Result<Duration> {
  let timeout = parse_duration::parse(text)
    .map_err(|e| AppError::InvalidArgument(format!("invalid timeout '{}': {}", text, e)))?;

  if timeout.is_zero() {
    return Err(AppError::InvalidArgument(format!("timeout '{}' must be positive", text)));
  }
  Ok(timeout)
}

fn absolutize(path: &Path) -> Result<PathBuf> {
  if path.is_absolute() {
    Ok(path.to_path_buf())
  } else {
    Ok(std::env::current_dir()?.join(path))
  }
}
