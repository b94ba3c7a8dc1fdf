//! Configuration file parsing (spec §6 "Configuration file").
//!
//! A thin, line-oriented `key = value` parser with `[section]` headers —
//! hand-rolled because the original's own `stu_conf_file_parse` reads a
//! dialect no existing crate targets (see DESIGN.md). Treated as an
//! external collaborator per spec §1: only the keys the core actually
//! consumes are recognized.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Io { path: PathBuf, #[source] source: std::io::Error },
  #[error("invalid line {line}: {text}")]
  InvalidLine { line: usize, text: String },
  #[error("invalid value for {key} at line {line}: {value}")]
  InvalidValue { key: String, line: usize, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLevel {
  Error,
  Warn,
  Info,
  Debug,
}

impl LogLevel {
  fn parse(s: &str) -> Option<Self> {
    match s.to_ascii_lowercase().as_str() {
      "error" => Some(LogLevel::Error),
      "warn" | "warning" => Some(LogLevel::Warn),
      "info" => Some(LogLevel::Info),
      "debug" => Some(LogLevel::Debug),
      _ => None,
    }
  }

  pub fn as_tracing_filter(&self) -> &'static str {
    match self {
      LogLevel::Error => "error",
      LogLevel::Warn => "warn",
      LogLevel::Info => "info",
      LogLevel::Debug => "debug",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
  pub path: Option<PathBuf>,
  pub level: LogLevel,
}

impl Default for LogConfig {
  fn default() -> Self {
    LogConfig { path: None, level: LogLevel::Info }
  }
}

/// Recognized keys consumed by the core (spec §6): `pid`, `listen`,
/// `worker_processes`, `worker_threads`, `log`. Absent keys take these
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  pub pid: PathBuf,
  pub listen: u16,
  pub worker_processes: usize,
  pub worker_threads: usize,
  pub log: LogConfig,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      pid: PathBuf::from("/var/run/chatease-server.pid"),
      listen: 8080,
      worker_processes: 1,
      worker_threads: 0,
      log: LogConfig::default(),
    }
  }
}

impl Config {
  pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    Self::parse(&text)
  }

  pub fn parse(text: &str) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();
    let mut section = String::new();

    for (i, raw_line) in text.lines().enumerate() {
      let line_no = i + 1;
      let line = raw_line.split('#').next().unwrap_or("").trim();
      if line.is_empty() {
        continue;
      }
      if line.starts_with('[') {
        if !line.ends_with(']') {
          return Err(ConfigError::InvalidLine { line: line_no, text: raw_line.to_string() });
        }
        section = line[1..line.len() - 1].trim().to_ascii_lowercase();
        continue;
      }
      let Some((key, value)) = line.split_once('=') else {
        return Err(ConfigError::InvalidLine { line: line_no, text: raw_line.to_string() });
      };
      let key = key.trim().to_ascii_lowercase();
      let value = value.trim();
      apply(&mut cfg, &section, &key, value, line_no)?;
    }

    Ok(cfg)
  }
}

fn apply(cfg: &mut Config, section: &str, key: &str, value: &str, line_no: usize) -> Result<(), ConfigError> {
  let full_key = if section.is_empty() { key.to_string() } else { format!("{section}.{key}") };
  match full_key.as_str() {
    "pid" => cfg.pid = PathBuf::from(value),
    "listen" => {
      cfg.listen = value.parse().map_err(|_| invalid(key, value, line_no))?;
    }
    "worker_processes" => {
      cfg.worker_processes = value.parse().map_err(|_| invalid(key, value, line_no))?;
    }
    "worker_threads" => {
      cfg.worker_threads = value.parse().map_err(|_| invalid(key, value, line_no))?;
    }
    "log.path" => cfg.log.path = Some(PathBuf::from(value)),
    "log.level" => {
      cfg.log.level = LogLevel::parse(value).ok_or_else(|| invalid("log.level", value, line_no))?;
    }
    // Unrecognized keys are ignored, not fatal — matches the original's
    // "absent keys take documented defaults" posture for keys the core
    // doesn't consume (e.g. edition-specific settings for other modules).
    _ => {}
  }
  Ok(())
}

fn invalid(key: &str, value: &str, line: usize) -> ConfigError {
  ConfigError::InvalidValue { key: key.to_string(), line, value: value.to_string() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_recognized_keys() {
    let text = "pid = /tmp/chatease.pid\nlisten = 9001\nworker_processes = 4\nworker_threads = 2\n\n[log]\npath = /var/log/chatease.log\nlevel = debug\n";
    let cfg = Config::parse(text).unwrap();
    assert_eq!(cfg.pid, PathBuf::from("/tmp/chatease.pid"));
    assert_eq!(cfg.listen, 9001);
    assert_eq!(cfg.worker_processes, 4);
    assert_eq!(cfg.worker_threads, 2);
    assert_eq!(cfg.log.path, Some(PathBuf::from("/var/log/chatease.log")));
    assert_eq!(cfg.log.level, LogLevel::Debug);
  }

  #[test]
  fn unrecognized_keys_are_ignored() {
    let cfg = Config::parse("edition = premium\nlisten = 80\n").unwrap();
    assert_eq!(cfg.listen, 80);
  }

  #[test]
  fn comments_and_blank_lines_are_skipped() {
    let cfg = Config::parse("# a comment\n\nlisten = 1234 # inline\n").unwrap();
    assert_eq!(cfg.listen, 1234);
  }

  #[test]
  fn malformed_line_is_an_error() {
    assert!(Config::parse("not a kv line").is_err());
  }

  #[test]
  fn absent_keys_take_defaults() {
    let cfg = Config::parse("").unwrap();
    assert_eq!(cfg, Config::default());
  }
}
