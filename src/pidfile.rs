//! Pidfile management (spec §6 "Persisted state").
//!
//! A pidfile at the configured path containing the master process id as
//! ASCII decimal + newline; removed on shutdown.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PidfileError {
  #[error("failed to write pidfile {path}: {source}")]
  Write { path: PathBuf, #[source] source: std::io::Error },
}

/// Owns the on-disk pidfile; removes it when dropped so shutdown (clean or
/// via an early return) always cleans up, the same "runs on every close
/// path" guarantee `ConnPool`'s `Drop` gives connections.
pub struct Pidfile {
  path: PathBuf,
}

impl Pidfile {
  pub fn create(path: &Path, pid: u32) -> Result<Self, PidfileError> {
    std::fs::write(path, format!("{}\n", pid)).map_err(|source| PidfileError::Write { path: path.to_path_buf(), source })?;
    Ok(Pidfile { path: path.to_path_buf() })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Drop for Pidfile {
  fn drop(&mut self) {
    let _ = std::fs::remove_file(&self.path);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn create_writes_pid_as_decimal_plus_newline() {
    let dir = std::env::temp_dir().join(format!("chatease-pidfile-test-{}", std::process::id()));
    let pidfile = Pidfile::create(&dir, 4242).unwrap();
    let contents = std::fs::read_to_string(pidfile.path()).unwrap();
    assert_eq!(contents, "4242\n");
  }

  #[test]
  fn drop_removes_the_file() {
    let dir = std::env::temp_dir().join(format!("chatease-pidfile-test-drop-{}", std::process::id()));
    let path = dir.clone();
    {
      let _pidfile = Pidfile::create(&dir, 1).unwrap();
      assert!(path.exists());
    }
    assert!(!path.exists());
  }
}
