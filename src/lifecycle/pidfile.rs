//! Pid file written at startup and removed on exit.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current process id to `path`.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        fs::write(&path, format!("{}\n", std::process::id()))?;
        tracing::debug!(path = %path.display(), "Pid file written");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove pid file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_file_lifecycle() {
        let path = std::env::temp_dir().join(format!("metric-zipper-{}.pid", uuid::Uuid::new_v4()));

        let pid = PidFile::create(&path).unwrap();
        let content = fs::read_to_string(pid.path()).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());

        drop(pid);
        assert!(!path.exists());
    }

    #[test]
    fn test_unwritable_location() {
        assert!(PidFile::create("/nonexistent-dir/zipper.pid").is_err());
    }
}
