//! Daemon pid file
//!
//! The daemon records its pid so `keyguide reload` can send it SIGHUP.
//! The file lives at `$XDG_RUNTIME_DIR/keyguide.pid` if the environment
//! variable is set, otherwise at `/tmp/keyguide-$UID.pid`.

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Pid file owned by the running daemon, removed on drop
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the pid file at the default location
    pub fn create() -> Result<Self> {
        Self::create_at(keyguide_config::pid_file_path())
    }

    /// Write the current pid to `path`, replacing a stale file from a
    /// previous run.
    pub fn create_at(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if path.exists() {
            tracing::debug!("Replacing stale pid file: {}", path.display());
        }

        std::fs::write(&path, format!("{}\n", std::process::id()))
            .with_context(|| format!("Failed to write pid file: {}", path.display()))?;

        tracing::info!("Pid file: {}", path.display());
        Ok(Self { path })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed pid file: {}", self.path.display()),
            Err(e) => tracing::warn!("Failed to remove pid file on shutdown: {}", e),
        }
    }
}
