// ABOUTME: Exclusive lock files guarding the deploy repository and the server-side installer.
// ABOUTME: Uses atomic create-new with holder info as JSON; stale locks (>1 hour) are broken.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lock file for release/rollback, inside the deploy repository's `.git`.
pub const REPOSITORY_LOCK: &str = "pushdeploy.lock";
/// Lock file for the installer, inside the bare repository.
pub const INSTALL_LOCK: &str = "pushdeploy-install.lock";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("{path} is locked by {holder} (pid {pid}) since {started_at}")]
    Held {
        path: PathBuf,
        holder: String,
        pid: u32,
        started_at: DateTime<Utc>,
    },

    #[error("failed to acquire lock {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Information about who holds a lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// What the holder is doing, e.g. `release api`.
    pub operation: String,
}

impl LockInfo {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            operation: operation.into(),
        }
    }

    /// Check if this lock is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }
}

/// A held lock that is released on drop.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// Acquire the lock at `path`, breaking it when stale or unreadable.
    pub fn acquire(path: &Path, operation: &str) -> Result<Self, LockError> {
        let info = LockInfo::new(operation);
        match Self::try_create(path, &info) {
            Ok(lock) => return Ok(lock),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(source) => {
                return Err(LockError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }

        match std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str::<LockInfo>(&s).ok())
        {
            Some(existing) if !existing.is_stale() => {
                return Err(LockError::Held {
                    path: path.to_path_buf(),
                    holder: existing.holder,
                    pid: existing.pid,
                    started_at: existing.started_at,
                });
            }
            Some(existing) => tracing::warn!(
                "breaking stale lock {} held by {} (pid {}) since {}",
                path.display(),
                existing.holder,
                existing.pid,
                existing.started_at
            ),
            None => tracing::warn!("lock info in {} unreadable, breaking lock", path.display()),
        }

        let _ = std::fs::remove_file(path);
        Self::try_create(path, &info).map_err(|source| LockError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn try_create(path: &Path, info: &LockInfo) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let json = serde_json::to_string(info).map_err(std::io::Error::other)?;
        file.write_all(json.as_bytes())?;
        tracing::debug!("acquired lock {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("failed to release lock {}: {}", self.path.display(), e);
        }
    }
}
