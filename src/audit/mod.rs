//! Append-only audit log of commands sent and output received.
//!
//! Records are JSON lines written to a single file that is never rotated or
//! truncated by this process. The logger is cheap to clone and safe to share
//! across threads: each record is one `write_all` performed under a lock, so
//! lines from different writers never interleave.

mod record;

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::LogWriteError;

pub use record::{AuditEvent, AuditKind, TIMESTAMP_FORMAT};

/// Shared handle to the audit file.
#[derive(Clone)]
pub struct AuditLogger {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditLogger {
    /// Open (or create) the audit file in append mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LogWriteError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| LogWriteError::Open {
                path: path.clone(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LogWriteError::Open {
                path: path.clone(),
                source,
            })?;

        tracing::info!("Audit log opened at {}", path.display());

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                file: Mutex::new(file),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Append one record stamped with the current UTC time.
    pub fn record(&self, kind: AuditKind, text: &str) -> Result<(), LogWriteError> {
        self.append(&AuditEvent::now(kind, text))
    }

    /// Append a prepared event.
    pub fn append(&self, event: &AuditEvent) -> Result<(), LogWriteError> {
        // Serialize outside the lock; only the write is serialized.
        let line = event.to_line()?;

        let mut file = self.inner.file.lock();
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}
