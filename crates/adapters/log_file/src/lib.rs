//! # areaflow-adapter-log-file
//!
//! File-backed implementation of the applet log port.
//!
//! ## Responsibilities
//! - Open (or create) `<dir>/<applet uuid>.log` when a trigger is created
//! - Append `[INFO - <uuid>]: <message>` / `[ERROR - <uuid>]: <message>`
//!   lines, flushed after each write so an external tail sees them at once
//! - Mirror echoed lines to the process log through `tracing`
//!
//! ## Dependency rule
//! Depends on `areaflow-app` (for the port traits) and `areaflow-domain`.

use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use areaflow_app::ports::{AppletLog, AppletLogFactory, LogLevel};
use areaflow_domain::error::AreaFlowError;
use areaflow_domain::id::AppletId;

/// Errors raised while preparing log files.
#[derive(Debug, thiserror::Error)]
pub enum LogFileError {
    #[error("unable to create log directory {path}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to open log file {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<LogFileError> for AreaFlowError {
    fn from(err: LogFileError) -> Self {
        Self::Log(Box::new(err))
    }
}

/// Hands out one [`FileAppletLog`] per applet, all under the same directory.
#[derive(Debug, Clone)]
pub struct FileAppletLogs {
    dir: PathBuf,
}

impl FileAppletLogs {
    /// Use `dir` for log files, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`LogFileError::Directory`] if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, LogFileError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| LogFileError::Directory {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the log file of `applet_id`.
    #[must_use]
    pub fn path_of(&self, applet_id: AppletId) -> PathBuf {
        self.dir.join(format!("{applet_id}.log"))
    }
}

impl AppletLogFactory for FileAppletLogs {
    fn open(&self, applet_id: AppletId) -> Result<Arc<dyn AppletLog>, AreaFlowError> {
        let path = self.path_of(applet_id);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LogFileError::Open { path, source })?;
        Ok(Arc::new(FileAppletLog {
            applet_id,
            writer: Mutex::new(LineWriter::new(file)),
        }))
    }
}

/// Append-only log of one applet.
pub struct FileAppletLog {
    applet_id: AppletId,
    writer: Mutex<LineWriter<File>>,
}

impl FileAppletLog {
    fn format(&self, level: LogLevel, message: &str) -> String {
        format!("[{} - {}]: {message}\n", level.as_str(), self.applet_id)
    }
}

impl AppletLog for FileAppletLog {
    fn write(&self, level: LogLevel, message: &str, echo: bool) {
        if echo {
            match level {
                LogLevel::Info => tracing::info!(applet_id = %self.applet_id, "{message}"),
                LogLevel::Error => tracing::error!(applet_id = %self.applet_id, "{message}"),
            }
        }
        let line = self.format(level, message);
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let written = writer.write_all(line.as_bytes());
        if let Err(err) = written.and_then(|()| writer.flush()) {
            tracing::warn!(applet_id = %self.applet_id, error = %err, "unable to write applet log");
        }
    }

    fn flush(&self) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = writer.flush() {
            tracing::warn!(applet_id = %self.applet_id, error = %err, "unable to flush applet log");
        }
    }
}
