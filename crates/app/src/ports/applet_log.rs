//! Applet log port — the per-applet append-only audit trail.
//!
//! Every trigger worker writes at least one line per completed cycle so that
//! an external tail of the log reflects liveness.

use std::sync::Arc;

use areaflow_domain::error::AreaFlowError;
use areaflow_domain::id::AppletId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Error => "ERROR",
        }
    }
}

/// Sink for one applet's log lines.
///
/// Writes never fail from the caller's point of view: a worker must keep
/// running even if its log becomes unwritable.
pub trait AppletLog: Send + Sync {
    /// Append one line. `echo` also mirrors it to the process log.
    fn write(&self, level: LogLevel, message: &str, echo: bool);

    /// Flush buffered lines to the underlying medium.
    fn flush(&self);

    fn info(&self, message: &str) {
        self.write(LogLevel::Info, message, false);
    }

    fn error(&self, message: &str) {
        self.write(LogLevel::Error, message, true);
    }
}

/// Opens the log of an applet when its trigger is created.
pub trait AppletLogFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AreaFlowError::Log`] when the log cannot be opened or
    /// created; the trigger must then not be created.
    fn open(&self, applet_id: AppletId) -> Result<Arc<dyn AppletLog>, AreaFlowError>;
}

impl<T: AppletLogFactory> AppletLogFactory for Arc<T> {
    fn open(&self, applet_id: AppletId) -> Result<Arc<dyn AppletLog>, AreaFlowError> {
        (**self).open(applet_id)
    }
}
