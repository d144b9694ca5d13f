//! Control protocol and observable status of a trigger worker.

use std::time::Duration;

use serde::Serialize;

use areaflow_domain::applet::Side;
use areaflow_domain::id::AppletId;

use crate::capability::BoundCapability;

/// Message sent to a running worker. Each is handled at one point of the
/// loop, between two cycles.
#[derive(Debug)]
pub enum Control {
    /// Resume (`true`) or pause (`false`) action/reaction execution.
    SetArmed(bool),
    /// Swap the capability bound to one side and reset that side's store.
    Reconfigure(Side, BoundCapability),
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerState {
    /// Constructed, loop not launched yet.
    Idle,
    Running,
    /// Terminal. A new worker must be built to run again.
    Stopped,
}

/// Snapshot published by a worker on every state or armed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerInfo {
    pub applet_id: AppletId,
    pub state: TriggerState,
    pub armed: bool,
}

/// Timing knobs shared by every worker of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerTiming {
    /// Window over which an action's rate limit is spread.
    pub poll_window: Duration,
    /// Minimum wait after a failed action call.
    pub error_backoff: Duration,
}

impl Default for TriggerTiming {
    fn default() -> Self {
        Self {
            poll_window: Duration::from_secs(30),
            error_backoff: Duration::from_secs(1),
        }
    }
}
