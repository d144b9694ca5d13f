//! Trigger scheduling — one long-lived worker per applet and the registry
//! that owns them.

pub mod control;
pub mod registry;
pub mod worker;

pub use control::{Control, TriggerInfo, TriggerState, TriggerTiming};
pub use registry::TriggerRegistry;
pub use worker::TriggerWorker;
