//! # areaflow-app
//!
//! Application layer — use-cases, the trigger scheduler and **port
//! definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `AppletRepository` — applet persistence, `active`/`status` write-back
//!   - `AuthorizationRepository` — read stored credentials
//!   - `AppletLogFactory` / `AppletLog` — per-applet audit log
//! - Define the **capability contract** (`Capability`, `CapabilityCatalog`)
//!   through which actions and reactions are invoked
//! - Provide **in-process infrastructure** that doesn't need IO:
//!   - `WebhookBroker` — hands pushed payloads to the waiting worker
//!   - `TriggerRegistry` — owns one `TriggerWorker` per applet
//! - Define **driving/inbound** use-cases (`AppletService`)
//!
//! ## Dependency rule
//! Depends on `areaflow-domain` only (plus `tokio` for tasks and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod capability;
pub mod ports;
pub mod services;
pub mod trigger;
pub mod webhook_broker;

#[cfg(test)]
mod testing;

/// Lock a std mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
