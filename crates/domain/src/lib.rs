//! # areaflow-domain
//!
//! Pure domain model for the areaflow automation server.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Applets** (one action bound to one reaction) and their
//!   **area bindings** (`service:name` + settings)
//! - Define the per-worker **Store** and its key namespaces
//! - Define the **execution result** envelope returned by capabilities
//! - Define **webhook** records (modes, history items, delivery errors)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod applet;
pub mod authorization;
pub mod execution;
pub mod store;
pub mod webhook;
