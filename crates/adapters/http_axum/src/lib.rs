//! # areaflow-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a **REST-ish JSON API** for applets (`/api/applets`), their
//!   triggers (`/api/triggers`) and inbound webhooks (`/api/webhooks`)
//! - Map HTTP requests into application service and registry calls (driving adapter)
//! - Map application results and [`AreaFlowError`](areaflow_domain::error::AreaFlowError)s
//!   into HTTP responses; unknown ids are client errors, never server errors
//!
//! ## Dependency rule
//! Depends on `areaflow-app` (for port traits, services and the registry) and
//! `areaflow-domain` (for domain types used in request/response mapping).
//! Never leaks axum types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
