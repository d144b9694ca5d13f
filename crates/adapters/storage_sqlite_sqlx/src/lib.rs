//! # areaflow-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `areaflow-app::ports::storage`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows; area bindings are stored
//!   as JSON documents
//!
//! ## Dependency rule
//! Depends on `areaflow-app` (for port traits) and `areaflow-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod applet_repo;
mod authorization_repo;
mod error;
mod pool;

pub use applet_repo::SqliteAppletRepository;
pub use authorization_repo::SqliteAuthorizationRepository;
pub use error::StorageError;
pub use pool::{Config, Database, SqliteRepository};
