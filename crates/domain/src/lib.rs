//! Shared data model, error taxonomy, permission calculus, and id/config
//! conventions used by every other `ecto-*` crate. Kept free of any I/O or
//! framework dependency (no axum, no sqlx executors, no tokio) so it can be
//! unit tested in isolation and reused by both the HTTP/WS gateway and the
//! voice coordinator.

pub mod config;
pub mod entities;
pub mod error;
pub mod ids;
pub mod permissions;
pub mod trace;

pub use error::{EctoError, Result};
