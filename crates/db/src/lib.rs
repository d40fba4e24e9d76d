//! Persistence layer: connection pooling across the Postgres/SQLite backends,
//! the permission-context query helpers, and one repo module per aggregate.
//!
//! Every query goes through [`sqlx::Any`] rather than a backend-specific
//! pool, so the same binary serves both a managed Postgres deployment and a
//! self-hosted SQLite file with no code branch beyond [`pool::connect`]'s own
//! dispatch.

pub mod permissions;
pub mod pool;
pub mod repo;
