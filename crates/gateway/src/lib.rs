//! HTTP/WebSocket glue for the ecto server: auth, the RPC mutation pipeline,
//! the realtime protocol handler, file I/O, and the boot sequence.

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod mentions;
pub mod state;
pub mod upload;
pub mod ws;
