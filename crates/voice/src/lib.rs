//! SFU control plane: router/transport/producer/consumer lifecycle and the
//! worker pool that hosts routers, wired into the session protocol's
//! `voice.*` messages by `ecto-gateway`.
//!
//! The media-plane engine itself (RTP/DTLS) is an external collaborator —
//! this crate models only the control-plane bookkeeping, dispatching
//! commands to it over [`worker_channel::WorkerRouter`].

pub mod coordinator;
pub mod router;
pub mod worker;
pub mod worker_channel;

pub use coordinator::{JoinResult, NewConsumerInfo, VoiceCoordinator};
pub use router::{Consumer, MediaKind, Producer, RemovedMember, RouterRegistry, Transport, TransportDirection};
pub use worker::{MediaWorker, WorkerId, WorkerPool};
pub use worker_channel::{WorkerCommand, WorkerReply, WorkerRouter};
