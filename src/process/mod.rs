//! Process isolation for engine instances
//!
//! An instance runs either inline or inside a `quill-worker` child:
//! - `backend`: the `EngineBackend` capability and the inline implementation
//! - `worker_backend`: proxy that forwards calls over the wire protocol
//! - `channel`: stdio pipes, handshake and response deadlines
//! - `worker`: the serve loop run by the worker binary

mod backend;
mod channel;
pub mod protocol;
mod worker;
mod worker_backend;

pub use backend::{EngineBackend, InlineBackend, Mode};
pub use channel::WorkerChannel;
pub use worker::serve;
pub use worker_backend::{WORKER_BINARY, WorkerBackend, WorkerState, resolve_worker_path};

#[cfg(test)]
pub use backend::MockEngineBackend;
