//! Error types for the Quill engine

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dom::NodeId;
use crate::registry::Handle;

/// Main error type for engine operations
#[derive(Debug, Error)]
pub enum QuillError {
    /// Unknown, destroyed or faulted handle
    #[error("invalid engine handle {0:#x}")]
    InvalidHandle(Handle),
    /// Document tree errors
    #[error(transparent)]
    Tree(#[from] TreeError),
    /// Worker process errors
    #[error(transparent)]
    Process(#[from] ProcessError),
    /// The run loop is already active on this instance
    #[error("run loop already active")]
    AlreadyRunning,
    /// No free instance slot left
    #[error("instance limit of {0} reached")]
    Exhausted(usize),
    /// An instance lock was poisoned by a panic
    #[error("engine instance state poisoned")]
    Poisoned,
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Document tree errors: identity and structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TreeError {
    /// Node id 0 is reserved for the root
    #[error("node id 0 is reserved for the root")]
    ZeroId,
    /// Node id already present in this instance
    #[error("node {0} already exists")]
    DuplicateId(NodeId),
    /// Node id not present in this instance
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    /// The root cannot be given a parent
    #[error("the root node cannot have a parent")]
    RootHasNoParent,
    /// The edge would make a node its own ancestor
    #[error("attaching {child} under {parent} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
}

/// Worker process errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Spawning the worker failed
    #[error("failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),
    /// No worker binary could be located
    #[error("worker binary not found")]
    WorkerNotFound,
    /// Handshake frame missing or malformed
    #[error("worker handshake failed: {0}")]
    Handshake(String),
    /// Worker speaks another protocol version
    #[error("protocol version mismatch: expected {expected}, worker has {found}")]
    VersionMismatch { expected: u32, found: u32 },
    /// Worker closed its end of the channel
    #[error("worker disconnected")]
    Disconnected,
    /// Worker did not answer in time
    #[error("worker did not respond within {0:?}")]
    Timeout(Duration),
    /// Undecodable or out-of-sequence frame
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Instance was already faulted by an earlier failure
    #[error("worker is faulted")]
    Faulted,
}

/// Errors reported by the worker inside a response frame
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RemoteError {
    #[error("worker rejected handle")]
    InvalidHandle,
    #[error(transparent)]
    Tree(TreeError),
    #[error("run loop already active")]
    AlreadyRunning,
    #[error("worker error: {0}")]
    Other(String),
}

impl From<QuillError> for RemoteError {
    fn from(err: QuillError) -> Self {
        match err {
            QuillError::InvalidHandle(_) => Self::InvalidHandle,
            QuillError::Tree(e) => Self::Tree(e),
            QuillError::AlreadyRunning => Self::AlreadyRunning,
            other => Self::Other(other.to_string()),
        }
    }
}

impl QuillError {
    /// Rebuild a local error from a worker-side one
    pub fn from_remote(err: RemoteError, handle: Handle) -> Self {
        match err {
            RemoteError::InvalidHandle => Self::InvalidHandle(handle),
            RemoteError::Tree(e) => Self::Tree(e),
            RemoteError::AlreadyRunning => Self::AlreadyRunning,
            RemoteError::Other(msg) => Self::Process(ProcessError::Protocol(msg)),
        }
    }

    /// Whether this error means the worker can no longer be trusted
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Process(_) | Self::Io(_))
    }
}

/// Convenience Result type for engine operations
pub type Result<T> = std::result::Result<T, QuillError>;
