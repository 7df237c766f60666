//! Shared utilities and error types

pub mod error;

pub use error::{ProcessError, QuillError, RemoteError, Result, TreeError};
