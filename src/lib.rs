//! # Quill - embeddable document engine
//!
//! Quill keeps a tree of content nodes, applies CSS stylesheets to them and
//! drives a layout/paint/event loop. Instances are addressed by opaque
//! handles and run either inline or in an isolated worker process.
//!
//! ## Architecture
//!
//! - **registry**: generation-tagged handles mapping to live instances
//! - **dom**: node arena with caller-assigned ids
//! - **style**: stylesheet parsing, selector matching and cascade
//! - **render**: layout, software paint, events and the run loop
//! - **engine**: one instance's state tying the above together
//! - **process**: inline and worker backends, wire protocol, worker loop
//! - **api**: sentinel-returning free functions over a global registry
//! - **config**, **utils**: configuration and error types

pub mod api;
pub mod config;
pub mod dom;
pub mod engine;
pub mod process;
pub mod registry;
pub mod render;
pub mod style;
pub mod utils;

// Re-export main types for convenience
pub use config::{Config, RunConfig};
pub use dom::{NodeId, NodeInfo};
pub use engine::Engine;
pub use process::{EngineBackend, Mode};
pub use registry::{Handle, Registry};
pub use render::{Event, EventQueue, RunSummary};
pub use style::ComputedStyle;
pub use utils::error::{ProcessError, QuillError, Result, TreeError};

/// Engine version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "Quill";
