//! Layout, paint and the run loop

pub mod events;
pub mod layout;
pub mod paint;
pub mod run_loop;

pub use events::{Event, EventQueue};
pub use layout::{DisplayType, LayoutBox, LayoutEngine, LayoutTree};
pub use paint::{Frame, Painter};
pub use run_loop::{RunLoop, RunSummary};
