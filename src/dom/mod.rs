//! Document tree: nodes, edges, text and attributes

mod document;
mod node;

pub use document::Document;
pub use node::{Attributes, Node, NodeId, NodeInfo};
