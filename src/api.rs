//! Embedding surface over a process-wide registry
//!
//! These are the functions a C trampoline layer forwards to. None of them
//! report errors directly: ids and handles use 0 as the failure sentinel,
//! statuses use -1, and the remaining calls fail silently. The registry is
//! configured from the environment on first use (see `Config::from_env`).

use std::sync::LazyLock;

use crate::config::Config;
use crate::registry::{Handle, Registry};

static REGISTRY: LazyLock<Registry> = LazyLock::new(|| Registry::new(Config::from_env()));

/// The registry behind the free functions, for the `try_*` forms
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Create an engine instance; returns 0 on failure
pub fn init(use_same_process: bool) -> Handle {
    REGISTRY.init(use_same_process)
}

pub fn add_stylesheet(handle: Handle, css: &str) {
    REGISTRY.add_stylesheet(handle, css)
}

/// Returns `node_id`, or 0 if the id is 0, taken, or the handle is invalid
pub fn create_node(handle: Handle, node_id: u64, text: Option<&str>) -> u64 {
    REGISTRY.create_node(handle, node_id, text)
}

pub fn set_parent(handle: Handle, parent_id: u64, child_id: u64) {
    REGISTRY.set_parent(handle, parent_id, child_id)
}

pub fn set_attribute(handle: Handle, node_id: u64, key: &str, value: &str) {
    REGISTRY.set_attribute(handle, node_id, key, value)
}

/// 0 for a valid handle; also 0 for an invalid one
pub fn root_id(handle: Handle) -> u64 {
    REGISTRY.root_id(handle)
}

/// Blocks until the run loop terminates; 0 on success, -1 on failure
pub fn run(handle: Handle) -> i32 {
    REGISTRY.run(handle)
}

/// 0 when released, -1 if the handle was already invalid
pub fn destroy(handle: Handle) -> i32 {
    REGISTRY.destroy(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeId;

    #[test]
    fn test_inline_session() {
        let h = init(true);
        assert_ne!(h, 0);
        add_stylesheet(h, ".blue-bg { background-color: blue; }");
        assert_eq!(create_node(h, 1, Some("Hello")), 1);
        set_parent(h, root_id(h), 1);
        set_attribute(h, 1, "class", "blue-bg");

        let info = registry().try_node_info(h, NodeId::new(1)).unwrap().unwrap();
        assert_eq!(info.parent, Some(NodeId::ROOT));
        assert_eq!(run(h), 0);
        assert_eq!(destroy(h), 0);
        assert_eq!(destroy(h), -1);
    }
}
