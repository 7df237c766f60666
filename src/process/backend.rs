//! Execution backends for one engine instance

use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::dom::{NodeId, NodeInfo};
use crate::engine::Engine;
use crate::render::{Event, EventQueue, RunSummary};
use crate::style::ComputedStyle;
use crate::utils::Result;

/// Where an instance executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// In the caller's process and thread
    Inline,
    /// In a separate `quill-worker` process
    Worker,
}

impl Mode {
    pub fn from_same_process(use_same_process: bool) -> Self {
        if use_same_process {
            Mode::Inline
        } else {
            Mode::Worker
        }
    }
}

/// Operations on one engine instance, wherever it runs
#[cfg_attr(test, mockall::automock)]
pub trait EngineBackend {
    fn mode(&self) -> Mode;

    fn add_stylesheet(&mut self, css: String) -> Result<()>;

    fn create_node(&mut self, id: NodeId, text: Option<String>) -> Result<NodeId>;

    fn set_parent(&mut self, parent: NodeId, child: NodeId) -> Result<()>;

    fn set_attribute(&mut self, id: NodeId, key: String, value: String) -> Result<()>;

    fn root_id(&mut self) -> Result<NodeId>;

    fn node_info(&mut self, id: NodeId) -> Result<Option<NodeInfo>>;

    fn computed_style(&mut self, id: NodeId) -> Result<Option<ComputedStyle>>;

    fn post_event(&mut self, event: Event) -> Result<()>;

    /// Block until the run loop terminates
    fn run(&mut self) -> Result<RunSummary>;

    /// Release everything the backend holds; later calls fail
    fn shutdown(&mut self) -> Result<()>;

    /// Queue that other threads may post into while `run` blocks
    fn event_queue(&self) -> Option<EventQueue> {
        None
    }

    /// Worker process id, if any
    fn worker_pid(&self) -> Option<u32> {
        None
    }
}

/// Runs the engine synchronously on the caller's thread
pub struct InlineBackend {
    engine: Engine,
}

impl InlineBackend {
    pub fn new(config: RunConfig) -> Self {
        Self {
            engine: Engine::new(config),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl EngineBackend for InlineBackend {
    fn mode(&self) -> Mode {
        Mode::Inline
    }

    fn add_stylesheet(&mut self, css: String) -> Result<()> {
        self.engine.add_stylesheet(&css);
        Ok(())
    }

    fn create_node(&mut self, id: NodeId, text: Option<String>) -> Result<NodeId> {
        Ok(self.engine.create_node(id, text)?)
    }

    fn set_parent(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        Ok(self.engine.set_parent(parent, child)?)
    }

    fn set_attribute(&mut self, id: NodeId, key: String, value: String) -> Result<()> {
        Ok(self.engine.set_attribute(id, &key, &value)?)
    }

    fn root_id(&mut self) -> Result<NodeId> {
        Ok(self.engine.root_id())
    }

    fn node_info(&mut self, id: NodeId) -> Result<Option<NodeInfo>> {
        Ok(self.engine.node_info(id))
    }

    fn computed_style(&mut self, id: NodeId) -> Result<Option<ComputedStyle>> {
        Ok(self.engine.computed_style(id))
    }

    fn post_event(&mut self, event: Event) -> Result<()> {
        self.engine.post_event(event);
        Ok(())
    }

    fn run(&mut self) -> Result<RunSummary> {
        Ok(self.engine.run())
    }

    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }

    fn event_queue(&self) -> Option<EventQueue> {
        Some(self.engine.events())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{QuillError, TreeError};

    #[test]
    fn test_inline_backend_maps_tree_errors() {
        let mut backend = InlineBackend::new(RunConfig::default());
        assert_eq!(backend.mode(), Mode::Inline);
        assert_eq!(backend.create_node(NodeId::new(1), None).unwrap(), NodeId::new(1));

        let err = backend.create_node(NodeId::new(0), None).unwrap_err();
        assert!(matches!(err, QuillError::Tree(TreeError::ZeroId)));

        let err = backend.set_parent(NodeId::new(1), NodeId::ROOT).unwrap_err();
        assert!(matches!(err, QuillError::Tree(TreeError::RootHasNoParent)));
    }

    #[test]
    fn test_inline_event_queue_reaches_engine() {
        let mut backend = InlineBackend::new(RunConfig {
            frame_interval: std::time::Duration::ZERO,
            ..RunConfig::default()
        });
        let queue = backend.event_queue().unwrap();
        queue.push(Event::click(3.0, 3.0));

        let summary = backend.run().unwrap();
        assert_eq!(summary.events, 1);
        assert_eq!(summary.last_hit, Some(vec![NodeId::ROOT]));
    }

    #[test]
    fn test_mode_from_flag() {
        assert_eq!(Mode::from_same_process(true), Mode::Inline);
        assert_eq!(Mode::from_same_process(false), Mode::Worker);
    }
}
