//! One engine instance's local state
//!
//! The `Engine` ties the pipeline together:
//! 1. Build the document tree from caller-assigned node ids
//! 2. Parse stylesheets and resolve the cascade
//! 3. Lay out and paint in the run loop, dispatching queued events

use log::debug;

use crate::config::RunConfig;
use crate::dom::{Document, NodeId, NodeInfo};
use crate::render::{Event, EventQueue, Frame, LayoutTree, RunLoop, RunSummary};
use crate::style::{ComputedStyle, StyleEngine};
use crate::utils::TreeError;

/// Tree, stylesheets and render state of a single instance
pub struct Engine {
    document: Document,
    styles: StyleEngine,
    events: EventQueue,
    run_loop: RunLoop,
    /// Set by any mutation; cleared by the next layout
    dirty: bool,
}

impl Engine {
    pub fn new(config: RunConfig) -> Self {
        Self {
            document: Document::new(),
            styles: StyleEngine::new(),
            events: EventQueue::new(),
            run_loop: RunLoop::new(config),
            dirty: true,
        }
    }

    /// Parse and append a stylesheet; returns the number of rules kept
    pub fn add_stylesheet(&mut self, css: &str) -> usize {
        let sheet = self.styles.add_stylesheet(css);
        if sheet.skipped > 0 {
            debug!("stylesheet: kept {} rules, skipped {}", sheet.rules.len(), sheet.skipped);
        }
        let kept = sheet.rules.len();
        self.dirty = true;
        kept
    }

    pub fn create_node(&mut self, id: NodeId, text: Option<String>) -> Result<NodeId, TreeError> {
        let id = self.document.create_node(id, text)?;
        self.dirty = true;
        Ok(id)
    }

    pub fn set_parent(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.document.set_parent(parent, child)?;
        self.dirty = true;
        Ok(())
    }

    pub fn set_attribute(&mut self, id: NodeId, key: &str, value: &str) -> Result<(), TreeError> {
        self.document.set_attribute(id, key, value)?;
        self.dirty = true;
        Ok(())
    }

    pub fn root_id(&self) -> NodeId {
        self.document.root_id()
    }

    pub fn node_info(&self, id: NodeId) -> Option<NodeInfo> {
        self.document.get(id).map(|node| node.info())
    }

    pub fn computed_style(&self, id: NodeId) -> Option<ComputedStyle> {
        self.styles.computed_style_for(&self.document, id)
    }

    pub fn post_event(&self, event: Event) {
        self.events.push(event);
    }

    /// Shared handle onto this instance's event queue
    pub fn events(&self) -> EventQueue {
        self.events.clone()
    }

    /// Block until the run loop terminates
    pub fn run(&mut self) -> RunSummary {
        let summary = self
            .run_loop
            .run(&self.document, &self.styles, &self.events, self.dirty);
        self.dirty = false;
        summary
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Last frame painted by `run`
    pub fn frame(&self) -> Option<&Frame> {
        self.run_loop.frame()
    }

    pub fn layout(&self) -> Option<&LayoutTree> {
        self.run_loop.layout()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(RunConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{Color, Value};
    use std::time::Duration;

    fn engine() -> Engine {
        Engine::new(RunConfig {
            frame_interval: Duration::ZERO,
            ..RunConfig::default()
        })
    }

    #[test]
    fn test_blue_background_end_to_end() {
        let mut engine = engine();
        assert_eq!(engine.add_stylesheet(".blue-bg { background-color: blue; }"), 1);

        let id = NodeId::new(1);
        assert_eq!(engine.create_node(id, Some("Hello".into())), Ok(id));
        engine.set_parent(engine.root_id(), id).unwrap();
        engine.set_attribute(id, "class", "blue-bg").unwrap();

        let summary = engine.run();
        assert_eq!(summary.frames, 1);
        assert_eq!(
            engine.computed_style(id).unwrap().get("background-color"),
            Some(&Value::Color(Color::rgb(0, 0, 255)))
        );
        assert_eq!(engine.frame().unwrap().get_pixel(2, 2), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_failed_mutation_keeps_state() {
        let mut engine = engine();
        engine.create_node(NodeId::new(1), Some("a".into())).unwrap();
        assert_eq!(
            engine.create_node(NodeId::new(1), Some("b".into())),
            Err(TreeError::DuplicateId(NodeId::new(1)))
        );
        assert_eq!(engine.node_info(NodeId::new(1)).unwrap().text.as_deref(), Some("a"));
    }

    #[test]
    fn test_rerun_picks_up_mutations() {
        let mut engine = engine();
        engine.create_node(NodeId::new(1), None).unwrap();
        engine.set_parent(NodeId::ROOT, NodeId::new(1)).unwrap();
        engine.run();
        assert_eq!(engine.frame().unwrap().get_pixel(0, 0), Some([0, 0, 0, 0]));

        engine.add_stylesheet("* { background: red }");
        engine.run();
        assert_eq!(engine.frame().unwrap().get_pixel(0, 0), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_events_handle_shares_queue() {
        let mut engine = engine();
        engine.events().push(Event::click(1.0, 1.0));
        let summary = engine.run();
        assert_eq!(summary.last_hit, Some(vec![NodeId::ROOT]));
    }
}
