//! Blocking layout, paint and event cycle

use std::thread;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use super::events::{Event, EventQueue};
use super::layout::{LayoutEngine, LayoutTree};
use super::paint::{Frame, Painter};
use crate::config::RunConfig;
use crate::dom::{Document, NodeId};
use crate::style::StyleEngine;

/// What a finished `run` did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Cycles executed, each ending in a painted frame
    pub frames: u64,
    /// Events drained and dispatched
    pub events: u64,
    /// Node path under the most recent click
    pub last_hit: Option<Vec<NodeId>>,
    /// Whether a `Stop` event ended the loop
    pub stopped: bool,
}

/// Render state that survives between runs of one instance
pub struct RunLoop {
    config: RunConfig,
    layout: LayoutEngine,
    painter: Painter,
    layout_root: Option<LayoutTree>,
    frame: Option<Frame>,
}

impl RunLoop {
    /// A viewport beyond `max_viewport` is clamped to it
    pub fn new(mut config: RunConfig) -> Self {
        let max = config.max_viewport;
        if config.viewport_width > max || config.viewport_height > max {
            warn!(
                "clamping viewport {}x{} to {}",
                config.viewport_width, config.viewport_height, max
            );
            config.viewport_width = config.viewport_width.min(max);
            config.viewport_height = config.viewport_height.min(max);
        }
        let layout = LayoutEngine::new(config.viewport_width, config.viewport_height);
        let painter = Painter::new(config.viewport_width, config.viewport_height);
        Self {
            config,
            layout,
            painter,
            layout_root: None,
            frame: None,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Last painted frame
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Current layout tree
    pub fn layout(&self) -> Option<&LayoutTree> {
        self.layout_root.as_ref()
    }

    /// Drive cycles until a stop event, idleness or the frame cap
    ///
    /// `dirty` forces a restyle on the first cycle; a missing layout
    /// always does.
    pub fn run(
        &mut self,
        document: &Document,
        styles: &StyleEngine,
        queue: &EventQueue,
        dirty: bool,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut dirty = dirty || self.layout_root.is_none();

        loop {
            if let Some(max) = self.config.max_frames {
                if summary.frames >= max {
                    debug!("run loop hit frame cap of {}", max);
                    break;
                }
            }

            if dirty {
                self.relayout(document, styles);
                dirty = false;
            }
            if let Some(root) = &self.layout_root {
                match self.painter.paint(root) {
                    Some(frame) => self.frame = Some(frame),
                    None => warn!("viewport {:?} too large to paint", self.layout.viewport()),
                }
            }
            summary.frames += 1;

            for event in queue.drain() {
                summary.events += 1;
                trace!("dispatching {:?}", event);
                match event {
                    Event::Click { x, y } => {
                        let path = self
                            .layout_root
                            .as_ref()
                            .map(|root| root.hit_test(x, y))
                            .unwrap_or_default();
                        debug!("click at ({}, {}) hit {:?}", x, y, path);
                        summary.last_hit = Some(path);
                    }
                    Event::Resize { width, height }
                        if width > self.config.max_viewport
                            || height > self.config.max_viewport =>
                    {
                        warn!(
                            "ignoring resize to {}x{}, limit is {}",
                            width, height, self.config.max_viewport
                        );
                    }
                    Event::Resize { width, height } => {
                        self.set_viewport(width, height);
                        dirty = true;
                    }
                    Event::Stop => summary.stopped = true,
                }
            }

            if summary.stopped {
                break;
            }
            if self.config.exit_when_idle && !dirty && queue.is_empty() {
                break;
            }
            if !self.config.frame_interval.is_zero() {
                thread::sleep(self.config.frame_interval);
            }
        }

        debug!(
            "run loop finished after {} frames, {} events",
            summary.frames, summary.events
        );
        summary
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self.layout.set_viewport(width, height);
        self.painter.set_viewport(width, height);
    }

    fn relayout(&mut self, document: &Document, styles: &StyleEngine) {
        let styled = styles.style_tree(document);
        self.layout_root = Some(self.layout.compute(&styled));
    }
}
