//! Input events consumed by the run loop
//!
//! Events are queued from the host side and drained once per cycle.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Events the run loop understands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Pointer click in viewport coordinates
    Click { x: f32, y: f32 },
    /// Viewport size change
    Resize { width: u32, height: u32 },
    /// Ends the current `run`
    Stop,
}

impl Event {
    /// Create a click event
    pub fn click(x: f32, y: f32) -> Self {
        Self::Click { x, y }
    }

    /// Create a resize event
    pub fn resize(width: u32, height: u32) -> Self {
        Self::Resize { width, height }
    }
}

/// Thread-safe event queue
///
/// Clones share the same underlying queue, so a clone handed to another
/// thread can post events into a loop that is already running.
pub struct EventQueue {
    events: Arc<Mutex<VecDeque<Event>>>,
}

impl EventQueue {
    /// Create a new event queue
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Push an event to the queue
    pub fn push(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push_back(event);
        }
    }

    /// Pop all events from the queue, oldest first
    pub fn drain(&self) -> Vec<Event> {
        if let Ok(mut events) = self.events.lock() {
            events.drain(..).collect()
        } else {
            Vec::new()
        }
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.events.lock().map(|e| e.is_empty()).unwrap_or(true)
    }

    /// Get queue length
    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventQueue {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
        }
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_queue() {
        let queue = EventQueue::new();
        assert!(queue.is_empty());

        queue.push(Event::click(0.0, 0.0));
        queue.push(Event::resize(10, 10));

        assert_eq!(queue.len(), 2);

        let events = queue.drain();
        assert_eq!(events, vec![Event::click(0.0, 0.0), Event::resize(10, 10)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clones_share_queue() {
        let queue = EventQueue::new();
        let remote = queue.clone();

        std::thread::spawn(move || remote.push(Event::Stop))
            .join()
            .unwrap();

        assert_eq!(queue.drain(), vec![Event::Stop]);
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_string(&Event::click(1.0, 2.0)).unwrap();
        assert_eq!(json, r#"{"Click":{"x":1.0,"y":2.0}}"#);
    }
}
