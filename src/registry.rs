//! Handle registry for live engine instances
//!
//! Handles pack a slot index and a generation:
//! `(generation << 32) | (slot_index + 1)`. Destroying an instance bumps
//! its slot's generation, so a stale handle never resolves to whatever
//! instance reuses the slot later. The registry lock only guards the slot
//! table; each instance has its own lock, held for the duration of a call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};

use crate::config::Config;
use crate::dom::{NodeId, NodeInfo};
use crate::process::{EngineBackend, InlineBackend, Mode, WorkerBackend};
use crate::render::{Event, EventQueue, RunSummary};
use crate::style::ComputedStyle;
use crate::utils::{QuillError, Result};

/// Opaque instance identifier; 0 is never a live handle
pub type Handle = u64;

/// Boxed backend as stored in the registry
pub type BoxedBackend = Box<dyn EngineBackend + Send>;

struct Instance {
    backend: Mutex<BoxedBackend>,
    running: AtomicBool,
}

#[derive(Default)]
struct Slot {
    generation: u32,
    instance: Option<Arc<Instance>>,
}

#[derive(Default)]
struct Slots {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
}

fn pack(generation: u32, index: usize) -> Handle {
    ((generation as u64) << 32) | (index as u64 + 1)
}

fn unpack(handle: Handle) -> Option<(u32, usize)> {
    let index = (handle & 0xffff_ffff) as usize;
    if index == 0 {
        return None;
    }
    Some(((handle >> 32) as u32, index - 1))
}

/// Clears the running flag when `run` returns or unwinds
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Table of live engine instances
pub struct Registry {
    config: Config,
    slots: Mutex<Slots>,
}

impl Registry {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            slots: Mutex::new(Slots::default()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of live instances
    pub fn len(&self) -> usize {
        self.lock_slots().map(|s| s.live).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_slots(&self) -> Result<MutexGuard<'_, Slots>> {
        self.slots.lock().map_err(|_| QuillError::Poisoned)
    }

    /// Create an instance in the given mode
    pub fn try_init(&self, mode: Mode) -> Result<Handle> {
        {
            let slots = self.lock_slots()?;
            if slots.live >= self.config.max_instances {
                return Err(QuillError::Exhausted(self.config.max_instances));
            }
        }
        let backend: BoxedBackend = match mode {
            Mode::Inline => Box::new(InlineBackend::new(self.config.run.clone())),
            Mode::Worker => Box::new(WorkerBackend::spawn(&self.config)?),
        };
        self.try_insert(backend)
    }

    /// Register an already constructed backend
    pub fn try_insert(&self, backend: BoxedBackend) -> Result<Handle> {
        let mut slots = self.lock_slots()?;
        if slots.live >= self.config.max_instances {
            return Err(QuillError::Exhausted(self.config.max_instances));
        }

        let index = match slots.free.pop() {
            Some(index) => index,
            None => {
                slots.slots.push(Slot::default());
                slots.slots.len() - 1
            }
        };
        let instance = Arc::new(Instance {
            backend: Mutex::new(backend),
            running: AtomicBool::new(false),
        });
        let slot = &mut slots.slots[index];
        slot.instance = Some(instance);
        let handle = pack(slot.generation, index);
        slots.live += 1;
        debug!("registered instance {:#x}", handle);
        Ok(handle)
    }

    fn resolve(&self, handle: Handle) -> Result<Arc<Instance>> {
        let (generation, index) = unpack(handle).ok_or(QuillError::InvalidHandle(handle))?;
        let slots = self.lock_slots()?;
        slots
            .slots
            .get(index)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.instance.clone())
            .ok_or(QuillError::InvalidHandle(handle))
    }

    /// Run `f` against the instance's backend under its own lock
    fn with_backend<T>(
        &self,
        handle: Handle,
        f: impl FnOnce(&mut dyn EngineBackend) -> Result<T>,
    ) -> Result<T> {
        let instance = self.resolve(handle)?;
        let mut backend = instance.backend.lock().map_err(|_| QuillError::Poisoned)?;
        f(backend.as_mut())
    }

    pub fn try_add_stylesheet(&self, handle: Handle, css: &str) -> Result<()> {
        self.with_backend(handle, |b| b.add_stylesheet(css.to_string()))
    }

    pub fn try_create_node(&self, handle: Handle, id: NodeId, text: Option<&str>) -> Result<NodeId> {
        self.with_backend(handle, |b| b.create_node(id, text.map(str::to_string)))
    }

    pub fn try_set_parent(&self, handle: Handle, parent: NodeId, child: NodeId) -> Result<()> {
        self.with_backend(handle, |b| b.set_parent(parent, child))
    }

    pub fn try_set_attribute(&self, handle: Handle, id: NodeId, key: &str, value: &str) -> Result<()> {
        self.with_backend(handle, |b| {
            b.set_attribute(id, key.to_string(), value.to_string())
        })
    }

    pub fn try_root_id(&self, handle: Handle) -> Result<NodeId> {
        self.with_backend(handle, |b| b.root_id())
    }

    pub fn try_node_info(&self, handle: Handle, id: NodeId) -> Result<Option<NodeInfo>> {
        self.with_backend(handle, |b| b.node_info(id))
    }

    pub fn try_computed_style(&self, handle: Handle, id: NodeId) -> Result<Option<ComputedStyle>> {
        self.with_backend(handle, |b| b.computed_style(id))
    }

    pub fn try_post_event(&self, handle: Handle, event: Event) -> Result<()> {
        self.with_backend(handle, |b| b.post_event(event))
    }

    /// Block until the instance's run loop terminates
    ///
    /// A second `run` on an instance whose loop is active fails with
    /// `AlreadyRunning` instead of queueing behind it.
    pub fn try_run(&self, handle: Handle) -> Result<RunSummary> {
        let instance = self.resolve(handle)?;
        if instance.running.swap(true, Ordering::AcqRel) {
            return Err(QuillError::AlreadyRunning);
        }
        let _guard = RunGuard(&instance.running);
        let mut backend = instance.backend.lock().map_err(|_| QuillError::Poisoned)?;
        backend.run()
    }

    /// Release the instance; the handle is invalid afterwards
    pub fn try_destroy(&self, handle: Handle) -> Result<()> {
        let instance = {
            let (generation, index) =
                unpack(handle).ok_or(QuillError::InvalidHandle(handle))?;
            let mut slots = self.lock_slots()?;
            let slot = slots
                .slots
                .get_mut(index)
                .filter(|slot| slot.generation == generation && slot.instance.is_some())
                .ok_or(QuillError::InvalidHandle(handle))?;
            let instance = slot.instance.take();
            slot.generation = slot.generation.wrapping_add(1);
            slots.free.push(index);
            slots.live -= 1;
            instance
        };

        if let Some(instance) = instance {
            let mut backend = instance.backend.lock().map_err(|_| QuillError::Poisoned)?;
            if let Err(err) = backend.shutdown() {
                warn!("instance {:#x} did not shut down cleanly: {}", handle, err);
            }
        }
        debug!("destroyed instance {:#x}", handle);
        Ok(())
    }

    /// Event queue of an inline instance, for posting from other threads
    pub fn event_queue(&self, handle: Handle) -> Option<EventQueue> {
        self.with_backend(handle, |b| Ok(b.event_queue())).ok().flatten()
    }

    /// Process id of a worker instance
    pub fn worker_pid(&self, handle: Handle) -> Option<u32> {
        self.with_backend(handle, |b| Ok(b.worker_pid())).ok().flatten()
    }

    pub fn mode(&self, handle: Handle) -> Option<Mode> {
        self.with_backend(handle, |b| Ok(b.mode())).ok()
    }

    // Sentinel-returning forms of the embedding surface. Every failure is
    // logged and folded into 0 (ids, handles) or -1 (status).

    /// New instance handle, or 0
    pub fn init(&self, use_same_process: bool) -> Handle {
        self.try_init(Mode::from_same_process(use_same_process))
            .unwrap_or_else(|err| {
                warn!("init failed: {}", err);
                0
            })
    }

    pub fn add_stylesheet(&self, handle: Handle, css: &str) {
        if let Err(err) = self.try_add_stylesheet(handle, css) {
            debug!("add_stylesheet on {:#x}: {}", handle, err);
        }
    }

    /// `node_id` on success, 0 otherwise
    pub fn create_node(&self, handle: Handle, node_id: u64, text: Option<&str>) -> u64 {
        match self.try_create_node(handle, NodeId::new(node_id), text) {
            Ok(id) => id.get(),
            Err(err) => {
                debug!("create_node {} on {:#x}: {}", node_id, handle, err);
                0
            }
        }
    }

    pub fn set_parent(&self, handle: Handle, parent_id: u64, child_id: u64) {
        let result = self.try_set_parent(handle, NodeId::new(parent_id), NodeId::new(child_id));
        if let Err(err) = result {
            debug!("set_parent on {:#x}: {}", handle, err);
        }
    }

    pub fn set_attribute(&self, handle: Handle, node_id: u64, key: &str, value: &str) {
        if let Err(err) = self.try_set_attribute(handle, NodeId::new(node_id), key, value) {
            debug!("set_attribute on {:#x}: {}", handle, err);
        }
    }

    /// Always 0: the root id for a live handle, the failure sentinel otherwise
    pub fn root_id(&self, handle: Handle) -> u64 {
        self.try_root_id(handle).map(NodeId::get).unwrap_or(0)
    }

    /// 0 on clean termination, -1 on any failure
    pub fn run(&self, handle: Handle) -> i32 {
        match self.try_run(handle) {
            Ok(_) => 0,
            Err(err) => {
                debug!("run on {:#x}: {}", handle, err);
                -1
            }
        }
    }

    /// 0 when the instance was released, -1 for an invalid handle
    pub fn destroy(&self, handle: Handle) -> i32 {
        match self.try_destroy(handle) {
            Ok(()) => 0,
            Err(err) => {
                debug!("destroy {:#x}: {}", handle, err);
                -1
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        let Ok(slots) = self.slots.get_mut() else {
            return;
        };
        for slot in &mut slots.slots {
            if let Some(instance) = slot.instance.take() {
                if let Ok(mut backend) = instance.backend.lock() {
                    let _ = backend.shutdown();
                }
            }
        }
    }
}
