//! Proxy backend forwarding every call to a worker process

use std::path::PathBuf;
use std::time::Duration;

use log::{info, warn};

use super::backend::{EngineBackend, Mode};
use super::channel::WorkerChannel;
use super::protocol::{Reply, Request};
use crate::config::{Config, WORKER_PATH_ENV};
use crate::dom::{NodeId, NodeInfo};
use crate::registry::Handle;
use crate::render::{Event, RunSummary};
use crate::style::ComputedStyle;
use crate::utils::{ProcessError, QuillError, Result};

/// File name of the worker executable
pub const WORKER_BINARY: &str = "quill-worker";

/// Lifecycle of a worker-backed instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Ready,
    Faulted,
    Destroyed,
}

/// Forwards each operation as one request frame; keeps no engine state
pub struct WorkerBackend {
    channel: Option<WorkerChannel>,
    /// Handle of the mirrored instance inside the worker
    remote: Handle,
    state: WorkerState,
    request_timeout: Duration,
    run_timeout: Option<Duration>,
    shutdown_timeout: Duration,
}

impl WorkerBackend {
    /// Spawn a worker, handshake and create its instance
    pub fn spawn(config: &Config) -> Result<Self> {
        let path = resolve_worker_path(config)?;
        info!("starting worker {}", path.display());
        let channel = WorkerChannel::spawn(&path, config.handshake_timeout)?;

        let mut backend = Self {
            channel: Some(channel),
            remote: 0,
            state: WorkerState::Starting,
            request_timeout: config.request_timeout,
            run_timeout: config.run_timeout,
            shutdown_timeout: config.shutdown_timeout,
        };
        let init = Request::Init {
            run: config.run.clone(),
        };
        match backend.exchange(init, Some(config.handshake_timeout)) {
            Ok(Reply::Handle(remote)) if remote != 0 => {
                backend.remote = remote;
                backend.state = WorkerState::Ready;
                Ok(backend)
            }
            Ok(reply) => {
                let err = unexpected(&reply);
                backend.fault(&err);
                Err(err)
            }
            Err(err) => {
                backend.fault(&err);
                Err(err)
            }
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    fn call(&mut self, request: Request) -> Result<Reply> {
        let timeout = match request {
            Request::Run => self.run_timeout,
            _ => Some(self.request_timeout),
        };
        if self.state != WorkerState::Ready {
            return Err(ProcessError::Faulted.into());
        }
        self.exchange(request, timeout)
    }

    fn exchange(&mut self, request: Request, timeout: Option<Duration>) -> Result<Reply> {
        let channel = self.channel.as_mut().ok_or(ProcessError::Faulted)?;
        let result = channel.call(self.remote, request, timeout);
        if let Err(err) = &result {
            if err.is_fault() {
                self.fault(err);
            }
        }
        result
    }

    /// Kill and reap the worker; every later call fails
    fn fault(&mut self, err: &QuillError) {
        if let Some(mut channel) = self.channel.take() {
            warn!("worker {} faulted: {}", channel.pid(), err);
            channel.kill();
        }
        self.state = WorkerState::Faulted;
    }

    fn expect_unit(&mut self, request: Request) -> Result<()> {
        match self.call(request)? {
            Reply::Unit => Ok(()),
            other => Err(self.protocol_fault(&other)),
        }
    }

    fn protocol_fault(&mut self, reply: &Reply) -> QuillError {
        let err = unexpected(reply);
        self.fault(&err);
        err
    }
}

fn unexpected(reply: &Reply) -> QuillError {
    ProcessError::Protocol(format!("unexpected reply {:?}", reply)).into()
}

impl EngineBackend for WorkerBackend {
    fn mode(&self) -> Mode {
        Mode::Worker
    }

    fn add_stylesheet(&mut self, css: String) -> Result<()> {
        self.expect_unit(Request::AddStylesheet { css })
    }

    fn create_node(&mut self, id: NodeId, text: Option<String>) -> Result<NodeId> {
        match self.call(Request::CreateNode { id, text })? {
            Reply::Node(id) => Ok(id),
            other => Err(self.protocol_fault(&other)),
        }
    }

    fn set_parent(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.expect_unit(Request::SetParent { parent, child })
    }

    fn set_attribute(&mut self, id: NodeId, key: String, value: String) -> Result<()> {
        self.expect_unit(Request::SetAttribute { id, key, value })
    }

    fn root_id(&mut self) -> Result<NodeId> {
        match self.call(Request::RootId)? {
            Reply::Node(id) => Ok(id),
            other => Err(self.protocol_fault(&other)),
        }
    }

    fn node_info(&mut self, id: NodeId) -> Result<Option<NodeInfo>> {
        match self.call(Request::NodeInfo { id })? {
            Reply::NodeInfo(info) => Ok(info),
            other => Err(self.protocol_fault(&other)),
        }
    }

    fn computed_style(&mut self, id: NodeId) -> Result<Option<ComputedStyle>> {
        match self.call(Request::ComputedStyle { id })? {
            Reply::Style(style) => Ok(style),
            other => Err(self.protocol_fault(&other)),
        }
    }

    fn post_event(&mut self, event: Event) -> Result<()> {
        self.expect_unit(Request::PostEvent { event })
    }

    fn run(&mut self) -> Result<RunSummary> {
        match self.call(Request::Run)? {
            Reply::Run(summary) => Ok(summary),
            other => Err(self.protocol_fault(&other)),
        }
    }

    /// Ask the worker to exit, then reap it within the shutdown timeout
    fn shutdown(&mut self) -> Result<()> {
        let Some(mut channel) = self.channel.take() else {
            self.state = WorkerState::Destroyed;
            return Ok(());
        };
        let result = if self.state == WorkerState::Ready {
            channel
                .call(self.remote, Request::Shutdown, Some(self.shutdown_timeout))
                .map(|_| ())
        } else {
            Ok(())
        };
        channel.close(self.shutdown_timeout);
        self.state = WorkerState::Destroyed;
        result
    }

    fn worker_pid(&self) -> Option<u32> {
        self.channel.as_ref().map(WorkerChannel::pid)
    }
}

impl Drop for WorkerBackend {
    fn drop(&mut self) {
        if self.channel.is_some() {
            let _ = self.shutdown();
        }
    }
}

/// Locate the worker binary
///
/// Order: `Config::worker_path`, `QUILL_WORKER_PATH`, then `quill-worker`
/// beside the current executable or one directory up (test binaries live
/// in `deps/`).
pub fn resolve_worker_path(config: &Config) -> std::result::Result<PathBuf, ProcessError> {
    if let Some(path) = &config.worker_path {
        return Ok(path.clone());
    }
    if let Some(path) = std::env::var_os(WORKER_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }

    let exe = std::env::current_exe().map_err(|_| ProcessError::WorkerNotFound)?;
    let name = format!("{}{}", WORKER_BINARY, std::env::consts::EXE_SUFFIX);
    exe.ancestors()
        .skip(1)
        .take(2)
        .map(|dir| dir.join(&name))
        .find(|candidate| candidate.is_file())
        .ok_or(ProcessError::WorkerNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_path_wins() {
        let config = Config::default().with_worker_path("/opt/quill/bin/quill-worker");
        assert_eq!(
            resolve_worker_path(&config).unwrap(),
            PathBuf::from("/opt/quill/bin/quill-worker")
        );
    }

    #[test]
    fn test_missing_binary_fails_spawn() {
        let config = Config::default().with_worker_path("/nonexistent/quill-worker");
        let err = WorkerBackend::spawn(&config).err().unwrap();
        assert!(matches!(
            err,
            QuillError::Process(ProcessError::Spawn(_))
        ));
    }
}
