//! Pipe channel to a spawned worker process
//!
//! A reader thread forwards every stdout line into an `mpsc` channel so
//! the host can wait for a response with a deadline. The channel closes
//! when the worker's stdout does.

use std::io::{BufRead, BufReader, BufWriter};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};

use super::protocol::{
    Hello, Reply, Request, RequestFrame, ResponseFrame, decode_frame, write_frame,
};
use crate::registry::Handle;
use crate::utils::{ProcessError, QuillError, Result};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Request/response channel over a worker's stdio
pub struct WorkerChannel {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    lines: Receiver<String>,
    reader: Option<JoinHandle<()>>,
    next_seq: u64,
    pid: u32,
    reaped: bool,
}

impl WorkerChannel {
    /// Spawn the worker and complete the handshake
    pub fn spawn(path: &Path, handshake_timeout: Duration) -> Result<Self> {
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(ProcessError::Spawn)?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessError::Handshake("worker stdio not captured".into()).into());
            }
        };

        let pid = child.id();
        let (tx, lines) = mpsc::channel();
        let reader = thread::Builder::new()
            .name(format!("quill-worker-{}", pid))
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                trace!("worker {} stdout closed", pid);
            })
            .map_err(ProcessError::Spawn);

        let reader = match reader {
            Ok(reader) => reader,
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err.into());
            }
        };

        let mut channel = Self {
            child,
            stdin: Some(BufWriter::new(stdin)),
            lines,
            reader: Some(reader),
            next_seq: 1,
            pid,
            reaped: false,
        };

        if let Err(err) = channel.handshake(handshake_timeout) {
            channel.kill();
            return Err(err);
        }
        info!("worker {} ready", pid);
        Ok(channel)
    }

    fn handshake(&mut self, timeout: Duration) -> Result<()> {
        let line = self.recv_line(Some(timeout)).map_err(|err| match err {
            QuillError::Process(ProcessError::Disconnected) => {
                ProcessError::Handshake("worker exited before greeting".into()).into()
            }
            other => other,
        })?;
        let hello: Hello = decode_frame(&line)
            .map_err(|e| ProcessError::Handshake(format!("bad greeting: {}", e)))?;
        hello.check()?;
        debug!("handshake with worker pid {}", hello.pid);
        Ok(())
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Send one request and wait for its response
    ///
    /// `timeout` of `None` waits until the worker answers or goes away.
    pub fn call(
        &mut self,
        handle: Handle,
        request: Request,
        timeout: Option<Duration>,
    ) -> Result<Reply> {
        if let Ok(Some(status)) = self.child.try_wait() {
            self.reaped = true;
            warn!("worker {} already exited: {}", self.pid, status);
            return Err(ProcessError::Disconnected.into());
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let name = request.name();
        let frame = RequestFrame {
            seq,
            handle,
            request,
        };

        let stdin = self.stdin.as_mut().ok_or(ProcessError::Disconnected)?;
        write_frame(stdin, &frame).map_err(|e| {
            debug!("write to worker {} failed: {}", self.pid, e);
            ProcessError::Disconnected
        })?;
        trace!("sent {} #{} to worker {}", name, seq, self.pid);

        let line = self.recv_line(timeout)?;
        let response: ResponseFrame = decode_frame(&line)?;
        if response.seq != seq {
            return Err(ProcessError::Protocol(format!(
                "expected response #{}, got #{}",
                seq, response.seq
            ))
            .into());
        }
        response
            .outcome
            .map_err(|err| QuillError::from_remote(err, handle))
    }

    fn recv_line(&self, timeout: Option<Duration>) -> Result<String> {
        match timeout {
            Some(timeout) => self.lines.recv_timeout(timeout).map_err(|err| match err {
                RecvTimeoutError::Timeout => ProcessError::Timeout(timeout).into(),
                RecvTimeoutError::Disconnected => ProcessError::Disconnected.into(),
            }),
            None => self
                .lines
                .recv()
                .map_err(|_| ProcessError::Disconnected.into()),
        }
    }

    /// Close stdin and give the worker `timeout` to exit, then kill it
    pub fn close(mut self, timeout: Duration) {
        self.stdin.take();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!("worker {} exited: {}", self.pid, status);
                    self.reaped = true;
                    break;
                }
                Ok(None) => thread::sleep(EXIT_POLL_INTERVAL),
                Err(_) => break,
            }
        }
        if !self.reaped {
            warn!("worker {} did not exit in {:?}, killing", self.pid, timeout);
        }
        self.kill();
    }

    /// Kill and reap the worker; idempotent
    pub fn kill(&mut self) {
        self.stdin.take();
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
            self.reaped = true;
        }
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

impl Drop for WorkerChannel {
    fn drop(&mut self) {
        self.kill();
    }
}
