//! Engine configuration
//!
//! Defaults suit headless embedding. `Config::from_env` layers the
//! `QUILL_*` environment variables on top of them.

use std::path::PathBuf;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

/// Environment variable naming the worker binary
pub const WORKER_PATH_ENV: &str = "QUILL_WORKER_PATH";
const HANDSHAKE_TIMEOUT_ENV: &str = "QUILL_HANDSHAKE_TIMEOUT_MS";
const REQUEST_TIMEOUT_ENV: &str = "QUILL_REQUEST_TIMEOUT_MS";
const RUN_TIMEOUT_ENV: &str = "QUILL_RUN_TIMEOUT_MS";
const MAX_INSTANCES_ENV: &str = "QUILL_MAX_INSTANCES";

/// Run loop settings, shipped to the worker so both modes behave alike
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Pause between cycles while events are pending
    pub frame_interval: Duration,
    /// Stop once nothing is dirty and no events are queued
    pub exit_when_idle: bool,
    /// Hard cap on cycles per `run`
    pub max_frames: Option<u64>,
    /// Largest accepted viewport width or height; bigger resizes are ignored
    pub max_viewport: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            viewport_width: 800,
            viewport_height: 600,
            frame_interval: Duration::from_millis(16),
            exit_when_idle: true,
            max_frames: None,
            max_viewport: 8192,
        }
    }
}

/// Registry and process isolation settings
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Explicit worker binary; resolved from the environment when unset
    pub worker_path: Option<PathBuf>,
    pub handshake_timeout: Duration,
    /// Limit for every worker call except `run`
    pub request_timeout: Duration,
    /// Limit for a worker-mode `run`
    ///
    /// `None` waits until the loop ends or the worker dies, so a worker
    /// whose loop never goes idle blocks the caller indefinitely. When the
    /// limit passes the worker is killed and `run` fails. Inline runs are
    /// never interrupted.
    pub run_timeout: Option<Duration>,
    /// Grace period for a worker to exit after `Shutdown`
    pub shutdown_timeout: Duration,
    pub max_instances: usize,
    pub run: RunConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_path: None,
            handshake_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            run_timeout: None,
            shutdown_timeout: Duration::from_secs(2),
            max_instances: 1024,
            run: RunConfig::default(),
        }
    }
}

impl Config {
    /// Defaults overridden by `QUILL_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(path) = std::env::var_os(WORKER_PATH_ENV) {
            config.worker_path = Some(PathBuf::from(path));
        }
        if let Some(ms) = env_number(HANDSHAKE_TIMEOUT_ENV) {
            config.handshake_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_number(REQUEST_TIMEOUT_ENV) {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_number(RUN_TIMEOUT_ENV) {
            config.run_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(max) = env_number(MAX_INSTANCES_ENV) {
            config.max_instances = max as usize;
        }
        config
    }

    pub fn with_worker_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.worker_path = Some(path.into());
        self
    }

    pub fn with_max_instances(mut self, max: usize) -> Self {
        self.max_instances = max;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    pub fn with_run(mut self, run: RunConfig) -> Self {
        self.run = run;
        self
    }
}

fn env_number(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("ignoring {}={:?}: {}", name, raw, err);
            None
        }
    }
}
