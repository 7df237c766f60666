//! Host/worker wire protocol
//!
//! Frames are JSON objects, one per line. The worker speaks first with a
//! `Hello`; afterwards every `RequestFrame` is answered by exactly one
//! `ResponseFrame` carrying the same sequence number.

use std::io::{self, BufRead, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::dom::{NodeId, NodeInfo};
use crate::registry::Handle;
use crate::render::{Event, RunSummary};
use crate::style::ComputedStyle;
use crate::utils::{ProcessError, RemoteError};

pub const MAGIC: &str = "quill-ipc";
pub const PROTOCOL_VERSION: u32 = 1;

/// First frame written by a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub magic: String,
    pub version: u32,
    pub pid: u32,
}

impl Hello {
    /// Greeting for the running process
    pub fn current() -> Self {
        Self {
            magic: MAGIC.to_string(),
            version: PROTOCOL_VERSION,
            pid: std::process::id(),
        }
    }

    pub fn check(&self) -> Result<(), ProcessError> {
        if self.magic != MAGIC {
            return Err(ProcessError::Handshake(format!(
                "unexpected magic {:?}",
                self.magic
            )));
        }
        if self.version != PROTOCOL_VERSION {
            return Err(ProcessError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                found: self.version,
            });
        }
        Ok(())
    }
}

/// Operations a worker performs on its mirrored instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    Init { run: RunConfig },
    AddStylesheet { css: String },
    CreateNode { id: NodeId, text: Option<String> },
    SetParent { parent: NodeId, child: NodeId },
    SetAttribute { id: NodeId, key: String, value: String },
    RootId,
    NodeInfo { id: NodeId },
    ComputedStyle { id: NodeId },
    PostEvent { event: Event },
    Run,
    Shutdown,
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Init { .. } => "init",
            Request::AddStylesheet { .. } => "add_stylesheet",
            Request::CreateNode { .. } => "create_node",
            Request::SetParent { .. } => "set_parent",
            Request::SetAttribute { .. } => "set_attribute",
            Request::RootId => "root_id",
            Request::NodeInfo { .. } => "node_info",
            Request::ComputedStyle { .. } => "computed_style",
            Request::PostEvent { .. } => "post_event",
            Request::Run => "run",
            Request::Shutdown => "shutdown",
        }
    }
}

/// Successful results, one shape per request kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    Handle(Handle),
    Unit,
    Node(NodeId),
    NodeInfo(Option<NodeInfo>),
    Style(Option<ComputedStyle>),
    Run(RunSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub seq: u64,
    /// Worker-side handle; ignored by `Init`
    pub handle: Handle,
    pub request: Request,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub seq: u64,
    pub outcome: Result<Reply, RemoteError>,
}

/// Write one frame followed by a newline and flush
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, frame: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, frame)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Decode a single frame line
pub fn decode_frame<T: DeserializeOwned>(line: &str) -> Result<T, ProcessError> {
    serde_json::from_str(line.trim_end())
        .map_err(|e| ProcessError::Protocol(format!("undecodable frame: {}", e)))
}

/// Read one frame; `Ok(None)` on end of stream
pub fn read_frame<R: BufRead, T: DeserializeOwned>(
    reader: &mut R,
) -> Result<Option<T>, ProcessError> {
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .map_err(|_| ProcessError::Disconnected)?;
        if read == 0 {
            return Ok(None);
        }
        if !line.trim().is_empty() {
            return decode_frame(&line).map(Some);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_hello_check() {
        assert!(Hello::current().check().is_ok());

        let stale = Hello {
            version: 0,
            ..Hello::current()
        };
        assert!(matches!(
            stale.check(),
            Err(ProcessError::VersionMismatch { expected: 1, found: 0 })
        ));

        let foreign = Hello {
            magic: "http".into(),
            ..Hello::current()
        };
        assert!(matches!(foreign.check(), Err(ProcessError::Handshake(_))));
    }

    #[test]
    fn test_frames_are_line_delimited() {
        let mut buf = Vec::new();
        let frame = RequestFrame {
            seq: 3,
            handle: 1,
            request: Request::CreateNode {
                id: NodeId::new(5),
                text: Some("line\nbreak".into()),
            },
        };
        write_frame(&mut buf, &frame).unwrap();
        write_frame(&mut buf, &frame).unwrap();
        assert_eq!(buf.iter().filter(|&&b| b == b'\n').count(), 2);

        let mut reader = Cursor::new(buf);
        let first: Option<RequestFrame> = read_frame(&mut reader).unwrap();
        assert_eq!(first, Some(frame.clone()));
        let second: Option<RequestFrame> = read_frame(&mut reader).unwrap();
        assert_eq!(second, Some(frame));
        let end: Option<RequestFrame> = read_frame(&mut reader).unwrap();
        assert_eq!(end, None);
    }

    #[test]
    fn test_error_outcome_on_the_wire() {
        let frame = ResponseFrame {
            seq: 9,
            outcome: Err(RemoteError::AlreadyRunning),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"seq":9,"outcome":{"Err":"AlreadyRunning"}}"#);
    }

    #[test]
    fn test_garbage_is_protocol_error() {
        let mut reader = Cursor::new(b"not json\n".to_vec());
        let result: Result<Option<ResponseFrame>, _> = read_frame(&mut reader);
        assert!(matches!(result, Err(ProcessError::Protocol(_))));
    }
}
