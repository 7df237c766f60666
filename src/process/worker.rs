//! Worker side of the protocol
//!
//! The worker mirrors the host's instance in a local registry of inline
//! backends and answers one request at a time. Stdout carries frames
//! only; diagnostics go through `log`.

use std::io::{self, BufRead, Write};

use log::{debug, info, warn};

use super::backend::InlineBackend;
use super::protocol::{Hello, Reply, Request, RequestFrame, ResponseFrame, read_frame, write_frame};
use crate::config::Config;
use crate::registry::{Handle, Registry};
use crate::utils::{ProcessError, RemoteError};

/// Greet the host, then serve requests until `Shutdown` or end of input
pub fn serve<R: BufRead, W: Write>(mut reader: R, mut writer: W) -> io::Result<()> {
    let registry = Registry::new(Config::default());
    write_frame(&mut writer, &Hello::current())?;

    loop {
        let frame: RequestFrame = match read_frame(&mut reader) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("host closed the channel");
                break;
            }
            Err(ProcessError::Protocol(msg)) => {
                warn!("dropping malformed request: {}", msg);
                continue;
            }
            Err(err) => return Err(io::Error::other(err)),
        };

        let shutdown = matches!(frame.request, Request::Shutdown);
        let outcome = dispatch(&registry, frame.handle, frame.request).map_err(RemoteError::from);
        write_frame(
            &mut writer,
            &ResponseFrame {
                seq: frame.seq,
                outcome,
            },
        )?;
        if shutdown {
            info!("worker {} shutting down", std::process::id());
            break;
        }
    }
    Ok(())
}

fn dispatch(registry: &Registry, handle: Handle, request: Request) -> crate::utils::Result<Reply> {
    match request {
        Request::Init { run } => {
            let backend = InlineBackend::new(run);
            registry.try_insert(Box::new(backend)).map(Reply::Handle)
        }
        Request::AddStylesheet { css } => registry
            .try_add_stylesheet(handle, &css)
            .map(|_| Reply::Unit),
        Request::CreateNode { id, text } => registry
            .try_create_node(handle, id, text.as_deref())
            .map(Reply::Node),
        Request::SetParent { parent, child } => registry
            .try_set_parent(handle, parent, child)
            .map(|_| Reply::Unit),
        Request::SetAttribute { id, key, value } => registry
            .try_set_attribute(handle, id, &key, &value)
            .map(|_| Reply::Unit),
        Request::RootId => registry.try_root_id(handle).map(Reply::Node),
        Request::NodeInfo { id } => registry.try_node_info(handle, id).map(Reply::NodeInfo),
        Request::ComputedStyle { id } => registry
            .try_computed_style(handle, id)
            .map(Reply::Style),
        Request::PostEvent { event } => registry
            .try_post_event(handle, event)
            .map(|_| Reply::Unit),
        Request::Run => registry.try_run(handle).map(Reply::Run),
        Request::Shutdown => registry.try_destroy(handle).map(|_| Reply::Unit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::dom::NodeId;
    use crate::process::protocol::decode_frame;
    use crate::utils::TreeError;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn script(requests: Vec<(Handle, Request)>) -> Vec<u8> {
        let mut input = Vec::new();
        for (seq, (handle, request)) in requests.into_iter().enumerate() {
            let frame = RequestFrame {
                seq: seq as u64 + 1,
                handle,
                request,
            };
            write_frame(&mut input, &frame).unwrap();
        }
        input
    }

    fn responses(output: &[u8]) -> (Hello, Vec<ResponseFrame>) {
        let text = std::str::from_utf8(output).unwrap();
        let mut lines = text.lines();
        let hello = decode_frame(lines.next().unwrap()).unwrap();
        let frames = lines.map(|l| decode_frame(l).unwrap()).collect();
        (hello, frames)
    }

    #[test]
    fn test_serve_session() {
        let _ = env_logger::builder().is_test(true).try_init();
        // Slot 0, generation 0
        let handle: Handle = 1;
        let input = script(vec![
            (0, Request::Init { run: RunConfig::default() }),
            (handle, Request::CreateNode { id: NodeId::new(1), text: Some("Hello".into()) }),
            (handle, Request::CreateNode { id: NodeId::new(1), text: None }),
            (handle, Request::RootId),
            (handle, Request::Shutdown),
            (handle, Request::RootId),
        ]);

        let mut output = Vec::new();
        serve(Cursor::new(input), &mut output).unwrap();
        let (hello, frames) = responses(&output);

        assert!(hello.check().is_ok());
        // requests after shutdown are never read
        assert_eq!(frames.len(), 5);
        assert_eq!(frames[0].outcome, Ok(Reply::Handle(handle)));
        assert_eq!(frames[1].outcome, Ok(Reply::Node(NodeId::new(1))));
        assert_eq!(
            frames[2].outcome,
            Err(RemoteError::Tree(TreeError::DuplicateId(NodeId::new(1))))
        );
        assert_eq!(frames[3].outcome, Ok(Reply::Node(NodeId::ROOT)));
        assert_eq!(frames[4].outcome, Ok(Reply::Unit));
        assert_eq!(frames.iter().map(|f| f.seq).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_unknown_handle_is_rejected() {
        let input = script(vec![(99, Request::RootId)]);
        let mut output = Vec::new();
        serve(Cursor::new(input), &mut output).unwrap();

        let (_, frames) = responses(&output);
        assert_eq!(frames[0].outcome, Err(RemoteError::InvalidHandle));
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let mut input = b"{broken\n".to_vec();
        input.extend(script(vec![(0, Request::Init { run: RunConfig::default() })]));
        let mut output = Vec::new();
        serve(Cursor::new(input), &mut output).unwrap();

        let (_, frames) = responses(&output);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].outcome, Ok(Reply::Handle(1)));
    }
}
