use std::io::ErrorKind;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::traits::LinkReader;

const READ_CHUNK_SIZE: usize = 1024;

/// Something that happened on the read side of a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Bytes arrived. Any fragment size, no framing guarantee.
    Data(Bytes),
    /// A non-fatal channel error.
    Error(String),
    /// The link is gone. Always the last event.
    Closed(String),
}

/// Read from `reader` until it closes or `cancel` fires, reporting each
/// event to `on_event`.
///
/// `on_event` runs inline on the read loop and must not block. Cancellation
/// ends the pump without a `Closed` event.
pub async fn pump<F>(mut reader: LinkReader, cancel: CancellationToken, mut on_event: F)
where
    F: FnMut(LinkEvent) + Send,
{
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("link pump cancelled");
                return;
            }
            read = reader.read(&mut chunk) => read,
        };

        match read {
            Ok(0) => {
                on_event(LinkEvent::Closed("end of stream".to_string()));
                return;
            }
            Ok(n) => {
                trace!(len = n, "link data");
                on_event(LinkEvent::Data(Bytes::copy_from_slice(&chunk[..n])));
            }
            Err(err) if matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::TimedOut) => {
                continue
            }
            Err(err) => {
                let reason = err.to_string();
                on_event(LinkEvent::Error(reason.clone()));
                on_event(LinkEvent::Closed(reason));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};

    use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};

    use super::*;

    fn collector() -> (Arc<Mutex<Vec<LinkEvent>>>, impl FnMut(LinkEvent) + Send) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        (events, move |event| sink.lock().unwrap().push(event))
    }

    #[tokio::test]
    async fn reports_data_then_closed() {
        let (mut device, host) = tokio::io::duplex(64);
        let (events, on_event) = collector();

        device.write_all(b"*POW=ON").await.unwrap();
        drop(device);

        pump(Box::new(host), CancellationToken::new(), on_event).await;

        let events = events.lock().unwrap();
        assert_eq!(events[0], LinkEvent::Data(Bytes::from_static(b"*POW=ON")));
        assert_eq!(
            events.last(),
            Some(&LinkEvent::Closed("end of stream".to_string()))
        );
    }

    #[tokio::test]
    async fn cancellation_stops_without_close_event() {
        let (_device, host) = tokio::io::duplex(64);
        let (events, on_event) = collector();
        let cancel = CancellationToken::new();
        cancel.cancel();

        pump(Box::new(host), cancel, on_event).await;

        assert!(events.lock().unwrap().is_empty());
    }

    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")))
        }
    }

    #[tokio::test]
    async fn read_error_reports_error_then_closed() {
        let (events, on_event) = collector();

        pump(Box::new(FailingReader), CancellationToken::new(), on_event).await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], LinkEvent::Error(reason) if reason.contains("unplugged")));
        assert!(matches!(&events[1], LinkEvent::Closed(_)));
    }
}
