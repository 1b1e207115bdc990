use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{DuplexStream, WriteHalf};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Connector, Link, LinkWriter};

const DUPLEX_CAPACITY: usize = 4 * 1024;

/// Create an in-memory connector and the receiving end for the device side.
///
/// Every successful [`Connector::open`] creates a fresh duplex pipe and hands
/// its far end to [`MemoryDevices::accept`]. Dropping that end closes the link.
pub fn memory_link(name: impl Into<String>) -> (MemoryConnector, MemoryDevices) {
    let (tx, rx) = mpsc::unbounded_channel();
    let connector = MemoryConnector {
        name: name.into(),
        devices: tx,
        refuse: Arc::new(AtomicUsize::new(0)),
        opened: Arc::new(AtomicUsize::new(0)),
    };
    (connector, MemoryDevices { rx })
}

/// Connector producing in-memory links.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    name: String,
    devices: mpsc::UnboundedSender<DuplexStream>,
    refuse: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
}

impl MemoryConnector {
    /// Make the next `count` open attempts fail.
    pub fn refuse_next(&self, count: usize) {
        self.refuse.store(count, Ordering::SeqCst);
    }

    /// Number of open attempts so far, successful or not.
    pub fn open_attempts(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryConnector {
    fn open(&self) -> Result<Link> {
        self.opened.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Open {
                port: self.name.clone(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "open refused"),
            });
        }

        let (host, device) = tokio::io::duplex(DUPLEX_CAPACITY);
        self.devices.send(device).map_err(|_| TransportError::Open {
            port: self.name.clone(),
            source: io::Error::new(io::ErrorKind::NotFound, "no device attached"),
        })?;

        debug!(link = %self.name, "memory link opened");
        let (reader, writer) = tokio::io::split(host);
        Ok(Link::new(self.name.clone(), reader, writer))
    }

    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }
}

impl LinkWriter for WriteHalf<DuplexStream> {
    fn discard_output(&mut self) -> Result<()> {
        // Writes land in the peer's buffer immediately; nothing is queued.
        Ok(())
    }
}

/// Device side of a [`MemoryConnector`].
#[derive(Debug)]
pub struct MemoryDevices {
    rx: mpsc::UnboundedReceiver<DuplexStream>,
}

impl MemoryDevices {
    /// Wait for the next opened link and return its device end.
    pub async fn accept(&mut self) -> Option<DuplexStream> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn open_pairs_host_and_device() {
        let (connector, mut devices) = memory_link("projector");
        let link = connector.open().unwrap();
        assert_eq!(link.name(), "projector");

        let mut device = devices.accept().await.unwrap();
        let (mut reader, mut sink) = link.into_split();

        sink.write(b"*pow=?#\r").await.unwrap();
        let mut buf = [0u8; 8];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"*pow=?#\r");

        device.write_all(b"*POW=ON#>").await.unwrap();
        let mut buf = [0u8; 9];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"*POW=ON#>");
    }

    #[tokio::test]
    async fn refused_opens_are_counted() {
        let (connector, _devices) = memory_link("projector");
        connector.refuse_next(2);

        assert!(connector.open().is_err());
        assert!(connector.open().is_err());
        assert!(connector.open().is_ok());
        assert_eq!(connector.open_attempts(), 3);
    }

    #[tokio::test]
    async fn open_without_device_side_fails() {
        let (connector, devices) = memory_link("projector");
        drop(devices);
        let err = connector.open().unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
    }

    #[tokio::test]
    async fn flush_and_drain_is_noop() {
        let (connector, _devices) = memory_link("projector");
        let (_reader, mut sink) = connector.open().unwrap().into_split();
        sink.flush_and_drain().await.unwrap();
    }
}
