use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::Result;

/// Read side of an open link.
pub type LinkReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write side of an open link.
///
/// Besides plain async writes, a link must be able to throw away output that
/// has been queued in the driver but not yet put on the wire.
pub trait LinkWriter: AsyncWrite + Send + Unpin {
    /// Discard buffered-but-unsent output.
    ///
    /// Best effort. Writers with nothing to discard, or no way to reach the
    /// driver queue (in-memory links, serial ports on non-unix targets),
    /// return `Ok(())` without doing anything. Resynchronization then relies
    /// on the receive-side drain and the probe round trip alone.
    fn discard_output(&mut self) -> Result<()>;
}

/// Opens links to a device.
///
/// The session calls [`Connector::open`] once at startup and again after
/// every disconnect, so implementations must be reusable.
pub trait Connector: Send + Sync + 'static {
    /// Open a fresh link.
    fn open(&self) -> Result<Link>;

    /// Human-readable link name for diagnostics.
    fn describe(&self) -> String;
}

/// An open byte-stream link to a device.
pub struct Link {
    name: String,
    reader: LinkReader,
    writer: Box<dyn LinkWriter>,
}

impl Link {
    /// Assemble a link from its two halves.
    pub fn new(
        name: impl Into<String>,
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl LinkWriter + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// The link name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Split into the read side (handed to the pump) and the write side.
    pub fn into_split(self) -> (LinkReader, LinkSink) {
        let sink = LinkSink {
            name: self.name,
            inner: self.writer,
        };
        (self.reader, sink)
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").field("name", &self.name).finish()
    }
}

/// Write side of a link with the operations the executor needs.
pub struct LinkSink {
    name: String,
    inner: Box<dyn LinkWriter>,
}

impl LinkSink {
    /// Write all bytes and push them to the driver.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        trace!(link = %self.name, len = bytes.len(), "writing");
        self.inner.write_all(bytes).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Discard unsent output, then wait until in-flight output is transmitted.
    pub async fn flush_and_drain(&mut self) -> Result<()> {
        self.inner.discard_output()?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shut down the write side.
    pub async fn close(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }

    /// The link name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for LinkSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkSink").field("name", &self.name).finish()
    }
}
