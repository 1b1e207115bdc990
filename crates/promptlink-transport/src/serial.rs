use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde::Deserialize;
use tokio::io::{AsyncWrite, WriteHalf};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{Connector, Link, LinkWriter};

/// Default baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Serial port settings.
///
/// Framing is fixed at 8 data bits, 1 stop bit, no parity and no flow
/// control; only the port and baud rate are configurable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub port: String,
    /// Line speed.
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// Opens serial port links.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    config: SerialConfig,
}

impl SerialConnector {
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }
}

impl Connector for SerialConnector {
    fn open(&self) -> Result<Link> {
        let port = &self.config.port;
        debug!(%port, baud_rate = self.config.baud_rate, "opening serial port");

        let stream = tokio_serial::new(port, self.config.baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|e| TransportError::Open {
                port: port.clone(),
                source: io::Error::from(e),
            })?;

        #[cfg(unix)]
        let fd = std::os::fd::AsRawFd::as_raw_fd(&stream);
        let (reader, writer) = tokio::io::split(stream);

        info!(%port, "serial port opened");
        Ok(Link::new(
            port.clone(),
            reader,
            SerialWriter {
                half: writer,
                #[cfg(unix)]
                fd,
            },
        ))
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.config.port, self.config.baud_rate)
    }
}

/// Write half of a serial stream.
struct SerialWriter {
    half: WriteHalf<SerialStream>,
    /// Descriptor of the underlying tty; valid while `half` keeps the stream alive.
    #[cfg(unix)]
    fd: std::os::fd::RawFd,
}

impl AsyncWrite for SerialWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.half).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.half).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.half).poll_shutdown(cx)
    }
}

impl LinkWriter for SerialWriter {
    #[cfg(unix)]
    fn discard_output(&mut self) -> Result<()> {
        // SAFETY: `fd` belongs to the serial stream owned by `self.half`, which
        // is alive for as long as `self` is.
        let rc = unsafe { libc::tcflush(self.fd, libc::TCOFLUSH) };
        if rc != 0 {
            return Err(TransportError::Io(io::Error::last_os_error()));
        }
        Ok(())
    }

    /// No-op: tokio-serial exposes no output purge here.
    #[cfg(not(unix))]
    fn discard_output(&mut self) -> Result<()> {
        debug!("output discard not supported on this platform, skipping");
        Ok(())
    }
}

/// List the serial ports present on this machine.
pub fn available_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports().map_err(io::Error::from)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
