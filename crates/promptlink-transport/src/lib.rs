//! Byte-stream link abstraction.
//!
//! Provides a unified interface over the physical channel to a device:
//! - Serial ports (via `tokio-serial`)
//! - In-memory duplex links (simulated devices, tests)
//!
//! This is the lowest layer of promptlink. Everything else builds on top of
//! the [`Link`] type provided here.

pub mod error;
pub mod memory;
pub mod pump;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::{memory_link, MemoryConnector, MemoryDevices};
pub use pump::{pump, LinkEvent};
pub use serial::{available_ports, SerialConfig, SerialConnector, DEFAULT_BAUD_RATE};
pub use traits::{Connector, Link, LinkReader, LinkSink, LinkWriter};
