//! Terminator-delimited response framing for prompt-style devices.
//!
//! Devices on the other end of the link answer every command with ASCII text
//! ending in a single "ready" marker byte (`>` by default). This crate turns
//! the raw byte stream into those frames and hands each one to the oldest
//! outstanding reader.

pub mod codec;
pub mod error;
pub mod framer;
pub mod protocol;

pub use codec::{decode_frame, encode_command, DEFAULT_MAX_BUFFER};
pub use error::{FrameError, Result};
pub use framer::{Framer, PendingRead};
pub use protocol::{
    ProtocolConfig, SyncCheck, BUSY_MARKER, DEFAULT_TERMINATOR, ERR_MARKER, ILLEGAL_MARKER,
    LINE_ENDING,
};
