//! Resilient command/response sessions for serial-controlled devices.
//!
//! promptlink drives devices that speak a line-oriented ASCII protocol with a
//! single-character ready prompt (projectors, matrix switchers and similar
//! RS-232 gear). Commands run one at a time; every timeout triggers a resync,
//! and a dropped link is reopened with exponential backoff.
//!
//! # Crate Structure
//!
//! - [`transport`] - Serial and in-memory links, reader pump
//! - [`frame`] - Prompt-terminated framing and protocol markers
//! - [`session`] - Command execution, resync and reconnect

/// Re-export transport types.
pub mod transport {
    pub use promptlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use promptlink_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use promptlink_session::*;
}

pub use promptlink_session::{connect, connect_with_config, Session, SessionConfig, SessionError};
