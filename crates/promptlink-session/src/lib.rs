//! Resilient command/response sessions over a serial link.
//!
//! A [`Session`] keeps one device link open, re-synchronizes it after every
//! timeout, and runs commands strictly one at a time. Responses are returned
//! as raw text up to and including the device's prompt character.
//!
//! ```no_run
//! # async fn demo() -> promptlink_session::Result<()> {
//! let session = promptlink_session::connect("/dev/ttyUSB0")?;
//! session.wait_connected(std::time::Duration::from_secs(30)).await?;
//! let power = session.execute("*pow=?#", None).await?;
//! println!("{power}");
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod config;
pub mod connector;
pub mod error;
pub mod events;
mod executor;
mod reconnect;
pub mod session;
mod sync;

#[cfg(test)]
pub(crate) mod sim;

pub use backoff::{Backoff, BackoffConfig};
pub use config::{ExecutorConfig, SessionConfig, SyncConfig};
pub use connector::{connect, connect_with_config};
pub use error::{Result, SessionError};
pub use events::{ConnectionState, SessionEvent};
pub use executor::Command;
pub use session::Session;
