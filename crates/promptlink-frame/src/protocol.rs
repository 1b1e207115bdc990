//! Device protocol conventions.
//!
//! Marker strings differ between device families, so everything here is
//! configurable; the constants are the defaults.

use serde::Deserialize;

use crate::codec::DEFAULT_MAX_BUFFER;
use crate::error::{FrameError, Result};

/// Ready prompt that ends every response.
pub const DEFAULT_TERMINATOR: char = '>';

/// Appended to every outgoing command.
pub const LINE_ENDING: &str = "\r";

/// Response text of a device rejecting a malformed command.
pub const ILLEGAL_MARKER: &str = "Illegal";

/// Error prefix used by some device families.
pub const ERR_MARKER: &str = "ERR\r:";

/// Response text of a device that is busy and ignored the command.
pub const BUSY_MARKER: &str = "Block";

/// How a probe response proves the line is synchronized.
///
/// Responses handed out by [`Framer`](crate::Framer) always end with the
/// terminator, so on framed input both checks accept the same responses.
/// `Last` only rejects text checked outside the framer, such as a buffer
/// snapshot with bytes after the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncCheck {
    /// The terminator appears anywhere in the response.
    #[default]
    Present,
    /// The response ends with the terminator.
    Last,
}

/// Protocol configuration shared by framing and execution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Single ASCII character ending each response.
    pub terminator: char,
    /// Suffix appended to each command.
    pub line_ending: String,
    /// Substrings marking a rejected command.
    pub error_markers: Vec<String>,
    /// Substrings marking a busy device.
    pub busy_markers: Vec<String>,
    /// Probe success criterion.
    pub sync_check: SyncCheck,
    /// Receive buffer limit in bytes.
    pub max_buffer_size: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            terminator: DEFAULT_TERMINATOR,
            line_ending: LINE_ENDING.to_string(),
            error_markers: vec![ILLEGAL_MARKER.to_string(), ERR_MARKER.to_string()],
            busy_markers: vec![BUSY_MARKER.to_string()],
            sync_check: SyncCheck::Present,
            max_buffer_size: DEFAULT_MAX_BUFFER,
        }
    }
}

impl ProtocolConfig {
    /// Check the configuration before use.
    pub fn validate(&self) -> Result<()> {
        if !self.terminator.is_ascii() {
            return Err(FrameError::InvalidConfig(format!(
                "terminator {:?} is not ASCII",
                self.terminator
            )));
        }
        if self.line_ending.is_empty() {
            return Err(FrameError::InvalidConfig(
                "line ending must not be empty".to_string(),
            ));
        }
        if self.max_buffer_size == 0 {
            return Err(FrameError::InvalidConfig(
                "max buffer size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The terminator as a byte.
    ///
    /// Non-ASCII terminators are rejected by [`validate`](Self::validate);
    /// unvalidated ones fall back to the default.
    pub fn terminator_byte(&self) -> u8 {
        u8::try_from(self.terminator)
            .ok()
            .filter(u8::is_ascii)
            .unwrap_or(DEFAULT_TERMINATOR as u8)
    }

    /// True if the device flagged the command as unsupported.
    pub fn is_rejection(&self, response: &str) -> bool {
        self.error_markers
            .iter()
            .any(|marker| !marker.is_empty() && response.contains(marker.as_str()))
    }

    /// True if the device reported itself busy.
    pub fn is_busy(&self, response: &str) -> bool {
        self.busy_markers
            .iter()
            .any(|marker| !marker.is_empty() && response.contains(marker.as_str()))
    }

    /// True if a probe response shows a responsive, synchronized device.
    pub fn is_ready(&self, response: &str) -> bool {
        match self.sync_check {
            SyncCheck::Present => response.contains(self.terminator),
            SyncCheck::Last => response.ends_with(self.terminator),
        }
    }
}
