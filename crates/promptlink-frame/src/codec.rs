use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Default receive buffer limit: 4 KiB.
///
/// A normal response is a few dozen bytes; anything this long without a
/// terminator is line noise.
pub const DEFAULT_MAX_BUFFER: usize = 4 * 1024;

/// Decode the first frame from a buffer.
///
/// Returns `None` if the buffer doesn't contain the terminator yet. On
/// success, the frame bytes up to and including the terminator are removed
/// from the buffer and returned as text.
pub fn decode_frame(src: &mut BytesMut, terminator: u8) -> Option<String> {
    let end = src.iter().position(|&b| b == terminator)?;
    let frame = src.split_to(end + 1);
    Some(String::from_utf8_lossy(&frame).into_owned())
}

/// Encode a command into the wire format: the command text followed by the
/// line ending.
///
/// The empty command encodes to just the line ending and is the probe.
pub fn encode_command(command: &str, line_ending: &str, dst: &mut BytesMut) -> Result<()> {
    if let Some(offset) = command.bytes().position(|b| !b.is_ascii()) {
        return Err(FrameError::NonAscii { offset });
    }
    dst.reserve(command.len() + line_ending.len());
    dst.put_slice(command.as_bytes());
    dst.put_slice(line_ending.as_bytes());
    Ok(())
}
